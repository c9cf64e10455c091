//! HTML attribute formatting for string templates.

use std::collections::BTreeMap;

/// Attributes rendered as `name="name"` when set and omitted otherwise.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "autofocus",
    "checked",
    "disabled",
    "multiple",
    "readonly",
    "required",
    "selected",
];

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Flag(value)
    }
}

/// Ordered attribute map.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Escape text for use in HTML content or a quoted attribute.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Render attributes as ` key="value"` pairs in key order, skipping `exclude`.
pub fn format_attributes(attrs: &Attributes, exclude: &[&str]) -> String {
    let mut out = String::new();
    for (key, value) in attrs {
        if exclude.contains(&key.as_str()) {
            continue;
        }
        let is_boolean = BOOLEAN_ATTRIBUTES.contains(&key.as_str());
        match value {
            AttrValue::Flag(false) => {}
            AttrValue::Flag(true) => {
                out.push_str(&format!(" {key}=\"{key}\""));
            }
            AttrValue::Text(text) if is_boolean => {
                if matches!(text.as_str(), "" | "0" | "false") {
                    continue;
                }
                out.push_str(&format!(" {key}=\"{key}\""));
            }
            AttrValue::Text(text) => {
                out.push_str(&format!(" {key}=\"{}\"", html_escape(text)));
            }
        }
    }
    out
}
