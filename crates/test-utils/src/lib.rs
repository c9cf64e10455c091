//! Formseal test utilities.
//!
//! Helpers for integration testing: scraping rendered forms, building
//! submissions the way a browser would, and carrying session cookies.

use std::sync::LazyLock;

use regex::Regex;

/// Salt used by test configurations.
pub const TEST_SALT: &str = "formseal-test-salt-0123456789abcdef";

/// Session identifier used by tests that do not go through HTTP.
pub const TEST_SESSION: &str = "test-session";

#[allow(clippy::expect_used)]
static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<input\b([^>]*)>").expect("valid regex literal"));

#[allow(clippy::expect_used)]
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)="([^"]*)""#).expect("valid regex literal")
});

/// An `<input>` scraped from rendered HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedInput {
    pub kind: String,
    pub name: String,
    pub value: String,
}

/// Every `<input>` with a name, in document order. Attribute values are
/// HTML-unescaped.
pub fn inputs(html: &str) -> Vec<ScrapedInput> {
    INPUT_TAG
        .captures_iter(html)
        .filter_map(|tag| {
            let mut kind = String::from("text");
            let mut name = None;
            let mut value = String::new();
            for attr in ATTRIBUTE.captures_iter(&tag[1]) {
                let v = html_unescape(&attr[2]);
                match &attr[1] {
                    "type" => kind = v,
                    "name" => name = Some(v),
                    "value" => value = v,
                    _ => {}
                }
            }
            name.map(|name| ScrapedInput { kind, name, value })
        })
        .collect()
}

/// Hidden inputs as name/value pairs.
pub fn hidden_inputs(html: &str) -> Vec<(String, String)> {
    inputs(html)
        .into_iter()
        .filter(|i| i.kind == "hidden")
        .map(|i| (i.name, i.value))
        .collect()
}

/// Reverse of the kernel's HTML escaping.
pub fn html_unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// A form submission assembled from rendered HTML.
///
/// Starts with every hidden input (token fields included), as a browser
/// would post them, and lets the test fill in or tamper with fields.
#[derive(Debug, Clone, Default)]
pub struct TestSubmission {
    pairs: Vec<(String, String)>,
}

impl TestSubmission {
    /// Start from the hidden inputs of a rendered form.
    pub fn from_html(html: &str) -> Self {
        Self {
            pairs: hidden_inputs(html),
        }
    }

    /// Add a field value.
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.pairs.push((name.to_string(), value.to_string()));
        self
    }

    /// Replace every value posted under `name`.
    pub fn replace(mut self, name: &str, value: &str) -> Self {
        for pair in self.pairs.iter_mut().filter(|(n, _)| n == name) {
            pair.1 = value.to_string();
        }
        self
    }

    /// Drop every value posted under `name`.
    pub fn without(mut self, name: &str) -> Self {
        self.pairs.retain(|(n, _)| n != name);
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Encode as an `application/x-www-form-urlencoded` body.
    pub fn to_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// The `name=value` part of a `Set-Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
