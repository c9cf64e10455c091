//! Field name normalization.
//!
//! Form inputs may be named with bracket notation (`Article[tags][]`) or dot
//! notation (`Article.tags`). The guard tracks every field by its canonical
//! dot path so both spellings hash identically.

use std::fmt;

use crate::error::{HelperError, HelperResult};

/// A normalized, dot-delimited field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldName {
    segments: Vec<String>,
}

impl FieldName {
    /// Parse a raw input name into its canonical form.
    ///
    /// The empty string and purely numeric names such as `"0"` are valid.
    pub fn parse(raw: &str) -> HelperResult<Self> {
        if raw.contains('|') {
            return Err(invalid(raw, "contains '|'"));
        }
        if raw.is_empty() {
            return Ok(Self {
                segments: vec![String::new()],
            });
        }

        let segments = if raw.contains('[') || raw.contains(']') {
            parse_brackets(raw)?
        } else {
            split_dots(raw)
        };

        if segments.is_empty() {
            return Err(invalid(raw, "no usable segments"));
        }
        Ok(Self { segments })
    }

    /// The canonical dot path.
    pub fn path(&self) -> String {
        self.segments.join(".")
    }

    /// The group this field belongs to: trailing numeric segments are dropped,
    /// so `Tags.0` and `Tags.1` both belong to `Tags`. The first segment is
    /// always kept.
    pub fn group(&self) -> String {
        let mut end = self.segments.len();
        while end > 1 && is_numeric(&self.segments[end - 1]) {
            end -= 1;
        }
        self.segments[..end].join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Whether the unlocked dot path `unlocked` covers the dot path `field`.
///
/// Keeping only the segments of `field` that also occur in `unlocked` must
/// reproduce `unlocked` exactly, so `Article` covers `Article.title`.
pub(crate) fn covers(unlocked: &str, field: &str) -> bool {
    if unlocked == field {
        return true;
    }
    let off: Vec<&str> = unlocked.split('.').collect();
    let kept: Vec<&str> = field.split('.').filter(|s| off.contains(s)).collect();
    kept == off
}

fn invalid(raw: &str, reason: &'static str) -> HelperError {
    HelperError::InvalidFieldRegistration {
        name: raw.to_string(),
        reason,
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn split_dots(raw: &str) -> Vec<String> {
    raw.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_brackets(raw: &str) -> HelperResult<Vec<String>> {
    let Some(open) = raw.find('[') else {
        return Err(invalid(raw, "unbalanced brackets"));
    };

    let head = &raw[..open];
    if head.contains(']') {
        return Err(invalid(raw, "unbalanced brackets"));
    }
    let mut segments = split_dots(head);

    let mut rest = &raw[open..];
    while !rest.is_empty() {
        let Some(inner) = rest.strip_prefix('[') else {
            // Image submits post their click position as `name[..].x`.
            if let Some(axis) = rest.strip_prefix('.').filter(|a| matches!(*a, "x" | "y")) {
                segments.push(axis.to_string());
                break;
            }
            return Err(invalid(raw, "unexpected text after ']'"));
        };
        let Some(close) = inner.find(']') else {
            return Err(invalid(raw, "unbalanced brackets"));
        };
        let segment = &inner[..close];
        if segment.contains('[') {
            return Err(invalid(raw, "nested brackets"));
        }
        rest = &inner[close + 1..];

        if segment.is_empty() {
            // `name[]` marks a multi-value input; only allowed last.
            if !rest.is_empty() {
                return Err(invalid(raw, "empty bracket segment"));
            }
            continue;
        }
        segments.push(segment.to_string());
    }

    Ok(segments)
}
