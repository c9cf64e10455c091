//! Named string templates with `{{placeholder}}` substitution.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{HelperError, HelperResult};

/// Placeholder marker: `{{name}}`. Any text without braces is a key;
/// surrounding whitespace is ignored.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("valid regex literal"));

/// Stores named templates and renders them.
///
/// The map given at construction is the baseline that
/// [`reset_templates`](Self::reset_templates) returns to.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    baseline: HashMap<String, String>,
    active: HashMap<String, String>,
}

impl TemplateRenderer {
    pub fn new<K, V>(templates: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let baseline: HashMap<String, String> = templates
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            active: baseline.clone(),
            baseline,
        }
    }

    /// Merge templates into the active map, replacing same-named entries.
    pub fn set_templates<K, V>(&mut self, templates: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.active
            .extend(templates.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Drop every overlay and return to the construction-time map.
    pub fn reset_templates(&mut self) {
        self.active = self.baseline.clone();
    }

    pub fn get_templates(&self) -> &HashMap<String, String> {
        &self.active
    }

    pub fn get_template(&self, name: &str) -> Option<&str> {
        self.active.get(name).map(String::as_str)
    }

    /// Render a template, replacing each `{{key}}` with its value.
    ///
    /// Keys are matched after trimming, so `{{ name }}` and `{{name}}` are the
    /// same placeholder. Missing keys render as the empty string. Values are
    /// inserted as given: they are neither escaped nor scanned for further
    /// placeholders.
    pub fn render(&self, name: &str, values: &[(&str, &str)]) -> HelperResult<String> {
        let body = self
            .active
            .get(name)
            .ok_or_else(|| HelperError::TemplateNotFound(name.to_string()))?;

        let rendered = PLACEHOLDER.replace_all(body, |caps: &Captures<'_>| {
            let key = caps[1].trim();
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
                .unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }

    /// Apply `templates` until the returned scope is dropped.
    ///
    /// The previous active map is restored on every exit path, including a
    /// panic while rendering.
    pub fn override_templates<K, V>(
        &mut self,
        templates: impl IntoIterator<Item = (K, V)>,
    ) -> TemplateScope<'_>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let saved = self.active.clone();
        self.set_templates(templates);
        TemplateScope {
            renderer: self,
            saved: Some(saved),
        }
    }

    /// Merge templates from a YAML mapping of name to body.
    pub fn load_file(&mut self, path: &Path) -> HelperResult<usize> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HelperError::TemplateLoad(format!("{}: {e}", path.display())))?;
        let templates: HashMap<String, String> = serde_yml::from_str(&content)
            .map_err(|e| HelperError::TemplateLoad(format!("{}: {e}", path.display())))?;

        let count = templates.len();
        self.set_templates(templates);
        debug!(path = %path.display(), count, "loaded templates");
        Ok(count)
    }
}

/// Temporary template overrides; restores the previous map when dropped.
pub struct TemplateScope<'a> {
    renderer: &'a mut TemplateRenderer,
    saved: Option<HashMap<String, String>>,
}

impl Deref for TemplateScope<'_> {
    type Target = TemplateRenderer;

    fn deref(&self) -> &TemplateRenderer {
        self.renderer
    }
}

impl DerefMut for TemplateScope<'_> {
    fn deref_mut(&mut self) -> &mut TemplateRenderer {
        self.renderer
    }
}

impl Drop for TemplateScope<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.renderer.active = saved;
        }
    }
}

/// Templates used by the form builder.
pub fn form_templates() -> HashMap<String, String> {
    [
        ("formStart", "<form{{attrs}}>"),
        ("formEnd", "</form>"),
        ("hiddenBlock", "<div style=\"display:none;\">{{content}}</div>"),
        ("input", "<input type=\"{{type}}\" name=\"{{name}}\"{{attrs}}>"),
        ("inputSubmit", "<input type=\"{{type}}\"{{attrs}}>"),
        (
            "inputContainer",
            "<div class=\"input {{type}}{{required}}\">{{content}}</div>",
        ),
        ("label", "<label{{attrs}}>{{text}}</label>"),
        ("nestingLabel", "{{hidden}}<label{{attrs}}>{{input}}{{text}}</label>"),
        ("textarea", "<textarea name=\"{{name}}\"{{attrs}}>{{value}}</textarea>"),
        ("select", "<select name=\"{{name}}\"{{attrs}}>{{content}}</select>"),
        (
            "selectMultiple",
            "<select name=\"{{name}}[]\" multiple=\"multiple\"{{attrs}}>{{content}}</select>",
        ),
        ("option", "<option value=\"{{value}}\"{{attrs}}>{{text}}</option>"),
        (
            "checkbox",
            "<input type=\"checkbox\" name=\"{{name}}\" value=\"{{value}}\"{{attrs}}>",
        ),
        (
            "radio",
            "<input type=\"radio\" name=\"{{name}}\" value=\"{{value}}\"{{attrs}}>",
        ),
        ("button", "<button{{attrs}}>{{text}}</button>"),
        ("fieldset", "<fieldset{{attrs}}>{{content}}</fieldset>"),
        ("legend", "<legend>{{text}}</legend>"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new([
            ("link", "<a href=\"{{url}}\">{{text}}</a>"),
            ("plain", "no placeholders here"),
        ])
    }

    #[test]
    fn substitutes_values() {
        let out = renderer()
            .render("link", &[("url", "/a"), ("text", "A")])
            .unwrap_or_default();
        assert_eq!(out, "<a href=\"/a\">A</a>");
    }

    #[test]
    fn missing_values_render_empty() {
        let out = renderer().render("link", &[("text", "A")]).unwrap_or_default();
        assert_eq!(out, "<a href=\"\">A</a>");
    }

    #[test]
    fn keys_are_trimmed_and_may_use_any_characters() {
        let r = TemplateRenderer::new([("t", "[{{ name }}|{{data:id}}|{{ }}]")]);
        let out = r.render("t", &[("name", "x"), ("data:id", "7")]);
        assert_eq!(out.ok().as_deref(), Some("[x|7|]"));
    }

    #[test]
    fn plain_template_is_unchanged() {
        let r = renderer();
        assert_eq!(
            r.render("plain", &[]).unwrap_or_default(),
            "no placeholders here"
        );
    }

    #[test]
    fn values_are_not_expanded_again() {
        let out = renderer()
            .render("link", &[("url", "{{text}}"), ("text", "<b>")])
            .unwrap_or_default();
        assert_eq!(out, "<a href=\"{{text}}\"><b></a>");
    }

    #[test]
    fn unknown_template_is_an_error() {
        let err = renderer().render("missing", &[]);
        assert!(matches!(err, Err(HelperError::TemplateNotFound(name)) if name == "missing"));
    }

    #[test]
    fn render_does_not_mutate_templates() {
        let r = renderer();
        let before = r.get_templates().clone();
        let _ = r.render("link", &[("url", "/x")]);
        assert_eq!(r.get_templates(), &before);
    }

    #[test]
    fn set_then_reset_restores_baseline() {
        let mut r = renderer();
        r.set_templates([("plain", "changed"), ("x", "1")]);
        assert_eq!(r.get_template("plain"), Some("changed"));
        assert_eq!(r.get_template("x"), Some("1"));

        r.reset_templates();
        assert_eq!(r.get_template("plain"), Some("no placeholders here"));
        assert_eq!(r.get_template("x"), None);
    }

    #[test]
    fn later_set_overrides_earlier() {
        let mut r = TemplateRenderer::default();
        r.set_templates([("a", "1")]);
        r.set_templates([("a", "2")]);
        assert_eq!(r.get_template("a"), Some("2"));
    }

    #[test]
    fn scope_restores_previous_templates() {
        let mut r = renderer();
        r.set_templates([("extra", "kept")]);
        {
            let scoped = r.override_templates([("plain", "scoped"), ("tmp", "t")]);
            assert_eq!(scoped.get_template("plain"), Some("scoped"));
            assert_eq!(scoped.render("tmp", &[]).unwrap_or_default(), "t");
        }
        assert_eq!(r.get_template("plain"), Some("no placeholders here"));
        assert_eq!(r.get_template("tmp"), None);
        assert_eq!(r.get_template("extra"), Some("kept"));
    }

    #[test]
    fn scope_restores_on_panic() {
        let mut r = renderer();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scoped = r.override_templates([("plain", "scoped")]);
            panic!("render failed");
        }));
        assert!(result.is_err());
        assert_eq!(r.get_template("plain"), Some("no placeholders here"));
    }

    #[test]
    fn form_templates_cover_builder_needs() {
        let templates = form_templates();
        for name in ["formStart", "formEnd", "hiddenBlock", "input", "select", "button"] {
            assert!(templates.contains_key(name), "missing {name}");
        }
    }
}
