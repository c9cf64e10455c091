//! Form rendering with tamper protection.
//!
//! [`FormBuilder`] walks a [`Form`] definition, renders each element through
//! the string templates and records it with a fresh [`FieldTokenGuard`]. The
//! token block is emitted once, after every element has been registered.

use tracing::debug;

use crate::config::GuardConfig;
use crate::error::HelperResult;
use crate::theme::{AttrValue, Attributes, TemplateRenderer, format_attributes, html_escape};

use super::field::FieldName;
use super::token::{FieldOptions, FieldTokenGuard, FormToken, TokenContext};
use super::types::{ElementType, Form, FormElement};

/// The output of rendering one form.
#[derive(Debug)]
pub struct RenderedForm {
    pub html: String,
    pub token: FormToken,
    /// The guard after all fields were registered.
    pub guard: FieldTokenGuard,
}

/// Renders forms and secures their fields.
#[derive(Debug, Clone)]
pub struct FormBuilder {
    renderer: TemplateRenderer,
    guard_config: GuardConfig,
}

impl FormBuilder {
    pub fn new(renderer: TemplateRenderer, guard_config: GuardConfig) -> Self {
        Self {
            renderer,
            guard_config,
        }
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut TemplateRenderer {
        &mut self.renderer
    }

    /// Render a form, returning its HTML and token.
    pub fn render(&self, form: &Form, ctx: &TokenContext) -> HelperResult<RenderedForm> {
        let mut pass = RenderPass {
            renderer: &self.renderer,
            guard: FieldTokenGuard::new(self.guard_config.clone()),
        };
        for name in &form.unlocked_fields {
            pass.guard.unlock_field(name)?;
        }

        let mut html = pass.form_start(form)?;
        if let Some(title) = &form.title {
            html.push_str(&pass.renderer.render("legend", &[("text", &html_escape(title))])?);
        }
        for (name, element) in form.sorted_elements() {
            html.push_str(&pass.element(name, element)?);
        }

        let token = pass.guard.build_digest(ctx, &[])?;
        html.push_str(&pass.token_block(&token)?);
        html.push_str(&pass.renderer.render("formEnd", &[])?);

        debug!(
            form_id = %form.form_id,
            locked = pass.guard.locked_fields().len(),
            unlocked = pass.guard.unlocked_fields().len(),
            "rendered form"
        );

        Ok(RenderedForm {
            html,
            token,
            guard: pass.guard,
        })
    }
}

/// State for rendering a single form.
struct RenderPass<'a> {
    renderer: &'a TemplateRenderer,
    guard: FieldTokenGuard,
}

impl RenderPass<'_> {
    fn form_start(&self, form: &Form) -> HelperResult<String> {
        let mut attrs = to_attributes(&form.attributes);
        attrs.insert("action".to_string(), form.action.as_str().into());
        attrs.insert("method".to_string(), form.method.as_str().into());
        attrs.insert("id".to_string(), form.form_id.as_str().into());
        attrs
            .entry("accept-charset".to_string())
            .or_insert_with(|| "utf-8".into());
        self.renderer
            .render("formStart", &[("attrs", &format_attributes(&attrs, &[]))])
    }

    fn token_block(&self, token: &FormToken) -> HelperResult<String> {
        let mut content = String::new();
        for (name, value) in token.hidden_fields() {
            let mut attrs = Attributes::new();
            attrs.insert("value".to_string(), value.into());
            attrs.insert("autocomplete".to_string(), "off".into());
            content.push_str(&self.renderer.render(
                "input",
                &[
                    ("type", "hidden"),
                    ("name", name),
                    ("attrs", &format_attributes(&attrs, &[])),
                ],
            )?);
        }
        self.renderer.render("hiddenBlock", &[("content", &content)])
    }

    fn element(&mut self, name: &str, el: &FormElement) -> HelperResult<String> {
        let field = FieldName::parse(name)?;
        let html_name = html_name(&field);
        let mut attrs = base_attributes(&field, el);

        let input = match &el.element_type {
            ElementType::Textfield { max_length } => {
                if let Some(max) = max_length {
                    attrs.insert("maxlength".to_string(), max.to_string().into());
                }
                if let Some(value) = &el.default_value {
                    attrs.insert("value".to_string(), value.as_str().into());
                }
                self.secure(&field, el, None)?;
                self.input("text", &html_name, &attrs)?
            }
            ElementType::Password => {
                self.secure(&field, el, None)?;
                self.input("password", &html_name, &attrs)?
            }
            ElementType::Textarea { rows } => {
                attrs.insert("rows".to_string(), rows.to_string().into());
                self.secure(&field, el, None)?;
                let value = html_escape(el.default_value.as_deref().unwrap_or_default());
                self.renderer.render(
                    "textarea",
                    &[
                        ("name", &html_name),
                        ("value", &value),
                        ("attrs", &format_attributes(&attrs, &[])),
                    ],
                )?
            }
            ElementType::Hidden => {
                let value = el.default_value.clone().unwrap_or_default();
                attrs.insert("value".to_string(), value.as_str().into());
                self.secure(&field, el, Some(&value))?;
                // Hidden inputs are not wrapped or labelled.
                return self.input("hidden", &html_name, &attrs);
            }
            ElementType::Checkbox => {
                let checked = el.default_value.as_deref() == Some("1");
                attrs.insert("checked".to_string(), checked.into());
                self.secure(&field, el, None)?;
                let mut out = String::new();
                if !el.disabled {
                    out.push_str(&self.hidden_companion(&html_name, "0")?);
                }
                out.push_str(&self.renderer.render(
                    "checkbox",
                    &[
                        ("name", &html_name),
                        ("value", "1"),
                        ("attrs", &format_attributes(&attrs, &[])),
                    ],
                )?);
                out
            }
            ElementType::Checkboxes { options } => {
                self.secure(&field, el, None)?;
                self.choice_group("checkbox", &field, el, options, &format!("{html_name}[]"))?
            }
            ElementType::Radio { options } => {
                self.secure(&field, el, None)?;
                self.choice_group("radio", &field, el, options, &html_name)?
            }
            ElementType::Select {
                options,
                multiple,
                empty,
            } => self.select(&field, el, &attrs, options, *multiple, empty.as_deref())?,
            ElementType::Submit { value, named } => {
                attrs.insert("value".to_string(), value.as_str().into());
                if *named {
                    attrs.insert("name".to_string(), html_name.as_str().into());
                    self.guard.unlock_field(&field.path())?;
                }
                return self.renderer.render(
                    "inputSubmit",
                    &[("type", "submit"), ("attrs", &format_attributes(&attrs, &[]))],
                );
            }
            ElementType::ImageSubmit { src, named } => {
                attrs.insert("src".to_string(), src.as_str().into());
                // Browsers post the click coordinates rather than the button itself.
                if *named {
                    attrs.insert("name".to_string(), html_name.as_str().into());
                    let path = field.path();
                    self.guard.unlock_field(&format!("{path}.x"))?;
                    self.guard.unlock_field(&format!("{path}.y"))?;
                } else {
                    self.guard.unlock_field("x")?;
                    self.guard.unlock_field("y")?;
                }
                return self.renderer.render(
                    "inputSubmit",
                    &[("type", "image"), ("attrs", &format_attributes(&attrs, &[]))],
                );
            }
            ElementType::Button { text, named } => {
                attrs
                    .entry("type".to_string())
                    .or_insert_with(|| "submit".into());
                if *named {
                    attrs.insert("name".to_string(), html_name.as_str().into());
                    self.guard.unlock_field(&field.path())?;
                }
                return self.renderer.render(
                    "button",
                    &[
                        ("text", &html_escape(text)),
                        ("attrs", &format_attributes(&attrs, &[])),
                    ],
                );
            }
            ElementType::Fieldset => {
                let mut content = String::new();
                if let Some(title) = &el.title {
                    content.push_str(
                        &self
                            .renderer
                            .render("legend", &[("text", &html_escape(title))])?,
                    );
                }
                let mut children: Vec<_> = el.children.iter().collect();
                children.sort_by_key(|(_, child)| child.weight);
                for (child_name, child) in children {
                    content.push_str(&self.element(child_name, child)?);
                }
                attrs.remove("id");
                return self.renderer.render(
                    "fieldset",
                    &[
                        ("content", &content),
                        ("attrs", &format_attributes(&attrs, &[])),
                    ],
                );
            }
            ElementType::Markup { value } => return Ok(value.clone()),
        };

        let label = match &el.title {
            Some(title) => {
                let mut label_attrs = Attributes::new();
                label_attrs.insert("for".to_string(), dom_id(&field).into());
                self.renderer.render(
                    "label",
                    &[
                        ("text", &html_escape(title)),
                        ("attrs", &format_attributes(&label_attrs, &[])),
                    ],
                )?
            }
            None => String::new(),
        };

        self.renderer.render(
            "inputContainer",
            &[
                ("type", el.element_type.type_name()),
                ("required", if el.required { " required" } else { "" }),
                ("content", &format!("{label}{input}")),
            ],
        )
    }

    /// Record a field with the guard according to the element's flags.
    fn secure(
        &mut self,
        field: &FieldName,
        el: &FormElement,
        value: Option<&str>,
    ) -> HelperResult<()> {
        let mut options = match (el.unlocked, value) {
            (true, _) => FieldOptions::unlocked(),
            (false, Some(value)) => FieldOptions::hidden(value),
            (false, None) => FieldOptions::locked(),
        };
        if el.disabled {
            options = options.disabled();
        }
        self.guard.register_field(&field.path(), options)
    }

    fn input(&self, kind: &str, name: &str, attrs: &Attributes) -> HelperResult<String> {
        self.renderer.render(
            "input",
            &[
                ("type", kind),
                ("name", name),
                ("attrs", &format_attributes(attrs, &[])),
            ],
        )
    }

    /// Empty hidden input that makes the group name round-trip when nothing
    /// is selected.
    fn hidden_companion(&self, name: &str, value: &str) -> HelperResult<String> {
        let mut attrs = Attributes::new();
        attrs.insert("value".to_string(), value.into());
        self.input("hidden", name, &attrs)
    }

    fn choice_group(
        &self,
        kind: &str,
        field: &FieldName,
        el: &FormElement,
        options: &[(String, String)],
        input_name: &str,
    ) -> HelperResult<String> {
        let group_name = html_name(field);
        let mut out = String::new();
        if !el.disabled {
            out.push_str(&self.hidden_companion(&group_name, "")?);
        }

        let selected = el.default_value.as_deref();
        for (i, (value, text)) in options.iter().enumerate() {
            let mut attrs = Attributes::new();
            attrs.insert("id".to_string(), format!("{}-{i}", dom_id(field)).into());
            attrs.insert("checked".to_string(), (selected == Some(value.as_str())).into());
            attrs.insert("disabled".to_string(), el.disabled.into());
            let input = self.renderer.render(
                kind,
                &[
                    ("name", input_name),
                    ("value", &html_escape(value)),
                    ("attrs", &format_attributes(&attrs, &[])),
                ],
            )?;
            out.push_str(&self.renderer.render(
                "nestingLabel",
                &[("input", &input), ("text", &html_escape(text))],
            )?);
        }
        Ok(out)
    }

    fn select(
        &mut self,
        field: &FieldName,
        el: &FormElement,
        attrs: &Attributes,
        options: &[(String, String)],
        multiple: bool,
        empty: Option<&str>,
    ) -> HelperResult<String> {
        let html_name = html_name(field);
        let selected = el.default_value.as_deref();

        let mut content = String::new();
        if let Some(text) = empty {
            content.push_str(&self.option("", text, false)?);
        }
        for (value, text) in options {
            content.push_str(&self.option(value, text, selected == Some(value.as_str()))?);
        }

        let attrs = format_attributes(attrs, &[]);
        if !multiple {
            self.secure(field, el, None)?;
            return self
                .renderer
                .render("select", &[("name", &html_name), ("content", &content), ("attrs", &attrs)]);
        }

        // A multi-select with nothing to choose never submits its name, so it
        // is neither secured nor given a companion input.
        let has_options = !options.is_empty() || empty.is_some();
        let mut out = String::new();
        if has_options {
            self.secure(field, el, None)?;
            if !el.disabled {
                out.push_str(&self.hidden_companion(&html_name, "")?);
            }
        }
        out.push_str(&self.renderer.render(
            "selectMultiple",
            &[("name", &html_name), ("content", &content), ("attrs", &attrs)],
        )?);
        Ok(out)
    }

    fn option(&self, value: &str, text: &str, selected: bool) -> HelperResult<String> {
        let mut attrs = Attributes::new();
        attrs.insert("selected".to_string(), selected.into());
        self.renderer.render(
            "option",
            &[
                ("value", &html_escape(value)),
                ("text", &html_escape(text)),
                ("attrs", &format_attributes(&attrs, &[])),
            ],
        )
    }
}

fn to_attributes(raw: &std::collections::BTreeMap<String, String>) -> Attributes {
    raw.iter()
        .map(|(k, v)| (k.clone(), AttrValue::from(v.as_str())))
        .collect()
}

fn base_attributes(field: &FieldName, el: &FormElement) -> Attributes {
    let mut attrs = to_attributes(&el.attributes);
    attrs
        .entry("id".to_string())
        .or_insert_with(|| dom_id(field).into());
    if el.required {
        attrs.insert("required".to_string(), true.into());
    }
    if el.disabled {
        attrs.insert("disabled".to_string(), true.into());
    }
    if let Some(placeholder) = &el.placeholder {
        attrs.insert("placeholder".to_string(), placeholder.as_str().into());
    }
    attrs
}

/// Bracket-notation input name: `Article.tags.0` → `Article[tags][0]`.
fn html_name(field: &FieldName) -> String {
    let mut segments = field.segments().iter();
    let mut out = segments.next().cloned().unwrap_or_default();
    for segment in segments {
        out.push('[');
        out.push_str(segment);
        out.push(']');
    }
    out
}

/// DOM id: `Article.tags` → `article-tags`.
fn dom_id(field: &FieldName) -> String {
    field
        .segments()
        .iter()
        .map(|s| s.to_lowercase().replace(' ', "-"))
        .collect::<Vec<_>>()
        .join("-")
}
