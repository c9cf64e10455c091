//! Form and form element types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A complete form definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    /// Unique form identifier (e.g., "article_add_form").
    pub form_id: String,

    /// Unique build ID for this form instance.
    pub form_build_id: String,

    /// Form action URL.
    pub action: String,

    /// HTTP method ("post" or "get").
    pub method: String,

    /// Form elements keyed by input name.
    pub elements: BTreeMap<String, FormElement>,

    /// Field names excluded from tamper checking for this form only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlocked_fields: Vec<String>,

    /// Optional form title, rendered as a legend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Additional form attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Form {
    /// Create a new form with the given ID.
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            form_build_id: uuid::Uuid::new_v4().to_string(),
            action: String::new(),
            method: "post".to_string(),
            elements: BTreeMap::new(),
            unlocked_fields: Vec::new(),
            title: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Set the form action URL.
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Set the form method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Set the form title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add an element to the form.
    pub fn element(mut self, name: impl Into<String>, element: FormElement) -> Self {
        self.elements.insert(name.into(), element);
        self
    }

    /// Unlock a field for this form.
    pub fn unlock(mut self, name: impl Into<String>) -> Self {
        self.unlocked_fields.push(name.into());
        self
    }

    /// Set an attribute on the form tag.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Get elements sorted by weight.
    pub fn sorted_elements(&self) -> Vec<(&String, &FormElement)> {
        let mut elements: Vec<_> = self.elements.iter().collect();
        elements.sort_by_key(|(_, el)| el.weight);
        elements
    }
}

/// A form element definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormElement {
    /// Element type with type-specific configuration.
    #[serde(flatten)]
    pub element_type: ElementType,

    /// Element label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    /// Whether this field is required.
    #[serde(default)]
    pub required: bool,

    /// Sort weight (lower = appears first).
    #[serde(default)]
    pub weight: i32,

    /// Additional HTML attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Child elements (for fieldsets).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, FormElement>,

    /// Whether this element is disabled.
    #[serde(default)]
    pub disabled: bool,

    /// Whether the submitted value may change freely (excluded from tamper checks).
    #[serde(default)]
    pub unlocked: bool,

    /// Placeholder text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl FormElement {
    /// Create a textfield element.
    pub fn textfield() -> Self {
        Self::new(ElementType::Textfield { max_length: None })
    }

    /// Create a textarea element.
    pub fn textarea(rows: u32) -> Self {
        Self::new(ElementType::Textarea { rows })
    }

    /// Create a select element.
    pub fn select(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Select {
            options,
            multiple: false,
            empty: None,
        })
    }

    /// Create a multi-select element.
    pub fn multi_select(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Select {
            options,
            multiple: true,
            empty: None,
        })
    }

    /// Create a checkbox element.
    pub fn checkbox() -> Self {
        Self::new(ElementType::Checkbox)
    }

    /// Create a checkboxes group.
    pub fn checkboxes(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Checkboxes { options })
    }

    /// Create a radio button group.
    pub fn radio(options: Vec<(String, String)>) -> Self {
        Self::new(ElementType::Radio { options })
    }

    /// Create a hidden field with a fixed value.
    pub fn hidden(value: impl Into<String>) -> Self {
        Self::new(ElementType::Hidden).default_value(value)
    }

    /// Create a password field.
    pub fn password() -> Self {
        Self::new(ElementType::Password)
    }

    /// Create an anonymous submit button.
    pub fn submit(value: impl Into<String>) -> Self {
        Self::new(ElementType::Submit {
            value: value.into(),
            named: false,
        })
    }

    /// Create an anonymous image submit button.
    pub fn image_submit(src: impl Into<String>) -> Self {
        Self::new(ElementType::ImageSubmit {
            src: src.into(),
            named: false,
        })
    }

    /// Create an anonymous `<button>`.
    pub fn button(text: impl Into<String>) -> Self {
        Self::new(ElementType::Button {
            text: text.into(),
            named: false,
        })
    }

    /// Create a fieldset.
    pub fn fieldset() -> Self {
        Self::new(ElementType::Fieldset)
    }

    /// Create a markup element (display-only HTML).
    pub fn markup(value: impl Into<String>) -> Self {
        Self::new(ElementType::Markup {
            value: value.into(),
        })
    }

    /// Create a new element with the given type.
    fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            title: None,
            default_value: None,
            required: false,
            weight: 0,
            attributes: BTreeMap::new(),
            children: BTreeMap::new(),
            disabled: false,
            unlocked: false,
            placeholder: None,
        }
    }

    /// Set the element label.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the weight.
    pub fn weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Set placeholder text.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set max length for textfield.
    pub fn max_length(mut self, max: usize) -> Self {
        if let ElementType::Textfield { ref mut max_length } = self.element_type {
            *max_length = Some(max);
        }
        self
    }

    /// Add an empty placeholder option to a select.
    pub fn empty_option(mut self, text: impl Into<String>) -> Self {
        if let ElementType::Select { ref mut empty, .. } = self.element_type {
            *empty = Some(text.into());
        }
        self
    }

    /// Give a submit or button element a `name` attribute.
    pub fn named(mut self) -> Self {
        match self.element_type {
            ElementType::Submit { ref mut named, .. }
            | ElementType::ImageSubmit { ref mut named, .. }
            | ElementType::Button { ref mut named, .. } => *named = true,
            _ => {}
        }
        self
    }

    /// Set an HTML attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add a child element.
    pub fn child(mut self, name: impl Into<String>, element: FormElement) -> Self {
        self.children.insert(name.into(), element);
        self
    }

    /// Mark as disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Exclude from tamper checking.
    pub fn unlocked(mut self) -> Self {
        self.unlocked = true;
        self
    }
}

/// Element type variants with type-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementType {
    /// Single-line text input.
    Textfield {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },

    /// Multi-line text input.
    Textarea { rows: u32 },

    /// Dropdown select.
    Select {
        options: Vec<(String, String)>,
        #[serde(default)]
        multiple: bool,
        /// Text of a leading empty option.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        empty: Option<String>,
    },

    /// Single checkbox.
    Checkbox,

    /// Multiple checkboxes.
    Checkboxes { options: Vec<(String, String)> },

    /// Radio button group.
    Radio { options: Vec<(String, String)> },

    /// Hidden field.
    Hidden,

    /// Password field.
    Password,

    /// Submit input.
    Submit {
        value: String,
        #[serde(default)]
        named: bool,
    },

    /// Image submit input; browsers post click coordinates.
    ImageSubmit {
        src: String,
        #[serde(default)]
        named: bool,
    },

    /// `<button>` element.
    Button {
        text: String,
        #[serde(default)]
        named: bool,
    },

    /// Fieldset/group.
    Fieldset,

    /// Display-only markup.
    Markup { value: String },
}

impl ElementType {
    /// Get the type name as a string.
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementType::Textfield { .. } => "textfield",
            ElementType::Textarea { .. } => "textarea",
            ElementType::Select { .. } => "select",
            ElementType::Checkbox => "checkbox",
            ElementType::Checkboxes { .. } => "checkboxes",
            ElementType::Radio { .. } => "radio",
            ElementType::Hidden => "hidden",
            ElementType::Password => "password",
            ElementType::Submit { .. } => "submit",
            ElementType::ImageSubmit { .. } => "image_submit",
            ElementType::Button { .. } => "button",
            ElementType::Fieldset => "fieldset",
            ElementType::Markup { .. } => "markup",
        }
    }
}
