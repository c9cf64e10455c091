//! String templates and HTML attribute formatting.
//!
//! Provides the named-template renderer used by the form builder.

mod attributes;
mod template;

pub use attributes::{AttrValue, Attributes, format_attributes, html_escape};
pub use template::{TemplateRenderer, TemplateScope, form_templates};
