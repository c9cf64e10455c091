//! Form rendering and tamper protection.
//!
//! The form system supports:
//! - Declarative form definition with typed elements
//! - Field locking with an HMAC digest embedded as `_Token[...]` hidden fields
//! - Verification of submitted data against that digest
//! - Rendering through named string templates

mod builder;
mod field;
mod token;
mod types;

pub use builder::{FormBuilder, RenderedForm};
pub use field::FieldName;
pub use token::{
    FieldOptions, FieldTokenGuard, FormToken, Rejection, SubmittedData, TOKEN_DEBUG,
    TOKEN_FIELDS, TOKEN_UNLOCKED, TokenContext, Verification, canonical_url,
};
pub use types::{ElementType, Form, FormElement};
