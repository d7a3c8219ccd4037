//! Derive macro for `ruleconf` records.
//!
//! `#[derive(Record)]` implements `ruleconf::Record`, `ruleconf::Inspect` and
//! `ruleconf::Referent` for a struct, exposing its fields in declaration order
//! together with the rule tag attached through `#[validate(...)]`.
//!
//! ```rust,ignore
//! use ruleconf::Record;
//!
//! #[derive(Record, serde::Deserialize)]
//! struct Server {
//!     #[validate("required,min=1,max=65535")]
//!     port: u16,
//!
//!     #[validate("oneof=dev|prod|test")]
//!     env: String,
//!
//!     #[validate(skip)]
//!     scratch: Vec<u8>,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod generate;

/// Derives `Record`, `Inspect` and `Referent` for a struct.
///
/// # Attributes
///
/// - `#[validate("rule,rule=param")]` - comma-separated rule expressions.
///   Repeating the attribute appends to the list.
/// - `#[validate(skip)]` - leave the field out of validation entirely.
///
/// Fields without an attribute are still traversed, so nested records and
/// references inside them are validated.
#[proc_macro_derive(Record, attributes(validate))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match generate::expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
