//! Parsing of `#[validate(...)]` field attributes.

use syn::{Attribute, LitStr};

/// Validation settings collected from one field's attributes.
#[derive(Debug, Default)]
pub(crate) struct FieldAttrs {
    /// Rule expressions, in attribute order.
    pub rules: Vec<String>,
    pub skip: bool,
}

impl FieldAttrs {
    pub(crate) fn from_attributes(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut result = Self::default();

        for attr in attrs {
            if !attr.path().is_ident("validate") {
                continue;
            }

            attr.parse_args_with(|input: syn::parse::ParseStream<'_>| {
                if input.peek(LitStr) {
                    let tag: LitStr = input.parse()?;
                    let value = tag.value();
                    if value.trim().is_empty() {
                        return Err(syn::Error::new(tag.span(), "empty rule list"));
                    }
                    result.rules.push(value);
                    return Ok(());
                }

                let ident: syn::Ident = input.parse()?;
                if ident == "skip" {
                    result.skip = true;
                    Ok(())
                } else {
                    Err(syn::Error::new(
                        ident.span(),
                        "expected a rule string such as \"required,min=1\" or `skip`",
                    ))
                }
            })?;
        }

        Ok(result)
    }

    /// The combined tag as the runtime engine expects it.
    pub(crate) fn tag(&self) -> String {
        self.rules.join(",")
    }
}
