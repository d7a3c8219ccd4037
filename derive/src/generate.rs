//! Code generation for `#[derive(Record)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_quote, Data, DeriveInput, Fields, GenericParam, Generics, Index};

use crate::attrs::FieldAttrs;

/// Expand the derive for one struct into the three trait impls.
pub(crate) fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let record_name = name.unraw().to_string();

    let fields = match &input.data {
        Data::Struct(data) => &data.fields,
        Data::Enum(data) => {
            return Err(syn::Error::new(
                data.enum_token.span,
                "Record can only be derived for structs",
            ))
        }
        Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span,
                "Record can only be derived for structs",
            ))
        }
    };

    let descriptors = field_descriptors(fields)?;

    let generics = add_inspect_bounds(input.generics.clone());
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::ruleconf::Record for #name #ty_generics #where_clause {
            fn fields(&self) -> ::std::vec::Vec<::ruleconf::FieldDescriptor<'_>> {
                ::std::vec![#(#descriptors),*]
            }

            fn record_name(&self) -> &'static str {
                #record_name
            }
        }

        impl #impl_generics ::ruleconf::Inspect for #name #ty_generics #where_clause {
            fn inspect(&self) -> ::ruleconf::FieldValue<'_> {
                ::ruleconf::FieldValue::Record(self)
            }
        }

        impl #impl_generics ::ruleconf::Referent for #name #ty_generics #where_clause {
            fn with_record(&self, visit: &mut dyn ::std::ops::FnMut(&dyn ::ruleconf::Record)) {
                visit(self)
            }
        }
    })
}

/// One `FieldDescriptor::new(..)` expression per non-skipped field.
fn field_descriptors(fields: &Fields) -> syn::Result<Vec<TokenStream>> {
    let mut out = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let attrs = FieldAttrs::from_attributes(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let tag = attrs.tag();

        let (label, access) = match &field.ident {
            Some(ident) => (ident.unraw().to_string(), quote!(#ident)),
            None => {
                let idx = Index::from(index);
                (index.to_string(), quote!(#idx))
            }
        };

        out.push(quote! {
            ::ruleconf::FieldDescriptor::new(#label, #tag, &self.#access)
        });
    }

    Ok(out)
}

/// Every type parameter must itself be inspectable for the field views to exist.
fn add_inspect_bounds(mut generics: Generics) -> Generics {
    for param in &mut generics.params {
        if let GenericParam::Type(ty) = param {
            ty.bounds.push(parse_quote!(::ruleconf::Inspect));
        }
    }
    generics
}
