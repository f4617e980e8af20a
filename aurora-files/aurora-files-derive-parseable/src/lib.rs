extern crate proc_macro2;

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{Data, DeriveInput, Fields, Ident, parse_macro_input, spanned::Spanned};

/// Derives `Parseable` for structs whose on-disk representation is exactly
/// their field sequence, little-endian, no padding.
#[proc_macro_derive(Parse)]
pub fn derive_parseable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_parse_internal(input).into()
}

/// Derives `Writeable`, the mirror image of `Parse`: fields are emitted in
/// declaration order. A struct deriving both round-trips by construction.
#[proc_macro_derive(Emit)]
pub fn derive_writeable(item: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    derive_emit_internal(input).into()
}

fn resolve_crate_name() -> TokenStream {
    let found_crate = crate_name("aurora-files").expect("aurora-files is present in `Cargo.toml`");

    match found_crate {
        FoundCrate::Itself => quote!(crate),
        FoundCrate::Name(name) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(#ident)
        }
    }
}

fn named_fields(input: &DeriveInput) -> Vec<(&Option<Ident>, &syn::Type, Span)> {
    match input.data {
        Data::Struct(ref s) => match s.fields {
            Fields::Named(ref fields) => fields
                .named
                .iter()
                .map(|f| (&f.ident, &f.ty, f.span()))
                .collect(),
            _ => panic!(
                "#[derive(Parse)]/#[derive(Emit)] only supports named struct fields: {}",
                input.ident
            ),
        },
        _ => panic!(
            "`#[derive(Parse)]`/`#[derive(Emit)]` is only available on structs: {}",
            input.ident
        ),
    }
}

pub(crate) fn derive_parse_internal(input: DeriveInput) -> TokenStream {
    let crate_name = resolve_crate_name();
    let ident = input.ident.clone();

    let recurse = named_fields(&input).into_iter().map(|(name, ftype, span)| {
        quote_spanned! {span=>
            #name: <#ftype as #crate_name::common::reader::Parseable<#ftype>>::parse(rdr)?,
        }
    });

    quote!(
        impl #crate_name::common::reader::Parseable<#ident> for #ident {
            fn parse<R: std::io::Read>(rdr: &mut R) -> Result<#ident, #crate_name::ParserError> {
                Ok(#ident{
                    #(#recurse)*
                })
            }
        }
    )
}

pub(crate) fn derive_emit_internal(input: DeriveInput) -> TokenStream {
    let crate_name = resolve_crate_name();
    let ident = input.ident.clone();

    let recurse = named_fields(&input).into_iter().map(|(name, ftype, span)| {
        quote_spanned! {span=>
            <#ftype as #crate_name::common::writer::Writeable>::write(&self.#name, wrt)?;
        }
    });

    quote!(
        impl #crate_name::common::writer::Writeable for #ident {
            fn write<W: std::io::Write>(&self, wrt: &mut W) -> Result<(), #crate_name::ParserError> {
                #(#recurse)*
                Ok(())
            }
        }
    )
}
