use darling::FromMeta;
use proc_macro2::TokenStream;
use syn::parse::Parser;
use syn::{parse_macro_input, parse_quote, AttributeArgs, ItemStruct, Path};

use self::{request::expand_request, response::expand_response};

mod request;
mod response;

#[derive(Debug, FromMeta)]
struct MacroArgs {
    identity: String,

    module: Module,

    #[darling(default)]
    crates: Crates,
}

#[derive(Debug, Clone, Copy, FromMeta)]
enum Module {
    Config,
    Naming,
    Internal,
}

impl Module {
    fn as_str(&self) -> &'static str {
        match self {
            Module::Config => "config",
            Module::Naming => "naming",
            Module::Internal => "internal",
        }
    }
}

#[derive(Debug, FromMeta)]
struct Crates {
    #[darling(default = "Self::default_serde")]
    serde: Path,

    #[darling(default = "Self::default_std")]
    std: Path,
}

impl Default for Crates {
    fn default() -> Self {
        Self {
            serde: Self::default_serde(),
            std: Self::default_std(),
        }
    }
}

impl Crates {
    fn default_serde() -> Path {
        parse_quote! { ::serde }
    }

    fn default_std() -> Path {
        parse_quote! { ::std }
    }
}

/// Appends named fields to a braced struct. Tuple and unit structs are rejected
/// with a compile error at the call site.
fn push_fields(item_struct: &mut ItemStruct, new_fields: Vec<TokenStream>) -> syn::Result<()> {
    let fields = match item_struct.fields {
        syn::Fields::Named(ref mut fields) => fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &item_struct.ident,
                "remote messages must be structs with named fields",
            ))
        }
    };
    for tokens in new_fields {
        fields.named.push(syn::Field::parse_named.parse2(tokens)?);
    }
    Ok(())
}

/// Derives shared by every message. `serde(default)` lets a peer omit any
/// field, so every appended and user field must implement `Default`.
fn message_derives(item_struct: &mut ItemStruct, serde: &Path) {
    let derive_paths: Vec<Path> = vec![
        parse_quote! { #serde::Deserialize },
        parse_quote! { #serde::Serialize },
        parse_quote! { Clone },
        parse_quote! { Debug },
        parse_quote! { Default },
    ];
    item_struct.attrs.push(parse_quote! {
        #[derive(#(#derive_paths),*)]
    });
    item_struct.attrs.push(parse_quote! {
        #[serde(rename_all = "camelCase", default)]
    });
}

fn parse_args(args: AttributeArgs) -> Result<MacroArgs, proc_macro::TokenStream> {
    MacroArgs::from_list(&args).map_err(|e| e.write_errors().into())
}

pub(crate) fn request(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let item_struct = parse_macro_input!(input as ItemStruct);
    let attr_args = parse_macro_input!(args as AttributeArgs);
    let macro_args = match parse_args(attr_args) {
        Ok(macro_args) => macro_args,
        Err(errors) => return errors,
    };

    expand_request(macro_args, item_struct)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

pub(crate) fn response(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let item_struct = parse_macro_input!(input as ItemStruct);
    let attr_args = parse_macro_input!(args as AttributeArgs);
    let macro_args = match parse_args(attr_args) {
        Ok(macro_args) => macro_args,
        Err(errors) => return errors,
    };

    expand_response(macro_args, item_struct)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

#[cfg(test)]
mod tests {
    use quote::{quote, ToTokens};
    use syn::{parse_quote, AttributeArgs, ItemStruct};

    use super::*;

    #[test]
    fn test_parse_args() {
        let args: AttributeArgs = vec![
            parse_quote!(identity = "ConfigQueryRequest"),
            parse_quote!(module = "config"),
        ];
        let macro_args = MacroArgs::from_list(&args).unwrap();
        assert_eq!(macro_args.identity, "ConfigQueryRequest");
        assert_eq!(macro_args.module.as_str(), "config");
    }

    #[test]
    fn test_expand_naming_request() {
        let item: ItemStruct = parse_quote! {
            pub(crate) struct InstanceRequest {
                pub r#type: String,
            }
        };
        let args: AttributeArgs = vec![
            parse_quote!(identity = "InstanceRequest"),
            parse_quote!(module = "naming"),
        ];
        let macro_args = MacroArgs::from_list(&args).unwrap();
        let expanded = request::expand_request(macro_args, item)
            .unwrap()
            .to_string();

        assert!(expanded.contains("service_name"));
        assert!(expanded.contains("group_name"));
        assert!(expanded.contains("RequestMessage"));
    }

    #[test]
    fn test_tuple_struct_rejected() {
        let mut item: ItemStruct = parse_quote! {
            struct Broken(String);
        };
        let ret = push_fields(&mut item, vec![quote! { pub a: String }]);
        assert!(ret.is_err());
        assert!(item.into_token_stream().to_string().contains("Broken"));
    }
}
