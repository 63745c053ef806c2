use proc_macro2::TokenStream;
use quote::quote;
use syn::ItemStruct;

use super::{message_derives, push_fields, Crates, MacroArgs, Module};

pub(super) fn expand_request(
    macro_args: MacroArgs,
    mut item_struct: ItemStruct,
) -> syn::Result<TokenStream> {
    let MacroArgs {
        identity,
        module,
        crates,
    } = macro_args;
    let Crates { serde, std } = crates;
    let module_name = module.as_str();
    let name = item_struct.ident.clone();

    let mut fields = vec![
        quote! { pub headers: #std::collections::HashMap<String, String> },
        quote! { pub request_id: Option<String> },
    ];
    fields.extend(routing_fields(module));
    push_fields(&mut item_struct, fields)?;
    message_derives(&mut item_struct, &serde);

    let (impl_generics, ty_generics, where_clause) = item_struct.generics.split_for_impl();

    Ok(quote! {
        #item_struct

        impl #impl_generics crate::common::remote::message::MessageData for #name #ty_generics #where_clause {
            fn identity<'a>() -> #std::borrow::Cow<'a, str> {
                #identity.into()
            }
        }

        impl #impl_generics crate::common::remote::message::RequestMessage for #name #ty_generics #where_clause {
            fn header(&self, key: &str) -> Option<&String> {
                self.headers.get(key)
            }

            fn headers(&self) -> &#std::collections::HashMap<String, String> {
                &self.headers
            }

            fn take_headers(&mut self) -> #std::collections::HashMap<String, String> {
                #std::mem::take(&mut self.headers)
            }

            fn add_headers(&mut self, map: #std::collections::HashMap<String, String>) {
                self.headers.extend(map);
            }

            fn request_id(&self) -> Option<&String> {
                self.request_id.as_ref()
            }

            fn set_request_id(&mut self, request_id: String) {
                self.request_id = Some(request_id);
            }

            fn module(&self) -> &str {
                #module_name
            }
        }
    })
}

/// Fields the server routes a request by, per module.
fn routing_fields(module: Module) -> Vec<TokenStream> {
    match module {
        Module::Config => vec![
            quote! {
                #[serde(rename = "tenant")]
                pub namespace: Option<String>
            },
            quote! { pub data_id: Option<String> },
            quote! { pub group: Option<String> },
        ],
        Module::Naming => vec![
            quote! { pub namespace: Option<String> },
            quote! { pub service_name: Option<String> },
            quote! { pub group_name: Option<String> },
        ],
        Module::Internal => Vec::new(),
    }
}
