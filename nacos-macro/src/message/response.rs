use proc_macro2::TokenStream;
use quote::quote;
use syn::ItemStruct;

use super::{message_derives, push_fields, Crates, MacroArgs};

const SUCCESS_RESPONSE: (i32, &str) = (200, "Response ok");
const FAIL_RESPONSE: (i32, &str) = (500, "Response fail");

pub(super) fn expand_response(
    macro_args: MacroArgs,
    mut item_struct: ItemStruct,
) -> syn::Result<TokenStream> {
    let MacroArgs {
        identity, crates, ..
    } = macro_args;
    let Crates { serde, std } = crates;
    let name = item_struct.ident.clone();

    push_fields(
        &mut item_struct,
        vec![
            quote! { pub result_code: i32 },
            quote! { pub error_code: i32 },
            quote! { pub message: Option<String> },
            quote! { pub request_id: Option<String> },
        ],
    )?;
    message_derives(&mut item_struct, &serde);

    let (success_code, success_message) = SUCCESS_RESPONSE;
    let (fail_code, fail_message) = FAIL_RESPONSE;

    Ok(quote! {
        #item_struct

        impl #name {
            pub(crate) fn ok() -> Self {
                #name {
                    result_code: #success_code,
                    message: Some(#success_message.to_owned()),
                    ..Default::default()
                }
            }

            #[allow(dead_code)]
            pub(crate) fn fail(error_code: i32, message: impl Into<String>) -> Self {
                let message: String = message.into();
                #name {
                    result_code: #fail_code,
                    error_code,
                    message: Some(if message.is_empty() { #fail_message.to_owned() } else { message }),
                    ..Default::default()
                }
            }
        }

        impl crate::common::remote::message::MessageData for #name {
            fn identity<'a>() -> #std::borrow::Cow<'a, str> {
                #identity.into()
            }
        }

        impl crate::common::remote::message::ResponseMessage for #name {
            fn request_id(&self) -> Option<&String> {
                self.request_id.as_ref()
            }

            fn set_request_id(&mut self, request_id: String) {
                self.request_id = Some(request_id);
            }

            fn result_code(&self) -> i32 {
                self.result_code
            }

            fn error_code(&self) -> i32 {
                self.error_code
            }

            fn message(&self) -> Option<&String> {
                self.message.as_ref()
            }

            fn is_success(&self) -> bool {
                self.result_code == #success_code
            }
        }
    })
}
