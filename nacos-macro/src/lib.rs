//! Attribute macros turning a plain struct into a remote message.
//!
//! `#[request(identity = "ConfigQueryRequest", module = "config")]` appends the
//! envelope fields (headers, request id, and the module routing fields) and
//! implements `MessageData` + `RequestMessage` of `crate::common::remote::message`.
//!
//! `#[response(identity = "ConfigQueryResponse", module = "config")]` appends
//! result/error codes, message and request id and implements `MessageData` +
//! `ResponseMessage`.

mod message;

#[proc_macro_attribute]
pub fn request(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    message::request(args, input)
}

#[proc_macro_attribute]
pub fn response(
    args: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    message::response(args, input)
}
