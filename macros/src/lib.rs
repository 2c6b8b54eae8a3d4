//! Procedural macros for testing lora-sim-radio.
//!
//! This crate provides the `#[sim_test]` attribute macro: a `#[test]` that
//! also installs `env_logger` in test mode, so the radio's `log` output is
//! captured alongside each test.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Mark a function as a simulator test.
///
/// Tests can either:
/// - Return nothing (panics indicate failure)
/// - Return `Result<(), E>` where `E: Debug` (Err indicates failure)
///
/// The attribute takes no arguments:
///
/// ```compile_fail
/// use lora_sim_radio_macros::sim_test;
///
/// #[sim_test(should_panic)]
/// fn rejected() {}
/// ```
///
/// # Example
///
/// ```ignore
/// use lora_sim_radio_macros::sim_test;
///
/// #[sim_test]
/// fn airtime_is_positive() {
///     assert!(2 + 2 == 4);
/// }
///
/// #[sim_test]
/// fn parsing_works() -> Result<(), Box<dyn std::error::Error>> {
///     let value: i32 = "42".parse()?;
///     assert_eq!(value, 42);
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn sim_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new_spanned(proc_macro2::TokenStream::from(attr), "sim_test takes no arguments")
            .to_compile_error()
            .into();
    }

    let input_fn = parse_macro_input!(item as ItemFn);

    let fn_name = &input_fn.sig.ident;
    let fn_block = &input_fn.block;
    let fn_vis = &input_fn.vis;
    let fn_attrs = &input_fn.attrs;
    let fn_output = &input_fn.sig.output;

    let expanded = quote! {
        #(#fn_attrs)*
        #[test]
        #fn_vis fn #fn_name() #fn_output {
            let _ = ::env_logger::builder().is_test(true).try_init();
            #fn_block
        }
    };

    TokenStream::from(expanded)
}
