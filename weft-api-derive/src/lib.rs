use darling::ast::NestedMeta;
use darling::FromMeta;
use proc_macro::TokenStream;
use proc_macro2::{Ident, Span};
use quote::quote;
use syn::{parse_macro_input, FnArg, ItemFn, ReturnType, Type};

mod common;

use common::{pascal_case, to_compile_error};

/// Options accepted by `#[deployable(...)]`
#[derive(Debug, Default, FromMeta)]
struct DeployableOptions {
    /// Catalog name; defaults to the function name
    #[darling(default)]
    name: Option<String>,
    /// Name of the generated type; defaults to `<PascalName>Fn`
    #[darling(default)]
    ident: Option<String>,
    /// Path the generated code reaches the contract through; defaults to `::weft_api`
    #[darling(default, rename = "crate")]
    krate: Option<syn::Path>,
}

/// Turns a free function into a `weft_api::Deployable`.
///
/// The function stays callable as before. Next to it the macro generates a
/// unit struct implementing `Deployable`, which can be placed into a function
/// catalog and deployed onto a pool.
///
/// # Requirements
///
/// - A free function, sync or `async`, without generics or a `self` receiver
/// - Every parameter is owned and implements `serde::de::DeserializeOwned`
/// - The return type implements `serde::Serialize`, or is a
///   `Result<T, E>` where `T: Serialize` and `E: Display`
/// - An `async` function's future must be `Send`
///
/// # Generated Items
///
/// ```ignore
/// # use weft_api::{deployable, Deployable};
/// #[deployable]
/// fn add(a: i64, b: i64) -> i64 {
///     a + b
/// }
///
/// // `AddFn` implements `Deployable`
/// assert_eq!(AddFn::NAME, "add");
/// assert_eq!(AddFn::ARITY, 2);
/// ```
///
/// # Options
///
/// ```ignore
/// # use weft_api::{deployable, Deployable};
/// #[deployable(name = "math.scale", ident = "Scale")]
/// async fn scale(values: Vec<f64>, factor: f64) -> Vec<f64> {
///     values.into_iter().map(|v| v * factor).collect()
/// }
///
/// assert_eq!(Scale::NAME, "math.scale");
/// ```
///
/// The generated impl names `::weft_api` items, so the calling crate needs
/// `weft-api` as a direct dependency. A crate that only depends on `weft`
/// points the macro at its re-exports instead:
///
/// ```ignore
/// #[weft::deployable(crate = "weft")]
/// fn double(x: i64) -> i64 {
///     x * 2
/// }
/// ```
///
/// # Runtime Behavior
///
/// `invoke` checks the argument count, decodes each argument from JSON and
/// runs the function. A wrong argument count, an argument that fails to
/// decode, or an `Err` returned by the function all become the error string of
/// the call.
#[proc_macro_attribute]
pub fn deployable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_args = match NestedMeta::parse_meta_list(attr.into()) {
        Ok(args) => args,
        Err(e) => return TokenStream::from(darling::Error::from(e).write_errors()),
    };
    let options = match DeployableOptions::from_list(&attr_args) {
        Ok(options) => options,
        Err(e) => return TokenStream::from(e.write_errors()),
    };

    let function = parse_macro_input!(item as ItemFn);

    if !function.sig.generics.params.is_empty() {
        return to_compile_error(syn::Error::new_spanned(
            &function.sig.generics,
            "deployable functions cannot be generic",
        ));
    }

    let mut bindings = Vec::new();
    let mut types: Vec<Type> = Vec::new();
    for (index, input) in function.sig.inputs.iter().enumerate() {
        match input {
            FnArg::Receiver(receiver) => {
                return to_compile_error(syn::Error::new_spanned(
                    receiver,
                    "deployable functions cannot take `self`",
                ));
            }
            FnArg::Typed(pat_type) => {
                bindings.push(Ident::new(&format!("__weft_arg{}", index), Span::call_site()));
                types.push((*pat_type.ty).clone());
            }
        }
    }

    let fn_ident = &function.sig.ident;
    let vis = &function.vis;
    let fn_name = fn_ident.to_string();
    let fn_name = fn_name.strip_prefix("r#").unwrap_or(&fn_name);
    let name = options.name.unwrap_or_else(|| fn_name.to_string());
    let type_ident = Ident::new(
        &options
            .ident
            .unwrap_or_else(|| format!("{}Fn", pascal_case(fn_name))),
        Span::call_site(),
    );
    let krate = options
        .krate
        .unwrap_or_else(|| syn::parse_quote!(::weft_api));
    let arity = bindings.len();
    let positions: Vec<usize> = (1..=arity).collect();

    let await_tokens = if function.sig.asyncness.is_some() {
        quote! { .await }
    } else {
        quote! {}
    };

    let convert = match &function.sig.output {
        ReturnType::Default => quote! {
            let _ = output;
            ::std::result::Result::Ok(#krate::Value::Null)
        },
        ReturnType::Type(_, ty) if returns_result(ty) => quote! {
            match output {
                ::std::result::Result::Ok(value) => #krate::__private::serde_json::to_value(value)
                    .map_err(|e| ::std::format!("{}: result could not be encoded: {}", #name, e)),
                ::std::result::Result::Err(error) => ::std::result::Result::Err(error.to_string()),
            }
        },
        ReturnType::Type(..) => quote! {
            #krate::__private::serde_json::to_value(output)
                .map_err(|e| ::std::format!("{}: result could not be encoded: {}", #name, e))
        },
    };

    let expanded = quote! {
        #function

        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #type_ident;

        impl #krate::Deployable for #type_ident {
            const NAME: &'static str = #name;
            const ARITY: usize = #arity;

            fn invoke(
                args: ::std::vec::Vec<#krate::Value>,
            ) -> #krate::BoxedFuture<'static, ::std::result::Result<#krate::Value, ::std::string::String>> {
                ::std::boxed::Box::pin(async move {
                    if args.len() != #arity {
                        return ::std::result::Result::Err(::std::format!(
                            "{} expects {} argument(s), got {}",
                            #name,
                            #arity,
                            args.len()
                        ));
                    }
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args.into_iter();
                    #(
                        let #bindings: #types = #krate::__private::serde_json::from_value(
                            args.next().unwrap_or(#krate::Value::Null),
                        )
                        .map_err(|e| ::std::format!("{}: argument {} is invalid: {}", #name, #positions, e))?;
                    )*
                    let output = #fn_ident(#(#bindings),*) #await_tokens;
                    #convert
                })
            }
        }
    };

    TokenStream::from(expanded)
}

/// Whether the declared return type is spelled `Result<..>` (any path ending in `Result`)
fn returns_result(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident == "Result")
            .unwrap_or(false),
        _ => false,
    }
}
