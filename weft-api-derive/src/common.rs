// Helpers shared by the macros in this crate

/// Convert a syn::Error to a TokenStream that can be returned from a proc_macro function
pub fn to_compile_error(error: syn::Error) -> proc_macro::TokenStream {
    error.to_compile_error().into()
}

/// `parse_frame` -> `ParseFrame`
pub fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
