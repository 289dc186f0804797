mod model;

use proc_macro::TokenStream;
use syn::parse_macro_input;

// ============================================================================
// model! proc-macro
// ============================================================================

/// Declares a model type with typed field accessors.
///
/// # Usage
///
/// ```ignore
/// entity_store::model!(User {
///     name: String = "anonymous",
///     age: i64 = 0,
///     active: bool = false,
///     friend: User,
/// });
/// ```
///
/// This generates `pub struct User`, a typed handle around a shared record,
/// and implements `entity_store::ModelDefinition` for it with the type tag
/// `"User"`. Every declared field is part of the default state, holding its
/// declared default or `Null`.
///
/// For each field `x: T` the handle gets:
/// - `get_x() -> Option<T>`, or `is_x() -> bool` when `T` is `bool`
/// - `has_x() -> bool`, true when the field holds a truthy value
/// - `set_x(value: impl Into<T>) -> bool`, true when the value changed
///
/// Field types must implement `entity_store::FieldValue`. Model handles do, so
/// a field may hold another model directly.
#[proc_macro]
pub fn model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as model::ModelInput);
    TokenStream::from(model::expand(input))
}
