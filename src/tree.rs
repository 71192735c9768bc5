use serde_json::Value;

/// A decoded object whose shape is only known from its typetree.
///
/// Objects keep their fields in serialization order.
pub type PropertyTree = Value;

/// Renders an identifier field as a mapping key: strings verbatim, numbers in decimal,
/// anything else as JSON.
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        other => other.to_string(),
    }
}

/// The top level fields of `tree`, empty if it isn't an object.
pub fn fields(tree: &PropertyTree) -> impl Iterator<Item = (&str, &Value)> {
    tree.as_object()
        .into_iter()
        .flat_map(|map| map.iter().map(|(key, value)| (key.as_str(), value)))
}

/// The JSON form of `value`, cut to at most `width` characters.
pub fn truncated(value: &Value, width: usize) -> String {
    value.to_string().chars().take(width).collect()
}
