//! Form-style input: every key maps to one or more submitted values.

use std::collections::HashMap;

use crate::error::{BlockError, Result};

pub type Input = HashMap<String, Vec<String>>;

/// First value submitted for `key`.
pub fn first<'a>(input: &'a Input, key: &str) -> Option<&'a str> {
    input.get(key).and_then(|values| values.first()).map(String::as_str)
}

/// All values submitted for `key`, empty when absent.
pub fn all<'a>(input: &'a Input, key: &str) -> &'a [String] {
    input.get(key).map(Vec::as_slice).unwrap_or(&[])
}

/// Checkbox-style flag.
pub fn flag(input: &Input, key: &str) -> bool {
    matches!(first(input, key), Some("on" | "true"))
}

/// Parse the `points` field. `None` when absent or blank.
pub fn points(input: &Input) -> Result<Option<i32>> {
    match first(input, "points").map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| BlockError::InvalidInput("points must be an integer".to_string())),
    }
}

/// Build an [`Input`] from key/value pairs. Repeated keys accumulate.
pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Input
where
    K: Into<String>,
    V: Into<String>,
{
    let mut input = Input::new();
    for (key, value) in pairs {
        input.entry(key.into()).or_default().push(value.into());
    }
    input
}
