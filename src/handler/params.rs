//! Event parameters and helpers for reading them.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::HandlerError;

/// Decoded event parameters: every top-level payload field except
/// `event_name`.
pub type Params = Map<String, Value>;

/// Typed accessors over [`Params`] that produce [`HandlerError`]s.
///
/// ```
/// use event_relay::{HandlerError, Params, ParamsExt};
/// use serde_json::json;
///
/// let params: Params = serde_json::from_value(json!({ "title": "Hi", "tags": ["a"] })).unwrap();
/// assert_eq!(params.require_str("title").unwrap(), "Hi");
/// assert_eq!(params.optional_str_list("tags").unwrap(), Some(vec!["a".to_string()]));
/// assert!(matches!(params.require_str("content"), Err(HandlerError::MissingField(_))));
/// ```
pub trait ParamsExt {
    /// A parameter that must be present and a string.
    fn require_str(&self, key: &str) -> Result<&str, HandlerError>;

    /// A parameter that may be absent but, when present, must be a list of
    /// strings.
    fn optional_str_list(&self, key: &str) -> Result<Option<Vec<String>>, HandlerError>;

    /// Check that every key is present.
    fn require_fields(&self, keys: &[&str]) -> Result<(), HandlerError>;
}

impl ParamsExt for Params {
    fn require_str(&self, key: &str) -> Result<&str, HandlerError> {
        self.get(key)
            .ok_or_else(|| HandlerError::MissingField(key.to_string()))?
            .as_str()
            .ok_or_else(|| HandlerError::wrong_type(key, "string"))
    }

    fn optional_str_list(&self, key: &str) -> Result<Option<Vec<String>>, HandlerError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        let items = value
            .as_array()
            .ok_or_else(|| HandlerError::wrong_type(key, "[]string"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| HandlerError::wrong_type(key, "[]string"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn require_fields(&self, keys: &[&str]) -> Result<(), HandlerError> {
        match keys.iter().find(|k| !self.contains_key(**k)) {
            Some(missing) => Err(HandlerError::MissingField(missing.to_string())),
            None => Ok(()),
        }
    }
}

/// Deserialize the parameters into a typed input struct.
pub fn decode<T: DeserializeOwned>(params: Params) -> Result<T, HandlerError> {
    Ok(serde_json::from_value(Value::Object(params))?)
}
