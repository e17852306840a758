use std::collections::HashMap;

use serde_json::Value;

use super::RpcError;

/// Request parameters, either JSON-RPC positional arrays (POST) or
/// query-string maps (GET). Every accessor takes both the positional index
/// and the parameter name so each method documents its own mapping.
pub(super) enum RequestParams {
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl RequestParams {
    pub(super) fn from_value(params: Value) -> Result<Self, RpcError> {
        match params {
            Value::Null => Ok(Self::Positional(Vec::new())),
            Value::Array(values) => Ok(Self::Positional(values)),
            Value::Object(map) => Ok(Self::Named(map.into_iter().collect())),
            _ => Err(RpcError::invalid_params(
                "params must be an array or an object",
            )),
        }
    }

    pub(super) fn from_query(query: HashMap<String, String>) -> Self {
        Self::Named(
            query
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        )
    }

    fn get(&self, index: usize, name: &str) -> Option<&Value> {
        match self {
            Self::Positional(values) => values.get(index),
            Self::Named(map) => map.get(name),
        }
    }

    pub(super) fn opt_string(&self, index: usize, name: &str) -> Result<Option<String>, RpcError> {
        match self.get(index, name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(RpcError::invalid_params(format!(
                "parameter `{name}` must be a string"
            ))),
        }
    }

    pub(super) fn require_string(&self, index: usize, name: &str) -> Result<String, RpcError> {
        self.opt_string(index, name)?.ok_or_else(|| {
            RpcError::invalid_params(format!("missing required parameter `{name}`"))
        })
    }

    /// Integers arrive as JSON numbers over POST and as strings over GET;
    /// both are accepted everywhere. An empty string counts as absent.
    pub(super) fn opt_i64(&self, index: usize, name: &str) -> Result<Option<i64>, RpcError> {
        match self.get(index, name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(value)) => value.as_i64().map(Some).ok_or_else(|| {
                RpcError::invalid_params(format!("parameter `{name}` must be an integer"))
            }),
            Some(Value::String(value)) if value.is_empty() => Ok(None),
            Some(Value::String(value)) => value.parse().map(Some).map_err(|_| {
                RpcError::invalid_params(format!("parameter `{name}` must be an integer"))
            }),
            Some(_) => Err(RpcError::invalid_params(format!(
                "parameter `{name}` must be an integer"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn positional_params_resolve_by_index() {
        let params = RequestParams::from_value(json!(["a=1", 2])).unwrap();
        assert_eq!(params.require_string(0, "tx").unwrap(), "a=1");
        assert_eq!(params.opt_i64(1, "height").unwrap(), Some(2));
        assert_eq!(params.opt_i64(2, "page").unwrap(), None);
    }

    #[test]
    fn named_params_resolve_by_name() {
        let params = RequestParams::from_value(json!({"height": 3})).unwrap();
        assert_eq!(params.opt_i64(0, "height").unwrap(), Some(3));
    }

    #[test]
    fn query_strings_parse_integers() {
        let query = HashMap::from([
            ("height".to_string(), "7".to_string()),
            ("page".to_string(), String::new()),
        ]);
        let params = RequestParams::from_query(query);
        assert_eq!(params.opt_i64(0, "height").unwrap(), Some(7));
        assert_eq!(params.opt_i64(1, "page").unwrap(), None);
    }

    #[test]
    fn null_params_are_an_empty_positional_list() {
        let params = RequestParams::from_value(Value::Null).unwrap();
        assert_eq!(params.opt_string(0, "tx").unwrap(), None);
    }

    #[test]
    fn scalar_params_are_rejected() {
        assert!(RequestParams::from_value(json!(42)).is_err());
    }

    #[test]
    fn type_mismatches_are_invalid_params() {
        let params = RequestParams::from_value(json!([true])).unwrap();
        assert!(params.opt_string(0, "tx").is_err());
        assert!(params.opt_i64(0, "height").is_err());
    }
}
