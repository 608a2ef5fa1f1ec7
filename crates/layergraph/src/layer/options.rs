use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One keyword option forwarded to `expr_for`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

/// Keyword options passed unchanged through every `output` call of a resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputOptions {
    values: BTreeMap<String, OptionValue>,
}

impl OutputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from a JSON object such as `{"deterministic": true}`.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(OptionValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// The conventional `deterministic` flag (disables stochastic behaviour); `false` if unset.
    pub fn deterministic(&self) -> bool {
        self.get_bool("deterministic").unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_options() {
        let options =
            OutputOptions::from_json(r#"{"deterministic": true, "p": 0.5, "mode": "eval"}"#)
                .unwrap();
        assert!(options.deterministic());
        assert_eq!(options.get("p"), Some(&OptionValue::Float(0.5)));
        assert_eq!(options.get("mode"), Some(&OptionValue::Str("eval".into())));
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn unset_flags_default_to_false() {
        let options = OutputOptions::new().with("deterministic", 1i64);
        assert!(!options.deterministic());
        assert_eq!(options.get_bool("deterministic"), None);
    }
}
