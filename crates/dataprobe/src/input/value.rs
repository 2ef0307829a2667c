//! Scalar cell values delivered by the ingestion collaborator.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A single normalized cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(f64),
    /// Text value (may still hold numbers, dates or boolean-like words).
    Text(String),
}

impl Value {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Check if this value represents a missing/null value.
    ///
    /// Text counts as null when it is blank or equals one of `null_tokens`
    /// ignoring case.
    pub fn is_null(&self, null_tokens: &[String]) -> bool {
        match self {
            Value::Null => true,
            Value::Number(n) => n.is_nan(),
            Value::Bool(_) => false,
            Value::Text(s) => {
                let trimmed = s.trim();
                trimmed.is_empty() || null_tokens.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
            }
        }
    }

    /// Numeric reading of this value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Whether this value is a whole number.
    pub fn is_integer(&self) -> bool {
        match self {
            Value::Number(n) => n.is_finite() && n.fract() == 0.0,
            Value::Text(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        }
    }

    /// Whether this value reads as a boolean.
    pub fn is_boolean(&self) -> bool {
        match self {
            Value::Bool(_) => true,
            Value::Text(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "false" | "yes" | "no"
            ),
            _ => false,
        }
    }

    /// Raw text of a text value, untrimmed.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical display form, also used as the distinct-value key.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Format a number so whole values print without a fractional part.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> Vec<String> {
        vec!["NA".to_string(), "null".to_string()]
    }

    #[test]
    fn test_is_null() {
        assert!(Value::Null.is_null(&tokens()));
        assert!(Value::text("  ").is_null(&tokens()));
        assert!(Value::text("na").is_null(&tokens()));
        assert!(Value::text("NULL").is_null(&tokens()));
        assert!(!Value::text("value").is_null(&tokens()));
        assert!(!Value::text("0").is_null(&tokens()));
        assert!(!Value::Bool(false).is_null(&tokens()));
    }

    #[test]
    fn test_numeric_readings() {
        assert_eq!(Value::text(" 42 ").as_f64(), Some(42.0));
        assert_eq!(Value::text("abc").as_f64(), None);
        assert_eq!(Value::text("inf").as_f64(), None);
        assert!(Value::Number(3.0).is_integer());
        assert!(!Value::Number(3.5).is_integer());
        assert!(Value::text("17").is_integer());
        assert!(!Value::text("17.0").is_integer());
    }

    #[test]
    fn test_render_matches_text_form() {
        assert_eq!(Value::Number(1.0).render(), "1");
        assert_eq!(Value::Number(1.5).render(), "1.5");
        assert_eq!(Value::Bool(true).render(), "true");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_deserialize_untagged() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 1.5, true, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Number(1.5),
                Value::Bool(true),
                Value::text("x")
            ]
        );
    }
}
