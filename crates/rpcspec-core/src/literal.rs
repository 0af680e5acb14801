//! Literal values carried by constants, field defaults and metadata usages

use std::fmt;

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    #[serde(serialize_with = "serialize_finite")]
    Float(f64),
    String(String),
    Tuple(Vec<Literal>),
}

impl Literal {
    pub fn is_tuple(&self) -> bool {
        matches!(self, Literal::Tuple(_))
    }

    /// False if any float inside is NaN or infinite; JSON has no encoding
    /// for those
    pub fn is_finite(&self) -> bool {
        match self {
            Literal::Float(value) => value.is_finite(),
            Literal::Tuple(items) => items.iter().all(Literal::is_finite),
            _ => true,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(value) => write!(f, "{}", value),
            Literal::Int(value) => write!(f, "{}", value),
            Literal::Float(value) => write!(f, "{:?}", value),
            Literal::String(value) => write!(f, "{:?}", value),
            Literal::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn serialize_finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !value.is_finite() {
        return Err(S::Error::custom(format!("float {} has no JSON encoding", value)));
    }
    serializer.serialize_f64(*value)
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<Vec<Literal>> for Literal {
    fn from(value: Vec<Literal>) -> Self {
        Literal::Tuple(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_wire_form() {
        assert_eq!(serde_json::to_value(Literal::Null).unwrap(), json!({ "type": "null" }));
        assert_eq!(
            serde_json::to_value(Literal::Int(7)).unwrap(),
            json!({ "type": "int", "value": 7 })
        );
        assert_eq!(
            serde_json::to_value(Literal::Tuple(vec![true.into(), "a".into()])).unwrap(),
            json!({
                "type": "tuple",
                "value": [
                    { "type": "boolean", "value": true },
                    { "type": "string", "value": "a" }
                ]
            })
        );

        let parsed: Literal =
            serde_json::from_value(json!({ "type": "float", "value": 1.5 })).unwrap();
        assert_eq!(parsed, Literal::Float(1.5));
    }

    #[test]
    fn test_literal_display() {
        let tuple = Literal::Tuple(vec![Literal::Int(1), Literal::String("x".into()), Literal::Null]);
        assert_eq!(tuple.to_string(), "(1, \"x\", null)");
        assert_eq!(Literal::Float(2.0).to_string(), "2.0");
    }

    #[test]
    fn test_non_finite_floats_do_not_serialize() {
        assert!(Literal::Float(1.5).is_finite());
        let nested = Literal::Tuple(vec![Literal::Int(1), Literal::Float(f64::INFINITY)]);
        assert!(!nested.is_finite());

        let err = serde_json::to_string(&Literal::Float(f64::NAN)).unwrap_err();
        assert!(err.to_string().contains("has no JSON encoding"));
        assert!(serde_json::to_string(&nested).is_err());
    }
}
