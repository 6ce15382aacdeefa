//! Payloads delivered from a Model to a Controller

use serde_json::Value;

use super::schema::PartialState;

/// Data carried by a successful model transaction
///
/// Reads scoped to one parameter and every write produce `Scoped` payloads that
/// merge into per-parameter state. Unscoped reads produce `Raw` payloads, which
/// are routed to the controller's raw data handler instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scoped(PartialState),
    Raw(Value),
}

impl Payload {
    /// Build a scoped payload from a remote response.
    ///
    /// Non-object responses carry no parameters and become an empty scoped payload.
    pub fn scoped_from(value: Value) -> Self {
        match value {
            Value::Object(map) => Payload::Scoped(map),
            _ => Payload::Scoped(PartialState::new()),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Payload::Raw(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scoped_from_object() {
        let payload = Payload::scoped_from(json!({"volume": 5}));
        match payload {
            Payload::Scoped(map) => assert_eq!(map.get("volume"), Some(&json!(5))),
            Payload::Raw(_) => panic!("expected scoped payload"),
        }
    }

    #[test]
    fn test_scoped_from_non_object_is_empty() {
        assert_eq!(
            Payload::scoped_from(json!("ok")),
            Payload::Scoped(PartialState::new())
        );
        assert!(!Payload::scoped_from(json!(null)).is_raw());
        assert!(Payload::Raw(json!([1, 2])).is_raw());
    }
}
