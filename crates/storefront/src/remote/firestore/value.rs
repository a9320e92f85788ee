//! Firestore typed values.
//!
//! The REST API wraps every field in a typed envelope such as
//! `{"integerValue": "42"}`. Integers travel as strings.

use serde_json::{Map, Number, Value};

use crate::remote::Fields;

/// Wrap plain fields into a Firestore `fields` object.
#[must_use]
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

fn encode_value(value: &Value) -> Value {
    let mut typed = Map::new();
    match value {
        Value::Null => {
            typed.insert("nullValue".to_string(), Value::Null);
        }
        Value::Bool(b) => {
            typed.insert("booleanValue".to_string(), Value::Bool(*b));
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                typed.insert("integerValue".to_string(), Value::String(i.to_string()));
            } else if let Some(u) = n.as_u64() {
                typed.insert("integerValue".to_string(), Value::String(u.to_string()));
            } else {
                typed.insert("doubleValue".to_string(), Value::Number(n.clone()));
            }
        }
        Value::String(s) => {
            typed.insert("stringValue".to_string(), Value::String(s.clone()));
        }
        Value::Array(items) => {
            let values = items.iter().map(encode_value).collect();
            typed.insert(
                "arrayValue".to_string(),
                serde_json::json!({ "values": Value::Array(values) }),
            );
        }
        Value::Object(map) => {
            typed.insert(
                "mapValue".to_string(),
                serde_json::json!({ "fields": encode_fields(map) }),
            );
        }
    }
    Value::Object(typed)
}

/// Unwrap a Firestore `fields` object into plain fields.
///
/// Value types the point of sale never writes (references, geo points,
/// bytes) decode to `null`.
#[must_use]
pub fn decode_fields(fields: &Map<String, Value>) -> Fields {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "stringValue" | "timestampValue" | "booleanValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map_or(Value::Null, Value::from),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(n) => Value::Number(n.clone()),
            // NaN and infinities arrive as strings
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
            _ => Value::Null,
        },
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    #[test]
    fn test_encode_scalars() {
        let encoded = encode_fields(&fields(json!({
            "name": "Sữa Tươi Vinamilk 1L",
            "price": 30000,
            "ratio": 0.5,
            "active": true,
            "note": null,
        })));
        assert_eq!(encoded["name"], json!({"stringValue": "Sữa Tươi Vinamilk 1L"}));
        assert_eq!(encoded["price"], json!({"integerValue": "30000"}));
        assert_eq!(encoded["ratio"], json!({"doubleValue": 0.5}));
        assert_eq!(encoded["active"], json!({"booleanValue": true}));
        assert_eq!(encoded["note"], json!({"nullValue": null}));
    }

    #[test]
    fn test_nested_invoice_items() {
        let plain = fields(json!({
            "items": [{"id": "1", "quantity": 2, "price": 10000}],
            "total": 20000,
        }));
        let encoded = encode_fields(&plain);
        assert_eq!(
            encoded["items"]["arrayValue"]["values"][0]["mapValue"]["fields"]["quantity"],
            json!({"integerValue": "2"})
        );

        let Value::Object(typed) = encoded else {
            panic!("expected object");
        };
        assert_eq!(decode_fields(&typed), plain);
    }

    #[test]
    fn test_decode_server_shapes() {
        let typed = fields(json!({
            "date": {"timestampValue": "2024-05-01T10:00:00Z"},
            "empty": {"arrayValue": {}},
            "stock": {"integerValue": "17"},
            "where": {"geoPointValue": {"latitude": 1.0, "longitude": 2.0}},
        }));
        let plain = decode_fields(&typed);
        assert_eq!(plain["date"], json!("2024-05-01T10:00:00Z"));
        assert_eq!(plain["empty"], json!([]));
        assert_eq!(plain["stock"], json!(17));
        assert_eq!(plain["where"], Value::Null);
    }
}
