//! Mapping between JSON documents and DynamoDB attribute maps.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Number, Value};

use super::{Document, StoreError};

/// Attribute name holding the document id.
pub const ID_ATTRIBUTE: &str = "id";

/// Convert a JSON value into an attribute value.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// Convert an attribute value into JSON.
///
/// Binary attributes become base64 strings; sets become arrays.
///
/// # Errors
///
/// Returns [`StoreError::Malformed`] for unparseable numbers or attribute
/// types this crate does not know.
pub fn from_attribute(attr: &AttributeValue) -> Result<Value, StoreError> {
    Ok(match attr {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(parse_number(n)?),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::B(blob) => Value::String(BASE64.encode(blob.as_ref())),
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(from_attribute)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attribute_map(map)?),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::Bs(items) => Value::Array(
            items
                .iter()
                .map(|b| Value::String(BASE64.encode(b.as_ref())))
                .collect(),
        ),
        other => {
            return Err(StoreError::Malformed(format!(
                "unsupported attribute type: {other:?}"
            )))
        }
    })
}

fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Result<Map<String, Value>, StoreError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), from_attribute(v)?)))
        .collect()
}

fn parse_number(n: &str) -> Result<Number, StoreError> {
    n.parse::<Number>()
        .map_err(|_| StoreError::Malformed(format!("invalid number attribute: {n:?}")))
}

/// Convert a document into an item, including its id attribute.
pub fn to_item(doc: &Document) -> HashMap<String, AttributeValue> {
    let mut item: HashMap<String, AttributeValue> = doc
        .fields
        .iter()
        .filter(|(k, _)| k.as_str() != ID_ATTRIBUTE)
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect();
    item.insert(ID_ATTRIBUTE.to_string(), AttributeValue::S(doc.id.clone()));
    item
}

/// Convert an item into a document.
///
/// # Errors
///
/// Returns [`StoreError::Malformed`] if the item has no string id or any
/// attribute cannot be converted.
pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Document, StoreError> {
    let id = match item.get(ID_ATTRIBUTE) {
        Some(AttributeValue::S(id)) => id.clone(),
        Some(_) => return Err(StoreError::Malformed("id attribute is not a string".into())),
        None => return Err(StoreError::Malformed("item has no id attribute".into())),
    };
    let mut fields = from_attribute_map(item)?;
    fields.remove(ID_ATTRIBUTE);
    Ok(Document { id, fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::primitives::Blob;
    use serde_json::json;

    #[test]
    fn nested_document_survives_conversion() {
        let doc: Document = serde_json::from_value(json!({
            "id": "c1",
            "name": "October league",
            "members": ["u1", "u2"],
            "settings": {"public": true, "maxMembers": 20, "ratio": 0.5},
            "endedAt": null
        }))
        .unwrap();

        let item = to_item(&doc);
        assert_eq!(item[ID_ATTRIBUTE], AttributeValue::S("c1".into()));
        assert_eq!(from_item(&item).unwrap(), doc);
    }

    #[test]
    fn numbers_are_stored_as_decimal_strings() {
        assert_eq!(to_attribute(&json!(42)), AttributeValue::N("42".into()));
        assert_eq!(to_attribute(&json!(7.25)), AttributeValue::N("7.25".into()));
    }

    #[test]
    fn sets_and_binaries_become_arrays_and_base64() {
        assert_eq!(
            from_attribute(&AttributeValue::Ss(vec!["a".into(), "b".into()])).unwrap(),
            json!(["a", "b"])
        );
        assert_eq!(
            from_attribute(&AttributeValue::Ns(vec!["1".into(), "2.5".into()])).unwrap(),
            json!([1, 2.5])
        );
        assert_eq!(
            from_attribute(&AttributeValue::B(Blob::new(b"hi".to_vec()))).unwrap(),
            json!("aGk=")
        );
    }

    #[test]
    fn bad_number_is_malformed() {
        let err = from_attribute(&AttributeValue::N("1e".into())).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn item_without_id_is_malformed() {
        let mut item = HashMap::new();
        item.insert("name".to_string(), AttributeValue::S("x".into()));
        assert!(matches!(from_item(&item), Err(StoreError::Malformed(_))));

        item.insert(ID_ATTRIBUTE.to_string(), AttributeValue::N("1".into()));
        assert!(matches!(from_item(&item), Err(StoreError::Malformed(_))));
    }
}
