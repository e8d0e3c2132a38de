//! Archive codec: document sets to and from self-describing JSON.
//!
//! Values JSON cannot carry natively are written as single-key tagged objects:
//!
//! | Value | Encoding |
//! |-------|----------|
//! | timestamp | `{"$timestamp": "2024-05-20T12:00:00.123456789Z"}` |
//! | bytes | `{"$bytes": "00ff"}` |
//! | NaN / infinities | `{"$float": "NaN"}`, `"inf"`, `"-inf"` |
//! | map with a `$`-prefixed key | `{"$map": {...}}` |
//!
//! The `$map` wrapper keeps user data from ever being read back as a tag, so
//! decoding is the exact inverse of encoding.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};

use crate::document::{Document, Value};
use crate::error::{Error, Result};

/// Format marker written at the top of every archive.
pub const ARCHIVE_FORMAT: &str = "roster-archive/v1";

/// File extension of archive files.
pub const ARCHIVE_EXTENSION: &str = "json";

const TAG_TIMESTAMP: &str = "$timestamp";
const TAG_BYTES: &str = "$bytes";
const TAG_FLOAT: &str = "$float";
const TAG_MAP: &str = "$map";
const TAG_PREFIX: char = '$';

/// A snapshot of one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Archive {
    /// Name of the collection the documents came from.
    pub collection: String,
    /// Documents keyed by id, in ascending id order.
    pub documents: BTreeMap<String, Document>,
}

impl Archive {
    /// Create an archive for a collection.
    pub fn new(collection: impl Into<String>, documents: BTreeMap<String, Document>) -> Self {
        Self {
            collection: collection.into(),
            documents,
        }
    }

    /// Number of documents in the archive.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check whether the archive holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Archive file name for a collection (`<collection>.json`).
    pub fn file_name(collection: &str) -> String {
        format!("{}.{}", collection, ARCHIVE_EXTENSION)
    }
}

/// Serialize a collection's documents to archive text.
pub fn encode(collection: &str, documents: &BTreeMap<String, Document>) -> Result<String> {
    let mut encoded = Map::new();
    for (id, document) in documents {
        encoded.insert(id.clone(), encode_document(document));
    }

    let mut root = Map::new();
    root.insert("format".to_string(), Json::String(ARCHIVE_FORMAT.to_string()));
    root.insert("collection".to_string(), Json::String(collection.to_string()));
    root.insert("documents".to_string(), Json::Object(encoded));

    Ok(serde_json::to_string_pretty(&Json::Object(root))?)
}

/// Parse archive text.
///
/// Also accepts a bare `{id: document}` object as written by the legacy
/// exporter; `fallback_collection` names the collection in that case.
pub fn decode(text: &str, fallback_collection: &str) -> Result<Archive> {
    let root: Json = serde_json::from_str(text)?;
    let Json::Object(mut root) = root else {
        return Err(Error::InvalidData(
            "archive root must be a JSON object".to_string(),
        ));
    };

    let is_tagged = matches!(root.get("format"), Some(Json::String(f)) if f == ARCHIVE_FORMAT);
    let (collection, entries) = if is_tagged {
        let collection = match root.remove("collection") {
            Some(Json::String(name)) => name,
            _ => {
                return Err(Error::InvalidData(
                    "archive is missing its collection name".to_string(),
                ))
            }
        };
        match root.remove("documents") {
            Some(Json::Object(entries)) => (collection, entries),
            _ => {
                return Err(Error::InvalidData(
                    "archive documents must be a JSON object".to_string(),
                ))
            }
        }
    } else {
        (fallback_collection.to_string(), root)
    };

    let mut documents = BTreeMap::new();
    for (id, body) in entries {
        let document = decode_document(body)
            .map_err(|e| Error::InvalidData(format!("document '{}': {}", id, e)))?;
        documents.insert(id, document);
    }

    Ok(Archive {
        collection,
        documents,
    })
}

/// Encode a document as a JSON object.
pub fn encode_document(document: &Document) -> Json {
    Json::Object(encode_fields(document.fields()))
}

/// Decode a JSON object into a document.
pub fn decode_document(json: Json) -> Result<Document> {
    match json {
        Json::Object(fields) => Ok(decode_fields(fields)?.into()),
        other => Err(Error::InvalidData(format!(
            "expected a document object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Encode a single value.
pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::Number((*i).into()),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Json::Number(n),
            None => tagged(TAG_FLOAT, Json::String(non_finite_label(*f).to_string())),
        },
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(b) => tagged(TAG_BYTES, Json::String(hex::encode(b))),
        Value::Timestamp(t) => tagged(
            TAG_TIMESTAMP,
            Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        ),
        Value::Array(items) => Json::Array(items.iter().map(encode_value).collect()),
        Value::Map(map) => {
            let fields = encode_fields(map);
            if map.keys().any(|k| k.starts_with(TAG_PREFIX)) {
                tagged(TAG_MAP, Json::Object(fields))
            } else {
                Json::Object(fields)
            }
        }
    }
}

/// Decode a single value.
pub fn decode_value(json: Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| Error::InvalidData(format!("unrepresentable number {}", n))),
        },
        Json::String(s) => Ok(Value::String(s)),
        Json::Array(items) => Ok(Value::Array(
            items.into_iter().map(decode_value).collect::<Result<_>>()?,
        )),
        Json::Object(map) => decode_object(map),
    }
}

fn decode_object(map: Map<String, Json>) -> Result<Value> {
    if map.len() == 1 {
        if let Some((tag, payload)) = map.iter().next() {
            if let Some(decoded) = decode_tagged(tag, payload) {
                return decoded;
            }
        }
    }
    Ok(Value::Map(decode_fields(map)?))
}

fn decode_tagged(tag: &str, payload: &Json) -> Option<Result<Value>> {
    match (tag, payload) {
        (TAG_TIMESTAMP, Json::String(s)) => Some(
            DateTime::parse_from_rfc3339(s)
                .map(|t| Value::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| Error::InvalidData(format!("invalid timestamp '{}': {}", s, e))),
        ),
        (TAG_BYTES, Json::String(s)) => Some(
            hex::decode(s)
                .map(Value::Bytes)
                .map_err(|e| Error::InvalidData(format!("invalid bytes: {}", e))),
        ),
        (TAG_FLOAT, Json::String(s)) => Some(parse_non_finite(s).map(Value::Float)),
        (TAG_MAP, Json::Object(inner)) => Some(decode_fields(inner.clone()).map(Value::Map)),
        _ => None,
    }
}

fn encode_fields(fields: &BTreeMap<String, Value>) -> Map<String, Json> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

fn decode_fields(fields: Map<String, Json>) -> Result<BTreeMap<String, Value>> {
    fields
        .into_iter()
        .map(|(k, v)| decode_value(v).map(|v| (k, v)))
        .collect()
}

fn tagged(tag: &str, payload: Json) -> Json {
    let mut map = Map::new();
    map.insert(tag.to_string(), payload);
    Json::Object(map)
}

fn non_finite_label(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    }
}

fn parse_non_finite(label: &str) -> Result<f64> {
    match label {
        "NaN" => Ok(f64::NAN),
        "inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        other => Err(Error::InvalidData(format!("invalid float label '{}'", other))),
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_documents() -> BTreeMap<String, Document> {
        let created = Utc
            .with_ymd_and_hms(2024, 5, 20, 12, 0, 0)
            .single()
            .unwrap()
            + chrono::Duration::nanoseconds(123_456_789);

        let mut metadata = BTreeMap::new();
        metadata.insert("classLevel".to_string(), Value::from("11"));
        metadata.insert("$ref".to_string(), Value::from("looks like a tag"));

        let mut docs = BTreeMap::new();
        docs.insert(
            "u1".to_string(),
            Document::new()
                .with("email", "a1@foo.com")
                .with("score", 42i64)
                .with("ratio", 0.5)
                .with("whole", 2.0)
                .with("huge", f64::INFINITY)
                .with("active", true)
                .with("deletedAt", Value::Null)
                .with("createdAt", created)
                .with("avatar", Value::Bytes(vec![0, 1, 254, 255]))
                .with("tags", vec!["math", "science"])
                .with("metadata", Value::Map(metadata)),
        );
        docs.insert("u2".to_string(), Document::new());
        docs
    }

    #[test]
    fn test_archive_roundtrip() {
        let docs = sample_documents();
        let text = encode("users", &docs).unwrap();
        let archive = decode(&text, "ignored").unwrap();

        assert_eq!(archive.collection, "users");
        assert_eq!(archive.documents, docs);
    }

    #[test]
    fn test_archive_is_human_readable() {
        let text = encode("users", &sample_documents()).unwrap();
        assert!(text.contains("\"format\": \"roster-archive/v1\""));
        assert!(text.contains("\"email\": \"a1@foo.com\""));
        assert!(text.contains("\"$timestamp\": \"2024-05-20T12:00:00.123456789Z\""));
        assert!(text.contains("\"$bytes\": \"0001feff\""));
        assert!(text.contains("\"$float\": \"inf\""));
    }

    #[test]
    fn test_float_stays_float() {
        let json = encode_value(&Value::Float(2.0));
        let text = serde_json::to_string(&json).unwrap();
        let back = decode_value(serde_json::from_str(&text).unwrap()).unwrap();
        assert_eq!(back, Value::Float(2.0));
    }

    #[test]
    fn test_nan_roundtrip() {
        let back = decode_value(encode_value(&Value::Float(f64::NAN))).unwrap();
        assert!(back.as_f64().is_some_and(f64::is_nan));
    }

    #[test]
    fn test_dollar_keys_are_wrapped() {
        let mut map = BTreeMap::new();
        map.insert("$timestamp".to_string(), Value::from("not a date"));
        let value = Value::Map(map);

        let json = encode_value(&value);
        assert!(json.get("$map").is_some());
        assert_eq!(decode_value(json).unwrap(), value);
    }

    #[test]
    fn test_decode_legacy_archive() {
        let text = r#"{
            "u1": {"email": "a1@foo.com", "role": "admin", "createdAt": "2024-05-20 12:00:00"},
            "u2": {"email": "t1@foo.com", "metadata": {"classLevel": "10"}}
        }"#;
        let archive = decode(text, "users").unwrap();

        assert_eq!(archive.collection, "users");
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.documents["u1"].get_str("role"), Some("admin"));
        assert_eq!(
            archive.documents["u1"].get_str("createdAt"),
            Some("2024-05-20 12:00:00")
        );
    }

    #[test]
    fn test_decode_rejects_non_object_document() {
        let err = decode(r#"{"u1": 5}"#, "users").unwrap_err();
        assert!(err.to_string().contains("u1"));
    }

    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let text = r#"{"u1": {"at": {"$timestamp": "yesterday"}}}"#;
        assert!(decode(text, "users").is_err());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(Archive::file_name("quizzes"), "quizzes.json");
    }
}
