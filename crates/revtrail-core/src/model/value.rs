use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single field value of a tracked entity
///
/// Dates are kept distinct from text so that sanitization can keep them
/// while dropping other structured values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Object(BTreeMap<String, FieldValue>),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Object or array, i.e. a value the interceptor never compares
    pub fn is_nested(&self) -> bool {
        matches!(self, FieldValue::Object(_) | FieldValue::Array(_))
    }

    pub fn is_date(&self) -> bool {
        matches!(self, FieldValue::Date(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Number(_) => "number",
            FieldValue::Text(_) => "text",
            FieldValue::Date(_) => "date",
            FieldValue::Object(_) => "object",
            FieldValue::Array(_) => "array",
        }
    }

    /// Numeric coercion in the loose sense used by comparisons and the normalizer
    ///
    /// Blank text coerces to zero; text that is not a number, null, and
    /// structured values have no numeric form.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Number(n) if !n.is_nan() => Some(*n),
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
                }
            }
            FieldValue::Date(d) => Some(d.timestamp_millis() as f64),
            _ => None,
        }
    }

    /// Plain JSON rendering (dates as RFC 3339 strings)
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                Value::from(*n as i64)
            }
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.to_rfc3339()),
            FieldValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            FieldValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Null),
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => FieldValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                FieldValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(f64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Top-level field map of an entity, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &FieldValue) -> bool,
    {
        self.fields.retain(|k, v| keep(k, v));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a snapshot from any serializable entity
    ///
    /// String fields listed in `date_fields` are parsed as RFC 3339 dates;
    /// unparsable values stay text.
    ///
    /// # Errors
    ///
    /// `Serialization` when the value does not serialize to a JSON object.
    pub fn from_serialize<T: Serialize>(
        entity: &T,
        date_fields: &[&str],
    ) -> crate::errors::Result<Self> {
        let value = serde_json::to_value(entity)?;
        let serde_json::Value::Object(map) = value else {
            return Err(crate::errors::TrackingError::Serialization {
                message: "entity must serialize to a JSON object".to_string(),
            }
            .into());
        };

        let fields = map
            .into_iter()
            .map(|(key, value)| {
                let field = match value {
                    serde_json::Value::String(s) if date_fields.contains(&key.as_str()) => {
                        DateTime::parse_from_rfc3339(&s)
                            .map(|d| FieldValue::Date(d.with_timezone(&Utc)))
                            .unwrap_or(FieldValue::Text(s))
                    }
                    other => FieldValue::from(other),
                };
                (key, field)
            })
            .collect();
        Ok(Self { fields })
    }
}

impl FromIterator<(String, FieldValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_from_json_maps_structure() {
        let value = FieldValue::from(json!({"a": [1, "x"], "b": null}));
        let FieldValue::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(
            map["a"],
            FieldValue::Array(vec![FieldValue::Number(1.0), FieldValue::from("x")])
        );
        assert_eq!(map["b"], FieldValue::Null);
    }

    #[test]
    fn test_to_number_coercion() {
        assert_eq!(FieldValue::from(true).to_number(), Some(1.0));
        assert_eq!(FieldValue::from(" 42 ").to_number(), Some(42.0));
        assert_eq!(FieldValue::from("").to_number(), Some(0.0));
        assert_eq!(FieldValue::from("abc").to_number(), None);
        assert_eq!(FieldValue::Null.to_number(), None);
        let date = Utc.timestamp_millis_opt(1_500).unwrap();
        assert_eq!(FieldValue::from(date).to_number(), Some(1_500.0));
    }

    #[test]
    fn test_from_serialize_parses_date_fields() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Cv {
            title: String,
            published_at: String,
            notes: Option<String>,
        }

        let cv = Cv {
            title: "Welder".to_string(),
            published_at: "2024-03-01T10:00:00Z".to_string(),
            notes: None,
        };
        let snapshot = Snapshot::from_serialize(&cv, &["publishedAt"]).unwrap();

        assert_eq!(snapshot.get("title"), Some(&FieldValue::from("Welder")));
        assert!(snapshot.get("publishedAt").unwrap().is_date());
        assert_eq!(snapshot.get("notes"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_from_serialize_rejects_non_objects() {
        let err = Snapshot::from_serialize(&vec![1, 2], &[]).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ExErrorKind::Serialization);
    }

    #[test]
    fn test_snapshot_serializes_tagged_values() {
        let snapshot = Snapshot::new().with("name", "Alice").with("active", true);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["name"], json!({"type": "text", "value": "Alice"}));
        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
