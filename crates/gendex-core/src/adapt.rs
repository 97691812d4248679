//! Turning tabular, key/value and serializable records into documents.
//!
//! Each cell is mapped through the [`FieldRule`] registered for its
//! [`SourceType`]: the rule decides storage, boost, what a null becomes and
//! how long a value may be.
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Document, Field, FieldStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Text,
    Integer,
    Float,
    Boolean,
    DateTime,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Value::Null => SourceType::Other,
            Value::Text(_) => SourceType::Text,
            Value::Integer(_) => SourceType::Integer,
            Value::Float(_) => SourceType::Float,
            Value::Boolean(_) => SourceType::Boolean,
            Value::DateTime(_) => SourceType::DateTime,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    Skip,
    Default(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub storage: FieldStorage,
    pub boost: f32,
    pub null_policy: NullPolicy,
    /// Longer values are cut to this many characters.
    pub max_length: Option<usize>,
}

impl Default for FieldRule {
    fn default() -> Self {
        Self { storage: FieldStorage::StoreAndAnalyze, boost: 1.0, null_policy: NullPolicy::Skip, max_length: None }
    }
}

/// Per-source-type rules. Types without an explicit rule use the fallback.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    rules: HashMap<SourceType, FieldRule>,
    fallback: FieldRule,
}

impl FieldRules {
    pub fn new(fallback: FieldRule) -> Self {
        Self { rules: HashMap::new(), fallback }
    }

    pub fn set(&mut self, source: SourceType, rule: FieldRule) -> &mut Self {
        self.rules.insert(source, rule);
        self
    }

    pub fn rule(&self, source: SourceType) -> &FieldRule {
        self.rules.get(&source).unwrap_or(&self.fallback)
    }

    /// `None` when the rule says a null cell is skipped.
    pub fn field(&self, name: &str, source: SourceType, value: &Value) -> Option<Field> {
        let rule = self.rule(source);
        let text = if value.is_null() {
            match &rule.null_policy {
                NullPolicy::Skip => return None,
                NullPolicy::Default(d) => d.clone(),
            }
        } else {
            value.to_string()
        };
        let text = match rule.max_length {
            Some(max) => truncate_chars(text, max),
            None => text,
        };
        Some(Field::new(name, text, rule.storage).with_boost(rule.boost))
    }

    pub fn document_from_row(&self, columns: &[Column], row: &[Value]) -> Result<Document> {
        if columns.len() != row.len() {
            return Err(Error::InvalidDocument(format!(
                "row has {} cells but the table declares {} columns",
                row.len(),
                columns.len()
            )));
        }
        let doc: Document = columns
            .iter()
            .zip(row)
            .filter_map(|(col, cell)| self.field(&col.name, col.source_type, cell))
            .collect();
        non_empty(doc)
    }

    /// One document per entry with `Key` and `Value` fields.
    pub fn document_from_pair(&self, key: &Value, value: &Value) -> Result<Document> {
        let doc: Document = [("Key", key), ("Value", value)]
            .into_iter()
            .filter_map(|(name, v)| self.field(name, v.source_type(), v))
            .collect();
        non_empty(doc)
    }

    /// One field per top-level property of the record's serialized form, in
    /// declaration order.
    pub fn document_from_record<T: Serialize>(&self, record: &T) -> Result<Document> {
        let json = serde_json::to_value(record).map_err(|e| Error::InvalidDocument(e.to_string()))?;
        let serde_json::Value::Object(map) = json else {
            return Err(Error::InvalidDocument("record does not serialize to an object".to_string()));
        };
        let doc: Document = map
            .iter()
            .filter_map(|(name, v)| {
                let (source, value) = json_cell(v);
                self.field(name, source, &value)
            })
            .collect();
        non_empty(doc)
    }
}

fn json_cell(v: &serde_json::Value) -> (SourceType, Value) {
    match v {
        serde_json::Value::Null => (SourceType::Other, Value::Null),
        serde_json::Value::Bool(b) => (SourceType::Boolean, Value::Boolean(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => (SourceType::Integer, Value::Integer(i)),
            None => (SourceType::Float, Value::Float(n.as_f64().unwrap_or_default())),
        },
        serde_json::Value::String(s) => (SourceType::Text, Value::Text(s.clone())),
        other => (SourceType::Other, Value::Text(other.to_string())),
    }
}

fn non_empty(doc: Document) -> Result<Document> {
    if doc.is_empty() {
        Err(Error::InvalidDocument("no fields left after applying field rules".to_string()))
    } else {
        Ok(doc)
    }
}

fn truncate_chars(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub source_type: SourceType,
}

impl Column {
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self { name: name.into(), source_type }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> &mut Self {
        self.rows.push(row);
        self
    }
}

/// Outcome of a bulk write. Rows that failed are counted, not fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub written: u64,
    pub skipped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_policies_apply_per_source_type() {
        let mut rules = FieldRules::default();
        rules.set(
            SourceType::Integer,
            FieldRule { null_policy: NullPolicy::Default("0".into()), storage: FieldStorage::Store, ..FieldRule::default() },
        );
        let columns = vec![Column::new("name", SourceType::Text), Column::new("qty", SourceType::Integer)];

        let doc = rules.document_from_row(&columns, &[Value::Null, Value::Null]).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.fields()[0].name, "qty");
        assert_eq!(doc.fields()[0].value, "0");
        assert_eq!(doc.fields()[0].storage, FieldStorage::Store);
    }

    #[test]
    fn max_length_cuts_on_char_boundaries() {
        let mut rules = FieldRules::default();
        rules.set(SourceType::Text, FieldRule { max_length: Some(3), ..FieldRule::default() });
        let field = rules.field("t", SourceType::Text, &Value::from("héllo")).unwrap();
        assert_eq!(field.value, "hél");
    }

    #[test]
    fn ragged_rows_and_all_null_rows_are_rejected() {
        let rules = FieldRules::default();
        let columns = vec![Column::new("a", SourceType::Text)];
        assert!(rules.document_from_row(&columns, &[]).is_err());
        assert!(rules.document_from_row(&columns, &[Value::Null]).is_err());
    }

    #[test]
    fn records_map_properties_to_fields() {
        #[derive(Serialize)]
        struct Item {
            title: String,
            price: f64,
            stock: i64,
            note: Option<String>,
        }
        let rules = FieldRules::default();
        let doc = rules
            .document_from_record(&Item { title: "lamp".into(), price: 9.5, stock: 3, note: None })
            .unwrap();
        let names: Vec<&str> = doc.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"price"));
        assert!(!names.contains(&"note"));
        assert!(rules.document_from_record(&42).is_err());
    }

    #[test]
    fn record_fields_keep_declaration_order() {
        #[derive(Serialize)]
        struct Row {
            zeta: i64,
            alpha: String,
            mid: bool,
        }
        let doc = FieldRules::default()
            .document_from_record(&Row { zeta: 1, alpha: "a".into(), mid: true })
            .unwrap();
        let names: Vec<&str> = doc.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn pairs_become_key_value_documents() {
        let doc = FieldRules::default().document_from_pair(&Value::from("k1"), &Value::Integer(7)).unwrap();
        assert_eq!(doc.fields()[0].name, "Key");
        assert_eq!(doc.fields()[1].value, "7");
    }
}
