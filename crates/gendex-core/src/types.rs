//! Documents going in, results coming out.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How the engine treats a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStorage {
    /// Kept verbatim, not searchable.
    Store,
    /// Searchable, not retrievable.
    Analyze,
    /// Both.
    StoreAndAnalyze,
}

impl FieldStorage {
    pub fn is_stored(self) -> bool {
        matches!(self, FieldStorage::Store | FieldStorage::StoreAndAnalyze)
    }

    pub fn is_analyzed(self) -> bool {
        matches!(self, FieldStorage::Analyze | FieldStorage::StoreAndAnalyze)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub storage: FieldStorage,
    pub boost: f32,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>, storage: FieldStorage) -> Self {
        Self { name: name.into(), value: value.into(), storage, boost: 1.0 }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

/// Ordered multiset of fields. Duplicate names are allowed and kept in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>, storage: FieldStorage) -> Self {
        self.fields.push(Field::new(name, value, storage));
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Field> for Document {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self { fields: iter.into_iter().collect() }
    }
}

/// One hit: field values in encounter order, the index it came from and
/// its relevance score. Repeated names become `name(1)`, `name(2)`, ...
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    fields: Vec<(String, String)>,
    source: String,
    score: f32,
}

impl SearchResult {
    pub fn new<I, N, V>(source: impl Into<String>, score: f32, fields: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut out: Vec<(String, String)> = Vec::new();
        for (name, value) in fields {
            let name = name.into();
            let key = if seen.contains_key(&name) {
                let mut n = seen[&name];
                loop {
                    let candidate = format!("{name}({n})");
                    n += 1;
                    if !seen.contains_key(&candidate) {
                        seen.insert(name.clone(), n);
                        break candidate;
                    }
                }
            } else {
                seen.insert(name.clone(), 1);
                name
            };
            seen.entry(key.clone()).or_insert(1);
            out.push((key, value.into()));
        }
        Self { fields: out, source: source.into(), score }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterValue {
    pub value: String,
    pub enabled: bool,
}

/// Distinct values observed for one field, each switchable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFilter {
    pub field: String,
    pub enabled: bool,
    pub values: Vec<FilterValue>,
}

impl FieldFilter {
    fn new(field: String) -> Self {
        Self { field, enabled: true, values: Vec::new() }
    }

    fn observe(&mut self, value: &str) {
        if !self.values.iter().any(|v| v.value == value) {
            self.values.push(FilterValue { value: value.to_string(), enabled: true });
        }
    }

    pub fn allows(&self, value: &str) -> bool {
        !self.enabled || self.values.iter().any(|v| v.enabled && v.value == value)
    }
}

/// Results plus per-field filters for facet-style narrowing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResultDataSet {
    results: Vec<SearchResult>,
    filters: Vec<FieldFilter>,
}

impl SearchResultDataSet {
    /// Filters are built from `results` themselves.
    pub fn new(results: Vec<SearchResult>) -> Self {
        let filters = build_filters(&results);
        Self { results, filters }
    }

    /// Filters are built from a wider population, typically every document
    /// in the searched indexes.
    pub fn with_filter_source<'a>(results: Vec<SearchResult>, population: impl IntoIterator<Item = &'a SearchResult>) -> Self {
        let filters = build_filters(population);
        Self { results, filters }
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<SearchResult> {
        self.results
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn filter(&self, field: &str) -> Option<&FieldFilter> {
        self.filters.iter().find(|f| f.field == field)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Switches a whole filter on or off. Returns false for unknown fields.
    pub fn set_filter_enabled(&mut self, field: &str, enabled: bool) -> bool {
        match self.filters.iter_mut().find(|f| f.field == field) {
            Some(filter) => {
                filter.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Switches one value of a filter. Returns false if the pair is unknown.
    pub fn set_value_enabled(&mut self, field: &str, value: &str, enabled: bool) -> bool {
        let Some(filter) = self.filters.iter_mut().find(|f| f.field == field) else {
            return false;
        };
        match filter.values.iter_mut().find(|v| v.value == value) {
            Some(v) => {
                v.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Results consistent with every enabled filter. A result without the
    /// filtered field is not excluded by that filter.
    pub fn filtered(&self) -> Vec<&SearchResult> {
        self.results
            .iter()
            .filter(|r| {
                self.filters
                    .iter()
                    .all(|f| r.get(&f.field).map_or(true, |value| f.allows(value)))
            })
            .collect()
    }
}

fn build_filters<'a>(results: impl IntoIterator<Item = &'a SearchResult>) -> Vec<FieldFilter> {
    let mut filters: Vec<FieldFilter> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    for result in results {
        for (name, value) in result.fields() {
            let idx = *position.entry(name.to_string()).or_insert_with(|| {
                filters.push(FieldFilter::new(name.to_string()));
                filters.len() - 1
            });
            filters[idx].observe(value);
        }
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_numbered_suffixes() {
        let r = SearchResult::new("idx", 1.0, [("tag", "a"), ("title", "t"), ("tag", "b"), ("tag", "c")]);
        let names: Vec<&str> = r.field_names().collect();
        assert_eq!(names, ["tag", "title", "tag(1)", "tag(2)"]);
        assert_eq!(r.get("tag(1)"), Some("b"));
    }

    #[test]
    fn suffix_skips_names_already_taken() {
        let r = SearchResult::new("idx", 0.0, [("x", "1"), ("x(1)", "literal"), ("x", "2")]);
        let names: Vec<&str> = r.field_names().collect();
        assert_eq!(names, ["x", "x(1)", "x(2)"]);
        assert_eq!(r.get("x(2)"), Some("2"));
    }

    fn sample() -> SearchResultDataSet {
        SearchResultDataSet::new(vec![
            SearchResult::new("idx", 3.0, [("color", "red"), ("size", "L")]),
            SearchResult::new("idx", 2.0, [("color", "blue"), ("size", "L")]),
            SearchResult::new("idx", 1.0, [("color", "red"), ("size", "S")]),
            SearchResult::new("idx", 0.5, [("size", "M")]),
        ])
    }

    #[test]
    fn filters_collect_distinct_values_in_encounter_order() {
        let ds = sample();
        let color = ds.filter("color").unwrap();
        let values: Vec<&str> = color.values.iter().map(|v| v.value.as_str()).collect();
        assert_eq!(values, ["red", "blue"]);
        assert_eq!(ds.filter("size").unwrap().values.len(), 3);
    }

    #[test]
    fn disabling_a_value_projects_results() {
        let mut ds = sample();
        assert_eq!(ds.filtered().len(), 4);
        assert!(ds.set_value_enabled("color", "red", false));
        let kept: Vec<f32> = ds.filtered().iter().map(|r| r.score()).collect();
        assert_eq!(kept, [2.0, 0.5]);

        assert!(ds.set_filter_enabled("color", false));
        assert_eq!(ds.filtered().len(), 4);
        assert!(!ds.set_value_enabled("color", "green", false));
    }

    #[test]
    fn document_keeps_duplicates_in_order() {
        let doc = Document::new()
            .with("k", "1", FieldStorage::Store)
            .with("k", "2", FieldStorage::StoreAndAnalyze);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.fields()[1].value, "2");
        assert!(doc.fields()[1].storage.is_analyzed());
    }
}
