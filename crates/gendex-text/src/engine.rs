//! Thin layer over tantivy: opening slots, turning documents into engine
//! documents and back, and the pinned `Generation` handle readers use.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tantivy::collector::TopDocs;
use tantivy::schema::Value as _;
use tantivy::tokenizer::{PreTokenizedString, TextAnalyzer};
use tantivy::{DocAddress, Index, ReloadPolicy, Searcher, TantivyDocument};
use tracing::debug;

use gendex_core::error::{Error, Result};
use gendex_core::generation::{clear_slot, SyncReport};
use gendex_core::types::{Document, SearchResult};
use gendex_core::IndexDescriptor;

use crate::query::{QueryContext, SearchQuery};
use crate::schema::{analyze, analyzer_of, build_schema, qualified_term, register_analyzers, AnalyzerKind, EngineFields};

/// Cap on analyzed tokens kept per field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLengthPolicy {
    Unlimited,
    Limited(usize),
}

impl FieldLengthPolicy {
    /// `0` means unlimited, as in the writer settings.
    pub fn from_limit(limit: usize) -> Self {
        if limit == 0 {
            FieldLengthPolicy::Unlimited
        } else {
            FieldLengthPolicy::Limited(limit)
        }
    }

    pub fn limit(self) -> Option<usize> {
        match self {
            FieldLengthPolicy::Unlimited => None,
            FieldLengthPolicy::Limited(n) => Some(n),
        }
    }
}

impl Default for FieldLengthPolicy {
    fn default() -> Self {
        FieldLengthPolicy::Limited(10_000)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    name: String,
    value: String,
    #[serde(default = "unit_boost")]
    boost: f32,
}

fn unit_boost() -> f32 {
    1.0
}

/// Wipes `dir` (lock files aside) and creates an empty index in it.
pub fn create_index(dir: &Path, analyzer: AnalyzerKind) -> Result<Index> {
    fs::create_dir_all(dir)?;
    let mut report = SyncReport::default();
    clear_slot(dir, &mut report);
    if let Some((path, e)) = report.failures.into_iter().next() {
        return Err(Error::Io(std::io::Error::new(e.kind(), format!("clearing {}: {e}", path.display()))));
    }
    let index = Index::create_in_dir(dir, build_schema(analyzer)).map_err(Error::engine)?;
    register_analyzers(&index);
    debug!(slot = %dir.display(), %analyzer, removed = report.removed, "created empty index");
    Ok(index)
}

pub fn open_index(dir: &Path) -> Result<Index> {
    let index = Index::open_in_dir(dir).map_err(Error::engine)?;
    register_analyzers(&index);
    Ok(index)
}

/// Analyzer and field handles of an opened index.
pub(crate) fn index_parts(index: &Index) -> Result<(EngineFields, TextAnalyzer)> {
    let schema = index.schema();
    let fields = EngineFields::resolve(&schema)?;
    let kind = analyzer_of(&schema, &fields)?;
    let analyzer = index
        .tokenizers()
        .get(kind.tokenizer_name())
        .ok_or_else(|| Error::Config(format!("analyzer {kind} is not registered")))?;
    Ok((fields, analyzer))
}

pub(crate) fn to_engine_document(
    doc: &Document,
    fields: &EngineFields,
    analyzer: &mut TextAnalyzer,
    policy: FieldLengthPolicy,
) -> Result<TantivyDocument> {
    if doc.is_empty() {
        return Err(Error::InvalidDocument("document has no fields".to_string()));
    }
    let mut out = TantivyDocument::default();
    for field in doc.fields() {
        if field.storage.is_stored() {
            let entry = StoredEntry { name: field.name.clone(), value: field.value.clone(), boost: field.boost };
            let json = serde_json::to_string(&entry).map_err(|e| Error::InvalidDocument(e.to_string()))?;
            out.add_text(fields.stored, json);
        }
        if field.storage.is_analyzed() {
            let tokens = analyze(analyzer, &field.value, policy.limit());
            if tokens.is_empty() {
                continue;
            }
            let mut qualified = tokens.clone();
            for token in &mut qualified {
                token.text = qualified_term(&field.name, &token.text);
            }
            out.add_pre_tokenized_text(fields.body, PreTokenizedString { text: field.value.clone(), tokens });
            out.add_pre_tokenized_text(fields.fields, PreTokenizedString { text: field.value.clone(), tokens: qualified });
        }
    }
    Ok(out)
}

/// One generation pinned for reading. The searcher keeps the segment files
/// it opened alive, so a promote (or a rebuild of the other slot) does not
/// change what this handle sees.
pub struct Generation {
    source: String,
    slot: PathBuf,
    index: Index,
    searcher: Searcher,
    fields: EngineFields,
    analyzer: TextAnalyzer,
}

impl Generation {
    /// Opens the descriptor's active slot as it is right now.
    pub fn open(descriptor: &IndexDescriptor) -> Result<Self> {
        let slot = descriptor.active_read_slot()?;
        if !descriptor.slot_has_index_files(&slot) {
            return Err(Error::NoIndexFiles(slot));
        }
        let index = open_index(&slot)?;
        let (fields, analyzer) = index_parts(&index)?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(Error::engine)?;
        let searcher = reader.searcher();
        debug!(index = %descriptor.name(), slot = %slot.display(), docs = searcher.num_docs(), "generation opened");
        Ok(Self { source: descriptor.name(), slot, index, searcher, fields, analyzer })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn slot(&self) -> &Path {
        &self.slot
    }

    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    /// Live documents in segment order.
    pub fn doc_addresses(&self) -> impl Iterator<Item = DocAddress> + '_ {
        self.searcher
            .segment_readers()
            .iter()
            .enumerate()
            .flat_map(|(ord, segment)| segment.doc_ids_alive().map(move |doc| DocAddress::new(ord as u32, doc)))
    }

    pub fn fetch(&self, address: DocAddress, score: f32) -> Result<SearchResult> {
        let doc: TantivyDocument = self.searcher.doc(address).map_err(Error::engine)?;
        let entries: Vec<StoredEntry> = doc
            .get_all(self.fields.stored)
            .filter_map(|v| v.as_str())
            .filter_map(|s| serde_json::from_str(s).ok())
            .collect();
        Ok(SearchResult::new(self.source.clone(), score, entries.into_iter().map(|e| (e.name, e.value))))
    }

    /// Every live document, unscored.
    pub fn documents(&self) -> impl Iterator<Item = Result<SearchResult>> + '_ {
        self.doc_addresses().map(move |address| self.fetch(address, 1.0))
    }

    /// Ranked hits for `query`, best first.
    pub fn top_docs(&self, query: &SearchQuery, limit: usize) -> Result<Vec<(f32, DocAddress)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let context = QueryContext { index: &self.index, fields: self.fields, analyzer: &self.analyzer };
        let query = query.build(&context)?;
        self.searcher.search(query.as_ref(), &TopDocs::with_limit(limit)).map_err(Error::engine)
    }
}
