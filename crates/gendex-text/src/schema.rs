//! Fixed engine schema and the analyzers registered on every index.
//!
//! Documents carry arbitrary field names, so the tantivy schema is generic:
//! stored fields are serialized into `_stored`, every analyzed value also
//! goes into the catch-all `_body`, and `_fields` holds the same tokens
//! qualified by field name for per-field queries.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tantivy::schema::{FieldType, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{
    LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, Token, TokenStream,
    WhitespaceTokenizer,
};
use tantivy::Index;

use gendex_core::error::{Error, Result};

pub const STORED_FIELD: &str = "_stored";
pub const BODY_FIELD: &str = "_body";
pub const FIELDS_FIELD: &str = "_fields";

/// Separates the field name from the token in `_fields` terms.
pub const FIELD_SEPARATOR: char = '\u{1f}';

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
    "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose", "can", "could",
    "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Word split, lowercase, English stop words removed.
    #[default]
    Standard,
    /// Word split and lowercase.
    Simple,
    /// Whitespace split, case kept.
    Whitespace,
    /// Whole value as a single token.
    Keyword,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 4] =
        [AnalyzerKind::Standard, AnalyzerKind::Simple, AnalyzerKind::Whitespace, AnalyzerKind::Keyword];

    /// Name the analyzer is registered under in the index's tokenizer manager.
    pub fn tokenizer_name(self) -> &'static str {
        match self {
            AnalyzerKind::Standard => "gendex_standard",
            AnalyzerKind::Simple => "gendex_simple",
            AnalyzerKind::Whitespace => "gendex_whitespace",
            AnalyzerKind::Keyword => "gendex_keyword",
        }
    }

    pub fn from_tokenizer_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tokenizer_name() == name)
    }

    pub fn build(self) -> TextAnalyzer {
        match self {
            AnalyzerKind::Standard => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(40))
                .filter(LowerCaser)
                .filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
                .build(),
            AnalyzerKind::Simple => TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(40))
                .filter(LowerCaser)
                .build(),
            AnalyzerKind::Whitespace => TextAnalyzer::from(WhitespaceTokenizer::default()),
            AnalyzerKind::Keyword => TextAnalyzer::from(RawTokenizer::default()),
        }
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalyzerKind::Standard => "standard",
            AnalyzerKind::Simple => "simple",
            AnalyzerKind::Whitespace => "whitespace",
            AnalyzerKind::Keyword => "keyword",
        };
        f.write_str(s)
    }
}

impl FromStr for AnalyzerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown analyzer {s:?}")))
    }
}

pub fn build_schema(analyzer: AnalyzerKind) -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field(STORED_FIELD, STORED);
    let body_indexing = TextFieldIndexing::default()
        .set_tokenizer(analyzer.tokenizer_name())
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    schema_builder.add_text_field(BODY_FIELD, TextOptions::default().set_indexing_options(body_indexing));
    // Values arrive pre-tokenized; the tokenizer name only has to resolve.
    let fields_indexing = TextFieldIndexing::default()
        .set_tokenizer(analyzer.tokenizer_name())
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    schema_builder.add_text_field(FIELDS_FIELD, TextOptions::default().set_indexing_options(fields_indexing));
    schema_builder.build()
}

pub fn register_analyzers(index: &Index) {
    for kind in AnalyzerKind::ALL {
        index.tokenizers().register(kind.tokenizer_name(), kind.build());
    }
}

/// Handles of the three engine fields, resolved from an opened schema.
#[derive(Debug, Clone, Copy)]
pub struct EngineFields {
    pub stored: tantivy::schema::Field,
    pub body: tantivy::schema::Field,
    pub fields: tantivy::schema::Field,
}

impl EngineFields {
    pub fn resolve(schema: &Schema) -> Result<Self> {
        Ok(Self {
            stored: schema.get_field(STORED_FIELD).map_err(Error::engine)?,
            body: schema.get_field(BODY_FIELD).map_err(Error::engine)?,
            fields: schema.get_field(FIELDS_FIELD).map_err(Error::engine)?,
        })
    }
}

/// The analyzer an index was created with, read back from its `_body` field.
pub fn analyzer_of(schema: &Schema, fields: &EngineFields) -> Result<AnalyzerKind> {
    let name = match schema.get_field_entry(fields.body).field_type() {
        FieldType::Str(options) => options.get_indexing_options().map(|i| i.tokenizer().to_string()),
        _ => None,
    };
    name.as_deref()
        .and_then(AnalyzerKind::from_tokenizer_name)
        .ok_or_else(|| Error::Config(format!("index uses an unknown analyzer {name:?}")))
}

/// Runs `text` through `analyzer`, keeping at most `limit` tokens.
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str, limit: Option<usize>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        if limit.is_some_and(|max| tokens.len() >= max) {
            break;
        }
        tokens.push(stream.token().clone());
    }
    tokens
}

pub fn qualified_term(field: &str, token: &str) -> String {
    format!("{field}{FIELD_SEPARATOR}{token}")
}
