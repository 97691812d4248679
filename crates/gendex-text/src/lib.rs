//! gendex-text
//!
//! Tantivy binding for rotated indexes. Writers build a generation in the
//! descriptor's write slot and promote it on close; readers and searchers
//! resolve the active slot again on every call.

pub mod engine;
pub mod multi;
pub mod query;
pub mod reader;
pub mod schema;
pub mod searcher;
pub mod writer;

pub use engine::{FieldLengthPolicy, Generation};
pub use multi::MultiIndexSearcher;
pub use query::{Occur, SearchQuery};
pub use reader::{IndexReader, Window};
pub use schema::AnalyzerKind;
pub use searcher::{FilterScope, IndexSearcher};
pub use writer::{IndexWriter, WriterOptions};
