//! Structured queries handed to the engine.
use std::fmt;

use tantivy::query::{AllQuery, BooleanQuery, BoostQuery, Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{Index, Term};
use tracing::warn;

use gendex_core::error::{Error, Result};

use crate::schema::{analyze, qualified_term, EngineFields};

pub use tantivy::query::Occur;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchQuery {
    /// Every document.
    All,
    /// Query-parser syntax over all analyzed text.
    Text(String),
    /// Every analyzed term of `text` must occur in `field`.
    Field { field: String, text: String },
    Boolean(Vec<(Occur, SearchQuery)>),
    Boost(Box<SearchQuery>, f32),
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        SearchQuery::Text(text.into())
    }

    pub fn field(field: impl Into<String>, text: impl Into<String>) -> Self {
        SearchQuery::Field { field: field.into(), text: text.into() }
    }

    pub fn boosted(self, boost: f32) -> Self {
        SearchQuery::Boost(Box::new(self), boost)
    }

    pub(crate) fn build(&self, context: &QueryContext<'_>) -> Result<Box<dyn Query>> {
        match self {
            SearchQuery::All => Ok(Box::new(AllQuery)),
            SearchQuery::Text(text) => {
                let parser = QueryParser::for_index(context.index, vec![context.fields.body]);
                parser.parse_query(text).map_err(|e| Error::Query(format!("{text:?}: {e}")))
            }
            SearchQuery::Field { field, text } => {
                let mut analyzer = context.analyzer.clone();
                let terms: Vec<Term> = analyze(&mut analyzer, text, None)
                    .into_iter()
                    .map(|token| Term::from_field_text(context.fields.fields, &qualified_term(field, &token.text)))
                    .collect();
                match terms.len() {
                    0 => Err(Error::Query(format!("{field}:{text:?} has no searchable terms"))),
                    1 => Ok(Box::new(TermQuery::new(terms[0].clone(), IndexRecordOption::WithFreqs))),
                    _ => {
                        let clauses: Vec<(Occur, Box<dyn Query>)> = terms
                            .into_iter()
                            .map(|term| {
                                let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                                (Occur::Must, q)
                            })
                            .collect();
                        Ok(Box::new(BooleanQuery::new(clauses)))
                    }
                }
            }
            SearchQuery::Boolean(children) => {
                let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(children.len());
                for (occur, child) in children {
                    match child.build(context) {
                        Ok(q) => clauses.push((*occur, q)),
                        Err(e) => warn!(clause = %child, error = %e, "skipping clause that failed to apply"),
                    }
                }
                if clauses.is_empty() {
                    return Err(Error::Query(format!("no clause of {self} could be applied")));
                }
                Ok(Box::new(BooleanQuery::new(clauses)))
            }
            SearchQuery::Boost(inner, boost) => Ok(Box::new(BoostQuery::new(inner.build(context)?, *boost))),
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchQuery::All => f.write_str("*"),
            SearchQuery::Text(text) => f.write_str(text),
            SearchQuery::Field { field, text } => write!(f, "{field}:({text})"),
            SearchQuery::Boolean(children) => {
                f.write_str("(")?;
                for (i, (occur, child)) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match occur {
                        Occur::Must => f.write_str("+")?,
                        Occur::MustNot => f.write_str("-")?,
                        Occur::Should => {}
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            SearchQuery::Boost(inner, boost) => write!(f, "({inner})^{boost}"),
        }
    }
}

pub(crate) struct QueryContext<'a> {
    pub index: &'a Index,
    pub fields: EngineFields,
    pub analyzer: &'a TextAnalyzer,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{build_schema, register_analyzers, AnalyzerKind};

    fn context_parts() -> (Index, EngineFields, TextAnalyzer) {
        let index = Index::create_in_ram(build_schema(AnalyzerKind::Standard));
        register_analyzers(&index);
        let fields = EngineFields::resolve(&index.schema()).unwrap();
        (index, fields, AnalyzerKind::Standard.build())
    }

    #[test]
    fn failing_boolean_children_are_skipped() {
        let (index, fields, analyzer) = context_parts();
        let context = QueryContext { index: &index, fields, analyzer: &analyzer };
        let query = SearchQuery::Boolean(vec![
            (Occur::Must, SearchQuery::field("title", "the")),
            (Occur::Should, SearchQuery::text("flint")),
        ]);
        assert!(query.build(&context).is_ok());

        let hopeless = SearchQuery::Boolean(vec![(Occur::Must, SearchQuery::field("title", "the of"))]);
        assert!(matches!(hopeless.build(&context), Err(Error::Query(_))));
    }

    #[test]
    fn display_reads_like_query_syntax() {
        let query = SearchQuery::Boolean(vec![
            (Occur::Must, SearchQuery::field("title", "fire")),
            (Occur::MustNot, SearchQuery::text("smoke")),
            (Occur::Should, SearchQuery::All.boosted(2.0)),
        ]);
        assert_eq!(query.to_string(), "(+title:(fire) -smoke (*)^2)");
    }
}
