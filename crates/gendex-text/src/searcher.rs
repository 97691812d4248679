//! Ranked search over one index, and the fan-out shared with the
//! multi-index searcher.
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use gendex_core::error::{Error, Result};
use gendex_core::observer::{BeginEvent, EndEvent, Operation, SearchObserver, Unobserved};
use gendex_core::telemetry::{SharedSink, TelemetryEvent};
use gendex_core::types::{SearchResult, SearchResultDataSet};
use gendex_core::IndexDescriptor;

use crate::engine::Generation;
use crate::query::SearchQuery;

/// Which documents feed the filters of a full search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterScope {
    /// Only the returned results.
    #[default]
    Results,
    /// Every document of the searched generations.
    Index,
}

struct Outcome {
    results: Vec<SearchResult>,
    generations: Vec<Generation>,
}

/// Opens the active generation of each descriptor per call, runs the query
/// on each and merges hits by score.
pub(crate) struct Fanout {
    descriptors: Vec<IndexDescriptor>,
    telemetry: SharedSink,
    closed: bool,
    what: &'static str,
}

impl Fanout {
    pub(crate) fn new(descriptors: Vec<IndexDescriptor>, telemetry: SharedSink, what: &'static str) -> Self {
        Self { descriptors, telemetry, closed: false, what }
    }

    pub(crate) fn search(
        &self,
        query: &SearchQuery,
        limit: usize,
        observer: &mut dyn SearchObserver,
    ) -> Result<Vec<SearchResult>> {
        Ok(self.run(query, limit, observer)?.results)
    }

    pub(crate) fn full_search(
        &self,
        query: &SearchQuery,
        limit: usize,
        scope: FilterScope,
        observer: &mut dyn SearchObserver,
    ) -> Result<SearchResultDataSet> {
        let Outcome { results, generations } = self.run(query, limit, observer)?;
        match scope {
            FilterScope::Results => Ok(SearchResultDataSet::new(results)),
            FilterScope::Index => {
                let mut population = Vec::new();
                for generation in &generations {
                    for doc in generation.documents() {
                        population.push(doc?);
                    }
                }
                Ok(SearchResultDataSet::with_filter_source(results, &population))
            }
        }
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed(self.what))
        } else {
            Ok(())
        }
    }

    fn run(&self, query: &SearchQuery, limit: usize, observer: &mut dyn SearchObserver) -> Result<Outcome> {
        self.ensure_open()?;
        let started = Instant::now();
        let sources: Vec<String> = self.descriptors.iter().map(IndexDescriptor::name).collect();
        let query_text = query.to_string();
        let begin = BeginEvent { operation: Operation::Search, sources: &sources, query: Some(&query_text) };
        if observer.begin(&begin).is_break() {
            debug!(query = %query_text, "search canceled at begin");
            self.finish(observer, &sources, &query_text, 0, true, started);
            return Ok(Outcome { results: Vec::new(), generations: Vec::new() });
        }

        match self.gather(query, limit, observer) {
            Ok((results, canceled, generations)) => {
                self.finish(observer, &sources, &query_text, results.len(), canceled, started);
                Ok(Outcome { results, generations })
            }
            Err(e) => {
                debug!(query = %query_text, error = %e, "search failed");
                self.finish(observer, &sources, &query_text, 0, false, started);
                Err(e)
            }
        }
    }

    fn gather(
        &self,
        query: &SearchQuery,
        limit: usize,
        observer: &mut dyn SearchObserver,
    ) -> Result<(Vec<SearchResult>, bool, Vec<Generation>)> {
        let generations = self.descriptors.iter().map(Generation::open).collect::<Result<Vec<_>>>()?;
        let mut hits = Vec::new();
        for (source, generation) in generations.iter().enumerate() {
            for (score, address) in generation.top_docs(query, limit)? {
                hits.push((score, source, address));
            }
        }
        // Stable, so equal scores keep descriptor order.
        hits.sort_by(|a, b| b.0.total_cmp(&a.0));
        hits.truncate(limit);

        let mut results = Vec::with_capacity(hits.len());
        let mut canceled = false;
        for (score, source, address) in hits {
            let result = generations[source].fetch(address, score)?;
            if observer.result_found(&result).is_break() {
                canceled = true;
                break;
            }
            results.push(result);
        }
        Ok((results, canceled, generations))
    }

    fn finish(
        &self,
        observer: &mut dyn SearchObserver,
        sources: &[String],
        query: &str,
        results: usize,
        canceled: bool,
        started: Instant,
    ) {
        let elapsed = started.elapsed();
        observer.end(&EndEvent { operation: Operation::Search, sources, results, canceled, elapsed });
        self.telemetry.emit(TelemetryEvent::SearchSummary {
            indexes: sources.to_vec(),
            query: query.to_string(),
            results: results as u64,
            canceled,
            elapsed_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }
}

pub struct IndexSearcher {
    inner: Fanout,
}

impl IndexSearcher {
    /// Fails with `NoIndexFiles` when the active slot holds no generation.
    pub fn open(descriptor: &IndexDescriptor, telemetry: SharedSink) -> Result<Self> {
        let slot = descriptor.active_read_slot()?;
        if !descriptor.slot_has_index_files(&slot) {
            return Err(Error::NoIndexFiles(slot));
        }
        Ok(Self { inner: Fanout::new(vec![descriptor.clone()], telemetry, "index searcher") })
    }

    pub fn search(&self, query: &SearchQuery, limit: usize) -> Result<Vec<SearchResult>> {
        self.inner.search(query, limit, &mut Unobserved)
    }

    pub fn search_with(
        &self,
        query: &SearchQuery,
        limit: usize,
        observer: &mut dyn SearchObserver,
    ) -> Result<Vec<SearchResult>> {
        self.inner.search(query, limit, observer)
    }

    /// Search plus per-field filters over `scope`.
    pub fn full_search(&self, query: &SearchQuery, limit: usize, scope: FilterScope) -> Result<SearchResultDataSet> {
        self.inner.full_search(query, limit, scope, &mut Unobserved)
    }

    pub fn full_search_with(
        &self,
        query: &SearchQuery,
        limit: usize,
        scope: FilterScope,
        observer: &mut dyn SearchObserver,
    ) -> Result<SearchResultDataSet> {
        self.inner.full_search(query, limit, scope, observer)
    }

    pub fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
