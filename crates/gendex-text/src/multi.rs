//! One query over several indexes, results merged by score.
use gendex_core::error::{Error, Result};
use gendex_core::observer::{SearchObserver, Unobserved};
use gendex_core::telemetry::SharedSink;
use gendex_core::types::{SearchResult, SearchResultDataSet};
use gendex_core::IndexDescriptor;

use crate::query::SearchQuery;
use crate::searcher::{Fanout, FilterScope};

pub struct MultiIndexSearcher {
    inner: Fanout,
}

impl MultiIndexSearcher {
    /// Every descriptor must have a readable active generation.
    pub fn open(descriptors: &[IndexDescriptor], telemetry: SharedSink) -> Result<Self> {
        for descriptor in descriptors {
            let slot = descriptor.active_read_slot()?;
            if !descriptor.slot_has_index_files(&slot) {
                return Err(Error::NoIndexFiles(slot));
            }
        }
        Ok(Self { inner: Fanout::new(descriptors.to_vec(), telemetry, "multi-index searcher") })
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
