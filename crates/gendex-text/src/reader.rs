//! Sequential access to the documents of an index's active generation.
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use gendex_core::error::{Error, Result};
use gendex_core::observer::{BeginEvent, EndEvent, Operation, SearchObserver, Unobserved};
use gendex_core::telemetry::{SharedSink, TelemetryEvent};
use gendex_core::types::SearchResult;
use gendex_core::IndexDescriptor;

use crate::engine::Generation;

/// Slice of a generation's documents in segment order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub skip: usize,
    pub take: Option<usize>,
}

impl Window {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(skip: usize, take: usize) -> Self {
        Self { skip, take: Some(take) }
    }
}

pub struct IndexReader {
    descriptor: IndexDescriptor,
    telemetry: SharedSink,
    closed: bool,
}

impl IndexReader {
    /// Fails with `NoIndexFiles` when the active slot holds no generation.
    pub fn open(descriptor: &IndexDescriptor, telemetry: SharedSink) -> Result<Self> {
        let slot = descriptor.active_read_slot()?;
        if !descriptor.slot_has_index_files(&slot) {
            return Err(Error::NoIndexFiles(slot));
        }
        Ok(Self { descriptor: descriptor.clone(), telemetry, closed: false })
    }

    /// Pins the generation that is active right now. It stays readable
    /// through later promotions until dropped.
    pub fn open_generation(&self) -> Result<Generation> {
        self.ensure_open()?;
        Generation::open(&self.descriptor)
    }

    pub fn read_documents(&self) -> Result<Vec<SearchResult>> {
        self.read_documents_with(Window::all(), &mut Unobserved)
    }

    pub fn read_documents_with(&self, window: Window, observer: &mut dyn SearchObserver) -> Result<Vec<SearchResult>> {
        self.ensure_open()?;
        let started = Instant::now();
        let sources = [self.descriptor.name()];
        let begin = BeginEvent { operation: Operation::Read, sources: &sources, query: None };
        if observer.begin(&begin).is_break() {
            debug!(index = %sources[0], "read canceled at begin");
            self.finish(observer, &sources, 0, true, started);
            return Ok(Vec::new());
        }

        match self.gather(window, observer) {
            Ok((results, canceled)) => {
                self.finish(observer, &sources, results.len(), canceled, started);
                Ok(results)
            }
            Err(e) => {
                debug!(index = %sources[0], error = %e, "read failed");
                self.finish(observer, &sources, 0, false, started);
                Err(e)
            }
        }
    }

    fn gather(&self, window: Window, observer: &mut dyn SearchObserver) -> Result<(Vec<SearchResult>, bool)> {
        let generation = Generation::open(&self.descriptor)?;
        let mut results = Vec::new();
        let mut canceled = false;
        let documents = generation.documents().skip(window.skip).take(window.take.unwrap_or(usize::MAX));
        for result in documents {
            let result = result?;
            if observer.result_found(&result).is_break() {
                canceled = true;
                break;
            }
            results.push(result);
        }
        Ok((results, canceled))
    }

    pub fn document_count(&self) -> Result<u64> {
        Ok(self.open_generation()?.num_docs())
    }

    /// Distinct stored field names in order of first appearance.
    pub fn field_names(&self) -> Result<Vec<String>> {
        let generation = self.open_generation()?;
        let mut names: Vec<String> = Vec::new();
        for result in generation.documents() {
            for name in result?.field_names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed("index reader"))
        } else {
            Ok(())
        }
    }

    fn finish(
        &self,
        observer: &mut dyn SearchObserver,
        sources: &[String],
        results: usize,
        canceled: bool,
        started: Instant,
    ) {
        observer.end(&EndEvent { operation: Operation::Read, sources, results, canceled, elapsed: started.elapsed() });
        self.telemetry.emit(TelemetryEvent::ReadSummary {
            index: self.descriptor.name(),
            documents: results as u64,
            canceled,
            timestamp: Utc::now(),
        });
    }
}
