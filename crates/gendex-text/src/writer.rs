//! Builds one generation in the descriptor's write slot and promotes it on
//! close.
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tantivy::tokenizer::TextAnalyzer;
use tantivy::Index;
use tracing::{debug, info, warn};

use gendex_core::adapt::{BulkReport, FieldRules, Table, Value};
use gendex_core::config::WriterSettings;
use gendex_core::error::{Error, Result};
use gendex_core::telemetry::{SharedSink, TelemetryEvent};
use gendex_core::types::Document;
use gendex_core::IndexDescriptor;

use crate::engine::{create_index, index_parts, open_index, to_engine_document, FieldLengthPolicy};
use crate::query::{QueryContext, SearchQuery};
use crate::schema::{AnalyzerKind, EngineFields};

/// Smallest arena tantivy accepts for a single indexing thread.
const MIN_MEMORY_BUDGET: usize = 15_000_000;

#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub analyzer: AnalyzerKind,
    /// Start a fresh generation instead of appending to the slot's current one.
    pub create: bool,
    pub field_length: FieldLengthPolicy,
    pub memory_budget_bytes: usize,
    /// Adaptation rules for the bulk entry points.
    pub rules: FieldRules,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::from_settings(&WriterSettings::default())
    }
}

impl WriterOptions {
    pub fn from_settings(settings: &WriterSettings) -> Self {
        Self {
            analyzer: AnalyzerKind::default(),
            create: true,
            field_length: FieldLengthPolicy::from_limit(settings.field_length_limit),
            memory_budget_bytes: settings.memory_budget_bytes,
            rules: FieldRules::default(),
        }
    }

    pub fn append(mut self) -> Self {
        self.create = false;
        self
    }

    pub fn analyzer(mut self, analyzer: AnalyzerKind) -> Self {
        self.analyzer = analyzer;
        self
    }
}

struct OpenWriter {
    index: Index,
    writer: tantivy::IndexWriter,
    fields: EngineFields,
    analyzer: TextAnalyzer,
}

pub struct IndexWriter {
    descriptor: IndexDescriptor,
    target: PathBuf,
    state: Option<OpenWriter>,
    rules: FieldRules,
    field_length: FieldLengthPolicy,
    telemetry: SharedSink,
    written: u64,
    optimized: bool,
}

impl IndexWriter {
    /// Opens the engine writer on the descriptor's next write slot.
    pub fn open(descriptor: &IndexDescriptor, options: WriterOptions, telemetry: SharedSink) -> Result<Self> {
        let target = descriptor.next_write_slot()?;
        let mut create = options.create;
        if !create && !descriptor.slot_has_index_files(&target) {
            info!(slot = %target.display(), "nothing to append to, creating a new generation");
            create = true;
        }
        let index = if create { create_index(&target, options.analyzer)? } else { open_index(&target)? };
        let (fields, analyzer) = index_parts(&index)?;
        let budget = options.memory_budget_bytes.max(MIN_MEMORY_BUDGET);
        let writer: tantivy::IndexWriter = index.writer_with_num_threads(1, budget).map_err(Error::engine)?;
        info!(index = %descriptor.name(), slot = %target.display(), create, "index writer opened");
        Ok(Self {
            descriptor: descriptor.clone(),
            target,
            state: Some(OpenWriter { index, writer, fields, analyzer }),
            rules: options.rules,
            field_length: options.field_length,
            telemetry,
            written: 0,
            optimized: false,
        })
    }

    /// Slot this writer is building.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    /// Documents accepted since the writer was opened.
    pub fn document_count(&self) -> Result<u64> {
        self.open_state()?;
        Ok(self.written)
    }

    pub fn write(&mut self, doc: &Document) -> Result<()> {
        let field_length = self.field_length;
        let open = self.state.as_mut().ok_or(Error::Closed("index writer"))?;
        let engine_doc = to_engine_document(doc, &open.fields, &mut open.analyzer, field_length)?;
        open.writer.add_document(engine_doc).map_err(Error::engine)?;
        self.written += 1;
        Ok(())
    }

    /// One document per row, fields named after the columns.
    pub fn write_table(&mut self, table: &Table) -> Result<BulkReport> {
        self.open_state()?;
        let mut report = BulkReport::default();
        for (row, values) in table.rows.iter().enumerate() {
            let outcome = self.rules.document_from_row(&table.columns, values).and_then(|doc| self.write(&doc));
            tally(&mut report, row, outcome)?;
        }
        debug!(written = report.written, skipped = report.skipped, "table written");
        Ok(report)
    }

    /// One document per entry, with `Key` and `Value` fields.
    pub fn write_map<I, K, V>(&mut self, entries: I) -> Result<BulkReport>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        self.open_state()?;
        let mut report = BulkReport::default();
        for (row, (key, value)) in entries.into_iter().enumerate() {
            let outcome =
                self.rules.document_from_pair(&key.into(), &value.into()).and_then(|doc| self.write(&doc));
            tally(&mut report, row, outcome)?;
        }
        Ok(report)
    }

    /// One document per record, a field per top-level property.
    pub fn write_records<T, I>(&mut self, records: I) -> Result<BulkReport>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        self.open_state()?;
        let mut report = BulkReport::default();
        for (row, record) in records.into_iter().enumerate() {
            let outcome = self.rules.document_from_record(&record).and_then(|doc| self.write(&doc));
            tally(&mut report, row, outcome)?;
        }
        debug!(written = report.written, skipped = report.skipped, "records written");
        Ok(report)
    }

    /// Deletes every document of this generation that matches `query`.
    pub fn delete_matching(&mut self, query: &SearchQuery) -> Result<()> {
        let open = self.state.as_mut().ok_or(Error::Closed("index writer"))?;
        let context = QueryContext { index: &open.index, fields: open.fields, analyzer: &open.analyzer };
        let query = query.build(&context)?;
        open.writer.delete_query(query).map_err(Error::engine)?;
        Ok(())
    }

    /// Commits pending documents without ending the generation.
    pub fn commit(&mut self) -> Result<()> {
        let open = self.state.as_mut().ok_or(Error::Closed("index writer"))?;
        open.writer.commit().map_err(Error::engine)?;
        Ok(())
    }

    /// Commits, then merges every searchable segment into one and waits.
    pub fn optimize(&mut self) -> Result<()> {
        let open = self.state.as_mut().ok_or(Error::Closed("index writer"))?;
        open.writer.commit().map_err(Error::engine)?;
        let segments = open.index.searchable_segment_ids().map_err(Error::engine)?;
        if segments.len() > 1 {
            open.writer.merge(&segments).wait().map_err(Error::engine)?;
        }
        debug!(slot = %self.target.display(), merged = segments.len(), "optimized");
        self.optimized = true;
        Ok(())
    }

    /// Partial or background merges need a merge scheduler, which this writer
    /// does not have.
    pub fn optimize_with(&mut self, _max_segments: usize, _wait: bool) -> Result<()> {
        self.open_state()?;
        Err(Error::NotImplemented("optimize with a segment target or wait flag"))
    }

    /// Commits, releases the engine writer, then rotates: Single does
    /// nothing more, Double promotes, Cyclical copies the mirror and
    /// promotes. A fractured copy is reported and not promoted.
    pub fn close(&mut self) -> Result<()> {
        let OpenWriter { mut writer, index, .. } = self.state.take().ok_or(Error::Closed("index writer"))?;
        writer.commit().map_err(Error::engine)?;
        writer.wait_merging_threads().map_err(Error::engine)?;
        drop(index);

        let finished = self.descriptor.finish_generation();
        self.telemetry.emit(TelemetryEvent::WriteSummary {
            index: self.descriptor.name(),
            documents: self.written,
            optimized: self.optimized,
            timestamp: Utc::now(),
        });
        match &finished {
            Ok(()) => info!(index = %self.descriptor.name(), documents = self.written, "generation finished"),
            Err(e) => warn!(index = %self.descriptor.name(), error = %e, "generation written but not promoted"),
        }
        finished
    }

    fn open_state(&self) -> Result<&OpenWriter> {
        self.state.as_ref().ok_or(Error::Closed("index writer"))
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if self.state.take().is_some() {
            warn!(slot = %self.target.display(), "index writer dropped without close, uncommitted documents discarded");
        }
    }
}

/// Closed is fatal to a batch; anything else only skips the row.
fn tally(report: &mut BulkReport, row: usize, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => report.written += 1,
        Err(e @ Error::Closed(_)) => return Err(e),
        Err(e) => {
            report.skipped += 1;
            warn!(row, error = %e, "skipping row");
        }
    }
    Ok(())
}
