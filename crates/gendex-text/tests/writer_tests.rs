use serde::Serialize;
use tempfile::TempDir;

use gendex_core::adapt::{Column, FieldRule, FieldRules, NullPolicy, SourceType, Table, Value};
use gendex_core::telemetry::{self, RecordingSink, TelemetryEvent};
use gendex_core::types::{Document, FieldStorage};
use gendex_core::{Error, IndexDescriptor, Slot, StructureKind};
use gendex_text::{FieldLengthPolicy, IndexReader, IndexSearcher, IndexWriter, SearchQuery, WriterOptions};

fn options() -> WriterOptions {
    WriterOptions { memory_budget_bytes: 15_000_000, ..WriterOptions::default() }
}

fn double(tmp: &TempDir, name: &str) -> IndexDescriptor {
    IndexDescriptor::create(tmp.path().join(name), StructureKind::Double).unwrap()
}

#[test]
fn every_call_after_close_fails_as_closed() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "closed");
    let mut writer = IndexWriter::open(&d, options(), telemetry::noop()).unwrap();
    assert!(matches!(writer.optimize_with(1, true), Err(Error::NotImplemented(_))));
    writer.write(&Document::new().with("title", "only", FieldStorage::StoreAndAnalyze)).unwrap();
    writer.close().unwrap();

    assert!(writer.is_closed());
    assert!(matches!(writer.write(&Document::new()), Err(Error::Closed(_))));
    assert!(matches!(writer.close(), Err(Error::Closed(_))));
    assert!(matches!(writer.optimize(), Err(Error::Closed(_))));
    assert!(matches!(writer.optimize_with(1, false), Err(Error::Closed(_))));
    assert!(matches!(writer.document_count(), Err(Error::Closed(_))));
    assert!(matches!(writer.write_map([("k", "v")]), Err(Error::Closed(_))));

    let mut reader = IndexReader::open(&d, telemetry::noop()).unwrap();
    reader.close().unwrap();
    assert!(matches!(reader.read_documents(), Err(Error::Closed(_))));
    assert!(matches!(reader.close(), Err(Error::Closed(_))));

    let mut searcher = IndexSearcher::open(&d, telemetry::noop()).unwrap();
    searcher.close().unwrap();
    assert!(matches!(searcher.search(&SearchQuery::All, 5), Err(Error::Closed(_))));
}

#[test]
fn dropped_writer_neither_commits_nor_promotes() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "dropped");
    {
        let mut writer = IndexWriter::open(&d, options(), telemetry::noop()).unwrap();
        writer.write(&Document::new().with("title", "lost", FieldStorage::StoreAndAnalyze)).unwrap();
    }
    assert_eq!(d.toggle_switch(), Some(Slot::A));
    assert!(!d.has_index_files());
}

#[test]
fn bulk_rows_that_fail_adaptation_are_skipped() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "bulk");
    let mut table = Table::new(vec![Column::new("name", SourceType::Text), Column::new("qty", SourceType::Integer)]);
    table
        .push_row(vec![Value::from("hammer"), Value::from(3i64)])
        .push_row(vec![Value::Null, Value::Null])
        .push_row(vec![Value::from("short row")])
        .push_row(vec![Value::from("saw"), Value::Null]);

    let sink = RecordingSink::new();
    let mut writer = IndexWriter::open(&d, options(), sink.clone()).unwrap();
    let report = writer.write_table(&table).unwrap();
    assert_eq!((report.written, report.skipped), (2, 2));

    let map_report = writer.write_map([("colour", Some("red")), ("size", None)]).unwrap();
    assert_eq!((map_report.written, map_report.skipped), (2, 0));
    assert_eq!(writer.document_count().unwrap(), 4);
    writer.close().unwrap();

    let reader = IndexReader::open(&d, telemetry::noop()).unwrap();
    let docs = reader.read_documents().unwrap();
    assert_eq!(docs.len(), 4);
    let saw = docs.iter().find(|r| r.get("name") == Some("saw")).unwrap();
    assert_eq!(saw.get("qty"), None);
    let size = docs.iter().find(|r| r.get("Key") == Some("size")).unwrap();
    assert_eq!(size.get("Value"), None);

    match sink.events().as_slice() {
        [TelemetryEvent::WriteSummary { documents, optimized, .. }] => {
            assert_eq!(*documents, 4);
            assert!(!optimized);
        }
        other => panic!("unexpected telemetry {other:?}"),
    }
}

#[derive(Serialize)]
struct Tool {
    name: Option<String>,
    weight: Option<f64>,
}

#[test]
fn records_follow_per_type_null_rules() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "records");
    let mut rules = FieldRules::default();
    rules.set(SourceType::Other, FieldRule { null_policy: NullPolicy::Default("n/a".into()), ..FieldRule::default() });
    let opts = WriterOptions { rules, ..options() };

    let mut writer = IndexWriter::open(&d, opts, telemetry::noop()).unwrap();
    let report = writer
        .write_records([
            Tool { name: Some("adze".into()), weight: Some(1.5) },
            Tool { name: None, weight: None },
        ])
        .unwrap();
    assert_eq!((report.written, report.skipped), (2, 0));
    writer.close().unwrap();

    let reader = IndexReader::open(&d, telemetry::noop()).unwrap();
    let docs = reader.read_documents().unwrap();
    let blank = docs.iter().find(|r| r.get("name") == Some("n/a")).unwrap();
    assert_eq!(blank.get("weight"), Some("n/a"));
    assert_eq!(reader.field_names().unwrap(), ["name", "weight"]);
}

#[test]
fn delete_matching_and_optimize_shape_the_generation() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "shape");
    let sink = RecordingSink::new();
    let mut writer = IndexWriter::open(&d, options(), sink.clone()).unwrap();
    for (title, state) in [("axe", "ready"), ("bow", "draft"), ("net", "ready")] {
        writer
            .write(
                &Document::new()
                    .with("title", title, FieldStorage::StoreAndAnalyze)
                    .with("state", state, FieldStorage::StoreAndAnalyze),
            )
            .unwrap();
        writer.commit().unwrap();
    }
    writer.delete_matching(&SearchQuery::field("state", "draft")).unwrap();
    writer.optimize().unwrap();
    writer.close().unwrap();

    let reader = IndexReader::open(&d, telemetry::noop()).unwrap();
    assert_eq!(reader.document_count().unwrap(), 2);
    assert!(reader.read_documents().unwrap().iter().all(|r| r.get("state") == Some("ready")));
    assert!(matches!(sink.events().as_slice(), [TelemetryEvent::WriteSummary { optimized: true, .. }]));
}

#[test]
fn field_length_limit_caps_analyzed_tokens() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "limit");
    let opts = WriterOptions { field_length: FieldLengthPolicy::Limited(2), ..options() };
    let mut writer = IndexWriter::open(&d, opts, telemetry::noop()).unwrap();
    writer.write(&Document::new().with("body", "alpha bravo charlie", FieldStorage::StoreAndAnalyze)).unwrap();
    writer.close().unwrap();

    let searcher = IndexSearcher::open(&d, telemetry::noop()).unwrap();
    let hits = searcher.search(&SearchQuery::text("bravo"), 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].get("body"), Some("alpha bravo charlie"));
    assert!(searcher.search(&SearchQuery::text("charlie"), 10).unwrap().is_empty());
}

#[test]
fn store_only_and_analyze_only_fields() {
    let tmp = TempDir::new().unwrap();
    let d = double(&tmp, "storage");
    let mut writer = IndexWriter::open(&d, options(), telemetry::noop()).unwrap();
    writer
        .write(
            &Document::new()
                .with("id", "doc-7", FieldStorage::Store)
                .with("secret", "kingfisher", FieldStorage::Analyze)
                .with("tag", "river", FieldStorage::StoreAndAnalyze)
                .with("tag", "bird", FieldStorage::StoreAndAnalyze),
        )
        .unwrap();
    writer.close().unwrap();

    let searcher = IndexSearcher::open(&d, telemetry::noop()).unwrap();
    assert!(searcher.search(&SearchQuery::text("doc"), 10).unwrap().is_empty());
    let hits = searcher.search(&SearchQuery::text("kingfisher"), 10).unwrap();
    assert_eq!(hits.len(), 1);
    let names: Vec<&str> = hits[0].field_names().collect();
    assert_eq!(names, ["id", "tag", "tag(1)"]);
    assert_eq!(hits[0].get("tag(1)"), Some("bird"));
}
