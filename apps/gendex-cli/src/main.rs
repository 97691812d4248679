mod args;

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use gendex_core::config::{Config, Settings};
use gendex_core::source::TextDirectorySource;
use gendex_core::telemetry::SharedSink;
use gendex_core::{IndexDescriptor, IndexFactory, StructureKind};
use gendex_telemetry::sink_from_settings;
use gendex_text::{FilterScope, IndexReader, IndexWriter, MultiIndexSearcher, SearchQuery, WriterOptions};

use args::{Args, Command};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config_dir {
        Some(dir) => {
            let env_name = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
            Config::load_from(dir, &env_name)
        }
        None => Config::load(),
    }
    .context("loading configuration")?;
    let settings = config.settings()?;
    let telemetry = sink_from_settings(&settings.telemetry).context("starting telemetry sink")?;

    match args.command {
        Command::Inspect { root } => inspect(&settings, &root),
        Command::Create { root, kind } => {
            let d = IndexDescriptor::create_with(&root, kind, settings.rotation_options())?;
            println!("created {} index at {}", d.kind(), d.root().display());
            Ok(())
        }
        Command::Ingest { root, data_dir, append, analyzer, limit } => {
            let d = existing(&settings, &root)?;
            let mut options = WriterOptions::from_settings(&settings.writer).analyzer(analyzer);
            if append {
                options = options.append();
            }
            let mut source = TextDirectorySource::new(&data_dir);
            if let Some(limit) = limit {
                source = source.limit(limit);
            }
            let records = source.records();
            info!(files = records.len(), dir = %data_dir.display(), "ingesting");

            let mut writer = IndexWriter::open(&d, options, telemetry)?;
            let report = writer.write_records(records)?;
            writer.close()?;
            println!(
                "wrote {} documents ({} skipped), active slot now {}",
                report.written,
                report.skipped,
                d.active_read_slot()?.display()
            );
            Ok(())
        }
        Command::Search { query, roots, field, limit, filters } => {
            let descriptors = roots.iter().map(|r| existing(&settings, r)).collect::<anyhow::Result<Vec<_>>>()?;
            let query = match field {
                Some(field) => SearchQuery::field(field, query),
                None => SearchQuery::text(query),
            };
            search(&descriptors, &query, limit, filters, telemetry)
        }
        Command::Delete { root } => {
            let d = existing(&settings, &root)?;
            d.delete_index_files()?;
            println!("deleted generations under {}", d.root().display());
            Ok(())
        }
        Command::SyncMirror { root } => {
            let d = existing(&settings, &root)?;
            if d.kind() != StructureKind::Cyclical {
                bail!("{} is a {} index; only cyclical indexes have a mirror", root.display(), d.kind());
            }
            let report = d.sync_indexes_to_mirror()?;
            if !report.is_complete() {
                for (path, e) in &report.failures {
                    eprintln!("  {}: {e}", path.display());
                }
                bail!("mirror is fractured: {} of {} file operations failed", report.failures.len(), report.attempted());
            }
            println!("mirror synced ({} files copied)", report.copied);
            Ok(())
        }
    }
}

/// Descriptor for a root that must already exist and be well formed.
fn existing(settings: &Settings, root: &Path) -> anyhow::Result<IndexDescriptor> {
    if !root.is_dir() {
        bail!("{} does not exist; run `gendex create` first", root.display());
    }
    let found = IndexFactory::new(settings.rotation_options()).discover(root);
    if found.degraded {
        bail!("{} has a toggle pointer but is missing a base slot", root.display());
    }
    Ok(found.descriptor)
}

fn inspect(settings: &Settings, root: &Path) -> anyhow::Result<()> {
    let found = IndexFactory::new(settings.rotation_options()).discover(root);
    let d = &found.descriptor;
    println!("root:      {}", d.root().display());
    println!("structure: {}", d.kind());
    if let Some(slot) = d.toggle_switch() {
        println!("toggle:    {slot}");
    }
    println!("readable:  {}", found.readable);
    if found.degraded {
        println!("degraded:  a base slot is missing");
        return Ok(());
    }
    println!("active:    {}", d.active_read_slot()?.display());
    println!("next:      {}", d.next_write_slot()?.display());
    if found.readable {
        let reader = IndexReader::open(d, gendex_core::telemetry::noop())?;
        println!("documents: {}", reader.document_count()?);
        println!("fields:    {}", reader.field_names()?.join(", "));
    }
    Ok(())
}

fn search(
    descriptors: &[IndexDescriptor],
    query: &SearchQuery,
    limit: usize,
    filters: bool,
    telemetry: SharedSink,
) -> anyhow::Result<()> {
    let searcher = MultiIndexSearcher::open(descriptors, telemetry)?;
    let scope = if filters { FilterScope::Index } else { FilterScope::Results };
    let data = searcher.full_search(query, limit, scope)?;
    for (rank, result) in data.results().iter().enumerate() {
        println!("{:>3}. [{}] score {:.3}", rank + 1, result.source(), result.score());
        for (name, value) in result.fields() {
            let value: String = value.chars().take(120).collect();
            println!("       {name}: {value}");
        }
    }
    if filters {
        for filter in data.filters() {
            let values: Vec<&str> = filter.values.iter().map(|v| v.value.as_str()).take(10).collect();
            println!("filter {} ({} values): {}", filter.field, filter.values.len(), values.join(" | "));
        }
    }
    println!("{} results", data.len());
    Ok(())
}
