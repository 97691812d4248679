//! gendex-telemetry
//!
//! Background JSON-lines sink for usage events. `emit` only enqueues onto a
//! bounded channel; a worker thread appends batches to the log file when the
//! batch fills up or the flush interval passes. A full queue drops events.
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use gendex_core::config::{expand_path, TelemetrySettings};
use gendex_core::error::Result;
use gendex_core::telemetry::{self, SharedSink, TelemetryEvent, TelemetrySink};

#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub path: PathBuf,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl SinkOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = TelemetrySettings::default();
        Self {
            path: path.into(),
            queue_capacity: defaults.queue_capacity,
            batch_size: defaults.batch_size,
            flush_interval: Duration::from_millis(defaults.flush_interval_ms),
        }
    }

    pub fn from_settings(settings: &TelemetrySettings) -> Self {
        Self {
            path: expand_path(&settings.path),
            queue_capacity: settings.queue_capacity.max(1),
            batch_size: settings.batch_size.max(1),
            flush_interval: Duration::from_millis(settings.flush_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    dropped: AtomicU64,
    written: AtomicU64,
}

pub struct JsonLinesSink {
    sender: Option<Sender<TelemetryEvent>>,
    worker: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl JsonLinesSink {
    /// Opens (or creates) the log file up front so a bad path fails here
    /// rather than silently in the worker.
    pub fn spawn(options: SinkOptions) -> Result<Self> {
        if let Some(parent) = options.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&options.path)?;
        let (sender, receiver) = bounded::<TelemetryEvent>(options.queue_capacity);
        let counters = Arc::new(Counters::default());

        let worker = {
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name("gendex-telemetry".to_string())
                .spawn(move || {
                    let mut out = BatchWriter { file: BufWriter::new(file), buffer: Vec::with_capacity(options.batch_size), counters };
                    let mut last_flush = Instant::now();
                    loop {
                        let wait = options.flush_interval.saturating_sub(last_flush.elapsed());
                        match receiver.recv_timeout(wait) {
                            Ok(event) => {
                                out.buffer.push(event);
                                if out.buffer.len() >= options.batch_size {
                                    out.flush();
                                    last_flush = Instant::now();
                                }
                            }
                            Err(RecvTimeoutError::Timeout) => {
                                out.flush();
                                last_flush = Instant::now();
                            }
                            Err(RecvTimeoutError::Disconnected) => {
                                out.flush();
                                break;
                            }
                        }
                    }
                    debug!("telemetry worker stopped");
                })?
        };

        Ok(Self { sender: Some(sender), worker: Some(worker), counters })
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.counters.written.load(Ordering::Relaxed)
    }

    /// Flushes whatever is queued and stops the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("telemetry worker panicked");
            }
        }
    }
}

impl TelemetrySink for JsonLinesSink {
    fn emit(&self, event: TelemetryEvent) {
        let Some(sender) = &self.sender else { return };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("telemetry queue full, event dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        self.stop();
    }
}

struct BatchWriter {
    file: BufWriter<File>,
    buffer: Vec<TelemetryEvent>,
    counters: Arc<Counters>,
}

impl BatchWriter {
    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        let count = batch.len() as u64;
        let result = batch
            .iter()
            .try_for_each(|event| {
                serde_json::to_writer(&mut self.file, event)?;
                self.file.write_all(b"\n").map_err(serde_json::Error::io)
            })
            .map_err(std::io::Error::from)
            .and_then(|()| self.file.flush());
        match result {
            Ok(()) => {
                self.counters.written.fetch_add(count, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.dropped.fetch_add(count, Ordering::Relaxed);
                warn!(error = %e, events = count, "failed to append telemetry batch");
            }
        }
    }
}

/// The sink described by `settings`: a background writer when enabled, a
/// no-op otherwise.
pub fn sink_from_settings(settings: &TelemetrySettings) -> Result<SharedSink> {
    if !settings.enabled {
        return Ok(telemetry::noop());
    }
    Ok(Arc::new(JsonLinesSink::spawn(SinkOptions::from_settings(settings))?))
}
