//! gendex-core
//!
//! Generation rotation for on-disk search indexes: slot layouts, the toggle
//! pointer, rotation strategies, discovery of existing roots, and the data
//! model shared by writers, readers and searchers.

pub mod adapt;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod generation;
pub mod layout;
pub mod lock;
pub mod observer;
pub mod source;
pub mod telemetry;
pub mod toggle;
pub mod types;

pub use descriptor::{IndexDescriptor, RotationOptions, RotationStrategy};
pub use error::{Error, Result};
pub use factory::{Discovery, IndexFactory};
pub use layout::{Slot, SlotLayout, StructureKind};
pub use telemetry::{SharedSink, TelemetryEvent, TelemetrySink};
pub use types::{Document, Field, FieldStorage, SearchResult, SearchResultDataSet};
