//! Index descriptors and the rotation strategies behind them.
//!
//! A descriptor is one index root plus the strategy that knows where readers
//! read, where the next writer writes, and how a finished generation becomes
//! visible:
//!
//! - **Single**: one directory, no rotation.
//! - **Double**: slots `A`/`B` behind `Toggle.txt`; the writer fills the
//!   inactive slot and promotion flips the pointer.
//! - **Cyclical**: Double plus a `Mirror` slot the writer always targets;
//!   before promotion the mirror is copied over the inactive slot.
//!
//! Exactly one writer per root is assumed. Nothing here stops two processes
//! from promoting the same root at once.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::generation::{clear_slot, replace_slot_contents, GenerationMarkers, SyncReport};
use crate::layout::{Slot, SlotLayout, StructureKind};
use crate::lock::LockMarker;
use crate::toggle;

#[derive(Debug, Clone)]
pub struct RotationOptions {
    pub lock_timeout: Duration,
    pub lock_poll_interval: Duration,
    pub markers: GenerationMarkers,
}

impl Default for RotationOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(30),
            lock_poll_interval: Duration::from_millis(50),
            markers: GenerationMarkers::default(),
        }
    }
}

pub trait RotationStrategy: Send + Sync + fmt::Debug {
    fn kind(&self) -> StructureKind;

    fn active_read_slot(&self, layout: &SlotLayout) -> Result<PathBuf>;

    fn next_write_slot(&self, layout: &SlotLayout) -> Result<PathBuf>;

    /// Creates whatever directories and pointer the kind needs.
    fn ensure_layout(&self, layout: &SlotLayout) -> Result<()>;

    /// Makes the most recently written generation the active one.
    fn promote(&self, layout: &SlotLayout) -> Result<()>;

    /// Runs once a writer has committed into `next_write_slot`.
    fn finish_generation(&self, layout: &SlotLayout, options: &RotationOptions) -> Result<()>;

    /// Removes every generation, leaving an empty but well-formed layout.
    fn delete_generations(&self, layout: &SlotLayout) -> Result<()>;
}

#[derive(Debug)]
pub struct SingleSlot;

impl RotationStrategy for SingleSlot {
    fn kind(&self) -> StructureKind {
        StructureKind::Single
    }

    fn active_read_slot(&self, layout: &SlotLayout) -> Result<PathBuf> {
        Ok(layout.root().to_path_buf())
    }

    fn next_write_slot(&self, layout: &SlotLayout) -> Result<PathBuf> {
        Ok(layout.root().to_path_buf())
    }

    fn ensure_layout(&self, layout: &SlotLayout) -> Result<()> {
        fs::create_dir_all(layout.root())?;
        Ok(())
    }

    fn promote(&self, _layout: &SlotLayout) -> Result<()> {
        Ok(())
    }

    fn finish_generation(&self, _layout: &SlotLayout, _options: &RotationOptions) -> Result<()> {
        Ok(())
    }

    fn delete_generations(&self, layout: &SlotLayout) -> Result<()> {
        let mut report = SyncReport::default();
        clear_slot(layout.root(), &mut report);
        fs::create_dir_all(layout.root())?;
        fractured_unless_complete(layout, &report)
    }
}

#[derive(Debug)]
pub struct DoubleBuffered;

impl DoubleBuffered {
    fn active(layout: &SlotLayout) -> Slot {
        toggle::read_pointer(&layout.pointer_file())
    }
}

impl RotationStrategy for DoubleBuffered {
    fn kind(&self) -> StructureKind {
        StructureKind::Double
    }

    fn active_read_slot(&self, layout: &SlotLayout) -> Result<PathBuf> {
        Ok(layout.slot(Self::active(layout)))
    }

    fn next_write_slot(&self, layout: &SlotLayout) -> Result<PathBuf> {
        Ok(layout.slot(Self::active(layout).other()))
    }

    fn ensure_layout(&self, layout: &SlotLayout) -> Result<()> {
        fs::create_dir_all(layout.slot_a())?;
        fs::create_dir_all(layout.slot_b())?;
        let pointer = layout.pointer_file();
        if !pointer.exists() {
            toggle::write_pointer(&pointer, Slot::A)?;
        } else if toggle::try_read_pointer(&pointer).is_none() {
            // Pin the value readers already resolve to.
            toggle::write_pointer(&pointer, toggle::DEFAULT_SLOT)?;
        }
        Ok(())
    }

    fn promote(&self, layout: &SlotLayout) -> Result<()> {
        let current = Self::active(layout);
        let next = current.other();
        toggle::write_pointer(&layout.pointer_file(), next)?;
        info!(root = %layout.root().display(), from = %current, to = %next, "promoted generation");
        Ok(())
    }

    fn finish_generation(&self, layout: &SlotLayout, _options: &RotationOptions) -> Result<()> {
        self.promote(layout)
    }

    fn delete_generations(&self, layout: &SlotLayout) -> Result<()> {
        self.promote(layout)?;
        let mut report = SyncReport::default();
        clear_slot(&layout.slot_a(), &mut report);
        clear_slot(&layout.slot_b(), &mut report);
        fs::create_dir_all(layout.slot_a())?;
        fs::create_dir_all(layout.slot_b())?;
        fractured_unless_complete(layout, &report)
    }
}

#[derive(Debug)]
pub struct Cyclical {
    base: DoubleBuffered,
}

impl Cyclical {
    pub fn new() -> Self {
        Self { base: DoubleBuffered }
    }
}

impl Default for Cyclical {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationStrategy for Cyclical {
    fn kind(&self) -> StructureKind {
        StructureKind::Cyclical
    }

    fn active_read_slot(&self, layout: &SlotLayout) -> Result<PathBuf> {
        self.base.active_read_slot(layout)
    }

    fn next_write_slot(&self, layout: &SlotLayout) -> Result<PathBuf> {
        Ok(layout.mirror_slot())
    }

    fn ensure_layout(&self, layout: &SlotLayout) -> Result<()> {
        self.base.ensure_layout(layout)?;
        fs::create_dir_all(layout.mirror_slot())?;
        Ok(())
    }

    fn promote(&self, layout: &SlotLayout) -> Result<()> {
        self.base.promote(layout)
    }

    fn finish_generation(&self, layout: &SlotLayout, _options: &RotationOptions) -> Result<()> {
        let report = copy_mirror(layout);
        if !report.is_complete() {
            warn!(root = %layout.root().display(), "mirror copy incomplete, generation not promoted");
            return fractured_unless_complete(layout, &report);
        }
        self.promote(layout)
    }

    fn delete_generations(&self, layout: &SlotLayout) -> Result<()> {
        self.base.delete_generations(layout)?;
        let mut report = SyncReport::default();
        clear_slot(&layout.mirror_slot(), &mut report);
        fs::create_dir_all(layout.mirror_slot())?;
        fractured_unless_complete(layout, &report)
    }
}

/// Strategy for roots whose structure could not be determined. Every call
/// that needs a slot fails.
#[derive(Debug)]
pub struct Unsupported;

impl RotationStrategy for Unsupported {
    fn kind(&self) -> StructureKind {
        StructureKind::Unknown
    }

    fn active_read_slot(&self, _layout: &SlotLayout) -> Result<PathBuf> {
        Err(Error::UnsupportedStructure(StructureKind::Unknown))
    }

    fn next_write_slot(&self, _layout: &SlotLayout) -> Result<PathBuf> {
        Err(Error::UnsupportedStructure(StructureKind::Unknown))
    }

    fn ensure_layout(&self, _layout: &SlotLayout) -> Result<()> {
        Err(Error::UnsupportedStructure(StructureKind::Unknown))
    }

    fn promote(&self, _layout: &SlotLayout) -> Result<()> {
        Err(Error::UnsupportedStructure(StructureKind::Unknown))
    }

    fn finish_generation(&self, _layout: &SlotLayout, _options: &RotationOptions) -> Result<()> {
        Err(Error::UnsupportedStructure(StructureKind::Unknown))
    }

    fn delete_generations(&self, _layout: &SlotLayout) -> Result<()> {
        Err(Error::UnsupportedStructure(StructureKind::Unknown))
    }
}

fn strategy_for(kind: StructureKind) -> Arc<dyn RotationStrategy> {
    match kind {
        StructureKind::Unknown => Arc::new(Unsupported),
        StructureKind::Single => Arc::new(SingleSlot),
        StructureKind::Double => Arc::new(DoubleBuffered),
        StructureKind::Cyclical => Arc::new(Cyclical::new()),
    }
}

fn fractured_unless_complete(layout: &SlotLayout, report: &SyncReport) -> Result<()> {
    if report.is_complete() {
        Ok(())
    } else {
        Err(Error::Fractured {
            root: layout.root().to_path_buf(),
            attempted: report.attempted(),
            failed: report.failures.len(),
        })
    }
}

/// Overwrites the inactive base slot with the mirror's files.
fn copy_mirror(layout: &SlotLayout) -> SyncReport {
    let active = toggle::read_pointer(&layout.pointer_file());
    let target = layout.slot(active.other());
    debug!(root = %layout.root().display(), target = %active.other(), "copying mirror into inactive slot");
    replace_slot_contents(&layout.mirror_slot(), &target)
}

/// One index root and the strategy governing its generations.
#[derive(Debug, Clone)]
pub struct IndexDescriptor {
    layout: SlotLayout,
    strategy: Arc<dyn RotationStrategy>,
    options: RotationOptions,
}

impl IndexDescriptor {
    /// Creates (or adopts) a root of the given kind on disk. A fresh
    /// Double/Cyclical root starts pointing at slot `A`.
    pub fn create(root: impl Into<PathBuf>, kind: StructureKind) -> Result<Self> {
        Self::create_with(root, kind, RotationOptions::default())
    }

    pub fn create_with(root: impl Into<PathBuf>, kind: StructureKind, options: RotationOptions) -> Result<Self> {
        if kind == StructureKind::Unknown {
            return Err(Error::UnsupportedStructure(kind));
        }
        let descriptor = Self::from_layout(SlotLayout::new(root, kind), options);
        descriptor.strategy.ensure_layout(&descriptor.layout)?;
        debug!(root = %descriptor.root().display(), %kind, "index layout ready");
        Ok(descriptor)
    }

    /// Wraps a layout without touching the disk.
    pub fn from_layout(layout: SlotLayout, options: RotationOptions) -> Self {
        let strategy = strategy_for(layout.kind());
        Self { layout, strategy, options }
    }

    pub fn kind(&self) -> StructureKind {
        self.strategy.kind()
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    pub fn options(&self) -> &RotationOptions {
        &self.options
    }

    /// Name attached to results coming from this index.
    pub fn name(&self) -> String {
        self.root()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root().display().to_string())
    }

    /// Resolved afresh on every call.
    pub fn active_read_slot(&self) -> Result<PathBuf> {
        self.strategy.active_read_slot(&self.layout)
    }

    pub fn next_write_slot(&self) -> Result<PathBuf> {
        self.strategy.next_write_slot(&self.layout)
    }

    /// Current pointer value, `None` for kinds without one.
    pub fn toggle_switch(&self) -> Option<Slot> {
        self.kind()
            .is_rotating()
            .then(|| toggle::read_pointer(&self.layout.pointer_file()))
    }

    pub fn promote(&self) -> Result<()> {
        self.strategy.promote(&self.layout)
    }

    /// Called by a writer after its commit has landed in `next_write_slot`.
    pub fn finish_generation(&self) -> Result<()> {
        self.strategy.finish_generation(&self.layout, &self.options)
    }

    pub fn has_index_files(&self) -> bool {
        self.active_read_slot()
            .map(|slot| self.options.markers.has_index_files(&slot))
            .unwrap_or(false)
    }

    pub fn slot_has_index_files(&self, slot: &Path) -> bool {
        self.options.markers.has_index_files(slot)
    }

    /// Copies the mirror over the inactive base slot. Cyclical only.
    pub fn copy_mirror(&self) -> Result<SyncReport> {
        self.require(StructureKind::Cyclical)?;
        Ok(copy_mirror(&self.layout))
    }

    /// Re-seeds the mirror from the active base slot while holding the
    /// lock marker. The inactive slot holds the previous generation, so
    /// copying from it would roll the mirror back. A partial copy is
    /// reported, not rolled back.
    pub fn sync_indexes_to_mirror(&self) -> Result<SyncReport> {
        self.require(StructureKind::Cyclical)?;
        fs::create_dir_all(self.layout.slot_b())?;
        let _marker = LockMarker::acquire(
            self.layout.lock_marker(),
            self.options.lock_timeout,
            self.options.lock_poll_interval,
        )?;
        let source = self.active_read_slot()?;
        let report = replace_slot_contents(&source, &self.layout.mirror_slot());
        if report.is_complete() {
            info!(root = %self.root().display(), copied = report.copied, "mirror synced from active slot");
        } else {
            warn!(root = %self.root().display(), failed = report.failures.len(), "mirror sync fractured");
        }
        Ok(report)
    }

    /// Deletes every generation. Rotating kinds keep a valid pointer and
    /// all their slot directories.
    pub fn delete_index_files(&self) -> Result<()> {
        self.strategy.delete_generations(&self.layout)?;
        info!(root = %self.root().display(), kind = %self.kind(), "index files deleted");
        Ok(())
    }

    fn require(&self, kind: StructureKind) -> Result<()> {
        if self.kind() == kind {
            Ok(())
        } else {
            Err(Error::UnsupportedStructure(self.kind()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_generation(dir: &Path, tag: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("meta.json"), format!("{{\"tag\":\"{tag}\"}}")).unwrap();
        fs::write(dir.join(format!("{tag}.store")), tag.as_bytes()).unwrap();
    }

    #[test]
    fn fresh_double_points_at_a() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("idx"), StructureKind::Double).unwrap();
        assert_eq!(d.toggle_switch(), Some(Slot::A));
        assert_eq!(d.active_read_slot().unwrap(), d.layout().slot_a());
        assert_eq!(d.next_write_slot().unwrap(), d.layout().slot_b());
        assert!(d.layout().slot_a().is_dir() && d.layout().slot_b().is_dir());
    }

    #[test]
    fn promote_alternates_slots() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("idx"), StructureKind::Double).unwrap();
        for n in 1..=5 {
            d.promote().unwrap();
            let expected = if n % 2 == 0 { Slot::A } else { Slot::B };
            assert_eq!(d.toggle_switch(), Some(expected));
            assert_eq!(d.next_write_slot().unwrap(), d.layout().slot(expected.other()));
        }
    }

    #[test]
    fn single_reads_and_writes_the_root() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("solo"), StructureKind::Single).unwrap();
        assert_eq!(d.active_read_slot().unwrap(), d.root());
        assert_eq!(d.next_write_slot().unwrap(), d.root());
        assert_eq!(d.toggle_switch(), None);
        d.finish_generation().unwrap();
        assert!(!d.layout().pointer_file().exists());
    }

    #[test]
    fn unknown_structure_fails_every_slot_call() {
        let d = IndexDescriptor::from_layout(SlotLayout::new("/nowhere", StructureKind::Unknown), RotationOptions::default());
        assert!(matches!(d.active_read_slot(), Err(Error::UnsupportedStructure(StructureKind::Unknown))));
        assert!(matches!(d.next_write_slot(), Err(Error::UnsupportedStructure(_))));
        assert!(matches!(d.promote(), Err(Error::UnsupportedStructure(_))));
        assert!(!d.has_index_files());
        assert!(IndexDescriptor::create("/nowhere", StructureKind::Unknown).is_err());
    }

    #[test]
    fn cyclical_finish_copies_mirror_then_promotes() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("cyc"), StructureKind::Cyclical).unwrap();
        assert_eq!(d.next_write_slot().unwrap(), d.layout().mirror_slot());

        seed_generation(&d.layout().mirror_slot(), "g1");
        d.finish_generation().unwrap();

        assert_eq!(d.toggle_switch(), Some(Slot::B));
        let active = d.active_read_slot().unwrap();
        assert_eq!(
            crate::generation::file_manifest(&active),
            crate::generation::file_manifest(&d.layout().mirror_slot())
        );
        assert!(d.has_index_files());
    }

    #[test]
    fn sync_to_mirror_copies_active_slot_and_releases_marker() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("cyc"), StructureKind::Cyclical).unwrap();
        seed_generation(&d.layout().slot_a(), "live");
        seed_generation(&d.layout().mirror_slot(), "scratch");

        let report = d.sync_indexes_to_mirror().unwrap();
        assert!(report.is_complete());
        assert!(d.layout().mirror_slot().join("live.store").exists());
        assert!(!d.layout().mirror_slot().join("scratch.store").exists());
        assert!(!d.layout().lock_marker().exists());
    }

    #[test]
    fn sync_to_mirror_times_out_behind_a_held_marker() {
        let tmp = TempDir::new().unwrap();
        let options = RotationOptions {
            lock_timeout: Duration::from_millis(40),
            lock_poll_interval: Duration::from_millis(5),
            ..RotationOptions::default()
        };
        let d = IndexDescriptor::create_with(tmp.path().join("cyc"), StructureKind::Cyclical, options).unwrap();
        fs::write(d.layout().lock_marker(), "other process").unwrap();
        assert!(matches!(d.sync_indexes_to_mirror(), Err(Error::LockTimeout { .. })));
    }

    #[test]
    fn mirror_operations_reject_other_kinds() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("dbl"), StructureKind::Double).unwrap();
        assert!(matches!(d.copy_mirror(), Err(Error::UnsupportedStructure(StructureKind::Double))));
        assert!(matches!(d.sync_indexes_to_mirror(), Err(Error::UnsupportedStructure(_))));
    }

    #[test]
    fn delete_leaves_an_empty_well_formed_layout_every_time() {
        let tmp = TempDir::new().unwrap();
        let d = IndexDescriptor::create(tmp.path().join("cyc"), StructureKind::Cyclical).unwrap();
        seed_generation(&d.layout().slot_a(), "a");
        seed_generation(&d.layout().slot_b(), "b");
        seed_generation(&d.layout().mirror_slot(), "m");

        for _ in 0..3 {
            d.delete_index_files().unwrap();
            assert!(toggle::try_read_pointer(&d.layout().pointer_file()).is_some());
            for dir in d.layout().required_dirs() {
                assert!(dir.is_dir());
                assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
            }
            assert!(!d.has_index_files());
        }
    }

    #[test]
    fn create_pins_a_corrupt_pointer_to_the_default() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("idx");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("Toggle.txt"), "??").unwrap();
        let d = IndexDescriptor::create(&root, StructureKind::Double).unwrap();
        assert_eq!(fs::read_to_string(d.layout().pointer_file()).unwrap(), "B");
    }
}
