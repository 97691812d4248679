//! Reconstructs a descriptor from what is on disk.
//!
//! There is no manifest. The structure kind is inferred from the presence
//! of the toggle pointer, the base slots and the mirror directory:
//!
//! | toggle | A and B | Mirror | result                       |
//! |--------|---------|--------|------------------------------|
//! | no     | -       | -      | Single (readable if probed)  |
//! | yes    | missing | -      | Double, unreadable           |
//! | yes    | present | yes    | Cyclical                     |
//! | yes    | present | no     | Double                       |
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::descriptor::{IndexDescriptor, RotationOptions};
use crate::layout::{SlotLayout, StructureKind};

#[derive(Debug, Clone)]
pub struct Discovery {
    pub descriptor: IndexDescriptor,
    pub readable: bool,
    /// Toggle present but a base slot missing.
    pub degraded: bool,
}

impl Discovery {
    pub fn kind(&self) -> StructureKind {
        self.descriptor.kind()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexFactory {
    options: RotationOptions,
}

impl IndexFactory {
    pub fn new(options: RotationOptions) -> Self {
        Self { options }
    }

    /// Inspects `root` without creating or repairing anything.
    pub fn discover(&self, root: impl Into<PathBuf>) -> Discovery {
        let root = root.into();
        let probe = SlotLayout::new(&root, StructureKind::Double);

        if !probe.pointer_file().is_file() {
            let descriptor = self.describe(SlotLayout::new(root, StructureKind::Single));
            let readable = descriptor.has_index_files();
            debug!(root = %descriptor.root().display(), readable, "discovered single-slot index");
            return Discovery { descriptor, readable, degraded: false };
        }

        if !probe.slot_a().is_dir() || !probe.slot_b().is_dir() {
            warn!(root = %root.display(), "toggle pointer present but a base slot is missing");
            let descriptor = self.describe(SlotLayout::new(root, StructureKind::Double));
            return Discovery { descriptor, readable: false, degraded: true };
        }

        let kind = if probe.mirror_slot().is_dir() { StructureKind::Cyclical } else { StructureKind::Double };
        let descriptor = self.describe(SlotLayout::new(root, kind));
        let readable = descriptor.has_index_files();
        debug!(root = %descriptor.root().display(), %kind, readable, "discovered rotating index");
        Discovery { descriptor, readable, degraded: false }
    }

    fn describe(&self, layout: SlotLayout) -> IndexDescriptor {
        IndexDescriptor::from_layout(layout, self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn seed_generation(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("meta.json"), "{}").unwrap();
        fs::write(dir.join("0001.idx"), b"x").unwrap();
    }

    #[test]
    fn empty_directory_is_unreadable_single() {
        let tmp = TempDir::new().unwrap();
        let found = IndexFactory::default().discover(tmp.path());
        assert_eq!(found.kind(), StructureKind::Single);
        assert!(!found.readable);
    }

    #[test]
    fn generation_files_make_single_readable() {
        let tmp = TempDir::new().unwrap();
        seed_generation(tmp.path());
        let found = IndexFactory::default().discover(tmp.path());
        assert_eq!(found.kind(), StructureKind::Single);
        assert!(found.readable);
    }

    #[test]
    fn missing_slot_is_degraded_double() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Toggle.txt"), "A").unwrap();
        fs::create_dir_all(tmp.path().join("A")).unwrap();
        let found = IndexFactory::default().discover(tmp.path());
        assert_eq!(found.kind(), StructureKind::Double);
        assert!(found.degraded);
        assert!(!found.readable);
        assert!(!tmp.path().join("B").exists(), "discovery must not repair");
    }

    #[test]
    fn mirror_directory_means_cyclical() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Toggle.txt"), "B").unwrap();
        for d in ["A", "B", "Mirror"] {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        seed_generation(&tmp.path().join("B"));
        let found = IndexFactory::default().discover(tmp.path());
        assert_eq!(found.kind(), StructureKind::Cyclical);
        assert!(found.readable);
        assert_eq!(found.descriptor.active_read_slot().unwrap(), tmp.path().join("B"));
    }
}
