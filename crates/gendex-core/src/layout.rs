//! Where generations live on disk.
//!
//! ```text
//! <root>/                 Single: generation files directly here
//! <root>/Toggle.txt       "A" or "B" (Double/Cyclical only)
//! <root>/A/ , <root>/B/   generation files (Double/Cyclical)
//! <root>/Mirror/          writer's staging target (Cyclical only)
//! <root>/B/write.lock     advisory marker during mirror sync
//! ```
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const TOGGLE_FILE: &str = "Toggle.txt";
pub const SLOT_A_DIR: &str = "A";
pub const SLOT_B_DIR: &str = "B";
pub const MIRROR_DIR: &str = "Mirror";
pub const LOCK_MARKER: &str = "write.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    Unknown,
    Single,
    Double,
    Cyclical,
}

impl StructureKind {
    /// Double and Cyclical keep an A/B slot pair behind a toggle pointer.
    pub fn is_rotating(self) -> bool {
        matches!(self, StructureKind::Double | StructureKind::Cyclical)
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StructureKind::Unknown => "unknown",
            StructureKind::Single => "single",
            StructureKind::Double => "double",
            StructureKind::Cyclical => "cyclical",
        };
        f.write_str(name)
    }
}

impl FromStr for StructureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(StructureKind::Single),
            "double" => Ok(StructureKind::Double),
            "cyclical" => Ok(StructureKind::Cyclical),
            other => Err(format!("unknown structure kind '{other}' (expected single, double or cyclical)")),
        }
    }
}

/// One of the two base slots of a rotating index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::A => SLOT_A_DIR,
            Slot::B => SLOT_B_DIR,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure path arithmetic over an index root. Nothing here touches the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotLayout {
    root: PathBuf,
    kind: StructureKind,
}

impl SlotLayout {
    pub fn new(root: impl Into<PathBuf>, kind: StructureKind) -> Self {
        Self { root: root.into(), kind }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind(&self) -> StructureKind {
        self.kind
    }

    pub fn slot(&self, slot: Slot) -> PathBuf {
        self.root.join(slot.as_str())
    }

    pub fn slot_a(&self) -> PathBuf {
        self.slot(Slot::A)
    }

    pub fn slot_b(&self) -> PathBuf {
        self.slot(Slot::B)
    }

    pub fn pointer_file(&self) -> PathBuf {
        self.root.join(TOGGLE_FILE)
    }

    pub fn mirror_slot(&self) -> PathBuf {
        self.root.join(MIRROR_DIR)
    }

    pub fn lock_marker(&self) -> PathBuf {
        self.slot_b().join(LOCK_MARKER)
    }

    /// Every directory that must exist for this kind to be well formed.
    pub fn required_dirs(&self) -> Vec<PathBuf> {
        match self.kind {
            StructureKind::Unknown => Vec::new(),
            StructureKind::Single => vec![self.root.clone()],
            StructureKind::Double => vec![self.slot_a(), self.slot_b()],
            StructureKind::Cyclical => vec![self.slot_a(), self.slot_b(), self.mirror_slot()],
        }
    }
}
