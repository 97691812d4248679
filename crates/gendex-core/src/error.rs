use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::layout::StructureKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} is already closed")]
    Closed(&'static str),

    #[error("unsupported index structure: {0}")]
    UnsupportedStructure(StructureKind),

    #[error("no index files found in {}", .0.display())]
    NoIndexFiles(PathBuf),

    #[error("mirror sync left {} fractured: {failed} of {attempted} file operations failed", .root.display())]
    Fractured { root: PathBuf, attempted: usize, failed: usize },

    #[error("timed out after {waited:?} waiting for lock marker {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid query: {0}")]
    Query(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("search engine error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an error raised by the search-engine collaborator.
    pub fn engine<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Engine(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_path() {
        let err = Error::NoIndexFiles(PathBuf::from("/data/idx/A"));
        assert_eq!(err.to_string(), "no index files found in /data/idx/A");

        let err = Error::UnsupportedStructure(StructureKind::Unknown);
        assert_eq!(err.to_string(), "unsupported index structure: unknown");
    }

    #[test]
    fn engine_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "segment vanished");
        let err = Error::engine(io);
        assert!(matches!(err, Error::Engine(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
