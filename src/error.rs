use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CuratorError {
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("merge failed for {avid}: {reason}")]
    Merge { avid: String, reason: String },
}

/// Stable codes for the skip outcomes the passes can take. Skips are
/// policy, not failures: the item is left untouched and the pass moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCode {
    AmbiguousGroup,
    UnresolvedIdentifier,
    DestinationExists,
    FilesystemIo,
}

impl SkipCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AmbiguousGroup => "AMBIGUOUS_GROUP",
            Self::UnresolvedIdentifier => "UNRESOLVED_IDENTIFIER",
            Self::DestinationExists => "DESTINATION_EXISTS",
            Self::FilesystemIo => "FILESYSTEM_IO",
        }
    }
}
