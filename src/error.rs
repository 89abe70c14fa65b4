//! Error taxonomy for the capture pipeline.
//!
//! Every fallible operation in the crate returns [`ArchiveError`]. The
//! ingestion loop uses [`ArchiveError::kind`] as a stable structured-log label
//! when it reports a per-capture failure and moves on.

use std::fmt;

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Transport failure, non-success status, or a malformed index response.
    #[error("request to {url} failed: {reason}")]
    Remote { url: String, reason: String },

    /// The snapshot body could not be turned into a markup tree.
    #[error("could not parse snapshot markup: {0}")]
    Parse(String),

    /// The snapshot parsed, but does not have the permalink post shape.
    #[error("snapshot markup has no {0}")]
    Extraction(MissingElement),

    /// The scraped author is not the handle this run is archiving.
    #[error("author mismatch: expected @{expected}, snapshot shows {found:?}")]
    Validation { expected: String, found: String },

    /// A store mutation referenced a digest that was never imported.
    #[error("no capture with digest {0}")]
    NotFound(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error("invalid handle {0:?}: only letters, digits and underscores are allowed")]
    InvalidHandle(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn remote(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Remote {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Short label used as the `kind` field in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "remote",
            Self::Parse(_) => "parse",
            Self::Extraction(_) => "extraction",
            Self::Validation { .. } => "validation",
            Self::NotFound(_) => "not_found",
            Self::Export(_) => "export",
            Self::InvalidHandle(_) => "invalid_handle",
            Self::Config(_) => "config",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
        }
    }
}

/// The piece of the permalink page that could not be located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingElement {
    PostContainer,
    Header,
    Author,
    Body,
}

impl fmt::Display for MissingElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PostContainer => "permalink post container",
            Self::Header => "permalink header",
            Self::Author => "author handle element",
            Self::Body => "post body element",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(ArchiveError::remote("https://x", "boom").kind(), "remote");
        assert_eq!(ArchiveError::Parse("bad".into()).kind(), "parse");
        assert_eq!(
            ArchiveError::Extraction(MissingElement::Body).kind(),
            "extraction"
        );
        assert_eq!(ArchiveError::NotFound("abc".into()).kind(), "not_found");
    }

    #[test]
    fn test_extraction_message_names_element() {
        let e = ArchiveError::Extraction(MissingElement::Header);
        assert_eq!(e.to_string(), "snapshot markup has no permalink header");
    }

    #[test]
    fn test_validation_message() {
        let e = ArchiveError::Validation {
            expected: "notch".into(),
            found: "@someoneelse".into(),
        };
        assert_eq!(
            e.to_string(),
            "author mismatch: expected @notch, snapshot shows \"@someoneelse\""
        );
    }
}
