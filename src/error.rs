//! Error types for archive access.

use thiserror::Error;

/// Result type alias using [`ArchiveError`].
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Errors raised while opening an archive or reading one of its members.
///
/// Only [`ArchiveError::Unreadable`] concerns the archive as a whole. Every
/// other variant describes a single member and is skipped by the inspector.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The container could not be opened or its central directory parsed.
    #[error("cannot read archive {source_name}: {reason}")]
    Unreadable {
        /// Path or URL of the container.
        source_name: String,
        /// What went wrong.
        reason: String,
    },

    /// The member's stored data failed to inflate or verify.
    #[error("corrupt member {name}: {reason}")]
    CorruptMember {
        /// Member name as stored in the archive.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// Fewer bytes were available than the member declares.
    #[error("truncated member {name}: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Member name as stored in the archive.
        name: String,
        /// Declared size.
        expected: u64,
        /// Bytes actually available.
        actual: u64,
    },

    /// The member uses a compression method other than STORED or DEFLATE.
    #[error("member {name} uses unsupported compression method {method}")]
    UnsupportedMethod {
        /// Member name as stored in the archive.
        name: String,
        /// Raw method identifier from the header.
        method: u16,
    },

    /// The member's declared size is above the configured limit.
    #[error("member {name} declares {size} bytes, above the {limit} byte limit")]
    TooLarge {
        /// Member name as stored in the archive.
        name: String,
        /// Declared uncompressed size.
        size: u64,
        /// Configured maximum.
        limit: u64,
    },
}

impl ArchiveError {
    pub(crate) fn unreadable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corrupt(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptMember {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` when the whole archive is unusable.
    ///
    /// Member-level errors return `false`: the remaining members can still be
    /// read.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unreadable_is_fatal() {
        assert!(ArchiveError::unreadable("a.apk", "bad").is_fatal());
        assert!(!ArchiveError::corrupt("lib.so", "crc").is_fatal());
        assert!(
            !ArchiveError::Truncated {
                name: "lib.so".into(),
                expected: 10,
                actual: 4,
            }
            .is_fatal()
        );
    }

    #[test]
    fn messages_name_the_member() {
        let err = ArchiveError::UnsupportedMethod {
            name: "lib/x86/libz.so".into(),
            method: 14,
        };
        assert_eq!(
            err.to_string(),
            "member lib/x86/libz.so uses unsupported compression method 14"
        );
    }
}
