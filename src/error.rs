//! Engine error types.
//!
//! Defines [`SchemError`], the unified error type for parse, load, and merge
//! operations. Error messages are designed to be actionable: each variant
//! carries enough context (byte offsets, version bounds, file paths) for the
//! caller to understand what went wrong without re-running the operation.
//!
//! Apply-level outcomes (`Redundant`, `Conflict`) are not errors; they are
//! ordinary merge results and live in [`crate::diff`]. Only unrecoverable
//! conditions surface here.

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// A malformed s-expression input. Fatal for the current file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// An unmatched `(` or `)` was found, or the input held more than one
    /// top-level expression.
    UnbalancedParens {
        /// Byte offset of the offending paren (or end of input).
        offset: usize,
    },
    /// A string literal was still open at end of input.
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },
    /// A raw newline appeared inside a string literal (must be `\n`).
    UnescapedNewline {
        /// Byte offset of the newline character.
        offset: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnbalancedParens { offset } => {
                write!(f, "unbalanced parentheses at offset {offset}")
            }
            Self::UnterminatedString { offset } => {
                write!(f, "unterminated string literal at offset {offset}")
            }
            Self::UnescapedNewline { offset } => {
                write!(
                    f,
                    "unescaped newline in string literal at offset {offset} (should be \\n)"
                )
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// SchemError
// ---------------------------------------------------------------------------

/// Unified error type for schematic load, diff, and merge operations.
#[derive(Debug)]
pub enum SchemError {
    /// The input bytes could not be parsed as an s-expression file.
    Parse(ParseError),

    /// The file's `version` child lies outside the supported range.
    ///
    /// The caller decides whether to skip the file or abort the project.
    UnsupportedVersion {
        /// Version value found in the file.
        found: i64,
        /// Oldest supported version.
        min: i64,
        /// Newest supported version.
        max: i64,
    },

    /// A trial merge reached a state that should be unreachable (e.g. an
    /// ours diff conflicting with itself, or an unimportant diff conflicting
    /// on a fresh base). Signals a logic bug, not bad input.
    MergeInvariant {
        /// Description of the violated invariant.
        detail: String,
    },

    /// An internal structural invariant was violated (e.g. an attempt to
    /// deep-copy the diff target index). Signals a logic bug.
    InternalInvariant {
        /// Description of the violated invariant.
        detail: String,
    },

    /// A project descriptor could not be decoded.
    Descriptor {
        /// Path of the descriptor file, when known.
        path: Option<PathBuf>,
        /// Human-readable description of the decode failure.
        detail: String,
    },

    /// An I/O error from the version store or filesystem.
    Io(std::io::Error),
}

impl fmt::Display for SchemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "parse error: {err}"),
            Self::UnsupportedVersion { found, min, max } => {
                write!(
                    f,
                    "unsupported file version {found} (supported range {min}..={max})"
                )
            }
            Self::MergeInvariant { detail } => {
                write!(f, "merge invariant violated: {detail}")
            }
            Self::InternalInvariant { detail } => {
                write!(f, "internal invariant violated: {detail}")
            }
            Self::Descriptor { path, detail } => {
                if let Some(path) = path {
                    write!(f, "bad project descriptor '{}': {detail}", path.display())
                } else {
                    write!(f, "bad project descriptor: {detail}")
                }
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for SchemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for SchemError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<std::io::Error> for SchemError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for SchemError {
    fn from(err: serde_json::Error) -> Self {
        Self::Descriptor {
            path: None,
            detail: err.to_string(),
        }
    }
}

/// Convenience constructor for [`SchemError::MergeInvariant`].
pub(crate) fn merge_invariant(detail: impl Into<String>) -> SchemError {
    SchemError::MergeInvariant {
        detail: detail.into(),
    }
}

/// Convenience constructor for [`SchemError::InternalInvariant`].
pub(crate) fn internal_invariant(detail: impl Into<String>) -> SchemError {
    SchemError::InternalInvariant {
        detail: detail.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
