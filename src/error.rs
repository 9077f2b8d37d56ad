//! Error types for codesplit operations.
//!
//! This module provides the error hierarchy using `thiserror` for
//! segmentation, configuration, I/O, and CLI commands.

use thiserror::Error;

/// Result type alias for codesplit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Segmentation errors (strategies, parser, normalizer).
    #[error("segmentation error: {0}")]
    Segmentation(#[from] SegmentationError),

    /// Configuration errors. Always surfaced, never corrected silently.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),
}

impl Error {
    /// Returns true for parser and normalizer failures.
    ///
    /// These are only ever surfaced when standardization fallback is
    /// disabled, so they must not be retried with the line strategy.
    #[must_use]
    pub const fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Self::Segmentation(
                SegmentationError::ParseFailed { .. } | SegmentationError::NormalizationFailed { .. }
            )
        )
    }

    /// Returns true for configuration errors.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Errors raised while segmenting content.
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// The syntax parser reported a failure.
    #[error("parse failed for {language}: {reason}")]
    ParseFailed {
        /// Language being parsed.
        language: String,
        /// Reason reported by the parser.
        reason: String,
    },

    /// The query normalizer failed to extract constructs.
    #[error("normalization failed for {language}: {reason}")]
    NormalizationFailed {
        /// Language being normalized.
        language: String,
        /// Reason reported by the normalizer.
        reason: String,
    },

    /// A strategy failed while segmenting.
    #[error("strategy '{strategy}' failed: {reason}")]
    StrategyFailed {
        /// Strategy name.
        strategy: String,
        /// Reason for failure.
        reason: String,
    },

    /// A strategy rejected the segmentation context.
    #[error("invalid segmentation context: {reason}")]
    InvalidContext {
        /// Reason the context was rejected.
        reason: String,
    },

    /// Unknown strategy name.
    #[error("unknown segmentation strategy: {name}")]
    UnknownStrategy {
        /// Name of the unknown strategy.
        name: String,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Invalid option values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A size or count option must be positive.
    #[error("{field} must be > 0")]
    NonPositive {
        /// Option name.
        field: &'static str,
    },

    /// Overlap must stay below the chunk size.
    #[error("overlap {overlap} must be less than max chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Maximum chunk size.
        size: usize,
    },

    /// A ratio must lie in `[0, 1]`.
    #[error("{field} must be within [0, 1], got {value}")]
    InvalidRatio {
        /// Option name.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Any other invalid combination.
    #[error("{reason}")]
    Invalid {
        /// Description of the problem.
        reason: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Language could not be resolved for the input.
    #[error("cannot determine language for {0}; pass --language")]
    UnknownLanguage(String),

    /// No syntax grammar is bundled for the language.
    #[error("no syntax queries for language: {0}")]
    UnsupportedLanguage(String),

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<regex::Error> for SegmentationError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::OutputFormat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segmentation_error_display() {
        let err = SegmentationError::ParseFailed {
            language: "rust".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "parse failed for rust: timeout");

        let err = SegmentationError::StrategyFailed {
            strategy: "bracket".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "strategy 'bracket' failed: boom");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::OverlapTooLarge {
            overlap: 100,
            size: 50,
        };
        assert_eq!(
            err.to_string(),
            "overlap 100 must be less than max chunk size 50"
        );

        let err = ConfigError::NonPositive {
            field: "max_chunk_size",
        };
        assert_eq!(err.to_string(), "max_chunk_size must be > 0");
    }

    #[test]
    fn test_is_parse_failure() {
        let err: Error = SegmentationError::NormalizationFailed {
            language: "go".to_string(),
            reason: "bad query".to_string(),
        }
        .into();
        assert!(err.is_parse_failure());

        let err: Error = SegmentationError::StrategyFailed {
            strategy: "markdown".to_string(),
            reason: "x".to_string(),
        }
        .into();
        assert!(!err.is_parse_failure());
    }

    #[test]
    fn test_is_config() {
        let err: Error = ConfigError::Invalid {
            reason: "nope".to_string(),
        }
        .into();
        assert!(err.is_config());
        assert_eq!(err.to_string(), "configuration error: nope");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    #[allow(clippy::invalid_regex)]
    fn test_from_regex_error() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err: SegmentationError = regex_err.into();
        assert!(matches!(err, SegmentationError::Regex(_)));
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::UnknownLanguage("data.bin".to_string());
        assert!(err.to_string().contains("--language"));
    }
}
