//! Error types for the swap event synchronization engine.
//!
//! This module provides a unified error type [`SyncError`] covering every
//! failure the engine can observe while talking to the log source, decoding
//! swap logs, and managing sessions.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`SyncError::ConfigError`]: Configuration and environment issues
//! - [`SyncError::RpcError`]: A single failed RPC request
//! - [`SyncError::SourceUnavailable`]: A block range abandoned after all retries
//! - [`SyncError::DecodingError`]: A log that is not a well-formed `SwapTo`
//! - [`SyncError::DecodeIncomplete`]: Block metadata missing, timestamp approximated
//! - [`SyncError::SessionNotReady`]: Wallet, network or provider not yet known
//!
//! None of these are fatal to the engine. `SourceUnavailable` and
//! `DecodeIncomplete` are logged and degrade to a possibly incomplete event
//! list; `SessionNotReady` leaves the engine idle.
//!
//! # Example
//!
//! ```
//! use swap_event_sync::error::{SyncError, SyncResult};
//!
//! fn validate_batch_size(size: u64) -> SyncResult<()> {
//!     if size == 0 {
//!         return Err(SyncError::config("BATCH_SIZE must be positive", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`SyncError`].
pub type SyncResult<T> = Result<T, SyncError>;

/// Boxed error used as the optional source of a [`SyncError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the swap event synchronization engine.
#[derive(Debug)]
pub enum SyncError {
    /// Configuration or environment variable errors.
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// A single RPC request failed.
    ///
    /// Retried by the fetcher; only surfaces after retries are exhausted,
    /// wrapped in [`SyncError::SourceUnavailable`].
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// A block range could not be fetched after every retry attempt.
    ///
    /// The range is abandoned: its records are missing from this pass.
    SourceUnavailable {
        /// First block of the abandoned range
        from_block: u64,
        /// Last block of the abandoned range
        to_block: u64,
        /// Number of attempts made
        attempts: u32,
        /// Message of the final failure
        last_error: String,
    },

    /// A log could not be decoded as a `SwapTo` event.
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxError>,
    },

    /// Block metadata was unavailable while decoding.
    ///
    /// The record is still emitted with a wall-clock timestamp.
    DecodeIncomplete {
        /// Block whose metadata could not be resolved
        block_number: u64,
        /// Why the lookup failed
        reason: String,
    },

    /// The session identity is incomplete; the engine stays idle.
    SessionNotReady {
        /// Which part of the identity is absent
        missing: String,
    },
}

impl SyncError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use swap_event_sync::error::SyncError;
    ///
    /// let err = SyncError::config("RPC_URL not set", None);
    /// assert!(matches!(err, SyncError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    ///
    /// # Example
    ///
    /// ```
    /// use swap_event_sync::error::SyncError;
    ///
    /// let err = SyncError::rpc("eth_getLogs timed out", None);
    /// assert!(matches!(err, SyncError::RpcError { .. }));
    /// ```
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a source-unavailable error for an abandoned block range.
    ///
    /// # Example
    ///
    /// ```
    /// use swap_event_sync::error::SyncError;
    ///
    /// let err = SyncError::source_unavailable(100, 199, 3, "rate limited");
    /// assert!(matches!(err, SyncError::SourceUnavailable { attempts: 3, .. }));
    /// ```
    #[must_use]
    pub fn source_unavailable(
        from_block: u64,
        to_block: u64,
        attempts: u32,
        last_error: impl Into<String>,
    ) -> Self {
        Self::SourceUnavailable {
            from_block,
            to_block,
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Create a new decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a decode-incomplete marker for a block without metadata.
    #[must_use]
    pub fn decode_incomplete(block_number: u64, reason: impl Into<String>) -> Self {
        Self::DecodeIncomplete {
            block_number,
            reason: reason.into(),
        }
    }

    /// Create a session-not-ready error.
    ///
    /// # Example
    ///
    /// ```
    /// use swap_event_sync::error::SyncError;
    ///
    /// let err = SyncError::session_not_ready("wallet address");
    /// assert_eq!(err.to_string(), "Session not ready: missing wallet address");
    /// ```
    #[must_use]
    pub fn session_not_ready(missing: impl Into<String>) -> Self {
        Self::SessionNotReady {
            missing: missing.into(),
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::SourceUnavailable {
                from_block,
                to_block,
                attempts,
                last_error,
            } => write!(
                f,
                "Source unavailable for blocks {from_block}..={to_block} after {attempts} attempts: {last_error}"
            ),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::DecodeIncomplete {
                block_number,
                reason,
            } => write!(
                f,
                "Block {block_number} metadata unavailable, timestamp approximated: {reason}"
            ),
            Self::SessionNotReady { missing } => {
                write!(f, "Session not ready: missing {missing}")
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            Self::SourceUnavailable { .. }
            | Self::DecodeIncomplete { .. }
            | Self::SessionNotReady { .. } => None,
        }
    }
}
