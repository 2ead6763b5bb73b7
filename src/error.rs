//! Error types for the screenplay-breakdown library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: no trustworthy breakdown can be produced
//!   (binary payload passed in as text, a reconciliation defect caught by the
//!   assembler, invalid configuration). Returned as `Err(ExtractError)` from
//!   the top-level `extract*` functions.
//!
//! * [`ExtractWarning`] — **Non-fatal**: one tagger could not be loaded or
//!   failed on one scene, or the document had no usable text. Stored inside
//!   [`crate::output::BreakdownRecord::warnings`] so callers can see that the
//!   record was produced in degraded mode instead of losing the document.
//!
//! [`TaggerError`] is what an individual [`crate::tagger::Tagger`] reports;
//! the recognizer turns it into an [`ExtractWarning`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the screenplay-breakdown library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The payload is not text: too many NUL bytes, control characters or
    /// undecodable sequences.
    #[error(
        "Input does not look like text ({:.0}% binary characters).\n\
Extract the document to plain text before calling extract().",
        .ratio * 100.0
    )]
    BinaryInput { ratio: f64 },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The assembler found a reference that does not resolve. This is a
    /// reconciliation bug, not a problem with the caller's input.
    #[error("Breakdown integrity violated: {detail}")]
    Integrity { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (runtime creation, worker join failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal condition recorded while producing a breakdown.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ExtractWarning {
    /// Nothing usable was left after normalisation; the record holds a
    /// single empty preamble scene.
    #[error("Document has no usable text after normalisation")]
    EmptyDocument,

    /// A configured tagger could not be initialised. Recognition ran with
    /// the remaining taggers.
    #[error("Tagger '{tagger}' is unavailable: {reason}")]
    TaggerUnavailable { tagger: String, reason: String },

    /// A tagger failed on one scene; its candidates for that scene are empty.
    #[error("Tagger '{tagger}' failed on scene {scene}: {detail}")]
    TaggerFailed {
        tagger: String,
        scene: usize,
        detail: String,
    },
}

/// Error reported by a [`crate::tagger::Tagger`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaggerError {
    /// The tagger's model or resources could not be loaded.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The tagger was loaded but could not process this text.
    #[error("failed: {0}")]
    Failed(String),
}
