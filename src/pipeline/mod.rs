//! Pipeline stages for screenplay breakdown extraction.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalize ──▶ segment ──▶ recognize ──▶ reconcile ──▶ assemble
//! (bytes)   (lines)       (scenes)    (candidates)  (registry)    (record)
//! ```
//!
//! 1. [`input`]     — decode bytes, reject binary payloads, guess language
//! 2. [`normalize`] — strip headers, page numbers and pagination markers
//! 3. [`segment`]   — split on sluglines; never fails
//!    - [`crowd`]   — note extras and their head counts per scene
//! 4. [`recognize`] — run the taggers per scene on the blocking pool
//! 5. [`reconcile`] — merge aliases, assign identifiers, fill scene references
//! 6. [`assemble`]  — compose the record and verify referential integrity

pub mod assemble;
pub mod crowd;
pub mod input;
pub mod normalize;
pub mod recognize;
pub mod reconcile;
pub mod segment;
