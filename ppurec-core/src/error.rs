//! Error types for the translator.
//!
//! The taxonomy mirrors how each failure is surfaced: an out-of-segment edge
//! rejects a single function while the segment continues, a memory fault is
//! fatal for the whole translation, and the internal variants indicate driver
//! misuse rather than bad guest code.

use thiserror::Error;

/// Errors produced by segment analysis and recompilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The guest memory collaborator could not service a read.
    ///
    /// The translator assumes every address inside a segment is mapped, so
    /// this is propagated as fatal.
    #[error("memory read fault at 0x{0:08X}")]
    Memory(u32),

    /// A control-flow edge left the segment during CFG growth.
    ///
    /// The affected function is dropped; segment analysis continues with the
    /// remaining entry points.
    #[error("branch target 0x{target:08X} outside segment [0x{start:08X}, 0x{end:08X})")]
    OutOfSegment { target: u32, start: u32, end: u32 },

    /// A function has no block at its own entry address.
    #[error("function at 0x{0:08X} has no entry block")]
    MissingEntry(u32),

    /// Lowering was requested for a function that was never declared.
    #[error("function at 0x{0:08X} was not declared before lowering")]
    Undeclared(u32),
}

pub type Result<T, E = TranslateError> = std::result::Result<T, E>;
