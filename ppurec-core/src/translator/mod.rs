//! The PPU static binary translator.
//!
//! Translation runs in three stages over a guest code segment:
//!
//! 1. **Segment analysis** ([`segment`]): scan the region, classify every
//!    word, and compute the set of function entry points by set algebra over
//!    block starts, jump targets and call targets.
//! 2. **Function analysis** ([`function`]): per entry point, grow a CFG of
//!    non-overlapping basic blocks by worklist disassembly with mid-block
//!    splitting, then classify the argument and return ABI from entry-path
//!    register liveness.
//! 3. **Recompilation** ([`recompiler`]): declare one IR function per guest
//!    function, lower every block through the opcode dispatch table, and run
//!    the scalar optimization pipeline.
//!
//! Everything is single-threaded per segment; parallelism, if wanted, is one
//! segment (and one IR module) per thread.

pub mod analyze;
pub mod block;
pub mod emit;
pub mod function;
pub mod instruction;
pub mod recompiler;
pub mod segment;
pub mod tables;
pub mod usage;

pub use block::Block;
pub use function::{ArgType, Function, RetType, SegmentRange};
pub use instruction::Instruction;
pub use segment::{Segment, TranslationStats};
pub use usage::{RegisterUsage, Usage};
