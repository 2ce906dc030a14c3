//! Static binary translation for the PPU, the PowerPC main core of the
//! emulated console.
//!
//! The crate takes a region of guest memory containing 32-bit big-endian
//! PowerPC instructions and produces an optimized SSA module ready for a JIT
//! backend. Collaborators are consumed through narrow interfaces: guest
//! memory through [`GuestMemory`], the IR backend through
//! [`ir::IrBuilder`].
//!
//! ```no_run
//! use ppurec_core::{CodeImage, Segment};
//! use ppurec_core::ir::{Builder, IrBuilder};
//!
//! # fn main() -> ppurec_core::Result<()> {
//! let image = CodeImage::from_words(0x10000, &[0x4E800020]); // blr
//! let mut segment = Segment::new("demo", image.base(), image.len());
//! segment.analyze(&image)?;
//!
//! let mut builder = Builder::new();
//! let stats = segment.recompile(&image, &mut builder)?;
//! println!("{} functions translated", stats.functions);
//! print!("{}", builder.dump());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ir;
pub mod memory;
pub mod translator;

pub use error::{Result, TranslateError};
pub use memory::{CodeImage, GuestMemory};
pub use translator::{Block, Function, Segment, TranslationStats};
