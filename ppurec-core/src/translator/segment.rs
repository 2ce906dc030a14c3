//! Code segments: function discovery and translation orchestration.
//!
//! A segment is one contiguous guest code region translated as a unit. The
//! scanner classifies every word, collects three label sets and derives the
//! function entry set as `(blocks \ jumps) ∪ calls`: block starts nobody
//! jumps to are function entries, and direct call targets are provably
//! entries. Each entry is analyzed independently; rejected functions are
//! dropped and the segment proceeds.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TranslateError};
use crate::ir::{IrBuilder, Pass};
use crate::memory::GuestMemory;
use crate::translator::function::{Function, SegmentRange};
use crate::translator::instruction::Instruction;
use crate::translator::recompiler;

/// Counters for one segment translation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationStats {
    /// Entry points that survived CFG analysis.
    pub functions: usize,
    /// Entry points rejected for leaving the segment.
    pub rejected_functions: usize,
    /// Total basic blocks across accepted functions.
    pub blocks: usize,
    /// Total guest instructions across accepted functions.
    pub guest_instructions: usize,
}

/// A half-open guest code region `[address, address + size)`.
#[derive(Debug)]
pub struct Segment {
    pub name: String,
    pub address: u32,
    pub size: u32,
    /// Accepted functions keyed by entry address.
    pub functions: BTreeMap<u32, Function>,
    rejected: usize,
}

impl Segment {
    pub fn new(name: &str, address: u32, size: u32) -> Self {
        Self {
            name: name.to_owned(),
            address,
            size,
            functions: BTreeMap::new(),
            rejected: 0,
        }
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.address <= addr && addr < self.address + self.size
    }

    pub fn range(&self) -> SegmentRange {
        SegmentRange {
            start: self.address,
            end: self.address + self.size,
        }
    }

    /// Discover and analyze every function in the segment.
    ///
    /// # Algorithm
    /// One linear scan tracks the start of the current prospective block.
    /// A valid word opens a block, an invalid word discards it, a call
    /// records its target, and a non-call branch closes the block while
    /// recording the jump targets. The resulting label sets yield the entry
    /// set; each entry is analyzed with the full set as boundaries.
    pub fn analyze(&mut self, memory: &dyn GuestMemory) -> Result<()> {
        let mut label_blocks: BTreeSet<u32> = BTreeSet::new();
        let mut label_calls: BTreeSet<u32> = BTreeSet::new();
        let mut label_jumps: BTreeSet<u32> = BTreeSet::new();

        let mut current_block: Option<u32> = None;
        let mut pc = self.address;
        while pc < self.address + self.size {
            let code = Instruction(memory.read32(pc)?);

            if code.is_valid() {
                current_block.get_or_insert(pc);
            } else {
                // The prospective block is corrupt; whatever started it was
                // data, not code.
                current_block = None;
            }

            if current_block.is_some() {
                if code.is_call() {
                    if let Some(target) = code.target(pc) {
                        label_calls.insert(target);
                    }
                } else if code.is_branch() {
                    if code.is_branch_conditional() {
                        if let Some(target) = code.target(pc) {
                            label_jumps.insert(target);
                        }
                        label_jumps.insert(pc + 4);
                    }
                    if code.is_branch_unconditional() {
                        if let Some(target) = code.target(pc) {
                            label_jumps.insert(target);
                        }
                    }
                    if let Some(start) = current_block.take() {
                        label_blocks.insert(start);
                    }
                }
            }

            pc += 4;
        }

        let entries: BTreeSet<u32> = label_blocks
            .difference(&label_jumps)
            .copied()
            .chain(label_calls.iter().copied())
            .collect();
        log::debug!(
            "segment '{}': {} block labels, {} jump labels, {} call labels, {} entries",
            self.name,
            label_blocks.len(),
            label_jumps.len(),
            label_calls.len(),
            entries.len()
        );

        self.functions.clear();
        self.rejected = 0;
        let in_segment: Vec<u32> = entries.iter().copied().filter(|&e| self.contains(e)).collect();
        for entry in in_segment {
            let mut function = Function::new(entry);
            match function.analyze(memory, self.range(), &entries) {
                Ok(()) => {
                    self.functions.insert(entry, function);
                }
                Err(TranslateError::OutOfSegment { target, .. }) => {
                    log::debug!(
                        "dropping function at 0x{entry:08X}: edge to 0x{target:08X} leaves the segment"
                    );
                    self.rejected += 1;
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Ok(())
    }

    /// Lower every accepted function into one IR module and optimize it.
    ///
    /// Declarations happen up front so call lowering can reference any
    /// function; bodies follow, each run through the scalar pipeline and
    /// verified.
    ///
    /// # Panics
    /// On IR verification failure. That is a translator bug, not a property
    /// of the guest code, and the diagnostic names the offending function.
    pub fn recompile(
        &mut self,
        memory: &dyn GuestMemory,
        builder: &mut dyn IrBuilder,
    ) -> Result<TranslationStats> {
        builder.begin_module(&self.name);

        // CFG simplification stays out of this pipeline until every handler
        // emits well-formed terminators on its own.
        let pipeline = [
            Pass::PromoteSlots,
            Pass::InstCombine,
            Pass::Reassociate,
            Pass::Gvn,
        ];

        for function in self.functions.values_mut() {
            function.declare(builder);
        }

        for function in self.functions.values_mut() {
            let func = recompiler::lower_function(function, memory, builder)?;
            builder.run_passes(func, &pipeline);
            if let Err(diagnostic) = builder.verify(func) {
                log::error!("IR verification failed for {}: {diagnostic}", function.name);
                panic!("IR verification failed for {}: {diagnostic}", function.name);
            }
        }

        Ok(self.stats())
    }

    /// Current translation counters.
    pub fn stats(&self) -> TranslationStats {
        let blocks = self.functions.values().map(|f| f.blocks.len()).sum();
        let guest_instructions = self
            .functions
            .values()
            .flat_map(|f| f.blocks.values())
            .map(|b| (b.size / 4) as usize)
            .sum();
        TranslationStats {
            functions: self.functions.len(),
            rejected_functions: self.rejected,
            blocks,
            guest_instructions,
        }
    }
}
