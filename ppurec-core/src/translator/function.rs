//! Guest functions: CFG construction and ABI classification.
//!
//! `Function::analyze` grows the block map by worklist disassembly. Each
//! popped label either becomes a new block, splits an existing block that
//! strictly contains it, or is skipped because a block already starts there.
//! Every iteration inserts or splits, and a segment only has finitely many
//! block starts, so the loop terminates; blocks never overlap.
//!
//! The ABI classifier then walks the entry path (following unconditional
//! non-call branches, stopping at the first conditional branch or return)
//! and projects the resulting register-usage status onto argument and
//! return types.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use smallvec::SmallVec;

use crate::error::{Result, TranslateError};
use crate::ir::{FuncId, IrBuilder, IrType};
use crate::memory::GuestMemory;
use crate::translator::block::Block;
use crate::translator::instruction::Instruction;
use crate::translator::tables;
use crate::translator::usage::{RegisterUsage, Usage};

/// Argument classification, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Integer,
    Float,
    Vector,
}

/// Return classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetType {
    #[default]
    Void,
    Integer,
    Float,
    FloatX2,
    FloatX3,
    FloatX4,
    Vector,
}

/// Half-open guest address range of the owning segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRange {
    pub start: u32,
    pub end: u32,
}

impl SegmentRange {
    pub fn contains(self, addr: u32) -> bool {
        self.start <= addr && addr < self.end
    }
}

/// A guest function: a set of non-overlapping blocks rooted at `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Entry address; always a key of `blocks` after analysis.
    pub address: u32,
    /// Stable per-entry name used for the IR function.
    pub name: String,
    pub blocks: BTreeMap<u32, Block>,
    pub type_in: SmallVec<[ArgType; 8]>,
    pub type_out: RetType,
    /// Handle of the declared IR function.
    pub ir_func: Option<FuncId>,
}

impl Function {
    pub fn new(address: u32) -> Self {
        Self {
            address,
            name: format!("func_{address:08x}"),
            blocks: BTreeMap::new(),
            type_in: SmallVec::new(),
            type_out: RetType::Void,
            ir_func: None,
        }
    }

    /// Build the CFG and classify the ABI.
    ///
    /// `boundaries` is the segment's full set of discovered function entry
    /// points: a growing block is cut before the next entry so one function
    /// never swallows another function's body.
    ///
    /// # Errors
    /// [`TranslateError::OutOfSegment`] if any control-flow edge leaves the
    /// segment (the caller drops the function); memory faults are fatal.
    pub fn analyze(
        &mut self,
        memory: &dyn GuestMemory,
        segment: SegmentRange,
        boundaries: &BTreeSet<u32>,
    ) -> Result<()> {
        self.analyze_seeded(memory, segment, boundaries, &[])
    }

    /// [`Function::analyze`] with extra seed labels beyond the entry point,
    /// for callers holding symbol information. Seeding a label that falls
    /// inside an already-grown block splits it, yielding the same block map
    /// as if the label had been discovered first.
    pub fn analyze_seeded(
        &mut self,
        memory: &dyn GuestMemory,
        segment: SegmentRange,
        boundaries: &BTreeSet<u32>,
        seeds: &[u32],
    ) -> Result<()> {
        self.blocks.clear();
        self.type_in.clear();
        self.type_out = RetType::Void;

        let mut labels: VecDeque<u32> = VecDeque::new();
        labels.push_back(self.address);
        labels.extend(seeds.iter().copied());

        while let Some(label) = labels.pop_front() {
            if self.blocks.contains_key(&label) {
                continue;
            }

            // A label strictly inside an existing block splits it. Blocks do
            // not overlap, so only the nearest block below can contain it.
            if let Some((&head, existing)) = self.blocks.range(..label).next_back() {
                if existing.contains(label) {
                    let mut tail = Block::new(label, existing.size - (label - head));
                    tail.branch_a = existing.branch_a;
                    tail.branch_b = existing.branch_b;
                    let head_block = self
                        .blocks
                        .get_mut(&head)
                        .ok_or(TranslateError::MissingEntry(head))?;
                    head_block.size = label - head;
                    head_block.branch_a = label;
                    head_block.branch_b = 0;
                    self.blocks.insert(label, tail);
                    continue;
                }
            }

            // Bound the new block: it may not reach the next known block,
            // the next function entry, or the end of the segment.
            let mut max_size = segment.end - label;
            if let Some((&next, _)) = self.blocks.range(label + 1..).next() {
                max_size = max_size.min(next - label);
            }
            if let Some(&entry) = boundaries.range(label + 1..).next() {
                max_size = max_size.min(entry - label);
            }

            // Disassemble forward until a branch that transfers control on
            // its own (calls do not end blocks) or the size bound.
            let mut pc = label;
            let mut size = 4u32;
            let mut code = Instruction(memory.read32(pc)?);
            while (!code.is_branch() || code.is_call()) && size < max_size {
                pc += 4;
                size += 4;
                code = Instruction(memory.read32(pc)?);
            }

            let mut block = Block::new(label, size);
            if code.is_branch_conditional() && !code.is_call() {
                let target = code.target(pc).unwrap_or(0);
                let fallthrough = pc + 4;
                self.check_edge(segment, target)?;
                self.check_edge(segment, fallthrough)?;
                labels.push_back(target);
                labels.push_back(fallthrough);
                block.branch_a = target;
                block.branch_b = fallthrough;
            } else if code.is_branch_unconditional() && !code.is_call() {
                let target = code.target(pc).unwrap_or(0);
                self.check_edge(segment, target)?;
                labels.push_back(target);
                block.branch_a = target;
            }
            // Calls, bclr/bcctr and size truncation leave both edges zero.

            self.blocks.insert(label, block);
        }

        let status = self.entry_register_usage(memory)?;
        self.classify(&status);
        Ok(())
    }

    fn check_edge(&self, segment: SegmentRange, target: u32) -> Result<()> {
        if segment.contains(target) {
            Ok(())
        } else {
            Err(TranslateError::OutOfSegment {
                target,
                start: segment.start,
                end: segment.end,
            })
        }
    }

    /// Run the register-usage analyzers along the entry path.
    ///
    /// Walks linearly from the entry, follows unconditional non-call
    /// branches into their target block, and stops at the first conditional
    /// branch or return. The ABI is observable on this path alone. A
    /// visited set breaks entry-path cycles (`b .` style loops).
    fn entry_register_usage(&self, memory: &dyn GuestMemory) -> Result<RegisterUsage> {
        let mut status = RegisterUsage::new();
        let mut visited: BTreeSet<u32> = BTreeSet::new();
        let mut block = self
            .blocks
            .get(&self.address)
            .ok_or(TranslateError::MissingEntry(self.address))?;
        let mut offset = 0u32;
        while offset < block.size {
            let code = Instruction(memory.read32(block.address + offset)?);
            (tables::lookup(code).analyze)(&mut status, code);

            if code.is_branch_conditional() || code.is_return() {
                break;
            }
            if code.is_branch_unconditional() && !code.is_call() {
                if !visited.insert(block.address) {
                    break;
                }
                match self.blocks.get(&block.branch_a) {
                    Some(next) => {
                        block = next;
                        offset = 0;
                        continue;
                    }
                    None => break,
                }
            }
            offset += 4;
        }
        Ok(status)
    }

    /// Project register usage onto the function signature.
    fn classify(&mut self, status: &RegisterUsage) {
        for reg in 0..8 {
            if status.gpr[reg + 3].contains(Usage::READ_ORIG) {
                self.type_in.push(ArgType::Integer);
            }
        }
        for reg in 0..13 {
            if status.fpr[reg + 1].contains(Usage::READ_ORIG) {
                self.type_in.push(ArgType::Float);
            }
        }
        for reg in 0..12 {
            if status.vr[reg + 2].contains(Usage::READ_ORIG) {
                self.type_in.push(ArgType::Vector);
            }
        }

        // Return precedence: float over vector over integer. FPR1 promotes
        // through X2..X4 only while the following registers are written
        // contiguously.
        self.type_out = if status.fpr[1].contains(Usage::WRITE) {
            let mut out = RetType::Float;
            for (reg, promoted) in [
                (2, RetType::FloatX2),
                (3, RetType::FloatX3),
                (4, RetType::FloatX4),
            ] {
                if !status.fpr[reg].contains(Usage::WRITE) {
                    break;
                }
                out = promoted;
            }
            out
        } else if status.vr[2].contains(Usage::WRITE) {
            RetType::Vector
        } else if status.gpr[3].contains(Usage::WRITE) {
            RetType::Integer
        } else {
            RetType::Void
        };
    }

    /// Declare the IR function matching the classified signature.
    ///
    /// Integer arguments map to i64, float to f64, vector to i128. The
    /// multi-register float returns collapse to a single f64; the classifier
    /// result itself is preserved in `type_out`.
    pub fn declare(&mut self, builder: &mut dyn IrBuilder) -> FuncId {
        let ret = match self.type_out {
            RetType::Void => IrType::Void,
            RetType::Integer => IrType::I64,
            RetType::Float | RetType::FloatX2 | RetType::FloatX3 | RetType::FloatX4 => IrType::F64,
            RetType::Vector => IrType::I128,
        };
        let params: Vec<IrType> = self
            .type_in
            .iter()
            .map(|arg| match arg {
                ArgType::Integer => IrType::I64,
                ArgType::Float => IrType::F64,
                ArgType::Vector => IrType::I128,
            })
            .collect();
        let id = builder.declare_function(&self.name, ret, &params);
        self.ir_func = Some(id);
        id
    }
}
