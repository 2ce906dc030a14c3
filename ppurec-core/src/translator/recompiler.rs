//! Function lowering: guest blocks to IR blocks.
//!
//! One IR basic block is created per guest block up front (the entry block
//! is named "entry", the rest after their addresses, as the debug dumps
//! expect). Blocks are then lowered through a FIFO worklist guarded by the
//! `recompiled` flag: set the insert point, run the recompiler handler for
//! every instruction in address order, stitch split blocks, and push the
//! successors.

use std::collections::{BTreeMap, VecDeque};

use crate::error::{Result, TranslateError};
use crate::ir::{BlockId, FuncId, IrBuilder, Slot};
use crate::memory::GuestMemory;
use crate::translator::emit::EmitCtx;
use crate::translator::function::{ArgType, Function};
use crate::translator::instruction::Instruction;
use crate::translator::tables;

/// Lower `function` into its declared IR function and return the handle.
pub fn lower_function(
    function: &mut Function,
    memory: &dyn GuestMemory,
    builder: &mut dyn IrBuilder,
) -> Result<FuncId> {
    let func = function
        .ir_func
        .ok_or(TranslateError::Undeclared(function.address))?;

    // One IR block per guest block. The entry block is created first so it
    // leads the function regardless of where the entry sits in the address
    // order.
    let mut ir_blocks: BTreeMap<u32, BlockId> = BTreeMap::new();
    let entry_block = builder.create_block(func, "entry");
    ir_blocks.insert(function.address, entry_block);
    for (&addr, block) in function.blocks.iter_mut() {
        if addr == function.address {
            block.ir_block = Some(entry_block);
            continue;
        }
        let id = builder.create_block(func, &format!("block_{addr:x}"));
        block.ir_block = Some(id);
        ir_blocks.insert(addr, id);
    }
    if !function.blocks.contains_key(&function.address) {
        return Err(TranslateError::MissingEntry(function.address));
    }
    builder.set_insert_point(entry_block);
    seed_arguments(function, func, builder);

    let mut labels: VecDeque<u32> = VecDeque::new();
    labels.push_back(function.address);
    while let Some(addr) = labels.pop_front() {
        let Some(block) = function.blocks.get(&addr) else {
            continue;
        };
        if block.recompiled {
            continue;
        }
        let size = block.size;
        let (branch_a, branch_b) = (block.branch_a, block.branch_b);
        let ir_block = block.ir_block.ok_or(TranslateError::MissingEntry(addr))?;

        builder.set_insert_point(ir_block);
        for offset in (0..size).step_by(4) {
            let pc = addr + offset;
            let code = Instruction(memory.read32(pc)?);
            let mut ctx = EmitCtx {
                builder: &mut *builder,
                pc,
                blocks: &ir_blocks,
                ret: function.type_out,
            };
            (tables::lookup(code).emit)(&mut ctx, code);
        }

        // A split block falls through: stitch it to the block at the next
        // address, or return when none exists (single-block stubs ending in
        // bcctr, and blocks cut at a function boundary).
        let split = function
            .blocks
            .get(&addr)
            .map(|b| b.is_split(memory))
            .transpose()?
            .unwrap_or(false);
        if split {
            match ir_blocks.get(&(addr + size)) {
                Some(&next) => builder.br(next),
                None => {
                    let mut ctx = EmitCtx {
                        builder: &mut *builder,
                        pc: addr + size - 4,
                        blocks: &ir_blocks,
                        ret: function.type_out,
                    };
                    ctx.emit_abi_return();
                }
            }
        }

        if let Some(block) = function.blocks.get_mut(&addr) {
            block.recompiled = true;
        }
        if branch_a != 0 {
            labels.push_back(branch_a);
        }
        if branch_b != 0 {
            labels.push_back(branch_b);
        }
    }

    Ok(func)
}

/// Spill the declared arguments into their ABI register slots at the top of
/// the entry block, so handler reads observe them.
///
/// Arguments are grouped by class in declaration order: integers start at
/// GPR3, floats at FPR1, vectors at VR2.
fn seed_arguments(function: &Function, func: FuncId, builder: &mut dyn IrBuilder) {
    let mut next_gpr = 3u8;
    let mut next_fpr = 1u8;
    let mut next_vr = 2u8;
    for (index, arg) in function.type_in.iter().enumerate() {
        let slot = match arg {
            ArgType::Integer => {
                let slot = Slot::Gpr(next_gpr);
                next_gpr += 1;
                slot
            }
            ArgType::Float => {
                let slot = Slot::Fpr(next_fpr);
                next_fpr += 1;
                slot
            }
            ArgType::Vector => {
                let slot = Slot::Vr(next_vr);
                next_vr += 1;
                slot
            }
        };
        let value = builder.param(func, index);
        builder.write_slot(slot, value);
    }
}
