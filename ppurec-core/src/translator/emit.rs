//! Per-form recompiler handlers.
//!
//! Handlers receive an [`EmitCtx`] and emit IR at the builder's current
//! insert point. Guest registers are read and written through slots; the
//! promote-slots pass turns the resulting load/store traffic into SSA form.
//!
//! Coverage is deliberately partial: branches and returns always lower (they
//! terminate blocks), the common integer and floating-point arithmetic forms
//! lower, and everything else is a logged no-op until its handler lands.
//! Unknown forms warn, since they mean the generated IR is incomplete.

use std::collections::BTreeMap;

use crate::ir::{BinOp, BlockId, CmpPred, IrBuilder, Slot, ValueId};
use crate::translator::function::RetType;
use crate::translator::instruction::Instruction;
use crate::translator::tables;

/// Lowering context handed to every recompiler handler.
pub struct EmitCtx<'a> {
    pub builder: &'a mut dyn IrBuilder,
    /// Guest address of the instruction being lowered.
    pub pc: u32,
    /// Guest block address to IR block map of the current function.
    pub blocks: &'a BTreeMap<u32, BlockId>,
    /// Return classification of the current function.
    pub ret: RetType,
}

impl EmitCtx<'_> {
    /// Emit the function's return, reading the ABI result register.
    ///
    /// Multi-register float returns collapse to FPR1 for now, matching the
    /// declared single-double signature.
    pub fn emit_abi_return(&mut self) {
        let value = match self.ret {
            RetType::Void => None,
            RetType::Integer => Some(self.builder.read_slot(Slot::Gpr(3))),
            RetType::Float | RetType::FloatX2 | RetType::FloatX3 | RetType::FloatX4 => {
                Some(self.builder.read_slot(Slot::Fpr(1)))
            }
            RetType::Vector => Some(self.builder.read_slot(Slot::Vr(2))),
        };
        self.builder.ret(value);
    }

    /// Compare `lhs` against `rhs` and store the LT/GT/EQ mask into a CR
    /// field (LT=8, GT=4, EQ=2; SO is not modeled).
    fn emit_compare(&mut self, field: u8, lhs: ValueId, rhs: ValueId, signed: bool) {
        let (lt_pred, gt_pred) = if signed {
            (CmpPred::SLt, CmpPred::SGt)
        } else {
            (CmpPred::ULt, CmpPred::UGt)
        };
        let lt = self.builder.icmp(lt_pred, lhs, rhs);
        let gt = self.builder.icmp(gt_pred, lhs, rhs);
        let eq = self.builder.icmp(CmpPred::Eq, lhs, rhs);
        let three = self.builder.const_i64(3);
        let two = self.builder.const_i64(2);
        let one = self.builder.const_i64(1);
        let lt_bit = self.builder.binop(BinOp::Shl, lt, three);
        let gt_bit = self.builder.binop(BinOp::Shl, gt, two);
        let eq_bit = self.builder.binop(BinOp::Shl, eq, one);
        let mask = self.builder.binop(BinOp::Or, lt_bit, gt_bit);
        let mask = self.builder.binop(BinOp::Or, mask, eq_bit);
        self.builder.write_slot(Slot::Cr(field), mask);
    }

    /// Record-form CR0 update against zero.
    fn record_cr0(&mut self, code: Instruction, value: ValueId) {
        if code.record() {
            let zero = self.builder.const_i64(0);
            self.emit_compare(0, value, zero, true);
        }
    }

    fn gpr_or_zero(&mut self, reg: usize) -> ValueId {
        if reg == 0 {
            self.builder.const_i64(0)
        } else {
            self.builder.read_slot(Slot::Gpr(reg as u8))
        }
    }
}

/// Unknown form: the generated IR will be incomplete.
pub fn unknown(ctx: &mut EmitCtx<'_>, code: Instruction) {
    log::warn!(
        "unknown instruction 0x{:08X} at 0x{:08X}, lowering as no-op",
        code.word(),
        ctx.pc
    );
}

/// Known form without a lowering yet.
pub fn pending(ctx: &mut EmitCtx<'_>, code: Instruction) {
    log::debug!(
        "no lowering for '{}' (0x{:08X}) at 0x{:08X}",
        tables::lookup(code).name,
        code.word(),
        ctx.pc
    );
}

pub fn addi(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let base = ctx.gpr_or_zero(code.ra());
    let imm = ctx.builder.const_i64(code.simm() as i64);
    let sum = ctx.builder.binop(BinOp::Add, base, imm);
    ctx.builder.write_slot(Slot::Gpr(code.rt() as u8), sum);
}

pub fn addis(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let base = ctx.gpr_or_zero(code.ra());
    let imm = ctx.builder.const_i64((code.simm() as i64) << 16);
    let sum = ctx.builder.binop(BinOp::Add, base, imm);
    ctx.builder.write_slot(Slot::Gpr(code.rt() as u8), sum);
}

fn logic_imm(ctx: &mut EmitCtx<'_>, code: Instruction, op: BinOp, imm: i64) {
    let source = ctx.builder.read_slot(Slot::Gpr(code.rt() as u8));
    let imm = ctx.builder.const_i64(imm);
    let value = ctx.builder.binop(op, source, imm);
    ctx.builder.write_slot(Slot::Gpr(code.ra() as u8), value);
}

pub fn ori(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic_imm(ctx, code, BinOp::Or, code.uimm() as i64);
}

pub fn oris(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic_imm(ctx, code, BinOp::Or, (code.uimm() as i64) << 16);
}

pub fn xori(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic_imm(ctx, code, BinOp::Xor, code.uimm() as i64);
}

pub fn xoris(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic_imm(ctx, code, BinOp::Xor, (code.uimm() as i64) << 16);
}

pub fn andi_record(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let source = ctx.builder.read_slot(Slot::Gpr(code.rt() as u8));
    let imm = ctx.builder.const_i64(code.uimm() as i64);
    let value = ctx.builder.binop(BinOp::And, source, imm);
    ctx.builder.write_slot(Slot::Gpr(code.ra() as u8), value);
    let zero = ctx.builder.const_i64(0);
    ctx.emit_compare(0, value, zero, true);
}

pub fn andis_record(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let source = ctx.builder.read_slot(Slot::Gpr(code.rt() as u8));
    let imm = ctx.builder.const_i64((code.uimm() as i64) << 16);
    let value = ctx.builder.binop(BinOp::And, source, imm);
    ctx.builder.write_slot(Slot::Gpr(code.ra() as u8), value);
    let zero = ctx.builder.const_i64(0);
    ctx.emit_compare(0, value, zero, true);
}

pub fn mulli(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let source = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let imm = ctx.builder.const_i64(code.simm() as i64);
    let value = ctx.builder.binop(BinOp::Mul, source, imm);
    ctx.builder.write_slot(Slot::Gpr(code.rt() as u8), value);
}

/// XO-form arithmetic: RT = RA op RB.
fn arith(ctx: &mut EmitCtx<'_>, code: Instruction, op: BinOp) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let rhs = ctx.builder.read_slot(Slot::Gpr(code.rb() as u8));
    let value = ctx.builder.binop(op, lhs, rhs);
    ctx.builder.write_slot(Slot::Gpr(code.rt() as u8), value);
    ctx.record_cr0(code, value);
}

pub fn add(ctx: &mut EmitCtx<'_>, code: Instruction) {
    arith(ctx, code, BinOp::Add);
}

pub fn mullw(ctx: &mut EmitCtx<'_>, code: Instruction) {
    arith(ctx, code, BinOp::Mul);
}

pub fn divw(ctx: &mut EmitCtx<'_>, code: Instruction) {
    arith(ctx, code, BinOp::SDiv);
}

pub fn divwu(ctx: &mut EmitCtx<'_>, code: Instruction) {
    arith(ctx, code, BinOp::UDiv);
}

/// `subf` computes RB - RA.
pub fn subf(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.rb() as u8));
    let rhs = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let value = ctx.builder.binop(BinOp::Sub, lhs, rhs);
    ctx.builder.write_slot(Slot::Gpr(code.rt() as u8), value);
    ctx.record_cr0(code, value);
}

pub fn neg(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let zero = ctx.builder.const_i64(0);
    let source = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let value = ctx.builder.binop(BinOp::Sub, zero, source);
    ctx.builder.write_slot(Slot::Gpr(code.rt() as u8), value);
    ctx.record_cr0(code, value);
}

/// X-form logic: RA = RS op RB.
fn logic(ctx: &mut EmitCtx<'_>, code: Instruction, op: BinOp) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.rt() as u8));
    let rhs = ctx.builder.read_slot(Slot::Gpr(code.rb() as u8));
    let value = ctx.builder.binop(op, lhs, rhs);
    ctx.builder.write_slot(Slot::Gpr(code.ra() as u8), value);
    ctx.record_cr0(code, value);
}

pub fn and(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic(ctx, code, BinOp::And);
}

pub fn or(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic(ctx, code, BinOp::Or);
}

pub fn xor(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic(ctx, code, BinOp::Xor);
}

pub fn slw(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic(ctx, code, BinOp::Shl);
}

pub fn srw(ctx: &mut EmitCtx<'_>, code: Instruction) {
    logic(ctx, code, BinOp::LShr);
}

pub fn cmpi(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let rhs = ctx.builder.const_i64(code.simm() as i64);
    ctx.emit_compare(code.crfd() as u8, lhs, rhs, true);
}

pub fn cmpli(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let rhs = ctx.builder.const_i64(code.uimm() as i64);
    ctx.emit_compare(code.crfd() as u8, lhs, rhs, false);
}

pub fn cmp(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let rhs = ctx.builder.read_slot(Slot::Gpr(code.rb() as u8));
    ctx.emit_compare(code.crfd() as u8, lhs, rhs, true);
}

pub fn cmpl(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let lhs = ctx.builder.read_slot(Slot::Gpr(code.ra() as u8));
    let rhs = ctx.builder.read_slot(Slot::Gpr(code.rb() as u8));
    ctx.emit_compare(code.crfd() as u8, lhs, rhs, false);
}

/// A-form FP arithmetic over FRA/FRB.
fn fp_ab(ctx: &mut EmitCtx<'_>, code: Instruction, op: BinOp) {
    let lhs = ctx.builder.read_slot(Slot::Fpr(code.ra() as u8));
    let rhs = ctx.builder.read_slot(Slot::Fpr(code.rb() as u8));
    let value = ctx.builder.binop(op, lhs, rhs);
    ctx.builder.write_slot(Slot::Fpr(code.rt() as u8), value);
}

pub fn fadd(ctx: &mut EmitCtx<'_>, code: Instruction) {
    fp_ab(ctx, code, BinOp::FAdd);
}

pub fn fsub(ctx: &mut EmitCtx<'_>, code: Instruction) {
    fp_ab(ctx, code, BinOp::FSub);
}

pub fn fdiv(ctx: &mut EmitCtx<'_>, code: Instruction) {
    fp_ab(ctx, code, BinOp::FDiv);
}

/// `fmul` multiplies FRA by FRC.
pub fn fmul(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let lhs = ctx.builder.read_slot(Slot::Fpr(code.ra() as u8));
    let rhs = ctx.builder.read_slot(Slot::Fpr(code.frc() as u8));
    let value = ctx.builder.binop(BinOp::FMul, lhs, rhs);
    ctx.builder.write_slot(Slot::Fpr(code.rt() as u8), value);
}

pub fn fmr(ctx: &mut EmitCtx<'_>, code: Instruction) {
    let value = ctx.builder.read_slot(Slot::Fpr(code.rb() as u8));
    ctx.builder.write_slot(Slot::Fpr(code.rt() as u8), value);
}

/// `b`/`ba`: unconditional branch. `bl`/`bla` is a call and falls through;
/// call lowering is deferred until the backend grows a call surface.
pub fn branch(ctx: &mut EmitCtx<'_>, code: Instruction) {
    if code.lk() {
        log::debug!("call at 0x{:08X} lowered as fall-through", ctx.pc);
        return;
    }
    let Some(target) = code.target(ctx.pc) else {
        return;
    };
    match ctx.blocks.get(&target) {
        Some(&block) => ctx.builder.br(block),
        None => log::warn!(
            "branch at 0x{:08X} targets 0x{:08X} outside the block map",
            ctx.pc,
            target
        ),
    }
}

/// `bc`: conditional branch on a CR bit and/or the CTR counter.
pub fn branch_conditional(ctx: &mut EmitCtx<'_>, code: Instruction) {
    if code.lk() {
        log::debug!("conditional call at 0x{:08X} lowered as fall-through", ctx.pc);
        return;
    }
    let Some(target) = code.target(ctx.pc) else {
        return;
    };
    let fallthrough = ctx.pc.wrapping_add(4);
    let (Some(&taken_block), Some(&next_block)) =
        (ctx.blocks.get(&target), ctx.blocks.get(&fallthrough))
    else {
        log::warn!("conditional branch at 0x{:08X} has unmapped successors", ctx.pc);
        return;
    };

    let bo = code.bo();
    // "Branch always" encodings collapse to an unconditional branch; the
    // fall-through block stays reachable through the CFG worklist.
    if bo & 0x14 == 0x14 {
        ctx.builder.br(taken_block);
        return;
    }

    let mut condition: Option<ValueId> = None;
    if bo & 0x04 == 0 {
        // Decrement CTR and test it against zero.
        let ctr = ctx.builder.read_slot(Slot::Ctr);
        let one = ctx.builder.const_i64(1);
        let next = ctx.builder.binop(BinOp::Sub, ctr, one);
        ctx.builder.write_slot(Slot::Ctr, next);
        let zero = ctx.builder.const_i64(0);
        let pred = if bo & 0x02 != 0 { CmpPred::Eq } else { CmpPred::Ne };
        condition = Some(ctx.builder.icmp(pred, next, zero));
    }
    if bo & 0x10 == 0 {
        // Test the selected CR bit (LT=8, GT=4, EQ=2, SO=1).
        let field = ctx.builder.read_slot(Slot::Cr((code.bi() >> 2) as u8));
        let mask = ctx.builder.const_i64(8 >> (code.bi() & 3));
        let bit = ctx.builder.binop(BinOp::And, field, mask);
        let zero = ctx.builder.const_i64(0);
        let pred = if bo & 0x08 != 0 { CmpPred::Ne } else { CmpPred::Eq };
        let test = ctx.builder.icmp(pred, bit, zero);
        condition = Some(match condition {
            Some(prev) => ctx.builder.binop(BinOp::And, prev, test),
            None => test,
        });
    }
    match condition {
        Some(cond) => ctx.builder.cond_br(cond, taken_block, next_block),
        // Unreachable given the branch-always case above; keep the block
        // terminated regardless.
        None => ctx.builder.br(taken_block),
    }
}

/// `bclr`: return through the link register.
///
/// Conditional variants lower as plain returns for now; the CFG already
/// treats them as terminal.
pub fn branch_to_lr(ctx: &mut EmitCtx<'_>, code: Instruction) {
    if code.lk() {
        log::debug!("bclrl at 0x{:08X} lowered as fall-through", ctx.pc);
        return;
    }
    ctx.emit_abi_return();
}

/// `bcctr` ends a terminal block; the lowering worklist stitches the return,
/// so there is nothing to emit here.
pub fn branch_to_ctr(_ctx: &mut EmitCtx<'_>, _code: Instruction) {}
