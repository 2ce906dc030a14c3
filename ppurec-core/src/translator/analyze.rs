//! Per-form register-usage analyzers.
//!
//! One handler per operand shape; the dispatch table picks the right one for
//! each decoded form. Handlers only record which registers an instruction
//! reads and writes. The rule that `RA == 0` means "literal zero" in D-form
//! addressing and `addi`/`addis` is honored so the zero register is never
//! misreported as a live argument.

use crate::translator::instruction::Instruction;
use crate::translator::usage::RegisterUsage;

fn record_cr0(usage: &mut RegisterUsage, code: Instruction) {
    if code.record() {
        usage.write_cr(0);
    }
}

fn record_cr1(usage: &mut RegisterUsage, code: Instruction) {
    if code.record() {
        usage.write_cr(1);
    }
}

/// Forms with no observable register traffic (`sc`, `sync`, `isync`, ...).
pub fn none(_usage: &mut RegisterUsage, _code: Instruction) {}

/// `addi`/`addis`: RA is a literal zero when the field is 0.
pub fn addi(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.write_gpr(code.rt());
}

/// D-form arithmetic that always reads RA (`mulli`, `subfic`).
pub fn arith_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.write_gpr(code.rt());
}

/// `addic`: arithmetic immediate that sets the carry.
pub fn addic(usage: &mut RegisterUsage, code: Instruction) {
    arith_imm(usage, code);
    usage.write_xer();
}

/// `addic.`: carry plus CR0.
pub fn addic_record(usage: &mut RegisterUsage, code: Instruction) {
    addic(usage, code);
    usage.write_cr(0);
}

/// `cmpi`/`cmpli`.
pub fn cmp_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.write_cr(code.crfd());
}

/// `twi`/`tdi`.
pub fn trap_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
}

/// `tw`/`td`.
pub fn trap(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.read_gpr(code.rb());
}

/// D-form logic: RS in the RT slot, destination RA (`ori`, `xoris`, ...).
pub fn logic_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.write_gpr(code.ra());
}

/// `andi.`/`andis.`: the only D-form logic that records into CR0.
pub fn logic_imm_record(usage: &mut RegisterUsage, code: Instruction) {
    logic_imm(usage, code);
    usage.write_cr(0);
}

/// `rlwimi` inserts into RA, so RA is both source and destination.
pub fn rlwimi(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.read_gpr(code.ra());
    usage.write_gpr(code.ra());
    record_cr0(usage, code);
}

/// `rlwinm` and the MD-form 64-bit rotates.
pub fn rotate_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.write_gpr(code.ra());
    record_cr0(usage, code);
}

/// `rlwnm`: rotate amount comes from RB.
pub fn rotate_reg(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.read_gpr(code.rb());
    usage.write_gpr(code.ra());
    record_cr0(usage, code);
}

/// D-form loads (`lwz`, `lbz`, `lha`, `ld`, ...).
pub fn load(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.write_gpr(code.rt());
}

/// Update-form loads also write the base register back.
pub fn load_update(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.write_gpr(code.rt());
    usage.write_gpr(code.ra());
}

/// D-form stores.
pub fn store(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
}

/// Update-form stores.
pub fn store_update(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.read_gpr(code.ra());
    usage.write_gpr(code.ra());
}

/// `lmw` fills RT through r31.
pub fn load_multiple(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    for reg in code.rt()..32 {
        usage.write_gpr(reg);
    }
}

/// `stmw` spills RT through r31.
pub fn store_multiple(usage: &mut RegisterUsage, code: Instruction) {
    for reg in code.rt()..32 {
        usage.read_gpr(reg);
    }
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
}

/// X-form indexed loads (`lwzx`, `lwarx`, ...).
pub fn load_indexed(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
    usage.write_gpr(code.rt());
}

/// X-form update loads.
pub fn load_update_indexed(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.read_gpr(code.rb());
    usage.write_gpr(code.rt());
    usage.write_gpr(code.ra());
}

/// X-form indexed stores.
pub fn store_indexed(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
}

/// X-form update stores.
pub fn store_update_indexed(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.read_gpr(code.ra());
    usage.read_gpr(code.rb());
    usage.write_gpr(code.ra());
}

/// `stwcx.`/`stdcx.`: conditional stores record success into CR0.
pub fn store_conditional(usage: &mut RegisterUsage, code: Instruction) {
    store_indexed(usage, code);
    usage.write_cr(0);
}

/// `cmp`/`cmpl`.
pub fn cmp(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.read_gpr(code.rb());
    usage.write_cr(code.crfd());
}

/// XO-form three-register arithmetic (`add`, `subf`, `mullw`, `divw`, ...).
pub fn arith(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.read_gpr(code.rb());
    usage.write_gpr(code.rt());
    record_cr0(usage, code);
}

/// Carrying arithmetic (`addc`, `subfc`).
pub fn arith_carry(usage: &mut RegisterUsage, code: Instruction) {
    arith(usage, code);
    usage.write_xer();
}

/// Extended arithmetic consumes and produces the carry (`adde`, `subfe`).
pub fn arith_extended(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.read_gpr(code.rb());
    usage.read_xer();
    usage.write_gpr(code.rt());
    usage.write_xer();
    record_cr0(usage, code);
}

/// Extended arithmetic with an implicit operand (`addze`, `subfme`, ...).
pub fn arith_extended_ra(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.read_xer();
    usage.write_gpr(code.rt());
    usage.write_xer();
    record_cr0(usage, code);
}

/// `neg`.
pub fn neg(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.write_gpr(code.rt());
    record_cr0(usage, code);
}

/// X-form logic and shifts: RS op RB into RA (`or`, `slw`, `nand`, ...).
pub fn logic(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.read_gpr(code.rb());
    usage.write_gpr(code.ra());
    record_cr0(usage, code);
}

/// `sraw`/`srad` shift carry out into XER.
pub fn shift_algebraic(usage: &mut RegisterUsage, code: Instruction) {
    logic(usage, code);
    usage.write_xer();
}

/// `srawi`: immediate shift amount, still sets the carry.
pub fn shift_algebraic_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.write_gpr(code.ra());
    usage.write_xer();
    record_cr0(usage, code);
}

/// Single-source X-form (`extsb`, `cntlzw`, ...).
pub fn unary(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.write_gpr(code.ra());
    record_cr0(usage, code);
}

/// `mfcr` observes every CR field.
pub fn mfcr(usage: &mut RegisterUsage, code: Instruction) {
    for field in 0..8 {
        usage.read_cr(field);
    }
    usage.write_gpr(code.rt());
}

/// `mtcrf` writes the fields selected by CRM.
pub fn mtcrf(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    for field in 0..8 {
        if code.crm() & (0x80 >> field) != 0 {
            usage.write_cr(field as usize);
        }
    }
}

pub fn mfspr(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_spr(code.spr());
    usage.write_gpr(code.rt());
}

pub fn mtspr(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.rt());
    usage.write_spr(code.spr());
}

/// Cache management touches only the address operands.
pub fn cache_op(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
}

/// `b`/`ba`/`bl`/`bla`.
pub fn branch(usage: &mut RegisterUsage, code: Instruction) {
    if code.lk() {
        usage.write_lr();
    }
}

/// `bc`: reads the tested CR field, decrements CTR unless suppressed.
pub fn branch_conditional(usage: &mut RegisterUsage, code: Instruction) {
    if code.bo() & 0x10 == 0 {
        usage.read_cr((code.bi() >> 2) as usize);
    }
    if code.bo() & 0x04 == 0 {
        usage.read_ctr();
        usage.write_ctr();
    }
    if code.lk() {
        usage.write_lr();
    }
}

/// `bclr`.
pub fn branch_to_lr(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_lr();
    branch_conditional(usage, code);
}

/// `bcctr`.
pub fn branch_to_ctr(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_ctr();
    if code.bo() & 0x10 == 0 {
        usage.read_cr((code.bi() >> 2) as usize);
    }
    if code.lk() {
        usage.write_lr();
    }
}

/// CR-to-CR logic (`crand`, `cror`, ...): fields via the bit designators.
pub fn cr_logic(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_cr(code.ra() >> 2);
    usage.read_cr(code.rb() >> 2);
    usage.write_cr(code.rt() >> 2);
}

/// `mcrf`.
pub fn mcrf(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_cr(code.ra() >> 2);
    usage.write_cr(code.crfd());
}

/// FP loads.
pub fn fp_load(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.write_fpr(code.rt());
}

pub fn fp_load_update(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_gpr(code.ra());
    usage.write_fpr(code.rt());
    usage.write_gpr(code.ra());
}

pub fn fp_load_indexed(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
    usage.write_fpr(code.rt());
}

/// FP stores.
pub fn fp_store(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.rt());
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
}

pub fn fp_store_update(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.rt());
    usage.read_gpr(code.ra());
    usage.write_gpr(code.ra());
}

pub fn fp_store_indexed(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.rt());
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
}

/// A-form FP arithmetic over FRA/FRB (`fadd`, `fsub`, `fdiv`).
pub fn fp_ab(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.ra());
    usage.read_fpr(code.rb());
    usage.write_fpr(code.rt());
    record_cr1(usage, code);
}

/// `fmul` takes FRC, not FRB.
pub fn fp_ac(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.ra());
    usage.read_fpr(code.frc());
    usage.write_fpr(code.rt());
    record_cr1(usage, code);
}

/// Fused multiply-add family and `fsel`.
pub fn fp_abc(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.ra());
    usage.read_fpr(code.rb());
    usage.read_fpr(code.frc());
    usage.write_fpr(code.rt());
    record_cr1(usage, code);
}

/// Single-source FP (`fmr`, `fneg`, `frsp`, conversions, ...).
pub fn fp_b(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.rb());
    usage.write_fpr(code.rt());
    record_cr1(usage, code);
}

/// `fcmpu`/`fcmpo`.
pub fn fcmp(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.ra());
    usage.read_fpr(code.rb());
    usage.write_cr(code.crfd());
}

/// `mffs` materializes the FPSCR; only the destination is tracked.
pub fn mffs(usage: &mut RegisterUsage, code: Instruction) {
    usage.write_fpr(code.rt());
}

/// `mtfsf` consumes an FPR; the FPSCR itself is untracked.
pub fn mtfsf(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_fpr(code.rb());
}

/// VX-form vector arithmetic: VD = VA op VB.
pub fn vx_arith(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_vr(code.ra());
    usage.read_vr(code.rb());
    usage.write_vr(code.rt());
}

/// Single-source VX forms (`vspltw` and friends): VD from VB.
pub fn vx_unary(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_vr(code.rb());
    usage.write_vr(code.rt());
}

/// Splat-immediate forms only write VD.
pub fn vx_splat_imm(usage: &mut RegisterUsage, code: Instruction) {
    usage.write_vr(code.rt());
}

/// `lvx`.
pub fn vector_load(usage: &mut RegisterUsage, code: Instruction) {
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
    usage.write_vr(code.rt());
}

/// `stvx`.
pub fn vector_store(usage: &mut RegisterUsage, code: Instruction) {
    usage.read_vr(code.rt());
    if code.ra() != 0 {
        usage.read_gpr(code.ra());
    }
    usage.read_gpr(code.rb());
}
