//! Opcode dispatch tables.
//!
//! Every decoded form maps to a named `(analyzer, recompiler)` pair. The
//! tables are dense: one slot per primary opcode, plus per-primary sub-tables
//! indexed by the extended opcode field the primary selects (10-bit for the
//! X/XL/XO forms, 5-bit for the FP A forms, 11-bit for the VX forms).
//! Unknown forms share a no-op pair whose empty name marks the instruction
//! invalid for segment scanning.
//!
//! Built once per process on first lookup.

use std::sync::OnceLock;

use crate::translator::emit::EmitCtx;
use crate::translator::instruction::Instruction;
use crate::translator::usage::RegisterUsage;
use crate::translator::{analyze as a, emit as r};

/// Register-usage analyzer callback.
pub type AnalyzeFn = fn(&mut RegisterUsage, Instruction);

/// IR lowering callback.
pub type EmitFn = fn(&mut EmitCtx<'_>, Instruction);

/// One dispatch slot: mnemonic plus the handler pair.
#[derive(Clone, Copy)]
pub struct OpcodeEntry {
    pub name: &'static str,
    pub analyze: AnalyzeFn,
    pub emit: EmitFn,
}

impl OpcodeEntry {
    /// Unknown forms carry an empty name.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

const UNKNOWN: OpcodeEntry = OpcodeEntry {
    name: "",
    analyze: a::none,
    emit: r::unknown,
};

fn e(name: &'static str, analyze: AnalyzeFn, emit: EmitFn) -> OpcodeEntry {
    OpcodeEntry { name, analyze, emit }
}

struct Tables {
    primary: [OpcodeEntry; 64],
    /// Primary 4, VX forms, 11-bit extended opcode.
    vector: Vec<OpcodeEntry>,
    /// Primary 19, XL forms.
    xl: Vec<OpcodeEntry>,
    /// Primary 31, X/XO forms.
    x: Vec<OpcodeEntry>,
    /// Primary 59, single-precision A forms, 5-bit extended opcode.
    fp_single: [OpcodeEntry; 32],
    /// Primary 63, A forms.
    fp_double_a: [OpcodeEntry; 32],
    /// Primary 63, X forms.
    fp_double_x: Vec<OpcodeEntry>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

/// Dispatch entry for `code`. Total: unknown forms yield the no-op pair.
pub fn lookup(code: Instruction) -> &'static OpcodeEntry {
    let tables = TABLES.get_or_init(Tables::build);
    match code.opcode() {
        4 => &tables.vector[code.vxo() as usize],
        19 => &tables.xl[code.xo10() as usize],
        31 => &tables.x[code.xo10() as usize],
        59 => &tables.fp_single[code.xo5() as usize],
        63 => {
            // The A forms repeat every 32 extended opcodes; anything else is
            // dispatched on the full 10-bit field. The X forms in the table
            // below never alias an A-form slot.
            let entry = &tables.fp_double_a[code.xo5() as usize];
            if entry.is_valid() {
                entry
            } else {
                &tables.fp_double_x[code.xo10() as usize]
            }
        }
        op => &tables.primary[op as usize],
    }
}

impl Tables {
    fn build() -> Self {
        let mut primary = [UNKNOWN; 64];
        primary[2] = e("tdi", a::trap_imm, r::pending);
        primary[3] = e("twi", a::trap_imm, r::pending);
        primary[7] = e("mulli", a::arith_imm, r::mulli);
        primary[8] = e("subfic", a::addic, r::pending);
        primary[10] = e("cmpli", a::cmp_imm, r::cmpli);
        primary[11] = e("cmpi", a::cmp_imm, r::cmpi);
        primary[12] = e("addic", a::addic, r::pending);
        primary[13] = e("addic.", a::addic_record, r::pending);
        primary[14] = e("addi", a::addi, r::addi);
        primary[15] = e("addis", a::addi, r::addis);
        primary[16] = e("bc", a::branch_conditional, r::branch_conditional);
        primary[17] = e("sc", a::none, r::pending);
        primary[18] = e("b", a::branch, r::branch);
        primary[20] = e("rlwimi", a::rlwimi, r::pending);
        primary[21] = e("rlwinm", a::rotate_imm, r::pending);
        primary[23] = e("rlwnm", a::rotate_reg, r::pending);
        primary[24] = e("ori", a::logic_imm, r::ori);
        primary[25] = e("oris", a::logic_imm, r::oris);
        primary[26] = e("xori", a::logic_imm, r::xori);
        primary[27] = e("xoris", a::logic_imm, r::xoris);
        primary[28] = e("andi.", a::logic_imm_record, r::andi_record);
        primary[29] = e("andis.", a::logic_imm_record, r::andis_record);
        primary[30] = e("rld", a::rotate_imm, r::pending);
        primary[32] = e("lwz", a::load, r::pending);
        primary[33] = e("lwzu", a::load_update, r::pending);
        primary[34] = e("lbz", a::load, r::pending);
        primary[35] = e("lbzu", a::load_update, r::pending);
        primary[36] = e("stw", a::store, r::pending);
        primary[37] = e("stwu", a::store_update, r::pending);
        primary[38] = e("stb", a::store, r::pending);
        primary[39] = e("stbu", a::store_update, r::pending);
        primary[40] = e("lhz", a::load, r::pending);
        primary[41] = e("lhzu", a::load_update, r::pending);
        primary[42] = e("lha", a::load, r::pending);
        primary[43] = e("lhau", a::load_update, r::pending);
        primary[44] = e("sth", a::store, r::pending);
        primary[45] = e("sthu", a::store_update, r::pending);
        primary[46] = e("lmw", a::load_multiple, r::pending);
        primary[47] = e("stmw", a::store_multiple, r::pending);
        primary[48] = e("lfs", a::fp_load, r::pending);
        primary[49] = e("lfsu", a::fp_load_update, r::pending);
        primary[50] = e("lfd", a::fp_load, r::pending);
        primary[51] = e("lfdu", a::fp_load_update, r::pending);
        primary[52] = e("stfs", a::fp_store, r::pending);
        primary[53] = e("stfsu", a::fp_store_update, r::pending);
        primary[54] = e("stfd", a::fp_store, r::pending);
        primary[55] = e("stfdu", a::fp_store_update, r::pending);
        primary[58] = e("ld", a::load, r::pending);
        primary[62] = e("std", a::store, r::pending);

        let mut vector = vec![UNKNOWN; 2048];
        vector[0] = e("vaddubm", a::vx_arith, r::pending);
        vector[10] = e("vaddfp", a::vx_arith, r::pending);
        vector[64] = e("vadduhm", a::vx_arith, r::pending);
        vector[74] = e("vsubfp", a::vx_arith, r::pending);
        vector[128] = e("vadduwm", a::vx_arith, r::pending);
        vector[652] = e("vspltw", a::vx_unary, r::pending);
        vector[780] = e("vspltisb", a::vx_splat_imm, r::pending);
        vector[844] = e("vspltish", a::vx_splat_imm, r::pending);
        vector[908] = e("vspltisw", a::vx_splat_imm, r::pending);
        vector[1024] = e("vsububm", a::vx_arith, r::pending);
        vector[1028] = e("vand", a::vx_arith, r::pending);
        vector[1088] = e("vsubuhm", a::vx_arith, r::pending);
        vector[1152] = e("vsubuwm", a::vx_arith, r::pending);
        vector[1156] = e("vor", a::vx_arith, r::pending);
        vector[1220] = e("vxor", a::vx_arith, r::pending);

        let mut xl = vec![UNKNOWN; 1024];
        xl[0] = e("mcrf", a::mcrf, r::pending);
        xl[16] = e("bclr", a::branch_to_lr, r::branch_to_lr);
        xl[33] = e("crnor", a::cr_logic, r::pending);
        xl[129] = e("crandc", a::cr_logic, r::pending);
        xl[150] = e("isync", a::none, r::pending);
        xl[193] = e("crxor", a::cr_logic, r::pending);
        xl[225] = e("crnand", a::cr_logic, r::pending);
        xl[257] = e("crand", a::cr_logic, r::pending);
        xl[289] = e("creqv", a::cr_logic, r::pending);
        xl[417] = e("crorc", a::cr_logic, r::pending);
        xl[449] = e("cror", a::cr_logic, r::pending);
        xl[528] = e("bcctr", a::branch_to_ctr, r::branch_to_ctr);

        let mut x = vec![UNKNOWN; 1024];
        x[0] = e("cmp", a::cmp, r::cmp);
        x[4] = e("tw", a::trap, r::pending);
        x[8] = e("subfc", a::arith_carry, r::pending);
        x[9] = e("mulhdu", a::arith, r::pending);
        x[10] = e("addc", a::arith_carry, r::pending);
        x[11] = e("mulhwu", a::arith, r::pending);
        x[19] = e("mfcr", a::mfcr, r::pending);
        x[20] = e("lwarx", a::load_indexed, r::pending);
        x[21] = e("ldx", a::load_indexed, r::pending);
        x[23] = e("lwzx", a::load_indexed, r::pending);
        x[24] = e("slw", a::logic, r::slw);
        x[26] = e("cntlzw", a::unary, r::pending);
        x[27] = e("sld", a::logic, r::pending);
        x[28] = e("and", a::logic, r::and);
        x[32] = e("cmpl", a::cmp, r::cmpl);
        x[40] = e("subf", a::arith, r::subf);
        x[53] = e("ldux", a::load_update_indexed, r::pending);
        x[54] = e("dcbst", a::cache_op, r::pending);
        x[55] = e("lwzux", a::load_update_indexed, r::pending);
        x[58] = e("cntlzd", a::unary, r::pending);
        x[60] = e("andc", a::logic, r::pending);
        x[73] = e("mulhd", a::arith, r::pending);
        x[75] = e("mulhw", a::arith, r::pending);
        x[84] = e("ldarx", a::load_indexed, r::pending);
        x[86] = e("dcbf", a::cache_op, r::pending);
        x[87] = e("lbzx", a::load_indexed, r::pending);
        x[103] = e("lvx", a::vector_load, r::pending);
        x[104] = e("neg", a::neg, r::neg);
        x[119] = e("lbzux", a::load_update_indexed, r::pending);
        x[124] = e("nor", a::logic, r::pending);
        x[136] = e("subfe", a::arith_extended, r::pending);
        x[138] = e("adde", a::arith_extended, r::pending);
        x[144] = e("mtcrf", a::mtcrf, r::pending);
        x[149] = e("stdx", a::store_indexed, r::pending);
        x[150] = e("stwcx.", a::store_conditional, r::pending);
        x[151] = e("stwx", a::store_indexed, r::pending);
        x[181] = e("stdux", a::store_update_indexed, r::pending);
        x[183] = e("stwux", a::store_update_indexed, r::pending);
        x[200] = e("subfze", a::arith_extended_ra, r::pending);
        x[202] = e("addze", a::arith_extended_ra, r::pending);
        x[214] = e("stdcx.", a::store_conditional, r::pending);
        x[215] = e("stbx", a::store_indexed, r::pending);
        x[231] = e("stvx", a::vector_store, r::pending);
        x[232] = e("subfme", a::arith_extended_ra, r::pending);
        x[233] = e("mulld", a::arith, r::pending);
        x[234] = e("addme", a::arith_extended_ra, r::pending);
        x[235] = e("mullw", a::arith, r::mullw);
        x[246] = e("dcbtst", a::cache_op, r::pending);
        x[247] = e("stbux", a::store_update_indexed, r::pending);
        x[266] = e("add", a::arith, r::add);
        x[278] = e("dcbt", a::cache_op, r::pending);
        x[279] = e("lhzx", a::load_indexed, r::pending);
        x[284] = e("eqv", a::logic, r::pending);
        x[311] = e("lhzux", a::load_update_indexed, r::pending);
        x[316] = e("xor", a::logic, r::xor);
        x[339] = e("mfspr", a::mfspr, r::pending);
        x[341] = e("lwax", a::load_indexed, r::pending);
        x[343] = e("lhax", a::load_indexed, r::pending);
        x[375] = e("lhaux", a::load_update_indexed, r::pending);
        x[407] = e("sthx", a::store_indexed, r::pending);
        x[412] = e("orc", a::logic, r::pending);
        x[439] = e("sthux", a::store_update_indexed, r::pending);
        x[444] = e("or", a::logic, r::or);
        x[457] = e("divdu", a::arith, r::pending);
        x[459] = e("divwu", a::arith, r::divwu);
        x[467] = e("mtspr", a::mtspr, r::pending);
        x[476] = e("nand", a::logic, r::pending);
        x[489] = e("divd", a::arith, r::pending);
        x[491] = e("divw", a::arith, r::divw);
        x[534] = e("lwbrx", a::load_indexed, r::pending);
        x[535] = e("lfsx", a::fp_load_indexed, r::pending);
        x[536] = e("srw", a::logic, r::srw);
        x[539] = e("srd", a::logic, r::pending);
        x[598] = e("sync", a::none, r::pending);
        x[599] = e("lfdx", a::fp_load_indexed, r::pending);
        x[662] = e("stwbrx", a::store_indexed, r::pending);
        x[663] = e("stfsx", a::fp_store_indexed, r::pending);
        x[727] = e("stfdx", a::fp_store_indexed, r::pending);
        x[790] = e("lhbrx", a::load_indexed, r::pending);
        x[792] = e("sraw", a::shift_algebraic, r::pending);
        x[794] = e("srad", a::shift_algebraic, r::pending);
        x[824] = e("srawi", a::shift_algebraic_imm, r::pending);
        x[854] = e("eieio", a::none, r::pending);
        x[918] = e("sthbrx", a::store_indexed, r::pending);
        x[922] = e("extsh", a::unary, r::pending);
        x[954] = e("extsb", a::unary, r::pending);
        x[982] = e("icbi", a::cache_op, r::pending);
        x[986] = e("extsw", a::unary, r::pending);
        x[1014] = e("dcbz", a::cache_op, r::pending);

        let mut fp_single = [UNKNOWN; 32];
        fp_single[18] = e("fdivs", a::fp_ab, r::fdiv);
        fp_single[20] = e("fsubs", a::fp_ab, r::fsub);
        fp_single[21] = e("fadds", a::fp_ab, r::fadd);
        fp_single[22] = e("fsqrts", a::fp_b, r::pending);
        fp_single[24] = e("fres", a::fp_b, r::pending);
        fp_single[25] = e("fmuls", a::fp_ac, r::fmul);
        fp_single[28] = e("fmsubs", a::fp_abc, r::pending);
        fp_single[29] = e("fmadds", a::fp_abc, r::pending);
        fp_single[30] = e("fnmsubs", a::fp_abc, r::pending);
        fp_single[31] = e("fnmadds", a::fp_abc, r::pending);

        let mut fp_double_a = [UNKNOWN; 32];
        fp_double_a[18] = e("fdiv", a::fp_ab, r::fdiv);
        fp_double_a[20] = e("fsub", a::fp_ab, r::fsub);
        fp_double_a[21] = e("fadd", a::fp_ab, r::fadd);
        fp_double_a[22] = e("fsqrt", a::fp_b, r::pending);
        fp_double_a[23] = e("fsel", a::fp_abc, r::pending);
        fp_double_a[25] = e("fmul", a::fp_ac, r::fmul);
        fp_double_a[26] = e("frsqrte", a::fp_b, r::pending);
        fp_double_a[28] = e("fmsub", a::fp_abc, r::pending);
        fp_double_a[29] = e("fmadd", a::fp_abc, r::pending);
        fp_double_a[30] = e("fnmsub", a::fp_abc, r::pending);
        fp_double_a[31] = e("fnmadd", a::fp_abc, r::pending);

        let mut fp_double_x = vec![UNKNOWN; 1024];
        fp_double_x[0] = e("fcmpu", a::fcmp, r::pending);
        fp_double_x[12] = e("frsp", a::fp_b, r::pending);
        fp_double_x[14] = e("fctiw", a::fp_b, r::pending);
        fp_double_x[15] = e("fctiwz", a::fp_b, r::pending);
        fp_double_x[32] = e("fcmpo", a::fcmp, r::pending);
        fp_double_x[38] = e("mtfsb1", a::none, r::pending);
        fp_double_x[40] = e("fneg", a::fp_b, r::pending);
        fp_double_x[70] = e("mtfsb0", a::none, r::pending);
        fp_double_x[72] = e("fmr", a::fp_b, r::fmr);
        fp_double_x[134] = e("mtfsfi", a::none, r::pending);
        fp_double_x[136] = e("fnabs", a::fp_b, r::pending);
        fp_double_x[264] = e("fabs", a::fp_b, r::pending);
        fp_double_x[583] = e("mffs", a::mffs, r::pending);
        fp_double_x[711] = e("mtfsf", a::mtfsf, r::pending);
        fp_double_x[814] = e("fctid", a::fp_b, r::pending);
        fp_double_x[815] = e("fctidz", a::fp_b, r::pending);
        fp_double_x[846] = e("fcfid", a::fp_b, r::pending);

        Tables {
            primary,
            vector,
            xl,
            x,
            fp_single,
            fp_double_a,
            fp_double_x,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flow_forms_resolve() {
        assert_eq!(lookup(Instruction(0x4E800020)).name, "bclr");
        assert_eq!(lookup(Instruction(0x4E800420)).name, "bcctr");
        assert_eq!(lookup(Instruction(0x48000000)).name, "b");
        assert_eq!(lookup(Instruction(0x41820010)).name, "bc");
    }

    #[test]
    fn extended_forms_resolve() {
        // or r3, r3, r3
        assert_eq!(lookup(Instruction(0x7C631B78)).name, "or");
        // fadd f1, f1, f2
        assert_eq!(lookup(Instruction(0xFC21102A)).name, "fadd");
        // fmr f1, f2
        assert_eq!(lookup(Instruction(0xFC201090)).name, "fmr");
        // mflr r0
        assert_eq!(lookup(Instruction(0x7C0802A6)).name, "mfspr");
    }

    #[test]
    fn unknown_words_are_invalid() {
        assert!(!lookup(Instruction(0x00000000)).is_valid());
        assert!(!lookup(Instruction(0x04000000)).is_valid());
        assert!(lookup(Instruction(0x60000000)).is_valid()); // nop = ori 0,0,0
    }
}
