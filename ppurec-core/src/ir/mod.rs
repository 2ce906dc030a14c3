//! Intermediate representation boundary.
//!
//! The translator never talks to a JIT backend directly. It drives the
//! [`IrBuilder`] trait, which covers exactly the operations lowering needs:
//! declaring typed functions, creating basic blocks, emitting straight-line
//! values and terminators, and running a named pass pipeline. Any backend
//! implementing the trait can sit behind the translator; [`Builder`] is the
//! in-tree reference backend used by tests and the CLI.
//!
//! Guest architectural state (GPRs, FPRs, vector registers, condition
//! register fields, LR/CTR/XER) is exposed to instruction handlers as
//! [`Slot`]s. The reference backend materializes slot accesses as loads and
//! stores, which the promote-slots pass later folds into SSA values, the
//! same division of labor as a stack-slot/mem2reg pipeline.

mod builder;
mod module;
mod passes;

pub use builder::Builder;
pub use module::{BlockData, FuncData, Inst, Module};

/// Handle to a declared IR function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Handle to a basic block inside an IR module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// Handle to an SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

/// The narrow type vocabulary the translator needs from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrType {
    Void,
    /// 64-bit integer scalar.
    I64,
    /// 64-bit IEEE double.
    F64,
    /// 128-bit integer, used for vector registers.
    I128,
}

/// Binary operations on IR values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinOp {
    /// Operand order does not matter for these.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Mul | BinOp::And | BinOp::Or | BinOp::Xor | BinOp::FAdd | BinOp::FMul
        )
    }
}

/// Integer comparison predicates. Comparisons produce 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpPred {
    Eq,
    Ne,
    SLt,
    SLe,
    SGt,
    SGe,
    ULt,
    UGt,
}

/// A guest architectural register viewed as a storage slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Gpr(u8),
    Fpr(u8),
    Vr(u8),
    /// One 4-bit condition register field (LT/GT/EQ/SO mask).
    Cr(u8),
    Lr,
    Ctr,
    Xer,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Gpr(r) => write!(f, "gpr{r}"),
            Slot::Fpr(r) => write!(f, "fpr{r}"),
            Slot::Vr(r) => write!(f, "vr{r}"),
            Slot::Cr(c) => write!(f, "cr{c}"),
            Slot::Lr => write!(f, "lr"),
            Slot::Ctr => write!(f, "ctr"),
            Slot::Xer => write!(f, "xer"),
        }
    }
}

/// Function passes a backend must know how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Forward slot stores to slot loads, turning guest-register traffic
    /// into SSA values.
    PromoteSlots,
    /// Peephole simplifications and constant folding.
    InstCombine,
    /// Canonicalize commutative expressions.
    Reassociate,
    /// Value-numbering based redundancy elimination.
    Gvn,
    /// Drop blocks unreachable from the entry.
    SimplifyCfg,
}

/// The builder interface lowering drives.
///
/// Implementations are single-threaded; the translator uses one builder per
/// segment and never shares it across threads.
pub trait IrBuilder {
    /// Start a fresh module. Must be called before any declaration.
    fn begin_module(&mut self, name: &str);

    /// Declare an externally-visible function and return its handle.
    fn declare_function(&mut self, name: &str, ret: IrType, params: &[IrType]) -> FuncId;

    /// Append a basic block to `func`.
    fn create_block(&mut self, func: FuncId, name: &str) -> BlockId;

    /// Direct subsequent emission into `block`.
    fn set_insert_point(&mut self, block: BlockId);

    /// The value of parameter `index` of `func`.
    fn param(&mut self, func: FuncId, index: usize) -> ValueId;

    fn const_i64(&mut self, value: i64) -> ValueId;

    /// Read a guest register slot at the insert point.
    fn read_slot(&mut self, slot: Slot) -> ValueId;

    /// Write a guest register slot at the insert point.
    fn write_slot(&mut self, slot: Slot, value: ValueId);

    fn binop(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId;

    fn icmp(&mut self, pred: CmpPred, lhs: ValueId, rhs: ValueId) -> ValueId;

    /// Unconditional branch terminator.
    fn br(&mut self, target: BlockId);

    /// Two-way branch on `cond != 0`.
    fn cond_br(&mut self, cond: ValueId, taken: BlockId, fallthrough: BlockId);

    /// Return terminator, with a value for non-void functions.
    fn ret(&mut self, value: Option<ValueId>);

    /// Run `pipeline` over `func`, in order.
    fn run_passes(&mut self, func: FuncId, pipeline: &[Pass]);

    /// Check structural well-formedness of `func`.
    ///
    /// A failure here is a translator bug, not a property of the guest code.
    fn verify(&self, func: FuncId) -> Result<(), String>;

    /// Render the whole module as text for debugging.
    fn dump(&self) -> String;
}
