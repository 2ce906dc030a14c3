//! In-memory IR container for the reference backend.
//!
//! Values live in one arena per module; basic blocks reference values by id
//! in emission order. Constants and parameters are materialized values that
//! do not belong to any block, so passes can introduce them freely without
//! worrying about placement.

use std::fmt::Write as _;

use crate::ir::{BinOp, BlockId, CmpPred, FuncId, IrType, Slot, ValueId};

/// A single IR operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
    /// Function parameter `index`. Blockless.
    Param { index: u32 },
    /// Integer constant. Blockless.
    ConstI64 { value: i64 },
    /// Read of a guest register slot.
    Load { slot: Slot },
    /// Write of a guest register slot.
    Store { slot: Slot, value: ValueId },
    Bin { op: BinOp, lhs: ValueId, rhs: ValueId },
    Icmp { pred: CmpPred, lhs: ValueId, rhs: ValueId },
    Br { target: BlockId },
    CondBr { cond: ValueId, taken: BlockId, fallthrough: BlockId },
    Ret { value: Option<ValueId> },
    /// Tombstone left behind by passes; ignored everywhere.
    Nop,
}

impl Inst {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Inst::Br { .. } | Inst::CondBr { .. } | Inst::Ret { .. })
    }

    /// Whether removing the instruction changes observable behavior.
    pub fn has_side_effect(&self) -> bool {
        matches!(self, Inst::Store { .. }) || self.is_terminator()
    }
}

#[derive(Debug, Clone)]
pub struct BlockData {
    pub name: String,
    /// Value ids in emission order.
    pub insts: Vec<ValueId>,
}

#[derive(Debug, Clone)]
pub struct FuncData {
    pub name: String,
    pub ret: IrType,
    pub params: Vec<(IrType, ValueId)>,
    pub blocks: Vec<BlockId>,
}

/// One translated segment's worth of IR.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub funcs: Vec<FuncData>,
    pub blocks: Vec<BlockData>,
    pub values: Vec<Inst>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            funcs: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn func(&self, id: FuncId) -> &FuncData {
        &self.funcs[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.0 as usize]
    }

    pub fn value(&self, id: ValueId) -> &Inst {
        &self.values[id.0 as usize]
    }

    pub fn push_value(&mut self, inst: Inst) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(inst);
        id
    }

    /// Render the module in a textual form for debugging.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; module '{}'", self.name);
        for func in &self.funcs {
            let params = func
                .params
                .iter()
                .enumerate()
                .map(|(i, (ty, _))| format!("{} %arg{}", type_name(*ty), i))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "define {} @{}({}) {{", type_name(func.ret), func.name, params);
            for &block_id in &func.blocks {
                let block = self.block(block_id);
                let _ = writeln!(out, "{}:", block.name);
                for &value in &block.insts {
                    if let Some(line) = self.render(value) {
                        let _ = writeln!(out, "  {line}");
                    }
                }
            }
            let _ = writeln!(out, "}}");
        }
        out
    }

    fn operand(&self, id: ValueId) -> String {
        match self.value(id) {
            Inst::ConstI64 { value } => format!("{value}"),
            Inst::Param { index } => format!("%arg{index}"),
            _ => format!("%{}", id.0),
        }
    }

    fn render(&self, id: ValueId) -> Option<String> {
        let line = match self.value(id) {
            Inst::Nop | Inst::Param { .. } | Inst::ConstI64 { .. } => return None,
            Inst::Load { slot } => format!("%{} = load {}", id.0, slot),
            Inst::Store { slot, value } => format!("store {}, {}", slot, self.operand(*value)),
            Inst::Bin { op, lhs, rhs } => format!(
                "%{} = {} {}, {}",
                id.0,
                binop_name(*op),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            Inst::Icmp { pred, lhs, rhs } => format!(
                "%{} = icmp {} {}, {}",
                id.0,
                pred_name(*pred),
                self.operand(*lhs),
                self.operand(*rhs)
            ),
            Inst::Br { target } => format!("br label %{}", self.block(*target).name),
            Inst::CondBr { cond, taken, fallthrough } => format!(
                "br {}, label %{}, label %{}",
                self.operand(*cond),
                self.block(*taken).name,
                self.block(*fallthrough).name
            ),
            Inst::Ret { value: Some(v) } => format!("ret {}", self.operand(*v)),
            Inst::Ret { value: None } => "ret void".to_owned(),
        };
        Some(line)
    }
}

fn type_name(ty: IrType) -> &'static str {
    match ty {
        IrType::Void => "void",
        IrType::I64 => "i64",
        IrType::F64 => "f64",
        IrType::I128 => "i128",
    }
}

fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::SDiv => "sdiv",
        BinOp::UDiv => "udiv",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::Shl => "shl",
        BinOp::LShr => "lshr",
        BinOp::AShr => "ashr",
        BinOp::FAdd => "fadd",
        BinOp::FSub => "fsub",
        BinOp::FMul => "fmul",
        BinOp::FDiv => "fdiv",
    }
}

fn pred_name(pred: CmpPred) -> &'static str {
    match pred {
        CmpPred::Eq => "eq",
        CmpPred::Ne => "ne",
        CmpPred::SLt => "slt",
        CmpPred::SLe => "sle",
        CmpPred::SGt => "sgt",
        CmpPred::SGe => "sge",
        CmpPred::ULt => "ult",
        CmpPred::UGt => "ugt",
    }
}
