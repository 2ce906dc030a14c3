//! Reference implementation of the [`IrBuilder`] trait.

use crate::ir::module::{BlockData, FuncData, Inst, Module};
use crate::ir::{passes, BinOp, BlockId, CmpPred, FuncId, IrType, IrBuilder, Pass, Slot, ValueId};

/// Builds a [`Module`] through the translator-facing trait.
///
/// The builder keeps a single insert point; every emitted instruction is
/// appended to that block. Emitting without an insert point is a driver bug
/// and the value is silently dropped from all blocks, which the verifier
/// then reports.
#[derive(Debug, Default)]
pub struct Builder {
    module: Module,
    insert: Option<BlockId>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    fn emit(&mut self, inst: Inst) -> ValueId {
        let id = self.module.push_value(inst);
        if let Some(block) = self.insert {
            self.module.blocks[block.0 as usize].insts.push(id);
        } else {
            log::error!("IR value emitted without an insert point");
        }
        id
    }
}

impl IrBuilder for Builder {
    fn begin_module(&mut self, name: &str) {
        self.module = Module::new(name);
        self.insert = None;
    }

    fn declare_function(&mut self, name: &str, ret: IrType, params: &[IrType]) -> FuncId {
        let mut param_values = Vec::with_capacity(params.len());
        for (index, &ty) in params.iter().enumerate() {
            let value = self.module.push_value(Inst::Param { index: index as u32 });
            param_values.push((ty, value));
        }
        let id = FuncId(self.module.funcs.len() as u32);
        self.module.funcs.push(FuncData {
            name: name.to_owned(),
            ret,
            params: param_values,
            blocks: Vec::new(),
        });
        id
    }

    fn create_block(&mut self, func: FuncId, name: &str) -> BlockId {
        let id = BlockId(self.module.blocks.len() as u32);
        self.module.blocks.push(BlockData {
            name: name.to_owned(),
            insts: Vec::new(),
        });
        self.module.funcs[func.0 as usize].blocks.push(id);
        id
    }

    fn set_insert_point(&mut self, block: BlockId) {
        self.insert = Some(block);
    }

    fn param(&mut self, func: FuncId, index: usize) -> ValueId {
        self.module.funcs[func.0 as usize].params[index].1
    }

    fn const_i64(&mut self, value: i64) -> ValueId {
        // Constants are blockless; no insert point required.
        self.module.push_value(Inst::ConstI64 { value })
    }

    fn read_slot(&mut self, slot: Slot) -> ValueId {
        self.emit(Inst::Load { slot })
    }

    fn write_slot(&mut self, slot: Slot, value: ValueId) {
        self.emit(Inst::Store { slot, value });
    }

    fn binop(&mut self, op: BinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Inst::Bin { op, lhs, rhs })
    }

    fn icmp(&mut self, pred: CmpPred, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit(Inst::Icmp { pred, lhs, rhs })
    }

    fn br(&mut self, target: BlockId) {
        self.emit(Inst::Br { target });
    }

    fn cond_br(&mut self, cond: ValueId, taken: BlockId, fallthrough: BlockId) {
        self.emit(Inst::CondBr { cond, taken, fallthrough });
    }

    fn ret(&mut self, value: Option<ValueId>) {
        self.emit(Inst::Ret { value });
    }

    fn run_passes(&mut self, func: FuncId, pipeline: &[Pass]) {
        for pass in pipeline {
            match pass {
                Pass::PromoteSlots => passes::promote_slots(&mut self.module, func),
                Pass::InstCombine => passes::instcombine(&mut self.module, func),
                Pass::Reassociate => passes::reassociate(&mut self.module, func),
                Pass::Gvn => passes::gvn(&mut self.module, func),
                Pass::SimplifyCfg => passes::simplify_cfg(&mut self.module, func),
            }
        }
    }

    fn verify(&self, func: FuncId) -> Result<(), String> {
        passes::verify(&self.module, func)
    }

    fn dump(&self) -> String {
        self.module.dump()
    }
}
