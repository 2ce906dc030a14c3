//! Scalar function passes and the verifier for the reference backend.
//!
//! Passes rewrite the value arena in place. Instructions made redundant are
//! replaced with [`Inst::Nop`] tombstones and every use is redirected before
//! the pass returns, so between passes the IR is always consistent.

use std::collections::{HashMap, HashSet};

use crate::ir::module::{Inst, Module};
use crate::ir::{BinOp, BlockId, CmpPred, FuncId, Slot, ValueId};

/// All value ids of `func`, in block emission order.
fn function_values(module: &Module, func: FuncId) -> Vec<ValueId> {
    module
        .func(func)
        .blocks
        .iter()
        .flat_map(|&b| module.block(b).insts.iter().copied())
        .collect()
}

fn resolve(rewrites: &HashMap<ValueId, ValueId>, mut id: ValueId) -> ValueId {
    while let Some(&next) = rewrites.get(&id) {
        id = next;
    }
    id
}

fn const_of(module: &Module, id: ValueId) -> Option<i64> {
    match module.value(id) {
        Inst::ConstI64 { value } => Some(*value),
        _ => None,
    }
}

/// Redirect every operand of `func` through `rewrites`.
fn apply_rewrites(module: &mut Module, func: FuncId, rewrites: &HashMap<ValueId, ValueId>) {
    if rewrites.is_empty() {
        return;
    }
    for id in function_values(module, func) {
        match &mut module.values[id.0 as usize] {
            Inst::Store { value, .. } => *value = resolve(rewrites, *value),
            Inst::Bin { lhs, rhs, .. } | Inst::Icmp { lhs, rhs, .. } => {
                *lhs = resolve(rewrites, *lhs);
                *rhs = resolve(rewrites, *rhs);
            }
            Inst::CondBr { cond, .. } => *cond = resolve(rewrites, *cond),
            Inst::Ret { value: Some(v) } => *v = resolve(rewrites, *v),
            _ => {}
        }
    }
}

/// Forward slot stores to later loads within each block.
///
/// A load with a known in-block store becomes an alias of the stored value;
/// a load with no preceding store becomes the block-local value of that slot
/// so repeated loads collapse. Stores are kept: other blocks may observe the
/// slot.
pub fn promote_slots(module: &mut Module, func: FuncId) {
    let mut rewrites: HashMap<ValueId, ValueId> = HashMap::new();
    for &block in module.func(func).blocks.clone().iter() {
        let mut current: HashMap<Slot, ValueId> = HashMap::new();
        for &id in module.block(block).insts.clone().iter() {
            match *module.value(id) {
                Inst::Load { slot } => {
                    if let Some(&value) = current.get(&slot) {
                        rewrites.insert(id, value);
                        module.values[id.0 as usize] = Inst::Nop;
                    } else {
                        current.insert(slot, id);
                    }
                }
                Inst::Store { slot, value } => {
                    current.insert(slot, value);
                }
                _ => {}
            }
        }
    }
    apply_rewrites(module, func, &rewrites);
}

fn fold(op: BinOp, a: i64, b: i64) -> Option<i64> {
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::SDiv => {
            if b == 0 || (a == i64::MIN && b == -1) {
                return None;
            }
            a.wrapping_div(b)
        }
        BinOp::UDiv => {
            if b == 0 {
                return None;
            }
            ((a as u64) / (b as u64)) as i64
        }
        BinOp::And => a & b,
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Shl => a.wrapping_shl(b as u32 & 63),
        BinOp::LShr => ((a as u64).wrapping_shr(b as u32 & 63)) as i64,
        BinOp::AShr => a.wrapping_shr(b as u32 & 63),
        // Floating-point values are opaque to the integer folder.
        BinOp::FAdd | BinOp::FSub | BinOp::FMul | BinOp::FDiv => return None,
    };
    Some(value)
}

fn fold_cmp(pred: CmpPred, a: i64, b: i64) -> i64 {
    let hit = match pred {
        CmpPred::Eq => a == b,
        CmpPred::Ne => a != b,
        CmpPred::SLt => a < b,
        CmpPred::SLe => a <= b,
        CmpPred::SGt => a > b,
        CmpPred::SGe => a >= b,
        CmpPred::ULt => (a as u64) < (b as u64),
        CmpPred::UGt => (a as u64) > (b as u64),
    };
    hit as i64
}

/// Peephole combine: constant folding plus algebraic identities.
pub fn instcombine(module: &mut Module, func: FuncId) {
    let mut rewrites: HashMap<ValueId, ValueId> = HashMap::new();
    for id in function_values(module, func) {
        match *module.value(id) {
            Inst::Bin { op, lhs, rhs } => {
                let lhs = resolve(&rewrites, lhs);
                let rhs = resolve(&rewrites, rhs);
                let lc = const_of(module, lhs);
                let rc = const_of(module, rhs);
                if let (Some(a), Some(b)) = (lc, rc) {
                    if let Some(value) = fold(op, a, b) {
                        module.values[id.0 as usize] = Inst::ConstI64 { value };
                        continue;
                    }
                }
                let alias = match (op, rc) {
                    (BinOp::Add | BinOp::Sub | BinOp::Or | BinOp::Xor, Some(0)) => Some(lhs),
                    (BinOp::Shl | BinOp::LShr | BinOp::AShr, Some(0)) => Some(lhs),
                    (BinOp::Mul, Some(1)) | (BinOp::SDiv | BinOp::UDiv, Some(1)) => Some(lhs),
                    (BinOp::Add | BinOp::Or | BinOp::Xor, _) if lc == Some(0) => Some(rhs),
                    (BinOp::Mul, _) if lc == Some(1) => Some(rhs),
                    (BinOp::And | BinOp::Or, _) if lhs == rhs => Some(lhs),
                    _ => None,
                };
                if let Some(alias) = alias {
                    rewrites.insert(id, alias);
                    module.values[id.0 as usize] = Inst::Nop;
                    continue;
                }
                let zero = matches!((op, lc, rc), (BinOp::Mul | BinOp::And, _, Some(0)))
                    || matches!((op, lc), (BinOp::Mul | BinOp::And, Some(0)))
                    || (matches!(op, BinOp::Xor | BinOp::Sub) && lhs == rhs);
                if zero {
                    module.values[id.0 as usize] = Inst::ConstI64 { value: 0 };
                }
            }
            Inst::Icmp { pred, lhs, rhs } => {
                let lhs = resolve(&rewrites, lhs);
                let rhs = resolve(&rewrites, rhs);
                if let (Some(a), Some(b)) = (const_of(module, lhs), const_of(module, rhs)) {
                    module.values[id.0 as usize] = Inst::ConstI64 { value: fold_cmp(pred, a, b) };
                }
            }
            _ => {}
        }
    }
    apply_rewrites(module, func, &rewrites);
}

/// Canonicalize commutative expressions: constants move to the right-hand
/// side, and `(x op c1) op c2` folds into `x op (c1 op c2)`.
pub fn reassociate(module: &mut Module, func: FuncId) {
    for id in function_values(module, func) {
        let Inst::Bin { op, lhs, rhs } = *module.value(id) else {
            continue;
        };
        if op.is_commutative() && const_of(module, lhs).is_some() && const_of(module, rhs).is_none() {
            module.values[id.0 as usize] = Inst::Bin { op, lhs: rhs, rhs: lhs };
        }
        let Inst::Bin { op, lhs, rhs } = *module.value(id) else {
            continue;
        };
        let (Some(c2), true) = (const_of(module, rhs), op.is_commutative()) else {
            continue;
        };
        let Inst::Bin { op: inner, lhs: x, rhs: inner_rhs } = *module.value(lhs) else {
            continue;
        };
        if inner != op {
            continue;
        }
        if let Some(c1) = const_of(module, inner_rhs) {
            if let Some(value) = fold(op, c1, c2) {
                let folded = module.push_value(Inst::ConstI64 { value });
                module.values[id.0 as usize] = Inst::Bin { op, lhs: x, rhs: folded };
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum GvnKey {
    Bin(BinOp, ValueId, ValueId),
    Icmp(CmpPred, ValueId, ValueId),
    Load(Slot),
}

/// Block-local value numbering. Repeated pure computations and slot loads
/// collapse onto their first occurrence; a store invalidates the loads of
/// its slot.
pub fn gvn(module: &mut Module, func: FuncId) {
    let mut rewrites: HashMap<ValueId, ValueId> = HashMap::new();
    for &block in module.func(func).blocks.clone().iter() {
        let mut leaders: HashMap<GvnKey, ValueId> = HashMap::new();
        for &id in module.block(block).insts.clone().iter() {
            let key = match *module.value(id) {
                Inst::Bin { op, lhs, rhs } => {
                    let lhs = resolve(&rewrites, lhs);
                    let rhs = resolve(&rewrites, rhs);
                    let (lhs, rhs) = if op.is_commutative() && rhs < lhs { (rhs, lhs) } else { (lhs, rhs) };
                    GvnKey::Bin(op, lhs, rhs)
                }
                Inst::Icmp { pred, lhs, rhs } => {
                    GvnKey::Icmp(pred, resolve(&rewrites, lhs), resolve(&rewrites, rhs))
                }
                Inst::Load { slot } => GvnKey::Load(slot),
                Inst::Store { slot, .. } => {
                    leaders.remove(&GvnKey::Load(slot));
                    continue;
                }
                _ => continue,
            };
            if let Some(&leader) = leaders.get(&key) {
                rewrites.insert(id, leader);
                module.values[id.0 as usize] = Inst::Nop;
            } else {
                leaders.insert(key, id);
            }
        }
    }
    apply_rewrites(module, func, &rewrites);
}

/// Drop blocks that cannot be reached from the function entry.
pub fn simplify_cfg(module: &mut Module, func: FuncId) {
    let blocks = module.func(func).blocks.clone();
    let Some(&entry) = blocks.first() else {
        return;
    };
    let mut reachable: HashSet<BlockId> = HashSet::new();
    let mut worklist = vec![entry];
    while let Some(block) = worklist.pop() {
        if !reachable.insert(block) {
            continue;
        }
        for &id in &module.block(block).insts {
            match *module.value(id) {
                Inst::Br { target } => worklist.push(target),
                Inst::CondBr { taken, fallthrough, .. } => {
                    worklist.push(taken);
                    worklist.push(fallthrough);
                }
                _ => {}
            }
        }
    }
    module.funcs[func.0 as usize]
        .blocks
        .retain(|b| reachable.contains(b));
}

/// Structural well-formedness check.
///
/// Enforced rules: every block carries exactly one terminator, in last
/// position; operands are constants, parameters, or values defined earlier
/// in the same block; branch targets belong to the function.
pub fn verify(module: &Module, func: FuncId) -> Result<(), String> {
    let data = module.func(func);
    let owned: HashSet<BlockId> = data.blocks.iter().copied().collect();
    for &block_id in &data.blocks {
        let block = module.block(block_id);
        let mut defined: HashSet<ValueId> = HashSet::new();
        let mut terminated = false;
        let mut live = 0usize;
        let check = |operand: ValueId, defined: &HashSet<ValueId>| -> Result<(), String> {
            match module.value(operand) {
                Inst::Param { .. } | Inst::ConstI64 { .. } => Ok(()),
                Inst::Nop => Err(format!(
                    "block '{}' uses removed value %{}",
                    block.name, operand.0
                )),
                _ if defined.contains(&operand) => Ok(()),
                _ => Err(format!(
                    "block '{}' uses %{} before its definition",
                    block.name, operand.0
                )),
            }
        };
        let check_target = |target: BlockId| -> Result<(), String> {
            if owned.contains(&target) {
                Ok(())
            } else {
                Err(format!(
                    "block '{}' branches outside the function",
                    block.name
                ))
            }
        };
        for &id in &block.insts {
            let inst = module.value(id);
            if matches!(inst, Inst::Nop) {
                continue;
            }
            live += 1;
            if terminated {
                return Err(format!("block '{}' has code after its terminator", block.name));
            }
            match *inst {
                Inst::Store { value, .. } => check(value, &defined)?,
                Inst::Bin { lhs, rhs, .. } | Inst::Icmp { lhs, rhs, .. } => {
                    check(lhs, &defined)?;
                    check(rhs, &defined)?;
                }
                Inst::Br { target } => check_target(target)?,
                Inst::CondBr { cond, taken, fallthrough } => {
                    check(cond, &defined)?;
                    check_target(taken)?;
                    check_target(fallthrough)?;
                }
                Inst::Ret { value: Some(v) } => check(v, &defined)?,
                _ => {}
            }
            if inst.is_terminator() {
                terminated = true;
            }
            defined.insert(id);
        }
        if live == 0 {
            return Err(format!("block '{}' is empty", block.name));
        }
        if !terminated {
            return Err(format!("block '{}' lacks a terminator", block.name));
        }
    }
    Ok(())
}
