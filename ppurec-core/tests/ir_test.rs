// Tests for the reference IR backend: builder, passes and verifier.

use ppurec_core::ir::{BinOp, Builder, CmpPred, IrBuilder, IrType, Pass, Slot};

fn builder_with_function() -> (Builder, ppurec_core::ir::FuncId) {
    let mut builder = Builder::new();
    builder.begin_module("test");
    let func = builder.declare_function("f", IrType::I64, &[IrType::I64]);
    let entry = builder.create_block(func, "entry");
    builder.set_insert_point(entry);
    (builder, func)
}

#[test]
fn instcombine_folds_constants() {
    let (mut builder, func) = builder_with_function();
    let two = builder.const_i64(2);
    let three = builder.const_i64(3);
    let sum = builder.binop(BinOp::Add, two, three);
    builder.ret(Some(sum));

    builder.run_passes(func, &[Pass::InstCombine]);
    builder.verify(func).unwrap();
    assert!(builder.dump().contains("ret 5"), "{}", builder.dump());
}

#[test]
fn instcombine_erases_identities() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    let zero = builder.const_i64(0);
    let same = builder.binop(BinOp::Add, arg, zero);
    let doubled = builder.binop(BinOp::Or, same, same);
    builder.ret(Some(doubled));

    builder.run_passes(func, &[Pass::InstCombine]);
    builder.verify(func).unwrap();
    // x + 0 and x | x both collapse onto the argument itself.
    assert!(builder.dump().contains("ret %arg0"), "{}", builder.dump());
}

#[test]
fn promote_slots_forwards_stores_to_loads() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    builder.write_slot(Slot::Gpr(3), arg);
    let reloaded = builder.read_slot(Slot::Gpr(3));
    builder.ret(Some(reloaded));

    builder.run_passes(func, &[Pass::PromoteSlots]);
    builder.verify(func).unwrap();
    assert!(builder.dump().contains("ret %arg0"), "{}", builder.dump());
}

#[test]
fn reassociate_canonicalizes_constant_chains() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    let one = builder.const_i64(1);
    let two = builder.const_i64(2);
    let first = builder.binop(BinOp::Add, one, arg); // constant on the left
    let second = builder.binop(BinOp::Add, first, two);
    builder.ret(Some(second));

    builder.run_passes(func, &[Pass::Reassociate]);
    builder.verify(func).unwrap();
    // (1 + x) + 2 becomes x + 3.
    assert!(builder.dump().contains("add %arg0, 3"), "{}", builder.dump());
}

#[test]
fn gvn_deduplicates_pure_expressions() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    let a = builder.binop(BinOp::Mul, arg, arg);
    let b = builder.binop(BinOp::Mul, arg, arg);
    let sum = builder.binop(BinOp::Add, a, b);
    builder.ret(Some(sum));

    builder.run_passes(func, &[Pass::Gvn]);
    builder.verify(func).unwrap();
    let dump = builder.dump();
    assert_eq!(dump.matches(" = mul ").count(), 1, "{dump}");
}

#[test]
fn gvn_respects_store_barriers() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    let first = builder.read_slot(Slot::Gpr(4));
    builder.write_slot(Slot::Gpr(4), arg);
    let second = builder.read_slot(Slot::Gpr(4));
    let sum = builder.binop(BinOp::Add, first, second);
    builder.ret(Some(sum));

    builder.run_passes(func, &[Pass::Gvn]);
    builder.verify(func).unwrap();
    // The store invalidates the first load; both loads must survive.
    assert_eq!(builder.dump().matches(" = load gpr4").count(), 2);
}

#[test]
fn simplify_cfg_drops_unreachable_blocks() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    builder.ret(Some(arg));
    let orphan = builder.create_block(func, "orphan");
    builder.set_insert_point(orphan);
    builder.ret(Some(arg));

    builder.run_passes(func, &[Pass::SimplifyCfg]);
    builder.verify(func).unwrap();
    assert!(!builder.dump().contains("orphan"));
}

#[test]
fn verifier_rejects_unterminated_blocks() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    let zero = builder.const_i64(0);
    builder.icmp(CmpPred::Eq, arg, zero);

    let error = builder.verify(func).unwrap_err();
    assert!(error.contains("terminator"), "{error}");
}

#[test]
fn verifier_rejects_code_after_terminator() {
    let (mut builder, func) = builder_with_function();
    let arg = builder.param(func, 0);
    builder.ret(Some(arg));
    builder.read_slot(Slot::Gpr(3));

    let error = builder.verify(func).unwrap_err();
    assert!(error.contains("after its terminator"), "{error}");
}
