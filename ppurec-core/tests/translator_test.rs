// End-to-end tests for segment analysis, CFG construction, ABI
// classification and lowering, over hand-assembled big-endian programs.

use std::collections::BTreeSet;

use ppurec_core::ir::{Builder, IrBuilder};
use ppurec_core::translator::function::SegmentRange;
use ppurec_core::translator::{ArgType, Function, RetType};
use ppurec_core::{CodeImage, Segment, TranslateError};

const NOP: u32 = 0x60000000; // ori r0, r0, 0
const BLR: u32 = 0x4E800020;
const OR_R3_R3_R3: u32 = 0x7C631B78;
const BEQ_PLUS_0X10: u32 = 0x41820010;
const BL_BACK_4: u32 = 0x4BFFFFFD;

fn analyzed_segment(base: u32, words: &[u32]) -> (CodeImage, Segment) {
    let image = CodeImage::from_words(base, words);
    let mut segment = Segment::new("test", base, image.len());
    segment.analyze(&image).expect("segment analysis");
    (image, segment)
}

/// The quantified invariants every accepted function must satisfy.
fn assert_invariants(segment: &Segment) {
    for function in segment.functions.values() {
        assert!(
            function.blocks.contains_key(&function.address),
            "entry block missing for {}",
            function.name
        );
        let blocks: Vec<_> = function.blocks.values().collect();
        for pair in blocks.windows(2) {
            assert!(
                pair[0].address + pair[0].size <= pair[1].address,
                "blocks overlap in {}",
                function.name
            );
        }
        for block in blocks {
            assert!(block.size >= 4 && block.size % 4 == 0);
            assert!(segment.contains(block.address));
            for successor in [block.branch_a, block.branch_b] {
                if successor != 0 {
                    assert!(
                        function.blocks.contains_key(&successor),
                        "open CFG edge 0x{successor:08X} in {}",
                        function.name
                    );
                    assert!(segment.contains(successor));
                }
            }
        }
    }
}

#[test]
fn single_block_void_function() {
    let (_, segment) = analyzed_segment(0x10000, &[BLR]);
    assert_invariants(&segment);
    assert_eq!(segment.functions.len(), 1);

    let function = &segment.functions[&0x10000];
    assert_eq!(function.blocks.len(), 1);
    let block = &function.blocks[&0x10000];
    assert_eq!(block.size, 4);
    assert_eq!((block.branch_a, block.branch_b), (0, 0));
    assert!(function.type_in.is_empty());
    assert_eq!(function.type_out, RetType::Void);
}

#[test]
fn integer_identity_function() {
    let (_, segment) = analyzed_segment(0x10000, &[OR_R3_R3_R3, BLR]);
    assert_invariants(&segment);

    let function = &segment.functions[&0x10000];
    assert_eq!(function.type_in.as_slice(), &[ArgType::Integer]);
    assert_eq!(function.type_out, RetType::Integer);
}

#[test]
fn forward_conditional_splits_into_three_blocks() {
    let (_, segment) = analyzed_segment(0x10000, &[BEQ_PLUS_0X10, NOP, NOP, NOP, BLR]);
    assert_invariants(&segment);

    let function = &segment.functions[&0x10000];
    assert_eq!(function.blocks.len(), 3);

    let entry = &function.blocks[&0x10000];
    assert_eq!(entry.size, 4);
    assert_eq!((entry.branch_a, entry.branch_b), (0x10010, 0x10004));

    let middle = &function.blocks[&0x10004];
    assert_eq!(middle.size, 0xC);
    assert_eq!((middle.branch_a, middle.branch_b), (0, 0));

    let tail = &function.blocks[&0x10010];
    assert_eq!(tail.size, 4);
    assert_eq!((tail.branch_a, tail.branch_b), (0, 0));
}

#[test]
fn backward_branch_keeps_a_single_block() {
    // b .-8 from 0x10008 targets the entry itself. The entry is a jump
    // target, so the scanner would not list it as a function on its own;
    // analyze it directly as a known entry point.
    let image = CodeImage::from_words(0x10000, &[NOP, NOP, 0x4BFFFFF8]);
    let range = SegmentRange { start: 0x10000, end: 0x1000C };
    let boundaries: BTreeSet<u32> = [0x10000].into_iter().collect();

    let mut function = Function::new(0x10000);
    function.analyze(&image, range, &boundaries).unwrap();

    assert_eq!(function.blocks.len(), 1);
    let block = &function.blocks[&0x10000];
    assert_eq!(block.size, 0xC);
    assert_eq!(block.branch_a, 0x10000);
    assert_eq!(block.branch_b, 0);
    assert_eq!(function.type_out, RetType::Void);
}

#[test]
fn out_of_segment_jump_rejects_the_function() {
    // b .+0x10000 leaves the 16-byte segment.
    let (_, segment) = analyzed_segment(0x10000, &[0x48010000, NOP, NOP, NOP]);
    assert_eq!(segment.functions.len(), 0);
    assert_eq!(segment.stats().rejected_functions, 1);
}

#[test]
fn mid_function_call_target_becomes_its_own_function() {
    // A fills 0x10000..0x10010 and returns at 0x10010; a later function
    // calls 0x10010 directly, so the blr must become function B and A must
    // stop short of it.
    let words = [NOP, NOP, NOP, NOP, BLR, BL_BACK_4, BLR];
    let (_, segment) = analyzed_segment(0x10000, &words);
    assert_invariants(&segment);

    let entries: Vec<u32> = segment.functions.keys().copied().collect();
    assert_eq!(entries, vec![0x10000, 0x10010, 0x10014]);

    let a = &segment.functions[&0x10000];
    assert_eq!(a.blocks.len(), 1);
    assert_eq!(a.blocks[&0x10000].size, 0x10, "A must stop at B's entry");

    let b = &segment.functions[&0x10010];
    assert_eq!(b.blocks[&0x10010].size, 4);

    let caller = &segment.functions[&0x10014];
    assert_eq!(caller.blocks[&0x10014].size, 8);
}

#[test]
fn analysis_is_deterministic() {
    let words = [BEQ_PLUS_0X10, OR_R3_R3_R3, NOP, NOP, BLR, BL_BACK_4, BLR];
    let (_, first) = analyzed_segment(0x10000, &words);
    let (_, second) = analyzed_segment(0x10000, &words);
    assert_eq!(first.functions, second.functions);
}

#[test]
fn seeded_label_splits_like_an_early_discovery() {
    let image = CodeImage::from_words(0x10000, &[NOP, NOP, NOP, BLR]);
    let range = SegmentRange { start: 0x10000, end: 0x10010 };
    let boundaries: BTreeSet<u32> = [0x10000].into_iter().collect();

    let mut plain = Function::new(0x10000);
    plain.analyze(&image, range, &boundaries).unwrap();
    assert_eq!(plain.blocks.len(), 1);

    // Seeding a label inside the entry block must split it into exactly the
    // two blocks a joint seeding would produce.
    let mut seeded = Function::new(0x10000);
    seeded
        .analyze_seeded(&image, range, &boundaries, &[0x10008])
        .unwrap();
    assert_eq!(seeded.blocks.len(), 2);

    let head = &seeded.blocks[&0x10000];
    assert_eq!(head.size, 8);
    assert_eq!((head.branch_a, head.branch_b), (0x10008, 0));

    let tail = &seeded.blocks[&0x10008];
    assert_eq!(tail.size, 8);
    assert_eq!((tail.branch_a, tail.branch_b), (0, 0));
}

#[test]
fn float_return_classification_promotes_contiguously() {
    // fadd f1, f1, f2 / fadd f2, f1, f2 / blr: writes f1 and f2.
    let words = [0xFC21102A, 0xFC41102A, BLR];
    let (_, segment) = analyzed_segment(0x10000, &words);
    let function = &segment.functions[&0x10000];
    assert_eq!(function.type_in.as_slice(), &[ArgType::Float, ArgType::Float]);
    assert_eq!(function.type_out, RetType::FloatX2);
}

#[test]
fn recompile_produces_verified_ir() {
    let (image, mut segment) = analyzed_segment(0x10000, &[OR_R3_R3_R3, BLR]);
    let mut builder = Builder::new();
    let stats = segment.recompile(&image, &mut builder).expect("recompile");

    assert_eq!(stats.functions, 1);
    assert_eq!(stats.blocks, 1);
    assert_eq!(stats.guest_instructions, 2);

    let dump = builder.dump();
    assert!(dump.contains("define i64 @func_00010000(i64 %arg0)"), "{dump}");
    assert!(dump.contains("ret"), "{dump}");
}

#[test]
fn recompile_wires_conditional_edges_and_split_stitches() {
    let (image, mut segment) =
        analyzed_segment(0x10000, &[BEQ_PLUS_0X10, NOP, NOP, NOP, BLR]);
    let mut builder = Builder::new();
    segment.recompile(&image, &mut builder).expect("recompile");

    let dump = builder.dump();
    // Conditional edge out of the entry block.
    assert!(dump.contains("label %block_10010"), "{dump}");
    assert!(dump.contains("label %block_10004"), "{dump}");
    // The split middle block falls through to the return block.
    assert!(dump.contains("br label %block_10010"), "{dump}");
}

#[test]
fn bcctr_stub_lowers_as_return() {
    // Single-block stub ending in bctr: terminal, stitched as a return.
    let (image, mut segment) = analyzed_segment(0x10000, &[NOP, 0x4E800420]);
    let function = &segment.functions[&0x10000];
    assert_eq!(function.blocks[&0x10000].size, 8);

    let mut builder = Builder::new();
    segment.recompile(&image, &mut builder).expect("recompile");
    assert!(builder.dump().contains("ret"), "{}", builder.dump());
}

#[test]
fn memory_fault_is_fatal() {
    // The image claims to be larger than it is, so the scan faults.
    let image = CodeImage::from_words(0x10000, &[BLR]);
    let mut segment = Segment::new("test", 0x10000, 8);
    assert_eq!(
        segment.analyze(&image),
        Err(TranslateError::Memory(0x10004))
    );
}
