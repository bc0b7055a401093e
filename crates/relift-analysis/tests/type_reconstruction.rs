//! End-to-end type reconstruction scenarios.
//!
//! Each test lifts a tiny hand-built function, fills in the oracle facts a
//! real pipeline would provide, runs the analyzer to its fixed point, and
//! checks the reconstructed types.

use relift_analysis::dataflow::{DefinitionChunk, Definitions, Value};
use relift_analysis::{
    CallsData, Dataflow, FunctionSignature, ReturnAnalyzer, TypeAnalyzer, TypeStore, Usage,
};
use relift_ir::{
    BinaryOp, CancellationToken, Function, Location, Statement, Term, TermId,
};

fn analyze(function: &Function, dataflow: &Dataflow, calls_data: Option<&CallsData>) -> TypeStore {
    let usage = Usage::all_terms(function);
    let mut analyzer = TypeAnalyzer::new(dataflow, calls_data, &usage);
    analyzer.analyze(function, &CancellationToken::new());
    analyzer.into_types()
}

/// `t := a << 3` reconstructs a stride of 8 for `t`.
#[test]
fn stride_inference_via_shift() {
    let mut func = Function::new("stride");
    let block = func.add_block();
    let a = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let three = func.add_term(Term::int_const(3, 8));
    let shifted = func.add_term(Term::binary(BinaryOp::Shl, a, three, 64));
    let t = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    func.push_statement(block, Statement::assignment(t, shifted));

    let mut dataflow = Dataflow::new();
    dataflow.set_value(three, Value::concrete(3, 8));

    let types = analyze(&func, &dataflow, None);
    assert_eq!(types.factor(types.get(shifted).unwrap()), 8);
    // The assignment pulls `t` into the same class, stride included.
    assert_eq!(types.factor(types.get(t).unwrap()), 8);
}

/// Builds `p := base + 16; q := *p` with `p`'s use tied to its definition
/// through the dataflow oracle.
fn pointer_plus_small_immediate() -> (Function, Dataflow, [TermId; 5]) {
    let mut func = Function::new("offset");
    let block = func.add_block();

    let base = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let sixteen = func.add_term(Term::int_const(16, 64));
    let sum = func.add_term(Term::binary(BinaryOp::Add, base, sixteen, 64));
    let p_def = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    func.push_statement(block, Statement::assignment(p_def, sum));

    let p_use = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    let loaded = func.add_term(Term::dereference(p_use, 64));
    let q = func.add_term(Term::memory_location_access(Location::Register(2), 64));
    func.push_statement(block, Statement::assignment(q, loaded));

    let mut dataflow = Dataflow::new();
    dataflow.set_value(sixteen, Value::concrete(16, 64));
    dataflow.set_memory_location(p_use, Location::Register(1));
    let mut defs = Definitions::new();
    defs.push_chunk(DefinitionChunk::new(Location::Register(1), vec![p_def]));
    dataflow.set_definitions(p_use, defs);

    (func, dataflow, [base, sixteen, sum, p_def, p_use])
}

/// A small immediate added to an unknown base does not classify either side
/// on its own, but a dereference of the sum makes the base a pointer and
/// the immediate an integer.
#[test]
fn pointer_plus_small_immediate_back_propagates() {
    let (func, dataflow, [base, sixteen, sum, p_def, p_use]) = pointer_plus_small_immediate();

    let types = analyze(&func, &dataflow, None);
    assert!(types.is_pointer(types.get(p_use).unwrap()));
    assert!(types.is_pointer(types.get(p_def).unwrap()));
    assert!(types.is_pointer(types.get(sum).unwrap()));
    assert!(types.is_pointer(types.get(base).unwrap()));
    assert!(types.is_integer(types.get(sixteen).unwrap()));
    assert!(!types.is_pointer(types.get(sixteen).unwrap()));
}

/// `q := *(0x400000 + r)` with `r` a known multiple: the large constant is
/// the base pointer, `r` the scaled index.
#[test]
fn large_immediate_plus_product() {
    let mut func = Function::new("table");
    let block = func.add_block();
    let table = func.add_term(Term::int_const(0x40_0000, 64));
    let r = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let sum = func.add_term(Term::binary(BinaryOp::Add, table, r, 64));
    let loaded = func.add_term(Term::dereference(sum, 64));
    let q = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    func.push_statement(block, Statement::assignment(q, loaded));

    let mut dataflow = Dataflow::new();
    dataflow.set_value(table, Value::concrete(0x40_0000, 64));
    dataflow.set_value(r, Value::unknown().with_product());

    let types = analyze(&func, &dataflow, None);
    assert!(types.is_pointer(types.get(sum).unwrap()));
    assert!(types.is_pointer(types.get(table).unwrap()));
    assert!(types.is_integer(types.get(r).unwrap()));
}

/// The 4096 threshold: a concrete addend of 4095 reads as an offset, 4096
/// as a base address.
#[test]
fn small_immediate_boundary() {
    for (constant, expect_pointer) in [(4095u64, false), (4096u64, true)] {
        let mut func = Function::new("boundary");
        let block = func.add_block();
        let k = func.add_term(Term::int_const(constant as i128, 64));
        let x = func.add_term(Term::memory_location_access(Location::Register(0), 64));
        let sum = func.add_term(Term::binary(BinaryOp::Add, k, x, 64));
        let loaded = func.add_term(Term::dereference(sum, 64));
        let dst = func.add_term(Term::memory_location_access(Location::Register(1), 64));
        func.push_statement(block, Statement::assignment(dst, loaded));

        let mut dataflow = Dataflow::new();
        dataflow.set_value(k, Value::concrete(constant, 64));

        let types = analyze(&func, &dataflow, None);
        let k_type = types.get(k).unwrap();
        assert_eq!(
            types.is_pointer(k_type),
            expect_pointer,
            "constant {constant:#x}"
        );
        assert_eq!(
            types.is_integer(k_type),
            !expect_pointer,
            "constant {constant:#x}"
        );
    }
}

/// `x == y` merges the operand classes, so signedness learned about `x`
/// from an arithmetic shift shows up on `y` as well.
#[test]
fn equality_spreads_signedness() {
    let mut func = Function::new("eq");
    let block = func.add_block();
    let x = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let y = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    let cmp = func.add_term(Term::binary(BinaryOp::Equal, x, y, 1));
    func.push_statement(block, Statement::jump_if(cmp));
    let two = func.add_term(Term::int_const(2, 8));
    let shifted = func.add_term(Term::binary(BinaryOp::Sar, x, two, 64));
    let dst = func.add_term(Term::memory_location_access(Location::Register(2), 64));
    func.push_statement(block, Statement::assignment(dst, shifted));

    let types = analyze(&func, &Dataflow::new(), None);
    assert!(types.is_signed(types.get(x).unwrap()));
    assert!(types.is_signed(types.get(y).unwrap()));
    assert_eq!(
        types.find(types.get(x).unwrap()),
        types.find(types.get(y).unwrap())
    );
}

/// Both return sites of a function carry the same reconstructed value, so
/// their carrier terms share one class.
#[test]
fn return_sites_are_unified() {
    let mut func = Function::new("ret2");
    let b0 = func.add_block();
    let b1 = func.add_block();

    let x = func.add_term(Term::memory_location_access(Location::Stack(-8), 64));
    let rax0 = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    func.push_statement(b0, Statement::assignment(rax0, x));
    let ret0 = func.push_statement(b0, Statement::Return);

    let y = func.add_term(Term::memory_location_access(Location::Stack(-16), 64));
    let rax1 = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    func.push_statement(b1, Statement::assignment(rax1, y));
    let ret1 = func.push_statement(b1, Statement::Return);

    let mut calls_data = CallsData::new();
    calls_data.set_signature(
        FunctionSignature::new("ret2").with_return_value(Location::Register(0)),
    );
    let mut analyzer0 = ReturnAnalyzer::new();
    analyzer0.set_value_term(Location::Register(0), rax0);
    calls_data.set_return_analyzer(&func, ret0, analyzer0);
    let mut analyzer1 = ReturnAnalyzer::new();
    analyzer1.set_value_term(Location::Register(0), rax1);
    calls_data.set_return_analyzer(&func, ret1, analyzer1);

    let types = analyze(&func, &Dataflow::new(), Some(&calls_data));
    assert_eq!(
        types.find(types.get(rax0).unwrap()),
        types.find(types.get(rax1).unwrap())
    );
    // Through the assignments, the two returned values join too.
    assert_eq!(
        types.find(types.get(x).unwrap()),
        types.find(types.get(y).unwrap())
    );
}

/// A missing return analyzer for one site skips that site without giving up
/// on the others.
#[test]
fn missing_return_analyzer_is_not_an_error() {
    let mut func = Function::new("ret3");
    let block = func.add_block();
    let rax = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let ret0 = func.push_statement(block, Statement::Return);
    let _ret1 = func.push_statement(block, Statement::Return);

    let mut calls_data = CallsData::new();
    calls_data.set_signature(
        FunctionSignature::new("ret3").with_return_value(Location::Register(0)),
    );
    let mut analyzer0 = ReturnAnalyzer::new();
    analyzer0.set_value_term(Location::Register(0), rax);
    calls_data.set_return_analyzer(&func, ret0, analyzer0);

    // Must simply terminate; with a single analyzable site there is nothing
    // to join, and `rax` is never even pulled into the store.
    let types = analyze(&func, &Dataflow::new(), Some(&calls_data));
    assert!(types.get(rax).is_none());
    assert!(types.is_empty());
}

/// Cancellation between rounds returns a consistent partial result: facts
/// that need a later round are absent, facts already derived are kept.
#[test]
fn cancellation_returns_partial_fixed_point() {
    let (func, dataflow, [base, _sixteen, _sum, _p_def, p_use]) = pointer_plus_small_immediate();

    let usage = Usage::all_terms(&func);
    let canceled = CancellationToken::new();
    canceled.cancel();
    let mut analyzer = TypeAnalyzer::new(&dataflow, None, &usage);
    analyzer.analyze(&func, &canceled);
    let partial = analyzer.types();

    // Round one derives the dereference fact...
    assert!(partial.is_pointer(partial.get(p_use).unwrap()));
    // ...but the back-propagation to the base needs another round, which
    // the cancellation cut off.
    assert!(!partial.is_pointer(partial.get(base).unwrap()));

    // The full run does reach the base.
    let complete = analyze(&func, &dataflow, None);
    assert!(complete.is_pointer(complete.get(base).unwrap()));
}

fn snapshot(types: &TypeStore, function: &Function) -> Vec<(bool, bool, bool, bool, u64)> {
    function
        .term_ids()
        .map(|term| match types.get(term) {
            Some(id) => (
                types.is_integer(id),
                types.is_pointer(id),
                types.is_signed(id),
                types.is_unsigned(id),
                types.factor(id),
            ),
            None => (false, false, false, false, 1),
        })
        .collect()
}

/// Running the analysis a second time over its own fixed point changes
/// nothing.
#[test]
fn second_run_is_idempotent() {
    let (func, dataflow, _) = pointer_plus_small_immediate();
    let usage = Usage::all_terms(&func);

    let mut analyzer = TypeAnalyzer::new(&dataflow, None, &usage);
    analyzer.analyze(&func, &CancellationToken::new());
    let first = snapshot(analyzer.types(), &func);

    analyzer.analyze(&func, &CancellationToken::new());
    let second = snapshot(analyzer.types(), &func);

    assert_eq!(first, second);
    assert!(!analyzer.types().any_changed());
}

/// Every assignment leaves its two sides in one equivalence class.
#[test]
fn assignments_share_classes() {
    let mut func = Function::new("chain");
    let block = func.add_block();
    let a = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let b = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    let c = func.add_term(Term::memory_location_access(Location::Register(2), 64));
    func.push_statement(block, Statement::assignment(b, a));
    func.push_statement(block, Statement::assignment(c, b));

    let types = analyze(&func, &Dataflow::new(), None);
    let class = types.find(types.get(a).unwrap());
    assert_eq!(types.find(types.get(b).unwrap()), class);
    assert_eq!(types.find(types.get(c).unwrap()), class);
}

/// Pointee links survive union and reach through the pointer: the loaded
/// value's signedness constrains what the pointer points to.
#[test]
fn dereference_links_pointee() {
    let mut func = Function::new("deref");
    let block = func.add_block();
    let p = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let loaded = func.add_term(Term::dereference(p, 64));
    let two = func.add_term(Term::int_const(2, 8));
    let shifted = func.add_term(Term::binary(BinaryOp::Sar, loaded, two, 64));
    let dst = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    func.push_statement(block, Statement::assignment(dst, shifted));

    let types = analyze(&func, &Dataflow::new(), None);
    let p_type = types.get(p).unwrap();
    assert!(types.is_pointer(p_type));
    let pointee = types.pointee(p_type).expect("pointer knows its pointee");
    assert_eq!(pointee, types.find(types.get(loaded).unwrap()));
    assert!(types.is_signed(pointee));
}

/// Structural offsets are recorded for `base + constant` address arithmetic
/// when the result lives in its own class.
#[cfg(feature = "struct-recovery")]
#[test]
fn struct_offsets_are_recorded() {
    let mut func = Function::new("fields");
    let block = func.add_block();
    let base = func.add_term(Term::memory_location_access(Location::Register(0), 64));
    let eight = func.add_term(Term::int_const(8, 64));
    let field_addr = func.add_term(Term::binary(BinaryOp::Add, base, eight, 64));
    let loaded = func.add_term(Term::dereference(field_addr, 64));
    let dst = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    func.push_statement(block, Statement::assignment(dst, loaded));

    let mut dataflow = Dataflow::new();
    dataflow.set_value(eight, Value::concrete(8, 64));

    let types = analyze(&func, &dataflow, None);
    let base_type = types.get(base).unwrap();
    let offsets: Vec<_> = types.offsets(base_type).collect();
    assert_eq!(offsets.len(), 1);
    assert_eq!(offsets[0].0, 8);
    assert_eq!(offsets[0].1, types.find(types.get(field_addr).unwrap()));
}

/// Stack-frame arithmetic is not mistaken for struct field access.
#[cfg(feature = "struct-recovery")]
#[test]
fn stack_offsets_are_not_recorded() {
    let mut func = Function::new("locals");
    let block = func.add_block();
    let frame = func.add_term(Term::memory_location_access(Location::Register(6), 64));
    let eight = func.add_term(Term::int_const(8, 64));
    let slot_addr = func.add_term(Term::binary(BinaryOp::Add, frame, eight, 64));
    let loaded = func.add_term(Term::dereference(slot_addr, 64));
    let dst = func.add_term(Term::memory_location_access(Location::Register(1), 64));
    func.push_statement(block, Statement::assignment(dst, loaded));

    let mut dataflow = Dataflow::new();
    dataflow.set_value(eight, Value::concrete(8, 64));
    dataflow.set_value(frame, Value::unknown().with_stack_offset());

    let types = analyze(&func, &dataflow, None);
    let frame_type = types.get(frame).unwrap();
    assert_eq!(types.offsets(frame_type).count(), 0);
}
