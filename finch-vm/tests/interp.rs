//! Interpreter basics: locals, arithmetic, prefixed operands, two-word
//! values, switches, yield and profiling.

use std::sync::Arc;

use finch_bytecode::asm::Assembler;
use finch_bytecode::Opcode;
use finch_vm::meta::{ClassId, ClassMeta, MethodId, MethodMeta, Suite};
use finch_vm::value::long_from;
use finch_vm::{Run, Vm, Word};

fn finished(vm: &Arc<Vm>, class: ClassId, method: MethodId, args: &[Word]) -> Vec<Word> {
    let mut t = vm.spawn(class, method, args).unwrap();
    match t.run().unwrap() {
        Run::Finished(words) => words,
        other => panic!("expected the thread to finish, got {other:?}"),
    }
}

#[test]
fn adds_two_locals_into_a_third() {
    let mut a = Assembler::new();
    a.op(Opcode::load, 1).unwrap();
    a.op(Opcode::load, 2).unwrap();
    a.simple(Opcode::iadd);
    a.op(Opcode::store, 5).unwrap();
    a.op(Opcode::load, 5).unwrap();
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 3, 1).with_locals(6));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[0, 3, 4]).unwrap();
    assert_eq!(t.run().unwrap(), Run::Finished(vec![7]));
    assert_eq!(t.root_locals(), &[0, 3, 4, 0, 0, 7]);
}

#[test]
fn prefixed_operands_reach_wide_values() {
    let mut a = Assembler::new();
    a.op(Opcode::iconst, 100_000).unwrap();
    a.op(Opcode::store, 300).unwrap();
    a.op(Opcode::load, 300).unwrap();
    a.op(Opcode::iconst, -2).unwrap();
    a.simple(Opcode::iadd);
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 1).with_locals(301));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    assert_eq!(finished(&vm, class, method, &[]), vec![99_998]);
}

#[test]
fn two_word_literals_and_locals() {
    let value = -5_000_000_000i64;
    let mut a = Assembler::new();
    a.lconst(value);
    a.local2(Opcode::store, 0);
    a.local2(Opcode::load, 0);
    a.simple(Opcode::return_2);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 2).with_locals(2));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let words = finished(&vm, class, method, &[]);
    assert_eq!(words.len(), 2);
    assert_eq!(long_from(words[0], words[1]), value);
}

#[test]
fn shifts_and_narrowing_conversions() {
    let mut a = Assembler::new();
    a.op(Opcode::iconst, 0x1234).unwrap();
    a.op(Opcode::iconst, 8).unwrap();
    a.simple(Opcode::ishl);
    a.simple(Opcode::i2s);
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    // 0x1234 << 8 = 0x123400, truncated to i16 = 0x3400.
    assert_eq!(finished(&vm, class, method, &[]), vec![0x3400]);
}

fn switch_suite(code: Vec<u8>) -> (Arc<Vm>, ClassId, MethodId) {
    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 1, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    (Vm::new(suite).unwrap(), class, method)
}

#[test]
fn tableswitch_selects_in_range_and_defaults_outside() {
    let mut a = Assembler::new();
    a.op(Opcode::load, 0).unwrap();
    let c10 = a.label();
    let c11 = a.label();
    let c12 = a.label();
    let other = a.label();
    a.table_switch(10, &[c10, c11, c12], other);
    a.bind(c10);
    a.op(Opcode::iconst, 110).unwrap();
    a.simple(Opcode::return_1);
    a.bind(c11);
    a.op(Opcode::iconst, 111).unwrap();
    a.simple(Opcode::return_1);
    a.bind(c12);
    a.op(Opcode::iconst, 112).unwrap();
    a.simple(Opcode::return_1);
    a.bind(other);
    a.op(Opcode::iconst, 99).unwrap();
    a.simple(Opcode::return_1);
    let (vm, class, method) = switch_suite(a.finish().unwrap());

    assert_eq!(finished(&vm, class, method, &[9]), vec![99]);
    assert_eq!(finished(&vm, class, method, &[10]), vec![110]);
    assert_eq!(finished(&vm, class, method, &[11]), vec![111]);
    assert_eq!(finished(&vm, class, method, &[12]), vec![112]);
    assert_eq!(finished(&vm, class, method, &[13]), vec![99]);
    assert_eq!(finished(&vm, class, method, &[5]), vec![99]);
}

#[test]
fn lookupswitch_matches_sparse_keys() {
    let mut a = Assembler::new();
    a.op(Opcode::load, 0).unwrap();
    let neg = a.label();
    let zero = a.label();
    let nine = a.label();
    let other = a.label();
    a.lookup_switch(&[(-5, neg), (0, zero), (9, nine)], other);
    a.bind(neg);
    a.op(Opcode::iconst, 1).unwrap();
    a.simple(Opcode::return_1);
    a.bind(zero);
    a.op(Opcode::iconst, 2).unwrap();
    a.simple(Opcode::return_1);
    a.bind(nine);
    a.op(Opcode::iconst, 3).unwrap();
    a.simple(Opcode::return_1);
    a.bind(other);
    a.op(Opcode::iconst, 4).unwrap();
    a.simple(Opcode::return_1);
    let (vm, class, method) = switch_suite(a.finish().unwrap());

    assert_eq!(finished(&vm, class, method, &[-5]), vec![1]);
    assert_eq!(finished(&vm, class, method, &[0]), vec![2]);
    assert_eq!(finished(&vm, class, method, &[9]), vec![3]);
    assert_eq!(finished(&vm, class, method, &[7]), vec![4]);
}

#[test]
fn conditional_branches_and_comparisons() {
    // abs(x) via iflt over a negate.
    let mut a = Assembler::new();
    a.op(Opcode::load, 0).unwrap();
    let negate = a.label();
    let done = a.label();
    a.branch(Opcode::iflt, negate);
    a.op(Opcode::load, 0).unwrap();
    a.branch(Opcode::goto, done);
    a.bind(negate);
    a.op(Opcode::load, 0).unwrap();
    a.simple(Opcode::neg);
    a.bind(done);
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 1, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    assert_eq!(finished(&vm, class, method, &[12]), vec![12]);
    assert_eq!(finished(&vm, class, method, &[-12]), vec![12]);
    assert_eq!(finished(&vm, class, method, &[0]), vec![0]);
}

#[test]
fn comparisons_push_zero_or_one() {
    let mut a = Assembler::new();
    a.op(Opcode::load, 0).unwrap();
    a.op(Opcode::load, 1).unwrap();
    a.simple(Opcode::lt);
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 2, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    assert_eq!(finished(&vm, class, method, &[3, 4]), vec![1]);
    assert_eq!(finished(&vm, class, method, &[4, 4]), vec![0]);
    assert_eq!(finished(&vm, class, method, &[5, 4]), vec![0]);
}

#[test]
fn class_references_come_from_the_class_table() {
    let mut suite = Suite::new();
    let point = suite.push_class(ClassMeta::new("Point"));
    let mut main = ClassMeta::new("Main");
    main.class_refs = vec![point];
    let main = suite.push_class(main);

    // class_0 resolves through Main's table; the fresh instance is not
    // null.
    let code = {
        let mut a = Assembler::new();
        a.op(Opcode::class, 0).unwrap();
        a.simple(Opcode::new);
        a.op(Opcode::iconst, 0).unwrap();
        a.simple(Opcode::ne);
        a.simple(Opcode::return_1);
        a.finish().unwrap()
    };
    let method = suite.push_method(MethodMeta::new(code, 0, 1));
    let vm = Vm::new(suite).unwrap();

    assert_eq!(finished(&vm, main, method, &[]), vec![1]);
}

#[test]
fn float_literals_push_their_bit_pattern() {
    let mut code = vec![Opcode::wide_float.as_u8(), Opcode::iconst.as_u8()];
    code.extend_from_slice(&2.5f32.to_bits().to_be_bytes());
    code.push(Opcode::return_1.as_u8());

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    assert_eq!(
        finished(&vm, class, method, &[]),
        vec![finch_vm::value::float_word(2.5)]
    );
}

#[test]
fn yield_suspends_and_resumes_with_the_stack_intact() {
    let mut a = Assembler::new();
    a.op(Opcode::iconst, 1).unwrap();
    a.simple(Opcode::r#yield);
    a.op(Opcode::iconst, 2).unwrap();
    a.simple(Opcode::iadd);
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert_eq!(t.run().unwrap(), Run::Yielded);
    assert_eq!(t.run().unwrap(), Run::Finished(vec![3]));
}

#[test]
fn profiling_records_one_tick_per_instruction() {
    let mut a = Assembler::new();
    a.op(Opcode::load, 1).unwrap();
    a.op(Opcode::load, 2).unwrap();
    a.simple(Opcode::iadd);
    a.op(Opcode::store, 5).unwrap();
    a.op(Opcode::load, 5).unwrap();
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 3, 1).with_locals(6));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[0, 3, 4]).unwrap();
    t.options_mut().profile = true;
    assert_eq!(t.run().unwrap(), Run::Finished(vec![7]));

    assert_eq!(t.profile().total(), 6);
    assert_eq!(t.profile().ticks(method, Opcode::iadd.as_u8()), 1);
    assert_eq!(t.profile().ticks(method, Opcode::load_1.as_u8()), 1);

    let mut out = Vec::new();
    t.profile().dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 6);
    assert!(text.lines().all(|l| l.starts_with(&format!("*MPROF* {method}:"))));
}
