//! Fault raising, handler dispatch and frame unwinding.

use finch_bytecode::asm::Assembler;
use finch_bytecode::Opcode;
use finch_vm::fault::{FaultKind, FAULT_ARITHMETIC};
use finch_vm::meta::{ClassMeta, Handler, MethodMeta, Suite};
use finch_vm::{Run, Vm};

#[test]
fn uncaught_division_by_zero_reports_the_faulting_site() {
    let mut a = Assembler::new();
    a.op(Opcode::iconst, 1).unwrap();
    a.op(Opcode::iconst, 0).unwrap();
    let div_at = a.here();
    a.simple(Opcode::idiv);
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 1));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    let fault = t.run().unwrap_err();
    assert_eq!(fault.kind, FaultKind::DivideByZero);
    assert_eq!(fault.pc, div_at);
    assert_eq!(fault.opcode, Opcode::idiv.as_u8());
    assert_eq!(fault.method, method);
    assert_eq!(fault.depth, 1);
}

#[test]
fn a_handler_catches_the_code_with_a_cleared_stack() {
    let mut a = Assembler::new();
    // Junk below the fault proves the catch resets the operand stack.
    a.op(Opcode::iconst, 9).unwrap();
    a.op(Opcode::iconst, 1).unwrap();
    a.op(Opcode::iconst, 0).unwrap();
    let div_at = a.here();
    a.simple(Opcode::irem);
    a.simple(Opcode::return_1);
    let handler_at = a.here();
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(
        MethodMeta::new(code, 0, 1).with_handler(Handler {
            start: div_at as u16,
            end: div_at as u16 + 1,
            target: handler_at as u16,
            kind: 0,
        }),
    );
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert_eq!(t.run().unwrap(), Run::Finished(vec![FAULT_ARITHMETIC]));
}

#[test]
fn thrown_codes_select_the_matching_handler() {
    let mut a = Assembler::new();
    let throw_at = a.here();
    a.op(Opcode::iconst, 42).unwrap();
    a.simple(Opcode::throw);
    let end = a.here();
    let wrong = a.here();
    a.op(Opcode::iconst, 0).unwrap();
    a.simple(Opcode::return_1);
    let right = a.here();
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(
        MethodMeta::new(code, 0, 1)
            .with_handler(Handler {
                start: throw_at as u16,
                end: end as u16,
                target: wrong as u16,
                kind: 7,
            })
            .with_handler(Handler {
                start: throw_at as u16,
                end: end as u16,
                target: right as u16,
                kind: 42,
            }),
    );
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert_eq!(t.run().unwrap(), Run::Finished(vec![42]));
}

#[test]
fn fatal_faults_ignore_handlers() {
    let mut a = Assembler::new();
    a.simple(Opcode::bpt);
    a.simple(Opcode::r#return);
    let handler_at = a.here();
    a.simple(Opcode::r#return);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(
        MethodMeta::new(code, 0, 0).with_handler(Handler {
            start: 0,
            end: handler_at as u16,
            target: handler_at as u16,
            kind: 0,
        }),
    );
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert_eq!(t.run().unwrap_err().kind, FaultKind::Breakpoint);
}

#[test]
fn unwinding_releases_callee_monitors_before_the_caller_catches() {
    let mut suite = Suite::new();

    // The callee enters the receiver's monitor and then throws.
    let callee = {
        let mut a = Assembler::new();
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorenter);
        a.op(Opcode::iconst, 5).unwrap();
        a.simple(Opcode::throw);
        a.finish().unwrap()
    };
    let m_callee = suite.push_method(MethodMeta::new(callee, 1, 0));

    let mut class = ClassMeta::new("Main");
    class.static_methods = vec![m_callee];
    let class = suite.push_class(class);

    let caller = {
        let mut a = Assembler::new();
        a.op(Opcode::load, 0).unwrap();
        a.op(Opcode::iconst, class as i32).unwrap();
        a.op(Opcode::invoke, 0).unwrap();
        a.op(Opcode::iconst, 0).unwrap();
        a.simple(Opcode::return_1);
        a.simple(Opcode::return_1);
        a.finish().unwrap()
    };
    let handler_at = caller.len() - 1;
    let m_caller = suite.push_method(
        MethodMeta::new(caller, 1, 1).with_handler(Handler {
            start: 0,
            end: handler_at as u16,
            target: handler_at as u16,
            kind: 5,
        }),
    );
    let vm = Vm::new(suite).unwrap();

    let obj = vm.alloc_instance(class).unwrap();
    let mut t = vm.spawn(class, m_caller, &[obj]).unwrap();
    let id = t.id();
    assert_eq!(t.run().unwrap(), Run::Finished(vec![5]));
    assert_eq!(vm.monitor_for(obj).depth_of(id), 0);
}

#[test]
fn return_forms_must_match_the_declared_width() {
    let mut a = Assembler::new();
    a.op(Opcode::iconst, 1).unwrap();
    a.simple(Opcode::return_1);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 0));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert_eq!(t.run().unwrap_err().kind, FaultKind::ReturnMismatch);
}

#[test]
fn invokes_check_the_argument_word_count() {
    let mut suite = Suite::new();
    let callee = {
        let mut a = Assembler::new();
        a.simple(Opcode::r#return);
        a.finish().unwrap()
    };
    let m_callee = suite.push_method(MethodMeta::new(callee, 2, 0));

    let mut class = ClassMeta::new("Main");
    class.static_methods = vec![m_callee];
    let class = suite.push_class(class);

    let caller = {
        let mut a = Assembler::new();
        a.op(Opcode::iconst, 1).unwrap();
        a.op(Opcode::iconst, class as i32).unwrap();
        a.op(Opcode::invoke, 0).unwrap();
        a.simple(Opcode::r#return);
        a.finish().unwrap()
    };
    let m_caller = suite.push_method(MethodMeta::new(caller, 0, 0));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, m_caller, &[]).unwrap();
    assert_eq!(
        t.run().unwrap_err().kind,
        FaultKind::BadArgCount { expected: 2, got: 1 }
    );
}

#[test]
fn spawning_with_the_wrong_argument_count_fails() {
    let mut a = Assembler::new();
    a.simple(Opcode::r#return);
    let code = a.finish().unwrap();

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 1, 0));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    assert_eq!(
        vm.spawn(class, method, &[1, 2]).unwrap_err(),
        FaultKind::BadArgCount { expected: 1, got: 2 }
    );
}

#[test]
fn branches_out_of_the_method_body_fault() {
    // A hand-built goto with an offset past the end of the code.
    let code = vec![Opcode::goto.as_u8(), 0x7f];

    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(code, 0, 0));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert_eq!(t.run().unwrap_err().kind, FaultKind::BadJumpTarget(127));
}

#[test]
fn malformed_code_is_a_fatal_decode_fault() {
    let mut suite = Suite::new();
    let method = suite.push_method(MethodMeta::new(vec![0xff], 0, 0));
    let class = suite.push_class(ClassMeta::new("Main"));
    let vm = Vm::new(suite).unwrap();

    let mut t = vm.spawn(class, method, &[]).unwrap();
    assert!(matches!(
        t.run().unwrap_err().kind,
        FaultKind::Decode(finch_bytecode::BytecodeError::UnknownOpcode(0xff))
    ));
}
