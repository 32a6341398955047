//! Guest monitors driven from separate host threads.

use std::sync::Arc;

use finch_bytecode::asm::Assembler;
use finch_bytecode::Opcode;
use finch_vm::meta::{ClassMeta, FieldKind, MethodMeta, Suite};
use finch_vm::{Run, Vm};

#[test]
fn monitors_serialize_static_updates_across_host_threads() {
    const ROUNDS: i32 = 1000;
    const WORKERS: usize = 2;

    let mut suite = Suite::new();
    let mut class = ClassMeta::new("Shared");
    class.static_fields = vec![FieldKind::Int];
    let class = suite.push_class(class);

    // for (local1 = 0; local1 < ROUNDS; local1++) { synchronized (local0)
    // { Shared.count++; } }
    let code = {
        let mut a = Assembler::new();
        let top = a.label();
        let out = a.label();
        a.bind(top);
        a.op(Opcode::load, 1).unwrap();
        a.op(Opcode::iconst, ROUNDS).unwrap();
        a.branch(Opcode::if_icmpge, out);
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorenter);
        a.op(Opcode::iconst, class as i32).unwrap();
        a.op(Opcode::getstatic, 0).unwrap();
        a.simple(Opcode::inc);
        a.op(Opcode::iconst, class as i32).unwrap();
        a.op(Opcode::putstatic, 0).unwrap();
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorexit);
        a.op(Opcode::load, 1).unwrap();
        a.simple(Opcode::inc);
        a.op(Opcode::store, 1).unwrap();
        a.branch(Opcode::goto, top);
        a.bind(out);
        a.simple(Opcode::r#return);
        a.finish().unwrap()
    };
    let method = suite.push_method(MethodMeta::new(code, 1, 0).with_locals(2));

    let vm = Vm::new(suite).unwrap();
    let obj = vm.alloc_instance(class).unwrap();

    let mut handles = Vec::new();
    for _ in 0..WORKERS {
        let vm = Arc::clone(&vm);
        handles.push(std::thread::spawn(move || {
            let mut t = vm.spawn(class, method, &[obj]).unwrap();
            assert_eq!(t.run().unwrap(), Run::Finished(Vec::new()));
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        vm.static_word(class, 0),
        Some(ROUNDS * WORKERS as i32)
    );
}

#[test]
fn monitors_reenter_across_call_frames() {
    let mut suite = Suite::new();

    let callee = {
        let mut a = Assembler::new();
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorenter);
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorexit);
        a.simple(Opcode::r#return);
        a.finish().unwrap()
    };
    let m_callee = suite.push_method(MethodMeta::new(callee, 1, 0));

    let mut class = ClassMeta::new("Main");
    class.static_methods = vec![m_callee];
    let class = suite.push_class(class);

    let caller = {
        let mut a = Assembler::new();
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorenter);
        a.op(Opcode::load, 0).unwrap();
        a.op(Opcode::iconst, class as i32).unwrap();
        a.op(Opcode::invoke, 0).unwrap();
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorexit);
        a.simple(Opcode::r#return);
        a.finish().unwrap()
    };
    let m_caller = suite.push_method(MethodMeta::new(caller, 1, 0));
    let vm = Vm::new(suite).unwrap();

    let obj = vm.alloc_instance(class).unwrap();
    let mut t = vm.spawn(class, m_caller, &[obj]).unwrap();
    let id = t.id();
    assert_eq!(t.run().unwrap(), Run::Finished(Vec::new()));
    assert_eq!(vm.monitor_for(obj).depth_of(id), 0);
}

#[test]
fn returning_releases_monitors_the_frame_still_holds() {
    let mut suite = Suite::new();
    let class = suite.push_class(ClassMeta::new("Main"));

    // Enters the monitor and returns without exiting it.
    let code = {
        let mut a = Assembler::new();
        a.op(Opcode::load, 0).unwrap();
        a.simple(Opcode::monitorenter);
        a.simple(Opcode::r#return);
        a.finish().unwrap()
    };
    let method = suite.push_method(MethodMeta::new(code, 1, 0));
    let vm = Vm::new(suite).unwrap();

    let obj = vm.alloc_instance(class).unwrap();
    let mut t = vm.spawn(class, method, &[obj]).unwrap();
    let id = t.id();
    assert_eq!(t.run().unwrap(), Run::Finished(Vec::new()));
    assert_eq!(vm.monitor_for(obj).depth_of(id), 0);
}
