//! The interpreter.
//!
//! A guest thread owns one frame arena: a single word vector holding the
//! locals and operand stack of every live frame. A frame records where its
//! locals and stack begin; at an invoke the caller's operand stack holds
//! exactly the outgoing arguments, so they become the callee's lowest
//! locals in place.

use std::sync::Arc;

use finch_bytecode::decode::{decode_at, Inst, Modifier};
use finch_bytecode::opcode::{AccessKind, Branch, FieldAccess, FieldPlace, Opcode};
use finch_bytecode::Family;

use crate::fault::{Fault, FaultKind};
use crate::heap::{ArrayData, HeapObject};
use crate::meta::{ArrayElem, ClassId, MethodId};
use crate::profile::Profile;
use crate::value::{long_from, long_words, ObjRef, Word, NULL};
use crate::vm::Vm;

/// Per-thread interpreter switches.
#[derive(Clone, Copy, Debug)]
pub struct InterpOptions {
    /// Write a line per executed instruction to stderr.
    pub trace: bool,
    /// Record ticks into the thread's [`Profile`].
    pub profile: bool,
    /// Frame arena budget, in words.
    pub stack_limit_words: usize,
}

impl Default for InterpOptions {
    fn default() -> Self {
        InterpOptions {
            trace: false,
            profile: false,
            stack_limit_words: 1 << 16,
        }
    }
}

/// Why [`Thread::run`] returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Run {
    /// `yield` executed; the thread can be resumed with another `run`.
    Yielded,
    /// The root frame returned, with its result words.
    Finished(Vec<Word>),
}

#[derive(Debug)]
struct Frame {
    class: ClassId,
    method: MethodId,
    pc: usize,
    locals_base: usize,
    stack_base: usize,
    pending: Modifier,
    /// Objects whose monitors this frame entered and has not yet exited.
    monitors: Vec<ObjRef>,
}

enum StepOut {
    Continue,
    Yield,
    Finished(Vec<Word>),
}

/// One guest thread. May be driven from its own host thread; everything
/// mutable here is exclusively owned, the shared world lives in the [`Vm`].
#[derive(Debug)]
pub struct Thread {
    vm: Arc<Vm>,
    id: u64,
    mem: Vec<Word>,
    frames: Vec<Frame>,
    options: InterpOptions,
    profile: Profile,
    /// Locals of the root frame, captured when it returns.
    root_locals: Vec<Word>,
    last_pc: usize,
    last_opcode: u8,
}

impl Thread {
    /// A thread positioned at the first instruction of `method`, with
    /// `args` bound to its lowest locals.
    pub fn new(
        vm: Arc<Vm>,
        class: ClassId,
        method: MethodId,
        args: &[Word],
    ) -> Result<Self, FaultKind> {
        let meta = vm.suite.method_meta(method)?;
        if args.len() != meta.param_words as usize {
            return Err(FaultKind::BadArgCount {
                expected: meta.param_words as usize,
                got: args.len(),
            });
        }
        let total = (meta.local_words as usize).max(args.len());
        let mut mem = args.to_vec();
        mem.resize(total, 0);
        let id = vm.next_thread_id();
        Ok(Thread {
            vm,
            id,
            mem,
            frames: vec![Frame {
                class,
                method,
                pc: 0,
                locals_base: 0,
                stack_base: total,
                pending: Modifier::None,
                monitors: Vec::new(),
            }],
            options: InterpOptions::default(),
            profile: Profile::new(),
            root_locals: Vec::new(),
            last_pc: 0,
            last_opcode: 0,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn options_mut(&mut self) -> &mut InterpOptions {
        &mut self.options
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// The root frame's locals as they were when it returned. Empty until
    /// the thread finishes.
    pub fn root_locals(&self) -> &[Word] {
        &self.root_locals
    }

    /// Execute until the root frame returns, `yield` suspends the thread,
    /// or an uncaught fault terminates it.
    pub fn run(&mut self) -> Result<Run, Fault> {
        loop {
            match self.step() {
                Ok(StepOut::Continue) => {}
                Ok(StepOut::Yield) => return Ok(Run::Yielded),
                Ok(StepOut::Finished(words)) => return Ok(Run::Finished(words)),
                Err(kind) => {
                    // Diagnose before unwinding destroys the context.
                    let fault = self.diagnose(kind.clone());
                    match kind.guest_code() {
                        Some(code) if self.dispatch_guest_fault(code) => continue,
                        _ => return Err(fault),
                    }
                }
            }
        }
    }

    fn diagnose(&self, kind: FaultKind) -> Fault {
        Fault {
            kind,
            method: self.frames.last().map(|f| f.method).unwrap_or(0),
            pc: self.last_pc,
            opcode: self.last_opcode,
            depth: self.frames.len(),
        }
    }

    /// Find a handler for a guest fault code, unwinding frames (and
    /// releasing their monitors) until one matches. Returns false when the
    /// thread is dead.
    fn dispatch_guest_fault(&mut self, code: Word) -> bool {
        let vm = Arc::clone(&self.vm);
        // The faulting instruction's address for the top frame; for the
        // frames below, the saved pc is the return address of their call.
        let mut at = self.last_pc;
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return false;
            };
            let Ok(meta) = vm.suite.method_meta(frame.method) else {
                return false;
            };
            if let Some(h) = meta.handlers.iter().find(|h| h.covers(at, code)) {
                frame.pc = h.target as usize;
                frame.pending = Modifier::None;
                let stack_base = frame.stack_base;
                self.mem.truncate(stack_base);
                self.mem.push(code);
                return true;
            }
            let dead = match self.frames.pop() {
                Some(f) => f,
                None => return false,
            };
            for &obj in dead.monitors.iter().rev() {
                let _ = vm.monitor_for(obj).exit(self.id);
            }
            self.mem.truncate(dead.locals_base);
            at = match self.frames.last() {
                Some(f) => f.pc,
                None => return false,
            };
        }
    }

    fn step(&mut self) -> Result<StepOut, FaultKind> {
        let vm = Arc::clone(&self.vm);
        let (class, method, pc, pending) = match self.frames.last() {
            Some(f) => (f.class, f.method, f.pc, f.pending),
            None => return Ok(StepOut::Finished(Vec::new())),
        };
        let meta = vm.suite.method_meta(method)?;
        self.last_pc = pc;
        self.last_opcode = meta.code.get(pc).copied().unwrap_or(0);

        let (inst, len) = decode_at(&meta.code, pc, pending)?;
        if let Some(f) = self.frames.last_mut() {
            f.pc = pc + len;
            f.pending = Modifier::None;
        }

        if self.options.trace {
            let depth = self.mem.len() - self.frames.last().map(|f| f.stack_base).unwrap_or(0);
            eprintln!(
                "t{} m{} {:5} {:16} stack={}",
                self.id,
                method,
                pc,
                inst_name(&inst),
                depth
            );
        }
        if self.options.profile {
            self.profile.record(method, self.last_opcode);
        }

        self.exec(&vm, class, method, pc, meta.code.len(), inst)
    }

    fn exec(
        &mut self,
        vm: &Vm,
        class: ClassId,
        method: MethodId,
        pc: usize,
        code_len: usize,
        inst: Inst,
    ) -> Result<StepOut, FaultKind> {
        match inst {
            Inst::Prefix(_, m) => {
                if let Some(f) = self.frames.last_mut() {
                    f.pending = m;
                }
                Ok(StepOut::Continue)
            }
            Inst::Simple(op) => self.exec_simple(vm, method, op),
            Inst::Op(op, operand) => {
                self.exec_op(vm, class, pc, code_len, op, operand)?;
                Ok(StepOut::Continue)
            }
            Inst::Table(t) => {
                let v = self.pop()?;
                self.jump(pc, code_len, t.offset_for(v) as i64)?;
                Ok(StepOut::Continue)
            }
            Inst::Lookup(l) => {
                let v = self.pop()?;
                self.jump(pc, code_len, l.offset_for(v) as i64)?;
                Ok(StepOut::Continue)
            }
        }
    }

    fn exec_op(
        &mut self,
        vm: &Vm,
        class: ClassId,
        pc: usize,
        code_len: usize,
        op: Opcode,
        operand: finch_bytecode::Operand,
    ) -> Result<(), FaultKind> {
        if let Some(family) = op.family() {
            match family {
                Family::Iconst => {
                    if operand.words == 2 {
                        self.push_long(operand.value)?;
                    } else {
                        self.push(operand.value as Word)?;
                    }
                }
                Family::Object => {
                    let r = vm.const_ref(class, operand.index())?;
                    self.push(r)?;
                }
                Family::Class => {
                    let meta = vm.suite.class_meta(class)?;
                    let c = *meta
                        .class_refs
                        .get(operand.index())
                        .ok_or(FaultKind::BadClassRef(operand.value as Word))?;
                    self.push(c as Word)?;
                }
                Family::Load => {
                    let slot = operand.index();
                    if operand.words == 2 {
                        let lo = self.local(slot)?;
                        let hi = self.local(slot + 1)?;
                        self.push(lo)?;
                        self.push(hi)?;
                    } else {
                        let v = self.local(slot)?;
                        self.push(v)?;
                    }
                }
                Family::Store => {
                    let slot = operand.index();
                    if operand.words == 2 {
                        let hi = self.pop()?;
                        let lo = self.pop()?;
                        self.set_local(slot + 1, hi)?;
                        self.set_local(slot, lo)?;
                    } else {
                        let v = self.pop()?;
                        self.set_local(slot, v)?;
                    }
                }
                // Prefix families never decode to an operand instruction.
                Family::Wide | Family::Extend => {
                    return Err(FaultKind::Decode(
                        finch_bytecode::BytecodeError::BadPrefixTarget(pc, op.as_u8()),
                    ));
                }
            }
            return Ok(());
        }

        if let Some(branch) = op.branch() {
            let taken = match branch {
                Branch::Always => true,
                Branch::Zero(c) => {
                    let v = self.pop()?;
                    c.holds(v, 0)
                }
                Branch::Cmp(c) => {
                    let r = self.pop()?;
                    let l = self.pop()?;
                    c.holds(l, r)
                }
            };
            if taken {
                self.jump(pc, code_len, operand.value)?;
            }
            return Ok(());
        }

        if let Some(fa) = op.field_access() {
            return self.exec_field(vm, fa, operand.index());
        }

        match op {
            Opcode::invoke
            | Opcode::invokevirtual
            | Opcode::invokeabsolute
            | Opcode::invokeinterface => {
                let slot = u16::try_from(operand.value)
                    .map_err(|_| FaultKind::BadMethodSlot(operand.value as u32))?;
                self.exec_invoke(vm, op, slot)?;
                Ok(())
            }
            _ => Err(FaultKind::Decode(
                finch_bytecode::BytecodeError::UnknownOpcode(op.as_u8()),
            )),
        }
    }

    fn exec_simple(&mut self, vm: &Vm, method: MethodId, op: Opcode) -> Result<StepOut, FaultKind> {
        if let Some(cond) = op.compare() {
            let r = self.pop()?;
            let l = self.pop()?;
            self.push(cond.holds(l, r) as Word)?;
            return Ok(StepOut::Continue);
        }
        if let Some((store, kind)) = op.array_access() {
            self.exec_array(vm, store, kind)?;
            return Ok(StepOut::Continue);
        }
        match op {
            Opcode::iconst_m1 => self.push(-1)?,

            Opcode::iadd => self.binary(|l, r| Ok(l.wrapping_add(r)))?,
            Opcode::isub => self.binary(|l, r| Ok(l.wrapping_sub(r)))?,
            Opcode::iand => self.binary(|l, r| Ok(l & r))?,
            Opcode::ior => self.binary(|l, r| Ok(l | r))?,
            Opcode::ixor => self.binary(|l, r| Ok(l ^ r))?,
            Opcode::ishl => self.binary(|l, r| Ok(l.wrapping_shl(r as u32 & 31)))?,
            Opcode::ishr => self.binary(|l, r| Ok(l.wrapping_shr(r as u32 & 31)))?,
            Opcode::iushr => self.binary(|l, r| Ok(((l as u32) >> (r as u32 & 31)) as Word))?,
            Opcode::imul => self.binary(|l, r| Ok(l.wrapping_mul(r)))?,
            Opcode::idiv => self.binary(|l, r| {
                if r == 0 {
                    Err(FaultKind::DivideByZero)
                } else {
                    Ok(l.wrapping_div(r))
                }
            })?,
            Opcode::irem => self.binary(|l, r| {
                if r == 0 {
                    Err(FaultKind::DivideByZero)
                } else {
                    Ok(l.wrapping_rem(r))
                }
            })?,
            Opcode::neg => self.unary(|v| 0i32.wrapping_sub(v))?,
            Opcode::inc => self.unary(|v| v.wrapping_add(1))?,
            Opcode::i2b => self.unary(|v| v as i8 as Word)?,
            Opcode::i2s => self.unary(|v| v as i16 as Word)?,
            Opcode::i2c => self.unary(|v| v as u16 as Word)?,

            Opcode::pop => {
                self.pop()?;
            }
            Opcode::nop => {}

            Opcode::r#return => return self.exec_return(vm, method, 0),
            Opcode::return_1 => return self.exec_return(vm, method, 1),
            Opcode::return_2 => return self.exec_return(vm, method, 2),

            Opcode::r#yield => return Ok(StepOut::Yield),
            Opcode::bpt => return Err(FaultKind::Breakpoint),
            Opcode::throw => {
                let code = self.pop()?;
                return Err(FaultKind::Throw(code));
            }

            Opcode::lookup => self.exec_lookup(vm)?,

            Opcode::monitorenter => {
                let obj = self.pop()?;
                if obj == NULL {
                    return Err(FaultKind::NullPointer);
                }
                // The monitor is acquired without holding the world lock so
                // other guest threads keep running while this one blocks.
                vm.monitor_for(obj).enter(self.id);
                if let Some(f) = self.frames.last_mut() {
                    f.monitors.push(obj);
                }
            }
            Opcode::monitorexit => {
                let obj = self.pop()?;
                if obj == NULL {
                    return Err(FaultKind::NullPointer);
                }
                vm.monitor_for(obj).exit(self.id)?;
                if let Some(f) = self.frames.last_mut() {
                    if let Some(i) = f.monitors.iter().rposition(|&m| m == obj) {
                        f.monitors.remove(i);
                    }
                }
            }

            Opcode::new => {
                let cw = self.pop()?;
                let (cid, meta) = vm.suite.class_by_word(cw)?;
                if meta.array_element.is_some() {
                    return Err(FaultKind::BadClassRef(cw));
                }
                let fields = meta.instance_fields.len();
                let r = vm.world.lock().heap.alloc_instance(cid, fields)?;
                self.push(r)?;
            }
            Opcode::newarray => {
                let cw = self.pop()?;
                let len = self.pop()?;
                let (cid, meta) = vm.suite.class_by_word(cw)?;
                let elem = meta
                    .array_element
                    .ok_or(FaultKind::NotAnArrayClass(cw))?;
                if len < 0 {
                    return Err(FaultKind::ArrayBounds {
                        index: len,
                        length: 0,
                    });
                }
                let r = vm
                    .world
                    .lock()
                    .heap
                    .alloc_array(cid, &elem, len as usize)?;
                self.push(r)?;
            }
            Opcode::newdimension => self.exec_newdimension(vm)?,
            Opcode::arraylength => {
                let arr = self.pop()?;
                if arr == NULL {
                    return Err(FaultKind::NullPointer);
                }
                let len = match vm.world.lock().heap.get(arr)? {
                    HeapObject::Array { data, .. } => data.len() as Word,
                    HeapObject::Instance { .. } => return Err(FaultKind::ElementKindMismatch),
                };
                self.push(len)?;
            }

            other => {
                return Err(FaultKind::Decode(
                    finch_bytecode::BytecodeError::UnknownOpcode(other.as_u8()),
                ))
            }
        }
        Ok(StepOut::Continue)
    }

    fn exec_return(&mut self, vm: &Vm, method: MethodId, words: u8) -> Result<StepOut, FaultKind> {
        let meta = vm.suite.method_meta(method)?;
        if meta.return_words != words {
            return Err(FaultKind::ReturnMismatch);
        }
        let mut results = [0 as Word; 2];
        for i in (0..words as usize).rev() {
            results[i] = self.pop()?;
        }
        let frame = match self.frames.pop() {
            Some(f) => f,
            None => return Err(FaultKind::StackUnderflow),
        };
        for &obj in frame.monitors.iter().rev() {
            let _ = vm.monitor_for(obj).exit(self.id);
        }
        if self.frames.is_empty() {
            self.root_locals = self.mem[frame.locals_base..frame.stack_base].to_vec();
        }
        self.mem.truncate(frame.locals_base);
        if self.frames.is_empty() {
            return Ok(StepOut::Finished(results[..words as usize].to_vec()));
        }
        for &w in &results[..words as usize] {
            self.push(w)?;
        }
        Ok(StepOut::Continue)
    }

    fn exec_invoke(&mut self, vm: &Vm, op: Opcode, slot: u16) -> Result<StepOut, FaultKind> {
        let args_base = self
            .frames
            .last()
            .map(|f| f.stack_base)
            .ok_or(FaultKind::StackUnderflow)?;
        let (target_class, target_method) = match op {
            Opcode::invoke => {
                let cw = self.pop()?;
                let (cid, meta) = vm.suite.class_by_word(cw)?;
                let m = *meta
                    .static_methods
                    .get(slot as usize)
                    .ok_or(FaultKind::BadMethodSlot(slot as u32))?;
                (cid, m)
            }
            Opcode::invokeabsolute => {
                let cw = self.pop()?;
                let (cid, _) = vm.suite.class_by_word(cw)?;
                vm.suite.resolve_virtual(cid, slot)?
            }
            Opcode::invokevirtual => {
                let rcvr = self.receiver(args_base)?;
                let cid = vm.world.lock().heap.class_of(rcvr)?;
                vm.suite.resolve_virtual(cid, slot)?
            }
            Opcode::invokeinterface => {
                let iw = self.pop()?;
                let (itype, _) = vm.suite.class_by_word(iw)?;
                let rcvr = self.receiver(args_base)?;
                let cid = vm.world.lock().heap.class_of(rcvr)?;
                let vslot = vm.suite.remap_interface_slot(cid, itype, slot)?;
                vm.suite.resolve_virtual(cid, vslot)?
            }
            _ => return Err(FaultKind::BadMethodSlot(slot as u32)),
        };
        self.push_frame(vm, target_class, target_method, args_base)
    }

    /// The receiver of a virtual call: the bottom of the caller's operand
    /// stack, which holds exactly the outgoing arguments.
    fn receiver(&self, args_base: usize) -> Result<ObjRef, FaultKind> {
        let r = *self
            .mem
            .get(args_base)
            .ok_or(FaultKind::StackUnderflow)?;
        if r == NULL {
            return Err(FaultKind::NullPointer);
        }
        Ok(r)
    }

    fn push_frame(
        &mut self,
        vm: &Vm,
        class: ClassId,
        method: MethodId,
        args_base: usize,
    ) -> Result<StepOut, FaultKind> {
        let meta = vm.suite.method_meta(method)?;
        let got = self.mem.len() - args_base;
        if got != meta.param_words as usize {
            return Err(FaultKind::BadArgCount {
                expected: meta.param_words as usize,
                got,
            });
        }
        let total = (meta.local_words as usize).max(got);
        while self.mem.len() < args_base + total {
            self.push(0)?;
        }
        self.frames.push(Frame {
            class,
            method,
            pc: 0,
            locals_base: args_base,
            stack_base: args_base + total,
            pending: Modifier::None,
            monitors: Vec::new(),
        });
        Ok(StepOut::Continue)
    }

    fn exec_field(&mut self, vm: &Vm, fa: FieldAccess, slot: usize) -> Result<(), FaultKind> {
        match fa.place {
            FieldPlace::Static => {
                let cw = self.pop()?;
                let (cid, meta) = vm.suite.class_by_word(cw)?;
                let kind = *meta
                    .static_fields
                    .get(slot)
                    .ok_or(FaultKind::BadFieldSlot(slot as u32))?;
                if !kind.admits(fa.kind) {
                    return Err(FaultKind::FieldKindMismatch);
                }
                if fa.put {
                    let v = self.pop()?;
                    vm.world.lock().statics[cid as usize][slot] = kind.normalize(v);
                } else {
                    let v = vm.world.lock().statics[cid as usize][slot];
                    self.push(v)?;
                }
            }
            FieldPlace::Instance | FieldPlace::This => {
                let value = if fa.put { Some(self.pop()?) } else { None };
                let obj = if fa.place == FieldPlace::This {
                    self.local(0)?
                } else {
                    self.pop()?
                };
                if obj == NULL {
                    return Err(FaultKind::NullPointer);
                }
                let mut world = vm.world.lock();
                let cid = world.heap.class_of(obj)?;
                let kind = *vm
                    .suite
                    .class_meta(cid)?
                    .instance_fields
                    .get(slot)
                    .ok_or(FaultKind::BadFieldSlot(slot as u32))?;
                if !kind.admits(fa.kind) {
                    return Err(FaultKind::FieldKindMismatch);
                }
                match world.heap.get_mut(obj)? {
                    HeapObject::Instance { fields, .. } => {
                        let f = fields
                            .get_mut(slot)
                            .ok_or(FaultKind::BadFieldSlot(slot as u32))?;
                        if let Some(v) = value {
                            *f = kind.normalize(v);
                        } else {
                            let v = kind.normalize(*f);
                            drop(world);
                            self.push(v)?;
                        }
                    }
                    HeapObject::Array { .. } => {
                        return Err(FaultKind::BadFieldSlot(slot as u32))
                    }
                }
            }
        }
        Ok(())
    }

    fn exec_array(&mut self, vm: &Vm, store: bool, kind: AccessKind) -> Result<(), FaultKind> {
        if store {
            let (lo, hi) = if kind == AccessKind::Int {
                let hi = self.pop()?;
                let lo = self.pop()?;
                (lo, hi)
            } else {
                (self.pop()?, 0)
            };
            let index = self.pop()?;
            let arr = self.pop()?;
            if arr == NULL {
                return Err(FaultKind::NullPointer);
            }
            let mut world = vm.world.lock();
            let data = match world.heap.get_mut(arr)? {
                HeapObject::Array { data, .. } => data,
                HeapObject::Instance { .. } => return Err(FaultKind::ElementKindMismatch),
            };
            let length = data.len() as i32;
            if index < 0 || index >= length {
                return Err(FaultKind::ArrayBounds { index, length });
            }
            let i = index as usize;
            // The untyped form stores into any one-word array, normalizing
            // to the element kind; typed forms must match exactly.
            match (kind, data) {
                (AccessKind::Word, ArrayData::Int(v)) => v[i] = lo,
                (AccessKind::Word, ArrayData::Ref(v)) => v[i] = lo,
                (AccessKind::Word, ArrayData::Byte(v)) => v[i] = lo as i8,
                (AccessKind::Word, ArrayData::Short(v)) => v[i] = lo as i16,
                (AccessKind::Word, ArrayData::Char(v)) => v[i] = lo as u16,
                (AccessKind::Byte, ArrayData::Byte(v)) => v[i] = lo as i8,
                (AccessKind::Short, ArrayData::Short(v)) => v[i] = lo as i16,
                (AccessKind::Ref, ArrayData::Ref(v)) => v[i] = lo,
                (AccessKind::Int, ArrayData::Long(v)) => v[i] = long_from(lo, hi),
                _ => return Err(FaultKind::ElementKindMismatch),
            }
        } else {
            let index = self.pop()?;
            let arr = self.pop()?;
            if arr == NULL {
                return Err(FaultKind::NullPointer);
            }
            let world = vm.world.lock();
            let data = match world.heap.get(arr)? {
                HeapObject::Array { data, .. } => data,
                HeapObject::Instance { .. } => return Err(FaultKind::ElementKindMismatch),
            };
            let length = data.len() as i32;
            if index < 0 || index >= length {
                return Err(FaultKind::ArrayBounds { index, length });
            }
            let i = index as usize;
            enum Loaded {
                One(Word),
                Two(i64),
            }
            let loaded = match (kind, data) {
                (AccessKind::Word, ArrayData::Int(v)) => Loaded::One(v[i]),
                (AccessKind::Word, ArrayData::Ref(v)) => Loaded::One(v[i]),
                (AccessKind::Word, ArrayData::Byte(v)) => Loaded::One(v[i] as Word),
                (AccessKind::Word, ArrayData::Short(v)) => Loaded::One(v[i] as Word),
                (AccessKind::Word, ArrayData::Char(v)) => Loaded::One(v[i] as Word),
                (AccessKind::Byte, ArrayData::Byte(v)) => Loaded::One(v[i] as Word),
                (AccessKind::Short, ArrayData::Short(v)) => Loaded::One(v[i] as Word),
                (AccessKind::Char, ArrayData::Char(v)) => Loaded::One(v[i] as Word),
                (AccessKind::Int, ArrayData::Long(v)) => Loaded::Two(v[i]),
                _ => return Err(FaultKind::ElementKindMismatch),
            };
            drop(world);
            match loaded {
                Loaded::One(w) => self.push(w)?,
                Loaded::Two(l) => self.push_long(l)?,
            }
        }
        Ok(())
    }

    fn exec_lookup(&mut self, vm: &Vm) -> Result<(), FaultKind> {
        let arr = self.pop()?;
        let key = self.pop()?;
        if arr == NULL {
            return Err(FaultKind::NullPointer);
        }
        let world = vm.world.lock();
        let data = match world.heap.get(arr)? {
            HeapObject::Array { data, .. } => data,
            HeapObject::Instance { .. } => return Err(FaultKind::ElementKindMismatch),
        };
        let found = match data {
            ArrayData::Byte(v) => v.iter().position(|&e| e as Word == key),
            ArrayData::Short(v) => v.iter().position(|&e| e as Word == key),
            ArrayData::Char(v) => v.iter().position(|&e| e as Word == key),
            ArrayData::Int(v) => v.iter().position(|&e| e == key),
            ArrayData::Ref(v) => v.iter().position(|&e| e == key),
            ArrayData::Long(_) => return Err(FaultKind::ElementKindMismatch),
        };
        drop(world);
        self.push(found.map(|i| i as Word).unwrap_or(-1))
    }

    fn exec_newdimension(&mut self, vm: &Vm) -> Result<(), FaultKind> {
        let len = self.pop()?;
        let arr = self.pop()?;
        if arr == NULL {
            return Err(FaultKind::NullPointer);
        }
        if len < 0 {
            return Err(FaultKind::ArrayBounds {
                index: len,
                length: 0,
            });
        }
        let mut world = vm.world.lock();
        let outer_class = world.heap.class_of(arr)?;
        let inner_class = match vm.suite.class_meta(outer_class)?.array_element {
            Some(ArrayElem::Ref(inner)) => inner,
            _ => return Err(FaultKind::NotAnArrayClass(outer_class as Word)),
        };
        let inner_elem = vm
            .suite
            .class_meta(inner_class)?
            .array_element
            .ok_or(FaultKind::NotAnArrayClass(inner_class as Word))?;
        let count = match world.heap.get(arr)? {
            HeapObject::Array { data: ArrayData::Ref(v), .. } => v.len(),
            _ => return Err(FaultKind::ElementKindMismatch),
        };
        for i in 0..count {
            let present = match world.heap.get(arr)? {
                HeapObject::Array { data: ArrayData::Ref(v), .. } => v[i] != NULL,
                _ => return Err(FaultKind::ElementKindMismatch),
            };
            if present {
                continue;
            }
            let fresh = world.heap.alloc_array(inner_class, &inner_elem, len as usize)?;
            match world.heap.get_mut(arr)? {
                HeapObject::Array { data: ArrayData::Ref(v), .. } => v[i] = fresh,
                _ => return Err(FaultKind::ElementKindMismatch),
            }
        }
        drop(world);
        self.push(arr)
    }

    fn jump(&mut self, pc: usize, code_len: usize, offset: i64) -> Result<(), FaultKind> {
        let target = pc as i64 + offset;
        if target < 0 || target >= code_len as i64 {
            return Err(FaultKind::BadJumpTarget(target));
        }
        if let Some(f) = self.frames.last_mut() {
            f.pc = target as usize;
        }
        Ok(())
    }

    fn binary(
        &mut self,
        f: impl FnOnce(Word, Word) -> Result<Word, FaultKind>,
    ) -> Result<(), FaultKind> {
        let r = self.pop()?;
        let l = self.pop()?;
        let v = f(l, r)?;
        self.push(v)
    }

    fn unary(&mut self, f: impl FnOnce(Word) -> Word) -> Result<(), FaultKind> {
        let v = self.pop()?;
        self.push(f(v))
    }

    fn push(&mut self, w: Word) -> Result<(), FaultKind> {
        if self.mem.len() >= self.options.stack_limit_words {
            return Err(FaultKind::StackOverflow);
        }
        self.mem.push(w);
        Ok(())
    }

    fn push_long(&mut self, v: i64) -> Result<(), FaultKind> {
        let (lo, hi) = long_words(v);
        self.push(lo)?;
        self.push(hi)
    }

    fn pop(&mut self) -> Result<Word, FaultKind> {
        let base = self.frames.last().map(|f| f.stack_base).unwrap_or(0);
        if self.mem.len() <= base {
            return Err(FaultKind::StackUnderflow);
        }
        self.mem.pop().ok_or(FaultKind::StackUnderflow)
    }

    fn local(&self, slot: usize) -> Result<Word, FaultKind> {
        let f = self.frames.last().ok_or(FaultKind::StackUnderflow)?;
        let at = f.locals_base + slot;
        if at >= f.stack_base {
            return Err(FaultKind::BadLocalSlot(slot as u32));
        }
        Ok(self.mem[at])
    }

    fn set_local(&mut self, slot: usize, v: Word) -> Result<(), FaultKind> {
        let f = self.frames.last().ok_or(FaultKind::StackUnderflow)?;
        let at = f.locals_base + slot;
        if at >= f.stack_base {
            return Err(FaultKind::BadLocalSlot(slot as u32));
        }
        self.mem[at] = v;
        Ok(())
    }
}

fn inst_name(inst: &Inst) -> &'static str {
    match inst {
        Inst::Prefix(op, _) => op.mnemonic(),
        Inst::Simple(op) => op.mnemonic(),
        Inst::Op(op, _) => op.mnemonic(),
        Inst::Table(_) => "tableswitch",
        Inst::Lookup(_) => "lookupswitch",
    }
}
