//! The fault taxonomy.
//!
//! Decode and link faults are fatal and never visible to guest code.
//! Runtime faults (null dereference, array bounds, division by zero, guest
//! `throw` codes) are guest-catchable through method handler tables.
//! Resource exhaustion and breakpoints terminate the thread.

use thiserror::Error;

use finch_bytecode::BytecodeError;

use crate::value::Word;

/// Guest-visible code pushed for a null dereference.
pub const FAULT_NULL_POINTER: Word = 1;
/// Guest-visible code pushed for an out-of-bounds array access.
pub const FAULT_ARRAY_BOUNDS: Word = 2;
/// Guest-visible code pushed for integer division by zero.
pub const FAULT_ARITHMETIC: Word = 3;

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultKind {
    /// Malformed bytecode. Fatal.
    #[error(transparent)]
    Decode(#[from] BytecodeError),

    /// Null dereference. Guest-catchable.
    #[error("null dereference")]
    NullPointer,

    /// Array access out of bounds. Guest-catchable.
    #[error("array index {index} out of bounds for length {length}")]
    ArrayBounds { index: i32, length: i32 },

    /// Integer division or remainder by zero. Guest-catchable.
    #[error("integer division by zero")]
    DivideByZero,

    /// An error code raised by the guest `throw` opcode. Guest-catchable.
    #[error("guest error code {0}")]
    Throw(Word),

    /// `bpt` executed. Fatal.
    #[error("breakpoint")]
    Breakpoint,

    /// Pop past the frame's operand stack base. Fatal.
    #[error("operand stack underflow")]
    StackUnderflow,

    /// Frame memory limit exceeded. Fatal.
    #[error("frame memory limit exceeded")]
    StackOverflow,

    /// Heap limit exceeded. Fatal.
    #[error("heap limit exceeded")]
    OutOfMemory,

    /// A branch or switch left the method body. Fatal.
    #[error("jump target {0} outside the method")]
    BadJumpTarget(i64),

    /// A class number with no metadata. Fatal link fault.
    #[error("bad class reference {0}")]
    BadClassRef(Word),

    /// A constant-object index past the class's table. Fatal link fault.
    #[error("bad constant-object index {0}")]
    BadConstRef(u32),

    /// A field slot past the declared layout. Fatal link fault.
    #[error("bad field slot {0}")]
    BadFieldSlot(u32),

    /// A local variable slot past the frame's locals. Fatal link fault.
    #[error("bad local slot {0}")]
    BadLocalSlot(u32),

    /// A typed field opcode applied to a field of another kind. Fatal link
    /// fault.
    #[error("field kind does not match access form")]
    FieldKindMismatch,

    /// A typed array opcode applied to an array of another element kind.
    /// Fatal link fault.
    #[error("array element kind does not match access form")]
    ElementKindMismatch,

    /// A method slot that resolves nowhere. Fatal link fault.
    #[error("bad method slot {0}")]
    BadMethodSlot(u32),

    /// The operand stack did not hold the callee's declared argument words.
    /// Fatal link fault.
    #[error("callee expects {expected} argument words, stack holds {got}")]
    BadArgCount { expected: usize, got: usize },

    /// A return form that does not match the declared result width. Fatal
    /// link fault.
    #[error("return form does not match declared result width")]
    ReturnMismatch,

    /// `newarray` on a class with no element kind. Fatal link fault.
    #[error("class {0} is not an array class")]
    NotAnArrayClass(Word),

    /// `invokeinterface` against a class that does not list the interface.
    /// Fatal link fault.
    #[error("interface {0} not implemented by receiver class")]
    MissingInterface(Word),

    /// `monitorexit` by a thread that does not own the monitor. Fatal.
    #[error("monitor not owned by this thread")]
    IllegalMonitorState,

    /// A reference that names no live object. Fatal.
    #[error("invalid object reference {0}")]
    BadReference(Word),
}

impl FaultKind {
    /// The code a matching guest handler receives, for catchable faults.
    pub fn guest_code(&self) -> Option<Word> {
        match self {
            FaultKind::NullPointer => Some(FAULT_NULL_POINTER),
            FaultKind::ArrayBounds { .. } => Some(FAULT_ARRAY_BOUNDS),
            FaultKind::DivideByZero => Some(FAULT_ARITHMETIC),
            FaultKind::Throw(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether guest handler tables may catch this fault.
    pub fn catchable(&self) -> bool {
        self.guest_code().is_some()
    }
}

/// A fault that terminated a thread, with enough context to diagnose it.
#[derive(Debug, Clone, Error)]
#[error("{kind} at pc {pc} in method {method} (opcode {opcode:#04x}, frame depth {depth})")]
pub struct Fault {
    pub kind: FaultKind,
    /// Method id of the faulting frame.
    pub method: u16,
    /// Address of the faulting instruction.
    pub pc: usize,
    /// The faulting opcode byte.
    pub opcode: u8,
    /// Number of live frames when the fault was raised.
    pub depth: usize,
}
