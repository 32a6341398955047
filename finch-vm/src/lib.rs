//! Compact-bytecode virtual machine core.
//!
//! Executes the instruction set defined by `finch-bytecode` over a
//! word-oriented operand stack and local variables. The metadata view
//! ([`meta::Suite`]) is populated by an external loader and is immutable
//! during execution; the mutable world (heap and statics) is shared behind
//! a mutex so guest threads may be driven from separate host threads.

pub mod fault;
pub mod heap;
pub mod meta;
pub mod monitor;
pub mod profile;
pub mod thread;
pub mod value;
pub mod vm;

pub use fault::{Fault, FaultKind};
pub use meta::{ClassMeta, MethodMeta, Suite};
pub use thread::{InterpOptions, Run, Thread};
pub use value::{ObjRef, Word, NULL};
pub use vm::{Vm, VmOptions};
