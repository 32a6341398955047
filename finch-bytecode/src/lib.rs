//! Compact bytecode instruction set.
//!
//! Defines the opcode table, the operand encoding scheme (implicit `_n`
//! forms, `wide` prefixing, `extend` prefixing) and a decoder/encoder pair
//! for it, plus a small assembler for building method bodies.

pub mod asm;
pub mod decode;
pub mod error;
pub mod opcode;
pub mod stream;

pub use decode::{decode_at, encode, Decoder, Inst, Modifier, Operand};
pub use error::{BytecodeError, Result};
pub use opcode::{Family, Opcode, OperandKind, WideKind};
