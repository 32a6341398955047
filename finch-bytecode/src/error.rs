/// An error which can occur while decoding, encoding or assembling bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    /// Returned when an unrecognized opcode byte is found.
    UnknownOpcode(u8),

    /// Returned when the code array ends inside an instruction.
    TruncatedCode(usize),

    /// Returned when a modifier prefix is found while another is pending.
    PrefixAfterPrefix(usize),

    /// Returned when a pending modifier prefix targets an opcode it cannot
    /// apply to.
    BadPrefixTarget(usize, u8),

    /// Returned when a widened index operand resolves to a negative value.
    NegativeIndex(usize),

    /// Returned when a switch payload is malformed (inverted bounds or
    /// unsorted keys).
    BadSwitch(usize),

    /// Returned when an operand value is not representable in the requested
    /// encoding.
    OperandRange(i64),

    /// Returned when a branch target is further away than its offset
    /// encoding can express.
    BranchRange(usize),

    /// Returned when an assembler label is used but never bound.
    UnboundLabel(usize),
}

impl std::fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOpcode(b) => write!(f, "unknown opcode {b:#04x}"),
            Self::TruncatedCode(at) => write!(f, "code truncated at {at}"),
            Self::PrefixAfterPrefix(at) => {
                write!(f, "modifier prefix at {at} while another is pending")
            }
            Self::BadPrefixTarget(at, b) => {
                write!(f, "modifier prefix cannot apply to opcode {b:#04x} at {at}")
            }
            Self::NegativeIndex(at) => write!(f, "negative index operand at {at}"),
            Self::BadSwitch(at) => write!(f, "malformed switch payload at {at}"),
            Self::OperandRange(v) => write!(f, "operand {v} not representable"),
            Self::BranchRange(at) => write!(f, "branch at {at} out of offset range"),
            Self::UnboundLabel(id) => write!(f, "label {id} never bound"),
        }
    }
}

impl std::error::Error for BytecodeError {}

pub type Result<T> = std::result::Result<T, BytecodeError>;
