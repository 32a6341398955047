//! The opcode table.
//!
//! Seven implicit-operand families occupy the low half of the opcode space,
//! 16 contiguous values each; zero-operand opcodes follow from 0x70 and
//! single-operand-byte opcodes after those. Contiguity of the families is
//! what makes `opcode - base` the operand, so it is checked at compile time.

use static_assertions::const_assert_eq;

use crate::error::{BytecodeError, Result};

/// Shift applied to `extend`/`extend_n` high bits when resolving an index
/// operand.
pub const EXTEND_SHIFT: u32 = 8;

/// Macro for defining the opcode enum.
///
/// Generates the byte conversions, the operand-kind table and the mnemonic
/// table in one place so they cannot drift apart.
macro_rules! def_opcodes {
    (
        $(
            $(#[$meta:meta])*
            ($code:literal) = $name:ident / $kind:ident
        ),* $(,)?
    ) => {
        /// A bytecode opcode.
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$meta])*
                $name = $code
            ),*
        }

        impl Opcode {
            /// Every opcode, in numeric order.
            pub const ALL: &'static [Opcode] = &[$(Self::$name),*];

            /// Decode a single opcode byte.
            pub fn from_u8(b: u8) -> Result<Self> {
                match b {
                    $($code => Ok(Self::$name),)*
                    _ => Err(BytecodeError::UnknownOpcode(b)),
                }
            }

            /// The opcode byte.
            pub const fn as_u8(self) -> u8 {
                self as u8
            }

            /// The operand encoding class of this opcode.
            pub const fn kind(self) -> OperandKind {
                match self {
                    $(Self::$name => OperandKind::$kind),*
                }
            }

            /// The mnemonic, as written in trace output and map files.
            pub fn mnemonic(self) -> &'static str {
                let s = match self {
                    $(Self::$name => stringify!($name)),*
                };
                s.strip_prefix("r#").unwrap_or(s)
            }
        }
    };
}

/// How an opcode's operand is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand bytes.
    None,
    /// Operand 0..=15 packed into the opcode byte itself.
    Implicit,
    /// One unsigned index byte, widenable and extendable.
    Index,
    /// One signed byte. Branch offsets and `iconst`.
    Signed,
    /// Operand modifier prefix (the `wide` and `extend` families).
    Prefix,
    /// Inline jump-table payload.
    Switch,
}

def_opcodes! {
    // Implicit-operand families. The operand is the low nibble of the
    // opcode byte.

    /// Push the constant 0.
    (0x00) = iconst_0 / Implicit,
    (0x01) = iconst_1 / Implicit,
    (0x02) = iconst_2 / Implicit,
    (0x03) = iconst_3 / Implicit,
    (0x04) = iconst_4 / Implicit,
    (0x05) = iconst_5 / Implicit,
    (0x06) = iconst_6 / Implicit,
    (0x07) = iconst_7 / Implicit,
    (0x08) = iconst_8 / Implicit,
    (0x09) = iconst_9 / Implicit,
    (0x0a) = iconst_10 / Implicit,
    (0x0b) = iconst_11 / Implicit,
    (0x0c) = iconst_12 / Implicit,
    (0x0d) = iconst_13 / Implicit,
    (0x0e) = iconst_14 / Implicit,
    (0x0f) = iconst_15 / Implicit,

    /// Push entry 0 of the current class's constant-object table.
    (0x10) = object_0 / Implicit,
    (0x11) = object_1 / Implicit,
    (0x12) = object_2 / Implicit,
    (0x13) = object_3 / Implicit,
    (0x14) = object_4 / Implicit,
    (0x15) = object_5 / Implicit,
    (0x16) = object_6 / Implicit,
    (0x17) = object_7 / Implicit,
    (0x18) = object_8 / Implicit,
    (0x19) = object_9 / Implicit,
    (0x1a) = object_10 / Implicit,
    (0x1b) = object_11 / Implicit,
    (0x1c) = object_12 / Implicit,
    (0x1d) = object_13 / Implicit,
    (0x1e) = object_14 / Implicit,
    (0x1f) = object_15 / Implicit,

    /// Push entry 0 of the current class's class-reference table.
    (0x20) = class_0 / Implicit,
    (0x21) = class_1 / Implicit,
    (0x22) = class_2 / Implicit,
    (0x23) = class_3 / Implicit,
    (0x24) = class_4 / Implicit,
    (0x25) = class_5 / Implicit,
    (0x26) = class_6 / Implicit,
    (0x27) = class_7 / Implicit,
    (0x28) = class_8 / Implicit,
    (0x29) = class_9 / Implicit,
    (0x2a) = class_10 / Implicit,
    (0x2b) = class_11 / Implicit,
    (0x2c) = class_12 / Implicit,
    (0x2d) = class_13 / Implicit,
    (0x2e) = class_14 / Implicit,
    (0x2f) = class_15 / Implicit,

    /// Push local variable 0.
    (0x30) = load_0 / Implicit,
    (0x31) = load_1 / Implicit,
    (0x32) = load_2 / Implicit,
    (0x33) = load_3 / Implicit,
    (0x34) = load_4 / Implicit,
    (0x35) = load_5 / Implicit,
    (0x36) = load_6 / Implicit,
    (0x37) = load_7 / Implicit,
    (0x38) = load_8 / Implicit,
    (0x39) = load_9 / Implicit,
    (0x3a) = load_10 / Implicit,
    (0x3b) = load_11 / Implicit,
    (0x3c) = load_12 / Implicit,
    (0x3d) = load_13 / Implicit,
    (0x3e) = load_14 / Implicit,
    (0x3f) = load_15 / Implicit,

    /// Pop into local variable 0.
    (0x40) = store_0 / Implicit,
    (0x41) = store_1 / Implicit,
    (0x42) = store_2 / Implicit,
    (0x43) = store_3 / Implicit,
    (0x44) = store_4 / Implicit,
    (0x45) = store_5 / Implicit,
    (0x46) = store_6 / Implicit,
    (0x47) = store_7 / Implicit,
    (0x48) = store_8 / Implicit,
    (0x49) = store_9 / Implicit,
    (0x4a) = store_10 / Implicit,
    (0x4b) = store_11 / Implicit,
    (0x4c) = store_12 / Implicit,
    (0x4d) = store_13 / Implicit,
    (0x4e) = store_14 / Implicit,
    (0x4f) = store_15 / Implicit,

    /// Widen the next operand to 12 bits; the low nibble supplies the high
    /// four bits.
    (0x50) = wide_0 / Prefix,
    (0x51) = wide_1 / Prefix,
    (0x52) = wide_2 / Prefix,
    (0x53) = wide_3 / Prefix,
    (0x54) = wide_4 / Prefix,
    (0x55) = wide_5 / Prefix,
    (0x56) = wide_6 / Prefix,
    (0x57) = wide_7 / Prefix,
    (0x58) = wide_8 / Prefix,
    (0x59) = wide_9 / Prefix,
    (0x5a) = wide_10 / Prefix,
    (0x5b) = wide_11 / Prefix,
    (0x5c) = wide_12 / Prefix,
    (0x5d) = wide_13 / Prefix,
    (0x5e) = wide_14 / Prefix,
    (0x5f) = wide_15 / Prefix,

    /// Supply the high byte of the next index operand; the low nibble is
    /// the high byte.
    (0x60) = extend_0 / Prefix,
    (0x61) = extend_1 / Prefix,
    (0x62) = extend_2 / Prefix,
    (0x63) = extend_3 / Prefix,
    (0x64) = extend_4 / Prefix,
    (0x65) = extend_5 / Prefix,
    (0x66) = extend_6 / Prefix,
    (0x67) = extend_7 / Prefix,
    (0x68) = extend_8 / Prefix,
    (0x69) = extend_9 / Prefix,
    (0x6a) = extend_10 / Prefix,
    (0x6b) = extend_11 / Prefix,
    (0x6c) = extend_12 / Prefix,
    (0x6d) = extend_13 / Prefix,
    (0x6e) = extend_14 / Prefix,
    (0x6f) = extend_15 / Prefix,

    // Typed wide prefixes. The next instruction's operand is read at the
    // named width; for `load`/`store`, `wide_long`/`wide_double` also select
    // two-word local access.

    /// Widen the next operand to a signed 2-byte value.
    (0x70) = wide_short / Prefix,
    /// Widen the next operand to an unsigned 2-byte value.
    (0x71) = wide_char / Prefix,
    /// Widen the next operand to a signed 4-byte value.
    (0x72) = wide_int / Prefix,
    /// Two-word form: 8-byte `iconst` literal, or two-word `load`/`store`.
    (0x73) = wide_long / Prefix,
    /// 4-byte `iconst` literal holding `f32` bits.
    (0x74) = wide_float / Prefix,
    /// Two-word form: 8-byte `iconst` literal holding `f64` bits, or
    /// two-word `load`/`store`.
    (0x75) = wide_double / Prefix,

    /// Push the constant -1.
    (0x76) = iconst_m1 / None,

    // Integer ALU group. All arithmetic wraps.

    /// Add `int`.
    (0x77) = iadd / None,
    /// Subtract `int`.
    (0x78) = isub / None,
    /// Bitwise AND `int`.
    (0x79) = iand / None,
    /// Bitwise OR `int`.
    (0x7a) = ior / None,
    /// Bitwise XOR `int`.
    (0x7b) = ixor / None,
    /// Shift left `int`.
    (0x7c) = ishl / None,
    /// Arithmetic shift right `int`.
    (0x7d) = ishr / None,
    /// Logical shift right `int`.
    (0x7e) = iushr / None,
    /// Multiply `int`.
    (0x7f) = imul / None,
    /// Divide `int`. Divisor 0 raises the arithmetic fault.
    (0x80) = idiv / None,
    /// Remainder `int`. Divisor 0 raises the arithmetic fault.
    (0x81) = irem / None,
    /// Negate the stack top.
    (0x82) = neg / None,
    /// Increment the stack top.
    (0x83) = inc / None,

    /// Truncate to `byte` with sign extension.
    (0x84) = i2b / None,
    /// Truncate to `short` with sign extension.
    (0x85) = i2s / None,
    /// Truncate to `char` with zero extension.
    (0x86) = i2c / None,

    /// Discard the stack top.
    (0x87) = pop / None,

    /// Return with no result.
    (0x88) = r#return / None,
    /// Return a one-word result.
    (0x89) = return_1 / None,
    /// Return a two-word result.
    (0x8a) = return_2 / None,

    /// Cooperative suspension point.
    (0x8b) = r#yield / None,
    /// Breakpoint. Always a fatal fault.
    (0x8c) = bpt / None,
    (0x8d) = nop / None,
    /// Pop a guest error code and raise it.
    (0x8e) = throw / None,

    // Comparison group. Pop two, push 0 or 1.

    (0x8f) = eq / None,
    (0x90) = lt / None,
    (0x91) = le / None,
    (0x92) = ne / None,
    (0x93) = gt / None,
    (0x94) = ge / None,

    /// Pop an array and a key, push the index of the first match or -1.
    (0x95) = lookup / None,
    /// Indexed jump table.
    (0x96) = tableswitch / Switch,
    /// Sorted key/offset pairs, binary searched.
    (0x97) = lookupswitch / Switch,

    /// Enter the monitor of the popped object.
    (0x98) = monitorenter / None,
    /// Exit the monitor of the popped object.
    (0x99) = monitorexit / None,

    /// Pop a class reference and allocate an instance.
    (0x9a) = new / None,
    /// Pop a class reference and a length and allocate an array.
    (0x9b) = newarray / None,
    /// Pop a length and an object array; fill its null slots with fresh
    /// arrays of that length.
    (0x9c) = newdimension / None,
    /// Push the length of the popped array.
    (0x9d) = arraylength / None,

    // Array access group. Typed forms must match the array's element kind.

    /// Load a word element.
    (0x9e) = aload / None,
    /// Load a `byte` element, sign extended.
    (0x9f) = aload_b / None,
    /// Load a `short` element, sign extended.
    (0xa0) = aload_s / None,
    /// Load a `char` element, zero extended.
    (0xa1) = aload_c / None,
    /// Load a two-word element from a `long` array.
    (0xa2) = aload_i / None,
    /// Store a word element.
    (0xa3) = astore / None,
    /// Store a `byte` element.
    (0xa4) = astore_b / None,
    /// Store a `short` element.
    (0xa5) = astore_s / None,
    /// Store a reference element.
    (0xa6) = astore_o / None,
    /// Store a two-word element into a `long` array.
    (0xa7) = astore_i / None,

    // Single-operand-byte opcodes.

    /// Push a signed byte constant.
    (0xa8) = iconst / Signed,
    /// Push a constant-object table entry.
    (0xa9) = object / Index,
    /// Push a class-reference table entry.
    (0xaa) = class / Index,
    /// Push a local variable.
    (0xab) = load / Index,
    /// Pop into a local variable.
    (0xac) = store / Index,
    /// Explicit `extend` prefix: one extension byte follows the opcode.
    (0xad) = extend / Prefix,

    /// Pop a class reference and invoke its static method table entry.
    (0xae) = invoke / Index,
    /// Invoke through the receiver's virtual table.
    (0xaf) = invokevirtual / Index,
    /// Pop a class reference and dispatch through that class's table.
    (0xb0) = invokeabsolute / Index,
    /// Pop an interface reference, remap the slot through the receiver's
    /// interface-slot table and dispatch virtually.
    (0xb1) = invokeinterface / Index,

    // Branch group. Offsets are signed and relative to the branch opcode's
    // own address.

    (0xb2) = ifeq / Signed,
    (0xb3) = ifne / Signed,
    (0xb4) = iflt / Signed,
    (0xb5) = ifle / Signed,
    (0xb6) = ifgt / Signed,
    (0xb7) = ifge / Signed,
    (0xb8) = if_icmpeq / Signed,
    (0xb9) = if_icmpne / Signed,
    (0xba) = if_icmplt / Signed,
    (0xbb) = if_icmple / Signed,
    (0xbc) = if_icmpgt / Signed,
    (0xbd) = if_icmpge / Signed,
    (0xbe) = goto / Signed,

    // Field access group. The operand is the field slot; `this_*` forms use
    // local 0 as the receiver; static forms pop a class reference.

    (0xbf) = getstatic / Index,
    (0xc0) = getstatic_o / Index,
    (0xc1) = getstatic_i / Index,
    (0xc2) = putstatic / Index,
    (0xc3) = putstatic_o / Index,
    (0xc4) = putstatic_i / Index,
    (0xc5) = getfield / Index,
    (0xc6) = getfield_b / Index,
    (0xc7) = getfield_s / Index,
    (0xc8) = getfield_c / Index,
    (0xc9) = getfield_i / Index,
    (0xca) = putfield / Index,
    (0xcb) = putfield_b / Index,
    (0xcc) = putfield_s / Index,
    (0xcd) = putfield_o / Index,
    (0xce) = putfield_i / Index,
    (0xcf) = this_getfield / Index,
    (0xd0) = this_getfield_b / Index,
    (0xd1) = this_getfield_s / Index,
    (0xd2) = this_getfield_c / Index,
    (0xd3) = this_getfield_i / Index,
    (0xd4) = this_putfield / Index,
    (0xd5) = this_putfield_b / Index,
    (0xd6) = this_putfield_s / Index,
    (0xd7) = this_putfield_o / Index,
    (0xd8) = this_putfield_i / Index,
}

/// The implicit-operand opcode families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Iconst,
    Object,
    Class,
    Load,
    Store,
    Wide,
    Extend,
}

impl Family {
    /// First opcode value of the family.
    pub const fn base(self) -> u8 {
        match self {
            Family::Iconst => 0x00,
            Family::Object => 0x10,
            Family::Class => 0x20,
            Family::Load => 0x30,
            Family::Store => 0x40,
            Family::Wide => 0x50,
            Family::Extend => 0x60,
        }
    }

    /// The implicit opcode for `self` with operand `n`.
    pub fn implicit(self, n: u8) -> Option<Opcode> {
        if n > 15 {
            return None;
        }
        Opcode::from_u8(self.base() + n).ok()
    }
}

// The operand-from-opcode-byte arithmetic relies on these.
const_assert_eq!(Opcode::iconst_0 as u8, 0x00);
const_assert_eq!(Opcode::iconst_15 as u8, 0x0f);
const_assert_eq!(Opcode::object_0 as u8, 0x10);
const_assert_eq!(Opcode::class_0 as u8, 0x20);
const_assert_eq!(Opcode::load_0 as u8, 0x30);
const_assert_eq!(Opcode::store_0 as u8, 0x40);
const_assert_eq!(Opcode::wide_0 as u8, 0x50);
const_assert_eq!(Opcode::extend_0 as u8, 0x60);
const_assert_eq!(Opcode::extend_15 as u8, 0x6f);

/// Width selected by a typed `wide_<t>` prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WideKind {
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
}

/// What a modifier-prefix opcode contributes to the next decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifierOp {
    /// `wide_short` .. `wide_double`.
    Wide(WideKind),
    /// `wide_n`: high four bits of a 12-bit operand.
    WideNibble(u8),
    /// `extend_n`: high byte of the next index operand.
    ExtendNibble(u8),
    /// `extend`: the high byte follows the prefix opcode.
    Extend,
}

/// Condition of a comparison or conditional branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cond {
    /// Whether the condition holds for the ordered pair `(l, r)`.
    pub fn holds(self, l: i32, r: i32) -> bool {
        match self {
            Cond::Eq => l == r,
            Cond::Ne => l != r,
            Cond::Lt => l < r,
            Cond::Le => l <= r,
            Cond::Gt => l > r,
            Cond::Ge => l >= r,
        }
    }
}

/// A decoded conditional or unconditional branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Branch {
    /// Compare the popped value against zero.
    Zero(Cond),
    /// Compare two popped values.
    Cmp(Cond),
    /// `goto`.
    Always,
}

/// Where a field access resolves its storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldPlace {
    /// Per-class static storage; the class reference is popped.
    Static,
    /// Instance storage; the receiver is popped.
    Instance,
    /// Instance storage; local 0 is the receiver.
    This,
}

/// Width/signedness selected by a field or array opcode suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    /// Untyped single word.
    Word,
    /// `_b`: signed byte.
    Byte,
    /// `_s`: signed short.
    Short,
    /// `_c`: unsigned char.
    Char,
    /// `_i`: one-word int (fields) or two-word long element (arrays).
    Int,
    /// `_o`: reference.
    Ref,
}

/// A decoded field access opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldAccess {
    pub place: FieldPlace,
    pub put: bool,
    pub kind: AccessKind,
}

impl Opcode {
    /// Family and implicit operand, for the `_n` opcodes.
    pub fn implicit(self) -> Option<(Family, u8)> {
        let b = self.as_u8();
        let family = match b >> 4 {
            0x0 => Family::Iconst,
            0x1 => Family::Object,
            0x2 => Family::Class,
            0x3 => Family::Load,
            0x4 => Family::Store,
            0x5 => Family::Wide,
            0x6 => Family::Extend,
            _ => return None,
        };
        Some((family, b & 0x0f))
    }

    /// Family of this opcode, counting both the implicit and the
    /// operand-byte forms.
    pub fn family(self) -> Option<Family> {
        if let Some((f, _)) = self.implicit() {
            return Some(f);
        }
        match self {
            Opcode::iconst | Opcode::iconst_m1 => Some(Family::Iconst),
            Opcode::object => Some(Family::Object),
            Opcode::class => Some(Family::Class),
            Opcode::load => Some(Family::Load),
            Opcode::store => Some(Family::Store),
            Opcode::extend => Some(Family::Extend),
            _ => None,
        }
    }

    /// Modifier contribution, for prefix opcodes.
    pub fn modifier(self) -> Option<ModifierOp> {
        match self {
            Opcode::wide_short => Some(ModifierOp::Wide(WideKind::Short)),
            Opcode::wide_char => Some(ModifierOp::Wide(WideKind::Char)),
            Opcode::wide_int => Some(ModifierOp::Wide(WideKind::Int)),
            Opcode::wide_long => Some(ModifierOp::Wide(WideKind::Long)),
            Opcode::wide_float => Some(ModifierOp::Wide(WideKind::Float)),
            Opcode::wide_double => Some(ModifierOp::Wide(WideKind::Double)),
            Opcode::extend => Some(ModifierOp::Extend),
            _ => match self.implicit() {
                Some((Family::Wide, n)) => Some(ModifierOp::WideNibble(n)),
                Some((Family::Extend, n)) => Some(ModifierOp::ExtendNibble(n)),
                _ => None,
            },
        }
    }

    /// Branch form, for the branch group.
    pub fn branch(self) -> Option<Branch> {
        match self {
            Opcode::ifeq => Some(Branch::Zero(Cond::Eq)),
            Opcode::ifne => Some(Branch::Zero(Cond::Ne)),
            Opcode::iflt => Some(Branch::Zero(Cond::Lt)),
            Opcode::ifle => Some(Branch::Zero(Cond::Le)),
            Opcode::ifgt => Some(Branch::Zero(Cond::Gt)),
            Opcode::ifge => Some(Branch::Zero(Cond::Ge)),
            Opcode::if_icmpeq => Some(Branch::Cmp(Cond::Eq)),
            Opcode::if_icmpne => Some(Branch::Cmp(Cond::Ne)),
            Opcode::if_icmplt => Some(Branch::Cmp(Cond::Lt)),
            Opcode::if_icmple => Some(Branch::Cmp(Cond::Le)),
            Opcode::if_icmpgt => Some(Branch::Cmp(Cond::Gt)),
            Opcode::if_icmpge => Some(Branch::Cmp(Cond::Ge)),
            Opcode::goto => Some(Branch::Always),
            _ => None,
        }
    }

    /// Condition, for the zero-operand comparison group.
    pub fn compare(self) -> Option<Cond> {
        match self {
            Opcode::eq => Some(Cond::Eq),
            Opcode::lt => Some(Cond::Lt),
            Opcode::le => Some(Cond::Le),
            Opcode::ne => Some(Cond::Ne),
            Opcode::gt => Some(Cond::Gt),
            Opcode::ge => Some(Cond::Ge),
            _ => None,
        }
    }

    /// Field access form, for the field group.
    pub fn field_access(self) -> Option<FieldAccess> {
        use AccessKind::*;
        use FieldPlace::*;
        let (place, put, kind) = match self {
            Opcode::getstatic => (Static, false, Word),
            Opcode::getstatic_o => (Static, false, Ref),
            Opcode::getstatic_i => (Static, false, Int),
            Opcode::putstatic => (Static, true, Word),
            Opcode::putstatic_o => (Static, true, Ref),
            Opcode::putstatic_i => (Static, true, Int),
            Opcode::getfield => (Instance, false, Word),
            Opcode::getfield_b => (Instance, false, Byte),
            Opcode::getfield_s => (Instance, false, Short),
            Opcode::getfield_c => (Instance, false, Char),
            Opcode::getfield_i => (Instance, false, Int),
            Opcode::putfield => (Instance, true, Word),
            Opcode::putfield_b => (Instance, true, Byte),
            Opcode::putfield_s => (Instance, true, Short),
            Opcode::putfield_o => (Instance, true, Ref),
            Opcode::putfield_i => (Instance, true, Int),
            Opcode::this_getfield => (This, false, Word),
            Opcode::this_getfield_b => (This, false, Byte),
            Opcode::this_getfield_s => (This, false, Short),
            Opcode::this_getfield_c => (This, false, Char),
            Opcode::this_getfield_i => (This, false, Int),
            Opcode::this_putfield => (This, true, Word),
            Opcode::this_putfield_b => (This, true, Byte),
            Opcode::this_putfield_s => (This, true, Short),
            Opcode::this_putfield_o => (This, true, Ref),
            Opcode::this_putfield_i => (This, true, Int),
            _ => return None,
        };
        Some(FieldAccess { place, put, kind })
    }

    /// Array access form, for the array group. `true` means store.
    pub fn array_access(self) -> Option<(bool, AccessKind)> {
        use AccessKind::*;
        match self {
            Opcode::aload => Some((false, Word)),
            Opcode::aload_b => Some((false, Byte)),
            Opcode::aload_s => Some((false, Short)),
            Opcode::aload_c => Some((false, Char)),
            Opcode::aload_i => Some((false, Int)),
            Opcode::astore => Some((true, Word)),
            Opcode::astore_b => Some((true, Byte)),
            Opcode::astore_s => Some((true, Short)),
            Opcode::astore_o => Some((true, Ref)),
            Opcode::astore_i => Some((true, Int)),
            _ => None,
        }
    }

    /// Look up an opcode by its mnemonic.
    pub fn by_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == name)
    }
}
