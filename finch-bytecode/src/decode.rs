//! Operand decoder and encoder.
//!
//! Decoding is driven by a single pending-modifier slot: a prefix opcode
//! decodes to [`Inst::Prefix`] and the caller feeds the modifier back into
//! the next call. A prefix never survives past the instruction it applies
//! to, and a prefix may not target another prefix.

use crate::error::{BytecodeError, Result};
use crate::opcode::{
    Family, ModifierOp, Opcode, OperandKind, WideKind, EXTEND_SHIFT,
};
use crate::stream::{CodeReader, CodeWriter};

/// Pending operand modifier. At most one may be active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    None,
    /// A typed `wide_<t>` prefix.
    Wide(WideKind),
    /// A `wide_n` prefix: the high four bits of a 12-bit operand.
    WideNibble(u8),
    /// An `extend`/`extend_n` prefix: the high byte of an index operand.
    Extend(u8),
}

/// A resolved operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operand {
    /// The operand value. Index operands are always non-negative.
    pub value: i64,
    /// 2 for the two-word forms selected by `wide_long`/`wide_double`,
    /// 1 otherwise.
    pub words: u8,
}

impl Operand {
    fn one(value: i64) -> Self {
        Operand { value, words: 1 }
    }

    fn two(value: i64) -> Self {
        Operand { value, words: 2 }
    }

    /// The operand as an index, for table lookups.
    pub fn index(&self) -> usize {
        self.value as usize
    }
}

/// A decoded `tableswitch` payload. Offsets are relative to the address of
/// the `tableswitch` opcode itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSwitch {
    pub default: i16,
    pub low: i32,
    pub high: i32,
    pub offsets: Vec<i16>,
}

impl TableSwitch {
    /// Offset selected for `value`.
    pub fn offset_for(&self, value: i32) -> i16 {
        if value < self.low || value > self.high {
            return self.default;
        }
        self.offsets[(value - self.low) as usize]
    }
}

/// A decoded `lookupswitch` payload: sorted key/offset pairs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupSwitch {
    pub default: i16,
    pub pairs: Vec<(i32, i16)>,
}

impl LookupSwitch {
    /// Offset selected for `key`, by binary search.
    pub fn offset_for(&self, key: i32) -> i16 {
        match self.pairs.binary_search_by_key(&key, |&(k, _)| k) {
            Ok(i) => self.pairs[i].1,
            Err(_) => self.default,
        }
    }
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    /// A modifier prefix. The caller carries the modifier into the next
    /// decode.
    Prefix(Opcode, Modifier),
    /// A zero-operand instruction.
    Simple(Opcode),
    /// An instruction with a resolved operand.
    Op(Opcode, Operand),
    /// `tableswitch` with its payload.
    Table(TableSwitch),
    /// `lookupswitch` with its payload.
    Lookup(LookupSwitch),
}

/// Decode the instruction at `pc` under the given pending modifier.
///
/// Returns the instruction and the number of bytes consumed. The caller is
/// responsible for resetting its pending modifier after any non-prefix
/// instruction.
pub fn decode_at(code: &[u8], pc: usize, pending: Modifier) -> Result<(Inst, usize)> {
    let mut r = CodeReader::new(code, pc);
    let b = r.fetch_u1()?;
    let op = Opcode::from_u8(b)?;

    if let Some(m) = op.modifier() {
        if pending != Modifier::None {
            return Err(BytecodeError::PrefixAfterPrefix(pc));
        }
        let modifier = match m {
            ModifierOp::Wide(k) => Modifier::Wide(k),
            ModifierOp::WideNibble(n) => Modifier::WideNibble(n),
            ModifierOp::ExtendNibble(n) => Modifier::Extend(n),
            ModifierOp::Extend => Modifier::Extend(r.fetch_u1()?),
        };
        return Ok((Inst::Prefix(op, modifier), r.consumed(pc)));
    }

    let inst = match op.kind() {
        OperandKind::None => {
            reject_modifier(pending, pc, b)?;
            Inst::Simple(op)
        }
        OperandKind::Implicit => {
            // The packed forms take no prefix; the translator emits the
            // operand-byte form when it needs one.
            reject_modifier(pending, pc, b)?;
            let (_, n) = op.implicit().ok_or(BytecodeError::UnknownOpcode(b))?;
            Inst::Op(op, Operand::one(n as i64))
        }
        OperandKind::Index => Inst::Op(op, index_operand(&mut r, op, pending, pc, b)?),
        OperandKind::Signed => Inst::Op(op, signed_operand(&mut r, op, pending, pc, b)?),
        OperandKind::Switch => {
            reject_modifier(pending, pc, b)?;
            match op {
                Opcode::tableswitch => Inst::Table(read_table(&mut r, pc)?),
                _ => Inst::Lookup(read_lookup(&mut r, pc)?),
            }
        }
        OperandKind::Prefix => unreachable!("prefixes handled above"),
    };
    Ok((inst, r.consumed(pc)))
}

fn reject_modifier(pending: Modifier, pc: usize, b: u8) -> Result<()> {
    if pending == Modifier::None {
        Ok(())
    } else {
        Err(BytecodeError::BadPrefixTarget(pc, b))
    }
}

fn index_operand(
    r: &mut CodeReader,
    op: Opcode,
    pending: Modifier,
    pc: usize,
    b: u8,
) -> Result<Operand> {
    let two_word_local = matches!(op.family(), Some(Family::Load | Family::Store));
    let value = match pending {
        Modifier::None => return Ok(Operand::one(r.fetch_u1()? as i64)),
        Modifier::Extend(h) => ((h as i64) << EXTEND_SHIFT) | r.fetch_u1()? as i64,
        Modifier::WideNibble(n) => ((n as i64) << EXTEND_SHIFT) | r.fetch_u1()? as i64,
        Modifier::Wide(WideKind::Short) => r.fetch_i2()? as i64,
        Modifier::Wide(WideKind::Char) => r.fetch_u2()? as i64,
        Modifier::Wide(WideKind::Int) => r.fetch_i4()? as i64,
        Modifier::Wide(WideKind::Long | WideKind::Double) if two_word_local => {
            return Ok(Operand::two(r.fetch_u1()? as i64));
        }
        Modifier::Wide(_) => return Err(BytecodeError::BadPrefixTarget(pc, b)),
    };
    if value < 0 {
        return Err(BytecodeError::NegativeIndex(pc));
    }
    Ok(Operand::one(value))
}

fn signed_operand(
    r: &mut CodeReader,
    op: Opcode,
    pending: Modifier,
    pc: usize,
    b: u8,
) -> Result<Operand> {
    let literal = op == Opcode::iconst;
    let value = match pending {
        Modifier::None => r.fetch_i1()? as i64,
        Modifier::WideNibble(n) => {
            // 12-bit signed, high nibble from the prefix.
            let v = ((n as i64) << EXTEND_SHIFT) | r.fetch_u1()? as i64;
            if v & 0x800 != 0 {
                v - 0x1000
            } else {
                v
            }
        }
        Modifier::Wide(WideKind::Short) => r.fetch_i2()? as i64,
        Modifier::Wide(WideKind::Char) => r.fetch_u2()? as i64,
        Modifier::Wide(WideKind::Int) => r.fetch_i4()? as i64,
        Modifier::Wide(WideKind::Long) if literal => {
            return Ok(Operand::two(r.fetch_i8()?));
        }
        Modifier::Wide(WideKind::Float) if literal => {
            return Ok(Operand::one(r.fetch_i4()? as u32 as i64));
        }
        Modifier::Wide(WideKind::Double) if literal => {
            return Ok(Operand::two(r.fetch_i8()?));
        }
        _ => return Err(BytecodeError::BadPrefixTarget(pc, b)),
    };
    Ok(Operand::one(value))
}

fn read_table(r: &mut CodeReader, pc: usize) -> Result<TableSwitch> {
    let default = r.fetch_i2()?;
    let low = r.fetch_i4()?;
    let high = r.fetch_i4()?;
    if high < low {
        return Err(BytecodeError::BadSwitch(pc));
    }
    let count = (high as i64 - low as i64 + 1) as usize;
    if count * 2 > r.remaining() {
        return Err(BytecodeError::TruncatedCode(r.pos()));
    }
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(r.fetch_i2()?);
    }
    Ok(TableSwitch {
        default,
        low,
        high,
        offsets,
    })
}

fn read_lookup(r: &mut CodeReader, pc: usize) -> Result<LookupSwitch> {
    let npairs = r.fetch_u2()? as usize;
    let default = r.fetch_i2()?;
    if npairs * 6 > r.remaining() {
        return Err(BytecodeError::TruncatedCode(r.pos()));
    }
    let mut pairs = Vec::with_capacity(npairs);
    for _ in 0..npairs {
        let key = r.fetch_i4()?;
        let off = r.fetch_i2()?;
        if let Some(&(prev, _)) = pairs.last() {
            if key <= prev {
                return Err(BytecodeError::BadSwitch(pc));
            }
        }
        pairs.push((key, off));
    }
    Ok(LookupSwitch { default, pairs })
}

/// Encode one instruction under the given pending modifier. The inverse of
/// [`decode_at`]: re-encoding a decoded instruction with the modifier it
/// was decoded under reproduces the original bytes.
pub fn encode(inst: &Inst, pending: Modifier, w: &mut CodeWriter) -> Result<()> {
    match inst {
        Inst::Prefix(op, m) => encode_prefix(*op, *m, w),
        Inst::Simple(op) => {
            w.put_u1(op.as_u8());
            Ok(())
        }
        Inst::Op(op, operand) => encode_op(*op, *operand, pending, w),
        Inst::Table(t) => {
            w.put_u1(Opcode::tableswitch.as_u8());
            w.put_i2(t.default);
            w.put_i4(t.low);
            w.put_i4(t.high);
            for &off in &t.offsets {
                w.put_i2(off);
            }
            Ok(())
        }
        Inst::Lookup(l) => {
            w.put_u1(Opcode::lookupswitch.as_u8());
            w.put_u2(
                u16::try_from(l.pairs.len())
                    .map_err(|_| BytecodeError::OperandRange(l.pairs.len() as i64))?,
            );
            w.put_i2(l.default);
            for &(key, off) in &l.pairs {
                w.put_i4(key);
                w.put_i2(off);
            }
            Ok(())
        }
    }
}

fn encode_prefix(op: Opcode, m: Modifier, w: &mut CodeWriter) -> Result<()> {
    let expected = op
        .modifier()
        .ok_or(BytecodeError::BadPrefixTarget(0, op.as_u8()))?;
    w.put_u1(op.as_u8());
    match (expected, m) {
        (ModifierOp::Wide(k), Modifier::Wide(j)) if k == j => Ok(()),
        (ModifierOp::WideNibble(n), Modifier::WideNibble(j)) if n == j => Ok(()),
        (ModifierOp::ExtendNibble(n), Modifier::Extend(h)) if n == h => Ok(()),
        (ModifierOp::Extend, Modifier::Extend(h)) => {
            w.put_u1(h);
            Ok(())
        }
        _ => Err(BytecodeError::BadPrefixTarget(0, op.as_u8())),
    }
}

fn encode_op(op: Opcode, operand: Operand, pending: Modifier, w: &mut CodeWriter) -> Result<()> {
    w.put_u1(op.as_u8());
    let v = operand.value;
    match op.kind() {
        OperandKind::Implicit => {
            // The operand is the opcode byte itself; nothing to write, but
            // it must agree.
            let n = op.implicit().map(|(_, n)| n as i64);
            if n != Some(v) {
                return Err(BytecodeError::OperandRange(v));
            }
            Ok(())
        }
        OperandKind::Index => match pending {
            Modifier::None => put_checked_u1(w, v),
            Modifier::Extend(h) | Modifier::WideNibble(h) => {
                if v >> EXTEND_SHIFT != h as i64 || v < 0 {
                    return Err(BytecodeError::OperandRange(v));
                }
                w.put_u1(v as u8);
                Ok(())
            }
            Modifier::Wide(WideKind::Short) => put_checked_i2(w, v),
            Modifier::Wide(WideKind::Char) => put_checked_u2(w, v),
            Modifier::Wide(WideKind::Int) => put_checked_i4(w, v),
            Modifier::Wide(WideKind::Long | WideKind::Double) if operand.words == 2 => {
                put_checked_u1(w, v)
            }
            Modifier::Wide(_) => Err(BytecodeError::BadPrefixTarget(0, op.as_u8())),
        },
        OperandKind::Signed => match pending {
            Modifier::None => {
                let v = i8::try_from(v).map_err(|_| BytecodeError::OperandRange(v))?;
                w.put_i1(v);
                Ok(())
            }
            Modifier::WideNibble(n) => {
                let raw = if v < 0 { v + 0x1000 } else { v };
                if !(0..0x1000).contains(&raw) || raw >> EXTEND_SHIFT != n as i64 {
                    return Err(BytecodeError::OperandRange(v));
                }
                w.put_u1(raw as u8);
                Ok(())
            }
            Modifier::Wide(WideKind::Short) => put_checked_i2(w, v),
            Modifier::Wide(WideKind::Char) => put_checked_u2(w, v),
            Modifier::Wide(WideKind::Int) => put_checked_i4(w, v),
            Modifier::Wide(WideKind::Long | WideKind::Double)
                if op == Opcode::iconst && operand.words == 2 =>
            {
                w.put_i8(v);
                Ok(())
            }
            Modifier::Wide(WideKind::Float) if op == Opcode::iconst => {
                w.put_i4(v as u32 as i32);
                Ok(())
            }
            _ => Err(BytecodeError::BadPrefixTarget(0, op.as_u8())),
        },
        _ => Err(BytecodeError::OperandRange(v)),
    }
}

fn put_checked_u1(w: &mut CodeWriter, v: i64) -> Result<()> {
    let v = u8::try_from(v).map_err(|_| BytecodeError::OperandRange(v))?;
    w.put_u1(v);
    Ok(())
}

fn put_checked_u2(w: &mut CodeWriter, v: i64) -> Result<()> {
    let v = u16::try_from(v).map_err(|_| BytecodeError::OperandRange(v))?;
    w.put_u2(v);
    Ok(())
}

fn put_checked_i2(w: &mut CodeWriter, v: i64) -> Result<()> {
    let v = i16::try_from(v).map_err(|_| BytecodeError::OperandRange(v))?;
    w.put_i2(v);
    Ok(())
}

fn put_checked_i4(w: &mut CodeWriter, v: i64) -> Result<()> {
    let v = i32::try_from(v).map_err(|_| BytecodeError::OperandRange(v))?;
    w.put_i4(v);
    Ok(())
}

/// Walks a whole method body, threading the pending modifier internally and
/// yielding each decoded item with its address.
pub struct Decoder<'a> {
    code: &'a [u8],
    pc: usize,
    pending: Modifier,
    failed: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(code: &'a [u8]) -> Self {
        Self {
            code,
            pc: 0,
            pending: Modifier::None,
            failed: false,
        }
    }

    /// Current decode address.
    pub fn pc(&self) -> usize {
        self.pc
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<(usize, Inst)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pc >= self.code.len() {
            return None;
        }
        let at = self.pc;
        match decode_at(self.code, at, self.pending) {
            Ok((inst, len)) => {
                self.pc += len;
                self.pending = match &inst {
                    Inst::Prefix(_, m) => *m,
                    _ => Modifier::None,
                };
                Some(Ok((at, inst)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
