//! A small method-body assembler.
//!
//! Picks the shortest legal encoding for each operation (packed `_n` form,
//! plain operand byte, or a prefixed form) and patches branch and switch
//! offsets when labels are bound. Used by the translator side and heavily
//! by tests.

use crate::error::{BytecodeError, Result};
use crate::opcode::{Family, Opcode, OperandKind, EXTEND_SHIFT};
use crate::stream::CodeWriter;

/// A branch target. Created with [`Assembler::label`], bound with
/// [`Assembler::bind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Label(usize);

enum Slot {
    /// One signed offset byte.
    Byte { at: usize },
    /// One signed 2-byte offset, as in switch payloads.
    Half { at: usize },
}

struct Patch {
    slot: Slot,
    /// Address the offset is relative to (the owning opcode's address).
    base: usize,
    label: Label,
}

/// Incrementally builds a method body.
#[derive(Default)]
pub struct Assembler {
    w: CodeWriter,
    labels: Vec<Option<usize>>,
    patches: Vec<Patch>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current code address.
    pub fn here(&self) -> usize {
        self.w.pos()
    }

    /// Create an unbound label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current address.
    pub fn bind(&mut self, label: Label) {
        self.labels[label.0] = Some(self.w.pos());
    }

    /// Emit a zero-operand opcode.
    pub fn simple(&mut self, op: Opcode) -> &mut Self {
        debug_assert_eq!(op.kind(), OperandKind::None);
        self.w.put_u1(op.as_u8());
        self
    }

    /// Emit an operation with its operand, choosing the shortest encoding.
    ///
    /// `op` is the operand-byte form of the operation (`load`, `iconst`,
    /// `getfield_b`, ...); the packed `_n` or prefixed encoding is selected
    /// from the value.
    pub fn op(&mut self, op: Opcode, value: i32) -> Result<&mut Self> {
        match op.kind() {
            OperandKind::Index => self.index_op(op, value)?,
            OperandKind::Signed => self.signed_op(op, value)?,
            _ => return Err(BytecodeError::OperandRange(value as i64)),
        }
        Ok(self)
    }

    fn index_op(&mut self, op: Opcode, value: i32) -> Result<()> {
        if value < 0 {
            return Err(BytecodeError::NegativeIndex(self.here()));
        }
        if let Some(family) = op.family() {
            if value <= 15 {
                if let Some(packed) = family.implicit(value as u8) {
                    self.w.put_u1(packed.as_u8());
                    return Ok(());
                }
            }
        }
        if value <= 0xff {
            self.w.put_u1(op.as_u8());
            self.w.put_u1(value as u8);
        } else if value <= 0xffff {
            let high = (value >> EXTEND_SHIFT) as u8;
            if high <= 15 {
                // extend_n carries the high byte in its own nibble.
                self.w.put_u1(Family::Extend.base() + high);
            } else {
                self.w.put_u1(Opcode::extend.as_u8());
                self.w.put_u1(high);
            }
            self.w.put_u1(op.as_u8());
            self.w.put_u1(value as u8);
        } else {
            return Err(BytecodeError::OperandRange(value as i64));
        }
        Ok(())
    }

    fn signed_op(&mut self, op: Opcode, value: i32) -> Result<()> {
        if op == Opcode::iconst {
            if value == -1 {
                self.w.put_u1(Opcode::iconst_m1.as_u8());
                return Ok(());
            }
            if (0..=15).contains(&value) {
                self.w.put_u1(Family::Iconst.base() + value as u8);
                return Ok(());
            }
        }
        if let Ok(v) = i8::try_from(value) {
            self.w.put_u1(op.as_u8());
            self.w.put_i1(v);
        } else if let Ok(v) = i16::try_from(value) {
            self.w.put_u1(Opcode::wide_short.as_u8());
            self.w.put_u1(op.as_u8());
            self.w.put_i2(v);
        } else {
            self.w.put_u1(Opcode::wide_int.as_u8());
            self.w.put_u1(op.as_u8());
            self.w.put_i4(value);
        }
        Ok(())
    }

    /// Emit a two-word `iconst` literal (`wide_long` form).
    pub fn lconst(&mut self, value: i64) -> &mut Self {
        self.w.put_u1(Opcode::wide_long.as_u8());
        self.w.put_u1(Opcode::iconst.as_u8());
        self.w.put_i8(value);
        self
    }

    /// Emit a two-word local load or store (`wide_long` form).
    pub fn local2(&mut self, op: Opcode, slot: u8) -> &mut Self {
        debug_assert!(matches!(op, Opcode::load | Opcode::store));
        self.w.put_u1(Opcode::wide_long.as_u8());
        self.w.put_u1(op.as_u8());
        self.w.put_u1(slot);
        self
    }

    /// Emit a branch to `target`. The one-byte offset is patched when the
    /// label is bound; a target out of `i8` range fails at [`finish`].
    ///
    /// [`finish`]: Assembler::finish
    pub fn branch(&mut self, op: Opcode, target: Label) -> &mut Self {
        debug_assert!(op.branch().is_some());
        let base = self.w.pos();
        self.w.put_u1(op.as_u8());
        let at = self.w.pos();
        self.w.put_i1(0);
        self.patches.push(Patch {
            slot: Slot::Byte { at },
            base,
            label: target,
        });
        self
    }

    /// Emit a `tableswitch` covering `low..low + targets.len()`.
    pub fn table_switch(&mut self, low: i32, targets: &[Label], default: Label) -> &mut Self {
        let base = self.w.pos();
        self.w.put_u1(Opcode::tableswitch.as_u8());
        let default_at = self.w.pos();
        self.w.put_i2(0);
        self.w.put_i4(low);
        self.w.put_i4(low + targets.len() as i32 - 1);
        self.patches.push(Patch {
            slot: Slot::Half { at: default_at },
            base,
            label: default,
        });
        for &t in targets {
            let at = self.w.pos();
            self.w.put_i2(0);
            self.patches.push(Patch {
                slot: Slot::Half { at },
                base,
                label: t,
            });
        }
        self
    }

    /// Emit a `lookupswitch` over sorted `keys`.
    pub fn lookup_switch(&mut self, pairs: &[(i32, Label)], default: Label) -> &mut Self {
        let base = self.w.pos();
        self.w.put_u1(Opcode::lookupswitch.as_u8());
        self.w.put_u2(pairs.len() as u16);
        let default_at = self.w.pos();
        self.w.put_i2(0);
        self.patches.push(Patch {
            slot: Slot::Half { at: default_at },
            base,
            label: default,
        });
        for &(key, t) in pairs {
            self.w.put_i4(key);
            let at = self.w.pos();
            self.w.put_i2(0);
            self.patches.push(Patch {
                slot: Slot::Half { at },
                base,
                label: t,
            });
        }
        self
    }

    /// Resolve all label references and return the finished code.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        for patch in &self.patches {
            let target = self.labels[patch.label.0].ok_or(BytecodeError::UnboundLabel(
                patch.label.0,
            ))?;
            let offset = target as i64 - patch.base as i64;
            match patch.slot {
                Slot::Byte { at } => {
                    let v = i8::try_from(offset)
                        .map_err(|_| BytecodeError::BranchRange(patch.base))?;
                    self.w.patch_u1(at, v as u8);
                }
                Slot::Half { at } => {
                    let v = i16::try_from(offset)
                        .map_err(|_| BytecodeError::BranchRange(patch.base))?;
                    self.w.patch_i2(at, v);
                }
            }
        }
        Ok(self.w.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{Decoder, Inst, Modifier, Operand};

    #[test]
    fn picks_packed_forms_for_small_operands() {
        let mut a = Assembler::new();
        a.op(Opcode::load, 1).unwrap();
        a.op(Opcode::load, 2).unwrap();
        a.simple(Opcode::iadd);
        a.op(Opcode::store, 5).unwrap();
        a.simple(Opcode::return_1);
        let code = a.finish().unwrap();
        assert_eq!(
            code,
            vec![
                Opcode::load_1.as_u8(),
                Opcode::load_2.as_u8(),
                Opcode::iadd.as_u8(),
                Opcode::store_5.as_u8(),
                Opcode::return_1.as_u8(),
            ]
        );
    }

    #[test]
    fn large_indexes_get_an_extend_prefix() {
        let mut a = Assembler::new();
        a.op(Opcode::load, 0x12c).unwrap();
        a.op(Opcode::load, 0x2fff).unwrap();
        let code = a.finish().unwrap();
        assert_eq!(
            code,
            vec![
                Opcode::extend_1.as_u8(),
                Opcode::load.as_u8(),
                0x2c,
                Opcode::extend.as_u8(),
                0x2f,
                Opcode::load.as_u8(),
                0xff,
            ]
        );
    }

    #[test]
    fn wide_literals_choose_the_narrowest_prefix() {
        let mut a = Assembler::new();
        a.op(Opcode::iconst, -1).unwrap();
        a.op(Opcode::iconst, 100).unwrap();
        a.op(Opcode::iconst, 1000).unwrap();
        a.op(Opcode::iconst, 100_000).unwrap();
        let code = a.finish().unwrap();

        let items: Vec<Inst> = Decoder::new(&code)
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(items[0], Inst::Simple(Opcode::iconst_m1));
        assert_eq!(
            items[1],
            Inst::Op(Opcode::iconst, Operand { value: 100, words: 1 })
        );
        assert_eq!(
            items[2],
            Inst::Prefix(Opcode::wide_short, Modifier::Wide(crate::WideKind::Short))
        );
        assert_eq!(
            items[3],
            Inst::Op(Opcode::iconst, Operand { value: 1000, words: 1 })
        );
        assert_eq!(
            items[4],
            Inst::Prefix(Opcode::wide_int, Modifier::Wide(crate::WideKind::Int))
        );
        assert_eq!(
            items[5],
            Inst::Op(Opcode::iconst, Operand { value: 100_000, words: 1 })
        );
    }

    #[test]
    fn branches_patch_backwards_and_forwards() {
        let mut a = Assembler::new();
        let top = a.label();
        let out = a.label();
        a.bind(top);
        a.op(Opcode::load, 0).unwrap();
        a.branch(Opcode::ifeq, out);
        a.branch(Opcode::goto, top);
        a.bind(out);
        a.simple(Opcode::r#return);
        let code = a.finish().unwrap();

        // ifeq at 1 jumps +4 to the return, goto at 3 jumps -3 to the top.
        assert_eq!(code[2], 4);
        assert_eq!(code[4] as i8, -3);
    }

    #[test]
    fn unbound_labels_fail_at_finish() {
        let mut a = Assembler::new();
        let l = a.label();
        a.branch(Opcode::goto, l);
        assert!(matches!(a.finish(), Err(BytecodeError::UnboundLabel(_))));
    }

    #[test]
    fn switch_offsets_are_relative_to_the_opcode() {
        let mut a = Assembler::new();
        let c0 = a.label();
        let done = a.label();
        let sw = a.here();
        a.table_switch(0, &[c0], done);
        a.bind(c0);
        a.simple(Opcode::nop);
        a.bind(done);
        a.simple(Opcode::r#return);
        let code = a.finish().unwrap();

        let (_, inst) = Decoder::new(&code).next().unwrap().unwrap();
        match inst {
            Inst::Table(t) => {
                assert_eq!(sw + t.offsets[0] as usize, 13);
                assert_eq!(sw as i64 + t.default as i64, 14);
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
