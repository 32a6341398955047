//! Word-level value model.
//!
//! The operand stack and local variables hold 32-bit words. `long` and
//! `double` values occupy two words, low word first. Object references are
//! word-sized handles; 0 is the null reference.

/// One stack or local slot.
pub type Word = i32;

/// A heap object handle. 0 is null.
pub type ObjRef = Word;

/// The null reference.
pub const NULL: ObjRef = 0;

/// Split a `long` into (low, high) words. The low word is pushed first.
pub fn long_words(v: i64) -> (Word, Word) {
    (v as Word, (v >> 32) as Word)
}

/// Rebuild a `long` from its (low, high) words.
pub fn long_from(lo: Word, hi: Word) -> i64 {
    ((hi as i64) << 32) | (lo as u32 as i64)
}

/// The word holding an `f32` literal.
pub fn float_word(v: f32) -> Word {
    v.to_bits() as Word
}

/// Rebuild an `f64` from its (low, high) words.
pub fn double_from(lo: Word, hi: Word) -> f64 {
    f64::from_bits(long_from(lo, hi) as u64)
}
