use crate::error::{BytecodeError, Result};

/// A cursor for reading instruction operands out of a method body.
///
/// All multi-byte operands are big-endian.
pub struct CodeReader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> CodeReader<'a> {
    /// Create a reader positioned at `pos`.
    pub fn new(code: &'a [u8], pos: usize) -> Self {
        Self { code, pos }
    }

    /// Current byte position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes consumed since `from`.
    pub fn consumed(&self, from: usize) -> usize {
        self.pos - from
    }

    /// Bytes left before the end of the code array.
    pub fn remaining(&self) -> usize {
        self.code.len().saturating_sub(self.pos)
    }

    /// Utility method to read `S` bytes from the code array.
    pub fn fetch<const S: usize>(&mut self) -> Result<[u8; S]> {
        let end = self
            .pos
            .checked_add(S)
            .ok_or(BytecodeError::TruncatedCode(self.pos))?;
        let slice = self
            .code
            .get(self.pos..end)
            .ok_or(BytecodeError::TruncatedCode(self.pos))?;
        let mut w = [0; S];
        w.copy_from_slice(slice);
        self.pos = end;
        Ok(w)
    }

    /// Read an unsigned byte.
    pub fn fetch_u1(&mut self) -> Result<u8> {
        Ok(self.fetch::<1>()?[0])
    }

    /// Read a signed byte.
    pub fn fetch_i1(&mut self) -> Result<i8> {
        Ok(self.fetch::<1>()?[0] as i8)
    }

    /// Read an unsigned 2-byte integer.
    pub fn fetch_u2(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.fetch::<2>()?))
    }

    /// Read a signed 2-byte integer.
    pub fn fetch_i2(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.fetch::<2>()?))
    }

    /// Read a signed 4-byte integer.
    pub fn fetch_i4(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.fetch::<4>()?))
    }

    /// Read a signed 8-byte integer.
    pub fn fetch_i8(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.fetch::<8>()?))
    }
}

/// The writing counterpart of [`CodeReader`], used by the encoder and the
/// assembler.
#[derive(Default)]
pub struct CodeWriter {
    buf: Vec<u8>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current output position.
    pub fn pos(&self) -> usize {
        self.buf.len()
    }

    pub fn put_u1(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_i1(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn put_u2(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i2(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i4(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i8(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Overwrite a previously written byte. Used for branch patching.
    pub fn patch_u1(&mut self, at: usize, v: u8) {
        self.buf[at] = v;
    }

    /// Overwrite a previously written 2-byte slot. Used for switch patching.
    pub fn patch_i2(&mut self, at: usize, v: i16) {
        self.buf[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
