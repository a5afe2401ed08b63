//! Reading fixed-width fields out of concatenated entries.
use bytes::{Buf, Bytes};

use crate::error::{Error, Result};

/// A cursor over a log. Slices share the underlying buffer.
#[derive(Debug, Clone)]
pub struct Parser {
    data: Bytes,
    position: usize,
}

impl Parser {
    pub fn new<B: Into<Bytes>>(data: B) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn next(&mut self, length: usize) -> Result<Bytes> {
        if self.remaining() < length {
            return Err(Error::Truncated);
        }

        let chunk = self.data.slice(self.position..self.position + length);
        self.position += length;
        Ok(chunk)
    }

    pub fn next_u8(&mut self) -> Result<u8> {
        Ok(self.next(1)?.get_u8())
    }

    /// Counts are two bytes, big-endian.
    pub fn next_u16(&mut self) -> Result<u16> {
        Ok(self.next(2)?.get_u16())
    }

    pub fn next_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        self.next(N)?.copy_to_slice(&mut array);
        Ok(array)
    }

    /// Everything consumed since `start`.
    pub fn since(&self, start: usize) -> Bytes {
        self.data.slice(start..self.position)
    }

    pub fn rest(&mut self) -> Bytes {
        let rest = self.data.slice(self.position..);
        self.position = self.data.len();
        rest
    }
}
