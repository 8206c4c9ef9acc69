//! Bounded bit buffer used as the shift register behind delay lines.
//!
//! Bits are packed into `u64` words. The buffer never grows: writes and reads
//! outside `0..capacity` fail with [`BitBufferError::OutOfRange`].

use serde::{Deserialize, Serialize};

const WORD_BITS: usize = 64;

/// Errors from bit buffer access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BitBufferError {
    #[error("bit offset {offset} is outside buffer capacity {capacity}")]
    OutOfRange { offset: usize, capacity: usize },
}

/// A fixed-capacity ring of bits.
///
/// [`push`](BitBuffer::push) writes at the head and advances it;
/// [`read_back`](BitBuffer::read_back) reads relative to the most recent write,
/// so `read_back(0)` is the bit just pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitBuffer {
    words: Vec<u64>,
    capacity: usize,
    head: usize,
}

impl BitBuffer {
    /// Create a zeroed buffer holding `capacity` bits. A capacity of zero is
    /// raised to one so the ring always has a slot to write.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            words: vec![0; capacity.div_ceil(WORD_BITS)],
            capacity,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read the bit at an absolute slot.
    pub fn get(&self, index: usize) -> Result<bool, BitBufferError> {
        self.check(index)?;
        Ok(self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0)
    }

    /// Write the bit at an absolute slot.
    pub fn set(&mut self, index: usize, bit: bool) -> Result<(), BitBufferError> {
        self.check(index)?;
        let mask = 1u64 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if bit {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        Ok(())
    }

    /// Shift one bit in at the head.
    pub fn push(&mut self, bit: bool) {
        let head = self.head;
        let mask = 1u64 << (head % WORD_BITS);
        let word = &mut self.words[head / WORD_BITS];
        if bit {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        self.head = (head + 1) % self.capacity;
    }

    /// Read the bit written `offset` pushes before the most recent one.
    pub fn read_back(&self, offset: usize) -> Result<bool, BitBufferError> {
        self.check(offset)?;
        let index = (self.head + 2 * self.capacity - 1 - offset) % self.capacity;
        self.get(index)
    }

    /// Zero every bit and rewind the head.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.head = 0;
    }

    fn check(&self, offset: usize) -> Result<(), BitBufferError> {
        if offset >= self.capacity {
            return Err(BitBufferError::OutOfRange {
                offset,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}
