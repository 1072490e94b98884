//! Flat main memory
//!
//! Every address in `[0, size)` is valid; anything past the end is an
//! error rather than a wraparound. Words are stored big-endian.

use crate::error::MemoryError;
use crate::error::MemoryErrorKind;

/// Bytes per word
pub const WORD_SIZE: usize = 4;

/// Byte-addressable store of fixed size
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    /// Make a zeroed memory of `size` bytes
    pub fn make(size: usize) -> Self {
        Self { data: vec![0; size] }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Writes `bytes` starting at `pos`.
    /// Nothing is written if the run would pass the end.
    pub fn write(&mut self, pos: usize, bytes: &[u8]) -> Result<(), MemoryError> {
        let end = pos.checked_add(bytes.len()).ok_or_else(|| {
            MemoryError::access(pos as i64, MemoryErrorKind::Overflow)
        })?;
        if end > self.data.len() {
            // Report the first byte that does not fit
            let first_bad = pos.max(self.data.len());
            return Err(MemoryError::access(
                first_bad as i64,
                MemoryErrorKind::Overflow,
            ));
        }
        self.data[pos..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Writes a 32-bit value as four big-endian bytes
    pub fn write_word(&mut self, pos: usize, value: i32) -> Result<(), MemoryError> {
        self.write(pos, &value.to_be_bytes())
    }

    /// Writes consecutive words starting at `pos`
    pub fn write_words(&mut self, pos: usize, values: &[i32]) -> Result<(), MemoryError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write(pos, &bytes)
    }

    /// Returns the bytes in `[begin, end)`
    pub fn read(&self, begin: usize, end: usize) -> Result<&[u8], MemoryError> {
        self.check_range(begin, end)?;
        Ok(&self.data[begin..end])
    }

    /// Returns the range `[begin, end)` decoded as big-endian words.
    /// A trailing partial word is an error.
    pub fn read_as_words(&self, begin: usize, end: usize) -> Result<Vec<i32>, MemoryError> {
        let bytes = self.read(begin, end)?;
        if bytes.len() % WORD_SIZE != 0 {
            return Err(MemoryError::access(
                begin as i64,
                MemoryErrorKind::InvalidSize(bytes.len()),
            ));
        }
        Ok(bytes.chunks_exact(WORD_SIZE).map(be_word).collect())
    }

    /// Reads the big-endian word at `pos`
    pub fn read_word(&self, pos: usize) -> Result<i32, MemoryError> {
        let end = pos.checked_add(WORD_SIZE).ok_or_else(|| {
            MemoryError::access(pos as i64, MemoryErrorKind::OutOfBounds)
        })?;
        Ok(be_word(self.read(pos, end)?))
    }

    fn check_range(&self, begin: usize, end: usize) -> Result<(), MemoryError> {
        if end <= begin {
            return Err(MemoryError::access(begin as i64, MemoryErrorKind::EmptyRange));
        }
        if end > self.data.len() {
            return Err(MemoryError::access(end as i64, MemoryErrorKind::OutOfBounds));
        }
        Ok(())
    }
}

/// Assembles up to four bytes, most significant first
pub(crate) fn be_word(bytes: &[u8]) -> i32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut memory = Memory::make(1024);
        let s: &[u8] = b"Birds aren't real";

        memory.write(10, s).unwrap();

        assert_eq!(memory.read(10, 10 + s.len()).unwrap(), s);
        // Untouched bytes stay zero
        assert_eq!(memory.read(0, 10).unwrap(), &[0; 10]);
    }

    #[test]
    fn test_write_word_is_big_endian() {
        let mut memory = Memory::make(16);
        memory.write_word(4, 0x0102_0304).unwrap();

        assert_eq!(memory.read(4, 8).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(memory.read_word(4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_negative_word_survives() {
        let mut memory = Memory::make(8);
        memory.write_words(0, &[-1, i32::MIN]).unwrap();

        assert_eq!(memory.read_as_words(0, 8).unwrap(), vec![-1, i32::MIN]);
    }

    #[test]
    fn test_write_past_end_overflows() {
        let mut memory = Memory::make(8);
        let err = memory.write(6, &[1, 2, 3]).unwrap_err();

        assert!(matches!(
            err,
            MemoryError::AccessError { address: 8, kind: MemoryErrorKind::Overflow }
        ));
        // Nothing partially written
        assert_eq!(memory.read(6, 8).unwrap(), &[0, 0]);
    }

    #[test]
    fn test_read_bounds() {
        let memory = Memory::make(1024);

        assert!(memory.read(0, 1024).is_ok());
        assert!(matches!(
            memory.read(0, 1025),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::OutOfBounds, .. })
        ));
        assert!(matches!(
            memory.read(5, 5),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::EmptyRange, .. })
        ));
        assert!(memory.read_word(1021).is_err());
    }

    #[test]
    fn test_read_as_words_rejects_partial_word() {
        let memory = Memory::make(16);
        assert!(matches!(
            memory.read_as_words(0, 6),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::InvalidSize(6), .. })
        ));
    }
}
