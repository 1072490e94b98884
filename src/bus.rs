//! Memory-mapped bus
//!
//! The address space is split once at construction:
//!
//! ```text
//! [0, M)              main memory
//! [M, M + 4)          swap control (write-only)
//! [M + 4, M + 4 + P)  frame buffer pixels, one packed color per word
//! ```
//!
//! where `M` is the memory size and `P` the frame buffer pixel plane size.

use std::sync::Arc;

use tracing::trace;

use crate::error::MemoryError;
use crate::error::MemoryErrorKind;
use crate::error::SimulatorError;
use crate::error::SimulatorResult;
use crate::frame_buffer::FrameBuffer;
use crate::memory::be_word;
use crate::memory::Memory;
use crate::memory::WORD_SIZE;

/// Bytes reserved for the swap trigger at the start of the frame buffer region
pub const SWAP_CONTROL_BYTES: u32 = 4;

/// Where an address lands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// Offset into main memory
    Memory(usize),
    /// Inside the swap control word
    SwapControl,
    /// Byte offset into the frame buffer pixel plane
    Pixels(usize),
}

/// Static partition of the address space
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressMap {
    /// First address past main memory, also the frame buffer base
    pub memory_end: u32,
    /// First address past the frame buffer region
    pub end: u32,
}

impl AddressMap {
    pub fn frame_buffer_base(&self) -> u32 {
        self.memory_end
    }

    /// First address of the pixel plane
    pub fn pixel_base(&self) -> u32 {
        self.memory_end + SWAP_CONTROL_BYTES
    }

    /// Resolves a single address
    pub fn resolve(&self, address: u32) -> Result<Region, MemoryError> {
        if address < self.memory_end {
            Ok(Region::Memory(address as usize))
        } else if address < self.pixel_base() {
            Ok(Region::SwapControl)
        } else if address < self.end {
            Ok(Region::Pixels((address - self.pixel_base()) as usize))
        } else {
            Err(MemoryError::access(address, MemoryErrorKind::Unmapped))
        }
    }
}

/// Routes reads and writes to memory or the frame buffer
pub struct Bus {
    map: AddressMap,
    memory: Memory,
    frame_buffer: Arc<FrameBuffer>,
}

impl Bus {
    pub fn make(memory: Memory, frame_buffer: Arc<FrameBuffer>) -> SimulatorResult<Self> {
        let total = memory.size() as u64
            + SWAP_CONTROL_BYTES as u64
            + frame_buffer.pixel_bytes() as u64;
        if total > u32::MAX as u64 {
            return Err(SimulatorError::ConfigError(format!(
                "address space of {total:#x} bytes does not fit in 32 bits"
            )));
        }
        let map = AddressMap { memory_end: memory.size() as u32, end: total as u32 };
        Ok(Self { map, memory, frame_buffer })
    }

    pub fn map(&self) -> AddressMap {
        self.map
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.frame_buffer
    }

    /// Writes raw bytes. Frame buffer writes must be whole words.
    pub fn write(&mut self, address: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        match self.map.resolve(address)? {
            Region::Memory(pos) => self.memory.write(pos, bytes),
            Region::SwapControl => {
                self.swap(address);
                Ok(())
            }
            Region::Pixels(offset) => {
                if bytes.len() % WORD_SIZE != 0 {
                    return Err(MemoryError::access(
                        address,
                        MemoryErrorKind::InvalidSize(bytes.len()),
                    ));
                }
                let colors: Vec<i32> = bytes.chunks_exact(WORD_SIZE).map(be_word).collect();
                self.frame_buffer.write_pixels(offset, &colors)
            }
        }
    }

    /// Writes whole words; each one is a packed color in the frame buffer region
    pub fn write_words(&mut self, address: u32, words: &[i32]) -> Result<(), MemoryError> {
        match self.map.resolve(address)? {
            Region::Memory(pos) => self.memory.write_words(pos, words),
            Region::SwapControl => {
                self.swap(address);
                Ok(())
            }
            Region::Pixels(offset) => self.frame_buffer.write_pixels(offset, words),
        }
    }

    fn swap(&self, address: u32) {
        trace!("swap requested at {address:#010x}");
        self.frame_buffer.swap();
    }

    /// Reads the bytes in `[begin, end)`; the range must stay inside one store
    pub fn read(&self, begin: u32, end: u32) -> Result<Vec<u8>, MemoryError> {
        if end <= begin {
            return Err(MemoryError::access(begin, MemoryErrorKind::EmptyRange));
        }
        let last = end - 1;
        match (self.map.resolve(begin)?, self.map.resolve(last)?) {
            (Region::Memory(b), Region::Memory(_)) => {
                Ok(self.memory.read(b, end as usize)?.to_vec())
            }
            (Region::Pixels(b), Region::Pixels(l)) => {
                self.frame_buffer.read_front_bytes(b, l + 1)
            }
            (Region::SwapControl, _) | (_, Region::SwapControl) => {
                Err(MemoryError::access(begin, MemoryErrorKind::Unmapped))
            }
            _ => Err(MemoryError::access(begin, MemoryErrorKind::StraddlesRegions)),
        }
    }

    /// Reads the big-endian word at `address`
    pub fn read_word(&self, address: u32) -> Result<i32, MemoryError> {
        let end = address
            .checked_add(WORD_SIZE as u32)
            .ok_or_else(|| MemoryError::access(address, MemoryErrorKind::Unmapped))?;
        Ok(be_word(&self.read(address, end)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMORY_SIZE: usize = 64;

    fn bus() -> Bus {
        Bus::make(Memory::make(MEMORY_SIZE), Arc::new(FrameBuffer::make(2, 2))).unwrap()
    }

    #[test]
    fn test_layout() {
        let bus = bus();
        let map = bus.map();

        assert_eq!(map.frame_buffer_base(), 64);
        assert_eq!(map.pixel_base(), 68);
        assert_eq!(map.end, 68 + 16);
        assert_eq!(map.resolve(63).unwrap(), Region::Memory(63));
        assert_eq!(map.resolve(66).unwrap(), Region::SwapControl);
        assert_eq!(map.resolve(72).unwrap(), Region::Pixels(4));
    }

    #[test]
    fn test_memory_round_trip() {
        let mut bus = bus();
        bus.write_words(8, &[0x1234_5678, -2]).unwrap();

        assert_eq!(bus.read_word(8).unwrap(), 0x1234_5678);
        assert_eq!(bus.read_word(12).unwrap(), -2);
        assert_eq!(bus.read(8, 10).unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn test_swap_trigger_publishes_back_buffer() {
        let mut bus = bus();
        let base = bus.map().pixel_base();
        bus.write_words(base, &[0x00aa_bbcc, 0x0011_2233]).unwrap();

        // Not yet visible
        assert_eq!(bus.read(base, base + 8).unwrap(), vec![0; 8]);

        // Payload of a swap write is ignored
        bus.write_words(bus.map().frame_buffer_base(), &[12345]).unwrap();

        assert_eq!(
            bus.frame_buffer().read_front_pixels(0, 8).unwrap(),
            vec![0x00aa_bbcc, 0x0011_2233]
        );
        assert_eq!(bus.read_word(base + 4).unwrap(), 0x0011_2233);
    }

    #[test]
    fn test_byte_writes_to_pixels() {
        let mut bus = bus();
        let base = bus.map().pixel_base();

        bus.write(base + 4, &[0, 1, 2, 3]).unwrap();
        assert!(matches!(
            bus.write(base, &[1]),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::InvalidSize(1), .. })
        ));
        bus.frame_buffer().swap();
        assert_eq!(bus.frame_buffer().read_front_pixels(4, 8).unwrap(), vec![0x0001_0203]);
    }

    #[test]
    fn test_addressing_errors() {
        let mut bus = bus();
        let end = bus.map().end;

        for address in [u32::MAX, end, end + 1] {
            assert!(matches!(
                bus.write(address, &[0; 4]),
                Err(MemoryError::AccessError { kind: MemoryErrorKind::Unmapped, .. })
            ));
            assert!(bus.read_word(address).is_err());
        }
        // Memory writes may not spill into the frame buffer
        assert!(matches!(
            bus.write(62, &[0; 4]),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::Overflow, .. })
        ));
    }

    #[test]
    fn test_straddling_read() {
        let bus = bus();

        assert!(matches!(
            bus.read(60, 72),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::StraddlesRegions, .. })
        ));
        // The swap word is write-only
        assert!(matches!(
            bus.read(62, 66),
            Err(MemoryError::AccessError { kind: MemoryErrorKind::Unmapped, .. })
        ));
        assert!(bus.read(8, 8).is_err());
    }
}
