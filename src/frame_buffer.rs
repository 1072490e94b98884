//! Double-buffered frame buffer
//!
//! The CPU writes packed colors into the back frame; each write also
//! produces a render vertex `(x, y, r, g, b, a, u, v)` for the pixel.
//! A renderer thread reads the front frame. Both frames live behind one
//! mutex so a reader never observes a half-swapped pair.

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tracing::debug;

use crate::error::MemoryError;
use crate::error::MemoryErrorKind;
use crate::memory::be_word;
use crate::memory::WORD_SIZE;

/// Floats per vertex record
pub const VERTEX_FLOATS: usize = 8;
/// Bytes per vertex record
pub const VERTEX_STRIDE: usize = VERTEX_FLOATS * 4;
/// Bytes per packed pixel
pub const PIXEL_STRIDE: usize = WORD_SIZE;

/// One side of the double buffer
#[derive(Clone)]
struct Frame {
    /// Packed colors, big-endian, `PIXEL_STRIDE` bytes per pixel
    pixels: Vec<u8>,
    /// Vertex records, little-endian floats, `VERTEX_STRIDE` bytes per pixel
    vertices: Vec<u8>,
}

impl Frame {
    fn blank(pixel_count: usize) -> Self {
        Self {
            pixels: vec![0; pixel_count * PIXEL_STRIDE],
            vertices: vec![0; pixel_count * VERTEX_STRIDE],
        }
    }
}

struct Frames {
    front: Frame,
    back: Frame,
    swaps: u64,
}

/// Front/back pixel and vertex buffers sized for a `width` x `height` display
pub struct FrameBuffer {
    width: usize,
    height: usize,
    frames: Mutex<Frames>,
}

impl FrameBuffer {
    pub fn make(width: usize, height: usize) -> Self {
        let blank = Frame::blank(width * height);
        Self {
            width,
            height,
            frames: Mutex::new(Frames { front: blank.clone(), back: blank, swaps: 0 }),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Byte length of the pixel plane, which is what the bus maps
    pub fn pixel_bytes(&self) -> usize {
        self.pixel_count() * PIXEL_STRIDE
    }

    /// Byte length of the vertex plane
    pub fn vertex_bytes(&self) -> usize {
        self.pixel_count() * VERTEX_STRIDE
    }

    /// Number of swaps performed so far
    pub fn swap_count(&self) -> u64 {
        self.lock().swaps
    }

    fn lock(&self) -> MutexGuard<'_, Frames> {
        // Frames hold plain bytes; a panicked holder cannot leave them invalid
        self.frames.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes packed `0xAARRGGBB` colors into the back frame.
    ///
    /// `address` is the byte offset of the first pixel within the pixel
    /// plane and must be word aligned; consecutive colors fill consecutive
    /// pixels. An alpha byte of zero means fully opaque.
    pub fn write_pixels(&self, address: usize, colors: &[i32]) -> Result<(), MemoryError> {
        if address % PIXEL_STRIDE != 0 {
            return Err(MemoryError::AlignmentError(address as u32, PIXEL_STRIDE as u32));
        }
        let first = address / PIXEL_STRIDE;
        if first + colors.len() > self.pixel_count() {
            return Err(MemoryError::access(
                (address + colors.len() * PIXEL_STRIDE) as i64,
                MemoryErrorKind::OutOfBounds,
            ));
        }

        let mut frames = self.lock();
        let back = &mut frames.back;
        for (i, &color) in colors.iter().enumerate() {
            let index = first + i;
            let record = self.vertex_for(index, color);

            let p = index * PIXEL_STRIDE;
            back.pixels[p..p + PIXEL_STRIDE].copy_from_slice(&color.to_be_bytes());

            let v = index * VERTEX_STRIDE;
            for (k, f) in record.iter().enumerate() {
                back.vertices[v + k * 4..v + k * 4 + 4].copy_from_slice(&f.to_le_bytes());
            }
        }
        Ok(())
    }

    /// Projects pixel `index` with `color` into a vertex record
    fn vertex_for(&self, index: usize, color: i32) -> [f32; VERTEX_FLOATS] {
        let (w, h) = (self.width as f32, self.height as f32);
        let x = (index % self.width) as f32;
        let y = (index / self.width) as f32;

        let norm_x = (x / w) * 2.0 - 1.0;
        let norm_y = ((h - y) / h) * 2.0 - 1.0;

        let channel = |shift: u32| ((color >> shift) & 0xff) as f32 / 255.0;
        let alpha = match (color >> 24) & 0xff {
            0 => 1.0,
            a => a as f32 / 255.0,
        };

        [norm_x, norm_y, channel(16), channel(8), channel(0), alpha, x / w, y / h]
    }

    /// Exchanges front and back frames
    pub fn swap(&self) {
        let mut frames = self.lock();
        let Frames { front, back, swaps } = &mut *frames;
        std::mem::swap(front, back);
        *swaps += 1;
        debug!(swaps = *swaps, "frame buffer swapped");
    }

    /// Raw front pixel bytes in `[begin, end)`
    pub fn read_front_bytes(&self, begin: usize, end: usize) -> Result<Vec<u8>, MemoryError> {
        let frames = self.lock();
        check_range(begin, end, frames.front.pixels.len())?;
        Ok(frames.front.pixels[begin..end].to_vec())
    }

    /// Front pixels in the byte range `[begin, end)` as packed colors
    pub fn read_front_pixels(&self, begin: usize, end: usize) -> Result<Vec<i32>, MemoryError> {
        let frames = self.lock();
        check_range(begin, end, frames.front.pixels.len())?;
        check_multiple(begin, end, PIXEL_STRIDE)?;
        Ok(frames.front.pixels[begin..end].chunks_exact(PIXEL_STRIDE).map(be_word).collect())
    }

    /// Front vertex data in the byte range `[begin, end)` as floats
    pub fn read_front_vertices(&self, begin: usize, end: usize) -> Result<Vec<f32>, MemoryError> {
        let frames = self.lock();
        check_range(begin, end, frames.front.vertices.len())?;
        check_multiple(begin, end, 4)?;
        Ok(frames.front.vertices[begin..end]
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Whole front vertex plane, eight floats per pixel
    pub fn front_vertices(&self) -> Vec<f32> {
        let frames = self.lock();
        frames
            .front
            .vertices
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

fn check_range(begin: usize, end: usize, len: usize) -> Result<(), MemoryError> {
    if end <= begin {
        return Err(MemoryError::access(begin as i64, MemoryErrorKind::EmptyRange));
    }
    if end > len {
        return Err(MemoryError::access(end as i64, MemoryErrorKind::OutOfBounds));
    }
    Ok(())
}

fn check_multiple(begin: usize, end: usize, unit: usize) -> Result<(), MemoryError> {
    if (end - begin) % unit != 0 {
        return Err(MemoryError::access(
            begin as i64,
            MemoryErrorKind::InvalidSize(end - begin),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_lands_in_back_until_swap() {
        let fb = FrameBuffer::make(4, 2);
        fb.write_pixels(0, &[0x00ff_0000]).unwrap();

        assert_eq!(fb.read_front_pixels(0, 4).unwrap(), vec![0]);
        fb.swap();
        assert_eq!(fb.read_front_pixels(0, 4).unwrap(), vec![0x00ff_0000]);
        assert_eq!(fb.swap_count(), 1);
    }

    #[test]
    fn test_vertex_projection() {
        let fb = FrameBuffer::make(4, 2);
        // Pixel 5 sits at x = 1, y = 1
        fb.write_pixels(5 * PIXEL_STRIDE, &[0x0000_ff00]).unwrap();
        fb.swap();

        let v = fb.read_front_vertices(5 * VERTEX_STRIDE, 6 * VERTEX_STRIDE).unwrap();
        assert_eq!(v, vec![-0.5, 0.0, 0.0, 1.0, 0.0, 1.0, 0.25, 0.5]);
    }

    #[test]
    fn test_explicit_alpha() {
        let fb = FrameBuffer::make(1, 1);
        fb.write_pixels(0, &[0x3300_00ffu32 as i32]).unwrap();
        fb.swap();

        let v = fb.front_vertices();
        assert_eq!(v.len(), VERTEX_FLOATS);
        assert_eq!(v[4], 1.0);
        assert_eq!(v[5], 0x33 as f32 / 255.0);
    }

    #[test]
    fn test_swap_twice_restores() {
        let fb = FrameBuffer::make(2, 2);
        fb.write_pixels(4, &[7, 8]).unwrap();
        fb.swap();
        fb.swap();

        assert_eq!(fb.read_front_pixels(0, 16).unwrap(), vec![0, 0, 0, 0]);
        fb.swap();
        assert_eq!(fb.read_front_pixels(0, 16).unwrap(), vec![0, 7, 8, 0]);
    }

    #[test]
    fn test_bounds() {
        let fb = FrameBuffer::make(2, 2);

        assert!(matches!(fb.write_pixels(2, &[1]), Err(MemoryError::AlignmentError(2, 4))));
        assert!(fb.write_pixels(12, &[1, 2]).is_err());
        assert!(fb.read_front_bytes(0, 17).is_err());
        assert!(fb.read_front_bytes(4, 4).is_err());
        assert!(fb.read_front_vertices(0, 3).is_err());
    }

    #[test]
    fn test_reader_never_sees_torn_frame() {
        use std::sync::Arc;
        use std::thread;

        let fb = Arc::new(FrameBuffer::make(8, 8));
        let reader = {
            let fb = Arc::clone(&fb);
            thread::spawn(move || {
                for _ in 0..200 {
                    let pixels = fb.read_front_pixels(0, fb.pixel_bytes()).unwrap();
                    // Every frame is written uniformly before its swap
                    assert!(pixels.iter().all(|p| *p == pixels[0]));
                }
            })
        };

        for frame in 1..=100 {
            fb.write_pixels(0, &vec![frame; fb.pixel_count()]).unwrap();
            fb.swap();
        }
        reader.join().unwrap();
    }
}
