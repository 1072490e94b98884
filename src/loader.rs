//! Utility functions for reading program files and placing them in memory

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::bus::Bus;
use crate::error::LoaderError;
use crate::error::SimulatorResult;
use crate::memory::be_word;
use crate::memory::WORD_SIZE;

/// Reads a program file, choosing the format by extension
///
/// `.bin` files hold big-endian 32-bit words. `.txt` files hold one word
/// per line: a sign character (`0` for positive) followed by the
/// magnitude in binary.
pub fn load_program(path: &Path) -> SimulatorResult<Vec<i32>> {
    let words = match path.extension().and_then(|ext| ext.to_str()) {
        Some("bin") => parse_bin(&read_file(path)?),
        Some("txt") => {
            let bytes = read_file(path)?;
            parse_txt(path, &String::from_utf8_lossy(&bytes))?
        }
        _ => return Err(LoaderError::UnsupportedExtension(path.to_path_buf()).into()),
    };

    debug!("loaded {} words from {}", words.len(), path.display());
    Ok(words)
}

/// Writes the program at address 0
pub fn write_program(bus: &mut Bus, words: &[i32]) -> SimulatorResult<()> {
    bus.write_words(0, words)?;
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoaderError> {
    fs::read(path).map_err(|e| LoaderError::FileReadError(path.to_path_buf(), e))
}

/// Splits raw bytes into big-endian words; a trailing partial word is dropped
pub fn parse_bin(bytes: &[u8]) -> Vec<i32> {
    bytes.chunks_exact(WORD_SIZE).map(be_word).collect()
}

/// Parses sign-prefixed binary lines
pub fn parse_txt(path: &Path, text: &str) -> Result<Vec<i32>, LoaderError> {
    let mut words = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let line = line.trim();
        // Skip empty lines
        if line.is_empty() {
            continue;
        }

        let parse_error =
            |msg: String| LoaderError::ParseError(path.to_path_buf(), line_num + 1, msg);

        let mut chars = line.chars();
        let sign = chars.next().ok_or_else(|| parse_error("missing sign bit".into()))?;
        let magnitude = chars.as_str();
        if magnitude.is_empty() || !magnitude.chars().all(|c| c == '0' || c == '1') {
            return Err(parse_error(format!("expected binary digits after the sign, got '{line}'")));
        }

        let signed = if sign == '0' {
            magnitude.to_string()
        } else {
            format!("-{magnitude}")
        };
        let word = i32::from_str_radix(&signed, 2)
            .map_err(|e| parse_error(format!("'{line}' does not fit in 32 bits: {e}")))?;
        words.push(word);
    }

    Ok(words)
}
