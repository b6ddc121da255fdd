//! Bounded-buffer character source over any `Read`

use crate::error::{CompilerError, Result};
use std::io::Read;

/// Reads markup in chunks of at most `buffer_size` bytes and hands out
/// decoded text. Multi-byte characters split by a chunk edge are held back
/// until the rest of their bytes arrive.
pub struct ChunkedReader<R: Read> {
    inner: R,
    buffer: Vec<u8>,
    pending: Vec<u8>,
    finished: bool,
}

impl<R: Read> ChunkedReader<R> {
    pub fn new(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buffer: vec![0; buffer_size.max(1)],
            pending: Vec::new(),
            finished: false,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Next piece of decoded text, or `None` at end of input.
    pub fn next_chunk(&mut self) -> Result<Option<String>> {
        while !self.finished {
            let read = match self.inner.read(&mut self.buffer) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if read == 0 {
                self.finished = true;
                if !self.pending.is_empty() {
                    return Err(CompilerError::InvalidFormat {
                        message: "Input ends inside a UTF-8 sequence".to_string(),
                    });
                }
                break;
            }

            self.pending.extend_from_slice(&self.buffer[..read]);
            let decoded = self.take_decoded()?;
            if !decoded.is_empty() {
                return Ok(Some(decoded));
            }
        }
        Ok(None)
    }

    fn take_decoded(&mut self) -> Result<String> {
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(CompilerError::InvalidFormat {
                    message: format!("Invalid UTF-8 in input: {}", e),
                })
            }
        };
        let rest = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, rest);
        String::from_utf8(complete).map_err(|e| CompilerError::InvalidFormat {
            message: format!("Invalid UTF-8 in input: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &[u8], buffer_size: usize) -> Result<Vec<String>> {
        let mut reader = ChunkedReader::new(input, buffer_size);
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk()? {
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    #[test]
    fn test_chunks_respect_buffer_size() {
        let chunks = read_all(b"abcdefg", 3).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "g"]);
    }

    #[test]
    fn test_multibyte_character_across_chunks() {
        let text = "añb€c";
        for size in 1..=8 {
            let chunks = read_all(text.as_bytes(), size).unwrap();
            assert_eq!(chunks.concat(), text, "buffer size {}", size);
        }
    }

    #[test]
    fn test_truncated_sequence_is_an_error() {
        let bytes = &"€".as_bytes()[..2];
        assert!(read_all(bytes, 4).is_err());
    }

    #[test]
    fn test_invalid_bytes_are_an_error() {
        assert!(read_all(&[b'a', 0xff, b'b'], 8).is_err());
    }

    #[test]
    fn test_zero_buffer_size_is_clamped() {
        let reader = ChunkedReader::new(&b"x"[..], 0);
        assert_eq!(reader.buffer_size(), 1);
    }
}
