use std::io::{self, Read, Seek, SeekFrom};
use symphonia::core::io::MediaSource;

use crate::audio::transcode::PcmStream;

const CHUNK_SAMPLES: usize = 4096;

/// Converts the transcoder's s16le byte stream into the f32le samples
/// expected by `songbird::input::RawAdapter`.
pub struct S16ToF32Source {
    inner: PcmStream,
    raw: Vec<u8>,
    carry: Option<u8>,
    converted: Vec<u8>,
    pos: usize,
}

impl S16ToF32Source {
    pub fn new(inner: PcmStream) -> Self {
        Self {
            inner,
            raw: vec![0; CHUNK_SAMPLES * 2],
            carry: None,
            converted: Vec::with_capacity(CHUNK_SAMPLES * 4),
            pos: 0,
        }
    }

    /// Refills `converted`. Returns false on end of stream.
    fn fill(&mut self) -> io::Result<bool> {
        self.converted.clear();
        self.pos = 0;

        loop {
            let offset = match self.carry.take() {
                Some(byte) => {
                    self.raw[0] = byte;
                    1
                }
                None => 0,
            };

            let n = self.inner.read(&mut self.raw[offset..])?;
            if n == 0 {
                // A dangling odd byte at EOF is not a full sample.
                return Ok(false);
            }

            let total = offset + n;
            for sample in self.raw[..total - total % 2].chunks_exact(2) {
                let value = i16::from_le_bytes([sample[0], sample[1]]) as f32 / 32768.0;
                self.converted.extend_from_slice(&value.to_le_bytes());
            }
            if total % 2 == 1 {
                self.carry = Some(self.raw[total - 1]);
            }

            if !self.converted.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl Read for S16ToF32Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.converted.len() && !self.fill()? {
            return Ok(0);
        }

        let available = &self.converted[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for S16ToF32Source {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "live PCM stream is not seekable",
        ))
    }
}

impl MediaSource for S16ToF32Source {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
