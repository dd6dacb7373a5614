//! Bounded clip storage
//!
//! One clip is in flight per interaction cycle: captured bytes go in at the
//! front, the codec and the playback device stream them back out. Capacity
//! is fixed when capture begins and appends past it are dropped, so a clip
//! can never outgrow its reservation. Bytes live either wholly in RAM or in
//! a spooled temp file; both backings expose the same interface.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::audio::wav::{self, WavSpec};
use crate::{Error, Result};

/// Where clip bytes live while a cycle is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipBacking {
    /// Whole clip in RAM; lowest latency, bounded by free heap
    #[default]
    Memory,
    /// Clip streamed through a temp file; near-constant RAM, adds seek
    /// latency to every chunk read
    Spooled,
}

enum Storage {
    Memory(Vec<u8>),
    Spooled(NamedTempFile),
}

/// Write side of a clip, open between capture start and finalize
pub struct CaptureBuffer {
    storage: Storage,
    capacity: usize,
    len: usize,
    spec: WavSpec,
}

impl CaptureBuffer {
    /// Preallocate storage for `max_duration` of mono audio.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfMemory` if the RAM backing cannot reserve the
    /// full capacity, or `Error::Storage` if the spool file cannot be
    /// created.
    pub fn begin_capture(
        backing: ClipBacking,
        max_duration: Duration,
        sample_rate: u32,
        bits_per_sample: u16,
        spool_dir: &Path,
    ) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample,
        };
        #[allow(clippy::cast_possible_truncation)]
        let capacity = (u128::from(sample_rate)
            * u128::from(bits_per_sample / 8)
            * max_duration.as_millis()
            / 1000) as usize;

        let storage = match backing {
            ClipBacking::Memory => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(capacity)
                    .map_err(|_| Error::OutOfMemory(format!("capture buffer of {capacity} bytes")))?;
                Storage::Memory(buf)
            }
            ClipBacking::Spooled => {
                let mut file = tempfile::Builder::new()
                    .prefix("chime-clip-")
                    .suffix(".wav")
                    .tempfile_in(spool_dir)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                // length is unknown until finalize; header gets patched there
                wav::write_placeholder(file.as_file_mut())?;
                Storage::Spooled(file)
            }
        };

        tracing::debug!(capacity, ?backing, sample_rate, "capture buffer ready");

        Ok(Self {
            storage,
            capacity,
            len: 0,
            spec,
        })
    }

    /// Append bytes sequentially, dropping whatever exceeds capacity.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the spool write fails.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let take = bytes.len().min(self.capacity - self.len);
        if take < bytes.len() {
            tracing::warn!(dropped = bytes.len() - take, "capture buffer full");
        }
        if take == 0 {
            return Ok(());
        }
        match &mut self.storage {
            Storage::Memory(buf) => buf.extend_from_slice(&bytes[..take]),
            Storage::Spooled(file) => file
                .as_file_mut()
                .write_all(&bytes[..take])
                .map_err(|e| Error::Storage(e.to_string()))?,
        }
        self.len += take;
        Ok(())
    }

    /// Bytes written so far
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written yet
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity ceiling fixed at capture start
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sample layout of the audio being captured
    #[must_use]
    pub const fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Close the write path and freeze the clip.
    ///
    /// Spooled clips get their container header patched with the final
    /// length here (the second pass).
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if patching the spool header fails.
    pub fn finalize(self) -> Result<AudioClip> {
        let Self {
            storage, len, spec, ..
        } = self;
        let storage = match storage {
            Storage::Memory(buf) => Storage::Memory(buf),
            Storage::Spooled(mut file) => {
                let f = file.as_file_mut();
                #[allow(clippy::cast_possible_truncation)]
                wav::patch_header(f, spec, len as u32)?;
                f.flush().map_err(|e| Error::Storage(e.to_string()))?;
                Storage::Spooled(file)
            }
        };
        tracing::debug!(len, "clip finalized");
        Ok(AudioClip { spec, len, storage })
    }
}

/// A finalized clip: known length, read-only, released exactly once.
///
/// `release` consumes the clip, so double-release and read-after-release do
/// not compile; dropping an unreleased clip still removes any spool file.
pub struct AudioClip {
    spec: WavSpec,
    len: usize,
    storage: Storage,
}

impl AudioClip {
    /// Wrap an already-decoded PCM payload, e.g. a synthesis response.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfMemory` if the clip buffer cannot be reserved.
    pub fn from_pcm(bytes: &[u8], spec: WavSpec) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(bytes.len())
            .map_err(|_| Error::OutOfMemory(format!("clip buffer of {} bytes", bytes.len())))?;
        buf.extend_from_slice(bytes);
        Ok(Self {
            spec,
            len: bytes.len(),
            storage: Storage::Memory(buf),
        })
    }

    /// Final byte length of the clip
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the clip holds no audio
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sample layout of the clip
    #[must_use]
    pub const fn spec(&self) -> WavSpec {
        self.spec
    }

    /// Path of the spool file, if this clip is file-backed
    #[must_use]
    pub fn spool_path(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Memory(_) => None,
            Storage::Spooled(file) => Some(file.path()),
        }
    }

    /// Read up to `max_len` bytes starting at `offset`.
    ///
    /// Returns an empty chunk once `offset` reaches the clip length.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the spool read fails.
    pub fn read_chunk(&mut self, offset: usize, max_len: usize) -> Result<Vec<u8>> {
        let take = max_len.min(self.len.saturating_sub(offset));
        if take == 0 {
            return Ok(Vec::new());
        }
        match &mut self.storage {
            Storage::Memory(buf) => Ok(buf[offset..offset + take].to_vec()),
            Storage::Spooled(file) => {
                let f = file.as_file_mut();
                f.seek(SeekFrom::Start((wav::HEADER_LEN + offset) as u64))
                    .map_err(|e| Error::Storage(e.to_string()))?;
                let mut chunk = vec![0u8; take];
                f.read_exact(&mut chunk)
                    .map_err(|e| Error::Storage(e.to_string()))?;
                Ok(chunk)
            }
        }
    }

    /// Free the clip's storage: drop the RAM buffer or remove the spool file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if removing the spool file fails.
    pub fn release(self) -> Result<()> {
        match self.storage {
            Storage::Memory(_) => Ok(()),
            Storage::Spooled(file) => {
                let path = file.path().to_path_buf();
                file.close().map_err(|e| Error::Storage(e.to_string()))?;
                tracing::debug!(path = %path.display(), "spool file removed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    const BITS: u16 = 16;

    fn begin(backing: ClipBacking, ms: u64) -> CaptureBuffer {
        CaptureBuffer::begin_capture(
            backing,
            Duration::from_millis(ms),
            RATE,
            BITS,
            &std::env::temp_dir(),
        )
        .unwrap()
    }

    #[test]
    fn capacity_from_duration() {
        // 16 kHz * 2 bytes * 5 s
        assert_eq!(begin(ClipBacking::Memory, 5000).capacity(), 160_000);
    }

    #[test]
    fn append_truncates_at_capacity() {
        let mut buffer = begin(ClipBacking::Memory, 1);
        assert_eq!(buffer.capacity(), 32);
        buffer.append(&[1u8; 20]).unwrap();
        buffer.append(&[2u8; 20]).unwrap();
        assert_eq!(buffer.len(), 32);
        buffer.append(&[3u8; 8]).unwrap();
        assert_eq!(buffer.len(), 32);

        let mut clip = buffer.finalize().unwrap();
        let bytes = clip.read_chunk(0, 64).unwrap();
        assert_eq!(&bytes[..20], &[1u8; 20]);
        assert_eq!(&bytes[20..], &[2u8; 12]);
    }

    #[test]
    fn oversized_reservation_is_out_of_memory() {
        let result = CaptureBuffer::begin_capture(
            ClipBacking::Memory,
            Duration::from_secs(400_000_000_000_000),
            RATE,
            BITS,
            &std::env::temp_dir(),
        );
        assert!(matches!(result, Err(Error::OutOfMemory(_))));
    }

    #[test]
    fn read_chunk_windows() {
        let mut buffer = begin(ClipBacking::Memory, 10);
        buffer.append(&[7u8; 100]).unwrap();
        let mut clip = buffer.finalize().unwrap();
        assert_eq!(clip.len(), 100);
        assert_eq!(clip.read_chunk(0, 64).unwrap().len(), 64);
        assert_eq!(clip.read_chunk(64, 64).unwrap().len(), 36);
        assert!(clip.read_chunk(100, 64).unwrap().is_empty());
    }

    #[test]
    fn spooled_clip_round_trip() {
        let mut buffer = begin(ClipBacking::Spooled, 10);
        let payload: Vec<u8> = (0..200u16).map(|i| (i % 251) as u8).collect();
        buffer.append(&payload).unwrap();
        let mut clip = buffer.finalize().unwrap();

        // the spool file holds a valid container with the patched length
        let path = clip.spool_path().unwrap().to_path_buf();
        let mut file = std::fs::File::open(&path).unwrap();
        let (spec, data_len) = wav::read_header(&mut file).unwrap();
        assert_eq!(spec.sample_rate, RATE);
        assert_eq!(data_len as usize, payload.len());

        // chunk reads see the payload, not the header
        let mut out = Vec::new();
        let mut offset = 0;
        loop {
            let chunk = clip.read_chunk(offset, 33).unwrap();
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len();
            out.extend_from_slice(&chunk);
        }
        assert_eq!(out, payload);

        clip.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn empty_clip_reports_empty() {
        let buffer = begin(ClipBacking::Memory, 10);
        let clip = buffer.finalize().unwrap();
        assert!(clip.is_empty());
    }

    #[test]
    fn from_pcm_keeps_spec() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 24_000,
            bits_per_sample: 16,
        };
        let mut clip = AudioClip::from_pcm(&[1, 2, 3, 4], spec).unwrap();
        assert_eq!(clip.spec(), spec);
        assert_eq!(clip.read_chunk(0, 16).unwrap(), vec![1, 2, 3, 4]);
        clip.release().unwrap();
    }
}
