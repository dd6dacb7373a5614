//! Fixed 44-byte linear-PCM container header
//!
//! Clips move between storage, the cloud stages and the playback device as
//! 16-bit mono PCM wrapped in the classic RIFF/WAVE/fmt/data layout. The
//! header is written in one pass when the payload length is known up front,
//! or as a zeroed placeholder that gets patched once capture finishes.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{Error, Result};

/// Total header size in bytes
pub const HEADER_LEN: usize = 44;

/// RIFF chunk size overhead (header minus the first 8 bytes)
const CHUNK_OVERHEAD: u32 = 36;

/// `fmt ` sub-chunk payload size for plain PCM
const FMT_CHUNK_LEN: u32 = 16;

/// Audio format tag for uncompressed PCM
const PCM_FORMAT: u16 = 1;

/// Sample layout of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Bytes per sample frame across all channels
    #[must_use]
    pub const fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Bytes per second of audio
    #[must_use]
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }
}

/// Write a complete header for a payload of `data_len` bytes.
///
/// # Errors
///
/// Returns error if the writer fails.
pub fn write_header<W: Write>(w: &mut W, spec: WavSpec, data_len: u32) -> Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(CHUNK_OVERHEAD + data_len).to_le_bytes())?;
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_all(&FMT_CHUNK_LEN.to_le_bytes())?;
    w.write_all(&PCM_FORMAT.to_le_bytes())?;
    w.write_all(&spec.channels.to_le_bytes())?;
    w.write_all(&spec.sample_rate.to_le_bytes())?;
    w.write_all(&spec.byte_rate().to_le_bytes())?;
    w.write_all(&spec.block_align().to_le_bytes())?;
    w.write_all(&spec.bits_per_sample.to_le_bytes())?;
    w.write_all(b"data")?;
    w.write_all(&data_len.to_le_bytes())?;
    Ok(())
}

/// Reserve header space before streaming a payload of unknown length.
///
/// # Errors
///
/// Returns error if the writer fails.
pub fn write_placeholder<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(&[0u8; HEADER_LEN])?;
    Ok(())
}

/// Rewrite the header in place once the final payload length is known.
///
/// # Errors
///
/// Returns error if seeking or writing fails.
pub fn patch_header<W: Write + Seek>(w: &mut W, spec: WavSpec, data_len: u32) -> Result<()> {
    w.seek(SeekFrom::Start(0))?;
    write_header(w, spec, data_len)
}

/// Read and validate a header, returning the sample layout and payload length.
///
/// # Errors
///
/// Returns `Error::Storage` if the magic tags are wrong or the format is not
/// plain PCM, or an IO error if the reader fails.
pub fn read_header<R: Read>(r: &mut R) -> Result<(WavSpec, u32)> {
    let mut header = [0u8; HEADER_LEN];
    r.read_exact(&mut header)?;

    if &header[0..4] != b"RIFF"
        || &header[8..12] != b"WAVE"
        || &header[12..16] != b"fmt "
        || &header[36..40] != b"data"
    {
        return Err(Error::Storage("not a RIFF/WAVE container".to_string()));
    }

    let le_u16 = |o: usize| u16::from_le_bytes([header[o], header[o + 1]]);
    let le_u32 =
        |o: usize| u32::from_le_bytes([header[o], header[o + 1], header[o + 2], header[o + 3]]);

    if le_u16(20) != PCM_FORMAT {
        return Err(Error::Storage(format!(
            "unsupported audio format tag {}",
            le_u16(20)
        )));
    }

    let spec = WavSpec {
        channels: le_u16(22),
        sample_rate: le_u32(24),
        bits_per_sample: le_u16(34),
    };
    Ok((spec, le_u32(40)))
}
