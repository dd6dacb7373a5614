//! Streaming base64 transcoding for audio payloads
//!
//! Cloud request and response bodies carry raw PCM as base64 text inside
//! JSON. Clips are encoded in buffer-sized chunks, so the encoder holds the
//! zero to two source bytes left over from each call and prepends them to the next
//! one; padding is emitted only when the stream is finished. Decoding is
//! lenient: bytes outside the alphabet are skipped and a truncated tail
//! yields the bytes of the complete groups seen so far.

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const PAD: u8 = b'=';

/// Encodes one logical byte stream across multiple calls.
///
/// The carried tail must survive between calls; a fresh encoder is created
/// per stream and consumed by [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct StreamEncoder {
    carry: [u8; 2],
    carry_len: usize,
}

impl StreamEncoder {
    /// Create an encoder at the start of a stream
    #[must_use]
    pub const fn new() -> Self {
        Self {
            carry: [0; 2],
            carry_len: 0,
        }
    }

    /// Encode the next chunk of the stream.
    ///
    /// Emits four characters for every complete 3-byte group of carry plus
    /// input and retains the leftover bytes for the next call. Never emits
    /// padding; concatenating the outputs of successive calls (ending with
    /// [`finish`](Self::finish)) equals a single whole-stream encode.
    pub fn encode_chunk(&mut self, input: &[u8]) -> String {
        let carried = self.carry;
        let carry_len = self.carry_len;
        let total = carry_len + input.len();

        let byte_at = |i: usize| {
            if i < carry_len {
                carried[i]
            } else {
                input[i - carry_len]
            }
        };

        let mut out = String::with_capacity(total / 3 * 4);
        let mut idx = 0;
        while idx + 3 <= total {
            push_group(&mut out, [byte_at(idx), byte_at(idx + 1), byte_at(idx + 2)]);
            idx += 3;
        }

        let rest = total - idx;
        for k in 0..rest {
            self.carry[k] = byte_at(idx + k);
        }
        self.carry_len = rest;

        out
    }

    /// Number of source bytes currently carried between calls
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.carry_len
    }

    /// Flush the carried tail with padding, consuming the encoder
    #[must_use]
    pub fn finish(self) -> String {
        let mut out = String::with_capacity(4);
        match self.carry_len {
            1 => {
                let b0 = self.carry[0];
                out.push(ALPHABET[usize::from(b0 >> 2)] as char);
                out.push(ALPHABET[usize::from((b0 & 0x03) << 4)] as char);
                out.push(PAD as char);
                out.push(PAD as char);
            }
            2 => {
                let (b0, b1) = (self.carry[0], self.carry[1]);
                out.push(ALPHABET[usize::from(b0 >> 2)] as char);
                out.push(ALPHABET[usize::from(((b0 & 0x03) << 4) | (b1 >> 4))] as char);
                out.push(ALPHABET[usize::from((b1 & 0x0f) << 2)] as char);
                out.push(PAD as char);
            }
            _ => {}
        }
        out
    }
}

fn push_group(out: &mut String, group: [u8; 3]) {
    out.push(ALPHABET[usize::from(group[0] >> 2)] as char);
    out.push(ALPHABET[usize::from(((group[0] & 0x03) << 4) | (group[1] >> 4))] as char);
    out.push(ALPHABET[usize::from(((group[1] & 0x0f) << 2) | (group[2] >> 6))] as char);
    out.push(ALPHABET[usize::from(group[2] & 0x3f)] as char);
}

/// Decode a base64 text blob.
///
/// Bytes outside the alphabet are skipped. Up to two trailing pads are
/// honored (one pad yields two tail bytes, two pads one). Input whose
/// filtered length is not a multiple of four decodes to the bytes of the
/// complete groups only.
#[must_use]
pub fn decode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(decoded_len(text));
    let mut quad = [0u8; 4];
    let mut filled = 0;
    let mut saw_pad = false;

    for &b in text.as_bytes() {
        if b == PAD {
            saw_pad = true;
            break;
        }
        let Some(v) = sextet(b) else { continue };
        quad[filled] = v;
        filled += 1;
        if filled == 4 {
            out.push((quad[0] << 2) | (quad[1] >> 4));
            out.push((quad[1] << 4) | (quad[2] >> 2));
            out.push((quad[2] << 6) | quad[3]);
            filled = 0;
        }
    }

    // a padded final group carries one or two real bytes
    if saw_pad {
        if filled >= 2 {
            out.push((quad[0] << 2) | (quad[1] >> 4));
        }
        if filled == 3 {
            out.push((quad[1] << 4) | (quad[2] >> 2));
        }
    }

    out
}

/// Exact decoded size of a well-formed blob, for buffer pre-allocation.
///
/// Computed as `floor(n * 3 / 4) - pads` over the filtered length; matches
/// [`decode`] byte-for-byte on any well-formed input, padded or not.
#[must_use]
pub fn decoded_len(text: &str) -> usize {
    let mut n = 0usize;
    let mut pads = 0usize;
    for &b in text.as_bytes() {
        if b == PAD {
            n += 1;
            pads += 1;
        } else if sextet(b).is_some() {
            n += 1;
        }
    }
    (n * 3 / 4).saturating_sub(pads)
}

const fn sextet(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    fn sample_bytes(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 37 % 251) as u8).collect()
    }

    fn encode_whole(bytes: &[u8]) -> String {
        let mut encoder = StreamEncoder::new();
        let mut text = encoder.encode_chunk(bytes);
        text.push_str(&encoder.finish());
        text
    }

    #[test]
    fn known_vector() {
        assert_eq!(encode_whole(&[0x4D, 0x61, 0x6E]), "TWFu");
    }

    #[test]
    fn empty_stream() {
        assert_eq!(encode_whole(&[]), "");
        assert_eq!(decode(""), Vec::<u8>::new());
    }

    #[test]
    fn matches_reference_engine() {
        for len in 0..=48 {
            let bytes = sample_bytes(len);
            assert_eq!(encode_whole(&bytes), STANDARD.encode(&bytes), "len {len}");
        }
    }

    #[test]
    fn round_trip() {
        for len in 0..=48 {
            let bytes = sample_bytes(len);
            assert_eq!(decode(&encode_whole(&bytes)), bytes, "len {len}");
        }
    }

    #[test]
    fn chunk_boundary_transparency() {
        let bytes = sample_bytes(17);
        let whole = encode_whole(&bytes);
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            let mut encoder = StreamEncoder::new();
            let mut text = encoder.encode_chunk(a);
            text.push_str(&encoder.encode_chunk(b));
            text.push_str(&encoder.finish());
            assert_eq!(text, whole, "split at {split}");
            assert_eq!(decode(&text), bytes, "split at {split}");
        }
    }

    #[test]
    fn many_small_chunks() {
        let bytes = sample_bytes(41);
        let mut encoder = StreamEncoder::new();
        let mut text = String::new();
        for chunk in bytes.chunks(5) {
            text.push_str(&encoder.encode_chunk(chunk));
        }
        text.push_str(&encoder.finish());
        assert_eq!(text, STANDARD.encode(&bytes));
    }

    #[test]
    fn no_padding_before_finish() {
        let mut encoder = StreamEncoder::new();
        let text = encoder.encode_chunk(&sample_bytes(10));
        assert!(!text.contains('='));
        assert_eq!(encoder.pending(), 1);
    }

    #[test]
    fn decode_skips_foreign_bytes() {
        assert_eq!(decode("TW\nFu "), b"Man");
        assert_eq!(decode("T W F u"), b"Man");
    }

    #[test]
    fn decode_honors_padding() {
        assert_eq!(decode("TWE="), b"Ma");
        assert_eq!(decode("TQ=="), b"M");
    }

    #[test]
    fn decode_truncated_tail_is_partial() {
        // incomplete unpadded group decodes to the complete groups only
        assert_eq!(decode("TWFuTW"), b"Man");
        assert_eq!(decode("TWF"), b"");
    }

    #[test]
    fn decoded_len_matches_decode() {
        for len in 0..=48 {
            let text = encode_whole(&sample_bytes(len));
            assert_eq!(decoded_len(&text), decode(&text).len(), "len {len}");
        }
        // unpadded but aligned
        assert_eq!(decoded_len("TWFu"), 3);
        // foreign bytes are not counted
        assert_eq!(decoded_len("TW\nFu"), 3);
    }
}
