//! Streaming PackBits encoder with per-frame segment table.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::prelude::*;

use super::decoder::{MAX_SEGMENTS, RLE_HEADER_LEN};
use crate::error::EncodeResult;

/// Upper bound on pending literal bytes. Sized above the 128-byte run
/// limit to absorb the window between run detection and flush.
const LITERAL_BUFFER_LEN: usize = 132;

/// Incremental encoder for one RLE frame.
///
/// Bytes are fed one at a time through [`encode`](RleEncoder::encode),
/// with [`next_segment`](RleEncoder::next_segment) called before each
/// segment. [`into_encoded`](RleEncoder::into_encoded) closes the last
/// segment and prepends the offset header.
pub(crate) struct RleEncoder {
    segment_count: u32,
    offsets: [i32; MAX_SEGMENTS],
    buffer: [u8; LITERAL_BUFFER_LEN],
    /// Previous input byte, or -1 before the first byte of a segment.
    prev_byte: i32,
    repeat_count: i32,
    buffer_pos: usize,
    writer: Vec<u8>,
}

impl RleEncoder {
    pub fn new() -> Self {
        RleEncoder {
            segment_count: 0,
            offsets: [0; MAX_SEGMENTS],
            buffer: [0; LITERAL_BUFFER_LEN],
            prev_byte: -1,
            repeat_count: 0,
            buffer_pos: 0,
            writer: Vec::with_capacity(65536),
        }
    }

    /// Close the current segment, pad it to even length and record the
    /// start offset of the next one.
    pub fn next_segment(&mut self) -> EncodeResult<()> {
        if self.segment_count as usize == MAX_SEGMENTS {
            whatever!("RLE frame cannot hold more than {} segments", MAX_SEGMENTS);
        }
        self.flush();
        if self.writer.len() & 1 == 1 {
            self.writer.push(0x00);
        }
        self.offsets[self.segment_count as usize] = self.writer.len() as i32;
        self.segment_count += 1;
        Ok(())
    }

    pub fn encode(&mut self, byte: u8) {
        if i32::from(byte) == self.prev_byte {
            self.repeat_count += 1;

            if self.repeat_count > 2 && self.buffer_pos > 0 {
                // the run is confirmed, pending literals go out first
                while self.buffer_pos > 0 {
                    let count = self.buffer_pos.min(128);
                    self.writer.push((count - 1) as u8);
                    self.move_buffer(count);
                }
            } else if self.repeat_count > 128 {
                let count = self.repeat_count.min(128);
                self.writer.push((257 - count) as u8);
                self.writer.push(self.prev_byte as u8);
                self.repeat_count -= count;
            }
        } else {
            match self.repeat_count {
                0 => {}
                1 => {
                    self.buffer[self.buffer_pos] = self.prev_byte as u8;
                    self.buffer_pos += 1;
                }
                2 => {
                    // two equal bytes do not pay for a repeat run
                    self.buffer[self.buffer_pos] = self.prev_byte as u8;
                    self.buffer[self.buffer_pos + 1] = self.prev_byte as u8;
                    self.buffer_pos += 2;
                }
                _ => {
                    while self.repeat_count > 0 {
                        let count = self.repeat_count.min(128);
                        self.writer.push((257 - count) as u8);
                        self.writer.push(self.prev_byte as u8);
                        self.repeat_count -= count;
                    }
                }
            }

            while self.buffer_pos > 128 {
                let count = self.buffer_pos.min(128);
                self.writer.push((count - 1) as u8);
                self.move_buffer(count);
            }

            self.prev_byte = i32::from(byte);
            self.repeat_count = 1;
        }
    }

    /// Emit all pending state and reset for the next segment.
    pub fn flush(&mut self) {
        if self.repeat_count < 2 {
            while self.repeat_count > 0 {
                self.buffer[self.buffer_pos] = self.prev_byte as u8;
                self.buffer_pos += 1;
                self.repeat_count -= 1;
            }
        }

        while self.buffer_pos > 0 {
            let count = self.buffer_pos.min(128);
            self.writer.push((count - 1) as u8);
            self.move_buffer(count);
        }

        if self.repeat_count >= 2 {
            while self.repeat_count > 0 {
                let count = self.repeat_count.min(128);
                self.writer.push((257 - count) as u8);
                self.writer.push(self.prev_byte as u8);
                self.repeat_count -= count;
            }
        }

        self.prev_byte = -1;
        self.repeat_count = 0;
        self.buffer_pos = 0;
    }

    pub fn make_even_length(&mut self) {
        if self.writer.len() % 2 == 1 {
            self.writer.push(0);
        }
    }

    /// Finish the stream: flush pending state and prepend the 64-byte
    /// header. The recorded offsets are biased by the fixed header size
    /// (`4 + 15·4`); all fifteen offset slots are written, unused slots
    /// staying zero.
    pub fn into_encoded(mut self) -> Vec<u8> {
        self.flush();

        for segment in 0..self.segment_count as usize {
            self.offsets[segment] += RLE_HEADER_LEN as i32;
        }

        let mut header = [0u8; RLE_HEADER_LEN];
        LittleEndian::write_u32(&mut header[0..4], self.segment_count);
        LittleEndian::write_i32_into(&self.offsets, &mut header[4..RLE_HEADER_LEN]);

        let body = std::mem::take(&mut self.writer);
        let mut out = Vec::with_capacity(RLE_HEADER_LEN + body.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&body);
        out
    }

    fn move_buffer(&mut self, count: usize) {
        self.writer.extend_from_slice(&self.buffer[..count]);
        self.buffer.copy_within(count..self.buffer_pos, 0);
        self.buffer_pos -= count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_single_segment(data: &[u8]) -> Vec<u8> {
        let mut encoder = RleEncoder::new();
        encoder.next_segment().unwrap();
        for &byte in data {
            encoder.encode(byte);
        }
        encoder.flush();
        encoder.make_even_length();
        encoder.into_encoded()
    }

    #[test]
    fn long_repeat_splits_into_maximal_runs() {
        let encoded = encode_single_segment(&[0x42; 300]);
        // two maximal 128-repeats and one 44-repeat
        assert_eq!(
            &encoded[RLE_HEADER_LEN..RLE_HEADER_LEN + 6],
            &[0x81, 0x42, 0x81, 0x42, 0xD5, 0x42]
        );
        assert_eq!(encoded.len() % 2, 0);
    }

    #[test]
    fn distinct_bytes_form_one_literal_run() {
        let data: Vec<u8> = (0x00..=0x7F).collect();
        let encoded = encode_single_segment(&data);
        assert_eq!(encoded[RLE_HEADER_LEN], 0x7F);
        assert_eq!(&encoded[RLE_HEADER_LEN + 1..RLE_HEADER_LEN + 1 + 128], &data[..]);
    }

    #[test]
    fn byte_pair_stays_literal() {
        // a pair of equal bytes does not start a repeat run
        let encoded = encode_single_segment(&[0x10, 0x10, 0x20, 0x30]);
        assert_eq!(
            &encoded[RLE_HEADER_LEN..RLE_HEADER_LEN + 5],
            &[0x03, 0x10, 0x10, 0x20, 0x30]
        );
    }

    #[test]
    fn three_equal_bytes_form_a_repeat_run() {
        let encoded = encode_single_segment(&[0x10, 0x10, 0x10]);
        assert_eq!(&encoded[RLE_HEADER_LEN..RLE_HEADER_LEN + 2], &[0xFE, 0x10]);
    }

    #[test]
    fn header_offsets_are_biased_by_header_size() {
        let encoded = encode_single_segment(&[0x01, 0x02, 0x03]);
        assert_eq!(LittleEndian::read_u32(&encoded[0..4]), 1);
        assert_eq!(LittleEndian::read_i32(&encoded[4..8]), RLE_HEADER_LEN as i32);
        // unused offset slots stay zero
        assert_eq!(LittleEndian::read_i32(&encoded[8..12]), 0);
    }

    #[test]
    fn odd_segments_are_padded_between_segments() {
        let mut encoder = RleEncoder::new();
        encoder.next_segment().unwrap();
        // 3 literals encode to 4 bytes, even already; use 2 literals -> 3 bytes
        encoder.encode(0x01);
        encoder.encode(0x02);
        encoder.flush();
        encoder.next_segment().unwrap();
        encoder.encode(0x03);
        encoder.flush();
        encoder.make_even_length();
        let encoded = encoder.into_encoded();

        // second segment starts on an even offset past the padded first one
        let second = LittleEndian::read_i32(&encoded[8..12]);
        assert_eq!(second, RLE_HEADER_LEN as i32 + 4);
        assert_eq!(encoded.len() % 2, 0);
    }
}
