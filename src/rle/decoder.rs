//! Reader for one RLE frame: a 64-byte offset header followed by up to
//! fifteen PackBits segment bodies.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, prelude::*};

use crate::error::{decode_error, DecodeResult};

pub(crate) const RLE_HEADER_LEN: usize = 64;
pub(crate) const MAX_SEGMENTS: usize = 15;

#[derive(Debug)]
pub(crate) struct RleDecoder<'a> {
    data: &'a [u8],
    segment_count: u32,
    offsets: [i32; MAX_SEGMENTS],
}

impl<'a> RleDecoder<'a> {
    /// Parse the frame header. The segment bodies are validated lazily,
    /// as each segment is decoded.
    pub fn new(data: &'a [u8]) -> DecodeResult<Self> {
        if data.len() < RLE_HEADER_LEN {
            whatever!("RLE frame shorter than the {} byte header", RLE_HEADER_LEN);
        }
        let segment_count = LittleEndian::read_u32(&data[0..4]);
        if segment_count as usize > MAX_SEGMENTS {
            whatever!("RLE header declares {} segments", segment_count);
        }
        let mut offsets = [0i32; MAX_SEGMENTS];
        LittleEndian::read_i32_into(&data[4..RLE_HEADER_LEN], &mut offsets);

        Ok(RleDecoder {
            data,
            segment_count,
            offsets,
        })
    }

    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    fn segment_offset(&self, segment: usize) -> i32 {
        self.offsets[segment]
    }

    fn segment_length(&self, segment: usize) -> i32 {
        let offset = self.segment_offset(segment);
        if segment + 1 < self.segment_count as usize {
            self.segment_offset(segment + 1) - offset
        } else {
            self.data.len() as i32 - offset
        }
    }

    /// Decode one segment into `sink`, writing the first byte at `start`
    /// and advancing the write position by `sample_offset` after each
    /// byte. Decoding stops once the segment bytes are exhausted or the
    /// write position leaves the sink.
    pub fn decode_segment(
        &self,
        segment: usize,
        sink: &mut [u8],
        start: usize,
        sample_offset: usize,
    ) -> DecodeResult<()> {
        ensure!(
            segment < self.segment_count as usize,
            decode_error::SegmentOutOfRangeSnafu {
                segment: segment as u32
            }
        );
        let offset = self.segment_offset(segment);
        let length = self.segment_length(segment);
        if offset < 0
            || length < 0
            || (offset as usize).saturating_add(length as usize) > self.data.len()
        {
            whatever!("RLE segment {} extends past the frame", segment);
        }

        decode(
            sink,
            start,
            sample_offset,
            self.data,
            offset as usize,
            length as usize,
        )
    }
}

/// The PackBits control loop. Consumes segment bytes until either the
/// segment or the sink is exhausted; a trailing pad byte is never reached
/// on well-formed input because the sink fills up first.
fn decode(
    sink: &mut [u8],
    start: usize,
    sample_offset: usize,
    rle_data: &[u8],
    offset: usize,
    count: usize,
) -> DecodeResult<()> {
    let mut pos = start;
    let mut i = offset;
    let end = offset + count;
    let sink_len = sink.len();

    while i < end && pos < sink_len {
        let control = rle_data[i] as i8;
        i += 1;
        if control >= 0 {
            let length = control as usize + 1;
            ensure!(end - i >= length, decode_error::InputOverflowSnafu);
            ensure!(
                pos + (length - 1) * sample_offset < sink_len,
                decode_error::OutputOverflowSnafu
            );
            if sample_offset == 1 {
                sink[pos..pos + length].copy_from_slice(&rle_data[i..i + length]);
                pos += length;
            } else {
                for &byte in &rle_data[i..i + length] {
                    sink[pos] = byte;
                    pos += sample_offset;
                }
            }
            i += length;
        } else if control >= -127 {
            let length = -i32::from(control) as usize + 1;
            ensure!(i < end, decode_error::InputOverflowSnafu);
            ensure!(
                pos + (length - 1) * sample_offset < sink_len,
                decode_error::OutputOverflowSnafu
            );
            let byte = rle_data[i];
            i += 1;
            if sample_offset == 1 {
                sink[pos..pos + length].fill(byte);
                pos += length;
            } else {
                for _ in 0..length {
                    sink[pos] = byte;
                    pos += sample_offset;
                }
            }
        }
        // control == -128 is a no-op
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn frame_with_segment(body: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; RLE_HEADER_LEN];
        LittleEndian::write_u32(&mut frame[0..4], 1);
        LittleEndian::write_i32(&mut frame[4..8], RLE_HEADER_LEN as i32);
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn decodes_packbits_control_bytes() {
        let body = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];

        let frame = frame_with_segment(&body);
        let decoder = RleDecoder::new(&frame).unwrap();
        let mut sink = vec![0u8; expected.len()];
        decoder.decode_segment(0, &mut sink, 0, 1).unwrap();
        assert_eq!(sink, expected);
    }

    #[test]
    fn decodes_segment_to_the_last_byte() {
        // the final repeat run occupies exactly the last two segment bytes
        let body = [0x01, 0x10, 0x20, 0xFE, 0x30];
        let frame = frame_with_segment(&body);
        let decoder = RleDecoder::new(&frame).unwrap();
        let mut sink = vec![0u8; 5];
        decoder.decode_segment(0, &mut sink, 0, 1).unwrap();
        assert_eq!(sink, &[0x10, 0x20, 0x30, 0x30, 0x30]);
    }

    #[test]
    fn scatters_with_sample_offset() {
        let body = [0x02, 0x01, 0x02, 0x03];
        let frame = frame_with_segment(&body);
        let decoder = RleDecoder::new(&frame).unwrap();
        let mut sink = vec![0u8; 6];
        decoder.decode_segment(0, &mut sink, 1, 2).unwrap();
        assert_eq!(sink, &[0x00, 0x01, 0x00, 0x02, 0x00, 0x03]);
    }

    #[test]
    fn segment_out_of_range() {
        let frame = frame_with_segment(&[0x00, 0x42]);
        let decoder = RleDecoder::new(&frame).unwrap();
        let mut sink = vec![0u8; 4];
        let err = decoder.decode_segment(1, &mut sink, 0, 1).unwrap_err();
        assert!(matches!(err, DecodeError::SegmentOutOfRange { segment: 1 }));
    }

    #[test]
    fn literal_run_past_segment_is_input_overflow() {
        // literal run of 4 with only 2 bytes left in the segment
        let frame = frame_with_segment(&[0x03, 0x01, 0x02]);
        let decoder = RleDecoder::new(&frame).unwrap();
        let mut sink = vec![0u8; 8];
        let err = decoder.decode_segment(0, &mut sink, 0, 1).unwrap_err();
        assert!(matches!(err, DecodeError::InputOverflow));
    }

    #[test]
    fn repeat_run_past_sink_is_output_overflow() {
        let frame = frame_with_segment(&[0x81, 0x42]);
        let decoder = RleDecoder::new(&frame).unwrap();
        let mut sink = vec![0u8; 16];
        let err = decoder.decode_segment(0, &mut sink, 0, 1).unwrap_err();
        assert!(matches!(err, DecodeError::OutputOverflow));
    }
}
