/*
    gwflux
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/flux/stream.rs

    A decoder for the raw flux stream format sent by Greaseweazle-style
    flux capture hardware.

    The stream is a sequence of variable-length byte codes terminated by a
    single NUL byte:

      0x00-0xF9       flux interval of 0-249 sample ticks
      0xFA-0xFE, e    flux interval of 250 + (b - 250) * 255 + e - 1 ticks
      0xFF, op, ...   escape: op 1 = INDEX, op 2 = SPACE, each followed by
                      a 28-bit operand packed into four bytes

*/
use crate::FluxError;
use strum::{Display, FromRepr};

/// Byte codes up to this value encode a flux interval directly.
pub const FLUX_DIRECT_MAX: u8 = 249;
/// Byte codes from this value up to [FLUX_ESCAPE] are followed by one extension byte.
pub const FLUX_EXTENDED_BASE: u8 = 250;
/// Introduces an opcode and its operand.
pub const FLUX_ESCAPE: u8 = 255;

/// Opcodes that may follow a [FLUX_ESCAPE] byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum FluxOp {
    /// An index pulse occurred. The operand is the number of ticks between the last flux
    /// transition and the pulse.
    Index = 1,
    /// Elapsed time with no flux transition. The operand is added to the next flux interval.
    Space = 2,
}

/// Decode a 28-bit value from four operand bytes. Only the upper seven bits of each byte carry
/// data; bit 0 is set by the encoder so an operand byte can never equal [FLUX_ESCAPE].
#[inline]
pub fn read_28bit(bytes: [u8; 4]) -> u32 {
    let mut x = (bytes[0] as u32) >> 1;
    x |= (bytes[1] as u32 & 0xFE) << 6;
    x |= (bytes[2] as u32 & 0xFE) << 13;
    x |= (bytes[3] as u32 & 0xFE) << 20;
    x
}

struct FluxReader<'a> {
    data: &'a [u8],
    pos:  usize,
}

impl<'a> FluxReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        FluxReader { data, pos: 0 }
    }

    fn next_code(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn read_u8(&mut self) -> Result<u8, FluxError> {
        self.next_code().ok_or(FluxError::UnexpectedEndOfStream)
    }

    fn read_operand(&mut self) -> Result<u32, FluxError> {
        let bytes: [u8; 4] = self
            .data
            .get(self.pos..self.pos + 4)
            .and_then(|s| s.try_into().ok())
            .ok_or(FluxError::UnexpectedEndOfStream)?;
        self.pos += 4;
        Ok(read_28bit(bytes))
    }
}

/// Decode a raw flux stream into a list of flux intervals and a list of index offsets, both in
/// sample ticks.
///
/// Each index entry is the distance from the previous index pulse (or the start of the stream,
/// for the first entry) to this one. The buffer must end with a NUL byte, which is not decoded.
///
/// Decoding is all-or-nothing: on error, no partial output is returned.
pub fn decode_flux(buffer: &[u8]) -> Result<(Vec<u64>, Vec<i64>), FluxError> {
    let data = match buffer.split_last() {
        Some((0, data)) => data,
        _ => return Err(FluxError::MalformedBuffer),
    };

    let mut reader = FluxReader::new(data);
    let mut flux = Vec::with_capacity(data.len());
    let mut index = Vec::new();

    // Ticks accumulated towards the next flux interval.
    let mut ticks: u64 = 0;
    // Ticks elapsed since the last index pulse. Goes negative after an index pulse, carrying
    // the part of the pending flux interval that preceded the pulse.
    let mut ticks_since_index: i64 = 0;

    while let Some(code) = reader.next_code() {
        let val = match code {
            0..=FLUX_DIRECT_MAX => code as u64,
            FLUX_EXTENDED_BASE..=254 => {
                let ext = reader.read_u8()?;
                FLUX_EXTENDED_BASE as u64 + (code - FLUX_EXTENDED_BASE) as u64 * 255 + ext as u64 - 1
            }
            FLUX_ESCAPE => {
                let opcode = reader.read_u8()?;
                match FluxOp::from_repr(opcode) {
                    Some(FluxOp::Index) => {
                        let val = reader.read_operand()? as u64;
                        let pending = (ticks + val) as i64;
                        index.push(ticks_since_index + pending);
                        ticks_since_index = -pending;
                    }
                    Some(FluxOp::Space) => {
                        ticks += reader.read_operand()? as u64;
                    }
                    None => return Err(FluxError::UnknownOpcode(opcode)),
                }
                continue;
            }
        };

        ticks += val;
        flux.push(ticks);
        ticks_since_index += ticks as i64;
        ticks = 0;
    }

    log::debug!(
        "decode_flux(): Decoded {} bytes into {} flux intervals and {} index pulses",
        buffer.len(),
        flux.len(),
        index.len()
    );

    Ok((flux, index))
}
