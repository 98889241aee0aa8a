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

    tests/common/mod.rs

    Common support routines for tests
*/
#![allow(dead_code)]

use rand::Rng;

/// Sample ticks per 2us MFM bitcell at the default 72MHz sample clock.
pub const CELL_TICKS: u64 = 144;
pub const SAMPLE_FREQ: f64 = 72_000_000.0;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Pack a value into four bytes, seven bits per byte, with bit 0 of each byte set.
pub fn write_28bit(x: u32) -> [u8; 4] {
    assert!(x < (1 << 28));
    [
        1 | (x << 1) as u8,
        1 | (x >> 6) as u8,
        1 | (x >> 13) as u8,
        1 | (x >> 20) as u8,
    ]
}

/// Builds raw capture streams the way capture hardware encodes them.
#[derive(Default)]
pub struct FluxStreamBuilder {
    buf: Vec<u8>,
}

impl FluxStreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flux(&mut self, val: u64) -> &mut Self {
        if val < 250 {
            self.buf.push(val as u8);
        }
        else if val < 1525 {
            let v = val - 250;
            self.buf.push(250 + (v / 255) as u8);
            self.buf.push(1 + (v % 255) as u8);
        }
        else {
            self.space(val - 249);
            self.buf.push(249);
        }
        self
    }

    pub fn space(&mut self, val: u64) -> &mut Self {
        self.buf.extend_from_slice(&[255, 2]);
        self.buf.extend_from_slice(&write_28bit(val as u32));
        self
    }

    /// An index pulse `val` ticks after the last flux transition.
    pub fn index(&mut self, val: u64) -> &mut Self {
        self.buf.extend_from_slice(&[255, 1]);
        self.buf.extend_from_slice(&write_28bit(val as u32));
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buf);
        out.push(0);
        out
    }
}

/// Produce flux intervals, in cells, for a random MFM bit pattern: runs of one to three zeros
/// between transitions.
pub fn random_mfm_cells<R: Rng>(rng: &mut R, count: usize) -> Vec<u64> {
    (0..count).map(|_| rng.gen_range(2..=4)).collect()
}

/// Expand interval lengths in cells into the bit pattern they encode.
pub fn cells_to_bits(cells: &[u64]) -> Vec<bool> {
    let mut bits = Vec::new();
    for &c in cells {
        for _ in 1..c {
            bits.push(false);
        }
        bits.push(true);
    }
    bits
}
