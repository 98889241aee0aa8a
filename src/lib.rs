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
*/

//! gwflux decodes raw magnetic flux captures, as read from a floppy disk by flux-level capture
//! hardware, into bitcells.
//!
//! Decoding happens in two independent stages:
//!
//! * [flux::stream::decode_flux] expands the variable-length encoded capture buffer sent by the
//!   hardware into flux intervals (in sample ticks) and index pulse offsets.
//! * [flux::pll::flux_to_bitcells] runs a software PLL over any source of flux intervals,
//!   producing bits, per-bit durations and revolution boundary counts.
//!
//! [FluxCapture] ties the two together for the common case of a complete capture buffer.

pub mod flux;

use std::{
    fmt,
    fmt::{Display, Formatter},
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FluxError {
    #[error("Flux is not NUL-terminated")]
    MalformedBuffer,
    #[error("Bad opcode in flux stream ({0})")]
    UnknownOpcode(u8),
    #[error("Unexpected end of flux")]
    UnexpectedEndOfStream,
    #[error("A flux or index source produced a value that could not be converted to a number")]
    NumericConversionFailure,
    #[error("The index source was exhausted before the flux source")]
    IndexStreamExhausted,
    #[error("Invalid parameters were specified to a library function: {0}")]
    ParameterError(String),
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiskDataRate {
    RateNonstandard(u32),
    Rate125Kbps,
    #[default]
    Rate250Kbps,
    Rate300Kbps,
    Rate500Kbps,
    Rate1000Kbps,
}

impl From<u32> for DiskDataRate {
    fn from(rate: u32) -> Self {
        match rate {
            125000 => DiskDataRate::Rate125Kbps,
            250000 => DiskDataRate::Rate250Kbps,
            300000 => DiskDataRate::Rate300Kbps,
            500000 => DiskDataRate::Rate500Kbps,
            1000000 => DiskDataRate::Rate1000Kbps,
            _ => DiskDataRate::RateNonstandard(rate),
        }
    }
}

impl From<DiskDataRate> for u32 {
    fn from(rate: DiskDataRate) -> Self {
        match rate {
            DiskDataRate::RateNonstandard(rate) => rate,
            DiskDataRate::Rate125Kbps => 125000,
            DiskDataRate::Rate250Kbps => 250000,
            DiskDataRate::Rate300Kbps => 300000,
            DiskDataRate::Rate500Kbps => 500000,
            DiskDataRate::Rate1000Kbps => 1000000,
        }
    }
}

impl DiskDataRate {
    /// Return the MFM bitcell period, in seconds, for this data rate.
    /// Each data bit is carried by a clock cell and a data cell, so the bitcell runs at twice
    /// the data rate.
    pub fn mfm_bitcell(&self) -> f64 {
        1.0 / (u32::from(*self) as f64 * 2.0)
    }
}

impl Display for DiskDataRate {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DiskDataRate::RateNonstandard(rate) => write!(f, "{}Kbps", rate / 1000),
            DiskDataRate::Rate125Kbps => write!(f, "125Kbps"),
            DiskDataRate::Rate250Kbps => write!(f, "250Kbps"),
            DiskDataRate::Rate300Kbps => write!(f, "300Kbps"),
            DiskDataRate::Rate500Kbps => write!(f, "500Kbps"),
            DiskDataRate::Rate1000Kbps => write!(f, "1000Kbps"),
        }
    }
}

pub use crate::flux::{
    capture::FluxCapture,
    pll::{flux_to_bitcells, Pll, PllDecodeResult, PllParams},
    stream::{decode_flux, FluxOp},
};

#[cfg(feature = "flux")]
pub use crate::flux::histogram::{FluxHistogram, FluxPeak};
