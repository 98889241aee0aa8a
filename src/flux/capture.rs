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

    src/flux/capture.rs

    A decoded flux capture: the flux intervals and index offsets from a raw
    capture stream, along with the sample frequency needed to interpret
    them.

*/
use crate::{
    flux::{
        pll::{Pll, PllDecodeResult, PllParams},
        stream::decode_flux,
    },
    format_ms,
    FluxError,
};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// A decoded flux capture.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FluxCapture {
    /// Time between successive flux transitions, in sample ticks.
    pub flux: Vec<u64>,
    /// Distance to each index pulse from the previous pulse, or from the start of the capture for
    /// the first entry, in sample ticks.
    pub index: Vec<i64>,
    /// Frequency of the sample clock, in Hz.
    pub sample_freq: f64,
}

impl Display for FluxCapture {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Raw Flux ({} flux in {:.2}ms)",
            self.flux.len(),
            self.duration() * 1_000.0
        )
    }
}

impl FluxCapture {
    pub fn new(flux: Vec<u64>, index: Vec<i64>, sample_freq: f64) -> Self {
        FluxCapture {
            flux,
            index,
            sample_freq,
        }
    }

    /// Decode a raw, NUL-terminated capture stream.
    pub fn from_bytes(buffer: &[u8], sample_freq: f64) -> Result<Self, FluxError> {
        if !sample_freq.is_finite() || sample_freq <= 0.0 {
            return Err(FluxError::ParameterError(format!(
                "sample frequency must be positive, got {}",
                sample_freq
            )));
        }

        let (flux, index) = decode_flux(buffer)?;
        let capture = FluxCapture::new(flux, index, sample_freq);

        log::debug!(
            "FluxCapture::from_bytes(): {} with {} index pulses",
            capture,
            capture.index.len()
        );
        Ok(capture)
    }

    /// Total number of sample ticks covered by the flux intervals.
    pub fn total_ticks(&self) -> u64 {
        self.flux.iter().sum()
    }

    /// Total time covered by the flux intervals, in seconds.
    pub fn duration(&self) -> f64 {
        self.total_ticks() as f64 / self.sample_freq
    }

    /// Flux intervals converted to seconds.
    pub fn flux_times(&self) -> Vec<f64> {
        self.flux.iter().map(|&ticks| ticks as f64 / self.sample_freq).collect()
    }

    /// The time of each complete revolution, in seconds. The first index entry measures from the
    /// start of the capture and is not a revolution.
    pub fn index_times(&self) -> Vec<f64> {
        self.index
            .iter()
            .skip(1)
            .map(|&ticks| ticks as f64 / self.sample_freq)
            .collect()
    }

    /// The number of complete revolutions in the capture.
    pub fn revolution_ct(&self) -> usize {
        self.index.len().saturating_sub(1)
    }

    pub fn mean_index_time(&self) -> Option<f64> {
        let times = self.index_times();
        if times.is_empty() {
            return None;
        }
        Some(times.iter().sum::<f64>() / times.len() as f64)
    }

    /// Rotational speed derived from the mean index time.
    pub fn rpm(&self) -> Option<f64> {
        match self.mean_index_time() {
            Some(t) if t > 0.0 => Some(60.0 / t),
            _ => None,
        }
    }

    /// Flux intervals in sample ticks, for use as a PLL flux source.
    pub fn flux_source(&self) -> impl Iterator<Item = u64> + '_ {
        self.flux.iter().copied()
    }

    /// Index distances in seconds, for use as a PLL index source. The source ends with an index
    /// pulse at infinity, so a PLL run over the whole capture never exhausts it.
    pub fn index_source(&self) -> impl Iterator<Item = f64> + '_ {
        self.index
            .iter()
            .map(|&ticks| ticks as f64 / self.sample_freq)
            .chain(std::iter::once(f64::INFINITY))
    }

    /// Run the bitcell PLL over the whole capture. The sample frequency in `params` is replaced
    /// with the capture's own.
    pub fn to_bitcells(&self, params: &PllParams) -> Result<PllDecodeResult, FluxError> {
        if self.index.is_empty() {
            log::warn!("FluxCapture::to_bitcells(): Capture has no index pulses");
        }
        let pll = Pll::new(params.with_sample_freq(self.sample_freq));
        let result = pll.decode(self.flux_source(), self.index_source())?;

        log::debug!(
            "FluxCapture::to_bitcells(): {} bits in {} from {} revolutions",
            result.bits.len(),
            format_ms!(result.total_time()),
            self.revolution_ct()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let capture = FluxCapture::new(vec![72_000; 10], vec![], 72_000_000.0);
        assert_eq!(capture.to_string(), "Raw Flux (10 flux in 10.00ms)");
    }

    #[test]
    fn test_index_times() {
        let capture = FluxCapture::new(vec![], vec![1000, 2000, 4000], 1000.0);
        assert_eq!(capture.index_times(), vec![2.0, 4.0]);
        assert_eq!(capture.revolution_ct(), 2);
        assert_eq!(capture.mean_index_time(), Some(3.0));
        assert_eq!(capture.rpm(), Some(20.0));
    }

    #[test]
    fn test_no_revolutions() {
        let capture = FluxCapture::new(vec![10, 20], vec![500], 1000.0);
        assert_eq!(capture.revolution_ct(), 0);
        assert_eq!(capture.mean_index_time(), None);
        assert_eq!(capture.rpm(), None);
    }

    #[test]
    fn test_bad_sample_freq() {
        assert!(matches!(
            FluxCapture::from_bytes(&[10, 0], 0.0),
            Err(FluxError::ParameterError(_))
        ));
    }
}
