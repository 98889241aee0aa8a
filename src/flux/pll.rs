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

//! A software PLL that recovers bitcells from a stream of flux intervals.
//!
//! The PLL keeps a running clock period and a phase accumulator. Flux intervals are added to the
//! accumulator, and each time it holds at least half a clock period, bitcells are clocked out: a
//! run of zero or more `0` bits terminated by a `1` bit for the transition itself. After each
//! transition the clock period is nudged toward the remaining phase error, or back toward its
//! centre if the run of zeros was long enough that the loop has probably lost sync, and a fraction
//! of the phase error is folded into the duration of the bit just emitted.
//!
//! [flux_to_bitcells] is the streaming primitive, which appends to caller-owned output. It makes
//! no atomicity guarantee: on error, output already appended remains. [Pll::decode] wraps it into
//! an owned [PllDecodeResult].

use crate::{format_us, DiskDataRate, FluxError};
use bit_vec::BitVec;
use num_traits::ToPrimitive;
use std::ops::Range;

/// Default sample frequency of the capture hardware, in Hz.
pub const DEFAULT_SAMPLE_FREQ: f64 = 72_000_000.0;
/// Represents the default clock for a 300RPM, 250Kbps MFM disk.
pub const BASE_CLOCK: f64 = 2e-6;
/// Default maximum deviation of the clock from its centre, as a fraction.
pub const DEFAULT_MAX_ADJUST: f64 = 0.10;
pub const DEFAULT_PERIOD_ADJ: f64 = 0.05;
pub const DEFAULT_PHASE_ADJ: f64 = 0.60;

/// A run longer than this many zeros is taken as a sign the PLL has lost sync.
const MAX_SYNC_ZEROS: u32 = 3;

/// Parameters for the bitcell PLL.
///
/// Clock values are in the same units as the flux intervals after division by `sample_freq`.
/// With the defaults, flux intervals in sample ticks produce clock values in seconds.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllParams {
    /// Frequency used to convert flux intervals into clock units.
    pub sample_freq: f64,
    /// The nominal bitcell period. The clock starts here and is pulled back here when out of sync.
    pub clock_centre: f64,
    pub clock_min: f64,
    pub clock_max: f64,
    /// Fraction of the phase error applied to the clock period after each transition.
    pub period_adj: f64,
    /// Fraction of the phase error corrected after each transition.
    pub phase_adj: f64,
}

impl Default for PllParams {
    fn default() -> Self {
        PllParams {
            sample_freq: DEFAULT_SAMPLE_FREQ,
            clock_centre: BASE_CLOCK,
            clock_min: BASE_CLOCK * (1.0 - DEFAULT_MAX_ADJUST),
            clock_max: BASE_CLOCK * (1.0 + DEFAULT_MAX_ADJUST),
            period_adj: DEFAULT_PERIOD_ADJ,
            phase_adj: DEFAULT_PHASE_ADJ,
        }
    }
}

impl PllParams {
    pub fn with_sample_freq(mut self, sample_freq: f64) -> Self {
        self.sample_freq = sample_freq;
        self
    }

    /// Set the clock centre, deriving the clock bounds from a maximum fractional adjustment.
    pub fn with_clock(mut self, clock: f64, max_adj: f64) -> Self {
        self.clock_centre = clock;
        self.clock_min = clock * (1.0 - max_adj);
        self.clock_max = clock * (1.0 + max_adj);
        self
    }

    pub fn with_gains(mut self, period_adj: f64, phase_adj: f64) -> Self {
        self.period_adj = period_adj;
        self.phase_adj = phase_adj;
        self
    }

    /// Set the clock for an MFM track of the given data rate, keeping the current maximum
    /// fractional adjustment.
    pub fn for_data_rate(self, rate: DiskDataRate) -> Self {
        let max_adj = self.max_adjust();
        self.with_clock(rate.mfm_bitcell(), max_adj)
    }

    /// The larger of the two fractional deviations of the clock bounds from the centre.
    pub fn max_adjust(&self) -> f64 {
        if self.clock_centre == 0.0 {
            return 0.0;
        }
        let below = (self.clock_centre - self.clock_min) / self.clock_centre;
        let above = (self.clock_max - self.clock_centre) / self.clock_centre;
        below.max(above)
    }

    /// Check that these parameters can keep the clock within its bounds.
    pub fn validate(&self) -> Result<(), FluxError> {
        if !self.sample_freq.is_finite() || self.sample_freq <= 0.0 {
            return Err(FluxError::ParameterError(format!(
                "sample frequency must be positive, got {}",
                self.sample_freq
            )));
        }
        for (name, value) in [
            ("clock_centre", self.clock_centre),
            ("clock_min", self.clock_min),
            ("clock_max", self.clock_max),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(FluxError::ParameterError(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.clock_min > self.clock_max {
            return Err(FluxError::ParameterError(format!(
                "clock_min {} exceeds clock_max {}",
                self.clock_min, self.clock_max
            )));
        }
        if self.clock_centre < self.clock_min || self.clock_centre > self.clock_max {
            return Err(FluxError::ParameterError(format!(
                "clock_centre {} outside of [{}, {}]",
                self.clock_centre, self.clock_min, self.clock_max
            )));
        }
        if !self.period_adj.is_finite() || !self.phase_adj.is_finite() {
            return Err(FluxError::ParameterError(format!(
                "PLL gains must be finite, got period: {} phase: {}",
                self.period_adj, self.phase_adj
            )));
        }
        Ok(())
    }
}

/// Pull the next index distance. `+inf` is accepted so callers can terminate an index source
/// with a pulse that never arrives.
fn next_index<I>(index_iter: &mut I) -> Result<f64, FluxError>
where
    I: Iterator,
    I::Item: ToPrimitive,
{
    let item = index_iter.next().ok_or(FluxError::IndexStreamExhausted)?;
    match item.to_f64() {
        Some(value) if !value.is_nan() => Ok(value),
        _ => Err(FluxError::NumericConversionFailure),
    }
}

/// Running state of the PLL over one decode.
struct PllState {
    clock: f64,
    ticks: f64,
    nbits: usize,
    to_index: f64,
}

impl PllState {
    #[inline]
    fn process<I>(
        &mut self,
        params: &PllParams,
        x: f64,
        bits: &mut BitVec,
        times: &mut Vec<f64>,
        revolutions: &mut Vec<usize>,
        index_iter: &mut I,
    ) -> Result<(), FluxError>
    where
        I: Iterator,
        I::Item: ToPrimitive,
    {
        // Gather enough ticks to generate at least one bitcell.
        self.ticks += x / params.sample_freq;
        if self.ticks < self.clock / 2.0 {
            return Ok(());
        }

        // Clock out zero or more 0s, followed by a 1.
        let mut zeros = 0;
        loop {
            self.to_index -= self.clock;
            if self.to_index < 0.0 {
                log::trace!(
                    "PllState::process(): Index crossed after {} bits, clock: {}",
                    self.nbits,
                    format_us!(self.clock)
                );
                revolutions.push(self.nbits);
                self.nbits = 0;
                self.to_index += next_index(index_iter)?;
            }

            self.nbits += 1;
            self.ticks -= self.clock;
            times.push(self.clock);
            if self.ticks < self.clock / 2.0 {
                bits.push(true);
                break;
            }

            bits.push(false);
            zeros += 1;
        }

        if zeros <= MAX_SYNC_ZEROS {
            // In sync: adjust clock by a fraction of the phase mismatch.
            self.clock += self.ticks * params.period_adj;
        }
        else {
            // Out of sync: adjust clock towards centre.
            self.clock += (params.clock_centre - self.clock) * params.period_adj;
        }
        self.clock = self.clock.clamp(params.clock_min, params.clock_max);

        // Fold part of the phase mismatch into the bit just emitted.
        let new_ticks = self.ticks * (1.0 - params.phase_adj);
        if let Some(last) = times.last_mut() {
            *last += self.ticks - new_ticks;
        }
        self.ticks = new_ticks;

        Ok(())
    }
}

fn run_pll<F, I>(
    bits: &mut BitVec,
    times: &mut Vec<f64>,
    revolutions: &mut Vec<usize>,
    index_source: I,
    flux_source: F,
    params: &PllParams,
) -> Result<PllState, FluxError>
where
    F: IntoIterator,
    F::Item: ToPrimitive,
    I: IntoIterator,
    I::Item: ToPrimitive,
{
    params.validate()?;

    let mut index_iter = index_source.into_iter();
    let mut state = PllState {
        clock: params.clock_centre,
        ticks: 0.0,
        nbits: 0,
        to_index: next_index(&mut index_iter)?,
    };

    for item in flux_source {
        // An infinite sample can never be drained from the phase accumulator.
        let x = match item.to_f64() {
            Some(x) if x.is_finite() => x,
            _ => return Err(FluxError::NumericConversionFailure),
        };
        state.process(params, x, bits, times, revolutions, &mut index_iter)?;
    }

    Ok(state)
}

/// Convert a stream of flux intervals into bitcells.
///
/// Bits are appended to `bits`, the clock period assigned to each bit to `times`, and the number
/// of bits between successive index pulses to `revolutions`. `index_source` supplies the distance
/// to each index pulse in turn, in clock units; one value is consumed up front and another each
/// time a pulse is crossed. The flux source is consumed to exhaustion.
///
/// On error, anything already appended to the outputs is left in place.
///
/// Non-finite flux samples are rejected. A finite sample so large that subtracting the clock no
/// longer changes the phase accumulator is not detected, and the PLL will keep clocking out zeros
/// for it indefinitely; callers feeding untrusted values should bound them first.
pub fn flux_to_bitcells<F, I>(
    bits: &mut BitVec,
    times: &mut Vec<f64>,
    revolutions: &mut Vec<usize>,
    index_source: I,
    flux_source: F,
    params: &PllParams,
) -> Result<(), FluxError>
where
    F: IntoIterator,
    F::Item: ToPrimitive,
    I: IntoIterator,
    I::Item: ToPrimitive,
{
    run_pll(bits, times, revolutions, index_source, flux_source, params).map(|_| ())
}

/// The owned output of a PLL decode.
#[derive(Clone, Debug, Default)]
pub struct PllDecodeResult {
    /// Decoded bitcells. A `true` bit marks a flux transition.
    pub bits: BitVec,
    /// The duration of each bitcell, in clock units.
    pub times: Vec<f64>,
    /// The number of bits between successive index pulses. The first entry counts the bits from
    /// the start of the flux stream to the first index pulse.
    pub revolutions: Vec<usize>,
    /// The number of bits decoded after the last index pulse.
    pub tail_bits: usize,
}

impl PllDecodeResult {
    /// Return the range of bits covered by each entry of `revolutions`.
    pub fn revolution_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.revolutions
            .iter()
            .map(|&ct| {
                let range = start..start + ct;
                start += ct;
                range
            })
            .collect()
    }

    /// Return the bits and bitcell times of the specified revolution, if present.
    pub fn revolution(&self, rev: usize) -> Option<(BitVec, &[f64])> {
        let range = self.revolution_ranges().into_iter().nth(rev)?;
        let bits = self.bits.iter().skip(range.start).take(range.len()).collect();
        Some((bits, &self.times[range]))
    }

    /// The total time covered by the decoded bitcells.
    pub fn total_time(&self) -> f64 {
        self.times.iter().sum()
    }
}

/// A bitcell PLL configured with a set of [PllParams].
pub struct Pll {
    params: PllParams,
}

impl Default for Pll {
    fn default() -> Self {
        Pll::new(PllParams::default())
    }
}

impl Pll {
    pub fn new(params: PllParams) -> Self {
        Pll { params }
    }

    pub fn params(&self) -> &PllParams {
        &self.params
    }

    pub fn set_clock(&mut self, clock: f64, max_adj: Option<f64>) {
        let max_adj = max_adj.unwrap_or_else(|| self.params.max_adjust());
        self.params = self.params.with_clock(clock, max_adj);
        log::debug!(
            "Pll::set_clock(): Setting clock to {}, max adjust: {:.2} range: {}-{}",
            format_us!(self.params.clock_centre),
            max_adj,
            format_us!(self.params.clock_min),
            format_us!(self.params.clock_max)
        );
    }

    /// Decode a flux stream into a new [PllDecodeResult].
    pub fn decode<F, I>(&self, flux_source: F, index_source: I) -> Result<PllDecodeResult, FluxError>
    where
        F: IntoIterator,
        F::Item: ToPrimitive,
        I: IntoIterator,
        I::Item: ToPrimitive,
    {
        // Output grows with the decode. The source's size hint may describe an effectively
        // unbounded stream, so nothing is reserved from it.
        let mut result = PllDecodeResult::default();

        let state = run_pll(
            &mut result.bits,
            &mut result.times,
            &mut result.revolutions,
            index_source,
            flux_source,
            &self.params,
        )?;
        result.tail_bits = state.nbits;

        log::debug!(
            "Pll::decode(): Decoded {} bits over {} revolution boundaries. Final clock: {}",
            result.bits.len(),
            result.revolutions.len(),
            format_us!(state.clock)
        );

        Ok(result)
    }
}
