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

//! This module defines a [FluxHistogram] structure which is used to estimate
//! the bitcell clock of a flux capture so that the PLL may be properly
//! initialized for decoding.
//!
//! Flux intervals cluster around whole multiples of the bitcell period. Runs
//! of adjacent populated buckets are merged into a [FluxPeak] per cluster.
//! The first cluster is the shortest legal transition, which for MFM spans
//! two bitcells.

use crate::{format_us, DiskDataRate};
use histogram::{Bucket, Histogram};
use std::ops::RangeInclusive;

const STANDARD_RATES: [DiskDataRate; 5] = [
    DiskDataRate::Rate125Kbps,
    DiskDataRate::Rate250Kbps,
    DiskDataRate::Rate300Kbps,
    DiskDataRate::Rate500Kbps,
    DiskDataRate::Rate1000Kbps,
];

/// A cluster of flux intervals around one transition length.
#[derive(Clone, Debug, PartialEq)]
pub struct FluxPeak {
    /// Number of intervals in the cluster.
    pub count: u64,
    /// Count-weighted mean interval of the cluster, in seconds.
    pub centre: f64,
    /// Span of the cluster's buckets, in nanoseconds.
    pub range: RangeInclusive<u64>,
}

struct PeakBuilder {
    start: u64,
    end: u64,
    count: u64,
    weighted_ns: f64,
}

impl PeakBuilder {
    fn new(start: u64) -> Self {
        PeakBuilder {
            start,
            end: start,
            count: 0,
            weighted_ns: 0.0,
        }
    }

    fn add(&mut self, bucket: &Bucket) {
        let midpoint = (bucket.start() + bucket.end()) as f64 / 2.0;
        self.count += bucket.count();
        self.weighted_ns += bucket.count() as f64 * midpoint;
        self.end = bucket.end();
    }

    fn finish(self) -> FluxPeak {
        FluxPeak {
            count: self.count,
            centre: self.weighted_ns / self.count as f64 / 1_000_000_000.0,
            range: self.start..=self.end,
        }
    }
}

pub struct FluxHistogram {
    histogram: Histogram,
    total_time: f64,
}

impl FluxHistogram {
    /// Produce a [FluxHistogram] over a fraction of the flux intervals in a capture.
    /// # Arguments
    /// * `deltas` - A slice of flux interval times, in seconds
    /// * `fraction` - The fraction of the intervals to use in the histogram
    pub fn new(deltas: &[f64], fraction: f64) -> Self {
        // Max value power of 2^14 = 16384 (16us)
        // Grouping power of 3 keeps each MFM transition length within a few adjacent buckets
        let mut histogram = Histogram::new(3, 14).expect("valid histogram configuration");

        let take_count = (deltas.len() as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
        log::debug!("FluxHistogram::new(): Taking {} flux deltas", take_count);
        let mut total_time = 0.0;
        for delta in deltas.iter().take(take_count) {
            total_time += delta;
            // Intervals beyond the histogram's range are not useful for clock detection.
            _ = histogram.increment((delta * 1_000_000_000.0) as u64);
        }

        FluxHistogram { histogram, total_time }
    }

    /// Total time of the intervals sampled into the histogram, in seconds.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Group adjacent buckets into peaks, shortest interval first. Buckets holding less than
    /// `threshold` of the total count (default 0.5%) separate peaks and are otherwise ignored.
    pub fn peaks(&self, threshold: Option<f64>) -> Vec<FluxPeak> {
        let total_count: u64 = (&self.histogram).into_iter().map(|bucket| bucket.count()).sum();
        let min_count = ((total_count as f64 * threshold.unwrap_or(0.005)).round() as u64).max(1);

        let mut peaks = Vec::new();
        let mut current: Option<PeakBuilder> = None;
        for bucket in (&self.histogram).into_iter() {
            let populated = bucket.count() >= min_count;
            let contiguous = current.as_ref().is_some_and(|peak| peak.end + 1 == bucket.start());
            if !populated || !contiguous {
                peaks.extend(current.take().map(PeakBuilder::finish));
            }
            if populated {
                current.get_or_insert_with(|| PeakBuilder::new(bucket.start())).add(&bucket);
            }
        }
        peaks.extend(current.take().map(PeakBuilder::finish));

        for peak in peaks.iter() {
            log::debug!(
                "FluxHistogram::peaks(): Peak at {} range: {:?} ct: {}",
                format_us!(peak.centre),
                peak.range,
                peak.count
            );
        }
        peaks
    }

    /// Attempt to calculate the base (short) transition time, in seconds.
    /// At least two peaks are required for the shortest one to be meaningful.
    pub fn base_transition_time(&self) -> Option<f64> {
        let peaks = self.peaks(None);
        if peaks.len() < 2 {
            log::warn!("FluxHistogram::base_transition_time(): Not enough peaks found");
            return None;
        }
        Some(peaks[0].centre)
    }

    /// Return the centre of the peak closest to the short MFM transition of `rate`. This skips
    /// clusters of noise shorter than the real transitions.
    pub fn short_transition_for(&self, rate: DiskDataRate) -> Option<f64> {
        let expected = rate.mfm_bitcell() * 2.0;
        self.peaks(None)
            .into_iter()
            .map(|peak| peak.centre)
            .min_by(|a, b| (a - expected).abs().total_cmp(&(b - expected).abs()))
    }

    /// Return the standard data rate whose short MFM transition is closest to the base
    /// transition time.
    pub fn nearest_data_rate(&self) -> Option<DiskDataRate> {
        let base = self.base_transition_time()?;
        STANDARD_RATES.into_iter().min_by(|a, b| {
            let a_err = (a.mfm_bitcell() * 2.0 - base).abs();
            let b_err = (b.mfm_bitcell() * 2.0 - base).abs();
            a_err.total_cmp(&b_err)
        })
    }

    /// Estimate the bitcell clock of an MFM capture: half the base transition time.
    pub fn mfm_clock_estimate(&self) -> Option<f64> {
        self.base_transition_time().map(|t| t / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mfm_deltas(count: usize) -> Vec<f64> {
        // 4us, 6us and 8us transitions, with the short transition most common.
        (0..count)
            .map(|i| match i % 6 {
                0 | 1 | 2 => 4.0e-6,
                3 | 4 => 6.0e-6,
                _ => 8.0e-6,
            })
            .collect()
    }

    #[test]
    fn test_mfm_peaks() {
        let histogram = FluxHistogram::new(&mfm_deltas(3000), 1.0);

        let peaks = histogram.peaks(None);
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks.iter().map(|p| p.count).collect::<Vec<_>>(), vec![1500, 1000, 500]);

        let base = histogram.base_transition_time().unwrap();
        assert!((base - 4.0e-6).abs() < 0.5e-6, "base transition: {}", base);

        let clock = histogram.mfm_clock_estimate().unwrap();
        assert!((clock - 2.0e-6).abs() < 0.25e-6, "clock: {}", clock);
        assert_eq!(histogram.nearest_data_rate(), Some(DiskDataRate::Rate250Kbps));
    }

    #[test]
    fn test_short_transition_skips_noise() {
        let mut deltas = mfm_deltas(3000);
        deltas.extend(std::iter::repeat(1.0e-6).take(100));
        let histogram = FluxHistogram::new(&deltas, 1.0);

        let base = histogram.base_transition_time().unwrap();
        assert!((base - 1.0e-6).abs() < 0.1e-6, "base transition: {}", base);

        let short = histogram.short_transition_for(DiskDataRate::Rate250Kbps).unwrap();
        assert!((short - 4.0e-6).abs() < 0.5e-6, "short transition: {}", short);
    }

    #[test]
    fn test_single_peak() {
        let deltas = vec![4.0e-6; 100];
        let histogram = FluxHistogram::new(&deltas, 1.0);
        assert_eq!(histogram.peaks(None).len(), 1);
        assert_eq!(histogram.base_transition_time(), None);
        assert_eq!(histogram.nearest_data_rate(), None);
    }

    #[test]
    fn test_fraction() {
        let histogram = FluxHistogram::new(&mfm_deltas(600), 0.5);
        // 50 groups of 4+4+4+6+6+8us.
        assert!((histogram.total_time() - 50.0 * 32.0e-6).abs() < 1e-12);
    }
}
