/*
    gwflux_cli
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
pub mod args;

use crate::{
    args::{DumpFormat, GlobalOptions},
    read_capture,
};
use anyhow::{anyhow, Context, Error};
use args::{BitcellParams, ClockSource};
use bit_vec::BitVec;
use gwflux::{format_ms, format_us, DiskDataRate, FluxCapture, FluxHistogram, PllParams};
use std::io::{BufWriter, Write};

/// Build the PLL configuration requested on the command line.
pub(crate) fn pll_params(params: &BitcellParams, capture: &FluxCapture) -> Result<PllParams, Error> {
    let mut pll_params = PllParams::default().with_sample_freq(capture.sample_freq);
    let max_adj = params.max_adj.unwrap_or_else(|| pll_params.max_adjust());

    let clock = match params.clock {
        ClockSource::Default => pll_params.clock_centre,
        ClockSource::Rate(kbps) => {
            let bps = kbps
                .checked_mul(1000)
                .ok_or_else(|| anyhow!("Data rate of {}Kbps is out of range", kbps))?;
            DiskDataRate::from(bps).mfm_bitcell()
        }
        ClockSource::Clock(us) => us / 1_000_000.0,
        ClockSource::Auto => {
            let histogram = FluxHistogram::new(&capture.flux_times(), 1.0);
            histogram
                .mfm_clock_estimate()
                .ok_or_else(|| anyhow!("Unable to estimate the bitcell clock from the capture"))?
        }
    };
    pll_params = pll_params.with_clock(clock, max_adj);

    pll_params = pll_params.with_gains(
        params.period_adj.unwrap_or(pll_params.period_adj),
        params.phase_adj.unwrap_or(pll_params.phase_adj),
    );

    pll_params.validate()?;
    Ok(pll_params)
}

pub(crate) fn dump_bits<W: Write>(bits: &BitVec, format: DumpFormat, out: &mut W) -> std::io::Result<()> {
    match format {
        DumpFormat::Binary => {
            let line_bits = bits.iter().map(|b| if b { '1' } else { '0' }).collect::<Vec<_>>();
            for (i, line) in line_bits.chunks(64).enumerate() {
                writeln!(out, "{:06}: {}", i * 64, line.iter().collect::<String>())?;
            }
        }
        DumpFormat::Hex => {
            // Trailing bits of a partial byte are padded with zeros.
            let bytes = bits.to_bytes();
            for (i, row) in bytes.chunks(16).enumerate() {
                let hex = row.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(" ");
                writeln!(out, "{:05X}: {}", i * 16, hex)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn run(global: &GlobalOptions, params: &BitcellParams) -> Result<(), Error> {
    let capture = read_capture(&params.in_file, params.sample_freq)?;
    let pll_params = pll_params(params, &capture)?;

    if !global.silent {
        println!("{}", capture);
        println!(
            "PLL clock: {} ({} - {}) period_adj: {:.3} phase_adj: {:.3}",
            format_us!(pll_params.clock_centre),
            format_us!(pll_params.clock_min),
            format_us!(pll_params.clock_max),
            pll_params.period_adj,
            pll_params.phase_adj
        );
    }

    let result = capture
        .to_bitcells(&pll_params)
        .with_context(|| format!("Failed to decode bitcells from {}", params.in_file.display()))?;

    println!(
        "Decoded {} bitcells in {}",
        result.bits.len(),
        format_ms!(result.total_time())
    );
    for (i, range) in result.revolution_ranges().into_iter().enumerate() {
        let times = &result.times[range.clone()];
        let mean = if times.is_empty() {
            0.0
        }
        else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        println!("  Rev {}: {} bits, mean bitcell {}", i, range.len(), format_us!(mean));
    }
    if !global.silent {
        println!("  {} bits after last index", result.tail_bits);
    }

    if let Some(format) = params.dump {
        // Revolution 0 is only the lead-in to the first index, so prefer the first full revolution.
        let rev = params.rev.unwrap_or(if result.revolutions.len() > 1 { 1 } else { 0 });
        let (bits, _) = result
            .revolution(rev)
            .ok_or_else(|| anyhow!("Revolution {} is not present in the capture", rev))?;

        let mut out = BufWriter::new(std::io::stdout());
        dump_bits(&bits, format, &mut out)?;
        out.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bitcell_params(clock: ClockSource) -> BitcellParams {
        BitcellParams {
            in_file: PathBuf::from("capture.raw"),
            sample_freq: 72_000_000.0,
            clock,
            max_adj: None,
            period_adj: None,
            phase_adj: None,
            dump: None,
            rev: None,
        }
    }

    #[test]
    fn test_pll_params_from_rate() {
        let capture = FluxCapture::new(vec![], vec![], 36_000_000.0);
        let params = pll_params(&bitcell_params(ClockSource::Rate(500)), &capture).unwrap();
        assert!((params.clock_centre - 1.0e-6).abs() < 1e-15);
        assert_eq!(params.sample_freq, 36_000_000.0);
    }

    #[test]
    fn test_pll_params_rate_out_of_range() {
        let capture = FluxCapture::new(vec![], vec![], 72_000_000.0);
        let err = pll_params(&bitcell_params(ClockSource::Rate(5_000_000)), &capture).unwrap_err();
        assert_eq!(err.to_string(), "Data rate of 5000000Kbps is out of range");
    }

    #[test]
    fn test_pll_params_overrides() {
        let capture = FluxCapture::new(vec![], vec![], 72_000_000.0);
        let mut cli = bitcell_params(ClockSource::Clock(4.0));
        cli.max_adj = Some(0.2);
        cli.phase_adj = Some(0.3);

        let params = pll_params(&cli, &capture).unwrap();
        assert!((params.clock_centre - 4.0e-6).abs() < 1e-15);
        assert!((params.clock_max - 4.8e-6).abs() < 1e-15);
        assert_eq!(params.phase_adj, 0.3);
        assert_eq!(params.period_adj, PllParams::default().period_adj);
    }

    #[test]
    fn test_pll_params_auto_needs_flux() {
        let capture = FluxCapture::new(vec![], vec![], 72_000_000.0);
        assert!(pll_params(&bitcell_params(ClockSource::Auto), &capture).is_err());
    }

    #[test]
    fn test_dump_bits() {
        let bits = BitVec::from_bytes(&[0xA5, 0x0F]);

        let mut out = Vec::new();
        dump_bits(&bits, DumpFormat::Hex, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "00000: A5 0F\n");

        let mut out = Vec::new();
        dump_bits(&bits, DumpFormat::Binary, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "000000: 1010010100001111\n");
    }
}
