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
use crate::args::*;
use bpaf::{construct, long, Parser};
use std::path::PathBuf;

/// How the PLL's centre clock is chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum ClockSource {
    Default,
    /// MFM data rate in Kbps.
    Rate(u32),
    /// Bitcell period in microseconds.
    Clock(f64),
    /// Estimated from a histogram of the capture's flux intervals.
    Auto,
}

#[derive(Clone, Debug)]
pub struct BitcellParams {
    pub(crate) in_file: PathBuf,
    pub(crate) sample_freq: f64,
    pub(crate) clock: ClockSource,
    pub(crate) max_adj: Option<f64>,
    pub(crate) period_adj: Option<f64>,
    pub(crate) phase_adj: Option<f64>,
    pub(crate) dump: Option<DumpFormat>,
    pub(crate) rev: Option<usize>,
}

fn clock_source_parser() -> impl Parser<ClockSource> {
    let rate = long("rate")
        .argument::<u32>("KBPS")
        .help("Set the PLL clock for an MFM track of the given data rate in Kbps")
        .guard(|&rate| rate > 0, "Data rate must be positive")
        .map(ClockSource::Rate);
    let clock = long("clock")
        .argument::<f64>("US")
        .help("Set the PLL clock to the given bitcell period in microseconds")
        .guard(|&clock| clock.is_finite() && clock > 0.0, "Clock must be positive")
        .map(ClockSource::Clock);
    let auto = long("auto_clock")
        .help("Estimate the PLL clock from the capture's flux intervals")
        .req_flag(ClockSource::Auto);

    construct!([rate, clock, auto]).fallback(ClockSource::Default)
}

fn fraction_parser(name: &'static str, help: &'static str) -> impl Parser<Option<f64>> {
    long(name)
        .argument::<f64>("FRACTION")
        .help(help)
        .guard(|&f| (0.0..=1.0).contains(&f), "Value must be between 0 and 1")
        .optional()
}

fn dump_format_parser() -> impl Parser<DumpFormat> {
    long("dump")
        .short('d')
        .argument::<DumpFormat>("FORMAT")
        .help("Dump the bits of one revolution: binary or hex")
}

fn rev_parser() -> impl Parser<usize> {
    long("rev")
        .argument::<usize>("REV")
        .help("Revolution to dump. Revolution 0 runs from the start of the capture to the first index")
}

pub(crate) fn bitcells_parser() -> impl Parser<BitcellParams> {
    let in_file = in_file_parser();
    let sample_freq = sample_freq_parser();
    let clock = clock_source_parser();
    let max_adj = fraction_parser("max_adj", "Maximum fractional deviation of the clock from its centre");
    let period_adj = fraction_parser("period_adj", "Fraction of the phase error applied to the clock period");
    let phase_adj = fraction_parser("phase_adj", "Fraction of the phase error corrected after each transition");
    let dump = dump_format_parser().optional();
    let rev = rev_parser().optional();

    construct!(BitcellParams {
        in_file,
        sample_freq,
        clock,
        max_adj,
        period_adj,
        phase_adj,
        dump,
        rev
    })
}
