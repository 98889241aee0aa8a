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
use crate::{args::GlobalOptions, read_capture};
use anyhow::Error;
use gwflux::{format_ms, format_us, FluxHistogram};

pub mod args;

pub(crate) fn run(global: &GlobalOptions, params: &args::InfoParams) -> Result<(), Error> {
    let capture = read_capture(&params.in_file, params.sample_freq)?;

    println!("{}", capture);
    if !global.silent {
        println!("Sample frequency: {:.0}Hz", capture.sample_freq);
        println!("Index pulses: {}", capture.index.len());
        println!("{}", "-".repeat(79));
    }

    if let Some(&first) = capture.index.first() {
        println!(
            "  First index after {}",
            format_ms!(first as f64 / capture.sample_freq)
        );
    }
    for (i, time) in capture.index_times().iter().enumerate() {
        println!("  Rev {}: {} ({:.2} RPM)", i, format_ms!(time), 60.0 / time);
    }

    match capture.rpm() {
        Some(rpm) => println!("Mean RPM: {:.2}", rpm),
        None => println!("Capture does not contain a complete revolution"),
    }

    if params.histogram {
        let histogram = FluxHistogram::new(&capture.flux_times(), 1.0);
        for peak in histogram.peaks(None) {
            println!("  Peak at {}: {} transitions", format_us!(peak.centre), peak.count);
        }
        match histogram.base_transition_time() {
            Some(base) => {
                println!("Base transition time: {}", format_us!(base));
                println!("Estimated MFM bitcell clock: {}", format_us!(base / 2.0));
            }
            None => println!("Unable to estimate the bitcell clock"),
        }
        if let Some(rate) = histogram.nearest_data_rate() {
            println!("Nearest standard MFM data rate: {}", rate);
        }
    }

    Ok(())
}
