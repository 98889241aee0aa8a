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
pub mod bitcells;
pub mod info;

use anyhow::{Context, Error};
use bpaf::Parser;
use gwflux::FluxCapture;
use std::{path::Path, time::Instant};

use crate::args::Command;
use args::command_parser;

fn main() -> Result<(), Error> {
    env_logger::init();

    let app_params = command_parser().run();
    let start_time = Instant::now();

    let command_result = match &app_params.command {
        Command::Version => {
            println!("gwflux v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Info(params) => info::run(&app_params.global, params),
        Command::Bitcells(params) => bitcells::run(&app_params.global, params),
    };

    if app_params.global.time {
        println!("Time elapsed: {:.2} seconds", start_time.elapsed().as_secs_f64());
    }

    match command_result {
        Ok(_) => Ok(()),
        Err(e) => {
            if app_params.global.backtrace {
                eprintln!("Command '{}' failed: {:?}", app_params.command, e);
            }
            else {
                eprintln!("Command '{}' failed: {}", app_params.command, e);
                for cause in e.chain().skip(1) {
                    eprintln!("Caused by: {}", cause);
                }
            }
            std::process::exit(1);
        }
    }
}

/// Read and decode a raw flux capture file.
pub(crate) fn read_capture(path: &Path, sample_freq: f64) -> Result<FluxCapture, Error> {
    let buffer = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    log::debug!("read_capture(): Read {} bytes from {}", buffer.len(), path.display());

    let capture = FluxCapture::from_bytes(&buffer, sample_freq)
        .with_context(|| format!("Failed to decode flux stream {}", path.display()))?;
    Ok(capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_capture() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[100, 200, 255, 1, 1, 1, 1, 1, 50, 0]).unwrap();

        let capture = read_capture(file.path(), 1000.0).unwrap();
        assert_eq!(capture.flux, vec![100, 200, 50]);
        assert_eq!(capture.index, vec![300]);
    }

    #[test]
    fn test_read_capture_error_chain() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[100, 200]).unwrap();

        let err = read_capture(file.path(), 1000.0).unwrap_err();
        assert!(err.to_string().starts_with("Failed to decode flux stream"));
        assert_eq!(err.chain().nth(1).unwrap().to_string(), "Flux is not NUL-terminated");
    }

    #[test]
    fn test_command_parser() {
        let params = command_parser()
            .to_options()
            .run_inner(&["--time", "bitcells", "-i", "track.raw", "--rate", "250", "--dump", "hex"])
            .unwrap();

        assert!(params.global.time);
        match params.command {
            Command::Bitcells(p) => {
                assert_eq!(p.clock, bitcells::args::ClockSource::Rate(250));
                assert_eq!(p.dump, Some(args::DumpFormat::Hex));
                assert_eq!(p.sample_freq, gwflux::flux::pll::DEFAULT_SAMPLE_FREQ);
            }
            other => panic!("unexpected command: {}", other),
        }
    }
}
