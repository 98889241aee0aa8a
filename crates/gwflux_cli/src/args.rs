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
use bpaf::*;
use gwflux::flux::pll::DEFAULT_SAMPLE_FREQ;
use std::{
    fmt,
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
};

use crate::{
    bitcells::args::{bitcells_parser, BitcellParams},
    info::args::{info_parser, InfoParams},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DumpFormat {
    Binary,
    Hex,
}

impl FromStr for DumpFormat {
    type Err = &'static str;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "binary" => Ok(DumpFormat::Binary),
            "hex" => Ok(DumpFormat::Hex),
            _ => Err("Invalid format; expected 'binary' or 'hex'"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Command {
    Version,
    Info(InfoParams),
    Bitcells(BitcellParams),
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Command::Version => write!(f, "version"),
            Command::Info(_) => write!(f, "info"),
            Command::Bitcells(_) => write!(f, "bitcells"),
        }
    }
}

#[derive(Debug)]
pub struct AppParams {
    pub global: GlobalOptions,
    pub command: Command,
}

#[derive(Debug)]
pub struct GlobalOptions {
    pub silent: bool,
    pub time: bool,
    pub backtrace: bool,
}

pub fn global_options_parser() -> impl Parser<GlobalOptions> {
    let silent = long("silent")
        .help("Suppress all output except required output")
        .switch();
    let time = long("time")
        .help("Print elapsed time after the command is executed")
        .switch();
    let backtrace = long("bt")
        .help("Print full error details if the command fails")
        .switch();

    construct!(GlobalOptions { silent, time, backtrace })
}

pub(crate) fn in_file_parser() -> impl Parser<PathBuf> {
    long("in_file")
        .short('i')
        .argument::<PathBuf>("IN_FILE")
        .help("Path to a raw flux capture file")
}

pub(crate) fn sample_freq_parser() -> impl Parser<f64> {
    long("sample_freq")
        .argument::<f64>("HZ")
        .help("Sample clock frequency of the capture hardware, in Hz")
        .guard(|&freq| freq.is_finite() && freq > 0.0, "Sample frequency must be positive")
        .fallback(DEFAULT_SAMPLE_FREQ)
}

pub(crate) fn command_parser() -> impl Parser<AppParams> {
    let global = global_options_parser();

    let version = pure(Command::Version)
        .to_options()
        .command("version")
        .help("Display version information and exit");

    let info = construct!(Command::Info(info_parser()))
        .to_options()
        .command("info")
        .help("Display information about a raw flux capture");
    let bitcells = construct!(Command::Bitcells(bitcells_parser()))
        .to_options()
        .command("bitcells")
        .help("Decode a raw flux capture into bitcells");

    let command = construct!([version, info, bitcells]);

    construct!(AppParams { global, command })
}
