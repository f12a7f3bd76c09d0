//! The command-line interface
use clap::Parser;

pub mod convert;
pub mod count;
pub mod info;

/// Top-level command-line arguments
#[derive(Parser, Debug)]
#[command(name = "adw", about = "Work with acoustic Doppler current profiler data")]
pub struct Args {
    /// The subcommand to run
    #[command(subcommand)]
    pub cmd: Action,
}

/// The available subcommands
#[derive(clap::Subcommand, Debug)]
pub enum Action {
    /// Print summary information about an ensemble file
    Info {
        /// Path to an RTI or PD0 ensemble file
        path: std::path::PathBuf,
    },
    /// Count the datasets recorded in an ensemble file
    Count {
        /// Path to an RTI or PD0 ensemble file
        path: std::path::PathBuf,
        /// Write counts here instead of standard output
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Convert an ensemble file between the RTI and PD0 formats
    Convert {
        /// Path to the input ensemble file
        input: std::path::PathBuf,
        /// Path for the converted output
        output: std::path::PathBuf,
        /// Target format
        #[arg(long, value_enum)]
        to: convert::Target,
    },
}

/// An ensemble file decoded without caring which format it was in
pub(crate) fn decode_any(bytes: &[u8]) -> (&'static str, Vec<crate::model::Ensemble>) {
    let rti: Vec<_> = crate::codec::rti::decode_stream(bytes)
        .into_iter()
        .map(|(_, e)| e)
        .collect();
    let pd0: Vec<_> = crate::codec::pd0::decode_stream(bytes)
        .into_iter()
        .map(|(_, e)| e)
        .collect();
    if rti.len() >= pd0.len() {
        ("RTI", rti)
    } else {
        ("PD0", pd0)
    }
}
