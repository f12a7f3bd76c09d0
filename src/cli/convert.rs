//! Converting ensemble files between formats
//!
//! This is meant to be used from the command line interface:
//! ```console
//! $ adw convert <input> <output> --to pd0
//! ```
use crate::cli::decode_any;
use crate::codec::{pd0, rti, transcode};

/// Target wire format for a conversion
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Emit RTI ensembles
    Rti,
    /// Emit PD0 ensembles
    Pd0,
}

/// Convert an ensemble file to the target format
///
/// The source format is detected from the file contents. Ensembles
/// already in the target format are decoded and re-emitted, which
/// normalizes dataset order but preserves every recognized dataset.
pub fn convert(
    input: &std::path::PathBuf,
    output: &std::path::PathBuf,
    to: Target,
) -> std::io::Result<()> {
    let bytes = std::fs::read(input)?;
    let (_, ensembles) = decode_any(&bytes);
    let mut converted = Vec::new();
    for ens in &ensembles {
        match to {
            Target::Pd0 => {
                converted.extend_from_slice(&pd0::encode(ens, transcode::preferred_xform(ens)));
            }
            Target::Rti => converted.extend_from_slice(&rti::encode(ens)),
        }
    }
    std::fs::write(output, converted)
}
