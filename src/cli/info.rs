//! Print info about an ensemble file
use time::OffsetDateTime;

use crate::cli::decode_any;

/// Print info about an ensemble file
pub fn info<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<()> {
    let bytes = std::fs::read(path.as_ref())?;
    let (format, ensembles) = decode_any(&bytes);

    let mut start_date = OffsetDateTime::now_utc();
    let mut end_date = OffsetDateTime::UNIX_EPOCH;
    let mut dimensions = std::collections::HashSet::new();
    let mut bottom_track_count = 0;

    for ens in &ensembles {
        if let Some(ed) = &ens.ensemble_data {
            dimensions.insert((ed.num_bins, ed.num_beams));
            if let Some(ts) = ed.timestamp() {
                if ts < start_date {
                    start_date = ts;
                }
                if ts > end_date {
                    end_date = ts;
                }
            }
        }
        if ens.bottom_track.is_some() {
            bottom_track_count += 1;
        }
    }

    println!("File: {}", path.as_ref().display());
    println!("Format: {}", format);
    println!("Number of ensembles: {}", ensembles.len());
    println!("Ensembles with bottom track: {}", bottom_track_count);
    if end_date > OffsetDateTime::UNIX_EPOCH {
        println!("Start date: {}", start_date);
        println!("End date: {}", end_date);
    }
    println!("Unique (bins, beams) dimensions:");
    for (bins, beams) in &dimensions {
        println!("\t{} x {}", bins, beams);
    }

    Ok(())
}
