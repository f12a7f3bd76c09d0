use std::io::{stdout, Write};

use crate::cli::decode_any;
use crate::model::Ensemble;

fn dataset_counts(ensembles: &[Ensemble]) -> Vec<(&'static str, usize)> {
    let tally = |f: fn(&Ensemble) -> bool| ensembles.iter().filter(|e| f(e)).count();
    vec![
        ("Ensemble", ensembles.len()),
        ("Ancillary", tally(|e| e.ancillary.is_some())),
        ("BeamVelocity", tally(|e| e.beam_velocity.is_some())),
        ("InstrumentVelocity", tally(|e| e.instrument_velocity.is_some())),
        ("EarthVelocity", tally(|e| e.earth_velocity.is_some())),
        ("ShipVelocity", tally(|e| e.ship_velocity.is_some())),
        ("Amplitude", tally(|e| e.amplitude.is_some())),
        ("Correlation", tally(|e| e.correlation.is_some())),
        ("GoodBeam", tally(|e| e.good_beam.is_some())),
        ("GoodInstrument", tally(|e| e.good_instrument.is_some())),
        ("GoodEarth", tally(|e| e.good_earth.is_some())),
        ("BottomTrack", tally(|e| e.bottom_track.is_some())),
        ("SystemSetup", tally(|e| e.system_setup.is_some())),
        ("Nmea", tally(|e| e.nmea.is_some())),
        ("InstrumentWaterMass", tally(|e| e.instrument_water_mass.is_some())),
        ("EarthWaterMass", tally(|e| e.earth_water_mass.is_some())),
    ]
}

pub fn count(path: std::path::PathBuf, output: Option<std::path::PathBuf>) -> std::io::Result<()> {
    let bytes = std::fs::read(path)?;
    let (_, ensembles) = decode_any(&bytes);
    let counts = dataset_counts(&ensembles);

    match output {
        Some(path) => {
            let mut writer = std::fs::File::create(path)?;
            for (key, value) in &counts {
                writeln!(writer, "{}\t{}", value, key)?;
            }
        }
        None => {
            let mut writer = stdout().lock();
            for (key, value) in &counts {
                writeln!(writer, "{}\t{}", value, key)?;
            }
        }
    };
    Ok(())
}
