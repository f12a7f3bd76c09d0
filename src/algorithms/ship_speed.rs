//! Ship-speed removal
//!
//! Water velocities measured from a moving platform include the
//! platform's own motion. Removal adds a correction triple to the east,
//! north and vertical component of every good cell. Bottom-track earth
//! velocities are stored with inverted sign relative to the water
//! velocities, so the bottom-track triple (and a previous one carried
//! over by the caller) is applied by addition; the GPS-derived triple
//! follows the same sign convention.
use crate::model::{Ensemble, BAD_VELOCITY};

/// Remove the platform velocity from an ensemble's earth velocities
///
/// Correction sources, in priority order:
///
/// 1. bottom-track earth velocity, when `use_bt` and east/north/vertical
///    are all good (and the error component too, when `require_q`);
/// 2. GPS course over ground, when `use_gps` and a VTG speed is
///    available: east = speed·sin(heading + `gps_heading_offset`),
///    north = speed·cos(heading + `gps_heading_offset`), with the
///    heading from HDT, else the VTG track, else the ancillary heading;
///    the vertical comes from a good bottom-track vertical, else 0;
/// 3. the caller's previous good triple `prev`.
///
/// Returns the applied triple so the caller can carry it forward, or
/// `None` when no source is usable, in which case the ensemble is left
/// untouched. Cells holding [`BAD_VELOCITY`] are never modified.
pub fn remove(
    ens: &mut Ensemble,
    prev: Option<[f32; 3]>,
    use_bt: bool,
    use_gps: bool,
    gps_heading_offset: f32,
    require_q: bool,
) -> Option<[f32; 3]> {
    ens.earth_velocity.as_ref()?;
    let triple = select_source(ens, prev, use_bt, use_gps, gps_heading_offset, require_q)?;
    let m = ens.earth_velocity.as_mut()?;
    let components = m.beams().min(3);
    for bin in 0..m.bins() {
        for comp in 0..components {
            let value = m.get(bin, comp);
            if value != BAD_VELOCITY {
                m.set(bin, comp, value + triple[comp]);
            }
        }
    }
    Some(triple)
}

fn bottom_track_triple(ens: &Ensemble, require_q: bool) -> Option<[f32; 3]> {
    let bt = ens.bottom_track.as_ref()?;
    if bt.earth_velocity.len() < 3 {
        return None;
    }
    let east = bt.earth_velocity[0];
    let north = bt.earth_velocity[1];
    let vertical = bt.earth_velocity[2];
    if east == BAD_VELOCITY || north == BAD_VELOCITY || vertical == BAD_VELOCITY {
        return None;
    }
    if require_q {
        let q = bt.earth_velocity.get(3).copied()?;
        if q == BAD_VELOCITY {
            return None;
        }
    }
    Some([east, north, vertical])
}

fn gps_triple(ens: &Ensemble, gps_heading_offset: f32) -> Option<[f32; 3]> {
    let nmea = ens.nmea.as_ref()?;
    let speed = nmea.vtg_speed?;
    let heading = nmea
        .hdt_heading
        .or(nmea.vtg_track)
        .or_else(|| ens.ancillary.as_ref().map(|a| a.heading))?;
    let radians = (heading + gps_heading_offset).to_radians();
    let vertical = ens
        .bottom_track
        .as_ref()
        .and_then(|bt| bt.earth_velocity.get(2).copied())
        .filter(|&v| v != BAD_VELOCITY)
        .unwrap_or(0.0);
    Some([speed * radians.sin(), speed * radians.cos(), vertical])
}

fn select_source(
    ens: &Ensemble,
    prev: Option<[f32; 3]>,
    use_bt: bool,
    use_gps: bool,
    gps_heading_offset: f32,
    require_q: bool,
) -> Option<[f32; 3]> {
    if use_bt {
        if let Some(triple) = bottom_track_triple(ens, require_q) {
            return Some(triple);
        }
    }
    if use_gps {
        if let Some(triple) = gps_triple(ens, gps_heading_offset) {
            return Some(triple);
        }
    }
    prev
}
