//! Converting ensembles between the two wire formats
//!
//! Transcoding is decode composed with encode through the canonical
//! model; there is no shortcut path with different semantics. The
//! stream variants run the composition per frame so one corrupt
//! ensemble never poisons the rest of a file.
use crate::codec::{pd0, rti};
use crate::error::Result;
use crate::model::{CoordTransform, Ensemble};

/// The coordinate frame a PD0 emission should use for an ensemble
///
/// Earth wins when present, then instrument, then beam, then ship.
pub fn preferred_xform(ens: &Ensemble) -> CoordTransform {
    if ens.earth_velocity.is_some() {
        CoordTransform::Earth
    } else if ens.instrument_velocity.is_some() {
        CoordTransform::Instrument
    } else if ens.beam_velocity.is_some() {
        CoordTransform::Beam
    } else if ens.ship_velocity.is_some() {
        CoordTransform::Ship
    } else {
        CoordTransform::Earth
    }
}

/// Re-emit one RTI frame as a PD0 frame
pub fn rti_to_pd0(bytes: &[u8]) -> Result<Vec<u8>> {
    let ens = rti::decode(bytes)?;
    Ok(pd0::encode(&ens, preferred_xform(&ens)))
}

/// Re-emit one PD0 frame as an RTI frame
pub fn pd0_to_rti(bytes: &[u8]) -> Result<Vec<u8>> {
    let ens = pd0::decode(bytes)?;
    Ok(rti::encode(&ens))
}

/// Convert every valid RTI frame in a stream to back-to-back PD0 frames
pub fn rti_stream_to_pd0(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (_, ens) in rti::decode_stream(bytes) {
        out.extend_from_slice(&pd0::encode(&ens, preferred_xform(&ens)));
    }
    out
}

/// Convert every valid PD0 frame in a stream to back-to-back RTI frames
pub fn pd0_stream_to_rti(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (_, ens) in pd0::decode_stream(bytes) {
        out.extend_from_slice(&rti::encode(&ens));
    }
    out
}
