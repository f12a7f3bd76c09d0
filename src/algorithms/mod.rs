//! In-place transforms and derived quantities over canonical ensembles
pub mod ship_speed;

use crate::model::{Ensemble, BAD_VELOCITY};

/// Add magnetic and alignment offsets to the recorded headings
///
/// Applies to the ancillary and bottom-track headings when present. No
/// wrapping is performed; consumers normalize to [0, 360) themselves.
pub fn apply_heading_offset(ens: &mut Ensemble, magnetic: f32, alignment: f32) {
    let offset = magnetic + alignment;
    if let Some(anc) = &mut ens.ancillary {
        anc.heading += offset;
    }
    if let Some(bt) = &mut ens.bottom_track {
        bt.heading += offset;
    }
}

/// Per-bin water-speed magnitude from the earth velocities
///
/// √(E² + N² + V²) where all three components are good, 0.0 otherwise.
/// `None` when the ensemble has no earth velocities or fewer than three
/// components per bin.
pub fn velocity_magnitude(ens: &Ensemble) -> Option<Vec<f32>> {
    let m = ens.earth_velocity.as_ref()?;
    if m.beams() < 3 {
        return None;
    }
    Some(
        (0..m.bins())
            .map(|bin| {
                let e = m.get(bin, 0);
                let n = m.get(bin, 1);
                let v = m.get(bin, 2);
                if e == BAD_VELOCITY || n == BAD_VELOCITY || v == BAD_VELOCITY {
                    0.0
                } else {
                    (e * e + n * n + v * v).sqrt()
                }
            })
            .collect(),
    )
}

/// Per-bin water direction in degrees from the earth velocities
///
/// `north_first` selects atan2(N, E) rather than the compass-style
/// atan2(E, N). Bins with a bad east or north component yield 0.0.
pub fn velocity_direction(ens: &Ensemble, north_first: bool) -> Option<Vec<f32>> {
    let m = ens.earth_velocity.as_ref()?;
    if m.beams() < 2 {
        return None;
    }
    Some(
        (0..m.bins())
            .map(|bin| {
                let e = m.get(bin, 0);
                let n = m.get(bin, 1);
                if e == BAD_VELOCITY || n == BAD_VELOCITY {
                    0.0
                } else if north_first {
                    n.atan2(e).to_degrees()
                } else {
                    e.atan2(n).to_degrees()
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{Ancillary, BinBeam, BottomTrack};

    fn earth_ensemble(rows: &[[f32; 4]]) -> Ensemble {
        let mut ens = Ensemble::new(rows.len(), 4);
        let data: Vec<f32> = rows.iter().flatten().copied().collect();
        ens.earth_velocity = Some(BinBeam::from_vec(rows.len(), 4, data));
        ens
    }

    #[test]
    fn heading_offset_applies_to_both_headings() {
        let mut ens = Ensemble::new(0, 4);
        ens.ancillary = Some(Ancillary {
            heading: 350.0,
            ..Ancillary::default()
        });
        let mut bt = BottomTrack::new(4);
        bt.heading = 10.0;
        ens.bottom_track = Some(bt);

        apply_heading_offset(&mut ens, 12.5, 2.5);
        // no wrapping: 350 + 15 stays 365
        assert_eq!(ens.ancillary.as_ref().unwrap().heading, 365.0);
        assert_eq!(ens.bottom_track.as_ref().unwrap().heading, 25.0);
    }

    #[test]
    fn magnitude_zeroes_bad_triples() {
        let ens = earth_ensemble(&[
            [3.0, 4.0, 0.0, 0.0],
            [BAD_VELOCITY, 1.0, 1.0, 0.0],
        ]);
        let mag = velocity_magnitude(&ens).unwrap();
        assert_eq!(mag, vec![5.0, 0.0]);
    }

    #[test]
    fn direction_axis_order() {
        let ens = earth_ensemble(&[[1.0, 1.0, 0.0, 0.0]]);
        let compass = velocity_direction(&ens, false).unwrap();
        assert!((compass[0] - 45.0).abs() < 1e-5);
        let math = velocity_direction(&ens, true).unwrap();
        assert!((math[0] - 45.0).abs() < 1e-5);

        let ens = earth_ensemble(&[[1.0, 0.0, 0.0, 0.0]]);
        let compass = velocity_direction(&ens, false).unwrap();
        assert!((compass[0] - 90.0).abs() < 1e-5);
        let math = velocity_direction(&ens, true).unwrap();
        assert!(math[0].abs() < 1e-5);
    }

    #[test]
    fn no_earth_data_yields_none() {
        let ens = Ensemble::new(4, 4);
        assert!(velocity_magnitude(&ens).is_none());
        assert!(velocity_direction(&ens, false).is_none());
    }
}
