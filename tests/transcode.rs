mod common;

use adw::codec::{pd0, rti, transcode};
use adw::model::{CoordTransform, BAD_VELOCITY};
use common::sample_ensemble;

#[test]
fn preferred_transform_prefers_earth() {
    let ens = sample_ensemble();
    assert_eq!(transcode::preferred_xform(&ens), CoordTransform::Earth);

    let mut ens = sample_ensemble();
    ens.earth_velocity = None;
    assert_eq!(transcode::preferred_xform(&ens), CoordTransform::Beam);
}

#[test]
fn earth_velocities_survive_the_pd0_hop() {
    let source = sample_ensemble();
    let rti_bytes = rti::encode(&source);

    let pd0_bytes = transcode::rti_to_pd0(&rti_bytes).unwrap();
    let back = pd0::decode(&pd0_bytes).unwrap();

    let want = source.earth_velocity.as_ref().unwrap();
    let got = back.earth_velocity.as_ref().unwrap();
    assert_eq!(got.bins(), want.bins());
    assert_eq!(got.beams(), want.beams());
    for bin in 0..want.bins() {
        for beam in 0..want.beams() {
            let w = want.get(bin, beam);
            let g = got.get(bin, beam);
            if w == BAD_VELOCITY {
                assert_eq!(g, BAD_VELOCITY, "sentinel lost at ({bin}, {beam})");
            } else {
                // millimeter quantization on the PD0 wire
                assert!(
                    (w - g).abs() <= 1.0e-3,
                    "({bin}, {beam}): {w} became {g}"
                );
            }
        }
    }
}

#[test]
fn pd0_hop_preserves_bottom_track_and_environment() {
    let source = sample_ensemble();
    let pd0_bytes = transcode::rti_to_pd0(&rti::encode(&source)).unwrap();
    let back = pd0::decode(&pd0_bytes).unwrap();

    let bt = back.bottom_track.as_ref().unwrap();
    let want = source.bottom_track.as_ref().unwrap();
    for beam in 0..4 {
        assert!((bt.range[beam] - want.range[beam]).abs() < 5.0e-3);
        assert!((bt.earth_velocity[beam] - want.earth_velocity[beam]).abs() <= 1.0e-3);
    }
    let anc = back.ancillary.as_ref().unwrap();
    let want = source.ancillary.as_ref().unwrap();
    assert!((anc.heading - want.heading).abs() < 5.0e-3);
    assert!((anc.water_temp - want.water_temp).abs() < 5.0e-3);
}

#[test]
fn pd0_to_rti_single_frame() {
    let source = sample_ensemble();
    let pd0_bytes = pd0::encode(&source, CoordTransform::Earth);
    let rti_bytes = transcode::pd0_to_rti(&pd0_bytes).unwrap();
    let back = rti::decode(&rti_bytes).unwrap();
    assert_eq!(back.earth_velocity, source.earth_velocity);
    assert_eq!(
        back.ensemble_data.as_ref().unwrap().ensemble_number,
        1_234_567
    );
}

#[test]
fn stream_conversion_skips_corrupt_frames() {
    let ens = sample_ensemble();
    let frame = rti::encode(&ens);
    let mut stream = frame.clone();
    stream[40] ^= 0xff; // corrupt the first copy
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&[0xaa; 7]);

    let pd0_stream = transcode::rti_stream_to_pd0(&stream);
    let decoded = pd0::decode_stream(&pd0_stream);
    assert_eq!(decoded.len(), 1);
    assert_eq!(
        decoded[0].1.ensemble_data.as_ref().unwrap().ensemble_number,
        1_234_567
    );
}

#[test]
fn pd0_stream_to_rti_round() {
    let ens = sample_ensemble();
    let mut stream = Vec::new();
    stream.extend_from_slice(&pd0::encode(&ens, CoordTransform::Earth));
    stream.extend_from_slice(&pd0::encode(&ens, CoordTransform::Earth));

    let rti_stream = transcode::pd0_stream_to_rti(&stream);
    let decoded = rti::decode_stream(&rti_stream);
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].1.earth_velocity, ens.earth_velocity);
}
