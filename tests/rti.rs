mod common;

use adw::bytes::checksum32;
use adw::codec::rti;
use adw::error::Error;
use common::sample_ensemble;

/// Frame a payload the way the encoder does, with a chosen ensemble number
fn frame_payload(payload: &[u8], ensemble_number: u32) -> Vec<u8> {
    let size = payload.len() as u32;
    let mut out = vec![0x80u8; 16];
    out.extend_from_slice(&ensemble_number.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&(!ensemble_number).to_le_bytes());
    out.extend_from_slice(&(!size).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&checksum32(payload).to_le_bytes());
    out
}

fn payload_of(frame: &[u8]) -> &[u8] {
    &frame[32..frame.len() - 4]
}

#[test]
fn round_trip_preserves_the_ensemble() {
    let ens = sample_ensemble();
    let bytes = rti::encode(&ens);
    let decoded = rti::decode(&bytes).unwrap();
    assert_eq!(decoded, ens);
}

#[test]
fn round_trip_is_byte_exact() {
    let bytes = rti::encode(&sample_ensemble());
    let reencoded = rti::encode(&rti::decode(&bytes).unwrap());
    assert_eq!(reencoded, bytes);
}

#[test]
fn datasets_are_emitted_in_tag_order() {
    let bytes = rti::encode(&sample_ensemble());
    let payload = payload_of(&bytes);

    let mut names = Vec::new();
    let mut pos = 0;
    while pos + 28 <= payload.len() {
        let kind = i32::from_le_bytes(payload[pos..pos + 4].try_into().unwrap());
        let count = i32::from_le_bytes(payload[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let mult = i32::from_le_bytes(payload[pos + 8..pos + 12].try_into().unwrap()) as usize;
        let name: [u8; 8] = payload[pos + 20..pos + 28].try_into().unwrap();
        names.push(name);
        let elem_size = if kind == 50 { 1 } else { 4 };
        pos += 28 + count * mult * elem_size;
    }
    assert_eq!(pos, payload.len());
    assert!(names.len() > 5);
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn corrupting_any_payload_bit_is_detected() {
    let bytes = rti::encode(&sample_ensemble());
    let payload_len = bytes.len() - 36;
    for pos in [32, 32 + payload_len / 2, bytes.len() - 5] {
        for bit in 0..8 {
            let mut corrupt = bytes.clone();
            corrupt[pos] ^= 1 << bit;
            assert!(
                matches!(rti::decode(&corrupt), Err(Error::BadChecksum { .. })),
                "bit {bit} at byte {pos} went undetected"
            );
        }
    }
    // corrupting the stored checksum itself is also a checksum mismatch
    let mut corrupt = bytes.clone();
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0x01;
    assert!(matches!(rti::decode(&corrupt), Err(Error::BadChecksum { .. })));
}

#[test]
fn truncated_buffer_is_reported() {
    let bytes = rti::encode(&sample_ensemble());
    let cut = &bytes[..bytes.len() - 3];
    match rti::decode(cut) {
        Err(Error::Truncated { needed: 3, .. }) => {}
        other => panic!("expected Truncated, got {other:?}"),
    }
    assert!(matches!(
        rti::decode(&bytes[..10]),
        Err(Error::Truncated { .. })
    ));
}

#[test]
fn oversized_payload_field_is_truncated() {
    // a frame whose declared payload size exceeds the remaining bytes
    let bytes = rti::encode(&sample_ensemble());
    let payload = payload_of(&bytes).to_vec();
    let mut frame = frame_payload(&payload, 7);
    let inflated = (payload.len() + 100) as u32;
    frame[20..24].copy_from_slice(&inflated.to_le_bytes());
    frame[28..32].copy_from_slice(&(!inflated).to_le_bytes());
    assert!(matches!(rti::decode(&frame), Err(Error::Truncated { .. })));
}

#[test]
fn corrupt_header_is_bad_sync() {
    let bytes = rti::encode(&sample_ensemble());
    let mut corrupt = bytes.clone();
    corrupt[5] = 0x7f;
    assert!(matches!(
        rti::decode(&corrupt),
        Err(Error::BadSync { offset: 5 })
    ));

    // inverse fields that do not match the header values
    let mut corrupt = bytes;
    corrupt[25] ^= 0xff;
    assert!(matches!(
        rti::decode(&corrupt),
        Err(Error::BadSync { offset: 24 })
    ));
}

fn raw_dataset(kind: i32, count: i32, mult: i32, name: &[u8; 8], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&mult.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&8i32.to_le_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(data);
    out
}

#[test]
fn unknown_datasets_error_unless_skipped() {
    let ens = sample_ensemble();
    let bytes = rti::encode(&ens);
    let mut payload = payload_of(&bytes).to_vec();
    payload.extend_from_slice(&raw_dataset(10, 1, 1, b"E000099\0", &1.0f32.to_le_bytes()));
    let frame = frame_payload(&payload, 1_234_567);

    match rti::decode(&frame) {
        Err(Error::UnknownDataset { tag, .. }) => assert_eq!(tag.to_string(), "E000099"),
        other => panic!("expected UnknownDataset, got {other:?}"),
    }

    let decoded = rti::decode_skipping_unknown(&frame).unwrap();
    assert_eq!(decoded, ens);
}

#[test]
fn unrecognized_value_kind_is_rejected() {
    let payload = raw_dataset(30, 1, 1, b"E000009\0", &1.0f32.to_le_bytes());
    let frame = frame_payload(&payload, 1);
    assert!(matches!(
        rti::decode(&frame),
        Err(Error::BadValueKind { kind: 30 })
    ));
}

#[test]
fn undersized_dataset_is_a_dimension_mismatch() {
    // ancillary dataset declaring more elements than the payload holds
    let payload = raw_dataset(10, 100, 1, b"E000009\0", &[0u8; 16]);
    let frame = frame_payload(&payload, 1);
    assert!(matches!(
        rti::decode(&frame),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn stream_decoding_survives_noise() {
    let ens = sample_ensemble();
    let frame = rti::encode(&ens);
    let mut stream = vec![0xffu8; 8];
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&[0x00; 4]);

    let decoded = rti::decode_stream(&stream);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].0, 8);
    assert_eq!(decoded[0].1, ens);

    // a second copy with a corrupted first frame still yields the good one
    let mut stream = frame.clone();
    stream[40] ^= 0xff;
    stream.extend_from_slice(&frame);
    let decoded = rti::decode_stream(&stream);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].0, frame.len());
}

#[test]
fn recorded_gps_fields_are_parsed_on_decode() {
    let bytes = rti::encode(&sample_ensemble());
    let decoded = rti::decode(&bytes).unwrap();
    let nmea = decoded.nmea.unwrap();
    assert_eq!(nmea.vtg_track, Some(54.7));
    assert_eq!(nmea.hdt_heading, Some(274.07));
    let speed = nmea.vtg_speed.unwrap();
    assert!((speed - 5.5 * 0.514444).abs() < 1e-5);
}
