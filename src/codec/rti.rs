//! The RTI ensemble format
//!
//! An RTI frame is a 32-byte header (sixteen 0x80 sentinel bytes, the
//! ensemble number, the payload size, and the 1's complement of each),
//! a payload of self-describing datasets, and a 4-byte additive checksum
//! over the payload. Each dataset opens with a 28-byte base header whose
//! 8-byte ASCII name selects the dataset kind.
use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use crate::bytes::checksum32;
use crate::codec::{DatasetId, ValueKind};
use crate::error::{Error, Result, Tag};
use crate::model::{
    Ancillary, BinBeam, BottomTrack, Ensemble, EnsembleData, NmeaData, SystemSetup, WaterMass,
};
use crate::sync;

/// Length of the frame header, sentinel included
pub const ENSEMBLE_HEADER_LEN: usize = 32;

/// Length of the trailing payload checksum
pub const CHECKSUM_LEN: usize = 4;

/// Length of a dataset base header
const BASE_HEADER_LEN: usize = 28;

/// Scalar elements ahead of the per-beam arrays in a bottom-track dataset
const BT_SCALARS: usize = 14;

/// Per-beam arrays in a bottom-track dataset
const BT_ARRAYS: usize = 11;

/// Elements in an ancillary dataset as written by this encoder
const ANCILLARY_ELEMENTS: usize = 21;

/// Elements in an ensemble-data dataset
const ENSEMBLE_ELEMENTS: usize = 13;

/// Elements in a system-setup dataset
const SYSTEM_SETUP_ELEMENTS: usize = 7;

/// Elements in a water-mass dataset
const WATER_MASS_ELEMENTS: usize = 5;

/// The base header that opens every dataset in a payload
#[binrw]
#[brw(little)]
struct DatasetHeader {
    value_kind: i32,
    element_count: i32,
    element_multiplier: i32,
    imag: i32,
    name_len: i32,
    name: [u8; 8],
}

/// Read-time arguments for a dataset's element array
#[derive(Debug, Clone, Copy)]
struct ElementArgs {
    count: usize,
}

#[binrw]
#[brw(little)]
#[br(import_raw(args: ElementArgs))]
struct FloatElements {
    #[br(count = args.count)]
    values: Vec<f32>,
}

#[binrw]
#[brw(little)]
#[br(import_raw(args: ElementArgs))]
struct IntElements {
    #[br(count = args.count)]
    values: Vec<i32>,
}

/// Decode one RTI frame starting at `bytes[0]`
///
/// Returns the first hard error with the frame-relative offset at which
/// it occurred; a partial ensemble is never returned.
pub fn decode(bytes: &[u8]) -> Result<Ensemble> {
    decode_frame(bytes, false).map(|(ens, _)| ens)
}

/// Decode one RTI frame, skipping datasets with unrecognized name tags
pub fn decode_skipping_unknown(bytes: &[u8]) -> Result<Ensemble> {
    decode_frame(bytes, true).map(|(ens, _)| ens)
}

/// Decode every valid RTI frame in a byte stream
///
/// Frames are located by sync candidate; unreadable candidates are
/// logged and skipped, and scanning resumes at the next candidate, so
/// noise around or between frames never costs a valid ensemble.
pub fn decode_stream(bytes: &[u8]) -> Vec<(usize, Ensemble)> {
    let mut out = Vec::new();
    let mut resume = 0usize;
    for start in sync::scan_rti(bytes) {
        if start < resume {
            continue;
        }
        match decode_frame(&bytes[start..], false) {
            Ok((ens, len)) => {
                out.push((start, ens));
                resume = start + len;
            }
            Err(err) => {
                tracing::warn!(offset = start, error = %err, "skipping unreadable RTI frame");
            }
        }
    }
    out
}

fn decode_frame(bytes: &[u8], skip_unknown: bool) -> Result<(Ensemble, usize)> {
    if bytes.len() < ENSEMBLE_HEADER_LEN {
        return Err(Error::Truncated {
            offset: bytes.len(),
            needed: ENSEMBLE_HEADER_LEN - bytes.len(),
        });
    }
    if let Some(bad) = bytes[..16].iter().position(|&b| b != 0x80) {
        return Err(Error::BadSync { offset: bad });
    }
    let ensemble_number = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
    let payload_size = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
    let number_inverse = u32::from_le_bytes(bytes[24..28].try_into().unwrap());
    let size_inverse = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
    if number_inverse != !ensemble_number || size_inverse != !payload_size {
        return Err(Error::BadSync { offset: 24 });
    }

    let payload_size = payload_size as usize;
    let total = ENSEMBLE_HEADER_LEN + payload_size + CHECKSUM_LEN;
    if bytes.len() < total {
        return Err(Error::Truncated {
            offset: bytes.len(),
            needed: total - bytes.len(),
        });
    }

    let payload = &bytes[ENSEMBLE_HEADER_LEN..ENSEMBLE_HEADER_LEN + payload_size];
    let stored = u32::from_le_bytes(
        bytes[ENSEMBLE_HEADER_LEN + payload_size..total]
            .try_into()
            .unwrap(),
    );
    let computed = checksum32(payload);
    if computed != stored {
        return Err(Error::BadChecksum { computed, stored });
    }

    let ens = decode_payload(payload, skip_unknown)?;
    Ok((ens, total))
}

fn decode_payload(payload: &[u8], skip_unknown: bool) -> Result<Ensemble> {
    let mut ens = Ensemble::default();
    let mut pos = 0usize;
    while payload.len() - pos >= BASE_HEADER_LEN {
        let frame_offset = ENSEMBLE_HEADER_LEN + pos;
        let mut cursor = Cursor::new(&payload[pos..pos + BASE_HEADER_LEN]);
        let header = DatasetHeader::read_le(&mut cursor).map_err(|_| Error::Truncated {
            offset: frame_offset,
            needed: BASE_HEADER_LEN,
        })?;
        let tag = Tag(header.name);
        if header.name_len != 8 {
            return Err(Error::UnknownDataset {
                tag,
                offset: frame_offset,
            });
        }
        let kind = ValueKind::from_code(header.value_kind)?;
        if header.element_count < 0 || header.element_multiplier < 0 {
            return Err(Error::DimensionMismatch {
                tag,
                declared: 0,
                available: payload.len() - pos - BASE_HEADER_LEN,
            });
        }
        let elements = header.element_count as usize;
        let multiplier = header.element_multiplier as usize;
        let data_len = elements * multiplier * kind.size();
        let available = payload.len() - pos - BASE_HEADER_LEN;
        if data_len > available {
            return Err(Error::DimensionMismatch {
                tag,
                declared: data_len,
                available,
            });
        }
        let data = &payload[pos + BASE_HEADER_LEN..pos + BASE_HEADER_LEN + data_len];

        match DatasetId::from_tag(&header.name) {
            Some(id) => decode_dataset(&mut ens, id, &header, kind, data)?,
            None => {
                if !skip_unknown {
                    return Err(Error::UnknownDataset {
                        tag,
                        offset: frame_offset,
                    });
                }
            }
        }
        pos += BASE_HEADER_LEN + data_len;
    }
    Ok(ens)
}

fn decode_dataset(
    ens: &mut Ensemble,
    id: DatasetId,
    header: &DatasetHeader,
    kind: ValueKind,
    data: &[u8],
) -> Result<()> {
    let expect_kind = |want: ValueKind| -> Result<()> {
        if kind == want {
            Ok(())
        } else {
            Err(Error::BadValueKind {
                kind: header.value_kind,
            })
        }
    };
    let bins = header.element_count as usize;
    let beams = header.element_multiplier as usize;
    let count = bins * beams;

    match id {
        DatasetId::BeamVelocity => {
            expect_kind(ValueKind::Float)?;
            let values = read_f32_elements(data, count)?;
            ens.beam_velocity = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::InstrumentVelocity => {
            expect_kind(ValueKind::Float)?;
            let values = read_f32_elements(data, count)?;
            ens.instrument_velocity = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::EarthVelocity => {
            expect_kind(ValueKind::Float)?;
            let values = read_f32_elements(data, count)?;
            ens.earth_velocity = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::ShipVelocity => {
            expect_kind(ValueKind::Float)?;
            let values = read_f32_elements(data, count)?;
            ens.ship_velocity = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::Amplitude => {
            expect_kind(ValueKind::Float)?;
            let values = read_f32_elements(data, count)?;
            ens.amplitude = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::Correlation => {
            expect_kind(ValueKind::Float)?;
            let values = read_f32_elements(data, count)?;
            ens.correlation = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::GoodBeam => {
            expect_kind(ValueKind::Int)?;
            let values = read_i32_elements(data, count)?;
            ens.good_beam = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::GoodInstrument => {
            expect_kind(ValueKind::Int)?;
            let values = read_i32_elements(data, count)?;
            ens.good_instrument = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::GoodEarth => {
            expect_kind(ValueKind::Int)?;
            let values = read_i32_elements(data, count)?;
            ens.good_earth = Some(BinBeam::from_vec(bins, beams, values));
        }
        DatasetId::EnsembleData => {
            expect_kind(ValueKind::Int)?;
            let v = read_i32_elements(data, count)?;
            if v.len() < ENSEMBLE_ELEMENTS {
                return Err(short_dataset(id, ENSEMBLE_ELEMENTS * 4, data.len()));
            }
            ens.ensemble_data = Some(EnsembleData {
                ensemble_number: v[0] as u32,
                num_bins: v[1] as usize,
                num_beams: v[2] as usize,
                desired_ping_count: v[3] as u16,
                actual_ping_count: v[4] as u16,
                status: v[5] as u32,
                year: v[6] as u16,
                month: v[7] as u8,
                day: v[8] as u8,
                hour: v[9] as u8,
                minute: v[10] as u8,
                second: v[11] as u8,
                hsec: v[12] as u8,
            });
        }
        DatasetId::Ancillary => {
            expect_kind(ValueKind::Float)?;
            let v = read_f32_elements(data, count)?;
            if v.len() < 13 {
                return Err(short_dataset(id, 13 * 4, data.len()));
            }
            let at = |i: usize| v.get(i).copied().unwrap_or(0.0);
            ens.ancillary = Some(Ancillary {
                first_bin_range: v[0],
                bin_size: v[1],
                first_ping_time: v[2],
                last_ping_time: v[3],
                heading: v[4],
                pitch: v[5],
                roll: v[6],
                water_temp: v[7],
                system_temp: v[8],
                salinity: v[9],
                pressure: v[10],
                transducer_depth: v[11],
                speed_of_sound: v[12],
                raw_mag: [at(13), at(14), at(15)],
                raw_accel: [at(16), at(17), at(18)],
                raw_tilt: [at(19), at(20)],
            });
        }
        DatasetId::BottomTrack => {
            expect_kind(ValueKind::Float)?;
            let v = read_f32_elements(data, count)?;
            if v.len() < BT_SCALARS {
                return Err(short_dataset(id, BT_SCALARS * 4, data.len()));
            }
            let num_beams = v[12] as usize;
            if v.len() != BT_SCALARS + BT_ARRAYS * num_beams {
                return Err(short_dataset(
                    id,
                    (BT_SCALARS + BT_ARRAYS * num_beams) * 4,
                    data.len(),
                ));
            }
            let arr = |i: usize| v[BT_SCALARS + i * num_beams..BT_SCALARS + (i + 1) * num_beams].to_vec();
            ens.bottom_track = Some(BottomTrack {
                first_ping_time: v[0],
                last_ping_time: v[1],
                heading: v[2],
                pitch: v[3],
                roll: v[4],
                water_temp: v[5],
                system_temp: v[6],
                salinity: v[7],
                pressure: v[8],
                transducer_depth: v[9],
                speed_of_sound: v[10],
                status: v[11] as u32,
                num_beams,
                actual_ping_count: v[13],
                range: arr(0),
                snr: arr(1),
                amplitude: arr(2),
                correlation: arr(3),
                beam_velocity: arr(4),
                beam_good: arr(5),
                instrument_velocity: arr(6),
                instrument_good: arr(7),
                earth_velocity: arr(8),
                earth_good: arr(9),
                ship_velocity: arr(10),
            });
        }
        DatasetId::SystemSetup => {
            expect_kind(ValueKind::Float)?;
            let v = read_f32_elements(data, count)?;
            if v.len() < SYSTEM_SETUP_ELEMENTS {
                return Err(short_dataset(id, SYSTEM_SETUP_ELEMENTS * 4, data.len()));
            }
            ens.system_setup = Some(SystemSetup {
                bin_size: v[0],
                blank: v[1],
                wp_pings: v[2],
                bt_pings: v[3],
                lag_samples: v[4],
                code_repeats: v[5],
                transmit_cycles: v[6],
            });
        }
        DatasetId::InstrumentWaterMass | DatasetId::EarthWaterMass => {
            expect_kind(ValueKind::Float)?;
            let v = read_f32_elements(data, count)?;
            if v.len() < WATER_MASS_ELEMENTS {
                return Err(short_dataset(id, WATER_MASS_ELEMENTS * 4, data.len()));
            }
            let wm = WaterMass {
                velocity: [v[0], v[1], v[2], v[3]],
                depth_layer: v[4],
            };
            if id == DatasetId::InstrumentWaterMass {
                ens.instrument_water_mass = Some(wm);
            } else {
                ens.earth_water_mass = Some(wm);
            }
        }
        DatasetId::Nmea => {
            expect_kind(ValueKind::Byte)?;
            ens.nmea = Some(NmeaData::new(data.to_vec()));
        }
    }
    Ok(())
}

fn short_dataset(id: DatasetId, declared: usize, available: usize) -> Error {
    Error::DimensionMismatch {
        tag: Tag(*id.tag()),
        declared,
        available,
    }
}

fn read_f32_elements(data: &[u8], count: usize) -> Result<Vec<f32>> {
    let mut cursor = Cursor::new(data);
    let block = FloatElements::read_le_args(&mut cursor, ElementArgs { count }).map_err(|_| {
        Error::Truncated {
            offset: 0,
            needed: count * 4,
        }
    })?;
    Ok(block.values)
}

fn read_i32_elements(data: &[u8], count: usize) -> Result<Vec<i32>> {
    let mut cursor = Cursor::new(data);
    let block = IntElements::read_le_args(&mut cursor, ElementArgs { count }).map_err(|_| {
        Error::Truncated {
            offset: 0,
            needed: count * 4,
        }
    })?;
    Ok(block.values)
}

/// Encode a canonical ensemble as one RTI frame
///
/// Datasets are emitted in lexicographic name-tag order, so the output
/// is deterministic for a given ensemble. Dimension violations are
/// programmer errors and panic.
pub fn encode(ens: &Ensemble) -> Vec<u8> {
    if let Some(ed) = &ens.ensemble_data {
        assert!(
            ed.num_beams == 1 || ed.num_beams == 4,
            "beam count must be 1 or 4"
        );
        for matrix in [
            &ens.beam_velocity,
            &ens.instrument_velocity,
            &ens.earth_velocity,
            &ens.ship_velocity,
            &ens.amplitude,
            &ens.correlation,
        ]
        .into_iter()
        .flatten()
        {
            assert_eq!(matrix.bins(), ed.num_bins, "matrix bin count mismatch");
            assert_eq!(matrix.beams(), ed.num_beams, "matrix beam count mismatch");
        }
    }

    let mut payload = Vec::new();
    for id in DatasetId::ALL {
        encode_dataset(&mut payload, ens, id);
    }

    let ensemble_number = ens
        .ensemble_data
        .as_ref()
        .map(|e| e.ensemble_number)
        .unwrap_or(0);
    let payload_size = payload.len() as u32;

    let mut out = Vec::with_capacity(ENSEMBLE_HEADER_LEN + payload.len() + CHECKSUM_LEN);
    out.extend_from_slice(&sync::RTI_SYNC);
    out.extend_from_slice(&ensemble_number.to_le_bytes());
    out.extend_from_slice(&payload_size.to_le_bytes());
    out.extend_from_slice(&(!ensemble_number).to_le_bytes());
    out.extend_from_slice(&(!payload_size).to_le_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&checksum32(&payload).to_le_bytes());
    out
}

fn encode_dataset(payload: &mut Vec<u8>, ens: &Ensemble, id: DatasetId) {
    match id {
        DatasetId::BeamVelocity => push_f32_matrix(payload, id, &ens.beam_velocity),
        DatasetId::InstrumentVelocity => push_f32_matrix(payload, id, &ens.instrument_velocity),
        DatasetId::EarthVelocity => push_f32_matrix(payload, id, &ens.earth_velocity),
        DatasetId::ShipVelocity => push_f32_matrix(payload, id, &ens.ship_velocity),
        DatasetId::Amplitude => push_f32_matrix(payload, id, &ens.amplitude),
        DatasetId::Correlation => push_f32_matrix(payload, id, &ens.correlation),
        DatasetId::GoodBeam => push_i32_matrix(payload, id, &ens.good_beam),
        DatasetId::GoodInstrument => push_i32_matrix(payload, id, &ens.good_instrument),
        DatasetId::GoodEarth => push_i32_matrix(payload, id, &ens.good_earth),
        DatasetId::EnsembleData => {
            if let Some(ed) = &ens.ensemble_data {
                let v = [
                    ed.ensemble_number as i32,
                    ed.num_bins as i32,
                    ed.num_beams as i32,
                    i32::from(ed.desired_ping_count),
                    i32::from(ed.actual_ping_count),
                    ed.status as i32,
                    i32::from(ed.year),
                    i32::from(ed.month),
                    i32::from(ed.day),
                    i32::from(ed.hour),
                    i32::from(ed.minute),
                    i32::from(ed.second),
                    i32::from(ed.hsec),
                ];
                push_header(payload, ValueKind::Int, v.len(), 1, id);
                push_i32_elements(payload, v.to_vec());
            }
        }
        DatasetId::Ancillary => {
            if let Some(a) = &ens.ancillary {
                let v = [
                    a.first_bin_range,
                    a.bin_size,
                    a.first_ping_time,
                    a.last_ping_time,
                    a.heading,
                    a.pitch,
                    a.roll,
                    a.water_temp,
                    a.system_temp,
                    a.salinity,
                    a.pressure,
                    a.transducer_depth,
                    a.speed_of_sound,
                    a.raw_mag[0],
                    a.raw_mag[1],
                    a.raw_mag[2],
                    a.raw_accel[0],
                    a.raw_accel[1],
                    a.raw_accel[2],
                    a.raw_tilt[0],
                    a.raw_tilt[1],
                ];
                debug_assert_eq!(v.len(), ANCILLARY_ELEMENTS);
                push_header(payload, ValueKind::Float, v.len(), 1, id);
                push_f32_elements(payload, v.to_vec());
            }
        }
        DatasetId::BottomTrack => {
            if let Some(bt) = &ens.bottom_track {
                let b = bt.num_beams;
                for arr in [
                    &bt.range,
                    &bt.snr,
                    &bt.amplitude,
                    &bt.correlation,
                    &bt.beam_velocity,
                    &bt.beam_good,
                    &bt.instrument_velocity,
                    &bt.instrument_good,
                    &bt.earth_velocity,
                    &bt.earth_good,
                    &bt.ship_velocity,
                ] {
                    assert_eq!(arr.len(), b, "bottom-track array length mismatch");
                }
                let count = BT_SCALARS + BT_ARRAYS * b;
                push_header(payload, ValueKind::Float, count, 1, id);
                let mut values = Vec::with_capacity(count);
                values.extend_from_slice(&[
                    bt.first_ping_time,
                    bt.last_ping_time,
                    bt.heading,
                    bt.pitch,
                    bt.roll,
                    bt.water_temp,
                    bt.system_temp,
                    bt.salinity,
                    bt.pressure,
                    bt.transducer_depth,
                    bt.speed_of_sound,
                    bt.status as f32,
                    b as f32,
                    bt.actual_ping_count,
                ]);
                for arr in [
                    &bt.range,
                    &bt.snr,
                    &bt.amplitude,
                    &bt.correlation,
                    &bt.beam_velocity,
                    &bt.beam_good,
                    &bt.instrument_velocity,
                    &bt.instrument_good,
                    &bt.earth_velocity,
                    &bt.earth_good,
                    &bt.ship_velocity,
                ] {
                    values.extend_from_slice(arr);
                }
                push_f32_elements(payload, values);
            }
        }
        DatasetId::SystemSetup => {
            if let Some(ss) = &ens.system_setup {
                let v = [
                    ss.bin_size,
                    ss.blank,
                    ss.wp_pings,
                    ss.bt_pings,
                    ss.lag_samples,
                    ss.code_repeats,
                    ss.transmit_cycles,
                ];
                debug_assert_eq!(v.len(), SYSTEM_SETUP_ELEMENTS);
                push_header(payload, ValueKind::Float, v.len(), 1, id);
                push_f32_elements(payload, v.to_vec());
            }
        }
        DatasetId::InstrumentWaterMass | DatasetId::EarthWaterMass => {
            let wm = if id == DatasetId::InstrumentWaterMass {
                &ens.instrument_water_mass
            } else {
                &ens.earth_water_mass
            };
            if let Some(wm) = wm {
                push_header(payload, ValueKind::Float, WATER_MASS_ELEMENTS, 1, id);
                let mut values = wm.velocity.to_vec();
                values.push(wm.depth_layer);
                push_f32_elements(payload, values);
            }
        }
        DatasetId::Nmea => {
            if let Some(nmea) = &ens.nmea {
                push_header(payload, ValueKind::Byte, nmea.sentences.len(), 1, id);
                payload.extend_from_slice(&nmea.sentences);
            }
        }
    }
}

fn push_header(payload: &mut Vec<u8>, kind: ValueKind, count: usize, multiplier: usize, id: DatasetId) {
    let header = DatasetHeader {
        value_kind: kind.code(),
        element_count: count as i32,
        element_multiplier: multiplier as i32,
        imag: 0,
        name_len: 8,
        name: *id.tag(),
    };
    let mut cursor = Cursor::new(Vec::with_capacity(BASE_HEADER_LEN));
    header
        .write_le(&mut cursor)
        .expect("writing to a Vec cannot fail");
    payload.extend_from_slice(&cursor.into_inner());
}

fn push_f32_elements(payload: &mut Vec<u8>, values: Vec<f32>) {
    let block = FloatElements { values };
    let mut cursor = Cursor::new(Vec::new());
    block
        .write_le(&mut cursor)
        .expect("writing to a Vec cannot fail");
    payload.extend_from_slice(&cursor.into_inner());
}

fn push_i32_elements(payload: &mut Vec<u8>, values: Vec<i32>) {
    let block = IntElements { values };
    let mut cursor = Cursor::new(Vec::new());
    block
        .write_le(&mut cursor)
        .expect("writing to a Vec cannot fail");
    payload.extend_from_slice(&cursor.into_inner());
}

fn push_f32_matrix(payload: &mut Vec<u8>, id: DatasetId, matrix: &Option<BinBeam<f32>>) {
    if let Some(m) = matrix {
        push_header(payload, ValueKind::Float, m.bins(), m.beams(), id);
        push_f32_elements(payload, m.as_slice().to_vec());
    }
}

fn push_i32_matrix(payload: &mut Vec<u8>, id: DatasetId, matrix: &Option<BinBeam<i32>>) {
    if let Some(m) = matrix {
        push_header(payload, ValueKind::Int, m.bins(), m.beams(), id);
        push_i32_elements(payload, m.as_slice().to_vec());
    }
}
