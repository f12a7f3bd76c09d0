//! The PD0 ensemble format
//!
//! A PD0 frame is a six-byte header (two 0x7f id bytes, the ensemble
//! byte count, a spare, and the data-type count), an offset table, the
//! data types themselves, and a 2-byte additive checksum over everything
//! ahead of it. Each data type opens with a two-byte id. Field layouts,
//! scales and units follow the Teledyne Workhorse conventions.
//!
//! PD0 and the canonical model do not share a beam order. Wire slot
//! `PD0_BEAM_SLOT[b]` carries canonical beam `b` for every per-beam
//! field; instrument-frame velocities instead swap X/Y and negate Z.
use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use crate::bytes::checksum16;
use crate::error::{Error, Result};
use crate::model::{
    Ancillary, BinBeam, BottomTrack, CoordTransform, Ensemble, EnsembleData, SystemSetup,
    BAD_VELOCITY,
};
use crate::sync;

/// Wire slot that carries canonical beam `b` (four-beam systems)
pub const PD0_BEAM_SLOT: [usize; 4] = [3, 2, 0, 1];

/// Wire slot carrying each canonical instrument-velocity component
const INSTRUMENT_SLOT: [usize; 4] = [1, 0, 2, 3];

/// The bad-velocity sentinel on the PD0 wire
pub const PD0_BAD_VELOCITY: i16 = -32768;

/// Percent-good sentinel byte
const PG_BAD: u8 = 0xff;

const FIXED_LEADER_ID: u16 = 0x0000;
const VARIABLE_LEADER_ID: u16 = 0x0080;
const VELOCITY_ID: u16 = 0x0100;
const CORRELATION_ID: u16 = 0x0200;
const ECHO_ID: u16 = 0x0300;
const PERCENT_GOOD_ID: u16 = 0x0400;
const BOTTOM_TRACK_ID: u16 = 0x0600;

const FIXED_LEADER_LEN: usize = 59;
const VARIABLE_LEADER_LEN: usize = 65;
const BOTTOM_TRACK_LEN: usize = 81;
const HEADER_ID_LEN: usize = 2;

/// dB per count when reading echo intensity
const ECHO_READ_SCALE: f32 = 0.45;
/// counts per dB when writing echo intensity
const ECHO_WRITE_SCALE: f32 = 2.0;

#[binrw]
#[brw(little, magic = 0x0000u16)]
struct FixedLeader {
    fw_version: u8,
    fw_revision: u8,
    system_config: u16,
    real_sim_flag: u8,
    lag_length: u8,
    num_beams: u8,
    num_cells: u8,
    pings_per_ensemble: u16,
    cell_length_cm: u16,
    blank_after_transmit_cm: u16,
    profiling_mode: u8,
    low_corr_threshold: u8,
    num_code_repeats: u8,
    percent_good_minimum: u8,
    error_velocity_max: u16,
    tpp_minutes: u8,
    tpp_seconds: u8,
    tpp_hundredths: u8,
    coord_transform: u8,
    heading_alignment: i16,
    heading_bias: i16,
    sensor_source: u8,
    sensors_available: u8,
    bin1_distance_cm: u16,
    xmit_pulse_length_cm: u16,
    ref_layer_avg: u16,
    false_target_threshold: u8,
    spare: u8,
    transmit_lag_distance_cm: u16,
    cpu_serial: [u8; 8],
    system_bandwidth: u16,
    system_power: u8,
    spare2: u8,
    serial_number: u32,
    beam_angle: u8,
}

#[binrw]
#[brw(little, magic = 0x0080u16)]
struct VariableLeader {
    ensemble_number: u16,
    rtc_year: u8,
    rtc_month: u8,
    rtc_day: u8,
    rtc_hour: u8,
    rtc_minute: u8,
    rtc_second: u8,
    rtc_hundredths: u8,
    ensemble_number_msb: u8,
    bit_result: u16,
    speed_of_sound: u16,
    depth_of_transducer_dm: u16,
    heading_cdeg: u16,
    pitch_cdeg: i16,
    roll_cdeg: i16,
    salinity: u16,
    temperature_cdeg: i16,
    mpt_minutes: u8,
    mpt_seconds: u8,
    mpt_hundredths: u8,
    heading_stddev: u8,
    pitch_stddev: u8,
    roll_stddev: u8,
    adc: [u8; 8],
    error_status: u32,
    spare: u16,
    pressure_dapa: u32,
    pressure_variance: u32,
    spare2: u8,
    rtc_y2k: [u8; 8],
}

#[binrw]
#[brw(little, magic = 0x0600u16)]
struct Pd0BottomTrack {
    pings_per_ensemble: u16,
    delay_before_reacquire: u16,
    corr_mag_min: u8,
    eval_amp_min: u8,
    percent_good_min: u8,
    mode: u8,
    err_vel_max: u16,
    reserved: [u8; 4],
    range_lsb_cm: [u16; 4],
    velocity: [i16; 4],
    correlation: [u8; 4],
    eval_amp: [u8; 4],
    percent_good: [u8; 4],
    ref_layer_min_dm: u16,
    ref_layer_near_dm: u16,
    ref_layer_far_dm: u16,
    ref_velocity: [i16; 4],
    ref_correlation: [u8; 4],
    ref_intensity: [u8; 4],
    ref_percent_good: [u8; 4],
    max_depth_dm: u16,
    rssi_amp: [u8; 4],
    gain: u8,
    range_msb_cm: [u8; 4],
}

impl Default for Pd0BottomTrack {
    fn default() -> Pd0BottomTrack {
        Pd0BottomTrack {
            pings_per_ensemble: 0,
            delay_before_reacquire: 0,
            corr_mag_min: 0,
            eval_amp_min: 0,
            percent_good_min: 0,
            mode: 0,
            err_vel_max: 0,
            reserved: [0; 4],
            range_lsb_cm: [0; 4],
            velocity: [PD0_BAD_VELOCITY; 4],
            correlation: [0; 4],
            eval_amp: [0; 4],
            percent_good: [0; 4],
            ref_layer_min_dm: 0,
            ref_layer_near_dm: 0,
            ref_layer_far_dm: 0,
            ref_velocity: [PD0_BAD_VELOCITY; 4],
            ref_correlation: [0; 4],
            ref_intensity: [0; 4],
            ref_percent_good: [0; 4],
            max_depth_dm: 0,
            rssi_amp: [0; 4],
            gain: 0,
            range_msb_cm: [0; 4],
        }
    }
}

/// Read-time arguments for the cell-dimensioned blocks
#[derive(Debug, Clone, Copy)]
struct CellArgs {
    cells: usize,
}

#[binrw]
#[brw(little, magic = 0x0100u16)]
#[br(import_raw(args: CellArgs))]
struct VelocityBlock {
    #[br(count = args.cells * 4)]
    velocity: Vec<i16>,
}

#[binrw]
#[brw(little, magic = 0x0200u16)]
#[br(import_raw(args: CellArgs))]
struct CorrelationBlock {
    #[br(count = args.cells * 4)]
    correlation: Vec<u8>,
}

#[binrw]
#[brw(little, magic = 0x0300u16)]
#[br(import_raw(args: CellArgs))]
struct EchoBlock {
    #[br(count = args.cells * 4)]
    echo: Vec<u8>,
}

#[binrw]
#[brw(little, magic = 0x0400u16)]
#[br(import_raw(args: CellArgs))]
struct PercentGoodBlock {
    #[br(count = args.cells * 4)]
    percent_good: Vec<u8>,
}

impl CoordTransform {
    /// The frame recorded in bits 3-4 of the Fixed Leader EX byte
    fn from_ex(ex: u8) -> CoordTransform {
        match (ex >> 3) & 0b11 {
            0b00 => CoordTransform::Beam,
            0b01 => CoordTransform::Instrument,
            0b10 => CoordTransform::Ship,
            _ => CoordTransform::Earth,
        }
    }

    fn to_ex(self) -> u8 {
        let bits = match self {
            CoordTransform::Beam => 0b00,
            CoordTransform::Instrument => 0b01,
            CoordTransform::Ship => 0b10,
            CoordTransform::Earth => 0b11,
        };
        // tilts, 3-beam solutions and bin mapping enabled
        (bits << 3) | 0x07
    }
}

/// Wire slot carrying canonical beam `b` for a per-beam field
fn beam_slot(beam: usize, beams: usize) -> usize {
    if beams == 4 {
        PD0_BEAM_SLOT[beam]
    } else {
        beam
    }
}

/// Wire slot and sign for one velocity component in a coordinate frame
fn velocity_slot(xform: CoordTransform, beam: usize, beams: usize) -> (usize, f32) {
    if beams != 4 {
        return (beam, 1.0);
    }
    match xform {
        CoordTransform::Instrument => {
            let sign = if beam == 2 { -1.0 } else { 1.0 };
            (INSTRUMENT_SLOT[beam], sign)
        }
        _ => (PD0_BEAM_SLOT[beam], 1.0),
    }
}

/// Decode one PD0 frame starting at `bytes[0]`
pub fn decode(bytes: &[u8]) -> Result<Ensemble> {
    decode_frame(bytes, false).map(|(ens, _)| ens)
}

/// Decode one PD0 frame, skipping data types with unrecognized ids
pub fn decode_skipping_unknown(bytes: &[u8]) -> Result<Ensemble> {
    decode_frame(bytes, true).map(|(ens, _)| ens)
}

/// Decode every valid PD0 frame in a byte stream
///
/// Unreadable sync candidates are logged and skipped; scanning resumes
/// at the next candidate.
pub fn decode_stream(bytes: &[u8]) -> Vec<(usize, Ensemble)> {
    let mut out = Vec::new();
    let mut resume = 0usize;
    for start in sync::scan_pd0(bytes) {
        if start < resume {
            continue;
        }
        match decode_frame(&bytes[start..], false) {
            Ok((ens, len)) => {
                out.push((start, ens));
                resume = start + len;
            }
            Err(err) => {
                tracing::warn!(offset = start, error = %err, "skipping unreadable PD0 frame");
            }
        }
    }
    out
}

fn decode_frame(bytes: &[u8], skip_unknown: bool) -> Result<(Ensemble, usize)> {
    if bytes.len() < 6 {
        return Err(Error::Truncated {
            offset: bytes.len(),
            needed: 6 - bytes.len(),
        });
    }
    if bytes[0] != 0x7f {
        return Err(Error::BadSync { offset: 0 });
    }
    if bytes[1] != 0x7f {
        return Err(Error::BadSync { offset: 1 });
    }
    let byte_count = usize::from(u16::from_le_bytes([bytes[2], bytes[3]]));
    let total = byte_count + 2;
    if bytes.len() < total {
        return Err(Error::Truncated {
            offset: bytes.len(),
            needed: total - bytes.len(),
        });
    }
    let stored = u32::from(u16::from_le_bytes([bytes[byte_count], bytes[byte_count + 1]]));
    let computed = u32::from(checksum16(&bytes[..byte_count]));
    if computed != stored {
        return Err(Error::BadChecksum { computed, stored });
    }

    let num_types = usize::from(bytes[5]);
    let table_end = 6 + 2 * num_types;
    if table_end > byte_count {
        return Err(Error::Truncated {
            offset: 6,
            needed: table_end - byte_count,
        });
    }
    let mut offsets = Vec::with_capacity(num_types);
    for i in 0..num_types {
        let off = usize::from(u16::from_le_bytes([bytes[6 + 2 * i], bytes[7 + 2 * i]]));
        let in_range = off >= table_end && off + HEADER_ID_LEN <= byte_count;
        let ordered = offsets.last().map_or(true, |&prev| off > prev);
        if !in_range || !ordered {
            return Err(Error::InconsistentOffsetTable { index: i, offset: off });
        }
        offsets.push(off);
    }

    let ens = decode_data_types(&bytes[..byte_count], &offsets, skip_unknown)?;
    Ok((ens, total))
}

fn decode_data_types(frame: &[u8], offsets: &[usize], skip_unknown: bool) -> Result<Ensemble> {
    let mut ens = Ensemble::default();
    let mut fixed: Option<FixedLeader> = None;
    let mut variable: Option<VariableLeader> = None;
    let mut bottom: Option<Pd0BottomTrack> = None;
    let mut velocity: Option<VelocityBlock> = None;
    let mut correlation: Option<CorrelationBlock> = None;
    let mut echo: Option<EchoBlock> = None;
    let mut percent_good: Option<PercentGoodBlock> = None;

    for (index, &off) in offsets.iter().enumerate() {
        let id = u16::from_le_bytes([frame[off], frame[off + 1]]);
        let cells = fixed.as_ref().map(|f| usize::from(f.num_cells));
        match id {
            FIXED_LEADER_ID => {
                // a second Fixed Leader could re-dimension blocks already read
                if fixed.is_some() {
                    return Err(Error::InconsistentOffsetTable { index, offset: off });
                }
                fixed = Some(read_block(frame, off, FIXED_LEADER_LEN)?);
            }
            VARIABLE_LEADER_ID => {
                variable = Some(read_block(frame, off, VARIABLE_LEADER_LEN)?);
            }
            BOTTOM_TRACK_ID => {
                bottom = Some(read_block(frame, off, BOTTOM_TRACK_LEN)?);
            }
            VELOCITY_ID => {
                let cells = cells.ok_or(Error::InconsistentOffsetTable { index, offset: off })?;
                velocity = Some(read_cell_block(frame, off, cells, 8)?);
            }
            CORRELATION_ID => {
                let cells = cells.ok_or(Error::InconsistentOffsetTable { index, offset: off })?;
                correlation = Some(read_cell_block(frame, off, cells, 4)?);
            }
            ECHO_ID => {
                let cells = cells.ok_or(Error::InconsistentOffsetTable { index, offset: off })?;
                echo = Some(read_cell_block(frame, off, cells, 4)?);
            }
            PERCENT_GOOD_ID => {
                let cells = cells.ok_or(Error::InconsistentOffsetTable { index, offset: off })?;
                percent_good = Some(read_cell_block(frame, off, cells, 4)?);
            }
            _ => {
                if !skip_unknown {
                    return Err(Error::UnknownDataType { id, offset: off });
                }
            }
        }
    }

    let xform = fixed
        .as_ref()
        .map(|f| CoordTransform::from_ex(f.coord_transform))
        .unwrap_or(CoordTransform::Earth);

    if let Some(fl) = &fixed {
        let cells = usize::from(fl.num_cells);
        let beams = usize::from(fl.num_beams);
        let mut ed = EnsembleData::new(cells, beams);
        ed.desired_ping_count = fl.pings_per_ensemble;
        ed.actual_ping_count = fl.pings_per_ensemble;
        ens.ensemble_data = Some(ed);

        ens.system_setup = Some(SystemSetup {
            bin_size: f32::from(fl.cell_length_cm) / 100.0,
            blank: f32::from(fl.blank_after_transmit_cm) / 100.0,
            wp_pings: f32::from(fl.pings_per_ensemble),
            bt_pings: bottom
                .as_ref()
                .map(|b| f32::from(b.pings_per_ensemble))
                .unwrap_or(0.0),
            lag_samples: f32::from(fl.lag_length),
            code_repeats: f32::from(fl.num_code_repeats),
            transmit_cycles: f32::from(fl.xmit_pulse_length_cm),
        });

        let mut anc = Ancillary {
            first_bin_range: f32::from(fl.bin1_distance_cm) / 100.0,
            bin_size: f32::from(fl.cell_length_cm) / 100.0,
            ..Ancillary::default()
        };
        if let Some(vl) = &variable {
            anc.heading = f32::from(vl.heading_cdeg) / 100.0;
            anc.pitch = f32::from(vl.pitch_cdeg) / 100.0;
            anc.roll = f32::from(vl.roll_cdeg) / 100.0;
            anc.water_temp = f32::from(vl.temperature_cdeg) / 100.0;
            anc.salinity = f32::from(vl.salinity);
            anc.speed_of_sound = f32::from(vl.speed_of_sound);
            anc.transducer_depth = f32::from(vl.depth_of_transducer_dm) / 10.0;
            anc.pressure = vl.pressure_dapa as f32 * 10_000.0;
        }
        ens.ancillary = Some(anc);
    }

    if let Some(vl) = &variable {
        let ed = ens
            .ensemble_data
            .get_or_insert_with(|| EnsembleData::new(0, 0));
        ed.ensemble_number =
            u32::from(vl.ensemble_number) + (u32::from(vl.ensemble_number_msb) << 16);
        ed.status = vl.error_status;
        ed.year = u16::from(vl.rtc_y2k[0]) * 100 + u16::from(vl.rtc_y2k[1]);
        ed.month = vl.rtc_y2k[2];
        ed.day = vl.rtc_y2k[3];
        ed.hour = vl.rtc_y2k[4];
        ed.minute = vl.rtc_y2k[5];
        ed.second = vl.rtc_y2k[6];
        ed.hsec = vl.rtc_y2k[7];
    }

    let dims = ens
        .ensemble_data
        .as_ref()
        .map(|ed| (ed.num_bins, ed.num_beams));
    if let (Some((cells, beams)), Some(block)) = (dims, &velocity) {
        let mut m = BinBeam::filled(cells, beams, BAD_VELOCITY);
        for bin in 0..cells {
            for beam in 0..beams {
                let (slot, sign) = velocity_slot(xform, beam, beams);
                let raw = block.velocity[bin * 4 + slot];
                if raw != PD0_BAD_VELOCITY {
                    m.set(bin, beam, sign * f32::from(raw) / 1000.0);
                }
            }
        }
        match xform {
            CoordTransform::Beam => ens.beam_velocity = Some(m),
            CoordTransform::Instrument => ens.instrument_velocity = Some(m),
            CoordTransform::Earth => ens.earth_velocity = Some(m),
            CoordTransform::Ship => ens.ship_velocity = Some(m),
        }
    }
    if let (Some((cells, beams)), Some(block)) = (dims, &correlation) {
        let mut m = BinBeam::filled(cells, beams, 0.0f32);
        for bin in 0..cells {
            for beam in 0..beams {
                let raw = block.correlation[bin * 4 + beam_slot(beam, beams)];
                m.set(bin, beam, f32::from(raw) / 255.0);
            }
        }
        ens.correlation = Some(m);
    }
    if let (Some((cells, beams)), Some(block)) = (dims, &echo) {
        let mut m = BinBeam::filled(cells, beams, 0.0f32);
        for bin in 0..cells {
            for beam in 0..beams {
                let raw = block.echo[bin * 4 + beam_slot(beam, beams)];
                m.set(bin, beam, f32::from(raw) * ECHO_READ_SCALE);
            }
        }
        ens.amplitude = Some(m);
    }
    if let (Some((cells, beams)), Some(block)) = (dims, &percent_good) {
        let pings = ens
            .ensemble_data
            .as_ref()
            .map(|ed| f32::from(ed.desired_ping_count))
            .unwrap_or(0.0);
        let mut m = BinBeam::filled(cells, beams, 0i32);
        for bin in 0..cells {
            for beam in 0..beams {
                let raw = block.percent_good[bin * 4 + beam_slot(beam, beams)];
                let value = if raw == PG_BAD {
                    -1
                } else {
                    (f32::from(raw) / 100.0 * pings).round() as i32
                };
                m.set(bin, beam, value);
            }
        }
        match xform {
            CoordTransform::Beam => ens.good_beam = Some(m),
            CoordTransform::Instrument => ens.good_instrument = Some(m),
            CoordTransform::Earth | CoordTransform::Ship => ens.good_earth = Some(m),
        }
    }

    if let Some(block) = &bottom {
        ens.bottom_track = Some(decode_bottom_track(block, &ens, xform));
    }

    Ok(ens)
}

fn decode_bottom_track(block: &Pd0BottomTrack, ens: &Ensemble, xform: CoordTransform) -> BottomTrack {
    let mut bt = BottomTrack::new(4);
    let pings = f32::from(block.pings_per_ensemble);
    bt.actual_ping_count = pings;
    if let Some(anc) = &ens.ancillary {
        bt.heading = anc.heading;
        bt.pitch = anc.pitch;
        bt.roll = anc.roll;
        bt.water_temp = anc.water_temp;
        bt.system_temp = anc.system_temp;
        bt.salinity = anc.salinity;
        bt.pressure = anc.pressure;
        bt.transducer_depth = anc.transducer_depth;
        bt.speed_of_sound = anc.speed_of_sound;
    }
    for beam in 0..4 {
        let slot = beam_slot(beam, 4);
        let range_cm =
            u32::from(block.range_lsb_cm[slot]) + (u32::from(block.range_msb_cm[slot]) << 16);
        bt.range[beam] = range_cm as f32 / 100.0;
        bt.correlation[beam] = f32::from(block.correlation[slot]) / 255.0;
        bt.amplitude[beam] = f32::from(block.eval_amp[slot]) * ECHO_READ_SCALE;

        let (vslot, sign) = velocity_slot(xform, beam, 4);
        let raw = block.velocity[vslot];
        let vel = if raw == PD0_BAD_VELOCITY {
            BAD_VELOCITY
        } else {
            sign * f32::from(raw) / 1000.0
        };
        let good = if block.percent_good[slot] == PG_BAD {
            0.0
        } else {
            (f32::from(block.percent_good[slot]) / 100.0 * pings).round()
        };
        match xform {
            CoordTransform::Beam => {
                bt.beam_velocity[beam] = vel;
                bt.beam_good[beam] = good;
            }
            CoordTransform::Instrument => {
                bt.instrument_velocity[beam] = vel;
                bt.instrument_good[beam] = good;
            }
            CoordTransform::Earth | CoordTransform::Ship => {
                bt.earth_velocity[beam] = vel;
                bt.earth_good[beam] = good;
            }
        }
    }
    bt
}

fn read_block<T>(frame: &[u8], off: usize, len: usize) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    if off + len > frame.len() {
        return Err(Error::Truncated {
            offset: off,
            needed: off + len - frame.len(),
        });
    }
    let mut cursor = Cursor::new(&frame[off..off + len]);
    T::read_le(&mut cursor).map_err(|_| Error::Truncated {
        offset: off,
        needed: len,
    })
}

fn read_cell_block<T>(frame: &[u8], off: usize, cells: usize, stride: usize) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = CellArgs>,
{
    let len = HEADER_ID_LEN + cells * stride;
    if off + len > frame.len() {
        return Err(Error::Truncated {
            offset: off,
            needed: off + len - frame.len(),
        });
    }
    let mut cursor = Cursor::new(&frame[off..off + len]);
    T::read_le_args(&mut cursor, CellArgs { cells }).map_err(|_| Error::Truncated {
        offset: off,
        needed: len,
    })
}

/// Encode a canonical ensemble as one PD0 frame
///
/// `xform` selects which velocity (and good-ping) dataset goes on the
/// wire; the Fixed Leader records it. Dimension violations are
/// programmer errors and panic, as is exceeding the 65535-byte frame
/// limit.
pub fn encode(ens: &Ensemble, xform: CoordTransform) -> Vec<u8> {
    let (cells, beams) = dimensions(ens, xform);
    assert!(beams == 1 || beams == 4, "beam count must be 1 or 4");

    let mut blocks: Vec<Vec<u8>> = Vec::new();
    blocks.push(write_block(&fixed_leader(ens, xform, cells, beams)));
    blocks.push(write_block(&variable_leader(ens)));
    if let Some(m) = ens.velocity(xform) {
        assert_matrix(m.bins(), m.beams(), cells, beams);
        blocks.push(write_block(&velocity_block(m, xform)));
    }
    if let Some(m) = &ens.correlation {
        assert_matrix(m.bins(), m.beams(), cells, beams);
        blocks.push(write_block(&correlation_block(m, ens)));
    }
    if let Some(m) = &ens.amplitude {
        assert_matrix(m.bins(), m.beams(), cells, beams);
        blocks.push(write_block(&echo_block(m)));
    }
    if let Some(m) = ens.good_counts(xform) {
        assert_matrix(m.bins(), m.beams(), cells, beams);
        blocks.push(write_block(&percent_good_block(m, ens)));
    }
    if let Some(bt) = &ens.bottom_track {
        blocks.push(write_block(&bottom_track_block(bt, ens, xform)));
    }

    let num_types = blocks.len();
    let table_end = 6 + 2 * num_types;
    let byte_count = table_end + blocks.iter().map(Vec::len).sum::<usize>();
    assert!(byte_count + 2 <= usize::from(u16::MAX), "PD0 frame too large");

    let mut out = Vec::with_capacity(byte_count + 2);
    out.extend_from_slice(&sync::PD0_SYNC);
    out.extend_from_slice(&(byte_count as u16).to_le_bytes());
    out.push(0);
    out.push(num_types as u8);
    let mut off = table_end;
    for block in &blocks {
        out.extend_from_slice(&(off as u16).to_le_bytes());
        off += block.len();
    }
    for block in &blocks {
        out.extend_from_slice(block);
    }
    out.extend_from_slice(&checksum16(&out).to_le_bytes());
    out
}

fn dimensions(ens: &Ensemble, xform: CoordTransform) -> (usize, usize) {
    if let Some(ed) = &ens.ensemble_data {
        return (ed.num_bins, ed.num_beams);
    }
    if let Some(m) = ens.velocity(xform) {
        return (m.bins(), m.beams());
    }
    (0, 4)
}

fn assert_matrix(bins: usize, beams: usize, cells: usize, want_beams: usize) {
    assert_eq!(bins, cells, "matrix bin count mismatch");
    assert_eq!(beams, want_beams, "matrix beam count mismatch");
}

fn write_block<T>(value: &T) -> Vec<u8>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::new());
    value
        .write_le(&mut cursor)
        .expect("writing to a Vec cannot fail");
    cursor.into_inner()
}

fn fixed_leader(ens: &Ensemble, xform: CoordTransform, cells: usize, beams: usize) -> FixedLeader {
    let ss = ens.system_setup.clone().unwrap_or_default();
    let bin_size = ens
        .ancillary
        .as_ref()
        .map(|a| a.bin_size)
        .filter(|&b| b > 0.0)
        .unwrap_or(ss.bin_size);
    let bin1 = ens
        .ancillary
        .as_ref()
        .map(|a| a.first_bin_range)
        .unwrap_or(0.0);
    let pings = ens
        .ensemble_data
        .as_ref()
        .map(|ed| ed.desired_ping_count)
        .unwrap_or(0);
    FixedLeader {
        fw_version: 0,
        fw_revision: 0,
        system_config: 0,
        real_sim_flag: 0,
        lag_length: ss.lag_samples.round() as u8,
        num_beams: beams as u8,
        num_cells: cells as u8,
        pings_per_ensemble: pings,
        cell_length_cm: (bin_size * 100.0).round() as u16,
        blank_after_transmit_cm: (ss.blank * 100.0).round() as u16,
        profiling_mode: 0,
        low_corr_threshold: 0,
        num_code_repeats: ss.code_repeats.round() as u8,
        percent_good_minimum: 0,
        error_velocity_max: 0,
        tpp_minutes: 0,
        tpp_seconds: 0,
        tpp_hundredths: 0,
        coord_transform: xform.to_ex(),
        heading_alignment: 0,
        heading_bias: 0,
        sensor_source: 0,
        sensors_available: 0,
        bin1_distance_cm: (bin1 * 100.0).round() as u16,
        xmit_pulse_length_cm: ss.transmit_cycles.round() as u16,
        ref_layer_avg: 0,
        false_target_threshold: 0,
        spare: 0,
        transmit_lag_distance_cm: 0,
        cpu_serial: [0; 8],
        system_bandwidth: 0,
        system_power: 0,
        spare2: 0,
        serial_number: 0,
        beam_angle: 20,
    }
}

fn variable_leader(ens: &Ensemble) -> VariableLeader {
    let ed = ens.ensemble_data.clone().unwrap_or_else(|| EnsembleData::new(0, 4));
    let anc = ens.ancillary.clone().unwrap_or_default();
    VariableLeader {
        ensemble_number: (ed.ensemble_number & 0xffff) as u16,
        rtc_year: (ed.year % 100) as u8,
        rtc_month: ed.month,
        rtc_day: ed.day,
        rtc_hour: ed.hour,
        rtc_minute: ed.minute,
        rtc_second: ed.second,
        rtc_hundredths: ed.hsec,
        ensemble_number_msb: ((ed.ensemble_number >> 16) & 0xff) as u8,
        bit_result: 0,
        speed_of_sound: anc.speed_of_sound.round() as u16,
        depth_of_transducer_dm: (anc.transducer_depth * 10.0).round() as u16,
        heading_cdeg: (anc.heading * 100.0).round() as u16,
        pitch_cdeg: (anc.pitch * 100.0).round() as i16,
        roll_cdeg: (anc.roll * 100.0).round() as i16,
        salinity: anc.salinity.round() as u16,
        temperature_cdeg: (anc.water_temp * 100.0).round() as i16,
        mpt_minutes: 0,
        mpt_seconds: 0,
        mpt_hundredths: 0,
        heading_stddev: 0,
        pitch_stddev: 0,
        roll_stddev: 0,
        adc: [0; 8],
        error_status: ed.status,
        spare: 0,
        pressure_dapa: (anc.pressure * 0.0001).round() as u32,
        pressure_variance: 0,
        spare2: 0,
        rtc_y2k: [
            (ed.year / 100) as u8,
            (ed.year % 100) as u8,
            ed.month,
            ed.day,
            ed.hour,
            ed.minute,
            ed.second,
            ed.hsec,
        ],
    }
}

fn velocity_block(m: &BinBeam<f32>, xform: CoordTransform) -> VelocityBlock {
    let mut velocity = vec![PD0_BAD_VELOCITY; m.bins() * 4];
    for bin in 0..m.bins() {
        for beam in 0..m.beams() {
            let (slot, sign) = velocity_slot(xform, beam, m.beams());
            let value = m.get(bin, beam);
            velocity[bin * 4 + slot] = if value == BAD_VELOCITY {
                PD0_BAD_VELOCITY
            } else {
                (sign * value * 1000.0).round().clamp(-32767.0, 32767.0) as i16
            };
        }
    }
    VelocityBlock { velocity }
}

/// The profile-correlation write scale
///
/// Counts are `raw * 128 / ((n - 1) / n)` with `n` the transmit code
/// repeats; `n` of zero is treated as one, and a denominator that would
/// not be positive falls back to one.
fn correlation_scale(ens: &Ensemble) -> f32 {
    let mut repeats = ens
        .system_setup
        .as_ref()
        .map(|ss| ss.code_repeats)
        .unwrap_or(0.0);
    if repeats == 0.0 {
        repeats = 1.0;
    }
    let denom = (repeats - 1.0) / repeats;
    if denom > 0.0 {
        128.0 / denom
    } else {
        128.0
    }
}

fn correlation_block(m: &BinBeam<f32>, ens: &Ensemble) -> CorrelationBlock {
    let scale = correlation_scale(ens);
    let mut correlation = vec![0u8; m.bins() * 4];
    for bin in 0..m.bins() {
        for beam in 0..m.beams() {
            let slot = beam_slot(beam, m.beams());
            correlation[bin * 4 + slot] =
                (m.get(bin, beam) * scale).round().clamp(0.0, 255.0) as u8;
        }
    }
    CorrelationBlock { correlation }
}

fn echo_block(m: &BinBeam<f32>) -> EchoBlock {
    let mut echo = vec![0u8; m.bins() * 4];
    for bin in 0..m.bins() {
        for beam in 0..m.beams() {
            let slot = beam_slot(beam, m.beams());
            echo[bin * 4 + slot] =
                (m.get(bin, beam) * ECHO_WRITE_SCALE).round().clamp(0.0, 255.0) as u8;
        }
    }
    EchoBlock { echo }
}

fn percent_good_block(m: &BinBeam<i32>, ens: &Ensemble) -> PercentGoodBlock {
    let pings = ens
        .ensemble_data
        .as_ref()
        .map(|ed| f32::from(ed.desired_ping_count))
        .unwrap_or(0.0);
    let mut percent_good = vec![0u8; m.bins() * 4];
    for bin in 0..m.bins() {
        for beam in 0..m.beams() {
            let slot = beam_slot(beam, m.beams());
            let good = m.get(bin, beam);
            percent_good[bin * 4 + slot] = if good < 0 {
                PG_BAD
            } else if pings > 0.0 {
                (good as f32 / pings * 100.0).round().clamp(0.0, 100.0) as u8
            } else {
                0
            };
        }
    }
    PercentGoodBlock { percent_good }
}

fn bottom_track_block(bt: &BottomTrack, ens: &Ensemble, xform: CoordTransform) -> Pd0BottomTrack {
    let pings = ens
        .system_setup
        .as_ref()
        .map(|ss| ss.bt_pings)
        .filter(|&p| p > 0.0)
        .unwrap_or(bt.actual_ping_count);
    let mut block = Pd0BottomTrack {
        pings_per_ensemble: pings.round().clamp(0.0, 65535.0) as u16,
        ..Pd0BottomTrack::default()
    };
    let (velocities, goods) = match xform {
        CoordTransform::Beam => (&bt.beam_velocity, &bt.beam_good),
        CoordTransform::Instrument => (&bt.instrument_velocity, &bt.instrument_good),
        CoordTransform::Earth | CoordTransform::Ship => (&bt.earth_velocity, &bt.earth_good),
    };
    for beam in 0..bt.num_beams.min(4) {
        let slot = beam_slot(beam, bt.num_beams);
        let range_cm = (bt.range[beam] * 100.0).round().max(0.0) as u32;
        block.range_lsb_cm[slot] = (range_cm & 0xffff) as u16;
        block.range_msb_cm[slot] = ((range_cm >> 16) & 0xff) as u8;
        block.correlation[slot] = (bt.correlation[beam] * 255.0).round().clamp(0.0, 255.0) as u8;
        block.eval_amp[slot] =
            (bt.amplitude[beam] * ECHO_WRITE_SCALE).round().clamp(0.0, 255.0) as u8;
        block.percent_good[slot] = if pings > 0.0 {
            (goods[beam] / pings * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        let (vslot, sign) = velocity_slot(xform, beam, bt.num_beams);
        let value = velocities[beam];
        block.velocity[vslot] = if value == BAD_VELOCITY {
            PD0_BAD_VELOCITY
        } else {
            (sign * value * 1000.0).round().clamp(-32767.0, 32767.0) as i16
        };
    }
    block
}
