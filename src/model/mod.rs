//! The canonical ensemble data model
//!
//! Both wire formats decode into the types here and encode back out of
//! them. Values are stored in canonical units: meters, meters per second,
//! degrees, degrees Celsius, parts per thousand, Pascals. Velocities use
//! the [`BAD_VELOCITY`] sentinel; ranges use [`BAD_RANGE`].
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::nmea::{DvlFields, DvlSentenceKind, BAD_DVL};

/// The canonical bad-velocity marker
///
/// Real measurements never produce this value; it survives every format
/// conversion and every post-processing transform.
pub const BAD_VELOCITY: f32 = 88.888;

/// The canonical bad-range marker
pub const BAD_RANGE: f32 = 0.0;

/// Bottom track used a 3-beam solution for water tracking
pub const BT_WT_3BEAM: u32 = 0x0001;
/// Bottom track used a 3-beam solution for bottom tracking
pub const BT_BT_3BEAM: u32 = 0x0002;
/// Bottom track is holding the search to last known depth
pub const BT_HOLD: u32 = 0x0004;
/// Bottom track is searching for the bottom
pub const BT_SEARCHING: u32 = 0x0008;
/// Bottom track hardware timed out
pub const BT_HDWR_TIMEOUT: u32 = 0x8000;

/// The coordinate frame of a velocity dataset
///
/// PD0 velocity storage is type-erased over the frame; the Fixed Leader
/// records which one a frame's velocities are in. The canonical model
/// keeps one dataset per frame instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Deserialize, Serialize)]
pub enum CoordTransform {
    /// Raw along-beam velocities
    Beam,
    /// Instrument X/Y/Z/Q
    Instrument,
    /// Earth East/North/Vertical/Q
    Earth,
    /// Ship forward/starboard/mast/Q
    Ship,
}

/// A bins × beams matrix stored bin-major
///
/// `index = bin * beams + beam`. Every per-cell dataset in an ensemble
/// has exactly the ensemble's bin and beam counts.
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BinBeam<T> {
    bins: usize,
    beams: usize,
    data: Vec<T>,
}

impl<T: Copy> BinBeam<T> {
    /// Create a matrix with every element set to `fill`
    pub fn filled(bins: usize, beams: usize, fill: T) -> BinBeam<T> {
        BinBeam {
            bins,
            beams,
            data: vec![fill; bins * beams],
        }
    }

    /// Wrap a bin-major vector of exactly `bins * beams` elements
    pub fn from_vec(bins: usize, beams: usize, data: Vec<T>) -> BinBeam<T> {
        assert_eq!(data.len(), bins * beams, "matrix data length mismatch");
        BinBeam { bins, beams, data }
    }

    /// Number of depth cells
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Number of beams
    pub fn beams(&self) -> usize {
        self.beams
    }

    /// The element at (`bin`, `beam`)
    pub fn get(&self, bin: usize, beam: usize) -> T {
        self.data[bin * self.beams + beam]
    }

    /// Replace the element at (`bin`, `beam`)
    pub fn set(&mut self, bin: usize, beam: usize, value: T) {
        self.data[bin * self.beams + beam] = value;
    }

    /// The whole matrix as a bin-major slice
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The whole matrix as a mutable bin-major slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// One bin's beam values
    pub fn row(&self, bin: usize) -> &[T] {
        &self.data[bin * self.beams..(bin + 1) * self.beams]
    }
}

/// Ensemble identity: number, dimensions, ping counts and wall-clock time
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct EnsembleData {
    /// Ensemble number, monotonic across a deployment
    pub ensemble_number: u32,
    /// Number of depth cells
    pub num_bins: usize,
    /// Number of beams (4, or 1 for a vertical-only system)
    pub num_beams: usize,
    /// Pings commanded per ensemble
    pub desired_ping_count: u16,
    /// Pings actually completed
    pub actual_ping_count: u16,
    /// System status bitmask
    pub status: u32,
    /// Calendar year of the first ping
    pub year: u16,
    /// Month (1-12)
    pub month: u8,
    /// Day of month
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute
    pub minute: u8,
    /// Second
    pub second: u8,
    /// Hundredths of a second
    pub hsec: u8,
}

impl EnsembleData {
    /// Create ensemble data for an empty ensemble of the given dimensions
    pub fn new(num_bins: usize, num_beams: usize) -> EnsembleData {
        EnsembleData {
            ensemble_number: 0,
            num_bins,
            num_beams,
            desired_ping_count: 0,
            actual_ping_count: 0,
            status: 0,
            year: 2000,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            hsec: 0,
        }
    }

    /// The wall-clock time of this ensemble, if the fields form a valid date
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        let month = Month::try_from(self.month).ok()?;
        let date = Date::from_calendar_date(i32::from(self.year), month, self.day).ok()?;
        let time = Time::from_hms_milli(
            self.hour,
            self.minute,
            self.second,
            u16::from(self.hsec) * 10,
        )
        .ok()?;
        Some(PrimitiveDateTime::new(date, time).assume_utc())
    }
}

/// Environmental and range-geometry readings taken with the ensemble
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ancillary {
    /// Range to the middle of the first bin in meters
    pub first_bin_range: f32,
    /// Vertical size of each bin in meters
    pub bin_size: f32,
    /// Time of the first ping in seconds since power up
    pub first_ping_time: f32,
    /// Time of the last ping in seconds since power up
    pub last_ping_time: f32,
    /// Heading in degrees
    pub heading: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Roll in degrees
    pub roll: f32,
    /// Water temperature in degrees Celsius
    pub water_temp: f32,
    /// System (electronics) temperature in degrees Celsius
    pub system_temp: f32,
    /// Salinity in parts per thousand
    pub salinity: f32,
    /// Pressure in Pascals
    pub pressure: f32,
    /// Transducer depth in meters
    pub transducer_depth: f32,
    /// Speed of sound in meters per second
    pub speed_of_sound: f32,
    /// Raw magnetic field vector
    pub raw_mag: [f32; 3],
    /// Raw accelerometer vector
    pub raw_accel: [f32; 3],
    /// Raw tilt readings (pitch, roll)
    pub raw_tilt: [f32; 2],
}

impl Default for Ancillary {
    fn default() -> Ancillary {
        Ancillary {
            first_bin_range: 0.0,
            bin_size: 0.0,
            first_ping_time: 0.0,
            last_ping_time: 0.0,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            water_temp: 0.0,
            system_temp: 0.0,
            salinity: 0.0,
            pressure: 0.0,
            transducer_depth: 0.0,
            speed_of_sound: 1500.0,
            raw_mag: [0.0; 3],
            raw_accel: [0.0; 3],
            raw_tilt: [0.0; 2],
        }
    }
}

/// Bottom track: per-beam measurements relative to the sea floor
///
/// Per-beam vectors all have `num_beams` elements. Bottom-track
/// velocities are stored with inverted sign relative to water
/// velocities, which is why ship-speed removal adds them.
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct BottomTrack {
    /// Time of the first bottom ping in seconds since power up
    pub first_ping_time: f32,
    /// Time of the last bottom ping in seconds since power up
    pub last_ping_time: f32,
    /// Heading in degrees
    pub heading: f32,
    /// Pitch in degrees
    pub pitch: f32,
    /// Roll in degrees
    pub roll: f32,
    /// Water temperature in degrees Celsius
    pub water_temp: f32,
    /// System temperature in degrees Celsius
    pub system_temp: f32,
    /// Salinity in parts per thousand
    pub salinity: f32,
    /// Pressure in Pascals
    pub pressure: f32,
    /// Transducer depth in meters
    pub transducer_depth: f32,
    /// Speed of sound in meters per second
    pub speed_of_sound: f32,
    /// Status bitmask; see the `BT_*` constants
    pub status: u32,
    /// Number of beams tracked
    pub num_beams: usize,
    /// Bottom pings actually completed
    pub actual_ping_count: f32,
    /// Range to the bottom per beam in meters; [`BAD_RANGE`] when unseen
    pub range: Vec<f32>,
    /// Signal-to-noise ratio per beam in dB
    pub snr: Vec<f32>,
    /// Echo amplitude per beam in dB
    pub amplitude: Vec<f32>,
    /// Correlation per beam in [0, 1]
    pub correlation: Vec<f32>,
    /// Beam-frame velocity per beam in m/s
    pub beam_velocity: Vec<f32>,
    /// Good bottom pings per beam (beam frame)
    pub beam_good: Vec<f32>,
    /// Instrument-frame velocity per beam in m/s
    pub instrument_velocity: Vec<f32>,
    /// Good bottom pings per beam (instrument frame)
    pub instrument_good: Vec<f32>,
    /// Earth-frame velocity per beam in m/s
    pub earth_velocity: Vec<f32>,
    /// Good bottom pings per beam (earth frame)
    pub earth_good: Vec<f32>,
    /// Ship-frame velocity per beam in m/s
    pub ship_velocity: Vec<f32>,
}

impl BottomTrack {
    /// An empty bottom-track dataset for `num_beams` beams
    ///
    /// Velocities start at [`BAD_VELOCITY`] and ranges at [`BAD_RANGE`].
    pub fn new(num_beams: usize) -> BottomTrack {
        BottomTrack {
            first_ping_time: 0.0,
            last_ping_time: 0.0,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            water_temp: 0.0,
            system_temp: 0.0,
            salinity: 0.0,
            pressure: 0.0,
            transducer_depth: 0.0,
            speed_of_sound: 1500.0,
            status: 0,
            num_beams,
            actual_ping_count: 0.0,
            range: vec![BAD_RANGE; num_beams],
            snr: vec![0.0; num_beams],
            amplitude: vec![0.0; num_beams],
            correlation: vec![0.0; num_beams],
            beam_velocity: vec![BAD_VELOCITY; num_beams],
            beam_good: vec![0.0; num_beams],
            instrument_velocity: vec![BAD_VELOCITY; num_beams],
            instrument_good: vec![0.0; num_beams],
            earth_velocity: vec![BAD_VELOCITY; num_beams],
            earth_good: vec![0.0; num_beams],
            ship_velocity: vec![BAD_VELOCITY; num_beams],
        }
    }

    /// Whether the instrument was still searching for the bottom
    pub fn is_searching(&self) -> bool {
        self.status & BT_SEARCHING != 0
    }

    /// Whether bottom-track hardware timed out
    pub fn is_hardware_timeout(&self) -> bool {
        self.status & BT_HDWR_TIMEOUT != 0
    }

    /// Mean of the good per-beam ranges
    ///
    /// A range is good when it exceeds [`BAD_RANGE`]. At least two good
    /// beams are required; otherwise [`BAD_RANGE`] is returned.
    pub fn average_range(&self) -> f32 {
        let good: Vec<f32> = self
            .range
            .iter()
            .copied()
            .filter(|&r| r > BAD_RANGE)
            .collect();
        if good.len() < 2 {
            return BAD_RANGE;
        }
        good.iter().sum::<f32>() / good.len() as f32
    }

    /// The bin index containing the average bottom range
    ///
    /// Returns -1 when the average range is invalid or `bin_size` is not
    /// positive.
    pub fn range_bin(&self, bin_size: f32) -> i32 {
        let avg = self.average_range();
        if avg <= BAD_RANGE || bin_size <= 0.0 {
            return -1;
        }
        (avg / bin_size).round() as i32
    }
}

/// Water-profile configuration echoed by the instrument
#[derive(Debug, Clone, PartialEq, Default)]
#[derive(Deserialize, Serialize)]
pub struct SystemSetup {
    /// Bin size in meters
    pub bin_size: f32,
    /// Blank after transmit in meters
    pub blank: f32,
    /// Water-profile pings per ensemble
    pub wp_pings: f32,
    /// Bottom-track pings per ensemble
    pub bt_pings: f32,
    /// Lag length in samples
    pub lag_samples: f32,
    /// Number of code repeats in the transmit
    pub code_repeats: f32,
    /// Number of transmit cycles
    pub transmit_cycles: f32,
}

/// A single-depth-layer water-mass velocity measurement
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct WaterMass {
    /// Velocity components in m/s (X/Y/Z/Q or E/N/V/Q by dataset kind)
    pub velocity: [f32; 4],
    /// Center of the measured depth layer in meters
    pub depth_layer: f32,
}

/// The raw NMEA block recorded with an ensemble, plus fields parsed from it
///
/// Only the raw bytes go back on the wire; the parsed fields are derived
/// from them at decode time for consumers such as ship-speed removal.
#[derive(Debug, Clone, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NmeaData {
    /// Raw ASCII sentence block as recorded
    pub sentences: Vec<u8>,
    /// Speed over ground in m/s from the latest `$..VTG`
    pub vtg_speed: Option<f32>,
    /// Track made good in degrees true from the latest `$..VTG`
    pub vtg_track: Option<f32>,
    /// True heading in degrees from the latest `$..HDT`
    pub hdt_heading: Option<f32>,
}

impl NmeaData {
    /// Wrap a raw sentence block, extracting the GPS fields it contains
    pub fn new(sentences: Vec<u8>) -> NmeaData {
        let gps = crate::nmea::extract_gps(&sentences);
        NmeaData {
            sentences,
            vtg_speed: gps.vtg_speed,
            vtg_track: gps.vtg_track,
            hdt_heading: gps.hdt_heading,
        }
    }
}

/// A canonical ensemble: one measurement frame, at most one dataset of
/// each kind
///
/// Created by a decoder, optionally mutated by post-processing, consumed
/// by an encoder. Datasets are owned values; nothing is shared between
/// them.
#[derive(Debug, Clone, PartialEq, Default)]
#[derive(Deserialize, Serialize)]
pub struct Ensemble {
    /// Identity, dimensions and timing
    pub ensemble_data: Option<EnsembleData>,
    /// Environmental readings
    pub ancillary: Option<Ancillary>,
    /// Beam-frame water velocities in m/s
    pub beam_velocity: Option<BinBeam<f32>>,
    /// Instrument-frame water velocities in m/s
    pub instrument_velocity: Option<BinBeam<f32>>,
    /// Earth-frame water velocities in m/s (East/North/Vertical/Q)
    pub earth_velocity: Option<BinBeam<f32>>,
    /// Ship-frame water velocities in m/s
    pub ship_velocity: Option<BinBeam<f32>>,
    /// Echo intensity in dB
    pub amplitude: Option<BinBeam<f32>>,
    /// Correlation in [0, 1]
    pub correlation: Option<BinBeam<f32>>,
    /// Good pings per cell, beam frame
    pub good_beam: Option<BinBeam<i32>>,
    /// Good pings per cell, instrument frame
    pub good_instrument: Option<BinBeam<i32>>,
    /// Good pings per cell, earth frame
    pub good_earth: Option<BinBeam<i32>>,
    /// Bottom track
    pub bottom_track: Option<BottomTrack>,
    /// Water-profile configuration
    pub system_setup: Option<SystemSetup>,
    /// Recorded NMEA block
    pub nmea: Option<NmeaData>,
    /// Instrument-frame water-mass measurement
    pub instrument_water_mass: Option<WaterMass>,
    /// Earth-frame water-mass measurement
    pub earth_water_mass: Option<WaterMass>,
}

impl Ensemble {
    /// An empty ensemble with the given dimensions
    pub fn new(num_bins: usize, num_beams: usize) -> Ensemble {
        Ensemble {
            ensemble_data: Some(EnsembleData::new(num_bins, num_beams)),
            ..Ensemble::default()
        }
    }

    /// Number of depth cells, if ensemble data is present
    pub fn num_bins(&self) -> Option<usize> {
        self.ensemble_data.as_ref().map(|e| e.num_bins)
    }

    /// Number of beams, if ensemble data is present
    pub fn num_beams(&self) -> Option<usize> {
        self.ensemble_data.as_ref().map(|e| e.num_beams)
    }

    /// The velocity dataset for a coordinate frame
    pub fn velocity(&self, xform: CoordTransform) -> Option<&BinBeam<f32>> {
        match xform {
            CoordTransform::Beam => self.beam_velocity.as_ref(),
            CoordTransform::Instrument => self.instrument_velocity.as_ref(),
            CoordTransform::Earth => self.earth_velocity.as_ref(),
            CoordTransform::Ship => self.ship_velocity.as_ref(),
        }
    }

    /// The good-ping dataset for a coordinate frame
    ///
    /// The ship frame has no good-ping dataset of its own and shares the
    /// earth one.
    pub fn good_counts(&self, xform: CoordTransform) -> Option<&BinBeam<i32>> {
        match xform {
            CoordTransform::Beam => self.good_beam.as_ref(),
            CoordTransform::Instrument => self.good_instrument.as_ref(),
            CoordTransform::Earth | CoordTransform::Ship => self.good_earth.as_ref(),
        }
    }

    /// Build a bottom-track-only partial ensemble from a DVL sentence
    ///
    /// `kind` selects how the sentence fields are interpreted: velocity
    /// sentences fill the bottom track (and water mass) in their frame,
    /// attitude sentences fill the ancillary heading/pitch/roll. All
    /// four bottom ranges are set from the sentence depth, status comes
    /// from the sentence status word, water temperature converts from
    /// hundredths of a degree, and the first-ping time from hundredths
    /// of a second. The sentence velocity sentinel becomes
    /// [`BAD_VELOCITY`].
    pub fn from_nmea(kind: DvlSentenceKind, fields: &DvlFields) -> Ensemble {
        let mut ens = Ensemble::new(0, 4);
        match kind {
            DvlSentenceKind::Prti01 | DvlSentenceKind::Prti02 | DvlSentenceKind::Prti03 => {
                let mut bt = BottomTrack::new(4);
                bt.first_ping_time = fields.start_time_hsec as f32 / 100.0;
                bt.last_ping_time = bt.first_ping_time;
                bt.water_temp = fields.temperature_cdeg as f32 / 100.0;
                bt.status = fields.status;
                bt.actual_ping_count = 1.0;
                let depth = fields.depth_mm as f32 / 1000.0;
                for r in bt.range.iter_mut() {
                    *r = depth;
                }
                let vel = dvl_velocity(fields);
                let wm = WaterMass {
                    velocity: dvl_water_mass_velocity(fields),
                    depth_layer: fields.water_mass_depth_mm as f32 / 1000.0,
                };
                match kind {
                    DvlSentenceKind::Prti02 => {
                        bt.earth_velocity = vel.to_vec();
                        ens.earth_water_mass = Some(wm);
                    }
                    _ => {
                        bt.instrument_velocity = vel.to_vec();
                        ens.instrument_water_mass = Some(wm);
                    }
                }
                ens.bottom_track = Some(bt);
            }
            DvlSentenceKind::Prti30 | DvlSentenceKind::Prti31 => {
                let anc = Ancillary {
                    heading: fields.heading,
                    pitch: fields.pitch,
                    roll: fields.roll,
                    ..Ancillary::default()
                };
                ens.ancillary = Some(anc);
            }
        }
        ens
    }
}

fn dvl_component(v: i32) -> f32 {
    if v == BAD_DVL {
        BAD_VELOCITY
    } else {
        v as f32 / 1000.0
    }
}

fn dvl_velocity(fields: &DvlFields) -> [f32; 4] {
    [
        dvl_component(fields.velocity[0]),
        dvl_component(fields.velocity[1]),
        dvl_component(fields.velocity[2]),
        fields.velocity_q.map_or(BAD_VELOCITY, dvl_component),
    ]
}

fn dvl_water_mass_velocity(fields: &DvlFields) -> [f32; 4] {
    [
        dvl_component(fields.water_mass_velocity[0]),
        dvl_component(fields.water_mass_velocity[1]),
        dvl_component(fields.water_mass_velocity[2]),
        BAD_VELOCITY,
    ]
}
