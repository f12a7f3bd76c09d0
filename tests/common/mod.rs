//! Shared builders for codec test ensembles
//!
//! Values are chosen on the wire quantization grids of both formats
//! (whole millimeters per second, centimeters, hundredths of a degree,
//! correlation counts below 128, echo counts of five or less) so the
//! same ensemble byte-exactly round-trips PD0 as well as RTI.
use adw::model::{
    Ancillary, BinBeam, BottomTrack, Ensemble, EnsembleData, NmeaData, SystemSetup, WaterMass,
    BAD_VELOCITY, BT_BT_3BEAM, BT_SEARCHING,
};

pub fn sample_ensemble() -> Ensemble {
    let bins = 3;
    let beams = 4;
    let mut ens = Ensemble::new(bins, beams);

    ens.ensemble_data = Some(EnsembleData {
        ensemble_number: 1_234_567,
        num_bins: bins,
        num_beams: beams,
        desired_ping_count: 100,
        actual_ping_count: 100,
        status: 0,
        year: 2023,
        month: 6,
        day: 15,
        hour: 12,
        minute: 30,
        second: 45,
        hsec: 50,
    });

    ens.ancillary = Some(Ancillary {
        first_bin_range: 1.2,
        bin_size: 2.0,
        first_ping_time: 380.25,
        last_ping_time: 381.25,
        heading: 123.45,
        pitch: -2.5,
        roll: 1.25,
        water_temp: 21.37,
        system_temp: 25.0,
        salinity: 35.0,
        pressure: 2_000_000.0,
        transducer_depth: 5.5,
        speed_of_sound: 1500.0,
        raw_mag: [0.1, 0.2, 0.3],
        raw_accel: [0.0, 0.0, -9.81],
        raw_tilt: [0.5, -0.25],
    });

    ens.earth_velocity = Some(BinBeam::from_vec(
        bins,
        beams,
        vec![
            0.1, 0.2, -0.05, 0.0, //
            0.25, -0.3, 0.015, 0.002, //
            BAD_VELOCITY, 0.4, -0.4, 0.001,
        ],
    ));
    ens.amplitude = Some(BinBeam::from_vec(
        bins,
        beams,
        vec![
            0.5, 1.0, 1.5, 2.0, //
            2.5, 0.5, 1.0, 1.5, //
            2.0, 2.5, 0.5, 1.0,
        ],
    ));
    ens.correlation = Some(BinBeam::from_vec(
        bins,
        beams,
        vec![
            0.1, 0.2, 0.3, 0.45, //
            0.25, 0.35, 0.15, 0.05, //
            0.4, 0.3, 0.2, 0.1,
        ],
    ));
    ens.good_earth = Some(BinBeam::from_vec(
        bins,
        beams,
        vec![
            100, 99, 98, 97, //
            50, 25, 0, -1, //
            75, 60, 45, 30,
        ],
    ));

    let mut bt = BottomTrack::new(beams);
    bt.first_ping_time = 380.25;
    bt.last_ping_time = 381.25;
    bt.heading = 123.45;
    bt.pitch = -2.5;
    bt.roll = 1.25;
    bt.water_temp = 21.37;
    bt.system_temp = 25.0;
    bt.salinity = 35.0;
    bt.pressure = 2_000_000.0;
    bt.transducer_depth = 5.5;
    bt.speed_of_sound = 1500.0;
    bt.status = BT_SEARCHING | BT_BT_3BEAM;
    bt.actual_ping_count = 20.0;
    bt.range = vec![12.34, 12.56, 12.78, 13.0];
    bt.snr = vec![20.0, 21.0, 22.0, 23.0];
    bt.amplitude = vec![0.45, 0.9, 1.35, 1.8];
    bt.correlation = vec![0.2, 0.4, 0.6, 0.8];
    bt.beam_velocity = vec![0.05, -0.05, 0.1, -0.1];
    bt.beam_good = vec![20.0, 19.0, 18.0, 17.0];
    bt.instrument_velocity = vec![0.15, -0.15, 0.2, -0.2];
    bt.instrument_good = vec![20.0, 20.0, 20.0, 20.0];
    bt.earth_velocity = vec![0.5, -0.5, 0.25, 0.005];
    bt.earth_good = vec![20.0, 19.0, 18.0, 17.0];
    bt.ship_velocity = vec![BAD_VELOCITY; 4];
    ens.bottom_track = Some(bt);

    ens.system_setup = Some(SystemSetup {
        bin_size: 2.0,
        blank: 0.5,
        wp_pings: 100.0,
        bt_pings: 20.0,
        lag_samples: 10.0,
        code_repeats: 2.0,
        transmit_cycles: 30.0,
    });

    ens.nmea = Some(NmeaData::new(
        b"$GPVTG,54.7,T,,M,5.5,N,10.2,K*65\r\n$GPHDT,274.07,T*03\r\n".to_vec(),
    ));

    ens.instrument_water_mass = Some(WaterMass {
        velocity: [0.1, 0.2, 0.3, BAD_VELOCITY],
        depth_layer: 5.0,
    });
    ens.earth_water_mass = Some(WaterMass {
        velocity: [-0.1, -0.2, -0.3, BAD_VELOCITY],
        depth_layer: 5.0,
    });

    ens
}
