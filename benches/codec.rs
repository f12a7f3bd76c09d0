use criterion::{criterion_group, criterion_main, Criterion};

use adw::codec::{pd0, rti};
use adw::model::{BinBeam, CoordTransform, Ensemble};

fn profile_ensemble(bins: usize) -> Ensemble {
    let mut ens = Ensemble::new(bins, 4);
    ens.earth_velocity = Some(BinBeam::filled(bins, 4, 0.25f32));
    ens.amplitude = Some(BinBeam::filled(bins, 4, 1.5f32));
    ens.correlation = Some(BinBeam::filled(bins, 4, 0.4f32));
    ens.good_earth = Some(BinBeam::filled(bins, 4, 10i32));
    ens
}

pub fn rti_codec(c: &mut Criterion) {
    let ens = profile_ensemble(64);
    let bytes = rti::encode(&ens);

    c.bench_function("rti_encode", |b| b.iter(|| rti::encode(&ens)));
    c.bench_function("rti_decode", |b| b.iter(|| rti::decode(&bytes).unwrap()));
}

pub fn pd0_codec(c: &mut Criterion) {
    let ens = profile_ensemble(64);
    let bytes = pd0::encode(&ens, CoordTransform::Earth);

    c.bench_function("pd0_encode", |b| {
        b.iter(|| pd0::encode(&ens, CoordTransform::Earth))
    });
    c.bench_function("pd0_decode", |b| b.iter(|| pd0::decode(&bytes).unwrap()));
}

criterion_group!(benches, rti_codec, pd0_codec);
criterion_main!(benches);
