mod common;

use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

use adw::codec::rti;
use common::sample_ensemble;

fn write_sample_file(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("adw-cli-{}-{}", std::process::id(), name));
    let mut stream = rti::encode(&sample_ensemble());
    stream.extend_from_slice(&rti::encode(&sample_ensemble()));
    std::fs::write(&path, stream).expect("failed to write test data file");
    path
}

#[test]
fn count_datasets() -> Result<(), Box<dyn std::error::Error>> {
    let path = write_sample_file("count.ens");
    let mut cmd = Command::cargo_bin("adw")?;

    cmd.arg("count").arg(&path);
    cmd.assert().success().stdout(
        predicate::str::contains("2\tEnsemble")
            .and(predicate::str::contains("2\tEarthVelocity"))
            .and(predicate::str::contains("2\tBottomTrack"))
            .and(predicate::str::contains("0\tBeamVelocity")),
    );

    std::fs::remove_file(path).ok();
    Ok(())
}

#[test]
fn info_reports_format_and_count() -> Result<(), Box<dyn std::error::Error>> {
    let path = write_sample_file("info.ens");
    let mut cmd = Command::cargo_bin("adw")?;

    cmd.arg("info").arg(&path);
    cmd.assert().success().stdout(
        predicate::str::contains("Format: RTI")
            .and(predicate::str::contains("Number of ensembles: 2"))
            .and(predicate::str::contains("3 x 4")),
    );

    std::fs::remove_file(path).ok();
    Ok(())
}

#[test]
fn count_records_no_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("adw")?;

    cmd.arg("count").arg("assets/does_not_exist.ens");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No such file or directory"));

    Ok(())
}

#[test]
fn convert_to_pd0_and_back() -> Result<(), Box<dyn std::error::Error>> {
    let input = write_sample_file("convert-in.ens");
    let mut pd0_path = std::env::temp_dir();
    pd0_path.push(format!("adw-cli-{}-convert-out.pd0", std::process::id()));

    let mut cmd = Command::cargo_bin("adw")?;
    cmd.arg("convert")
        .arg(&input)
        .arg(&pd0_path)
        .arg("--to")
        .arg("pd0");
    cmd.assert().success();

    let bytes = std::fs::read(&pd0_path)?;
    assert_eq!(adw::codec::pd0::decode_stream(&bytes).len(), 2);

    std::fs::remove_file(input).ok();
    std::fs::remove_file(pd0_path).ok();
    Ok(())
}
