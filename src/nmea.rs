//! NMEA sentence handling
//!
//! Two families of ASCII sentences reach this crate: the DVL's own
//! `$PRTI..` sentences, which carry bottom-track and water-mass
//! measurements and build partial ensembles, and ordinary GPS sentences
//! (`$..VTG`, `$..HDT`) recorded alongside ensembles and consumed by
//! ship-speed removal.
use nom::{
    bytes::complete::take_while,
    character::complete::char,
    multi::many0,
    sequence::preceded,
    IResult,
};

use crate::error::{Error, Result};

/// Bad-velocity marker used inside DVL sentences, in mm/s
pub const BAD_DVL: i32 = -99999;

/// Knots to meters per second
const KNOTS_TO_MPS: f32 = 0.514444;

/// The recognized DVL sentence kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvlSentenceKind {
    /// Bottom track and water mass in the instrument frame
    Prti01,
    /// Bottom track and water mass in the earth frame
    Prti02,
    /// Instrument-frame bottom track with an error-velocity component
    Prti03,
    /// Heading, pitch and roll
    Prti30,
    /// Heading, pitch and roll from the auxiliary attitude source
    Prti31,
}

/// Scalar fields extracted from one DVL sentence
///
/// Unused fields are left at their defaults by the kinds that do not
/// carry them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DvlFields {
    /// Sentence start time in hundredths of a second since power up
    pub start_time_hsec: i32,
    /// Sample (ping) number
    pub sample_number: i32,
    /// Water temperature in hundredths of a degree Celsius
    pub temperature_cdeg: i32,
    /// Bottom velocity X/Y/Z (or E/N/V) in mm/s; [`BAD_DVL`] when invalid
    pub velocity: [i32; 3],
    /// Error-velocity component in mm/s, when the sentence carries one
    pub velocity_q: Option<i32>,
    /// Range to bottom in millimeters
    pub depth_mm: i32,
    /// Water-mass velocity in mm/s
    pub water_mass_velocity: [i32; 3],
    /// Water-mass depth layer in millimeters
    pub water_mass_depth_mm: i32,
    /// System status word
    pub status: u32,
    /// Heading in degrees (attitude sentences)
    pub heading: f32,
    /// Pitch in degrees (attitude sentences)
    pub pitch: f32,
    /// Roll in degrees (attitude sentences)
    pub roll: f32,
}

/// GPS fields extracted from a recorded sentence block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GpsFields {
    /// Speed over ground in m/s from the latest `$..VTG`
    pub vtg_speed: Option<f32>,
    /// Track made good in degrees true from the latest `$..VTG`
    pub vtg_track: Option<f32>,
    /// True heading in degrees from the latest `$..HDT`
    pub hdt_heading: Option<f32>,
}

fn is_field_byte(c: char) -> bool {
    c != ',' && c != '*'
}

fn sentence_parts(input: &str) -> IResult<&str, (&str, Vec<&str>)> {
    let (input, _) = char('$')(input)?;
    let (input, talker) = take_while(|c: char| c.is_ascii_alphanumeric())(input)?;
    let (input, fields) = many0(preceded(char(','), take_while(is_field_byte)))(input)?;
    Ok((input, (talker, fields)))
}

/// XOR checksum over the characters between `$` and `*`
fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Split a sentence into body and declared checksum, verifying the latter
fn checked_body(line: &str) -> Result<&str> {
    let line = line.trim();
    let stripped = line.strip_prefix('$').ok_or_else(|| Error::BadSentence {
        reason: format!("missing '$': {line}"),
    })?;
    match stripped.split_once('*') {
        Some((body, cs)) => {
            let declared =
                u8::from_str_radix(cs.trim(), 16).map_err(|_| Error::BadSentence {
                    reason: format!("malformed checksum: {line}"),
                })?;
            if nmea_checksum(body) != declared {
                return Err(Error::BadSentence {
                    reason: format!("checksum mismatch: {line}"),
                });
            }
            Ok(body)
        }
        None => Ok(stripped),
    }
}

fn int_field(fields: &[&str], index: usize, line: &str) -> Result<i32> {
    fields
        .get(index)
        .and_then(|f| f.trim().parse::<i32>().ok())
        .ok_or_else(|| Error::BadSentence {
            reason: format!("field {index} is not an integer: {line}"),
        })
}

fn float_field(fields: &[&str], index: usize, line: &str) -> Result<f32> {
    fields
        .get(index)
        .and_then(|f| f.trim().parse::<f32>().ok())
        .ok_or_else(|| Error::BadSentence {
            reason: format!("field {index} is not a number: {line}"),
        })
}

/// Parse one `$PRTI..` sentence into its kind and extracted fields
///
/// The sentence checksum is verified when present. Velocity sentences
/// are laid out as
/// `$PRTIxx,time,sample,temp,x,y,z[,q],depth,wx,wy,wz,wdepth,status`,
/// attitude sentences as `$PRTI3x,heading,pitch,roll`.
pub fn parse_dvl(line: &str) -> Result<(DvlSentenceKind, DvlFields)> {
    let body = checked_body(line)?;
    let owned = format!("${body}");
    let (_, (talker, fields)) = sentence_parts(&owned).map_err(|_| Error::BadSentence {
        reason: format!("unparseable sentence: {line}"),
    })?;
    let kind = match talker {
        "PRTI01" => DvlSentenceKind::Prti01,
        "PRTI02" => DvlSentenceKind::Prti02,
        "PRTI03" => DvlSentenceKind::Prti03,
        "PRTI30" => DvlSentenceKind::Prti30,
        "PRTI31" => DvlSentenceKind::Prti31,
        _ => {
            return Err(Error::BadSentence {
                reason: format!("not a DVL sentence: {line}"),
            })
        }
    };

    let mut out = DvlFields::default();
    match kind {
        DvlSentenceKind::Prti30 | DvlSentenceKind::Prti31 => {
            out.heading = float_field(&fields, 0, line)?;
            out.pitch = float_field(&fields, 1, line)?;
            out.roll = float_field(&fields, 2, line)?;
        }
        _ => {
            out.start_time_hsec = int_field(&fields, 0, line)?;
            out.sample_number = int_field(&fields, 1, line)?;
            out.temperature_cdeg = int_field(&fields, 2, line)?;
            out.velocity = [
                int_field(&fields, 3, line)?,
                int_field(&fields, 4, line)?,
                int_field(&fields, 5, line)?,
            ];
            // PRTI03 inserts an error-velocity component before the depth
            let mut next = 6;
            if kind == DvlSentenceKind::Prti03 {
                out.velocity_q = Some(int_field(&fields, next, line)?);
                next += 1;
            }
            out.depth_mm = int_field(&fields, next, line)?;
            out.water_mass_velocity = [
                int_field(&fields, next + 1, line)?,
                int_field(&fields, next + 2, line)?,
                int_field(&fields, next + 3, line)?,
            ];
            out.water_mass_depth_mm = int_field(&fields, next + 4, line)?;
            out.status = int_field(&fields, next + 5, line)? as u32;
        }
    }
    Ok((kind, out))
}

/// Extract GPS course and heading fields from a raw sentence block
///
/// Later sentences win. Lines that fail their checksum or do not parse
/// are skipped; a block with no usable GPS sentences yields all-`None`.
pub fn extract_gps(block: &[u8]) -> GpsFields {
    let text = String::from_utf8_lossy(block);
    let mut out = GpsFields::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let body = match checked_body(line) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let owned = format!("${body}");
        let Ok((_, (talker, fields))) = sentence_parts(&owned) else {
            continue;
        };
        if talker.len() < 3 {
            continue;
        }
        match &talker[talker.len() - 3..] {
            "VTG" => {
                // track made good (true), then speed over ground in knots
                if let Some(track) = fields.first().and_then(|f| f.parse::<f32>().ok()) {
                    out.vtg_track = Some(track);
                }
                if let Some(knots) = fields.get(4).and_then(|f| f.parse::<f32>().ok()) {
                    out.vtg_speed = Some(knots * KNOTS_TO_MPS);
                }
            }
            "HDT" => {
                if let Some(heading) = fields.first().and_then(|f| f.parse::<f32>().ok()) {
                    out.hdt_heading = Some(heading);
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    fn with_checksum(body: &str) -> String {
        format!("${}*{:02X}", body, nmea_checksum(body))
    }

    #[test]
    fn parse_prti01() {
        let line = with_checksum("PRTI01,380250,8,1464,-1205,-24,-347,79380,0,0,0,0,0");
        let (kind, fields) = parse_dvl(&line).unwrap();
        assert_eq!(kind, DvlSentenceKind::Prti01);
        assert_eq!(fields.start_time_hsec, 380250);
        assert_eq!(fields.sample_number, 8);
        assert_eq!(fields.temperature_cdeg, 1464);
        assert_eq!(fields.velocity, [-1205, -24, -347]);
        assert_eq!(fields.velocity_q, None);
        assert_eq!(fields.depth_mm, 79380);
    }

    #[test]
    fn parse_prti03_has_error_velocity() {
        let line = with_checksum("PRTI03,100,1,1500,10,20,30,40,5000,1,2,3,6000,9");
        let (kind, fields) = parse_dvl(&line).unwrap();
        assert_eq!(kind, DvlSentenceKind::Prti03);
        assert_eq!(fields.velocity_q, Some(40));
        assert_eq!(fields.depth_mm, 5000);
        assert_eq!(fields.water_mass_depth_mm, 6000);
        assert_eq!(fields.status, 9);
    }

    #[test]
    fn parse_prti30_attitude() {
        let line = with_checksum("PRTI30,275.5,-1.2,0.7");
        let (kind, fields) = parse_dvl(&line).unwrap();
        assert_eq!(kind, DvlSentenceKind::Prti30);
        assert_eq!(fields.heading, 275.5);
        assert_eq!(fields.pitch, -1.2);
        assert_eq!(fields.roll, 0.7);
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let err = parse_dvl("$PRTI30,1.0,2.0,3.0*00").unwrap_err();
        assert!(matches!(err, Error::BadSentence { .. }));
    }

    #[test]
    fn extract_vtg_and_hdt() {
        let block = format!(
            "{}\r\n{}\r\n",
            with_checksum("GPVTG,54.7,T,,M,5.5,N,10.2,K"),
            with_checksum("GPHDT,274.07,T")
        );
        let gps = extract_gps(block.as_bytes());
        assert_eq!(gps.vtg_track, Some(54.7));
        assert_eq!(gps.hdt_heading, Some(274.07));
        let speed = gps.vtg_speed.unwrap();
        assert!((speed - 5.5 * 0.514444).abs() < 1e-6);
    }

    #[test]
    fn corrupt_gps_lines_are_skipped() {
        let block = b"$GPVTG,54.7,T,,M,5.5,N,10.2,K*00\r\nnoise\r\n";
        let gps = extract_gps(block);
        assert_eq!(gps, GpsFields::default());
    }
}
