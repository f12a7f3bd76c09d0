//! Wire codecs for the two ensemble formats
//!
//! [`rti`] and [`pd0`] each decode a framed byte slice into a canonical
//! [`crate::model::Ensemble`] and encode one back out. [`transcode`]
//! composes the two. Decode and encode for each dataset live side by
//! side in the same module so that scale, permutation and sentinel
//! rules cannot drift apart.
pub mod pd0;
pub mod rti;
pub mod transcode;

use crate::error::{Error, Result};

/// Element types a dataset can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// 32-bit little-endian IEEE float (code 10)
    Float,
    /// 32-bit little-endian signed integer (code 20)
    Int,
    /// Raw byte (code 50); used only by the NMEA dataset
    Byte,
}

impl ValueKind {
    /// The wire code for this kind
    pub fn code(self) -> i32 {
        match self {
            ValueKind::Float => 10,
            ValueKind::Int => 20,
            ValueKind::Byte => 50,
        }
    }

    /// Decode a wire code
    pub fn from_code(code: i32) -> Result<ValueKind> {
        match code {
            10 => Ok(ValueKind::Float),
            20 => Ok(ValueKind::Int),
            50 => Ok(ValueKind::Byte),
            _ => Err(Error::BadValueKind { kind: code }),
        }
    }

    /// Size of one element in bytes
    pub fn size(self) -> usize {
        match self {
            ValueKind::Float | ValueKind::Int => 4,
            ValueKind::Byte => 1,
        }
    }
}

/// The dataset kinds recognized by the RTI codec, keyed by 8-byte name tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetId {
    /// `E000001`: beam-frame velocities
    BeamVelocity,
    /// `E000002`: instrument-frame velocities
    InstrumentVelocity,
    /// `E000003`: earth-frame velocities
    EarthVelocity,
    /// `E000004`: echo intensity
    Amplitude,
    /// `E000005`: correlation
    Correlation,
    /// `E000006`: good pings, beam frame
    GoodBeam,
    /// `E000007`: good pings, earth frame
    GoodEarth,
    /// `E000008`: ensemble identity and timing
    EnsembleData,
    /// `E000009`: environmental readings
    Ancillary,
    /// `E000010`: bottom track
    BottomTrack,
    /// `E000011`: recorded NMEA block
    Nmea,
    /// `E000012`: instrument-frame water mass
    InstrumentWaterMass,
    /// `E000013`: earth-frame water mass
    EarthWaterMass,
    /// `E000014`: water-profile configuration
    SystemSetup,
    /// `E000015`: good pings, instrument frame
    GoodInstrument,
    /// `E000016`: ship-frame velocities
    ShipVelocity,
}

impl DatasetId {
    /// Every dataset kind in encode (lexicographic tag) order
    pub const ALL: [DatasetId; 16] = [
        DatasetId::BeamVelocity,
        DatasetId::InstrumentVelocity,
        DatasetId::EarthVelocity,
        DatasetId::Amplitude,
        DatasetId::Correlation,
        DatasetId::GoodBeam,
        DatasetId::GoodEarth,
        DatasetId::EnsembleData,
        DatasetId::Ancillary,
        DatasetId::BottomTrack,
        DatasetId::Nmea,
        DatasetId::InstrumentWaterMass,
        DatasetId::EarthWaterMass,
        DatasetId::SystemSetup,
        DatasetId::GoodInstrument,
        DatasetId::ShipVelocity,
    ];

    /// The 8-byte name tag for this dataset kind
    pub fn tag(self) -> &'static [u8; 8] {
        match self {
            DatasetId::BeamVelocity => b"E000001\0",
            DatasetId::InstrumentVelocity => b"E000002\0",
            DatasetId::EarthVelocity => b"E000003\0",
            DatasetId::Amplitude => b"E000004\0",
            DatasetId::Correlation => b"E000005\0",
            DatasetId::GoodBeam => b"E000006\0",
            DatasetId::GoodEarth => b"E000007\0",
            DatasetId::EnsembleData => b"E000008\0",
            DatasetId::Ancillary => b"E000009\0",
            DatasetId::BottomTrack => b"E000010\0",
            DatasetId::Nmea => b"E000011\0",
            DatasetId::InstrumentWaterMass => b"E000012\0",
            DatasetId::EarthWaterMass => b"E000013\0",
            DatasetId::SystemSetup => b"E000014\0",
            DatasetId::GoodInstrument => b"E000015\0",
            DatasetId::ShipVelocity => b"E000016\0",
        }
    }

    /// Look a name tag up in the fixed table
    pub fn from_tag(tag: &[u8; 8]) -> Option<DatasetId> {
        DatasetId::ALL.into_iter().find(|id| id.tag() == tag)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tag_table_round_trips() {
        for id in DatasetId::ALL {
            assert_eq!(DatasetId::from_tag(id.tag()), Some(id));
        }
        assert_eq!(DatasetId::from_tag(b"E000099\0"), None);
    }

    #[test]
    fn encode_order_is_lexicographic() {
        let tags: Vec<&[u8; 8]> = DatasetId::ALL.iter().map(|id| id.tag()).collect();
        let mut sorted = tags.clone();
        sorted.sort();
        assert_eq!(tags, sorted);
    }

    #[test]
    fn value_kind_codes() {
        assert_eq!(ValueKind::from_code(10).unwrap(), ValueKind::Float);
        assert_eq!(ValueKind::from_code(20).unwrap(), ValueKind::Int);
        assert_eq!(ValueKind::from_code(50).unwrap(), ValueKind::Byte);
        assert!(matches!(
            ValueKind::from_code(30),
            Err(Error::BadValueKind { kind: 30 })
        ));
    }
}
