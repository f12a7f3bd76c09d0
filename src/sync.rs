//! Sync-pattern scanners for raw ensemble streams
//!
//! A scanner only locates *candidate* frame starts; it does not validate
//! lengths or checksums. Validation happens when a decoder is run at a
//! candidate offset, so a false sync (the pattern appearing inside
//! payload data) costs one failed decode and nothing else.

/// The PD0 header id / data source id pair
pub const PD0_SYNC: [u8; 2] = [0x7f, 0x7f];

/// The RTI frame sentinel: sixteen 0x80 bytes
pub const RTI_SYNC: [u8; 16] = [0x80; 16];

/// Offsets of every PD0 sync candidate in `bytes`
///
/// A candidate is any position where two consecutive 0x7f bytes occur.
pub fn scan_pd0(bytes: &[u8]) -> Vec<usize> {
    scan(bytes, &PD0_SYNC)
}

/// Offsets of every RTI sync candidate in `bytes`
pub fn scan_rti(bytes: &[u8]) -> Vec<usize> {
    scan(bytes, &RTI_SYNC)
}

fn scan(bytes: &[u8], pattern: &[u8]) -> Vec<usize> {
    if bytes.len() < pattern.len() {
        return Vec::new();
    }
    (0..=bytes.len() - pattern.len())
        .filter(|&i| &bytes[i..i + pattern.len()] == pattern)
        .collect()
}
