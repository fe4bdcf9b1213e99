//! CRC32C checksum computation for container records
//!
//! The record checksum covers the 4 length bytes followed by the payload.
//! The writer has both in one buffer; the reader holds them in separate
//! buffers and accumulates across them with `Crc32c`.

/// Computes a CRC32C checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Incremental CRC32C over several byte ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32c {
    state: u32,
}

impl Crc32c {
    /// Starts a new checksum.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `data` into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        self.state = crc32c::crc32c_append(self.state, data);
    }

    /// Returns the checksum of everything fed so far.
    pub fn finalize(&self) -> u32 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // Standard CRC32C check value.
        assert_eq!(compute_checksum(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let size = 11u32.to_le_bytes();
        let body = b"hello world";

        let mut concatenated = size.to_vec();
        concatenated.extend_from_slice(body);

        let mut crc = Crc32c::new();
        crc.update(&size);
        crc.update(body);

        assert_eq!(crc.finalize(), compute_checksum(&concatenated));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut data = vec![0x00, 0x01, 0x02, 0x03, 0x04];
        let original = compute_checksum(&data);
        data[2] ^= 0x01;
        assert_ne!(original, compute_checksum(&data));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Crc32c::new().finalize(), compute_checksum(&[]));
    }
}
