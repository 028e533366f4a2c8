//! Salted content digests using blake3.
//!
//! Every digest starts from the environment seed (engine version,
//! application version and configuration generation), so changing the
//! pipeline invalidates every digest even when file bytes are unchanged.

use std::io::{self, BufReader, Read};

/// Hex digest of the seed updated with `data`.
pub fn digest_bytes(seed: &blake3::Hasher, data: impl AsRef<[u8]>) -> String {
    let mut hasher = seed.clone();
    hasher.update(data.as_ref());
    hex_digest(&hasher)
}

/// Hex digest of the seed updated with everything `reader` yields.
pub fn digest_reader(seed: &blake3::Hasher, reader: impl Read) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(64 * 1024, reader);
    let mut hasher = seed.clone();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hex_digest(&hasher))
}

/// Finalize a hasher into lowercase hex.
#[inline]
pub fn hex_digest(hasher: &blake3::Hasher) -> String {
    hex::encode(hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_salted() {
        let mut a = blake3::Hasher::new();
        a.update(b"1.0");
        let mut b = blake3::Hasher::new();
        b.update(b"2.0");

        assert_ne!(digest_bytes(&a, "body"), digest_bytes(&b, "body"));
        assert_eq!(digest_bytes(&a, "body"), digest_bytes(&a, "body"));
        assert_eq!(digest_bytes(&a, "body").len(), 64);
    }

    #[test]
    fn test_reader_matches_bytes() {
        let seed = blake3::Hasher::new();
        let data = b"document.on('dom:loaded');\n".repeat(5000);
        let streamed = digest_reader(&seed, &data[..]).unwrap();
        assert_eq!(streamed, digest_bytes(&seed, &data));
    }
}
