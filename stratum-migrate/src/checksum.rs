//! Script checksums.
//!
//! Checksums are 32-bit so they fit the ledger's integer column. Content is
//! line-normalized first: a script checked out with CRLF endings or saved with
//! a BOM must not look like drift.

use sha2::{Digest, Sha256};

/// Compute the checksum of script content.
pub fn calculate(content: &str) -> i32 {
    calculate_all(std::iter::once(content))
}

/// Compute one checksum over several pieces of content, in order.
pub fn calculate_all<'a>(contents: impl IntoIterator<Item = &'a str>) -> i32 {
    let mut hasher = Sha256::new();
    for content in contents {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let content = content.replace("\r\n", "\n").replace('\r', "\n");
        for line in content.lines() {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
    }
    let digest = hasher.finalize();
    i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
