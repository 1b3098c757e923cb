//! CRC32 checksums of media files.

use crate::error::check_source;
use crate::Result;
use flate2::Crc;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Read buffer size.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the CRC32 of a file as eight uppercase hex digits.
///
/// `on_bytes` is called with the running byte count after every chunk.
/// `abort` is polled between chunks; when it returns true the computation
/// stops and `Ok(None)` is returned.
pub fn file_crc32<P, A>(path: &Path, mut on_bytes: P, abort: A) -> Result<Option<String>>
where
    P: FnMut(u64),
    A: Fn() -> bool,
{
    check_source(path)?;

    let mut file = File::open(path)?;
    let mut crc = Crc::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        if abort() {
            #[cfg(feature = "tracing")]
            tracing::info!("CRC32 of {:?} aborted after {} bytes", path, total);
            return Ok(None);
        }
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        crc.update(&buffer[..read]);
        total += read as u64;
        on_bytes(total);
    }

    Ok(Some(format!("{:08X}", crc.sum())))
}

/// Compute the CRC32 of a file without progress or cancellation.
pub fn crc32_of(path: &Path) -> Result<String> {
    let sum = file_crc32(path, |_| {}, || false)?;
    Ok(sum.unwrap_or_default())
}

/// Compare a file's CRC32 against `expected`, ignoring case.
pub fn verify_crc32(path: &Path, expected: &str) -> Result<bool> {
    let actual = crc32_of(path)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}
