use super::encryption::KdfParams;
use crate::errors::CoreError;

/// Magic bytes identifying a Trading Pit snapshot.
pub const MAGIC: &[u8; 4] = b"TPIT";

pub const CURRENT_VERSION: u16 = 1;

/// magic(4) + version(2) + kdf_params(12) + salt(16) + nonce(12) + ciphertext_len(8)
pub const HEADER_SIZE: usize = 54;

/// Parsed snapshot header.
#[derive(Debug)]
pub struct SnapshotHeader {
    pub version: u16,
    pub kdf_params: KdfParams,
    pub salt: [u8; 16],
    pub nonce: [u8; 12],
    pub ciphertext_len: u64,
}

/// Serialize a snapshot.
///
/// ```text
/// [TPIT: 4B] [version: 2B LE] [memory_cost: 4B LE] [time_cost: 4B LE]
/// [parallelism: 4B LE] [salt: 16B] [nonce: 12B] [ciphertext_len: 8B LE]
/// [ciphertext + GCM tag]
/// ```
pub fn write_snapshot(
    version: u16,
    kdf_params: &KdfParams,
    salt: &[u8; 16],
    nonce: &[u8; 12],
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&version.to_le_bytes());
    buf.extend_from_slice(&kdf_params.memory_cost.to_le_bytes());
    buf.extend_from_slice(&kdf_params.time_cost.to_le_bytes());
    buf.extend_from_slice(&kdf_params.parallelism.to_le_bytes());
    buf.extend_from_slice(salt);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(&(ciphertext.len() as u64).to_le_bytes());
    buf.extend_from_slice(ciphertext);
    buf
}

/// Forward-only reader over the header bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take<const N: usize>(&mut self, what: &str) -> Result<[u8; N], CoreError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| CoreError::InvalidFileFormat(format!("Truncated header reading {what}")))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u16(&mut self, what: &str) -> Result<u16, CoreError> {
        Ok(u16::from_le_bytes(self.take(what)?))
    }

    fn u32(&mut self, what: &str) -> Result<u32, CoreError> {
        Ok(u32::from_le_bytes(self.take(what)?))
    }

    fn u64(&mut self, what: &str) -> Result<u64, CoreError> {
        Ok(u64::from_le_bytes(self.take(what)?))
    }
}

/// Parse and validate a snapshot header. Returns the header and the ciphertext slice.
pub fn read_snapshot(data: &[u8]) -> Result<(SnapshotHeader, &[u8]), CoreError> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::InvalidFileFormat(
            "Too small to be a snapshot".into(),
        ));
    }

    let mut cur = Cursor { data, pos: 0 };
    if &cur.take::<4>("magic")? != MAGIC {
        return Err(CoreError::InvalidFileFormat(
            "Invalid magic bytes, not a Trading Pit snapshot".into(),
        ));
    }

    let version = cur.u16("version")?;
    if version == 0 || version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(version));
    }

    let kdf_params = KdfParams {
        memory_cost: cur.u32("memory_cost")?,
        time_cost: cur.u32("time_cost")?,
        parallelism: cur.u32("parallelism")?,
    };
    validate_kdf(&kdf_params)?;

    let salt = cur.take::<16>("salt")?;
    let nonce = cur.take::<12>("nonce")?;
    let ciphertext_len = cur.u64("ciphertext length")?;

    let start = cur.pos;
    let end = usize::try_from(ciphertext_len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            CoreError::InvalidFileFormat(format!(
                "Snapshot truncated: header declares {ciphertext_len} bytes, {} present",
                data.len() - start
            ))
        })?;

    let header = SnapshotHeader {
        version,
        kdf_params,
        salt,
        nonce,
        ciphertext_len,
    };
    Ok((header, &data[start..end]))
}

/// Bound KDF costs so a crafted header cannot exhaust memory or CPU.
fn validate_kdf(p: &KdfParams) -> Result<(), CoreError> {
    if !(8..=1_048_576).contains(&p.memory_cost) {
        return Err(CoreError::InvalidFileFormat(format!(
            "KDF memory_cost out of range: {} KiB",
            p.memory_cost
        )));
    }
    if !(1..=20).contains(&p.time_cost) {
        return Err(CoreError::InvalidFileFormat(format!(
            "KDF time_cost out of range: {}",
            p.time_cost
        )));
    }
    if !(1..=16).contains(&p.parallelism) {
        return Err(CoreError::InvalidFileFormat(format!(
            "KDF parallelism out of range: {}",
            p.parallelism
        )));
    }
    Ok(())
}
