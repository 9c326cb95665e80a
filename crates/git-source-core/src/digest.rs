use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use uuid::Uuid;

/// Namespace for record ids derived with UUIDv5.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_0b8e_52a4_4f37_9d0e_8a3b_f1c2_d7e4);

/// Stable record id for a key such as `git-remote-docs`.
pub fn record_id(key: &str) -> String {
    Uuid::new_v5(&RECORD_NAMESPACE, key.as_bytes()).to_string()
}

/// SHA-256 of the record's JSON form. Identical content yields an
/// identical digest across runs and processes.
pub fn content_digest<T: Serialize + ?Sized>(record: &T) -> serde_json::Result<String> {
    let bytes = serde_json::to_vec(record)?;
    Ok(sha256_hex(&bytes))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Streams a file through SHA-256 without loading it whole.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
