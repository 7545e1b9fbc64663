use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_file(path: &Path) -> Result<String> {
    Ok(sha256_bytes(&std::fs::read(path)?))
}

/// Hash of the compact JSON form. Struct fields keep declaration order, so the
/// digest is stable for a given type.
pub fn sha256_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(sha256_bytes(&serde_json::to_vec(value)?))
}
