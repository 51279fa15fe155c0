use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Computes a stable fingerprint of a resource spec.
///
/// The hash covers the JSON encoding of the spec, so two specs hash equally
/// exactly when they serialize equally.
pub fn spec_hash<T: Serialize>(spec: &T) -> Result<String> {
    let bytes = serde_json::to_vec(spec).context("failed to encode spec")?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
