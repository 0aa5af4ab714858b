//! Artifact model and its on-the-wire form.
//!
//! An encoded artifact starts with an 8-byte header, the magic `VPA1` and the
//! big-endian `u32` length of the JSON body that follows.

use std::fmt;

mod artifact;

pub use artifact::*;

pub const DEFAULT_MAX_ARTIFACT_BYTES: usize = 16 * 1024 * 1024;
pub const ARTIFACT_MAGIC: u32 = 0x5650_4131;

const HEADER_LEN: usize = 8;

#[derive(Debug)]
pub enum WireError {
    /// Fewer bytes than the header needs.
    Truncated { len: usize },
    MagicMismatch { expected: u32, actual: u32 },
    TooLarge { len: usize, max: usize },
    /// The header announced a different body length than what follows it.
    BodyLength { announced: usize, actual: usize },
    Json(String),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { len } => write!(f, "artifact truncated at {len} bytes"),
            Self::MagicMismatch { expected, actual } => write!(
                f,
                "artifact magic mismatch: expected 0x{expected:08x}, got 0x{actual:08x}"
            ),
            Self::TooLarge { len, max } => write!(f, "artifact body too large: {len} > {max}"),
            Self::BodyLength { announced, actual } => write!(
                f,
                "artifact body is {actual} bytes, header says {announced}"
            ),
            Self::Json(err) => write!(f, "artifact body: {err}"),
        }
    }
}

impl std::error::Error for WireError {}

pub fn encode_artifact(artifact: &Artifact, max_body_bytes: usize) -> Result<Vec<u8>, WireError> {
    let body = facet_json::to_vec(artifact).map_err(|e| WireError::Json(e.to_string()))?;
    let too_large = || WireError::TooLarge {
        len: body.len(),
        max: max_body_bytes,
    };
    if body.len() > max_body_bytes {
        return Err(too_large());
    }
    let body_len = u32::try_from(body.len()).map_err(|_| too_large())?;

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&ARTIFACT_MAGIC.to_be_bytes());
    out.extend_from_slice(&body_len.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn encode_artifact_default(artifact: &Artifact) -> Result<Vec<u8>, WireError> {
    encode_artifact(artifact, DEFAULT_MAX_ARTIFACT_BYTES)
}

pub fn decode_artifact(bytes: &[u8], max_body_bytes: usize) -> Result<Artifact, WireError> {
    let body = artifact_body(bytes, max_body_bytes)?;
    facet_json::from_slice(body).map_err(|e| WireError::Json(e.to_string()))
}

pub fn decode_artifact_default(bytes: &[u8]) -> Result<Artifact, WireError> {
    decode_artifact(bytes, DEFAULT_MAX_ARTIFACT_BYTES)
}

/// Checks the header and returns the JSON body it announces.
fn artifact_body(bytes: &[u8], max_body_bytes: usize) -> Result<&[u8], WireError> {
    let Some((header, body)) = bytes.split_first_chunk::<HEADER_LEN>() else {
        return Err(WireError::Truncated { len: bytes.len() });
    };
    let [m0, m1, m2, m3, l0, l1, l2, l3] = *header;

    let magic = u32::from_be_bytes([m0, m1, m2, m3]);
    if magic != ARTIFACT_MAGIC {
        return Err(WireError::MagicMismatch {
            expected: ARTIFACT_MAGIC,
            actual: magic,
        });
    }

    let announced = u32::from_be_bytes([l0, l1, l2, l3]) as usize;
    if announced > max_body_bytes {
        return Err(WireError::TooLarge {
            len: announced,
            max: max_body_bytes,
        });
    }
    if body.len() != announced {
        return Err(WireError::BodyLength {
            announced,
            actual: body.len(),
        });
    }
    Ok(body)
}
