// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Container framing.
//!
//! ```text
//! 0              magic       b"EXRT"
//! 4              version     u32 LE
//! 8              header_len  u64 LE
//! 16             header      JSON ProgramHeader
//! 16+header_len  data        constant segment, then delegate blobs
//! ```
//!
//! Segment offsets in the header are relative to the start of the data
//! section.

use std::ops::Range;

use crate::{ProgramError, ProgramHeader};

pub const MAGIC: [u8; 4] = *b"EXRT";
pub const FORMAT_VERSION: u32 = 1;
pub const PREAMBLE_LEN: usize = 16;

/// Parses the preamble and header, returning the header and the byte range
/// of the data section within `bytes`.
pub fn decode(bytes: &[u8]) -> Result<(ProgramHeader, Range<usize>), ProgramError> {
    if bytes.len() < PREAMBLE_LEN {
        return Err(ProgramError::Format(format!(
            "file is {} bytes, shorter than the {PREAMBLE_LEN}-byte preamble",
            bytes.len()
        )));
    }
    if bytes[0..4] != MAGIC {
        return Err(ProgramError::Format(format!(
            "bad magic {:?}",
            String::from_utf8_lossy(&bytes[0..4])
        )));
    }

    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(ProgramError::UnsupportedVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let mut header_len = [0u8; 8];
    header_len.copy_from_slice(&bytes[8..16]);
    let header_len = usize::try_from(u64::from_le_bytes(header_len))
        .map_err(|_| ProgramError::Format("header length overflows usize".into()))?;
    let header_end = PREAMBLE_LEN
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| {
            ProgramError::Format(format!(
                "header of {header_len} bytes runs past end of file ({} bytes)",
                bytes.len()
            ))
        })?;

    let header: ProgramHeader = serde_json::from_slice(&bytes[PREAMBLE_LEN..header_end])?;
    Ok((header, header_end..bytes.len()))
}

/// Writes the container for `header` followed by `data`.
pub fn encode(header: &ProgramHeader, data: &[u8]) -> Result<Vec<u8>, ProgramError> {
    let json = serde_json::to_vec(header)?;
    let mut out = Vec::with_capacity(PREAMBLE_LEN + json.len() + data.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&(json.len() as u64).to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(data);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Segment;

    fn empty_header() -> ProgramHeader {
        ProgramHeader {
            name: "empty".into(),
            values: vec![],
            inputs: vec![],
            outputs: vec![],
            chain: vec![],
            arenas: vec![],
            delegates: vec![],
            constants: Segment::default(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let bytes = encode(&empty_header(), b"tail").unwrap();
        let (header, data) = decode(&bytes).unwrap();
        assert_eq!(header, empty_header());
        assert_eq!(&bytes[data], b"tail");
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&empty_header(), &[]).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(ProgramError::Format(_))));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = encode(&empty_header(), &[]).unwrap();
        bytes[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(matches!(
            decode(&bytes),
            Err(ProgramError::UnsupportedVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = encode(&empty_header(), &[]).unwrap();
        assert!(matches!(decode(&bytes[..20]), Err(ProgramError::Format(_))));
        assert!(matches!(decode(&bytes[..10]), Err(ProgramError::Format(_))));
    }

    #[test]
    fn test_garbage_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(b"{{{");
        assert!(matches!(decode(&bytes), Err(ProgramError::Header(_))));
    }
}
