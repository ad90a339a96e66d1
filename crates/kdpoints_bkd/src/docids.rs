//! Doc id block encodings used inside leaf blocks.
//!
//! Each leaf starts with one tag byte choosing the encoding:
//!
//! | tag  | encoding                                        | protocol |
//! |------|-------------------------------------------------|----------|
//! | 0xFE | continuous run: first id as vint                | all      |
//! | 16   | min as vint, then `id - min` as u16             | all      |
//! | 21   | three ids per u64 (21 bits each), rest as u32   | >= 10    |
//! | 24   | 3 bytes per id, interleaved                     | 9        |
//! | 24   | low u16 of every id, then high byte of every id | >= 10    |
//! | 32   | u32 per id                                      | all      |

use crate::error::{BkdError, BkdResult};
use crate::version::ProtocolVersion;
use kdpoints_codec::{DataReader, DataWriter};

const CONTINUOUS_IDS: u8 = 0xFE;
const DELTA_BPV_16: u8 = 16;
const BPV_21: u8 = 21;
const BPV_24: u8 = 24;
const BPV_32: u8 = 32;

const MASK_21: u64 = 0x1F_FFFF;

/// How a leaf block stores its doc ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocIdEncoding {
    /// Strictly consecutive ids.
    Continuous,
    /// 16-bit deltas from the smallest id.
    Delta16,
    /// 21-bit ids packed three to a word.
    Bpv21,
    /// 24-bit ids, interleaved bytes.
    Bpv24,
    /// 24-bit ids, low and high parts stored apart.
    Bpv24Split,
    /// Full 32-bit ids.
    Bpv32,
}

impl DocIdEncoding {
    /// Short lowercase label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Delta16 => "delta16",
            Self::Bpv21 => "bpv21",
            Self::Bpv24 => "bpv24",
            Self::Bpv24Split => "bpv24-split",
            Self::Bpv32 => "bpv32",
        }
    }

    /// Decodes a tag byte as read under `protocol`.
    ///
    /// # Errors
    ///
    /// Returns [`BkdError::Corrupt`] for unknown tags or tags the protocol
    /// does not allow.
    pub fn from_tag(tag: u8, protocol: ProtocolVersion) -> BkdResult<Self> {
        match tag {
            CONTINUOUS_IDS => Ok(Self::Continuous),
            DELTA_BPV_16 => Ok(Self::Delta16),
            BPV_21 if protocol.has_bpv21() => Ok(Self::Bpv21),
            BPV_21 => Err(BkdError::corrupt(format!(
                "21-bit doc ids are not valid under protocol {protocol}"
            ))),
            BPV_24 if protocol.has_split_bpv24() => Ok(Self::Bpv24Split),
            BPV_24 => Ok(Self::Bpv24),
            BPV_32 => Ok(Self::Bpv32),
            other => Err(BkdError::corrupt(format!("unknown doc id encoding: {other}"))),
        }
    }
}

/// Picks the most compact encoding the protocol allows.
fn choose(protocol: ProtocolVersion, docs: &[u32]) -> DocIdEncoding {
    let continuous = docs
        .windows(2)
        .all(|w| w[0].checked_add(1) == Some(w[1]));
    if continuous {
        return DocIdEncoding::Continuous;
    }

    let min = docs.iter().copied().min().unwrap_or(0);
    let max = docs.iter().copied().max().unwrap_or(0);
    if max - min <= u32::from(u16::MAX) {
        DocIdEncoding::Delta16
    } else if protocol.has_bpv21() && u64::from(max) <= MASK_21 {
        DocIdEncoding::Bpv21
    } else if max <= 0xFF_FFFF {
        if protocol.has_split_bpv24() {
            DocIdEncoding::Bpv24Split
        } else {
            DocIdEncoding::Bpv24
        }
    } else {
        DocIdEncoding::Bpv32
    }
}

/// Writes a doc id block and returns the encoding that was used.
pub(crate) fn write_doc_ids(
    protocol: ProtocolVersion,
    docs: &[u32],
    out: &mut DataWriter,
) -> DocIdEncoding {
    let encoding = choose(protocol, docs);
    match encoding {
        DocIdEncoding::Continuous => {
            out.write_u8(CONTINUOUS_IDS);
            out.write_vint(docs.first().copied().unwrap_or(0));
        }
        DocIdEncoding::Delta16 => {
            let min = docs.iter().copied().min().unwrap_or(0);
            out.write_u8(DELTA_BPV_16);
            out.write_vint(min);
            for &doc in docs {
                out.write_u16((doc - min) as u16);
            }
        }
        DocIdEncoding::Bpv21 => {
            out.write_u8(BPV_21);
            let mut chunks = docs.chunks_exact(3);
            for c in &mut chunks {
                let word = u64::from(c[0]) | (u64::from(c[1]) << 21) | (u64::from(c[2]) << 42);
                out.write_u64(word);
            }
            for &doc in chunks.remainder() {
                out.write_u32(doc);
            }
        }
        DocIdEncoding::Bpv24 => {
            out.write_u8(BPV_24);
            for &doc in docs {
                out.write_bytes(&doc.to_le_bytes()[..3]);
            }
        }
        DocIdEncoding::Bpv24Split => {
            out.write_u8(BPV_24);
            for &doc in docs {
                out.write_u16(doc as u16);
            }
            for &doc in docs {
                out.write_u8((doc >> 16) as u8);
            }
        }
        DocIdEncoding::Bpv32 => {
            out.write_u8(BPV_32);
            for &doc in docs {
                out.write_u32(doc);
            }
        }
    }
    encoding
}

/// Reads `count` doc ids, appending them to `out`.
pub(crate) fn read_doc_ids(
    protocol: ProtocolVersion,
    r: &mut DataReader<'_>,
    count: usize,
    out: &mut Vec<u32>,
) -> BkdResult<DocIdEncoding> {
    let encoding = DocIdEncoding::from_tag(r.read_u8()?, protocol)?;
    out.reserve(count);
    match encoding {
        DocIdEncoding::Continuous => {
            let first = r.read_vint()?;
            let count_u32 = u32::try_from(count)
                .map_err(|_| BkdError::corrupt("leaf point count overflows u32"))?;
            if first.checked_add(count_u32.saturating_sub(1)).is_none() {
                return Err(BkdError::corrupt("continuous doc ids overflow u32"));
            }
            out.extend((0..count_u32).map(|i| first + i));
        }
        DocIdEncoding::Delta16 => {
            let min = r.read_vint()?;
            for _ in 0..count {
                let delta = u32::from(r.read_u16()?);
                let doc = min
                    .checked_add(delta)
                    .ok_or_else(|| BkdError::corrupt("delta doc id overflows u32"))?;
                out.push(doc);
            }
        }
        DocIdEncoding::Bpv21 => {
            for _ in 0..count / 3 {
                let word = r.read_u64()?;
                out.push((word & MASK_21) as u32);
                out.push(((word >> 21) & MASK_21) as u32);
                out.push(((word >> 42) & MASK_21) as u32);
            }
            for _ in 0..count % 3 {
                out.push(r.read_u32()?);
            }
        }
        DocIdEncoding::Bpv24 => {
            for _ in 0..count {
                let b = r.read_slice(3)?;
                out.push(u32::from_le_bytes([b[0], b[1], b[2], 0]));
            }
        }
        DocIdEncoding::Bpv24Split => {
            let start = out.len();
            for _ in 0..count {
                out.push(u32::from(r.read_u16()?));
            }
            for doc in &mut out[start..] {
                *doc |= u32::from(r.read_u8()?) << 16;
            }
        }
        DocIdEncoding::Bpv32 => {
            for _ in 0..count {
                out.push(r.read_u32()?);
            }
        }
    }
    Ok(encoding)
}
