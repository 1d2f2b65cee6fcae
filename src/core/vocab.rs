//! Vocabulary table and tiktoken ranks-file loading.
//!
//! # Tiktoken Format
//!
//! The tiktoken format is a simple text-based format where each line contains:
//! - A base64-encoded token (the byte sequence)
//! - A space separator
//! - An integer rank (the token's priority in BPE merging)
//!
//! Lower ranks indicate higher priority - tokens with lower ranks are merged
//! first during the BPE encoding process.
//!
//! # Example Format
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```
//!
//! Where:
//! - `SGVsbG8=` decodes to `Hello` (rank 0, highest priority)
//! - `V29ybGQ=` decodes to `World` (rank 1)
//! - `IQ==` decodes to `!` (rank 2)

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

/// Integer id of a vocabulary entry. Lower rank = higher merge priority.
pub type Rank = u32;

/// Errors from loading a ranks file or constructing a vocabulary table.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("invalid base64 on line {line}: {source}")]
    Base64 {
        line: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("malformed vocabulary line {line}: expected `<base64> <rank>`")]
    MalformedLine { line: usize },
    #[error("invalid rank on line {line}")]
    InvalidRank { line: usize },
    #[error("duplicate token bytes: {0:?}")]
    DuplicateBytes(String),
    #[error("duplicate rank: {0}")]
    DuplicateRank(Rank),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An immutable two-way table mapping token bytes to ranks and back.
///
/// Both directions are built once at construction and agree by
/// construction: inserting a duplicate byte string or a duplicate rank
/// fails. Lookups are constant time, side-effect free, and safe to run
/// from multiple threads against a shared table.
#[derive(Debug)]
pub struct Vocabulary {
    encoder: FxHashMap<Vec<u8>, Rank>,
    decoder: FxHashMap<Rank, Vec<u8>>,
}

impl Vocabulary {
    /// Build a vocabulary from `(bytes, rank)` pairs.
    ///
    /// Fails with [`VocabError::DuplicateBytes`] or
    /// [`VocabError::DuplicateRank`] if either side of the mapping repeats.
    pub fn new<I>(entries: I) -> Result<Self, VocabError>
    where
        I: IntoIterator<Item = (Vec<u8>, Rank)>,
    {
        let entries = entries.into_iter();
        let (low, _) = entries.size_hint();
        let mut encoder = FxHashMap::with_capacity_and_hasher(low, Default::default());
        let mut decoder = FxHashMap::with_capacity_and_hasher(low, Default::default());

        for (bytes, rank) in entries {
            if decoder.insert(rank, bytes.clone()).is_some() {
                return Err(VocabError::DuplicateRank(rank));
            }
            if encoder.insert(bytes.clone(), rank).is_some() {
                return Err(VocabError::DuplicateBytes(
                    String::from_utf8_lossy(&bytes).into_owned(),
                ));
            }
        }

        Ok(Self { encoder, decoder })
    }

    /// Rank of the given token bytes, if they are in the vocabulary.
    #[inline]
    pub fn rank_of(&self, bytes: &[u8]) -> Option<Rank> {
        self.encoder.get(bytes).copied()
    }

    /// Token bytes for the given rank, if it is in the vocabulary.
    #[inline]
    pub fn bytes_of(&self, rank: Rank) -> Option<&[u8]> {
        self.decoder.get(&rank).map(Vec::as_slice)
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }
}

/// Load a tiktoken BPE vocabulary from raw bytes.
///
/// Format: `base64_token rank\n` per line.
/// Example: `SGVsbG8= 0` (where "SGVsbG8=" decodes to "Hello").
///
/// A single trailing newline is tolerated; an empty line anywhere else is
/// an error, as are duplicate tokens and duplicate ranks.
pub fn load_tiktoken_bpe(data: &[u8]) -> Result<Vocabulary, VocabError> {
    let mut entries = Vec::new();

    let mut lines = data.split(|&b| b == b'\n').enumerate().peekable();
    while let Some((idx, line)) = lines.next() {
        if line.is_empty() {
            if lines.peek().is_none() {
                break;
            }
            return Err(VocabError::MalformedLine { line: idx + 1 });
        }

        let sep = line
            .iter()
            .position(|&b| b == b' ')
            .ok_or(VocabError::MalformedLine { line: idx + 1 })?;

        let token = STANDARD
            .decode(&line[..sep])
            .map_err(|source| VocabError::Base64 { line: idx + 1, source })?;

        let rank: Rank = std::str::from_utf8(&line[sep + 1..])
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or(VocabError::InvalidRank { line: idx + 1 })?;

        entries.push((token, rank));
    }

    let vocab = Vocabulary::new(entries)?;
    debug!(entries = vocab.len(), "loaded tiktoken vocabulary");
    Ok(vocab)
}

/// Load a tiktoken BPE vocabulary from a file path.
pub fn load_tiktoken_bpe_file(path: impl AsRef<Path>) -> Result<Vocabulary, VocabError> {
    let data = std::fs::read(path)?;
    load_tiktoken_bpe(&data)
}
