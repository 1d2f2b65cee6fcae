//! The tokenizer: encoder driver, decoder, and the crate error type.

use std::path::Path;

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use super::bpe::byte_pair_encode;
use super::segment::Segmenter;
use super::special::{AllowedSpecial, SpecialTokenTable};
use super::vocab::{load_tiktoken_bpe, load_tiktoken_bpe_file, Rank, VocabError, Vocabulary};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("no split pattern is specified")]
    EmptyPattern,
    #[error("regex error: {0}")]
    Regex(#[from] fancy_regex::Error),
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("failed to build special token matcher: {0}")]
    AhoCorasick(#[from] aho_corasick::BuildError),
    #[error("special token id {0} is already used by the vocabulary")]
    SpecialRankCollision(Rank),
    #[error("bytes {0:?} cannot be encoded with this vocabulary")]
    UnencodablePiece(Vec<u8>),
    #[error("unknown token: {0}")]
    UnknownToken(Rank),
    #[error("decoding error: invalid UTF-8")]
    InvalidUtf8,
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Split pattern for cl100k_base vocabularies (GPT-4, GPT-3.5-turbo).
pub const CL100K_BASE_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Split pattern for o200k_base vocabularies (GPT-4o).
pub const O200K_BASE_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Result of a detailed encode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    pub tokens: Vec<Rank>,
    /// How many tokens came from the last coarse split. Merges never cross
    /// split boundaries, so callers repairing a truncated tail only need to
    /// re-examine this many tokens. Informational; zero right after a
    /// special token.
    pub last_piece_token_len: usize,
}

/// A byte-level BPE tokenizer in the tiktoken family.
///
/// Read-only after construction: encoding and decoding are pure functions
/// of the input and this state, hold no locks, and mutate nothing, so one
/// instance can serve any number of threads concurrently.
#[derive(Debug)]
pub struct Tokenizer {
    vocab: Vocabulary,
    specials: SpecialTokenTable,
    segmenter: Segmenter,
}

impl Tokenizer {
    /// Create a tokenizer from an already-built vocabulary, special-token
    /// table, and split pattern.
    ///
    /// Fails if the pattern is empty or does not compile, or if a special
    /// token id collides with an ordinary vocabulary rank.
    pub fn new(
        vocab: Vocabulary,
        specials: SpecialTokenTable,
        pattern: &str,
    ) -> Result<Self, TokenizerError> {
        for (_, rank) in specials.iter() {
            if vocab.bytes_of(rank).is_some() {
                return Err(TokenizerError::SpecialRankCollision(rank));
            }
        }

        let segmenter = Segmenter::new(pattern, &specials)?;
        debug!(
            vocab = vocab.len(),
            specials = specials.len(),
            "constructed tokenizer"
        );

        Ok(Self {
            vocab,
            specials,
            segmenter,
        })
    }

    /// Create a tokenizer from raw tiktoken vocabulary bytes.
    pub fn from_bytes(
        vocab_data: &[u8],
        pattern: &str,
        special_tokens: FxHashMap<String, Rank>,
    ) -> Result<Self, TokenizerError> {
        let vocab = load_tiktoken_bpe(vocab_data)?;
        let specials = SpecialTokenTable::new(special_tokens)?;
        Self::new(vocab, specials, pattern)
    }

    /// Create a tokenizer from a tiktoken vocabulary file.
    pub fn from_file(
        vocab_path: impl AsRef<Path>,
        pattern: &str,
        special_tokens: FxHashMap<String, Rank>,
    ) -> Result<Self, TokenizerError> {
        let vocab = load_tiktoken_bpe_file(vocab_path)?;
        let specials = SpecialTokenTable::new(special_tokens)?;
        Self::new(vocab, specials, pattern)
    }

    /// Encode the coarse pieces of `text`, appending ids to `tokens`.
    ///
    /// `last_piece_token_len` is only written when a piece is produced, so
    /// the caller's running value survives an empty prefix.
    fn encode_pieces(
        &self,
        text: &str,
        tokens: &mut Vec<Rank>,
        last_piece_token_len: &mut usize,
    ) -> Result<(), TokenizerError> {
        for piece in self.segmenter.pieces(text) {
            let piece = piece?.as_str().as_bytes();

            // Fast path: the whole piece is a known token.
            if let Some(rank) = self.vocab.rank_of(piece) {
                *last_piece_token_len = 1;
                tokens.push(rank);
                continue;
            }

            let merged = byte_pair_encode(piece, &self.vocab)?;
            *last_piece_token_len = merged.len();
            tokens.extend(merged);
        }
        Ok(())
    }

    fn encode_inner<A>(&self, text: &str, allowed: &A) -> Result<EncodeOutput, TokenizerError>
    where
        A: AllowedSpecial + ?Sized,
    {
        let mut tokens = Vec::new();
        let mut last_piece_token_len = 0;
        let mut cursor = 0;

        loop {
            let (special, prefix) = self.segmenter.next_special(text, cursor, allowed)?;
            let prefix_end = prefix.end;
            self.encode_pieces(&text[prefix], &mut tokens, &mut last_piece_token_len)?;

            match special {
                Some(literal) => {
                    // The alternation regex is built from the table, so the
                    // lookup cannot miss.
                    if let Some(rank) = self.specials.rank_of(literal) {
                        tokens.push(rank);
                    }
                    last_piece_token_len = 0;
                    cursor = prefix_end + literal.len();
                }
                None => break,
            }
        }

        Ok(EncodeOutput {
            tokens,
            last_piece_token_len,
        })
    }

    /// Encode without recognizing any special tokens: their literal text,
    /// if present, is broken into ordinary subword tokens.
    pub fn encode_ordinary(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        let mut tokens = Vec::new();
        let mut last_piece_token_len = 0;
        self.encode_pieces(text, &mut tokens, &mut last_piece_token_len)?;
        Ok(tokens)
    }

    /// Encode with every configured special token recognized.
    pub fn encode(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        Ok(self.encode_inner(text, &self.specials)?.tokens)
    }

    /// Encode recognizing only the special tokens in `allowed`; the rest
    /// pass through BPE as ordinary bytes.
    pub fn encode_with_special<A>(&self, text: &str, allowed: &A) -> Result<Vec<Rank>, TokenizerError>
    where
        A: AllowedSpecial + ?Sized,
    {
        Ok(self.encode_inner(text, allowed)?.tokens)
    }

    /// Like [`encode_with_special`](Self::encode_with_special), but also
    /// reports the last coarse split's token count.
    pub fn encode_detailed<A>(&self, text: &str, allowed: &A) -> Result<EncodeOutput, TokenizerError>
    where
        A: AllowedSpecial + ?Sized,
    {
        self.encode_inner(text, allowed)
    }

    /// Decode token ids back to the bytes they were encoded from.
    ///
    /// Ordinary ids are looked up first, then special ids. An id absent
    /// from both tables fails with [`TokenizerError::UnknownToken`].
    pub fn decode_bytes(&self, tokens: &[Rank]) -> Result<Vec<u8>, TokenizerError> {
        let mut out = Vec::with_capacity(tokens.len() * 2);
        for &token in tokens {
            if let Some(bytes) = self.vocab.bytes_of(token) {
                out.extend_from_slice(bytes);
            } else if let Some(literal) = self.specials.literal_of(token) {
                out.extend_from_slice(literal.as_bytes());
            } else {
                return Err(TokenizerError::UnknownToken(token));
            }
        }
        Ok(out)
    }

    /// Decode token ids to a string; fails on invalid UTF-8.
    pub fn decode(&self, tokens: &[Rank]) -> Result<String, TokenizerError> {
        String::from_utf8(self.decode_bytes(tokens)?).map_err(|_| TokenizerError::InvalidUtf8)
    }

    /// Decode token ids to a string, replacing invalid UTF-8 sequences
    /// with U+FFFD. Unknown ids still fail.
    pub fn decode_lossy(&self, tokens: &[Rank]) -> Result<String, TokenizerError> {
        Ok(String::from_utf8_lossy(&self.decode_bytes(tokens)?).into_owned())
    }

    /// Every occurrence of any configured special token in `text`.
    ///
    /// Useful for rejecting or sanitizing input before encoding it with
    /// specials allowed.
    pub fn find_special_tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.specials.find_in(text)
    }

    /// Batch-encode texts in parallel, with all specials recognized.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<Rank>>, TokenizerError> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Batch-decode token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<Rank>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Total number of token ids (ordinary plus special).
    pub fn vocab_size(&self) -> usize {
        self.vocab.len() + self.specials.len()
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn special_tokens(&self) -> &SpecialTokenTable {
        &self.specials
    }
}
