//! Tiktoken-compatible byte-level BPE tokenization.
//!
//! Encoding runs text through a coarse pretokenizer regex, feeds each piece
//! to a lowest-rank-first byte pair merge loop, and interleaves recognition
//! of reserved special tokens; decoding concatenates token byte strings
//! back together. Vocabularies use the tiktoken ranks-file format, and a
//! TOML registry maps encoding names to their ranks file, split pattern,
//! and special tokens.
//!
//! ```no_run
//! use bpetok::TokenizerFactory;
//!
//! # fn main() -> Result<(), bpetok::TokenizerError> {
//! let factory = TokenizerFactory::from_file("encodings.toml")?;
//! let tokenizer = factory.create("cl100k_base")?;
//! let tokens = tokenizer.encode("hello world")?;
//! assert_eq!(tokenizer.decode(&tokens)?, "hello world");
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use core::{
    byte_pair_encode, load_tiktoken_bpe, load_tiktoken_bpe_file, AllowedSpecial, EncodeOutput,
    EncodingConfig, Rank, SpecialTokenTable, Tokenizer, TokenizerError, TokenizerFactory,
    VocabError, Vocabulary, CL100K_BASE_PATTERN, O200K_BASE_PATTERN,
};
