//! Core tokenization engine.
//!
//! The engine is organized leaves-first:
//!
//! - [`Vocabulary`]: immutable two-way bytes↔rank table, loaded from the
//!   tiktoken ranks-file format
//! - [`SpecialTokenTable`]: reserved literals with dedicated ids, plus the
//!   [`AllowedSpecial`] capability for per-call allow lists
//! - `segment`: coarse-regex piece extraction and special-token scanning
//! - `bpe`: the lowest-rank adjacent merge loop over one piece
//! - [`Tokenizer`]: encoder driver and decoder, with rayon batch APIs
//! - [`TokenizerFactory`]: TOML-configured registry of named encodings
//!
//! Everything is read-only after construction; a single [`Tokenizer`] can
//! serve concurrent encode/decode calls without coordination.

mod bpe;
mod config;
mod segment;
mod special;
mod tokenizer;
mod vocab;

pub use bpe::byte_pair_encode;
pub use config::{EncodingConfig, TokenizerFactory};
pub use special::{AllowedSpecial, SpecialTokenTable};
pub use tokenizer::{
    EncodeOutput, Tokenizer, TokenizerError, CL100K_BASE_PATTERN, O200K_BASE_PATTERN,
};
pub use vocab::{load_tiktoken_bpe, load_tiktoken_bpe_file, Rank, VocabError, Vocabulary};
