//! TOML-backed encoding registry.
//!
//! A configuration document names one or more encodings, each pointing at
//! a tiktoken ranks file and carrying its split pattern and special
//! tokens:
//!
//! ```toml
//! [encodings.cl100k_base]
//! ranks = "cl100k_base.tiktoken"
//! pattern = '''(?i:'s|'t|'re|'ve|'m|'ll|'d)|...'''
//!
//! [encodings.cl100k_base.special_tokens]
//! "<|endoftext|>" = 100257
//! "<|endofprompt|>" = 100276
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::{debug, info};

use super::special::SpecialTokenTable;
use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::{load_tiktoken_bpe_file, Rank};

/// One named encoding's configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EncodingConfig {
    /// Path to the tiktoken ranks file.
    pub ranks: PathBuf,
    /// Coarse split pattern source.
    pub pattern: String,
    /// Special token literals and their ids.
    #[serde(default)]
    pub special_tokens: FxHashMap<String, Rank>,
}

/// Registry of named encodings, loaded from a TOML document.
///
/// Loading the document only records configurations; the (expensive)
/// vocabulary load and regex compilation happen per [`create`](Self::create).
#[derive(Debug)]
pub struct TokenizerFactory {
    encodings: FxHashMap<String, EncodingConfig>,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    encodings: FxHashMap<String, EncodingConfig>,
}

impl TokenizerFactory {
    /// Parse a configuration document from TOML source.
    pub fn from_toml_str(doc: &str) -> Result<Self, TokenizerError> {
        let doc: ConfigDocument = toml::from_str(doc)?;
        info!(encodings = doc.encodings.len(), "loaded encoding registry");
        Ok(Self {
            encodings: doc.encodings,
        })
    }

    /// Read and parse a configuration file.
    ///
    /// Relative `ranks` paths are resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        let path = path.as_ref();
        let doc = std::fs::read_to_string(path)?;
        let mut factory = Self::from_toml_str(&doc)?;

        if let Some(dir) = path.parent() {
            for conf in factory.encodings.values_mut() {
                if conf.ranks.is_relative() {
                    conf.ranks = dir.join(&conf.ranks);
                }
            }
        }

        Ok(factory)
    }

    /// Build the tokenizer for a named encoding.
    pub fn create(&self, name: &str) -> Result<Tokenizer, TokenizerError> {
        let conf = self
            .encodings
            .get(name)
            .ok_or_else(|| TokenizerError::UnknownEncoding(name.to_string()))?;

        debug!(encoding = name, ranks = %conf.ranks.display(), "loading encoding");
        let vocab = load_tiktoken_bpe_file(&conf.ranks)?;
        let specials = SpecialTokenTable::new(
            conf.special_tokens
                .iter()
                .map(|(literal, &rank)| (literal.clone(), rank)),
        )?;

        Tokenizer::new(vocab, specials, &conf.pattern)
    }

    /// Names of the configured encodings, in unspecified order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.encodings.keys().map(String::as_str)
    }

    /// The raw configuration for a named encoding, if present.
    pub fn get(&self, name: &str) -> Option<&EncodingConfig> {
        self.encodings.get(name)
    }
}
