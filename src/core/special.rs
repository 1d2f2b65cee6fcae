//! Special-token table and the allowed-set capability.
//!
//! Special tokens are reserved literal strings (e.g. `<|endoftext|>`) that
//! map directly to a dedicated id and bypass BPE. They share the rank id
//! space with ordinary tokens but live in their own table.

use std::collections::HashSet;
use std::hash::BuildHasher;

use aho_corasick::AhoCorasick;
use rustc_hash::FxHashMap;

use super::tokenizer::TokenizerError;
use super::vocab::{Rank, VocabError};

/// An immutable two-way table for reserved special-token literals.
///
/// Alongside the literal↔rank maps it carries an Aho-Corasick automaton
/// for bulk scans ([`find_in`](Self::find_in)) and produces the escaped
/// alternation pattern the segmenter compiles for cursor-driven matching.
#[derive(Debug)]
pub struct SpecialTokenTable {
    encoder: FxHashMap<String, Rank>,
    decoder: FxHashMap<Rank, String>,
    literals: Vec<String>,
    finder: Option<AhoCorasick>,
}

impl SpecialTokenTable {
    /// Build a table from `(literal, rank)` pairs.
    ///
    /// Duplicate literals or ranks fail the same way vocabulary
    /// construction does.
    pub fn new<I>(entries: I) -> Result<Self, TokenizerError>
    where
        I: IntoIterator<Item = (String, Rank)>,
    {
        let mut encoder = FxHashMap::default();
        let mut decoder = FxHashMap::default();
        let mut literals = Vec::new();

        for (literal, rank) in entries {
            if decoder.insert(rank, literal.clone()).is_some() {
                return Err(VocabError::DuplicateRank(rank).into());
            }
            if encoder.insert(literal.clone(), rank).is_some() {
                return Err(VocabError::DuplicateBytes(literal).into());
            }
            literals.push(literal);
        }

        let finder = if literals.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&literals)?)
        };

        Ok(Self {
            encoder,
            decoder,
            literals,
            finder,
        })
    }

    /// A table with no special tokens; all special handling short-circuits.
    pub fn empty() -> Self {
        Self {
            encoder: FxHashMap::default(),
            decoder: FxHashMap::default(),
            literals: Vec::new(),
            finder: None,
        }
    }

    /// Rank of the given literal, if it is configured.
    #[inline]
    pub fn rank_of(&self, literal: &str) -> Option<Rank> {
        self.encoder.get(literal).copied()
    }

    /// Literal for the given rank, if it is configured.
    #[inline]
    pub fn literal_of(&self, rank: Rank) -> Option<&str> {
        self.decoder.get(&rank).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// Configured `(literal, rank)` pairs, in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Rank)> {
        self.encoder.iter().map(|(literal, &rank)| (literal.as_str(), rank))
    }

    /// Alternation regex source over the escaped literals, or `None` when
    /// the table is empty.
    pub(crate) fn alternation_pattern(&self) -> Option<String> {
        if self.literals.is_empty() {
            return None;
        }
        Some(
            self.literals
                .iter()
                .map(|literal| fancy_regex::escape(literal))
                .collect::<Vec<_>>()
                .join("|"),
        )
    }

    /// Every occurrence of any configured literal in `text`, left to right.
    pub fn find_in<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.finder.iter().flat_map(move |finder| {
            finder
                .find_iter(text)
                .map(move |m| &text[m.start()..m.end()])
        })
    }
}

/// Capability of the encoder's allowed-specials input: anything that can
/// answer "is this literal permitted in the current call".
///
/// Disallowed literals are not recognized; their text passes through BPE
/// as ordinary bytes.
pub trait AllowedSpecial {
    fn contains(&self, literal: &str) -> bool;
}

impl<S: BuildHasher> AllowedSpecial for HashSet<&str, S> {
    fn contains(&self, literal: &str) -> bool {
        HashSet::contains(self, literal)
    }
}

impl<S: BuildHasher> AllowedSpecial for HashSet<String, S> {
    fn contains(&self, literal: &str) -> bool {
        HashSet::contains(self, literal)
    }
}

impl AllowedSpecial for [&str] {
    fn contains(&self, literal: &str) -> bool {
        self.iter().any(|s| *s == literal)
    }
}

/// The "all specials allowed" mode: every configured literal is permitted.
impl AllowedSpecial for SpecialTokenTable {
    fn contains(&self, literal: &str) -> bool {
        self.rank_of(literal).is_some()
    }
}

impl<T: AllowedSpecial + ?Sized> AllowedSpecial for &T {
    fn contains(&self, literal: &str) -> bool {
        (**self).contains(literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SpecialTokenTable {
        SpecialTokenTable::new([
            ("<|endoftext|>".to_string(), 100257),
            ("<|fim_prefix|>".to_string(), 100258),
        ])
        .unwrap()
    }

    #[test]
    fn test_two_way_lookup() {
        let table = table();
        assert_eq!(table.rank_of("<|endoftext|>"), Some(100257));
        assert_eq!(table.literal_of(100258), Some("<|fim_prefix|>"));
        assert_eq!(table.rank_of("<|none|>"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_duplicate_literal() {
        let err = SpecialTokenTable::new([
            ("<|endoftext|>".to_string(), 1),
            ("<|endoftext|>".to_string(), 2),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            TokenizerError::Vocab(VocabError::DuplicateBytes(_))
        ));
    }

    #[test]
    fn test_duplicate_rank() {
        let err = SpecialTokenTable::new([
            ("<|a|>".to_string(), 1),
            ("<|b|>".to_string(), 1),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            TokenizerError::Vocab(VocabError::DuplicateRank(1))
        ));
    }

    #[test]
    fn test_alternation_pattern_escapes_literals() {
        let table = table();
        let pattern = table.alternation_pattern().unwrap();
        // The `|` inside each literal must be escaped, the joining `|` not.
        let re = fancy_regex::Regex::new(&pattern).unwrap();
        assert!(re.find("x<|endoftext|>y").unwrap().is_some());
        assert!(re.find("<|endoftext>").unwrap().is_none());
    }

    #[test]
    fn test_empty_table_short_circuits() {
        let table = SpecialTokenTable::empty();
        assert!(table.alternation_pattern().is_none());
        assert_eq!(table.find_in("<|endoftext|>").count(), 0);
    }

    #[test]
    fn test_find_in() {
        let table = table();
        let found: Vec<_> = table
            .find_in("a<|endoftext|>b<|fim_prefix|>c<|endoftext|>")
            .collect();
        assert_eq!(
            found,
            vec!["<|endoftext|>", "<|fim_prefix|>", "<|endoftext|>"]
        );
    }

    #[test]
    fn test_allowed_special_impls() {
        let table = table();
        let set: HashSet<&str> = ["<|endoftext|>"].into_iter().collect();
        assert!(AllowedSpecial::contains(&set, "<|endoftext|>"));
        assert!(!AllowedSpecial::contains(&set, "<|fim_prefix|>"));
        assert!(AllowedSpecial::contains(&table, "<|fim_prefix|>"));
        let slice: &[&str] = &["<|endoftext|>"];
        assert!(AllowedSpecial::contains(slice, "<|endoftext|>"));
    }
}
