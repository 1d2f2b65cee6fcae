//! Coarse regex segmentation and special-token scanning.

use std::ops::Range;

use fancy_regex::{Matches, Regex};

use super::special::{AllowedSpecial, SpecialTokenTable};
use super::tokenizer::TokenizerError;

/// Owns the two compiled patterns that drive encoding: the coarse
/// pretokenizer regex and, when special tokens are configured, the
/// alternation of their escaped literals.
#[derive(Debug)]
pub(crate) struct Segmenter {
    pattern: Regex,
    special: Option<Regex>,
}

impl Segmenter {
    pub(crate) fn new(
        pattern: &str,
        specials: &SpecialTokenTable,
    ) -> Result<Self, TokenizerError> {
        if pattern.is_empty() {
            return Err(TokenizerError::EmptyPattern);
        }
        let pattern = Regex::new(pattern)?;
        let special = match specials.alternation_pattern() {
            Some(p) => Some(Regex::new(&p)?),
            None => None,
        };
        Ok(Self { pattern, special })
    }

    /// Find-and-consume iteration of the coarse regex over `text`.
    ///
    /// Spans between matches are discarded; GPT-family patterns match
    /// everything meaningful, so nothing is lost in practice.
    pub(crate) fn pieces<'r, 't>(&'r self, text: &'t str) -> Matches<'r, 't> {
        self.pattern.find_iter(text)
    }

    /// Scan forward from `cursor` for the next *allowed* special token.
    ///
    /// Disallowed matches are skipped so their text passes through BPE as
    /// ordinary bytes. Returns the matched literal (if any) and the range
    /// of text between `cursor` and the match (or the rest of the input).
    pub(crate) fn next_special<'t, A>(
        &self,
        text: &'t str,
        cursor: usize,
        allowed: &A,
    ) -> Result<(Option<&'t str>, Range<usize>), TokenizerError>
    where
        A: AllowedSpecial + ?Sized,
    {
        let Some(special) = &self.special else {
            return Ok((None, cursor..text.len()));
        };

        let mut pos = cursor;
        while let Some(m) = special.find_from_pos(text, pos)? {
            if allowed.contains(m.as_str()) {
                return Ok((Some(m.as_str()), cursor..m.start()));
            }
            pos = m.end();
        }
        Ok((None, cursor..text.len()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn segmenter() -> Segmenter {
        let specials = SpecialTokenTable::new([
            ("<|endoftext|>".to_string(), 100257),
            ("<|endofprompt|>".to_string(), 100276),
        ])
        .unwrap();
        Segmenter::new(r"\S+|\s+", &specials).unwrap()
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let err = Segmenter::new("", &SpecialTokenTable::empty()).unwrap_err();
        assert!(matches!(err, TokenizerError::EmptyPattern));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let err = Segmenter::new(r"(unclosed", &SpecialTokenTable::empty()).unwrap_err();
        assert!(matches!(err, TokenizerError::Regex(_)));
    }

    #[test]
    fn test_pieces_consume_left_to_right() {
        let seg = segmenter();
        let pieces: Vec<_> = seg
            .pieces("hello  world")
            .map(|m| m.unwrap().as_str())
            .collect();
        assert_eq!(pieces, vec!["hello", "  ", "world"]);
    }

    #[test]
    fn test_next_special_allowed() {
        let seg = segmenter();
        let allowed: HashSet<&str> = ["<|endoftext|>"].into_iter().collect();
        let text = "hi<|endoftext|>bye";
        let (special, prefix) = seg.next_special(text, 0, &allowed).unwrap();
        assert_eq!(special, Some("<|endoftext|>"));
        assert_eq!(&text[prefix], "hi");
    }

    #[test]
    fn test_next_special_skips_disallowed() {
        let seg = segmenter();
        let allowed: HashSet<&str> = ["<|endofprompt|>"].into_iter().collect();
        let text = "a<|endoftext|>b<|endofprompt|>c";
        let (special, prefix) = seg.next_special(text, 0, &allowed).unwrap();
        assert_eq!(special, Some("<|endofprompt|>"));
        // The disallowed literal stays inside the prefix.
        assert_eq!(&text[prefix], "a<|endoftext|>b");
    }

    #[test]
    fn test_next_special_none_found() {
        let seg = segmenter();
        let allowed: HashSet<&str> = HashSet::new();
        let text = "a<|endoftext|>b";
        let (special, prefix) = seg.next_special(text, 0, &allowed).unwrap();
        assert_eq!(special, None);
        assert_eq!(&text[prefix], text);
    }

    #[test]
    fn test_next_special_from_cursor() {
        let seg = segmenter();
        let allowed: HashSet<&str> = ["<|endoftext|>"].into_iter().collect();
        let text = "<|endoftext|>mid<|endoftext|>";
        let (special, prefix) = seg.next_special(text, 13, &allowed).unwrap();
        assert_eq!(special, Some("<|endoftext|>"));
        assert_eq!(&text[prefix], "mid");
    }
}
