//! Byte pair merging for a single piece.
//!
//! The piece has already been split out of the input by the coarse regex;
//! this module reduces it to the fewest vocabulary tokens by repeatedly
//! merging the adjacent pair with the lowest rank.

use super::tokenizer::TokenizerError;
use super::vocab::{Rank, Vocabulary};

/// Sentinel meaning "this adjacent pair is not a merge candidate".
/// `Rank::MAX` is outside the legal id range, so min scans need no branch.
const NO_RANK: Rank = Rank::MAX;

/// Merge the bytes of `piece` into progressively longer vocabulary tokens.
///
/// The returned boundaries partition `piece`: each surviving `(start, _)`
/// pair together with its successor spans one token's bytes. The rank slot
/// of the last two entries is unused.
fn byte_pair_merge(piece: &[u8], vocab: &Vocabulary) -> Vec<(usize, Rank)> {
    // This is a vector of (start, rank).
    // The rank is of the byte pair starting at position start.
    let mut parts: Vec<(usize, Rank)> = (0..piece.len() + 1).map(|i| (i, NO_RANK)).collect();

    let get_rank = |parts: &[(usize, Rank)], start_idx: usize, skip: usize| -> Option<Rank> {
        if start_idx + skip + 2 < parts.len() {
            vocab.rank_of(&piece[parts[start_idx].0..parts[start_idx + skip + 2].0])
        } else {
            None
        }
    };

    // Look up the ranks once in the beginning and iteratively update them
    // during each merge, which reduces the number of rank lookups.
    for i in 0..parts.len() - 2 {
        if let Some(rank) = get_rank(&parts, i, 0) {
            debug_assert!(rank != NO_RANK);
            parts[i].1 = rank;
        }
    }

    // With n parts and m merges this does O(mn) work. n is typically small
    // (<100), so the flat array beats a heap on cache behavior.
    loop {
        if parts.len() == 1 {
            break;
        }

        let mut min_rank: (Rank, usize) = (NO_RANK, 0);
        for (i, &(_, rank)) in parts[..parts.len() - 1].iter().enumerate() {
            if rank < min_rank.0 {
                min_rank = (rank, i);
            }
        }

        if min_rank.0 == NO_RANK {
            break;
        }
        let i = min_rank.1;

        // parts[i + 1] is about to be removed; update the ranks at i and
        // i - 1 first, skipping over the doomed boundary with skip = 1.
        parts[i].1 = get_rank(&parts, i, 1).unwrap_or(NO_RANK);
        if i > 0 {
            parts[i - 1].1 = get_rank(&parts, i - 1, 1).unwrap_or(NO_RANK);
        }

        parts.remove(i + 1);
    }

    parts
}

/// Encode one piece into token ids using the BPE merge loop.
///
/// The ids' byte strings concatenate exactly to `piece`. Fails with
/// [`TokenizerError::UnencodablePiece`] if a surviving span (or a lone
/// byte) is not in the vocabulary; byte-complete vocabularies never
/// trigger this.
pub fn byte_pair_encode(piece: &[u8], vocab: &Vocabulary) -> Result<Vec<Rank>, TokenizerError> {
    match piece.len() {
        0 => return Ok(Vec::new()),
        1 => {
            return vocab
                .rank_of(piece)
                .map(|rank| vec![rank])
                .ok_or_else(|| TokenizerError::UnencodablePiece(piece.to_vec()))
        }
        _ => {}
    }

    let parts = byte_pair_merge(piece, vocab);
    let mut out = Vec::with_capacity(parts.len() - 1);
    for window in parts.windows(2) {
        let bytes = &piece[window[0].0..window[1].0];
        match vocab.rank_of(bytes) {
            Some(rank) => out.push(rank),
            None => return Err(TokenizerError::UnencodablePiece(bytes.to_vec())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(entries: &[(&[u8], Rank)]) -> Vocabulary {
        Vocabulary::new(entries.iter().map(|&(b, r)| (b.to_vec(), r))).unwrap()
    }

    #[test]
    fn test_single_byte_fast_path() {
        let v = vocab(&[(b"a", 0)]);
        assert_eq!(byte_pair_encode(b"a", &v).unwrap(), vec![0]);
    }

    #[test]
    fn test_single_byte_missing_is_error() {
        let v = vocab(&[(b"a", 0)]);
        let err = byte_pair_encode(b"z", &v).unwrap_err();
        assert!(matches!(err, TokenizerError::UnencodablePiece(bytes) if bytes == b"z"));
    }

    #[test]
    fn test_merges_to_full_token() {
        let v = vocab(&[(b"a", 0), (b"b", 1), (b"c", 2), (b"ab", 3), (b"bc", 4), (b"abc", 5)]);
        // "ab" (3) beats "bc" (4), then "abc" (5) completes the merge.
        assert_eq!(byte_pair_encode(b"abc", &v).unwrap(), vec![5]);
    }

    #[test]
    fn test_lowest_rank_merges_first() {
        let v = vocab(&[(b"a", 0), (b"b", 1), (b"c", 2), (b"ab", 4), (b"bc", 3)]);
        // "bc" (3) wins over "ab" (4); "a" survives alone.
        assert_eq!(byte_pair_encode(b"abc", &v).unwrap(), vec![0, 3]);
    }

    #[test]
    fn test_ties_break_leftmost() {
        let v = vocab(&[(b"a", 0), (b"aa", 2)]);
        // Three "aa" candidates share rank 2; the leftmost merges first,
        // leaving "aa" + "a" rather than "a" + "aa".
        assert_eq!(byte_pair_encode(b"aaa", &v).unwrap(), vec![2, 0]);
    }

    #[test]
    fn test_no_merge_possible_emits_bytes() {
        let v = vocab(&[(b"x", 7), (b"y", 8)]);
        assert_eq!(byte_pair_encode(b"xy", &v).unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_output_concatenates_to_piece() {
        let v = vocab(&[
            (b"h", 0),
            (b"e", 1),
            (b"l", 2),
            (b"o", 3),
            (b"he", 4),
            (b"ll", 5),
            (b"llo", 6),
        ]);
        let ids = byte_pair_encode(b"hello", &v).unwrap();
        let bytes: Vec<u8> = ids
            .iter()
            .flat_map(|&id| v.bytes_of(id).unwrap().to_vec())
            .collect();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_empty_piece() {
        let v = vocab(&[(b"a", 0)]);
        assert!(byte_pair_encode(b"", &v).unwrap().is_empty());
    }

    #[test]
    fn test_unencodable_span_is_error() {
        // "ab" merges first (rank 2); the surviving span "ab"+"q"... "q"
        // itself is absent, so emission fails.
        let v = vocab(&[(b"a", 0), (b"b", 1), (b"ab", 2)]);
        let err = byte_pair_encode(b"abq", &v).unwrap_err();
        assert!(matches!(err, TokenizerError::UnencodablePiece(_)));
    }
}
