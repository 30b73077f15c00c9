//! Nucleotide complement over the IUPAC alphabet.
//!
//! Complementing preserves letter case, so soft-masked (lowercase) regions of
//! a reference stay recognisable after reverse-complementation.

#[inline(always)]
pub fn is_valid_letter(letter: u8) -> bool {
    matches!(
        letter.to_ascii_uppercase(),
        b'A' | b'C'
            | b'G'
            | b'T'
            | b'U'
            | b'W'
            | b'S'
            | b'M'
            | b'K'
            | b'R'
            | b'Y'
            | b'B'
            | b'D'
            | b'H'
            | b'V'
            | b'N'
    )
}

/// Bytes outside the IUPAC alphabet (gaps, `*`, ...) are returned as is.
#[inline(always)]
pub fn letter_complement(letter: u8) -> u8 {
    let complement = match letter.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'U' => b'A',
        b'R' => b'Y',
        b'Y' => b'R',
        b'K' => b'M',
        b'M' => b'K',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        b'S' => b'S',
        b'W' => b'W',
        b'N' => b'N',
        _ => return letter,
    };
    if letter.is_ascii_lowercase() {
        complement.to_ascii_lowercase()
    } else {
        complement
    }
}

pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .rev()
        .map(|letter| letter_complement(*letter))
        .collect()
}

pub fn count_invalid_letters(sequence: &[u8]) -> usize {
    sequence
        .iter()
        .filter(|letter| !is_valid_letter(**letter))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement() {
        assert_eq!(letter_complement(b'A'), b'T');
        assert_eq!(letter_complement(b'C'), b'G');
        assert_eq!(letter_complement(b'G'), b'C');
        assert_eq!(letter_complement(b'T'), b'A');
        assert_eq!(letter_complement(b'U'), b'A');
        assert_eq!(letter_complement(b'R'), b'Y');
        assert_eq!(letter_complement(b'N'), b'N');
        assert_eq!(letter_complement(b'-'), b'-');
        assert_eq!(letter_complement(b'a'), b't');
        assert_eq!(letter_complement(b'k'), b'm');
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"CGTA"), b"TACG".to_vec());
        assert_eq!(reverse_complement(b"AAcg"), b"cgTT".to_vec());
        assert!(reverse_complement(b"").is_empty());
    }

    #[test]
    fn test_reverse_complement_is_an_involution() {
        let seq = b"ACGTRYKMBVDHSWNacgtrykmbvdhswn-*".to_vec();
        let twice = reverse_complement(&reverse_complement(&seq));
        assert_eq!(twice, seq);
    }

    #[test]
    fn test_invalid_letters() {
        assert!(is_valid_letter(b'n'));
        assert!(!is_valid_letter(b'X'));
        assert_eq!(count_invalid_letters(b"ACGT-*x"), 3);
    }
}
