const DNA_BITMASK_A: u8 = 1;
const DNA_BITMASK_C: u8 = 2;
const DNA_BITMASK_G: u8 = 4;
const DNA_BITMASK_T: u8 = 8;
const DNA_BITMASK_N: u8 = DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_G | DNA_BITMASK_T;

/// A bitmasked IUPAC code for DNA bases, eg DNA_BITMASK_A|DNA_BITMASK_G for R
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IupacCode(u8);

impl IupacCode {
    /// Unknown letters, including RNA `U`, map to the empty code.
    #[inline(always)]
    pub fn from_letter(letter: u8) -> Self {
        match letter.to_ascii_uppercase() {
            b'A' => Self(DNA_BITMASK_A),
            b'C' => Self(DNA_BITMASK_C),
            b'G' => Self(DNA_BITMASK_G),
            b'T' => Self(DNA_BITMASK_T),
            b'W' => Self(DNA_BITMASK_A | DNA_BITMASK_T),
            b'S' => Self(DNA_BITMASK_C | DNA_BITMASK_G),
            b'M' => Self(DNA_BITMASK_A | DNA_BITMASK_C),
            b'K' => Self(DNA_BITMASK_G | DNA_BITMASK_T),
            b'R' => Self(DNA_BITMASK_A | DNA_BITMASK_G),
            b'Y' => Self(DNA_BITMASK_C | DNA_BITMASK_T),
            b'B' => Self(DNA_BITMASK_C | DNA_BITMASK_G | DNA_BITMASK_T),
            b'D' => Self(DNA_BITMASK_A | DNA_BITMASK_G | DNA_BITMASK_T),
            b'H' => Self(DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_T),
            b'V' => Self(DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_G),
            b'N' => Self(DNA_BITMASK_N),
            _ => Self(0),
        }
    }

    pub fn letter(self) -> Option<u8> {
        let letter = match self.0 {
            DNA_BITMASK_A => b'A',
            DNA_BITMASK_C => b'C',
            DNA_BITMASK_G => b'G',
            DNA_BITMASK_T => b'T',
            0b1001 => b'W',
            0b0110 => b'S',
            0b0011 => b'M',
            0b1100 => b'K',
            0b0101 => b'R',
            0b1010 => b'Y',
            0b1110 => b'B',
            0b1101 => b'D',
            0b1011 => b'H',
            0b0111 => b'V',
            DNA_BITMASK_N => b'N',
            _ => return None,
        };
        Some(letter)
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Swaps the A/T and C/G bits, so ambiguity codes complement as sets.
    #[inline(always)]
    pub fn complement(self) -> Self {
        let a = (self.0 & DNA_BITMASK_A) << 3;
        let t = (self.0 & DNA_BITMASK_T) >> 3;
        let c = (self.0 & DNA_BITMASK_C) << 1;
        let g = (self.0 & DNA_BITMASK_G) >> 1;
        Self(a | t | c | g)
    }

    #[inline(always)]
    pub fn is_valid_letter(letter: u8) -> bool {
        !Self::from_letter(letter).is_empty()
    }

    /// Complement of a single letter; anything that is not a nucleotide becomes `N`.
    #[inline(always)]
    pub fn letter_complement(letter: u8) -> u8 {
        Self::from_letter(letter)
            .complement()
            .letter()
            .unwrap_or(b'N')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_roundtrip() {
        for letter in b"ACGTWSMKRYBDHVN" {
            assert_eq!(IupacCode::from_letter(*letter).letter(), Some(*letter));
        }
        assert_eq!(IupacCode::from_letter(b'X').letter(), None);
        assert!(IupacCode::from_letter(b'U').is_empty());
    }

    #[test]
    fn test_complement() {
        assert_eq!(IupacCode::letter_complement(b'A'), b'T');
        assert_eq!(IupacCode::letter_complement(b'C'), b'G');
        assert_eq!(IupacCode::letter_complement(b'G'), b'C');
        assert_eq!(IupacCode::letter_complement(b'T'), b'A');
        assert_eq!(IupacCode::letter_complement(b'a'), b'T');
        assert_eq!(IupacCode::letter_complement(b'R'), b'Y');
        assert_eq!(IupacCode::letter_complement(b'K'), b'M');
        assert_eq!(IupacCode::letter_complement(b'B'), b'V');
        assert_eq!(IupacCode::letter_complement(b'D'), b'H');
        assert_eq!(IupacCode::letter_complement(b'S'), b'S');
        assert_eq!(IupacCode::letter_complement(b'W'), b'W');
        assert_eq!(IupacCode::letter_complement(b'N'), b'N');
        assert_eq!(IupacCode::letter_complement(b'X'), b'N');
    }

    #[test]
    fn test_validity() {
        assert!(IupacCode::is_valid_letter(b'g'));
        assert!(IupacCode::is_valid_letter(b'N'));
        assert!(!IupacCode::is_valid_letter(b'U'));
        assert!(!IupacCode::is_valid_letter(b'-'));
    }
}
