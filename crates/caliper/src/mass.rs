use std::fmt::Write;

use serde::Serialize;

pub const H2O: f32 = 18.010565;
pub const H2O_AVERAGE: f32 = 18.01528;
pub const PROTON: f32 = 1.0072764;

pub trait Mass {
    fn monoisotopic(&self) -> f32;
    fn average(&self) -> f32;
}

#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize)]
pub enum Residue {
    // Standard amino acid residue
    Just(u8),
    // Amino acid residue with a mass modification
    Mod(u8, f32),
}

impl Residue {
    pub fn amino_acid(&self) -> u8 {
        match self {
            Residue::Just(c) | Residue::Mod(c, _) => *c,
        }
    }

    pub fn mass_change(&self) -> Option<f32> {
        match self {
            Residue::Just(_) => None,
            Residue::Mod(_, m) => Some(*m),
        }
    }
}

impl Mass for Residue {
    fn monoisotopic(&self) -> f32 {
        match self {
            Residue::Just(c) => c.monoisotopic(),
            Residue::Mod(c, m) => c.monoisotopic() + m,
        }
    }

    fn average(&self) -> f32 {
        match self {
            Residue::Just(c) => c.average(),
            Residue::Mod(c, m) => c.average() + m,
        }
    }
}

pub const VALID_AA: [u8; 22] = [
    b'A', b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'K', b'L', b'M', b'N', b'P', b'Q', b'R', b'S',
    b'T', b'V', b'W', b'Y', b'U', b'O',
];

impl Mass for u8 {
    fn monoisotopic(&self) -> f32 {
        match self {
            b'A' => 71.03711,
            b'R' => 156.1011,
            b'N' => 114.04293,
            b'D' => 115.02694,
            b'C' => 103.00919,
            b'E' => 129.04259,
            b'Q' => 128.05858,
            b'G' => 57.02146,
            b'H' => 137.05891,
            b'I' => 113.08406,
            b'L' => 113.08406,
            b'K' => 128.09496,
            b'M' => 131.0405,
            b'F' => 147.0684,
            b'P' => 97.05276,
            b'S' => 87.03203,
            b'T' => 101.04768,
            b'W' => 186.07931,
            b'Y' => 163.06333,
            b'V' => 99.06841,
            b'U' => 150.95363,
            b'O' => 237.14773,
            _ => unreachable!("BUG: invalid amino acid {}", *self as char),
        }
    }

    fn average(&self) -> f32 {
        match self {
            b'A' => 71.0788,
            b'R' => 156.1875,
            b'N' => 114.1038,
            b'D' => 115.0886,
            b'C' => 103.1388,
            b'E' => 129.1155,
            b'Q' => 128.1307,
            b'G' => 57.0519,
            b'H' => 137.1411,
            b'I' => 113.1594,
            b'L' => 113.1594,
            b'K' => 128.1741,
            b'M' => 131.1926,
            b'F' => 147.1766,
            b'P' => 97.1167,
            b'S' => 87.0782,
            b'T' => 101.1051,
            b'W' => 186.2132,
            b'Y' => 163.1760,
            b'V' => 99.1326,
            b'U' => 150.0388,
            b'O' => 237.3018,
            _ => unreachable!("BUG: invalid amino acid {}", *self as char),
        }
    }
}

impl std::fmt::Display for Residue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Residue::Just(c) => f.write_char(*c as char),
            Residue::Mod(c, m) => {
                if m.is_sign_positive() {
                    write!(f, "{}[+{}]", *c as char, m)
                } else {
                    write!(f, "{}[{}]", *c as char, m)
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Mass, Residue, VALID_AA};

    #[test]
    fn smoke() {
        for ch in VALID_AA {
            assert!(ch.monoisotopic() > 0.0);
            // Average masses always sit just above the monoisotopic mass
            assert!(ch.average() > ch.monoisotopic());
            assert!(ch.average() - ch.monoisotopic() < 0.2);
        }
    }

    #[test]
    fn modified_residues() {
        let m = Residue::Mod(b'M', 15.9949);
        assert_eq!(m.to_string(), "M[+15.9949]");
        assert_eq!(Residue::Mod(b'Q', -17.026).to_string(), "Q[-17.026]");
        assert_eq!(m.amino_acid(), b'M');
        assert!((m.monoisotopic() - 147.0354).abs() < 1e-3);
        assert_eq!(Residue::Just(b'K').mass_change(), None);
    }
}
