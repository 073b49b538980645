use std::fmt::Display;

use crate::database::ProteinIx;
use crate::mass::{Mass, Residue, H2O};

/// Location of a peptide within a protein
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeptideSource {
    pub protein: ProteinIx,
    /// Zero-based offset of the first residue
    pub start: u32,
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct Peptide {
    pub decoy: bool,
    pub sequence: Vec<Residue>,
    pub monoisotopic: f32,
    /// Every protein (and offset) this sequence occurs in
    pub sources: Vec<PeptideSource>,
}

impl Peptide {
    pub fn new(sequence: Vec<Residue>, decoy: bool, sources: Vec<PeptideSource>) -> Self {
        let monoisotopic = sequence.iter().map(|r| r.monoisotopic()).sum::<f32>() + H2O;
        Peptide {
            decoy,
            sequence,
            monoisotopic,
            sources,
        }
    }

    pub fn label(&self) -> i32 {
        match self.decoy {
            true => -1,
            false => 1,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Residues without modification annotations
    pub fn unmodified(&self) -> String {
        self.sequence
            .iter()
            .map(|r| r.amino_acid() as char)
            .collect()
    }

    /// Add every source of `other` that is not already listed
    pub fn merge_sources(&mut self, other: &[PeptideSource]) {
        for src in other {
            if !self.sources.contains(src) {
                self.sources.push(*src);
            }
        }
    }
}

/// Modified sequence, e.g. `PEPM[+15.9949]K`
impl Display for Peptide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for r in &self.sequence {
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn peptide(s: &str) -> Peptide {
        Peptide::new(
            s.as_bytes().iter().map(|c| Residue::Just(*c)).collect(),
            false,
            vec![PeptideSource {
                protein: ProteinIx(0),
                start: 0,
            }],
        )
    }

    #[test]
    fn masses() {
        let p = peptide("PEPTIDE");
        assert!((p.monoisotopic - 799.35999).abs() < 1e-3);
        assert_eq!(p.len(), 7);
        assert_eq!(p.label(), 1);
    }

    #[test]
    fn modified_display() {
        let mut p = peptide("PEPMK");
        p.sequence[3] = Residue::Mod(b'M', 15.9949);
        assert_eq!(p.to_string(), "PEPM[+15.9949]K");
        assert_eq!(p.unmodified(), "PEPMK");
    }

    #[test]
    fn merge_sources() {
        let mut p = peptide("PEPTIDE");
        let other = vec![
            PeptideSource {
                protein: ProteinIx(0),
                start: 0,
            },
            PeptideSource {
                protein: ProteinIx(4),
                start: 17,
            },
        ];
        p.merge_sources(&other);
        p.merge_sources(&other);
        assert_eq!(p.sources, other);
    }
}
