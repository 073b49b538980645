use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::database::ProteinIx;
use crate::mass::{Mass, Residue, H2O_AVERAGE};
use crate::peptide::{Peptide, PeptideSource};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Protein {
    pub accession: Arc<String>,
    pub sequence: String,
    pub decoy: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cleavage {
    /// Both ends follow the trypsin rule
    #[default]
    Tryptic,
    /// At least one end follows the trypsin rule
    Partial,
    /// Any substring
    Any,
}

impl Display for Cleavage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Cleavage::Tryptic => "trypsin-full-digest",
            Cleavage::Partial => "trypsin-partial-digest",
            Cleavage::Any => "no-enzyme",
        })
    }
}

fn cleaves_after(seq: &[u8], idx: usize) -> bool {
    matches!(seq[idx], b'K' | b'R') && seq.get(idx + 1) != Some(&b'P')
}

impl Cleavage {
    /// Does `seq[start..start + len]` satisfy this cleavage rule?
    pub fn accepts(self, seq: &[u8], start: usize, len: usize) -> bool {
        let end = start + len;
        let n_term = start == 0 || cleaves_after(seq, start - 1);
        let c_term = end == seq.len() || cleaves_after(seq, end - 1);
        match self {
            Cleavage::Tryptic => n_term && c_term,
            Cleavage::Partial => n_term || c_term,
            Cleavage::Any => true,
        }
    }
}

/// Count internal K/R residues not followed by proline
pub fn missed_cleavages(seq: &[u8], start: usize, len: usize) -> usize {
    (start..start + len - 1)
        .filter(|&idx| cleaves_after(seq, idx))
        .count()
}

/// Which sub-sequences of a protein are candidate peptides
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeptideConstraint {
    pub min_len: usize,
    pub max_len: usize,
    /// Average mass window
    pub min_mass: f32,
    pub max_mass: f32,
    pub cleavage: Cleavage,
    pub missed_cleavages: bool,
}

impl Default for PeptideConstraint {
    fn default() -> Self {
        PeptideConstraint {
            min_len: 6,
            max_len: 50,
            min_mass: 200.0,
            max_mass: 7200.0,
            cleavage: Cleavage::Tryptic,
            missed_cleavages: false,
        }
    }
}

impl Protein {
    pub fn peptides<'a>(
        &'a self,
        ix: ProteinIx,
        constraint: &'a PeptideConstraint,
    ) -> ProteinPeptides<'a> {
        ProteinPeptides::new(self, ix, constraint)
    }
}

/// Enumerates candidate peptides of one protein, shortest first, and by
/// offset within a length.
pub struct ProteinPeptides<'a> {
    protein: &'a Protein,
    ix: ProteinIx,
    constraint: &'a PeptideConstraint,
    /// `prefix_mass[i]` is the summed average residue mass of `seq[..i]`
    prefix_mass: Vec<f32>,
    start: usize,
    length: usize,
}

impl<'a> ProteinPeptides<'a> {
    pub fn new(protein: &'a Protein, ix: ProteinIx, constraint: &'a PeptideConstraint) -> Self {
        let seq = protein.sequence.as_bytes();
        let mut prefix_mass = Vec::with_capacity(seq.len() + 1);
        let mut sum = 0.0f32;
        prefix_mass.push(sum);
        for aa in seq {
            sum += aa.average();
            prefix_mass.push(sum);
        }

        ProteinPeptides {
            protein,
            ix,
            constraint,
            prefix_mass,
            start: 0,
            length: constraint.min_len.max(1),
        }
    }

    fn average_mass(&self, start: usize, length: usize) -> f32 {
        self.prefix_mass[start + length] - self.prefix_mass[start] + H2O_AVERAGE
    }

    fn peptide(&self, start: usize, length: usize) -> Peptide {
        let residues = self.protein.sequence.as_bytes()[start..start + length]
            .iter()
            .map(|aa| Residue::Just(*aa))
            .collect();
        Peptide::new(
            residues,
            self.protein.decoy,
            vec![PeptideSource {
                protein: self.ix,
                start: start as u32,
            }],
        )
    }
}

impl<'a> Iterator for ProteinPeptides<'a> {
    type Item = Peptide;

    fn next(&mut self) -> Option<Self::Item> {
        let seq = self.protein.sequence.as_bytes();
        loop {
            if self.length > self.constraint.max_len || self.length > seq.len() {
                return None;
            }
            // Ran off the end of the protein: move on to the next length
            if self.start + self.length > seq.len() {
                self.length += 1;
                self.start = 0;
                continue;
            }

            let (start, length) = (self.start, self.length);
            self.start += 1;

            let mass = self.average_mass(start, length);
            if mass < self.constraint.min_mass || mass > self.constraint.max_mass {
                continue;
            }
            if !self.constraint.cleavage.accepts(seq, start, length) {
                continue;
            }
            if !self.constraint.missed_cleavages && missed_cleavages(seq, start, length) > 0 {
                continue;
            }
            return Some(self.peptide(start, length));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn protein(seq: &str) -> Protein {
        Protein {
            accession: Arc::new("sp|TEST".into()),
            sequence: seq.into(),
            decoy: false,
        }
    }

    fn any_constraint() -> PeptideConstraint {
        PeptideConstraint {
            min_len: 1,
            max_len: 100,
            min_mass: 0.0,
            max_mass: 100_000.0,
            cleavage: Cleavage::Any,
            missed_cleavages: true,
        }
    }

    #[test]
    fn every_substring_without_constraints() {
        let p = protein("ACDEF");
        let constraint = any_constraint();
        let peptides = p
            .peptides(ProteinIx(0), &constraint)
            .map(|p| p.to_string())
            .collect::<Vec<_>>();
        // n * (n + 1) / 2 substrings, shortest first
        assert_eq!(peptides.len(), 15);
        assert_eq!(&peptides[..5], &["A", "C", "D", "E", "F"]);
        assert_eq!(peptides.last().map(String::as_str), Some("ACDEF"));
    }

    #[test]
    fn tryptic_peptides() {
        let p = protein("MAGKPLLRGEEKSTTR");
        let constraint = PeptideConstraint {
            min_len: 2,
            missed_cleavages: false,
            cleavage: Cleavage::Tryptic,
            ..any_constraint()
        };
        let mut peptides = p
            .peptides(ProteinIx(3), &constraint)
            .map(|p| p.to_string())
            .collect::<Vec<_>>();
        peptides.sort();
        // K-P is not a cleavage site
        assert_eq!(peptides, vec!["GEEK", "MAGKPLLR", "STTR"]);
    }

    #[test]
    fn missed_cleavage_peptides() {
        let p = protein("MAGKPLLRGEEKSTTR");
        let constraint = PeptideConstraint {
            min_len: 2,
            missed_cleavages: true,
            cleavage: Cleavage::Tryptic,
            ..any_constraint()
        };
        let peptides = p
            .peptides(ProteinIx(3), &constraint)
            .map(|p| p.to_string())
            .collect::<Vec<_>>();
        assert!(peptides.contains(&"GEEKSTTR".to_string()));
        assert!(peptides.contains(&"MAGKPLLRGEEKSTTR".to_string()));
    }

    #[test]
    fn partial_cleavage() {
        let seq = b"MAGKPLLRGEEK";
        assert!(Cleavage::Partial.accepts(seq, 0, 3));
        assert!(!Cleavage::Tryptic.accepts(seq, 0, 3));
        assert!(!Cleavage::Partial.accepts(seq, 1, 2));
        assert_eq!(missed_cleavages(seq, 0, 12), 1);
    }

    #[test]
    fn mass_window() {
        let p = protein("GGGGGGGGGG");
        let constraint = PeptideConstraint {
            min_mass: 180.0,
            max_mass: 300.0,
            ..any_constraint()
        };
        // G = 57.05 average, plus water: only G3 and G4 fit
        let lengths = p
            .peptides(ProteinIx(0), &constraint)
            .map(|p| p.len())
            .collect::<fnv::FnvHashSet<_>>();
        assert_eq!(lengths, [3, 4].into_iter().collect());
    }

    #[test]
    fn sources() {
        let p = protein("PEPTIDEK");
        let constraint = any_constraint();
        let peptide = p
            .peptides(ProteinIx(9), &constraint)
            .find(|p| p.to_string() == "TIDE")
            .unwrap();
        assert_eq!(
            peptide.sources,
            vec![PeptideSource {
                protein: ProteinIx(9),
                start: 3
            }]
        );
        assert!(!peptide.decoy);
    }
}
