use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::fasta::Fasta;
use crate::peptide::PeptideSource;
use crate::protein::{PeptideConstraint, Protein};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProteinIx(pub u32);

/// Protein sequences that serialized peptide references resolve against
pub struct Database {
    proteins: Vec<Protein>,
    pub decoy_tag: String,
}

impl Database {
    pub fn new(fasta: Fasta) -> Self {
        log::trace!("indexing {} protein sequences", fasta.proteins.len());
        Database {
            proteins: fasta.proteins,
            decoy_tag: fasta.decoy_tag,
        }
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    pub fn get(&self, ix: ProteinIx) -> Option<&Protein> {
        self.proteins.get(ix.0 as usize)
    }

    pub fn proteins(&self) -> impl Iterator<Item = (ProteinIx, &Protein)> + '_ {
        self.proteins
            .iter()
            .enumerate()
            .map(|(idx, protein)| (ProteinIx(idx as u32), protein))
    }

    /// Every candidate peptide of every protein, protein by protein
    pub fn peptides<'a>(
        &'a self,
        constraint: &'a PeptideConstraint,
    ) -> impl Iterator<Item = crate::peptide::Peptide> + 'a {
        self.proteins()
            .flat_map(move |(ix, protein)| protein.peptides(ix, constraint))
    }

    /// Residues of the peptide at `source`, if it lies within the protein
    pub fn residues(&self, source: &PeptideSource, len: usize) -> Option<&[u8]> {
        let protein = self.get(source.protein)?;
        let start = source.start as usize;
        protein.sequence.as_bytes().get(start..start + len)
    }

    /// Residues preceding and following the peptide at `source`, `-` at a
    /// protein terminus
    pub fn flanking(&self, source: &PeptideSource, len: usize) -> (char, char) {
        let seq = match self.get(source.protein) {
            Some(p) => p.sequence.as_bytes(),
            None => return ('-', '-'),
        };
        let start = source.start as usize;
        let before = start
            .checked_sub(1)
            .and_then(|idx| seq.get(idx))
            .map(|c| *c as char)
            .unwrap_or('-');
        let after = seq
            .get(start + len)
            .map(|c| *c as char)
            .unwrap_or('-');
        (before, after)
    }
}

impl Index<ProteinIx> for Database {
    type Output = Protein;

    fn index(&self, index: ProteinIx) -> &Self::Output {
        &self.proteins[index.0 as usize]
    }
}
