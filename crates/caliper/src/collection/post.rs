use fnv::FnvHashMap;

use crate::database::ProteinIx;
use crate::psm::Match;

/// Per-protein and per-peptide counts over every match read back from
/// `.csm` files
#[derive(Clone, Debug, Default)]
pub struct PostProcess {
    protein_psm_counts: Vec<u32>,
    protein_peptide_counts: Vec<u32>,
    peptide_counts: FnvHashMap<String, u32>,
}

impl PostProcess {
    pub fn new(num_proteins: usize) -> Self {
        PostProcess {
            protein_psm_counts: vec![0; num_proteins],
            protein_peptide_counts: vec![0; num_proteins],
            peptide_counts: FnvHashMap::default(),
        }
    }

    pub fn record(&mut self, m: &Match) {
        let count = self
            .peptide_counts
            .entry(m.peptide.to_string())
            .or_insert(0);
        *count += 1;
        let unique = *count == 1;

        for src in &m.peptide.sources {
            let ix = src.protein.0 as usize;
            if ix >= self.protein_psm_counts.len() {
                log::warn!("PSM references unknown protein index {}", ix);
                continue;
            }
            self.protein_psm_counts[ix] += 1;
            if unique {
                self.protein_peptide_counts[ix] += 1;
            }
        }
    }

    /// Matches assigned to a protein
    pub fn protein_psms(&self, ix: ProteinIx) -> u32 {
        self.protein_psm_counts
            .get(ix.0 as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Distinct peptides assigned to a protein
    pub fn protein_peptides(&self, ix: ProteinIx) -> u32 {
        self.protein_peptide_counts
            .get(ix.0 as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Times a modified peptide sequence has been observed
    pub fn peptide_count(&self, sequence: &str) -> u32 {
        self.peptide_counts.get(sequence).copied().unwrap_or_default()
    }

    pub fn num_proteins(&self) -> usize {
        self.protein_psm_counts.len()
    }
}
