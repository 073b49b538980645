use crate::peptide::Peptide;
use crate::score::ScoreType;
use crate::spectrum::Spectrum;

/// Result of comparing one peptide against one spectrum
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Score {
    pub value: f32,
    /// Matched and theoretical b/y fragment ions, when the scorer tracks them
    pub ions_matched: u32,
    pub ions_possible: u32,
}

impl From<f32> for Score {
    fn from(value: f32) -> Self {
        Score {
            value,
            ..Default::default()
        }
    }
}

/// Fragment-ion scoring. Implementations own whatever ion-series buffers
/// they need, hence `&mut self`.
pub trait Scorer {
    fn score(
        &mut self,
        spectrum: &Spectrum,
        peptide: &Peptide,
        charge: u8,
        score_type: ScoreType,
    ) -> Score;
}

impl<F> Scorer for F
where
    F: FnMut(&Spectrum, &Peptide, u8, ScoreType) -> f32,
{
    fn score(
        &mut self,
        spectrum: &Spectrum,
        peptide: &Peptide,
        charge: u8,
        score_type: ScoreType,
    ) -> Score {
        self(spectrum, peptide, charge, score_type).into()
    }
}
