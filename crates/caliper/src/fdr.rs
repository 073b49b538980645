//! False discovery rate estimation across an experiment
//!
//! Two estimates are supported: target-decoy counting over a pooled,
//! sorted list of matches, and Benjamini-Hochberg over Weibull p-values.
//!
//! Benjamini & Hochberg, https://www.jstor.org/stable/2346101
//! Klammer et al., https://pubmed.ncbi.nlm.nih.gov/19113769/

use crate::collection::MatchCollection;
use crate::score::{ScoreType, P_VALUE_NA};
use crate::Error;

/// Tolerance when mapping a match's -ln p-value back into the pooled list
const EPSILON: f64 = 1e-14;

/// Unmonotonised Benjamini-Hochberg estimates, in -ln space, for p-values
/// given in -ln space. `log_pvalues` is sorted best (largest) first.
pub fn bh_fdr(log_pvalues: &mut [f64], pi0: f64) -> Vec<f64> {
    log_pvalues.sort_unstable_by(|a, b| b.total_cmp(a));
    let log_n = -(log_pvalues.len() as f64).ln();
    let log_pi0 = -pi0.ln();
    log_pvalues
        .iter()
        .enumerate()
        .map(|(idx, log_p)| log_p + log_n - (-((idx + 1) as f64).ln()) + log_pi0)
        .collect()
}

/// Benjamini-Hochberg q-values, in -ln space and aligned with the sorted
/// `log_pvalues`. Q-values are capped at 1, and never decrease as the
/// p-value grows.
pub fn bh_qvalues(log_pvalues: &mut [f64], pi0: f64) -> Vec<f64> {
    let mut qvalues = bh_fdr(log_pvalues, pi0);
    let mut max = f64::MIN;
    for q in qvalues.iter_mut().rev() {
        max = max.max(q.max(0.0));
        *q = max;
    }
    qvalues
}

impl MatchCollection {
    /// Target-decoy q-values for the matches of this collection, ranked by
    /// `score_type` (xcorr or the corrected p-value).
    ///
    /// The local FDR at each position is the number of decoys over the
    /// number of targets scoring at least as well; a q-value is the lowest
    /// FDR at or below its position.
    pub fn compute_decoy_q_values(&mut self, score_type: ScoreType) -> Result<(), Error> {
        let qvalue_type = match score_type {
            ScoreType::XCorr => ScoreType::DecoyXCorrQValue,
            ScoreType::PValue => ScoreType::DecoyPValueQValue,
            other => return Err(Error::NoQValueSlot(other)),
        };
        self.check_unlocked()?;
        log::debug!("computing decoy q-values for {}", score_type);
        self.sort_matches(score_type);

        let (mut targets, mut decoys) = (0u32, 0u32);
        for m in &self.matches {
            let mut m = m.borrow_mut();
            if score_type == ScoreType::PValue && m.scores[ScoreType::PValue] == P_VALUE_NA {
                m.scores[qvalue_type] = P_VALUE_NA;
                continue;
            }
            match m.decoy {
                true => decoys += 1,
                false => targets += 1,
            }
            m.scores[qvalue_type] = match targets {
                0 => 1.0,
                _ => decoys as f32 / targets as f32,
            };
        }

        let mut min_fdr = 1.0f32;
        for m in self.matches.iter().rev() {
            let mut m = m.borrow_mut();
            let fdr = m.scores[qvalue_type];
            if fdr == P_VALUE_NA {
                continue;
            }
            min_fdr = min_fdr.min(fdr);
            m.scores[qvalue_type] = min_fdr;
        }

        self.scored[qvalue_type] = true;
        Ok(())
    }

    /// Benjamini-Hochberg q-values from the pooled -ln p-values of the
    /// top target matches. Each match is mapped back to its q-value through
    /// its own p-value; matches without a p-value, or whose p-value is not
    /// in the pool, get [`P_VALUE_NA`].
    pub fn compute_bh_qvalues(&mut self, log_pvalues: &mut [f64], pi0: f64) -> Result<(), Error> {
        self.check_unlocked()?;
        let qvalues = bh_qvalues(log_pvalues, pi0);
        let pooled = &*log_pvalues;

        for m in &self.matches {
            let mut m = m.borrow_mut();
            let log_p = m.scores[ScoreType::PValue];
            if log_p == P_VALUE_NA {
                m.scores[ScoreType::WeibullQValue] = P_VALUE_NA;
                continue;
            }
            let log_p = log_p as f64;
            // Sorted descending
            let start = pooled.partition_point(|x| *x > log_p + EPSILON);
            m.scores[ScoreType::WeibullQValue] = match pooled.get(start) {
                Some(x) if (x - log_p).abs() <= EPSILON => qvalues[start] as f32,
                _ => P_VALUE_NA,
            };
        }

        self.scored[ScoreType::WeibullQValue] = true;
        Ok(())
    }
}
