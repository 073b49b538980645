use serde::{Deserialize, Serialize};

use crate::modification::{validate_mods, AaMod};
use crate::protein::{Cleavage, PeptideConstraint};
use crate::score::ScoreType;

/// Default bound on the number of matches one search collection may hold
pub const MAX_MATCHES: usize = 100_000;

/// Default bound on the matches pooled from a whole experiment
pub const MAX_PSMS: usize = 10_000_000;

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ConstraintBuilder {
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    /// Minimum average peptide mass
    pub min_mass: Option<f32>,
    /// Maximum average peptide mass
    pub max_mass: Option<f32>,
    pub cleavage: Option<Cleavage>,
    /// Allow internal K/R cleavage sites
    pub missed_cleavages: Option<bool>,
}

impl From<ConstraintBuilder> for PeptideConstraint {
    fn from(b: ConstraintBuilder) -> PeptideConstraint {
        let default = PeptideConstraint::default();
        let mut constraint = PeptideConstraint {
            min_len: b.min_len.unwrap_or(default.min_len).max(1),
            max_len: b.max_len.unwrap_or(default.max_len),
            min_mass: b.min_mass.unwrap_or(default.min_mass),
            max_mass: b.max_mass.unwrap_or(default.max_mass),
            cleavage: b.cleavage.unwrap_or(default.cleavage),
            missed_cleavages: b.missed_cleavages.unwrap_or(default.missed_cleavages),
        };
        if constraint.min_len > constraint.max_len {
            log::warn!(
                "peptide.min_len ({}) is greater than peptide.max_len ({}), swapping",
                constraint.min_len,
                constraint.max_len
            );
            std::mem::swap(&mut constraint.min_len, &mut constraint.max_len);
        }
        if constraint.min_mass > constraint.max_mass {
            log::warn!("peptide.min_mass is greater than peptide.max_mass, swapping");
            std::mem::swap(&mut constraint.min_mass, &mut constraint.max_mass);
        }
        constraint
    }
}

#[derive(Deserialize, Default, Clone, Debug)]
/// Scoring, calibration and q-value settings, as deserialized from JSON
pub struct Builder {
    /// Matches kept after preliminary scoring. 0 skips preliminary scoring
    pub max_rank_preliminary: Option<u32>,
    pub prelim_score_type: Option<ScoreType>,
    pub score_type: Option<ScoreType>,
    /// Matches kept per spectrum and charge after final scoring
    pub psms_per_spectrum_reported: Option<u32>,
    /// Matches written per spectrum to `.csm` and text output
    pub top_match: Option<u32>,
    /// Hard bound on the matches a search collection may hold
    pub max_matches: Option<usize>,
    /// Hard bound on the matches read back from `.csm` files, and pooled
    /// for q-value estimation
    pub max_psms: Option<usize>,
    /// Share of the highest calibration scores used for the Weibull fit
    pub fraction_to_fit: Option<f64>,
    pub min_weibull_samples: Option<usize>,
    pub corr_threshold: Option<f64>,
    /// Estimated proportion of incorrect target matches
    pub pi0: Option<f64>,
    pub num_decoy_files: Option<usize>,
    pub compute_p_values: Option<bool>,
    pub mods: Option<Vec<AaMod>>,
    pub peptide: Option<ConstraintBuilder>,
    /// Use this prefix for decoy proteins
    pub decoy_tag: Option<String>,
}

impl Builder {
    pub fn make_parameters(self) -> Parameters {
        let score_type = match self.score_type.unwrap_or(ScoreType::XCorr) {
            ty @ (ScoreType::Sp | ScoreType::XCorr) => ty,
            other => {
                log::warn!("score_type `{}` cannot be used for searching, using xcorr", other);
                ScoreType::XCorr
            }
        };
        let prelim_score_type = self.prelim_score_type.unwrap_or(ScoreType::Sp);
        if prelim_score_type != ScoreType::Sp && prelim_score_type != ScoreType::XCorr {
            log::warn!("prelim_score_type `{}` is unusual", prelim_score_type);
        }

        let mut fraction_to_fit = self.fraction_to_fit.unwrap_or(0.55);
        if !(fraction_to_fit > 0.0 && fraction_to_fit <= 1.0) {
            log::warn!(
                "fraction_to_fit must lie in (0, 1], got {}. Using 0.55",
                fraction_to_fit
            );
            fraction_to_fit = 0.55;
        }

        let mut pi0 = self.pi0.unwrap_or(1.0);
        if !(pi0 > 0.0 && pi0 <= 1.0) {
            log::warn!("pi0 must lie in (0, 1], got {}. Using 1.0", pi0);
            pi0 = 1.0;
        }

        let num_decoy_files = self.num_decoy_files.unwrap_or(1);
        if num_decoy_files > 3 {
            log::warn!("at most 3 decoy files are supported, got {}", num_decoy_files);
        }

        Parameters {
            max_rank_preliminary: self.max_rank_preliminary.unwrap_or(500),
            prelim_score_type,
            score_type,
            psms_per_spectrum_reported: self.psms_per_spectrum_reported.unwrap_or(5).max(1),
            top_match: self.top_match.unwrap_or(5).max(1),
            max_matches: self.max_matches.unwrap_or(MAX_MATCHES),
            max_psms: self.max_psms.unwrap_or(MAX_PSMS),
            fraction_to_fit,
            min_weibull_samples: self.min_weibull_samples.unwrap_or(40).max(2),
            corr_threshold: self.corr_threshold.unwrap_or(0.0),
            pi0,
            num_decoy_files: num_decoy_files.min(3),
            compute_p_values: self.compute_p_values.unwrap_or(true),
            mods: validate_mods(self.mods),
            peptide: self.peptide.unwrap_or_default().into(),
            decoy_tag: self.decoy_tag.unwrap_or_else(|| "rev_".into()),
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct Parameters {
    pub max_rank_preliminary: u32,
    pub prelim_score_type: ScoreType,
    pub score_type: ScoreType,
    pub psms_per_spectrum_reported: u32,
    pub top_match: u32,
    pub max_matches: usize,
    pub max_psms: usize,
    pub fraction_to_fit: f64,
    pub min_weibull_samples: usize,
    pub corr_threshold: f64,
    pub pi0: f64,
    pub num_decoy_files: usize,
    pub compute_p_values: bool,
    pub mods: Vec<AaMod>,
    pub peptide: PeptideConstraint,
    pub decoy_tag: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Builder::default().make_parameters()
    }
}

impl Parameters {
    /// Weibull shift search range `(min, max, step)` for the final score type
    pub fn shift_range(&self) -> (f64, f64, f64) {
        match self.score_type {
            ScoreType::Sp => (-100.0, 300.0, 5.0),
            _ => (-5.0, 5.0, 0.05),
        }
    }
}
