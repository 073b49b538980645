//! Score types carried by a peptide-spectrum match, and a fixed map keyed by
//! them.
//!
//! Several score types order matches identically (a raw score and the
//! log-probability derived from it within one spectrum), so every type
//! belongs to an ordering class. Sorting by a type whose class matches the
//! current order is a no-op.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::ops::{Index, IndexMut};

/// Stored for every score type a match has not been scored with
pub const NOT_SCORED: f32 = f32::MIN;

/// A p-value (or a q-value derived from one) that could not be computed
pub const P_VALUE_NA: f32 = -1.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreType {
    #[serde(rename = "sp")]
    Sp,
    #[serde(rename = "xcorr")]
    XCorr,
    /// -ln of the uncorrected Weibull p-value of the xcorr
    #[serde(rename = "logp_weibull_xcorr")]
    LogPWeibullXCorr,
    /// -ln of the Bonferroni-corrected Weibull p-value of the xcorr
    #[serde(rename = "logp_bonf_weibull_xcorr")]
    PValue,
    /// Benjamini-Hochberg q-value of `PValue`, kept in -ln space
    #[serde(rename = "logp_qvalue_weibull_xcorr")]
    WeibullQValue,
    #[serde(rename = "decoy_xcorr_qvalue")]
    DecoyXCorrQValue,
    #[serde(rename = "decoy_pvalue_qvalue")]
    DecoyPValueQValue,
}

impl ScoreType {
    pub const COUNT: usize = 7;

    pub const ALL: [ScoreType; ScoreType::COUNT] = [
        ScoreType::Sp,
        ScoreType::XCorr,
        ScoreType::LogPWeibullXCorr,
        ScoreType::PValue,
        ScoreType::WeibullQValue,
        ScoreType::DecoyXCorrQValue,
        ScoreType::DecoyPValueQValue,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ScoreType::Sp => "sp",
            ScoreType::XCorr => "xcorr",
            ScoreType::LogPWeibullXCorr => "logp_weibull_xcorr",
            ScoreType::PValue => "logp_bonf_weibull_xcorr",
            ScoreType::WeibullQValue => "logp_qvalue_weibull_xcorr",
            ScoreType::DecoyXCorrQValue => "decoy_xcorr_qvalue",
            ScoreType::DecoyPValueQValue => "decoy_pvalue_qvalue",
        }
    }

    /// Representative of the ordering class this type sorts in
    pub fn sort_class(self) -> ScoreType {
        match self {
            ScoreType::LogPWeibullXCorr => ScoreType::XCorr,
            other => other,
        }
    }

    /// Decoy q-values are the only scores where smaller is better
    pub fn lower_is_better(self) -> bool {
        matches!(
            self,
            ScoreType::DecoyXCorrQValue | ScoreType::DecoyPValueQValue
        )
    }

    /// Order two scores of this type best-first. Sentinels always sort last
    /// for q-value types, so they never precede a computed value.
    pub fn compare(self, a: f32, b: f32) -> Ordering {
        if self.lower_is_better() {
            match (a == P_VALUE_NA, b == P_VALUE_NA) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.total_cmp(&b),
            }
        } else {
            b.total_cmp(&a)
        }
    }
}

impl Display for ScoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size map from every [`ScoreType`] to a value
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScoreMap<T>([T; ScoreType::COUNT]);

impl<T: Copy> ScoreMap<T> {
    pub fn filled(value: T) -> Self {
        Self([value; ScoreType::COUNT])
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreType, T)> + '_ {
        ScoreType::ALL.iter().map(move |&ty| (ty, self.0[ty.index()]))
    }
}

impl Default for ScoreMap<f32> {
    fn default() -> Self {
        Self::filled(NOT_SCORED)
    }
}

impl Default for ScoreMap<u32> {
    fn default() -> Self {
        Self::filled(0)
    }
}

impl Default for ScoreMap<bool> {
    fn default() -> Self {
        Self::filled(false)
    }
}

impl ScoreMap<bool> {
    /// Names of every type flagged as scored, for diagnostics
    pub fn describe(&self) -> String {
        let names = self
            .iter()
            .filter(|(_, scored)| *scored)
            .map(|(ty, _)| ty.name())
            .collect::<Vec<_>>();
        if names.is_empty() {
            "nothing".into()
        } else {
            names.join(", ")
        }
    }
}

impl<T> Index<ScoreType> for ScoreMap<T> {
    type Output = T;

    fn index(&self, index: ScoreType) -> &Self::Output {
        &self.0[index as usize]
    }
}

impl<T> IndexMut<ScoreType> for ScoreMap<T> {
    fn index_mut(&mut self, index: ScoreType) -> &mut Self::Output {
        &mut self.0[index as usize]
    }
}
