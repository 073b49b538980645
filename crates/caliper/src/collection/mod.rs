//! A bounded collection of peptide-spectrum matches
//!
//! During a search, one collection holds the candidates of a single spectrum
//! at a single charge: they are scored, ranked, truncated and calibrated
//! here before being written to a `.csm` file. During post-processing,
//! collections are rebuilt from those files (see [`crate::directory`]) and
//! may hold matches from many spectra.

mod iter;
mod post;
mod rank;

use std::cell::Cell;
use std::io::Write;
use std::rc::Rc;

use rand::Rng;

use crate::database::ProteinIx;
use crate::parameters::{Parameters, MAX_MATCHES};
use crate::peptide::Peptide;
use crate::psm::{Match, MatchRef};
use crate::score::{ScoreMap, ScoreType, NOT_SCORED, P_VALUE_NA};
use crate::scoring::Scorer;
use crate::spectrum::Spectrum;
use crate::weibull::{self, WeibullFit};
use crate::Error;

pub use iter::MatchIter;
pub use post::PostProcess;

/// The order the matches of a collection are currently in
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Best first, by a score type's ordering class
    Score(ScoreType),
    /// Grouped by spectrum and charge, then best first
    Spectrum(ScoreType),
}

pub struct MatchCollection {
    pub(crate) matches: Vec<MatchRef>,
    capacity: usize,
    /// Candidates considered, including matches that were not kept
    pub(crate) experiment_size: usize,
    /// 0 until the first match is added
    pub(crate) charge: u8,
    decoy: bool,
    pub(crate) scored: ScoreMap<bool>,
    pub(crate) last_sorted: Option<SortOrder>,
    /// Set while a [`MatchIter`] is alive
    pub(crate) lock: Cell<bool>,
    weibull: WeibullFit,
    pub(crate) delta_cn: f32,
    /// Final scores of every candidate seen, kept or not, for calibration
    xcorr_sample: Vec<f32>,
    pub(crate) post: Option<PostProcess>,
}

impl MatchCollection {
    pub fn new(decoy: bool) -> Self {
        Self::with_capacity(decoy, MAX_MATCHES)
    }

    pub fn with_capacity(decoy: bool, capacity: usize) -> Self {
        MatchCollection {
            matches: Vec::new(),
            capacity,
            experiment_size: 0,
            charge: 0,
            decoy,
            scored: ScoreMap::default(),
            last_sorted: None,
            lock: Cell::new(false),
            weibull: WeibullFit::default(),
            delta_cn: 0.0,
            xcorr_sample: Vec::new(),
            post: None,
        }
    }

    /// A collection rebuilt from `.csm` files, tracking per-protein counts
    pub fn post_process(decoy: bool, capacity: usize, num_proteins: usize) -> Self {
        let mut collection = Self::with_capacity(decoy, capacity);
        collection.post = Some(PostProcess::new(num_proteins));
        collection
    }

    fn assert_unlocked(&self, action: &str) {
        if self.lock.get() {
            panic!(
                "Cannot {} while a match iterator is instantiated on the collection",
                action
            );
        }
    }

    pub(crate) fn check_unlocked(&self) -> Result<(), Error> {
        match self.lock.get() {
            true => Err(Error::Locked),
            false => Ok(()),
        }
    }

    fn push(&mut self, m: MatchRef) {
        if self.matches.len() >= self.capacity {
            panic!(
                "Cannot add to match collection; count exceeds limit: {}",
                self.capacity
            );
        }
        self.matches.push(m);
    }

    /// Compare every peptide to `spectrum` at `charge`, keeping the best.
    ///
    /// Candidates are scored with the preliminary score type (unless
    /// `max_rank_preliminary` is 0), then every match lacking the final
    /// score is scored with it. The final scores of the new candidates join
    /// the calibration sample. With `keep_matches` false the new candidates
    /// are dropped again right after that: this path is only meant for
    /// decoys generated to calibrate p-values, and is accounted for as
    /// such in the experiment size.
    ///
    /// Returns the number of candidates added.
    #[allow(clippy::too_many_arguments)]
    pub fn add_matches<I, S>(
        &mut self,
        spectrum: &Rc<Spectrum>,
        charge: u8,
        peptides: I,
        scorer: &mut S,
        parameters: &Parameters,
        is_decoy: bool,
        keep_matches: bool,
    ) -> usize
    where
        I: IntoIterator<Item = Peptide>,
        S: Scorer + ?Sized,
    {
        self.assert_unlocked("add matches");
        assert!(
            self.charge == 0 || self.charge == charge,
            "Cannot add charge {} matches to a collection holding charge {} matches",
            charge,
            self.charge
        );
        self.charge = charge;
        self.last_sorted = None;

        let start = self.matches.len();
        let prelim = parameters.max_rank_preliminary > 0;
        let prelim_type = parameters.prelim_score_type;
        for peptide in peptides {
            let mut m = Match::new(spectrum.clone(), peptide, charge, is_decoy);
            if prelim {
                let score = scorer.score(spectrum, &m.peptide, charge, prelim_type);
                m.scores[prelim_type] = score.value;
                if score.ions_possible > 0 {
                    m.ions_matched = score.ions_matched;
                    m.ions_possible = score.ions_possible;
                }
            }
            self.push(m.shared());
        }
        let added = self.matches.len() - start;
        self.experiment_size += added;
        if prelim {
            self.scored[prelim_type] = true;
        }

        let final_type = parameters.score_type;
        self.score_matches(spectrum, charge, scorer, final_type);
        self.scored[final_type] = true;
        self.store_new_scores(start, final_type, keep_matches);

        if prelim {
            self.rank_matches(prelim_type);
            self.truncate_matches(parameters.max_rank_preliminary, prelim_type);
        }
        self.rank_matches(final_type);
        self.truncate_matches(parameters.psms_per_spectrum_reported, final_type);

        log::trace!(
            "scan {} charge {}: {} candidates, {} kept",
            spectrum.scan,
            charge,
            added,
            self.matches.len()
        );
        added
    }

    /// Score every match that has not been scored for `score_type` yet
    fn score_matches<S: Scorer + ?Sized>(
        &mut self,
        spectrum: &Spectrum,
        charge: u8,
        scorer: &mut S,
        score_type: ScoreType,
    ) {
        for m in &self.matches {
            let mut m = m.borrow_mut();
            if m.scores[score_type] != NOT_SCORED {
                continue;
            }
            debug_assert_eq!(m.charge, charge);
            let score = scorer.score(spectrum, &m.peptide, charge, score_type);
            m.scores[score_type] = score.value;
            if score.ions_possible > 0 {
                m.ions_matched = score.ions_matched;
                m.ions_possible = score.ions_possible;
            }
        }
    }

    fn store_new_scores(&mut self, start: usize, score_type: ScoreType, keep_matches: bool) {
        let new = self.matches.len() - start;
        if self.xcorr_sample.len() + new > self.capacity {
            panic!(
                "Too many scores to store for calibration: limit is {}",
                self.capacity
            );
        }
        self.xcorr_sample.extend(
            self.matches[start..]
                .iter()
                .map(|m| m.borrow().scores[score_type]),
        );
        if !keep_matches {
            self.matches.truncate(start);
            self.experiment_size -= new;
        }
    }

    /// Append every match of `source`, sharing them. Both collections must
    /// have been scored for the same types, unless `self` is empty.
    pub fn merge(&mut self, source: &MatchCollection) -> usize {
        self.assert_unlocked("merge match collections");
        if self.matches.is_empty() {
            self.scored = source.scored;
        } else if self.scored != source.scored {
            panic!(
                "Cannot merge match collections scored for different types. \
                 Trying to add matches scored for {} to matches scored for {}",
                source.scored.describe(),
                self.scored.describe()
            );
        }
        if self.matches.len() + source.matches.len() > self.capacity {
            panic!("Cannot merge match collections, insufficient capacity in destination collection");
        }
        log::trace!(
            "merging {} matches into a collection of {}",
            source.matches.len(),
            self.matches.len()
        );
        self.matches.extend(source.matches.iter().cloned());
        self.experiment_size += source.experiment_size;
        self.last_sorted = None;
        source.matches.len()
    }

    /// Add one shared match
    pub fn add_match(&mut self, m: MatchRef) {
        self.assert_unlocked("add a match");
        self.push(m);
        self.last_sorted = None;
    }

    /// Add a match parsed from a `.csm` file, updating the post-process
    /// counters
    pub fn extend(&mut self, m: Match) {
        self.assert_unlocked("extend a match collection");
        if let Some(post) = self.post.as_mut() {
            post.record(&m);
        }
        self.push(m.shared());
        self.last_sorted = None;
        if self.matches.len() % 1000 == 0 {
            log::info!("parsed PSM: {}", self.matches.len());
        }
    }

    /// A new collection sharing up to `count` randomly chosen matches
    pub fn sample<R: Rng>(&self, count: usize, rng: &mut R) -> MatchCollection {
        let mut sample = MatchCollection::with_capacity(self.decoy, self.capacity);
        sample.charge = self.charge;
        sample.experiment_size = self.experiment_size;
        sample.scored = self.scored;
        if count >= self.matches.len() {
            sample.matches = self.matches.clone();
            sample.last_sorted = self.last_sorted;
            return sample;
        }
        sample.matches = rand::seq::index::sample(rng, self.matches.len(), count)
            .into_iter()
            .map(|idx| self.matches[idx].clone())
            .collect();
        sample
    }

    /// Set the delta-Cn of every match relative to the best xcorr, and the
    /// collection's delta-Cn from the two best. Returns false if the
    /// collection has not been scored by xcorr.
    pub fn calculate_delta_cn(&mut self) -> bool {
        if !self.scored[ScoreType::XCorr] {
            log::warn!("delta-Cn not calculated: match collection is not scored for xcorr");
            return false;
        }
        if self.matches.is_empty() {
            return true;
        }
        self.sort_matches(ScoreType::XCorr);

        let max = self.matches[0].borrow().scores[ScoreType::XCorr];
        let relative = |score: f32| match max == 0.0 {
            true => 0.0,
            // Adding 0.0 turns -0.0 into 0.0
            false => (max - score) / max + 0.0,
        };
        for m in &self.matches {
            let mut m = m.borrow_mut();
            m.delta_cn = relative(m.scores[ScoreType::XCorr]);
        }
        self.delta_cn = self
            .matches
            .get(1)
            .map(|m| m.borrow().delta_cn)
            .unwrap_or(0.0);
        true
    }

    /// Store externally computed `values` (in current match order) as
    /// `score_type` and rank them. With `preserve_order`, the matches are
    /// returned to the order they were in before ranking.
    pub fn fill_scores(
        &mut self,
        score_type: ScoreType,
        values: &[f32],
        preserve_order: bool,
    ) -> Result<(), Error> {
        self.check_unlocked()?;
        assert_eq!(
            values.len(),
            self.matches.len(),
            "Cannot fill {} scores into a collection of {} matches",
            values.len(),
            self.matches.len()
        );
        for (m, value) in self.matches.iter().zip(values) {
            m.borrow_mut().scores[score_type] = *value;
        }
        if self.order_class() == Some(SortOrder::Score(score_type.sort_class())) {
            self.last_sorted = None;
        }

        let previous = preserve_order.then(|| (self.matches.clone(), self.last_sorted));
        self.rank_matches(score_type);
        if let Some((matches, last_sorted)) = previous {
            self.matches = matches;
            self.last_sorted = last_sorted;
        }
        self.scored[score_type] = true;
        Ok(())
    }

    fn order_class(&self) -> Option<SortOrder> {
        match self.last_sorted {
            Some(SortOrder::Score(ty)) => Some(SortOrder::Score(ty.sort_class())),
            other => other,
        }
    }

    /// Fit a Weibull distribution to the tail of the calibration sample.
    ///
    /// Fails without touching the current parameters if the sample holds
    /// fewer than `min_weibull_samples` scores or no fit is acceptable.
    pub fn estimate_weibull(&mut self, parameters: &Parameters) -> Result<WeibullFit, Error> {
        let found = self.xcorr_sample.len();
        let needed = parameters.min_weibull_samples;
        if found < needed {
            log::debug!(
                "too few psms ({}) to estimate p-value parameters for charge {}",
                found,
                self.charge
            );
            return Err(Error::InsufficientData { needed, found });
        }

        self.xcorr_sample.sort_unstable_by(|a, b| b.total_cmp(a));
        let tail = (found as f64 * parameters.fraction_to_fit) as usize;
        log::debug!(
            "estimating Weibull parameters with {} psms ({:.2} of {})",
            tail,
            parameters.fraction_to_fit,
            found
        );

        let (min_shift, max_shift, step) = parameters.shift_range();
        let fit = weibull::fit_three_parameter(
            &self.xcorr_sample,
            tail,
            found,
            min_shift,
            max_shift,
            step,
            parameters.corr_threshold,
        )
        .ok_or(Error::WeibullFit)?;

        log::debug!(
            "corr: {:.6} eta: {:.6} beta: {:.6} shift: {:.6}",
            fit.correlation,
            fit.eta,
            fit.beta,
            fit.shift
        );
        self.weibull = fit;
        Ok(fit)
    }

    /// Convert the main score of every match into a Bonferroni-corrected
    /// Weibull p-value, stored as -ln p.
    ///
    /// When `sink` is given, the uncorrected p-values are written to it,
    /// preceded by a comment block identifying the spectrum and fit.
    pub fn compute_p_values<W: Write>(
        &mut self,
        parameters: &Parameters,
        sink: Option<&mut W>,
    ) -> Result<(), Error> {
        self.check_unlocked()?;
        let main = parameters.score_type;
        if !self.scored[main] {
            panic!(
                "Match collection was not scored by {} prior to computing p-values",
                main
            );
        }

        let WeibullFit {
            eta,
            beta,
            shift,
            correlation,
        } = self.weibull;
        let scan = self
            .matches
            .first()
            .map(|m| m.borrow().spectrum.scan)
            .unwrap_or_default();
        log::debug!(
            "computing p-values for {} scan {} charge {} with eta {} beta {} shift {}",
            if self.decoy { "decoy" } else { "target" },
            scan,
            self.charge,
            eta,
            beta,
            shift
        );

        let mut sink = sink;
        if let Some(w) = sink.as_mut() {
            writeln!(
                w,
                "# scan: {} charge: {} candidates: {}",
                scan, self.charge, self.experiment_size
            )?;
            writeln!(
                w,
                "# eta: {} beta: {} shift: {} correlation: {}",
                eta, beta, shift, correlation
            )?;
        }

        for m in &self.matches {
            let mut m = m.borrow_mut();
            let neg_log_p = weibull::neg_log_pvalue(m.scores[main] as f64, eta, beta, shift);
            if let Some(w) = sink.as_mut() {
                writeln!(w, "{}", (-neg_log_p).exp())?;
            }
            let corrected = weibull::neg_log_bonferroni(neg_log_p, self.experiment_size);
            m.scores[ScoreType::LogPWeibullXCorr] = log_score(neg_log_p);
            m.scores[ScoreType::PValue] = log_score(corrected);
        }

        self.rank_matches(main);
        self.scored[ScoreType::LogPWeibullXCorr] = true;
        self.scored[ScoreType::PValue] = true;
        Ok(())
    }

    /// Copy the Weibull parameters of another collection
    pub fn transfer_weibull(&mut self, from: &MatchCollection) {
        self.weibull = from.weibull;
    }

    pub fn set_scored(&mut self, score_type: ScoreType, scored: bool) {
        self.scored[score_type] = scored;
    }

    pub fn charge(&self) -> u8 {
        self.charge
    }

    pub fn experiment_size(&self) -> usize {
        self.experiment_size
    }

    pub fn is_decoy(&self) -> bool {
        self.decoy
    }

    pub fn scored(&self, score_type: ScoreType) -> bool {
        self.scored[score_type]
    }

    pub fn weibull(&self) -> WeibullFit {
        self.weibull
    }

    /// Difference between the two best xcorrs, relative to the best
    pub fn delta_cn(&self) -> f32 {
        if self.scored[ScoreType::XCorr] {
            self.delta_cn
        } else {
            log::error!("match collection must be scored by xcorr to get delta-Cn");
            0.0
        }
    }

    pub fn last_sorted(&self) -> Option<SortOrder> {
        self.last_sorted
    }

    /// Matches in their current order
    pub fn matches(&self) -> &[MatchRef] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn calibration_sample(&self) -> &[f32] {
        &self.xcorr_sample
    }

    pub fn post_process_counters(&self) -> Option<&PostProcess> {
        self.post.as_ref()
    }

    /// Matches assigned to a protein, 0 outside post-processing
    pub fn protein_counter(&self, ix: ProteinIx) -> u32 {
        self.post.as_ref().map_or(0, |p| p.protein_psms(ix))
    }

    pub fn protein_peptide_counter(&self, ix: ProteinIx) -> u32 {
        self.post.as_ref().map_or(0, |p| p.protein_peptides(ix))
    }

    pub fn peptide_count(&self, sequence: &str) -> u32 {
        self.post.as_ref().map_or(0, |p| p.peptide_count(sequence))
    }
}

/// -ln p as stored, or the not-applicable sentinel when there is no usable
/// fit
fn log_score(neg_log_p: f64) -> f32 {
    match !neg_log_p.is_finite() {
        true => P_VALUE_NA,
        false => (neg_log_p as f32).clamp(0.0, f32::MAX),
    }
}
