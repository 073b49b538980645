//! Sorting, ranking and truncation of a [`MatchCollection`]

use std::rc::Rc;

use super::{MatchCollection, SortOrder};
use crate::score::{ScoreType, NOT_SCORED};
use crate::Error;

impl MatchCollection {
    /// Order matches best first by `score_type`. Does nothing if they are
    /// already in an order equivalent to it.
    pub fn sort(&mut self, score_type: ScoreType) -> Result<(), Error> {
        self.check_unlocked()?;
        self.sort_matches(score_type);
        Ok(())
    }

    /// Group matches by spectrum and charge, best first by `score_type`
    /// within each group
    pub fn spectrum_sort(&mut self, score_type: ScoreType) -> Result<(), Error> {
        self.check_unlocked()?;
        let class = score_type.sort_class();
        if self.last_sorted == Some(SortOrder::Spectrum(class)) {
            return Ok(());
        }
        self.matches.sort_by(|a, b| {
            let (a, b) = (a.borrow(), b.borrow());
            a.spectrum
                .scan
                .cmp(&b.spectrum.scan)
                .then(a.charge.cmp(&b.charge))
                .then_with(|| class.compare(a.scores[class], b.scores[class]))
        });
        self.last_sorted = Some(SortOrder::Spectrum(class));
        Ok(())
    }

    pub(crate) fn sort_matches(&mut self, score_type: ScoreType) {
        let class = score_type.sort_class();
        if self.last_sorted == Some(SortOrder::Score(class)) {
            return;
        }
        log::trace!("sorting {} matches by {}", self.matches.len(), class);
        // Stable, so that ties keep insertion order
        self.matches
            .sort_by(|a, b| class.compare(a.borrow().scores[class], b.borrow().scores[class]));
        self.last_sorted = Some(SortOrder::Score(class));
    }

    /// Assign ranks for `score_type`, sorting first if needed. Rank 1 is
    /// the best score; tied scores share a rank, and the next distinct
    /// score takes its position in the list (1, 1, 3, 4).
    pub fn rank(&mut self, score_type: ScoreType) -> Result<(), Error> {
        self.check_unlocked()?;
        self.rank_matches(score_type);
        Ok(())
    }

    pub(crate) fn rank_matches(&mut self, score_type: ScoreType) {
        self.sort_matches(score_type);

        let mut rank = 0;
        let mut previous = None;
        for (idx, m) in self.matches.iter().enumerate() {
            let mut m = m.borrow_mut();
            let score = m.scores[score_type];
            if score == NOT_SCORED {
                log::warn!(
                    "PSM spectrum {} charge {} sequence {} was not scored for {}",
                    m.spectrum.scan,
                    m.charge,
                    m.peptide,
                    score_type
                );
            }
            if previous != Some(score) {
                rank = idx as u32 + 1;
                previous = Some(score);
            }
            m.ranks[score_type] = rank;
        }
    }

    /// Drop every match ranked worse than `max_rank` for `score_type`.
    ///
    /// Matches tied at `max_rank` are all kept, so more than `max_rank`
    /// matches may remain. Relies on ranks already being assigned.
    pub fn truncate(&mut self, max_rank: u32, score_type: ScoreType) -> Result<(), Error> {
        self.check_unlocked()?;
        self.truncate_matches(max_rank, score_type);
        Ok(())
    }

    pub(crate) fn truncate_matches(&mut self, max_rank: u32, score_type: ScoreType) {
        if self.matches.is_empty() {
            return;
        }
        self.sort_matches(score_type);
        while let Some(m) = self.matches.last() {
            if m.borrow().ranks[score_type] <= max_rank {
                break;
            }
            self.matches.pop();
        }
    }

    /// Combine matches to the same modified peptide sequence, keeping the
    /// first and adding the protein sources of the others to it.
    ///
    /// Duplicates share their sp score, so the collection must be ordered
    /// by sp or xcorr for them to sit next to each other. Removed
    /// duplicates no longer count towards the experiment size.
    pub fn collapse_redundant(&mut self) {
        if self.matches.is_empty() {
            return;
        }
        assert!(
            matches!(
                self.last_sorted,
                Some(SortOrder::Score(ScoreType::Sp | ScoreType::XCorr))
            ),
            "Cannot collapse redundant matches unless sorted by sp or xcorr, found {:?}",
            self.last_sorted
        );

        let total = self.matches.len();
        let mut keep = vec![true; total];
        let mut start = 0;
        while start < total {
            let score = self.matches[start].borrow().scores[ScoreType::Sp];
            let mut end = start + 1;
            while end < total && self.matches[end].borrow().scores[ScoreType::Sp] == score {
                end += 1;
            }
            self.consolidate(start, end, &mut keep);
            start = end;
        }

        let mut flags = keep.into_iter();
        self.matches.retain(|_| flags.next().unwrap_or(true));
        let removed = total - self.matches.len();
        log::debug!("removing duplicates changed count from {} to {}", total, self.matches.len());
        self.experiment_size -= removed;
    }

    /// Merge duplicates among `matches[start..end]`, which share a score
    fn consolidate(&self, start: usize, end: usize, keep: &mut [bool]) {
        for cur in start..end {
            if !keep[cur] {
                continue;
            }
            let sequence = self.matches[cur].borrow().peptide.to_string();
            for next in cur + 1..end {
                if !keep[next] || Rc::ptr_eq(&self.matches[cur], &self.matches[next]) {
                    continue;
                }
                let other = self.matches[next].borrow();
                if other.peptide.to_string() == sequence {
                    self.matches[cur]
                        .borrow_mut()
                        .peptide
                        .merge_sources(&other.peptide.sources);
                    keep[next] = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::scored;
    use super::*;
    use crate::database::ProteinIx;
    use crate::peptide::PeptideSource;
    use quickcheck_macros::quickcheck;

    fn scores(collection: &MatchCollection, ty: ScoreType) -> Vec<f32> {
        collection
            .matches()
            .iter()
            .map(|m| m.borrow().score(ty))
            .collect()
    }

    fn ranks(collection: &MatchCollection, ty: ScoreType) -> Vec<u32> {
        collection
            .matches()
            .iter()
            .map(|m| m.borrow().rank(ty))
            .collect()
    }

    /// Small integers, so that ties are frequent
    fn collection_from(values: &[u8]) -> MatchCollection {
        let scores = values.iter().map(|v| (v % 8) as f32).collect::<Vec<_>>();
        scored(&scores, &vec![false; scores.len()])
    }

    #[test]
    fn ties_share_rank() -> Result<(), Error> {
        let mut collection = scored(&[7.0, 10.0, 5.0, 10.0], &[false, false, true, false]);
        collection.rank(ScoreType::XCorr)?;
        assert_eq!(scores(&collection, ScoreType::XCorr), vec![10.0, 10.0, 7.0, 5.0]);
        assert_eq!(ranks(&collection, ScoreType::XCorr), vec![1, 1, 3, 4]);

        collection.truncate(1, ScoreType::XCorr)?;
        assert_eq!(collection.len(), 2);
        Ok(())
    }

    #[test]
    fn sort_is_skipped_for_equivalent_orders() -> Result<(), Error> {
        let mut collection = scored(&[1.0, 3.0, 2.0], &[false; 3]);
        collection.sort(ScoreType::XCorr)?;
        assert_eq!(collection.last_sorted(), Some(SortOrder::Score(ScoreType::XCorr)));

        // A p-value transform within one spectrum sorts like xcorr
        for (m, p) in collection.matches().iter().zip([9.0, 1.0, 4.0]) {
            m.borrow_mut().scores[ScoreType::LogPWeibullXCorr] = p;
        }
        collection.sort(ScoreType::LogPWeibullXCorr)?;
        assert_eq!(scores(&collection, ScoreType::XCorr), vec![3.0, 2.0, 1.0]);
        Ok(())
    }

    #[test]
    fn q_values_sort_ascending() -> Result<(), Error> {
        let mut collection = scored(&[1.0, 2.0, 3.0], &[false; 3]);
        for (m, q) in collection.matches().iter().zip([0.5, crate::score::P_VALUE_NA, 0.1]) {
            m.borrow_mut().scores[ScoreType::DecoyPValueQValue] = q;
        }
        collection.sort(ScoreType::DecoyPValueQValue)?;
        assert_eq!(
            scores(&collection, ScoreType::DecoyPValueQValue),
            vec![0.1, 0.5, crate::score::P_VALUE_NA]
        );
        Ok(())
    }

    #[test]
    fn spectrum_sort_groups_scans() -> Result<(), Error> {
        let mut collection = scored(&[1.0, 2.0, 3.0, 4.0], &[false; 4]);
        for (m, scan) in collection.matches().iter().zip([20, 10, 20, 10]) {
            let mut m = m.borrow_mut();
            let mz = m.spectrum.precursor_mz;
            m.spectrum = Rc::new(crate::spectrum::Spectrum::new(scan, mz));
        }
        collection.spectrum_sort(ScoreType::XCorr)?;
        let order = collection
            .matches()
            .iter()
            .map(|m| (m.borrow().spectrum.scan, m.borrow().score(ScoreType::XCorr)))
            .collect::<Vec<_>>();
        assert_eq!(order, vec![(10, 4.0), (10, 2.0), (20, 3.0), (20, 1.0)]);
        assert_eq!(collection.last_sorted(), Some(SortOrder::Spectrum(ScoreType::XCorr)));
        Ok(())
    }

    #[test]
    fn collapse_merges_sources() {
        let mut collection = scored(&[4.0, 4.0, 4.0, 2.0], &[false; 4]);
        // Make the second and third match the same peptide as the first
        let first = collection.matches()[0].borrow().peptide.clone();
        for (idx, m) in collection.matches()[1..3].iter().enumerate() {
            let mut peptide = first.clone();
            peptide.sources = vec![PeptideSource {
                protein: ProteinIx(idx as u32 + 1),
                start: 3,
            }];
            m.borrow_mut().peptide = peptide;
        }
        collection.experiment_size = 10;
        collection.sort_matches(ScoreType::Sp);
        collection.collapse_redundant();

        assert_eq!(collection.len(), 2);
        assert_eq!(collection.experiment_size(), 8);
        let proteins = collection.matches()[0]
            .borrow()
            .peptide
            .sources
            .iter()
            .map(|s| s.protein.0)
            .collect::<Vec<_>>();
        assert_eq!(proteins, vec![0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "sorted by sp or xcorr")]
    fn collapse_requires_sorted() {
        let mut collection = scored(&[4.0, 4.0], &[false; 2]);
        collection.collapse_redundant();
    }

    #[test]
    fn locked_collection_refuses_changes() {
        let mut collection = scored(&[1.0, 2.0], &[false; 2]);
        std::mem::forget(collection.iter(ScoreType::XCorr));
        assert!(matches!(collection.sort(ScoreType::Sp), Err(Error::Locked)));
        assert!(matches!(collection.rank(ScoreType::Sp), Err(Error::Locked)));
        assert!(matches!(collection.truncate(1, ScoreType::Sp), Err(Error::Locked)));
    }

    #[quickcheck]
    fn rank_follows_score(values: Vec<u8>) -> bool {
        let mut collection = collection_from(&values);
        if collection.rank(ScoreType::XCorr).is_err() {
            return false;
        }
        let s = scores(&collection, ScoreType::XCorr);
        let r = ranks(&collection, ScoreType::XCorr);
        r.first().map_or(true, |&first| first == 1)
            && (1..s.len()).all(|i| r[i] >= r[i - 1] && ((r[i] == r[i - 1]) == (s[i] == s[i - 1])))
    }

    #[quickcheck]
    fn truncate_keeps_exactly_the_top_ranks(values: Vec<u8>, max_rank: u8) -> bool {
        let max_rank = max_rank as u32 % 10;
        let mut collection = collection_from(&values);
        collection.rank_matches(ScoreType::XCorr);
        let within = collection
            .matches()
            .iter()
            .filter(|m| m.borrow().rank(ScoreType::XCorr) <= max_rank)
            .count();

        collection.truncate_matches(max_rank, ScoreType::XCorr);
        collection.len() == within
            && collection
                .matches()
                .iter()
                .all(|m| m.borrow().rank(ScoreType::XCorr) <= max_rank)
    }
}
