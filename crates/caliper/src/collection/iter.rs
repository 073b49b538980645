use super::MatchCollection;
use crate::psm::MatchRef;
use crate::score::ScoreType;
use crate::Error;

/// Read-only traversal of a [`MatchCollection`] in its current order.
///
/// Only one iterator may exist per collection at a time. The collection is
/// borrowed for the iterator's lifetime, and the lock is released when the
/// iterator is dropped.
pub struct MatchIter<'a> {
    collection: &'a MatchCollection,
    score_type: ScoreType,
    idx: usize,
}

impl MatchCollection {
    /// Iterate matches in their current order
    pub fn try_iter(&self, score_type: ScoreType) -> Result<MatchIter<'_>, Error> {
        if self.lock.get() {
            return Err(Error::Locked);
        }
        if !self.scored[score_type] {
            return Err(Error::NotScored(score_type));
        }
        self.lock.set(true);
        Ok(MatchIter {
            collection: self,
            score_type,
            idx: 0,
        })
    }

    /// Like [`MatchCollection::try_iter`], but a second iterator or an
    /// unscored type is a fatal error
    pub fn iter(&self, score_type: ScoreType) -> MatchIter<'_> {
        match self.try_iter(score_type) {
            Ok(iter) => iter,
            Err(Error::Locked) => panic!("Can only have one match iterator instantiated at a time"),
            Err(e) => panic!("Cannot iterate matches: {}", e),
        }
    }

    /// Iterate best first by `score_type`, sorting unless the matches are
    /// already in an equivalent order
    pub fn sorted_iter(&mut self, score_type: ScoreType) -> Result<MatchIter<'_>, Error> {
        self.check_unlocked()?;
        if !self.scored[score_type] {
            return Err(Error::NotScored(score_type));
        }
        self.sort_matches(score_type);
        self.try_iter(score_type)
    }

    /// Iterate matches grouped by spectrum, best first within each
    pub fn spectrum_sorted_iter(&mut self, score_type: ScoreType) -> Result<MatchIter<'_>, Error> {
        self.spectrum_sort(score_type)?;
        self.try_iter(score_type)
    }
}

impl<'a> MatchIter<'a> {
    pub fn has_next(&self) -> bool {
        self.idx < self.collection.matches.len()
    }

    pub fn score_type(&self) -> ScoreType {
        self.score_type
    }
}

impl<'a> Iterator for MatchIter<'a> {
    type Item = &'a MatchRef;

    fn next(&mut self) -> Option<Self::Item> {
        let m = self.collection.matches.get(self.idx)?;
        self.idx += 1;
        Some(m)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.collection.matches.len() - self.idx;
        (n, Some(n))
    }
}

impl Drop for MatchIter<'_> {
    fn drop(&mut self) {
        self.collection.lock.set(false);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::super::tests::{peptide, scored};
    use super::*;
    use crate::collection::SortOrder;
    use crate::psm::Match;
    use crate::spectrum::Spectrum;

    #[test]
    fn one_iterator_at_a_time() {
        let collection = scored(&[3.0, 1.0, 2.0], &[false; 3]);
        let first = collection.iter(ScoreType::XCorr);
        assert!(matches!(collection.try_iter(ScoreType::XCorr), Err(Error::Locked)));
        assert_eq!(first.count(), 3);
        // Consuming the iterator dropped it
        let second = collection.try_iter(ScoreType::Sp);
        assert!(second.is_ok());
    }

    #[test]
    #[should_panic(expected = "one match iterator")]
    fn second_iterator_is_fatal() {
        let collection = scored(&[3.0], &[false]);
        let _first = collection.iter(ScoreType::XCorr);
        let _second = collection.iter(ScoreType::XCorr);
    }

    #[test]
    fn unscored_type() {
        let collection = scored(&[3.0], &[false]);
        assert!(matches!(
            collection.try_iter(ScoreType::PValue),
            Err(Error::NotScored(ScoreType::PValue))
        ));
        // A failed request does not take the lock
        assert!(collection.try_iter(ScoreType::XCorr).is_ok());
    }

    #[test]
    fn sorted_traversal() -> Result<(), Error> {
        let mut collection = scored(&[3.0, 1.0, 2.0], &[false; 3]);
        let mut iter = collection.sorted_iter(ScoreType::XCorr)?;
        let mut seen = Vec::new();
        while iter.has_next() {
            if let Some(m) = iter.next() {
                seen.push(m.borrow().score(ScoreType::XCorr));
            }
        }
        assert_eq!(seen, vec![3.0, 2.0, 1.0]);
        assert!(iter.next().is_none());
        drop(iter);

        // Released even when not run to completion
        let any_decoy = collection
            .iter(ScoreType::XCorr)
            .any(|m| m.borrow().decoy);
        assert!(!any_decoy);
        assert!(collection.sort(ScoreType::Sp).is_ok());
        Ok(())
    }

    #[test]
    fn spectrum_sorted_traversal() -> Result<(), Error> {
        let mut collection = MatchCollection::new(false);
        for (scan, xcorr) in [(2, 1.0), (1, 0.5), (2, 4.0), (1, 3.0), (3, 2.0)] {
            let spectrum = Rc::new(Spectrum::new(scan, 500.0));
            let seq = format!("PEPTIDE{}K", "G".repeat(collection.len()));
            let mut m = Match::new(spectrum, peptide(&seq, false), 2, false);
            m.scores[ScoreType::XCorr] = xcorr;
            collection.add_match(m.shared());
        }
        collection.set_scored(ScoreType::XCorr, true);

        let seen = collection
            .spectrum_sorted_iter(ScoreType::XCorr)?
            .map(|m| {
                let m = m.borrow();
                (m.spectrum.scan, m.score(ScoreType::XCorr))
            })
            .collect::<Vec<_>>();
        assert_eq!(seen, vec![(1, 3.0), (1, 0.5), (2, 4.0), (2, 1.0), (3, 2.0)]);
        assert_eq!(
            collection.last_sorted(),
            Some(SortOrder::Spectrum(ScoreType::XCorr))
        );

        // The lock went with the iterator
        assert!(collection.try_iter(ScoreType::XCorr).is_ok());
        assert!(collection.sort(ScoreType::XCorr).is_ok());
        assert_eq!(collection.matches()[0].borrow().score(ScoreType::XCorr), 4.0);
        Ok(())
    }
}
