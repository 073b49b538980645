//! Experiment-wide q-values from the collections of a finished search

use crate::collection::MatchCollection;
use crate::parameters::Parameters;
use crate::score::{ScoreType, P_VALUE_NA};
use crate::Error;

/// Pool the top-ranked match of every spectrum (targets and decoys) and
/// compute their q-values.
///
/// Decoy q-values are computed by xcorr when any decoy collection is
/// present, and additionally by p-value when the target matches carry
/// p-values. Benjamini-Hochberg q-values are computed from the target
/// p-values.
pub fn compute_q_values<I>(
    collections: I,
    num_decoys: usize,
    parameters: &Parameters,
) -> Result<MatchCollection, Error>
where
    I: IntoIterator<Item = Result<MatchCollection, Error>>,
{
    if num_decoys > 1 {
        return Err(Error::TooManyDecoyFiles(num_decoys));
    }

    let mut pooled = MatchCollection::with_capacity(false, parameters.max_psms);
    pooled.set_scored(ScoreType::Sp, true);
    pooled.set_scored(ScoreType::XCorr, true);
    let mut pvalues = Vec::new();

    for collection in collections {
        let collection = collection?;
        if collection.is_empty() {
            continue;
        }
        let decoy = collection.is_decoy();
        let has_pvalues = collection.scored(ScoreType::PValue);
        if has_pvalues {
            pooled.set_scored(ScoreType::PValue, true);
        }

        for m in collection.try_iter(ScoreType::XCorr)? {
            let inner = m.borrow();
            if inner.decoy != decoy {
                return Err(Error::MixedDecoys {
                    scan: inner.spectrum.scan,
                });
            }
            if inner.rank(ScoreType::XCorr) != 1 {
                continue;
            }
            if has_pvalues && !decoy {
                let log_p = inner.score(ScoreType::PValue);
                if log_p != P_VALUE_NA {
                    pvalues.push(log_p as f64);
                }
            }
            pooled.add_match(m.clone());
        }
    }

    if pvalues.is_empty() && num_decoys == 0 {
        return Err(Error::NoDecoysOrPValues);
    }
    log::debug!(
        "{} psms for decoy q-value computation, {} p-values",
        pooled.len(),
        pvalues.len()
    );

    if num_decoys > 0 {
        pooled.compute_decoy_q_values(ScoreType::XCorr)?;
        if !pvalues.is_empty() {
            pooled.compute_decoy_q_values(ScoreType::PValue)?;
        }
    }
    if !pvalues.is_empty() {
        pooled.compute_bh_qvalues(&mut pvalues, parameters.pi0)?;
    }
    Ok(pooled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::tests::scored;

    /// One collection per set, every match ranked first for its spectrum
    fn set(scores: &[f32], decoy: bool) -> MatchCollection {
        let collection = scored(scores, &vec![decoy; scores.len()]);
        for m in collection.matches() {
            m.borrow_mut().ranks[ScoreType::XCorr] = 1;
        }
        let mut set = MatchCollection::with_capacity(decoy, 100);
        set.merge(&collection);
        set
    }

    #[test]
    fn pools_top_matches() -> Result<(), Error> {
        let parameters = Parameters::default();
        let target = set(&[9.0, 8.0, 6.0, 3.0], false);
        target.matches()[3].borrow_mut().ranks[ScoreType::XCorr] = 2;
        let decoy = set(&[7.0, 2.0], true);

        let pooled = compute_q_values(vec![Ok(target), Ok(decoy)], 1, &parameters)?;
        assert_eq!(pooled.len(), 5);
        assert!(pooled.scored(ScoreType::DecoyXCorrQValue));
        assert!(!pooled.scored(ScoreType::WeibullQValue));

        let q = pooled
            .matches()
            .iter()
            .map(|m| m.borrow().score(ScoreType::DecoyXCorrQValue))
            .collect::<Vec<_>>();
        assert_eq!(q, vec![0.0, 0.0, 1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0]);
        Ok(())
    }

    #[test]
    fn requires_decoys_or_p_values() {
        let parameters = Parameters::default();
        let target = set(&[9.0], false);
        assert!(matches!(
            compute_q_values(vec![Ok(target)], 0, &parameters),
            Err(Error::NoDecoysOrPValues)
        ));
        assert!(matches!(
            compute_q_values(Vec::new(), 2, &parameters),
            Err(Error::TooManyDecoyFiles(2))
        ));
    }

    #[test]
    fn decoys_in_target_set() {
        let parameters = Parameters::default();
        let mut target = set(&[9.0], false);
        target.add_match(scored(&[4.0], &[true]).matches()[0].clone());
        assert!(matches!(
            compute_q_values(vec![Ok(target)], 1, &parameters),
            Err(Error::MixedDecoys { scan: 7 })
        ));
    }

    #[test]
    fn p_values_without_decoys() -> Result<(), Error> {
        let parameters = Parameters::default();
        let mut target = set(&[9.0, 8.0], false);
        for (m, p) in target.matches().iter().zip([0.01f64, 0.04]) {
            m.borrow_mut().scores[ScoreType::PValue] = -p.ln() as f32;
        }
        target.set_scored(ScoreType::PValue, true);

        let pooled = compute_q_values(vec![Ok(target)], 0, &parameters)?;
        assert!(pooled.scored(ScoreType::WeibullQValue));
        assert!(!pooled.scored(ScoreType::DecoyXCorrQValue));
        let q = pooled
            .matches()
            .iter()
            .map(|m| (-m.borrow().score(ScoreType::WeibullQValue) as f64).exp())
            .collect::<Vec<_>>();
        assert!((q[0] - 0.02).abs() < 1e-6, "{:?}", q);
        assert!((q[1] - 0.04).abs() < 1e-6, "{:?}", q);
        Ok(())
    }
}
