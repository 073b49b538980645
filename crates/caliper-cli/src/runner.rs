use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use caliper_core::analysis::compute_q_values;
use caliper_core::collection::MatchCollection;
use caliper_core::database::Database;
use caliper_core::directory::MatchCollectionIterator;
use caliper_core::score::{ScoreType, P_VALUE_NA};
use log::info;

use super::input::Analysis;

pub struct Runner {
    pub database: Database,
    pub parameters: Analysis,
    start: Instant,
}

/// Target matches whose q-value of `score_type` is at most `threshold`
pub fn passing(collection: &MatchCollection, score_type: ScoreType, threshold: f32) -> usize {
    collection
        .matches()
        .iter()
        .map(|m| m.borrow())
        .filter(|m| !m.decoy)
        .filter(|m| {
            let q = m.score(score_type);
            match score_type {
                _ if q == P_VALUE_NA => false,
                // Stored as -ln q
                ScoreType::WeibullQValue => (-q).exp() <= threshold,
                _ => q <= threshold,
            }
        })
        .count()
}

impl Runner {
    pub fn new(parameters: Analysis) -> anyhow::Result<Self> {
        let start = Instant::now();
        let fasta = caliper_core::read_fasta(&parameters.fasta, &parameters.parameters.decoy_tag)
            .with_context(|| format!("Failed to build database from `{}`", parameters.fasta))?;
        let database = Database::new(fasta);
        info!(
            "loaded {} protein sequences in {:#?}",
            database.len(),
            start.elapsed()
        );
        Ok(Runner {
            database,
            parameters,
            start,
        })
    }

    // Create a path for `file_name` in the output directory
    pub(crate) fn make_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.parameters.output_directory.join(file_name.as_ref())
    }

    /// Estimate q-values for the top match of every spectrum, and write them
    pub fn run(mut self) -> anyhow::Result<Analysis> {
        let parameters = &self.parameters.parameters;
        let sets = MatchCollectionIterator::new(
            &self.parameters.psm_directory,
            &self.database,
            &parameters.mods,
            parameters.max_psms,
        )
        .with_context(|| {
            format!(
                "Failed to read PSMs from `{}`",
                self.parameters.psm_directory
            )
        })?;
        let num_decoys = sets.num_decoys();
        info!(
            "reading target and {} decoy PSM files from {}",
            num_decoys,
            sets.directory().display()
        );

        let mut pooled = compute_q_values(sets, num_decoys, parameters)
            .context("Failed to compute q-values")?;

        let score_type = match pooled.scored(ScoreType::WeibullQValue) {
            true => ScoreType::WeibullQValue,
            false => ScoreType::DecoyXCorrQValue,
        };
        info!(
            "discovered {} target peptide-spectrum matches at 1% FDR ({})",
            passing(&pooled, score_type, 0.01),
            score_type
        );

        log::trace!("writing outputs");
        let path = self.write_tab(&mut pooled)?;
        self.parameters.output_paths.push(path);
        if self.parameters.write_sqt {
            let path = self.write_sqt(&mut pooled)?;
            self.parameters.output_paths.push(path);
        }

        let path = self.make_path("results.json");
        self.parameters
            .output_paths
            .push(path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&self.parameters)?);
        let bytes = serde_json::to_vec_pretty(&self.parameters)?;
        std::fs::write(&path, bytes)?;

        let run_time = (Instant::now() - self.start).as_secs();
        info!("finished in {}s", run_time);
        Ok(self.parameters)
    }
}
