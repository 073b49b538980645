use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use caliper_core::parameters::{Builder, Parameters};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
/// Actual analysis parameters - may include overrides or default values not set by user
pub struct Analysis {
    pub version: String,
    pub parameters: Parameters,
    pub fasta: String,
    pub psm_directory: String,
    pub output_paths: Vec<String>,

    #[serde(skip_serializing)]
    pub output_directory: PathBuf,

    #[serde(skip_serializing)]
    pub write_sqt: bool,
}

#[derive(Deserialize, Default)]
/// Input parameters deserialized from JSON file
pub struct Input {
    #[serde(default)]
    parameters: Builder,
    fasta: Option<String>,
    psm_directory: Option<String>,
    output_directory: Option<String>,
    write_sqt: Option<bool>,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let mut input = match matches.get_one::<String>("parameters") {
            Some(path) => Input::load(path)
                .with_context(|| format!("Failed to read parameters from `{path}`"))?,
            None => Input::default(),
        };

        // Handle JSON configuration overrides
        if let Some(output_directory) = matches.get_one::<String>("output_directory") {
            log::trace!("overriding `output_directory` parameter.");
            input.output_directory = Some(output_directory.into());
        }
        if let Some(fasta) = matches.get_one::<String>("fasta") {
            log::trace!("overriding `fasta` parameter.");
            input.fasta = Some(fasta.into());
        }
        if let Some(psm_directory) = matches.get_one::<String>("psm_directory") {
            log::trace!("overriding `psm_directory` parameter.");
            input.psm_directory = Some(psm_directory.into());
        }
        if matches.get_flag("sqt") {
            input.write_sqt = Some(true);
        }

        Ok(input)
    }

    pub fn load<S: AsRef<str>>(path: S) -> anyhow::Result<Self> {
        caliper_core::read_json(path.as_ref()).map_err(anyhow::Error::from)
    }

    pub fn build(self) -> anyhow::Result<Analysis> {
        let psm_directory = self
            .psm_directory
            .context("`psm_directory` must be set. For more information try '--help'")?;
        let fasta = self
            .fasta
            .context("`fasta` must be set. For more information try '--help'")?;
        ensure!(
            Path::new(&psm_directory).is_dir(),
            "`psm_directory` {} is not a directory",
            psm_directory
        );

        let parameters = self.parameters.make_parameters();
        if parameters.num_decoy_files > 1 {
            log::warn!(
                "q-values are estimated from a single decoy set, but `num_decoy_files` is {}",
                parameters.num_decoy_files
            );
        }

        let output_directory = match self.output_directory {
            Some(path) => {
                let path = PathBuf::from(path);
                std::fs::create_dir_all(&path)?;
                path
            }
            None => std::env::current_dir()?,
        };

        Ok(Analysis {
            version: clap::crate_version!().into(),
            parameters,
            fasta,
            psm_directory,
            output_paths: Vec::new(),
            output_directory,
            write_sqt: self.write_sqt.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_inputs() {
        let input: Input = serde_json::from_str(r#"{ "fasta": "db.fasta" }"#).unwrap();
        let err = input.build().err().unwrap();
        assert!(err.to_string().contains("psm_directory"));
    }

    #[test]
    fn parameters_default() {
        let dir = std::env::temp_dir();
        let input: Input = serde_json::from_str(&format!(
            r#"{{
                "fasta": "db.fasta",
                "psm_directory": {dir:?},
                "output_directory": {dir:?},
                "parameters": {{ "pi0": 0.9, "top_match": 2 }}
            }}"#,
            dir = dir.display().to_string()
        ))
        .unwrap();
        let analysis = input.build().unwrap();
        assert_eq!(analysis.parameters.pi0, 0.9);
        assert_eq!(analysis.parameters.top_match, 2);
        assert_eq!(analysis.output_directory, dir);
        assert!(!analysis.write_sqt);
    }
}
