pub mod analysis;
pub mod collection;
pub mod csm;
pub mod database;
pub mod directory;
pub mod fasta;
pub mod fdr;
pub mod mass;
pub mod modification;
pub mod parameters;
pub mod peptide;
pub mod protein;
pub mod psm;
pub mod score;
pub mod scoring;
pub mod spectrum;
pub mod weibull;

use std::path::{Path, PathBuf};

use score::ScoreType;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A match iterator currently holds the collection
    Locked,
    NotScored(ScoreType),
    InsufficientData { needed: usize, found: usize },
    /// No shift in the search range produced an acceptable Weibull fit
    WeibullFit,
    NoQValueSlot(ScoreType),
    NoDecoysOrPValues,
    /// A decoy match was found among target matches (or vice versa)
    MixedDecoys { scan: u32 },
    MissingTarget(PathBuf),
    TooManyDecoyFiles(usize),
    FileExists(PathBuf),
    /// A `.csm` writer was given a set index it has no file for
    NoSuchSet { index: usize, sets: usize },
    /// Short read or invalid value while parsing a `.csm` file
    Corrupt(&'static str),
    /// The file was never finalized by its writer
    Incomplete(PathBuf),
    ModMismatch(PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Json(e) => e.fmt(f),
            Self::Locked => f.write_str("match collection is locked by an iterator"),
            Self::NotScored(ty) => write!(f, "match collection was not scored for {}", ty),
            Self::InsufficientData { needed, found } => write!(
                f,
                "too few scores to estimate a Weibull distribution: {} of {} required",
                found, needed
            ),
            Self::WeibullFit => f.write_str("no acceptable Weibull fit in the shift range"),
            Self::NoQValueSlot(ty) => {
                write!(f, "don't know where to store q-values for score type {}", ty)
            }
            Self::NoDecoysOrPValues => {
                f.write_str("cannot compute q-values without decoy PSMs or p-values")
            }
            Self::MixedDecoys { scan } => write!(
                f,
                "PSM for scan {} is stored with the wrong target/decoy set: decoy and target PSMs must be stored in separate files",
                scan
            ),
            Self::MissingTarget(p) => write!(f, "no target .csm file in {}", p.display()),
            Self::TooManyDecoyFiles(n) => write!(
                f,
                "only one decoy file per target can be processed but {} were found",
                n
            ),
            Self::FileExists(p) => write!(f, "{} already exists", p.display()),
            Self::NoSuchSet { index, sets } => write!(
                f,
                "cannot write set {}: only {} .csm files were opened",
                index, sets
            ),
            Self::Corrupt(what) => write!(f, "corrupted .csm file: could not read {}", what),
            Self::Incomplete(p) => write!(f, "{} was not completely written", p.display()),
            Self::ModMismatch(p) => write!(
                f,
                "{} was written with a different modification table",
                p.display()
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub fn read_fasta<P: AsRef<Path>>(path: P, decoy_tag: &str) -> Result<fasta::Fasta, Error> {
    let contents = std::fs::read_to_string(path)?;
    Ok(fasta::Fasta::parse(contents, decoy_tag))
}

pub fn read_json<P, T>(path: P) -> Result<T, Error>
where
    P: AsRef<Path>,
    T: for<'de> serde::Deserialize<'de>,
{
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
