//! Reading a search's `.csm` files back, one collection per file
//!
//! A result directory holds exactly one `*.target.csm` file and up to three
//! decoy files, named `*.decoy.csm` (or `*.decoy-1.csm`), `*.decoy-2.csm`
//! and `*.decoy-3.csm`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::collection::MatchCollection;
use crate::csm::{Block, Header, TARGET_SUFFIX};
use crate::database::Database;
use crate::modification::AaMod;
use crate::Error;

pub const MAX_DECOY_FILES: usize = 3;

/// Yields the target collection, then every decoy collection
pub struct MatchCollectionIterator<'db> {
    directory: PathBuf,
    database: &'db Database,
    mods: Vec<AaMod>,
    capacity: usize,
    target: PathBuf,
    decoys: Vec<PathBuf>,
    next: usize,
}

fn decoy_set(name: &str) -> Option<usize> {
    if name.ends_with(".decoy.csm") {
        return Some(1);
    }
    (1..=MAX_DECOY_FILES).find(|idx| name.ends_with(&format!(".decoy-{}.csm", idx)))
}

impl<'db> MatchCollectionIterator<'db> {
    /// Scan `directory` for `.csm` files. Their headers must list `mods`.
    pub fn new<P: AsRef<Path>>(
        directory: P,
        database: &'db Database,
        mods: &[AaMod],
        capacity: usize,
    ) -> Result<Self, Error> {
        let directory = directory.as_ref().to_path_buf();
        let mut targets = Vec::new();
        let mut decoys: [Vec<PathBuf>; MAX_DECOY_FILES] = Default::default();

        for entry in std::fs::read_dir(&directory)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|name| name.to_str()) {
                Some(name) if name.ends_with(".csm") => name.to_string(),
                _ => continue,
            };
            if name.ends_with(&format!(".{}", TARGET_SUFFIX)) {
                targets.push(path);
            } else if let Some(set) = decoy_set(&name) {
                decoys[set - 1].push(path);
            } else {
                log::debug!("skipping {}", path.display());
            }
        }

        targets.sort();
        if targets.len() > 1 {
            log::warn!(
                "found {} target files in {}, only reading {}",
                targets.len(),
                directory.display(),
                targets[0].display()
            );
        }
        let target = targets
            .into_iter()
            .next()
            .ok_or_else(|| Error::MissingTarget(directory.clone()))?;

        let decoys = decoys
            .into_iter()
            .filter_map(|mut set| {
                set.sort();
                set.into_iter().next()
            })
            .collect::<Vec<_>>();
        if decoys.is_empty() {
            log::info!("no decoy files in {}", directory.display());
        }

        Ok(MatchCollectionIterator {
            directory,
            database,
            mods: mods.to_vec(),
            capacity,
            target,
            decoys,
            next: 0,
        })
    }

    pub fn num_decoys(&self) -> usize {
        self.decoys.len()
    }

    /// Target and decoy sets
    pub fn total_sets(&self) -> usize {
        1 + self.decoys.len()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn read(&self, path: &Path, decoy: bool) -> Result<MatchCollection, Error> {
        log::info!("getting PSMs from {}", path.display());
        let mut r = BufReader::new(File::open(path)?);

        let header = Header::read(&mut r)?;
        if header.total_spectra < 0 {
            return Err(Error::Incomplete(path.to_path_buf()));
        }
        if header.mods != self.mods {
            return Err(Error::ModMismatch(path.to_path_buf()));
        }

        let mut collection =
            MatchCollection::post_process(decoy, self.capacity, self.database.len());
        for idx in 0..header.total_spectra {
            let block = Block::read(&mut r)?;
            if idx == 0 {
                collection.scored = block.scored;
            }
            let matches = block.read_matches(&mut r, self.database, header.matches_per_spectrum)?;
            let candidates = block.ln_experiment_size.exp().round() as usize;
            collection.experiment_size += candidates.max(matches.len());
            for m in matches {
                collection.extend(m);
            }
        }
        log::debug!(
            "read {} PSMs from {} spectra",
            collection.len(),
            header.total_spectra
        );
        Ok(collection)
    }
}

impl<'db> Iterator for MatchCollectionIterator<'db> {
    type Item = Result<MatchCollection, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next;
        let (path, decoy) = match idx {
            0 => (self.target.clone(), false),
            _ => (self.decoys.get(idx - 1)?.clone(), true),
        };
        self.next += 1;
        let collection = self.read(&path, decoy);
        if let Err(e) = &collection {
            log::error!("{}: {}", path.display(), e);
        }
        Some(collection)
    }
}
