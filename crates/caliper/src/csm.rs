//! The `.csm` binary format, streaming search results to post-processing
//!
//! One file holds every spectrum's matches for either the targets or one
//! set of decoys. All values are little endian; booleans take one byte.
//!
//! ```text
//! header: i32 total_spectra    (-1 until the writer finishes)
//!         i32 reserved         (always 0)
//!         i32 matches_per_spectrum
//!         i32 mod_count, mod_count × modification record
//! block:  i32 charge
//!         i32 match_total      (matches held, possibly more than written)
//!         f32 delta_cn, f32 ln_delta_cn, f32 ln_experiment_size
//!         CSM_SCORED_FLAGS × bool
//!         min(match_total, matches_per_spectrum) × match record
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::collection::MatchCollection;
use crate::database::Database;
use crate::modification::AaMod;
use crate::psm::Match;
use crate::score::{ScoreMap, ScoreType};
use crate::Error;

/// Score types appended after the format was fixed. Their scored flags are
/// never written, so the trailing types of [`ScoreType::ALL`] are skipped.
pub const CSM_UNSERIALIZED_SCORE_TYPES: usize = 2;

/// Scored flags stored per block
pub const CSM_SCORED_FLAGS: usize = ScoreType::COUNT - CSM_UNSERIALIZED_SCORE_TYPES;

pub const TARGET_SUFFIX: &str = "target.csm";

/// Map short reads to [`Error::Corrupt`], naming the field being read
pub(crate) fn truncated(what: &'static str) -> impl Fn(io::Error) -> Error {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Corrupt(what),
        _ => Error::Io(e),
    }
}

/// File name suffix of decoy set `index` (1-based) when `num_decoy_files`
/// decoy files are written
pub fn decoy_suffix(index: usize, num_decoy_files: usize) -> String {
    match num_decoy_files {
        1 => "decoy.csm".into(),
        _ => format!("decoy-{}.csm", index),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    /// Negative if the writer never finished
    pub total_spectra: i32,
    pub matches_per_spectrum: u32,
    pub mods: Vec<AaMod>,
}

impl Header {
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.total_spectra)?;
        w.write_i32::<LittleEndian>(0)?;
        w.write_i32::<LittleEndian>(self.matches_per_spectrum as i32)?;
        w.write_i32::<LittleEndian>(self.mods.len() as i32)?;
        for m in &self.mods {
            m.serialize(w)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, Error> {
        let total_spectra = r
            .read_i32::<LittleEndian>()
            .map_err(truncated("spectrum count"))?;
        // Reserved: the number of spectrum features, never used
        r.read_i32::<LittleEndian>()
            .map_err(truncated("spectrum feature count"))?;
        let matches_per_spectrum = r
            .read_i32::<LittleEndian>()
            .map_err(truncated("matches per spectrum"))?;
        let num_mods = r
            .read_i32::<LittleEndian>()
            .map_err(truncated("modification count"))?;
        if matches_per_spectrum < 0 || num_mods < 0 {
            return Err(Error::Corrupt("header"));
        }

        let mut mods = Vec::with_capacity(num_mods.min(64) as usize);
        for _ in 0..num_mods {
            match AaMod::parse(r).map_err(truncated("modification"))? {
                Some(m) => mods.push(m),
                None => return Err(Error::Corrupt("modification")),
            }
        }
        log::trace!(
            "csm header: {} spectra, {} matches per spectrum, {} mods",
            total_spectra,
            matches_per_spectrum,
            mods.len()
        );
        Ok(Header {
            total_spectra,
            matches_per_spectrum: matches_per_spectrum as u32,
            mods,
        })
    }
}

/// Per-spectrum values shared by every match of a block
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Block {
    pub charge: u8,
    pub match_total: u32,
    pub delta_cn: f32,
    pub ln_delta_cn: f32,
    pub ln_experiment_size: f32,
    pub scored: ScoreMap<bool>,
}

impl Block {
    /// Block values describing a (ranked) search collection
    pub fn of(collection: &MatchCollection) -> Self {
        let delta_cn = collection.delta_cn();
        let ln_delta_cn = match delta_cn > 0.0 {
            true => delta_cn.ln(),
            false => 0.0,
        };
        let ln_experiment_size = match collection.experiment_size() {
            0 => 0.0,
            n => (n as f32).ln(),
        };
        let mut scored = ScoreMap::default();
        for ty in ScoreType::ALL {
            scored[ty] = collection.scored(ty);
        }
        Block {
            charge: collection.charge(),
            match_total: collection.len() as u32,
            delta_cn,
            ln_delta_cn,
            ln_experiment_size,
            scored,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_i32::<LittleEndian>(self.charge as i32)?;
        w.write_i32::<LittleEndian>(self.match_total as i32)?;
        w.write_f32::<LittleEndian>(self.delta_cn)?;
        w.write_f32::<LittleEndian>(self.ln_delta_cn)?;
        w.write_f32::<LittleEndian>(self.ln_experiment_size)?;
        for ty in &ScoreType::ALL[..CSM_SCORED_FLAGS] {
            w.write_u8(self.scored[*ty] as u8)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, Error> {
        let err = truncated("spectrum block");
        let charge = r.read_i32::<LittleEndian>().map_err(&err)?;
        let match_total = r.read_i32::<LittleEndian>().map_err(&err)?;
        let delta_cn = r.read_f32::<LittleEndian>().map_err(&err)?;
        let ln_delta_cn = r.read_f32::<LittleEndian>().map_err(&err)?;
        let ln_experiment_size = r.read_f32::<LittleEndian>().map_err(&err)?;
        let mut scored = ScoreMap::default();
        for ty in &ScoreType::ALL[..CSM_SCORED_FLAGS] {
            scored[*ty] = r.read_u8().map_err(&err)? != 0;
        }

        let charge = u8::try_from(charge).map_err(|_| Error::Corrupt("block charge"))?;
        let match_total =
            u32::try_from(match_total).map_err(|_| Error::Corrupt("block match count"))?;
        Ok(Block {
            charge,
            match_total,
            delta_cn,
            ln_delta_cn,
            ln_experiment_size,
            scored,
        })
    }

    /// Read the match records following this block, at most
    /// `matches_per_spectrum` of them
    pub fn read_matches<R: Read>(
        &self,
        r: &mut R,
        database: &Database,
        matches_per_spectrum: u32,
    ) -> Result<Vec<Match>, Error> {
        let count = self.match_total.min(matches_per_spectrum);
        let mut matches = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut m = Match::parse(r, database, self.charge)?;
            m.delta_cn = self.delta_cn;
            m.ln_delta_cn = self.ln_delta_cn;
            m.ln_experiment_size = self.ln_experiment_size;
            matches.push(m);
        }
        Ok(matches)
    }
}

/// Write one spectrum block: the block values, then up to `top_match`
/// matches, best first by `score_type`
pub fn write_block<W: Write>(
    w: &mut W,
    collection: &mut MatchCollection,
    top_match: u32,
    score_type: ScoreType,
) -> Result<(), Error> {
    let block = Block::of(collection);
    let matches = collection.sorted_iter(score_type)?;
    block.write(w)?;
    for m in matches.take(top_match as usize) {
        let m = m.borrow();
        log::trace!(
            "serializing match scan {} charge {} decoy {}",
            m.spectrum.scan,
            m.charge,
            m.decoy
        );
        m.serialize(w)?;
    }
    Ok(())
}

/// Writes the target file and every decoy file of one search
pub struct CsmWriter {
    files: Vec<(PathBuf, BufWriter<File>)>,
    spectra: Vec<i32>,
    top_match: u32,
}

impl CsmWriter {
    /// Create `<fileroot>.target.csm` and the decoy files in `directory`,
    /// writing their headers. Existing files are only replaced with
    /// `overwrite`.
    pub fn create<P: AsRef<Path>>(
        directory: P,
        fileroot: &str,
        num_decoy_files: usize,
        overwrite: bool,
        header: &Header,
    ) -> Result<Self, Error> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let names = std::iter::once(TARGET_SUFFIX.to_string())
            .chain((1..=num_decoy_files).map(|idx| decoy_suffix(idx, num_decoy_files)))
            .map(|suffix| directory.join(format!("{}.{}", fileroot, suffix)))
            .collect::<Vec<_>>();
        if !overwrite {
            if let Some(path) = names.iter().find(|path| path.exists()) {
                return Err(Error::FileExists(path.clone()));
            }
        }

        let unfinished = Header {
            total_spectra: -1,
            ..header.clone()
        };
        let mut files = Vec::with_capacity(names.len());
        for path in names {
            log::debug!("creating {}", path.display());
            let mut w = BufWriter::new(File::create(&path)?);
            unfinished.write(&mut w)?;
            files.push((path, w));
        }

        Ok(CsmWriter {
            spectra: vec![0; files.len()],
            files,
            top_match: header.matches_per_spectrum,
        })
    }

    /// Append a collection to file `index`: 0 is the target file, decoy
    /// files follow
    pub fn write(
        &mut self,
        index: usize,
        collection: &mut MatchCollection,
        score_type: ScoreType,
    ) -> Result<(), Error> {
        let sets = self.files.len();
        let (_, w) = self
            .files
            .get_mut(index)
            .ok_or(Error::NoSuchSet { index, sets })?;
        write_block(w, collection, self.top_match, score_type)?;
        self.spectra[index] += 1;
        Ok(())
    }

    /// Record the number of blocks in every header, and close the files
    pub fn finish(self) -> Result<Vec<PathBuf>, Error> {
        let mut paths = Vec::with_capacity(self.files.len());
        for ((path, mut w), count) in self.files.into_iter().zip(self.spectra) {
            w.seek(SeekFrom::Start(0))?;
            w.write_i32::<LittleEndian>(count)?;
            w.flush()?;
            log::info!("wrote {} spectra to {}", count, path.display());
            paths.push(path);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modification::ModPosition;

    fn header() -> Header {
        Header {
            total_spectra: 12,
            matches_per_spectrum: 5,
            mods: vec![AaMod {
                symbol: '*',
                mass_change: 15.9949,
                residues: "M".into(),
                max_per_peptide: 2,
                position: ModPosition::Any,
            }],
        }
    }

    fn block() -> Block {
        let mut scored = ScoreMap::default();
        scored[ScoreType::Sp] = true;
        scored[ScoreType::XCorr] = true;
        scored[ScoreType::PValue] = true;
        Block {
            charge: 3,
            match_total: 17,
            delta_cn: 0.125,
            ln_delta_cn: 0.125f32.ln(),
            ln_experiment_size: 812f32.ln(),
            scored,
        }
    }

    #[test]
    fn header_and_block_read_back() -> Result<(), Error> {
        let mut buf = Vec::new();
        header().write(&mut buf)?;
        block().write(&mut buf)?;
        assert_eq!(buf.len(), 16 + (1 + 4 + 4 + 1 + 4 + 1) + 20 + CSM_SCORED_FLAGS);

        let mut r = buf.as_slice();
        assert_eq!(Header::read(&mut r)?, header());
        assert_eq!(Block::read(&mut r)?, block());
        assert!(r.is_empty());
        Ok(())
    }

    #[test]
    fn trailing_score_types_are_not_stored() -> Result<(), Error> {
        let mut b = block();
        b.scored[ScoreType::DecoyXCorrQValue] = true;
        let mut buf = Vec::new();
        b.write(&mut buf)?;
        let read = Block::read(&mut buf.as_slice())?;
        assert!(!read.scored[ScoreType::DecoyXCorrQValue]);
        assert!(read.scored[ScoreType::PValue]);
        Ok(())
    }

    #[test]
    fn short_reads_are_corruption() -> Result<(), Error> {
        let mut buf = Vec::new();
        header().write(&mut buf)?;
        for len in [0, 3, 10, buf.len() - 1] {
            assert!(
                matches!(Header::read(&mut &buf[..len]), Err(Error::Corrupt(_))),
                "header truncated to {} bytes",
                len
            );
        }

        let mut buf = Vec::new();
        block().write(&mut buf)?;
        assert!(matches!(
            Block::read(&mut &buf[..buf.len() - 1]),
            Err(Error::Corrupt("spectrum block"))
        ));
        Ok(())
    }

    #[test]
    fn negative_block_values() -> Result<(), Error> {
        let mut buf = Vec::new();
        block().write(&mut buf)?;
        buf[0..4].copy_from_slice(&(-2i32).to_le_bytes());
        assert!(matches!(
            Block::read(&mut buf.as_slice()),
            Err(Error::Corrupt("block charge"))
        ));
        Ok(())
    }

    #[test]
    fn decoy_names() {
        assert_eq!(decoy_suffix(1, 1), "decoy.csm");
        assert_eq!(decoy_suffix(2, 3), "decoy-2.csm");
    }

    #[test]
    fn writer_rejects_unknown_sets() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let mut writer = CsmWriter::create(dir.path(), "run", 1, false, &header())?;
        let mut collection = MatchCollection::new(true);
        assert!(matches!(
            writer.write(2, &mut collection, ScoreType::XCorr),
            Err(Error::NoSuchSet { index: 2, sets: 2 })
        ));
        assert_eq!(writer.finish()?.len(), 2);
        Ok(())
    }

    #[test]
    fn writer_finishes_headers() -> Result<(), Error> {
        let dir = tempfile::tempdir()?;
        let writer = CsmWriter::create(dir.path(), "run", 2, false, &header())?;
        let paths = writer.finish()?;
        let names = paths
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(String::from))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["run.target.csm", "run.decoy-1.csm", "run.decoy-2.csm"]);

        for path in &paths {
            let header = Header::read(&mut File::open(path)?)?;
            assert_eq!(header.total_spectra, 0);
            assert_eq!(header.mods.len(), 1);
        }

        assert!(matches!(
            CsmWriter::create(dir.path(), "run", 2, false, &header()),
            Err(Error::FileExists(_))
        ));
        assert!(CsmWriter::create(dir.path(), "run", 2, true, &header()).is_ok());
        Ok(())
    }
}
