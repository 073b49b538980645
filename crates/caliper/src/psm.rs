//! A single peptide-spectrum match, and its binary record inside `.csm`
//! files.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::csm::truncated;
use crate::database::{Database, ProteinIx};
use crate::mass::Residue;
use crate::peptide::{Peptide, PeptideSource};
use crate::score::{ScoreMap, ScoreType};
use crate::spectrum::Spectrum;
use crate::Error;

/// Matches are shared between every collection holding them, and dropped
/// with the last holder.
pub type MatchRef = Rc<RefCell<Match>>;

#[derive(Clone, Debug)]
pub struct Match {
    pub spectrum: Rc<Spectrum>,
    pub peptide: Peptide,
    pub charge: u8,
    pub decoy: bool,
    pub scores: ScoreMap<f32>,
    /// 0 until ranked
    pub ranks: ScoreMap<u32>,
    pub delta_cn: f32,
    pub ln_delta_cn: f32,
    pub ln_experiment_size: f32,
    pub ions_matched: u32,
    pub ions_possible: u32,
}

impl Match {
    pub fn new(spectrum: Rc<Spectrum>, peptide: Peptide, charge: u8, decoy: bool) -> Self {
        Match {
            spectrum,
            peptide,
            charge,
            decoy,
            scores: ScoreMap::default(),
            ranks: ScoreMap::default(),
            delta_cn: 0.0,
            ln_delta_cn: 0.0,
            ln_experiment_size: 0.0,
            ions_matched: 0,
            ions_possible: 0,
        }
    }

    pub fn shared(self) -> MatchRef {
        Rc::new(RefCell::new(self))
    }

    pub fn score(&self, score_type: ScoreType) -> f32 {
        self.scores[score_type]
    }

    pub fn rank(&self, score_type: ScoreType) -> u32 {
        self.ranks[score_type]
    }

    pub fn label(&self) -> i32 {
        match self.decoy {
            true => -1,
            false => 1,
        }
    }

    /// Candidates considered for this match's spectrum
    pub fn experiment_size(&self) -> usize {
        self.ln_experiment_size.exp().round() as usize
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.decoy as u8)?;
        w.write_u32::<LittleEndian>(self.spectrum.scan)?;
        w.write_f32::<LittleEndian>(self.spectrum.precursor_mz)?;
        for (_, score) in self.scores.iter() {
            w.write_f32::<LittleEndian>(score)?;
        }
        for (_, rank) in self.ranks.iter() {
            w.write_u32::<LittleEndian>(rank)?;
        }
        w.write_u32::<LittleEndian>(self.ions_matched)?;
        w.write_u32::<LittleEndian>(self.ions_possible)?;

        let peptide = &self.peptide;
        w.write_u16::<LittleEndian>(peptide.len() as u16)?;
        w.write_f32::<LittleEndian>(peptide.monoisotopic)?;
        w.write_u32::<LittleEndian>(peptide.sources.len() as u32)?;
        for src in &peptide.sources {
            w.write_u32::<LittleEndian>(src.protein.0)?;
            w.write_u32::<LittleEndian>(src.start)?;
        }
        let mods = peptide
            .sequence
            .iter()
            .enumerate()
            .filter_map(|(pos, r)| r.mass_change().map(|m| (pos as u16, m)))
            .collect::<Vec<_>>();
        w.write_u16::<LittleEndian>(mods.len() as u16)?;
        for (pos, mass) in mods {
            w.write_u16::<LittleEndian>(pos)?;
            w.write_f32::<LittleEndian>(mass)?;
        }
        Ok(())
    }

    /// Read one match record, resolving its peptide against `database`.
    /// Charge is not part of the record: it belongs to the enclosing block.
    pub fn parse<R: Read>(r: &mut R, database: &Database, charge: u8) -> Result<Self, Error> {
        let err = truncated("match record");
        let decoy = r.read_u8().map_err(&err)? != 0;
        let scan = r.read_u32::<LittleEndian>().map_err(&err)?;
        let precursor_mz = r.read_f32::<LittleEndian>().map_err(&err)?;

        let mut scores = ScoreMap::<f32>::default();
        for ty in ScoreType::ALL {
            scores[ty] = r.read_f32::<LittleEndian>().map_err(&err)?;
        }
        let mut ranks = ScoreMap::<u32>::default();
        for ty in ScoreType::ALL {
            ranks[ty] = r.read_u32::<LittleEndian>().map_err(&err)?;
        }
        let ions_matched = r.read_u32::<LittleEndian>().map_err(&err)?;
        let ions_possible = r.read_u32::<LittleEndian>().map_err(&err)?;

        let len = r.read_u16::<LittleEndian>().map_err(&err)? as usize;
        let monoisotopic = r.read_f32::<LittleEndian>().map_err(&err)?;
        let num_sources = r.read_u32::<LittleEndian>().map_err(&err)?;
        let mut sources = Vec::with_capacity(num_sources.min(1024) as usize);
        for _ in 0..num_sources {
            let protein = ProteinIx(r.read_u32::<LittleEndian>().map_err(&err)?);
            let start = r.read_u32::<LittleEndian>().map_err(&err)?;
            sources.push(PeptideSource { protein, start });
        }

        let residues = sources
            .first()
            .and_then(|src| database.residues(src, len))
            .ok_or(Error::Corrupt("peptide reference"))?;
        if sources
            .iter()
            .any(|src| database.residues(src, len).is_none())
        {
            return Err(Error::Corrupt("peptide reference"));
        }
        let mut sequence = residues
            .iter()
            .map(|aa| Residue::Just(*aa))
            .collect::<Vec<_>>();

        let num_mods = r.read_u16::<LittleEndian>().map_err(&err)?;
        for _ in 0..num_mods {
            let pos = r.read_u16::<LittleEndian>().map_err(&err)? as usize;
            let mass = r.read_f32::<LittleEndian>().map_err(&err)?;
            match sequence.get_mut(pos) {
                Some(residue) => *residue = Residue::Mod(residue.amino_acid(), mass),
                None => return Err(Error::Corrupt("peptide modification")),
            }
        }

        let peptide = Peptide {
            decoy,
            sequence,
            monoisotopic,
            sources,
        };
        let mut m = Match::new(
            Rc::new(Spectrum::new(scan, precursor_mz)),
            peptide,
            charge,
            decoy,
        );
        m.scores = scores;
        m.ranks = ranks;
        m.ions_matched = ions_matched;
        m.ions_possible = ions_possible;
        Ok(m)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fasta::Fasta;

    fn database() -> Database {
        Database::new(Fasta::parse(
            ">sp|P1\nMKTAYLLKPEPTIDER\n>sp|P2\nGGPEPTIDERK\n".into(),
            "rev_",
        ))
    }

    fn example() -> Match {
        let mut sequence = b"PEPTIDER"
            .iter()
            .map(|aa| Residue::Just(*aa))
            .collect::<Vec<_>>();
        sequence[3] = Residue::Mod(b'T', 79.96633);
        let peptide = Peptide::new(
            sequence,
            false,
            vec![
                PeptideSource {
                    protein: ProteinIx(0),
                    start: 8,
                },
                PeptideSource {
                    protein: ProteinIx(1),
                    start: 2,
                },
            ],
        );
        let mut m = Match::new(Rc::new(Spectrum::new(1043, 512.25)), peptide, 2, false);
        m.scores[ScoreType::Sp] = 312.5;
        m.scores[ScoreType::XCorr] = 2.75;
        m.ranks[ScoreType::Sp] = 3;
        m.ranks[ScoreType::XCorr] = 1;
        m.ions_matched = 9;
        m.ions_possible = 14;
        m
    }

    #[test]
    fn record_resolves_against_database() -> Result<(), Error> {
        let db = database();
        let m = example();
        let mut buf = Vec::new();
        m.serialize(&mut buf)?;

        let parsed = Match::parse(&mut buf.as_slice(), &db, 2)?;
        assert_eq!(parsed.peptide, m.peptide);
        assert_eq!(parsed.peptide.to_string(), "PEPT[+79.96633]IDER");
        assert_eq!(parsed.scores, m.scores);
        assert_eq!(parsed.ranks, m.ranks);
        assert_eq!(parsed.spectrum.scan, 1043);
        assert_eq!(parsed.charge, 2);
        assert_eq!((parsed.ions_matched, parsed.ions_possible), (9, 14));
        Ok(())
    }

    #[test]
    fn short_record() -> std::io::Result<()> {
        let db = database();
        let mut buf = Vec::new();
        example().serialize(&mut buf)?;
        buf.truncate(buf.len() - 3);
        assert!(matches!(
            Match::parse(&mut buf.as_slice(), &db, 2),
            Err(Error::Corrupt("match record"))
        ));
        Ok(())
    }

    #[test]
    fn dangling_peptide_reference() -> std::io::Result<()> {
        let db = Database::new(Fasta::parse(">sp|P1\nMKTAYLLKPEPTIDER\n".into(), "rev_"));
        let mut buf = Vec::new();
        example().serialize(&mut buf)?;
        assert!(matches!(
            Match::parse(&mut buf.as_slice(), &db, 2),
            Err(Error::Corrupt("peptide reference"))
        ));
        Ok(())
    }
}
