use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::mass::VALID_AA;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModPosition {
    #[default]
    Any,
    /// Peptide N-terminal residue only
    NTerm,
    /// Peptide C-terminal residue only
    CTerm,
}

impl ModPosition {
    fn code(self) -> u8 {
        match self {
            ModPosition::Any => 0,
            ModPosition::NTerm => 1,
            ModPosition::CTerm => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ModPosition::Any),
            1 => Some(ModPosition::NTerm),
            2 => Some(ModPosition::CTerm),
            _ => None,
        }
    }
}

/// A variable amino acid modification, as configured for a search.
///
/// The full table is written into every `.csm` header, and must match the
/// table of the run that reads the file back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AaMod {
    /// Character appended to modified residues in text output
    pub symbol: char,
    pub mass_change: f32,
    /// Residues this modification may be applied to
    pub residues: String,
    #[serde(default = "default_max_per_peptide")]
    pub max_per_peptide: u32,
    #[serde(default)]
    pub position: ModPosition,
}

fn default_max_per_peptide() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidModification {
    Empty,
    InvalidResidue(char),
    InvalidSymbol(char),
}

impl AaMod {
    pub fn validate(&self) -> Result<(), InvalidModification> {
        if self.residues.is_empty() {
            return Err(InvalidModification::Empty);
        }
        if !self.symbol.is_ascii() || self.symbol.is_ascii_alphanumeric() {
            return Err(InvalidModification::InvalidSymbol(self.symbol));
        }
        match self.residues.chars().find(|c| !VALID_AA.contains(&(*c as u8))) {
            Some(c) => Err(InvalidModification::InvalidResidue(c)),
            None => Ok(()),
        }
    }

    pub fn applies_to(&self, residue: u8) -> bool {
        self.residues.as_bytes().contains(&residue)
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u8(self.symbol as u8)?;
        w.write_f32::<LittleEndian>(self.mass_change)?;
        w.write_u32::<LittleEndian>(self.max_per_peptide)?;
        w.write_u8(self.position.code())?;
        w.write_u32::<LittleEndian>(self.residues.len() as u32)?;
        w.write_all(self.residues.as_bytes())
    }

    /// Returns `Ok(None)` when the record is structurally invalid
    pub fn parse<R: Read>(r: &mut R) -> std::io::Result<Option<Self>> {
        let symbol = r.read_u8()? as char;
        let mass_change = r.read_f32::<LittleEndian>()?;
        let max_per_peptide = r.read_u32::<LittleEndian>()?;
        let position = r.read_u8()?;
        let len = r.read_u32::<LittleEndian>()? as usize;
        if len > VALID_AA.len() {
            return Ok(None);
        }
        let mut residues = vec![0u8; len];
        r.read_exact(&mut residues)?;

        let (position, residues) = match (
            ModPosition::from_code(position),
            String::from_utf8(residues),
        ) {
            (Some(p), Ok(r)) => (p, r),
            _ => return Ok(None),
        };
        Ok(Some(AaMod {
            symbol,
            mass_change,
            residues,
            max_per_peptide,
            position,
        }))
    }
}

/// Drop (and report) modifications that cannot be applied
pub fn validate_mods(input: Option<Vec<AaMod>>) -> Vec<AaMod> {
    let mut output: Vec<AaMod> = Vec::new();
    for m in input.into_iter().flatten() {
        match m.validate() {
            Ok(()) if output.iter().any(|o| o.symbol == m.symbol) => {
                log::error!("Skipping modification: symbol `{}` is already in use", m.symbol)
            }
            Ok(()) => output.push(m),
            Err(InvalidModification::Empty) => {
                log::error!("Skipping invalid modification: no residues given")
            }
            Err(InvalidModification::InvalidResidue(c)) => {
                log::error!(
                    "Skipping invalid modification: unrecognized residue ({})",
                    c
                )
            }
            Err(InvalidModification::InvalidSymbol(c)) => {
                log::error!("Skipping invalid modification: bad symbol ({})", c)
            }
        }
    }
    output
}
