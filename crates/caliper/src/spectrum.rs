use serde::Serialize;

use crate::mass::PROTON;

/// A charge-less peak at monoisotopic mass
#[derive(PartialEq, PartialOrd, Copy, Clone, Default, Debug, Serialize)]
pub struct Peak {
    pub mass: f32,
    pub intensity: f32,
}

/// The parts of an MS2 scan the match machinery needs. Peak picking and
/// preprocessing happen upstream.
#[derive(Clone, Default, Debug, Serialize)]
pub struct Spectrum {
    /// First scan number
    pub scan: u32,
    pub precursor_mz: f32,
    /// MS peaks, sorted by mass in ascending order. Empty when the spectrum
    /// was rebuilt from a `.csm` record.
    pub peaks: Vec<Peak>,
}

impl Spectrum {
    pub fn new(scan: u32, precursor_mz: f32) -> Self {
        Spectrum {
            scan,
            precursor_mz,
            peaks: Vec::new(),
        }
    }

    /// Uncharged precursor mass, assuming `charge`
    pub fn neutral_mass(&self, charge: u8) -> f32 {
        (self.precursor_mz - PROTON) * charge as f32
    }

    /// Singly-protonated precursor mass, assuming `charge`
    pub fn singly_charged_mass(&self, charge: u8) -> f32 {
        self.neutral_mass(charge) + PROTON
    }
}
