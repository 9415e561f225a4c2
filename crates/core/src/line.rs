//! Spectral line identifiers.
//!
//! A line label has the form `<Species>_<Wavelength>A[_<component>]`:
//!
//! ```text
//! H1_6563A        hydrogen Balmer alpha
//! O3_5006.8A_w1   first wide component of [OIII] 5007
//! He2_4686A
//! ```
//!
//! The species is an element symbol followed by its ionization stage, the
//! wavelength is the rest wavelength in angstroms and the optional component
//! is one lowercase letter followed by an index (`b1`, `w2`).

use crate::error::LineError;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Unit token terminating every wavelength label.
pub const WAVE_UNIT: &str = "A";

/// Species that emit through recombination; rendered without brackets.
pub const RECOMBINATION_SPECIES: [&str; 3] = ["H1", "He1", "He2"];

static SPECIES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)([0-9]+)$").expect("species pattern is valid")
});

static COMPONENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][0-9]+$").expect("component pattern is valid"));

/// A parsed line label. Immutable and derived purely from the label text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LineIdentifier {
    species: String,
    wavelength: String,
    component: Option<String>,
}

impl LineIdentifier {
    /// Parse a bare line label (no recipe suffix).
    pub fn parse(label: &str) -> Result<Self, LineError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(LineError::Empty);
        }

        let mut tokens = label.split('_');
        let species = tokens.next().unwrap_or_default();
        if species.is_empty() {
            return Err(LineError::EmptySpecies {
                label: label.into(),
            });
        }
        if !SPECIES_RE.is_match(species) {
            return Err(LineError::InvalidSpecies {
                label: label.into(),
                species: species.into(),
            });
        }

        let wave_token = tokens.next().unwrap_or_default();
        let wavelength = parse_wavelength(wave_token).ok_or_else(|| {
            LineError::InvalidWavelength {
                label: label.into(),
                token: wave_token.into(),
            }
        })?;

        let component = match (tokens.next(), tokens.next()) {
            (None, _) => None,
            (Some(comp), None) if COMPONENT_RE.is_match(comp) => Some(comp.to_string()),
            (Some(comp), None) => {
                return Err(LineError::UnknownSuffix {
                    label: label.into(),
                    suffix: comp.into(),
                });
            }
            (Some(_), Some(_)) => {
                let rest = label
                    .splitn(3, '_')
                    .nth(2)
                    .unwrap_or_default()
                    .to_string();
                return Err(LineError::UnknownSuffix {
                    label: label.into(),
                    suffix: rest,
                });
            }
        };

        Ok(Self {
            species: species.into(),
            wavelength: wavelength.into(),
            component,
        })
    }

    /// Species token, e.g. `O3`.
    pub fn species(&self) -> &str {
        &self.species
    }

    /// Wavelength label as written, without the unit, e.g. `5006.8`.
    pub fn wavelength_label(&self) -> &str {
        &self.wavelength
    }

    /// Rest wavelength in angstroms.
    pub fn rest_wavelength(&self) -> f64 {
        // Validated at construction.
        self.wavelength.parse().unwrap_or(f64::NAN)
    }

    /// Component suffix, e.g. `w1`.
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// The same transition without its component suffix.
    pub fn base(&self) -> Self {
        Self {
            species: self.species.clone(),
            wavelength: self.wavelength.clone(),
            component: None,
        }
    }

    /// Element symbol and ionization stage, e.g. `("O", 3)`.
    pub fn ion(&self) -> (&str, u32) {
        match SPECIES_RE.captures(&self.species) {
            Some(caps) => {
                let atom = caps.get(1).map_or("", |m| m.as_str());
                let stage = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);
                (atom, stage)
            }
            None => (&self.species, 0),
        }
    }

    /// Classical spectroscopic label, e.g. `[OIII]5007Å` or `HI6563Å-w1`.
    ///
    /// Species listed in `recombination` are rendered without the forbidden
    /// line brackets.
    pub fn transition_label(&self, recombination: &[impl AsRef<str>]) -> String {
        let (atom, stage) = self.ion();
        let ion = format!("{atom}{}", int_to_roman(stage));
        let recomb = recombination.iter().any(|s| s.as_ref() == self.species);
        let mut label = if recomb {
            format!("{ion}{}Å", self.wavelength)
        } else {
            format!("[{ion}]{}Å", self.wavelength)
        };
        if let Some(comp) = &self.component {
            label.push('-');
            label.push_str(comp);
        }
        label
    }
}

fn parse_wavelength(token: &str) -> Option<&str> {
    let number = token.strip_suffix(WAVE_UNIT)?;
    let value: f64 = number.parse().ok()?;
    if value.is_finite() && value > 0.0 && !number.starts_with(['+', '-']) {
        Some(number)
    } else {
        None
    }
}

/// Roman numeral for an ionization stage.
pub fn int_to_roman(mut num: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while num >= value {
            out.push_str(symbol);
            num -= value;
        }
    }
    out
}

impl fmt::Display for LineIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}{}", self.species, self.wavelength, WAVE_UNIT)?;
        if let Some(comp) = &self.component {
            write!(f, "_{comp}")?;
        }
        Ok(())
    }
}

impl FromStr for LineIdentifier {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LineIdentifier {
    type Error = LineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<LineIdentifier> for String {
    fn from(id: LineIdentifier) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_label() {
        let id = LineIdentifier::parse("H1_6563A").unwrap();
        assert_eq!(id.species(), "H1");
        assert_eq!(id.wavelength_label(), "6563");
        assert_eq!(id.component(), None);
        assert_eq!(id.rest_wavelength(), 6563.0);
        assert_eq!(id.to_string(), "H1_6563A");
    }

    #[test]
    fn parses_decimal_wavelength_and_component() {
        let id = LineIdentifier::parse("O3_5006.8A_w1").unwrap();
        assert_eq!(id.species(), "O3");
        assert_eq!(id.rest_wavelength(), 5006.8);
        assert_eq!(id.component(), Some("w1"));
        assert_eq!(id.base().to_string(), "O3_5006.8A");
        assert_eq!(id.to_string(), "O3_5006.8A_w1");
    }

    #[test]
    fn rejects_non_numeric_wavelength() {
        assert!(matches!(
            LineIdentifier::parse("O3_50x7A"),
            Err(LineError::InvalidWavelength { .. })
        ));
        assert!(matches!(
            LineIdentifier::parse("O3_5007"),
            Err(LineError::InvalidWavelength { .. })
        ));
        assert!(matches!(
            LineIdentifier::parse("O3_nanA"),
            Err(LineError::InvalidWavelength { .. })
        ));
    }

    #[test]
    fn rejects_empty_species() {
        assert!(matches!(
            LineIdentifier::parse("_5007A"),
            Err(LineError::EmptySpecies { .. })
        ));
        assert!(matches!(
            LineIdentifier::parse("O_5007A"),
            Err(LineError::InvalidSpecies { .. })
        ));
    }

    #[test]
    fn recipe_tokens_are_not_components() {
        assert!(matches!(
            LineIdentifier::parse("H1_6563A_b"),
            Err(LineError::UnknownSuffix { .. })
        ));
        assert!(matches!(
            LineIdentifier::parse("H1_6563A_w1_amp"),
            Err(LineError::UnknownSuffix { .. })
        ));
    }

    #[test]
    fn transition_labels() {
        let o3 = LineIdentifier::parse("O3_5007A").unwrap();
        assert_eq!(o3.transition_label(&RECOMBINATION_SPECIES[..]), "[OIII]5007Å");

        let ha = LineIdentifier::parse("H1_6563A_w1").unwrap();
        assert_eq!(ha.transition_label(&RECOMBINATION_SPECIES[..]), "HI6563Å-w1");

        let he2 = LineIdentifier::parse("He2_4686A").unwrap();
        assert_eq!(he2.ion(), ("He", 2));
    }

    #[test]
    fn roman_numerals() {
        assert_eq!(int_to_roman(1), "I");
        assert_eq!(int_to_roman(4), "IV");
        assert_eq!(int_to_roman(9), "IX");
        assert_eq!(int_to_roman(14), "XIV");
    }

    #[test]
    fn serde_uses_label_text() {
        let id = LineIdentifier::parse("N2_6584A").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"N2_6584A\"");
        let back: LineIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
