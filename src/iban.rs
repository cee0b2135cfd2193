//! IBAN parsing and validation.
//!
//! An IBAN is a country code, two check digits and a country-specific BBAN.
//! Validation checks the overall shape, the length registered for the
//! country and the ISO 7064 mod-97 checksum. For countries with a known BBAN
//! layout the BBAN is then split into the national components used to build
//! the OFX account block; elsewhere the whole BBAN is the account code.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One national field of a BBAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Bank(usize),
    Branch(usize),
    Account(usize),
    Check(usize),
}

/// BBAN layout for a country, fields in order of appearance. The parts add
/// up to the registered IBAN length minus four.
struct Layout {
    country: &'static str,
    parts: &'static [Part],
}

const LAYOUTS: &[Layout] = &[
    Layout { country: "FR", parts: &[Part::Bank(5), Part::Branch(5), Part::Account(11), Part::Check(2)] },
    Layout { country: "MC", parts: &[Part::Bank(5), Part::Branch(5), Part::Account(11), Part::Check(2)] },
    Layout { country: "DE", parts: &[Part::Bank(8), Part::Account(10)] },
    Layout { country: "ES", parts: &[Part::Bank(4), Part::Branch(4), Part::Check(2), Part::Account(10)] },
    Layout { country: "IT", parts: &[Part::Check(1), Part::Bank(5), Part::Branch(5), Part::Account(12)] },
    Layout { country: "BE", parts: &[Part::Bank(3), Part::Account(7), Part::Check(2)] },
    Layout { country: "NL", parts: &[Part::Bank(4), Part::Account(10)] },
    Layout { country: "GB", parts: &[Part::Bank(4), Part::Branch(6), Part::Account(8)] },
];

/// IBAN length per country, from the SWIFT IBAN registry.
const LENGTHS: &[(&str, usize)] = &[
    ("AD", 24), ("AE", 23), ("AL", 28), ("AT", 20), ("AZ", 28), ("BA", 20), ("BE", 16),
    ("BG", 22), ("BH", 22), ("BR", 29), ("BY", 28), ("CH", 21), ("CR", 22), ("CY", 28),
    ("CZ", 24), ("DE", 22), ("DK", 18), ("DO", 28), ("EE", 20), ("EG", 29), ("ES", 24),
    ("FI", 18), ("FO", 18), ("FR", 27), ("GB", 22), ("GE", 22), ("GI", 23), ("GL", 18),
    ("GR", 27), ("GT", 28), ("HR", 21), ("HU", 28), ("IE", 22), ("IL", 23), ("IQ", 23),
    ("IS", 26), ("IT", 27), ("JO", 30), ("KW", 30), ("KZ", 20), ("LB", 28), ("LC", 32),
    ("LI", 21), ("LT", 20), ("LU", 20), ("LV", 21), ("MC", 27), ("MD", 24), ("ME", 22),
    ("MK", 19), ("MR", 27), ("MT", 31), ("MU", 30), ("NL", 18), ("NO", 15), ("PK", 24),
    ("PL", 28), ("PS", 29), ("PT", 25), ("QA", 29), ("RO", 24), ("RS", 22), ("SA", 24),
    ("SC", 31), ("SE", 24), ("SI", 19), ("SK", 24), ("SM", 27), ("ST", 25), ("SV", 28),
    ("TL", 23), ("TN", 24), ("TR", 26), ("UA", 29), ("VA", 22), ("VG", 24), ("XK", 20),
];

fn registered_length(country: &str) -> Option<usize> {
    LENGTHS.iter().find(|(c, _)| *c == country).map(|(_, len)| *len)
}

/// A validated IBAN split into its national components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iban {
    compact: String,
    bank_code: String,
    branch_code: String,
    account_code: String,
    national_check: String,
}

impl Iban {
    /// Parse and validate an IBAN. Spaces are ignored and letters are
    /// upper-cased before validation.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidIban(input.to_string());

        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if compact.len() < 5 || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        let (country, rest) = compact.split_at(2);
        if !country.chars().all(|c| c.is_ascii_uppercase())
            || !rest[..2].chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let length = registered_length(country).ok_or_else(invalid)?;
        if compact.len() != length || mod97(&compact) != 1 {
            return Err(invalid());
        }

        let mut iban = Iban {
            compact: compact.clone(),
            bank_code: String::new(),
            branch_code: String::new(),
            account_code: String::new(),
            national_check: String::new(),
        };

        let Some(layout) = LAYOUTS.iter().find(|l| l.country == country) else {
            iban.account_code = iban.bban().to_string();
            return Ok(iban);
        };

        let mut offset = 4;
        for part in layout.parts {
            let (len, field) = match *part {
                Part::Bank(n) => (n, &mut iban.bank_code),
                Part::Branch(n) => (n, &mut iban.branch_code),
                Part::Account(n) => (n, &mut iban.account_code),
                Part::Check(n) => (n, &mut iban.national_check),
            };
            field.push_str(&compact[offset..offset + len]);
            offset += len;
        }

        Ok(iban)
    }

    /// The IBAN without spaces, upper-case.
    pub fn as_str(&self) -> &str {
        &self.compact
    }

    /// ISO 3166 country code.
    pub fn country_code(&self) -> &str {
        &self.compact[..2]
    }

    /// The two IBAN check digits.
    pub fn check_digits(&self) -> &str {
        &self.compact[2..4]
    }

    /// Basic bank account number, the national part of the IBAN.
    pub fn bban(&self) -> &str {
        &self.compact[4..]
    }

    pub fn bank_code(&self) -> &str {
        &self.bank_code
    }

    /// Branch (sort) code, empty for countries without one.
    pub fn branch_code(&self) -> &str {
        &self.branch_code
    }

    pub fn account_code(&self) -> &str {
        &self.account_code
    }

    /// National check key (the French RIB key for instance), empty when the
    /// country has none.
    pub fn national_check(&self) -> &str {
        &self.national_check
    }
}

impl FromStr for Iban {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Iban::parse(s)
    }
}

impl fmt::Display for Iban {
    /// Prints the IBAN in groups of four characters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.compact.chars().enumerate() {
            if i > 0 && i % 4 == 0 {
                f.write_str(" ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// ISO 7064 mod-97-10 over the rearranged IBAN, letters expanded to 10..=35.
fn mod97(compact: &str) -> u32 {
    let rearranged = compact[4..].chars().chain(compact[..4].chars());
    let mut remainder = 0u32;
    for c in rearranged {
        // to_digit(36) maps '0'..='9' to 0..=9 and 'A'..='Z' to 10..=35
        let value = c.to_digit(36).unwrap_or(0);
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder
}
