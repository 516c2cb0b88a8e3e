//! Patient registry models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Registered sex.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sex {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "O")]
    Other,
}

impl Sex {
    /// Single-letter code used in storage and on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Female => "F",
            Sex::Male => "M",
            Sex::Other => "O",
        }
    }

    /// Parse a stored code. Accepts the full Portuguese words as well.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "F" | "FEMININO" => Some(Sex::Female),
            "M" | "MASCULINO" => Some(Sex::Male),
            "O" | "OUTRO" => Some(Sex::Other),
            _ => None,
        }
    }
}

/// Postal address. Every field is optional because registration allows partial addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    /// Two-letter state code (UF), e.g. "MG"
    pub state: Option<String>,
    /// Postal code (CEP)
    pub cep: Option<String>,
}

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Store-assigned numeric ID (0 until inserted)
    pub id: i64,
    /// Full name
    pub name: String,
    /// CPF, stored as typed (mask optional)
    pub cpf: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    pub birth_date: Option<String>,
    pub sex: Option<Sex>,
    /// Blood type, e.g. "O+"
    pub blood_type: Option<String>,
    /// First parent/guardian name (filiação 1)
    pub parent1: Option<String>,
    /// Second parent/guardian name (filiação 2)
    pub parent2: Option<String>,
    pub address: Address,
    /// Reference farm or rural community used to locate the patient
    pub reference_farm: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new, not yet stored patient.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: 0,
            name,
            cpf: None,
            birth_date: None,
            sex: None,
            blood_type: None,
            parent1: None,
            parent2: None,
            address: Address::default(),
            reference_farm: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Check whether the store has assigned an ID.
    pub fn is_registered(&self) -> bool {
        self.id > 0
    }

    /// Medical record number (prontuário) shown on triage and documents.
    pub fn record_number(&self) -> String {
        format!("{:06}", self.id)
    }

    /// CPF reduced to its digits.
    pub fn cpf_digits(&self) -> Option<String> {
        self.cpf.as_deref().map(only_digits)
    }

    /// Age in full years on the given date.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = NaiveDate::parse_from_str(self.birth_date.as_deref()?, "%Y-%m-%d").ok()?;
        if birth > today {
            return None;
        }
        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Keep only ASCII digits.
pub fn only_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate a CPF using its two check digits. Mask characters are ignored.
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 {
        return false;
    }
    // Repeated-digit sequences pass the checksum but are never issued
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rest = (sum * 10) % 11;
        if rest == 10 {
            0
        } else {
            rest
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}
