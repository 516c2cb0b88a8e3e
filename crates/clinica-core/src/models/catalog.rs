//! Medication catalog models.

use serde::{Deserialize, Serialize};

use super::attendance::Medication;

/// A medication available for catalog-backed prescriptions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogMedication {
    /// Catalog ID
    pub id: i64,
    /// Generic or commercial name
    pub name: String,
    /// Presentation, e.g. "500mg comprimido"
    pub presentation: Option<String>,
    /// Alternative names used when searching
    pub aliases: Vec<String>,
    /// Whether the item can still be prescribed
    pub active: bool,
}

impl CatalogMedication {
    pub fn new(id: i64, name: String) -> Self {
        Self {
            id,
            name,
            presentation: None,
            aliases: Vec::new(),
            active: true,
        }
    }

    /// Name with presentation, as printed on prescriptions.
    pub fn display_name(&self) -> String {
        match &self.presentation {
            Some(p) if !p.trim().is_empty() => format!("{} {}", self.name, p.trim()),
            _ => self.name.clone(),
        }
    }

    /// Reference used inside a prescription line.
    pub fn as_medication(&self) -> Medication {
        Medication::Catalog {
            id: self.id,
            name: self.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut item = CatalogMedication::new(1, "Dipirona".into());
        assert_eq!(item.display_name(), "Dipirona");

        item.presentation = Some(" 500mg comprimido ".into());
        assert_eq!(item.display_name(), "Dipirona 500mg comprimido");
        assert_eq!(item.as_medication().catalog_id(), Some(1));
    }
}
