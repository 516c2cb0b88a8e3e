//! Odontogram (dental chart) selections.
//!
//! Teeth use FDI two-digit numbering: the tens digit is the quadrant
//! (1–4 permanent, 5–8 deciduous), the units digit the position from the midline.
//! The quadrant of a selection is always derived from the tooth number, including
//! when a selection is deserialized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Odontogram errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdontogramError {
    #[error("Tooth {0} is not a valid FDI tooth number")]
    InvalidTooth(u8),

    #[error("Entry keyed {key} describes tooth {tooth}")]
    KeyMismatch { key: u8, tooth: u8 },
}

/// Tooth surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Face {
    /// Vestibular
    V,
    /// Mesial
    M,
    /// Distal
    D,
    /// Lingual / palatal
    L,
    /// Occlusal / incisal
    O,
}

impl Face {
    pub const ALL: [Face; 5] = [Face::V, Face::M, Face::D, Face::L, Face::O];
}

/// Dentition a tooth belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dentition {
    Permanent,
    Deciduous,
}

/// Check whether a number is a valid FDI tooth.
pub fn is_fdi_tooth(tooth: u8) -> bool {
    dentition(tooth).is_some()
}

/// Dentition of a valid FDI tooth number.
pub fn dentition(tooth: u8) -> Option<Dentition> {
    let quadrant = tooth / 10;
    let position = tooth % 10;
    match quadrant {
        1..=4 if (1..=8).contains(&position) => Some(Dentition::Permanent),
        5..=8 if (1..=5).contains(&position) => Some(Dentition::Deciduous),
        _ => None,
    }
}

/// Quadrant of a tooth number.
pub fn quadrant(tooth: u8) -> u8 {
    tooth / 10
}

/// All valid FDI tooth numbers in chart order.
pub fn fdi_teeth() -> impl Iterator<Item = u8> {
    (11u8..=85).filter(|t| is_fdi_tooth(*t))
}

/// Editable contents of a tooth dialog, before it is attached to a tooth.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToothDraft {
    pub faces: Vec<Face>,
    pub procedures: Vec<String>,
    pub notes: String,
}

/// Annotations recorded for one tooth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ToothSelectionRepr", into = "ToothSelectionRepr")]
pub struct ToothSelection {
    tooth: u8,
    faces: Vec<Face>,
    procedures: Vec<String>,
    notes: String,
}

/// Wire shape. `quadrant` is written for readers but ignored on input.
#[derive(Serialize, Deserialize)]
struct ToothSelectionRepr {
    tooth: u8,
    #[serde(default)]
    quadrant: u8,
    #[serde(default)]
    faces: Vec<Face>,
    #[serde(default)]
    procedures: Vec<String>,
    #[serde(default)]
    notes: String,
}

impl From<ToothSelectionRepr> for ToothSelection {
    fn from(repr: ToothSelectionRepr) -> Self {
        Self {
            tooth: repr.tooth,
            faces: repr.faces,
            procedures: repr.procedures,
            notes: repr.notes,
        }
    }
}

impl From<ToothSelection> for ToothSelectionRepr {
    fn from(sel: ToothSelection) -> Self {
        Self {
            quadrant: sel.quadrant(),
            tooth: sel.tooth,
            faces: sel.faces,
            procedures: sel.procedures,
            notes: sel.notes,
        }
    }
}

impl ToothSelection {
    fn from_draft(tooth: u8, draft: ToothDraft) -> Self {
        let mut faces = draft.faces;
        faces.sort();
        faces.dedup();
        Self {
            tooth,
            faces,
            procedures: draft.procedures,
            notes: draft.notes,
        }
    }

    pub fn tooth(&self) -> u8 {
        self.tooth
    }

    pub fn quadrant(&self) -> u8 {
        quadrant(self.tooth)
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn procedures(&self) -> &[String] {
        &self.procedures
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// A tooth is highlighted when anything was recorded for it.
    pub fn is_selected(&self) -> bool {
        !self.faces.is_empty() || !self.procedures.is_empty() || !self.notes.trim().is_empty()
    }
}

/// Per-tooth selections of one attendance, keyed by tooth number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<u8, ToothSelection>",
    into = "BTreeMap<u8, ToothSelection>"
)]
pub struct ToothSelectionsMap {
    teeth: BTreeMap<u8, ToothSelection>,
}

impl TryFrom<BTreeMap<u8, ToothSelection>> for ToothSelectionsMap {
    type Error = OdontogramError;

    fn try_from(teeth: BTreeMap<u8, ToothSelection>) -> Result<Self, Self::Error> {
        for (key, sel) in &teeth {
            Self::check(*key)?;
            if sel.tooth != *key {
                return Err(OdontogramError::KeyMismatch {
                    key: *key,
                    tooth: sel.tooth,
                });
            }
        }
        Ok(Self { teeth })
    }
}

impl From<ToothSelectionsMap> for BTreeMap<u8, ToothSelection> {
    fn from(map: ToothSelectionsMap) -> Self {
        map.teeth
    }
}

impl ToothSelectionsMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(tooth: u8) -> Result<(), OdontogramError> {
        if is_fdi_tooth(tooth) {
            Ok(())
        } else {
            Err(OdontogramError::InvalidTooth(tooth))
        }
    }

    /// Replace the whole entry for a tooth (dialog "save").
    pub fn replace(&mut self, tooth: u8, draft: ToothDraft) -> Result<(), OdontogramError> {
        Self::check(tooth)?;
        self.teeth
            .insert(tooth, ToothSelection::from_draft(tooth, draft));
        Ok(())
    }

    /// Merge a draft into the existing entry.
    ///
    /// Faces are unioned, new procedures appended without duplicates and notes
    /// replaced only when the draft carries non-blank notes.
    pub fn merge(&mut self, tooth: u8, draft: ToothDraft) -> Result<(), OdontogramError> {
        Self::check(tooth)?;
        let Some(existing) = self.teeth.get_mut(&tooth) else {
            return self.replace(tooth, draft);
        };

        existing.faces.extend(draft.faces);
        existing.faces.sort();
        existing.faces.dedup();

        for procedure in draft.procedures {
            if !existing.procedures.contains(&procedure) {
                existing.procedures.push(procedure);
            }
        }

        if !draft.notes.trim().is_empty() {
            existing.notes = draft.notes;
        }
        Ok(())
    }

    /// Remove one procedure from a tooth.
    ///
    /// The entry is dropped once nothing remains recorded for the tooth.
    /// Returns `true` if the procedure was present.
    pub fn remove_procedure(&mut self, tooth: u8, procedure: &str) -> bool {
        let Some(existing) = self.teeth.get_mut(&tooth) else {
            return false;
        };
        let before = existing.procedures.len();
        existing.procedures.retain(|p| p != procedure);
        let removed = existing.procedures.len() != before;

        if !existing.is_selected() {
            self.teeth.remove(&tooth);
        }
        removed
    }

    /// Drop everything recorded for a tooth.
    pub fn clear(&mut self, tooth: u8) -> Option<ToothSelection> {
        self.teeth.remove(&tooth)
    }

    pub fn get(&self, tooth: u8) -> Option<&ToothSelection> {
        self.teeth.get(&tooth)
    }

    pub fn is_selected(&self, tooth: u8) -> bool {
        self.teeth.get(&tooth).is_some_and(ToothSelection::is_selected)
    }

    /// Selected teeth in FDI order.
    pub fn selected(&self) -> impl Iterator<Item = &ToothSelection> {
        self.teeth.values().filter(|s| s.is_selected())
    }

    /// Selections in one quadrant.
    pub fn in_quadrant(&self, q: u8) -> impl Iterator<Item = &ToothSelection> {
        self.teeth.values().filter(move |s| s.quadrant() == q)
    }

    /// Every procedure recorded, as (tooth, procedure) pairs.
    pub fn procedures(&self) -> Vec<(u8, &str)> {
        self.teeth
            .values()
            .flat_map(|s| s.procedures.iter().map(move |p| (s.tooth, p.as_str())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.teeth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teeth.is_empty()
    }
}
