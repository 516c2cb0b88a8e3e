//! Multi-select filters for queue, triage and patient lists.
//!
//! Categories combine with AND, values inside a category with OR, and an empty
//! category does not filter.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::normalizer::fold;
use crate::models::{only_digits, FlowStatus, Patient, PatientFlow, QueueMembership, Sex, Triage};

/// Something that can be listed on a filtered screen.
pub trait Filterable {
    /// Fields matched by the free-text query (name, ID, CPF, ...).
    fn search_fields(&self) -> Vec<String>;

    /// CPF digits, matched when the query looks like a CPF.
    fn cpf_digits(&self) -> Option<String> {
        None
    }

    fn specialty_ids(&self) -> Vec<i64> {
        Vec::new()
    }

    fn sex(&self) -> Option<Sex> {
        None
    }

    /// State (UF) code.
    fn state(&self) -> Option<String> {
        None
    }

    /// Sort key for display order.
    fn created_at(&self) -> &str;
}

/// Filter state of a list screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilter {
    pub query: String,
    pub specialties: BTreeSet<i64>,
    pub sexes: BTreeSet<Sex>,
    pub states: BTreeSet<String>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_specialty(mut self, id: i64) -> Self {
        self.specialties.insert(id);
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sexes.insert(sex);
        self
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.states.insert(normalize_state(state));
        self
    }

    /// Check whether nothing is selected.
    pub fn is_empty(&self) -> bool {
        fold(&self.query).is_empty()
            && self.specialties.is_empty()
            && self.sexes.is_empty()
            && self.states.is_empty()
    }

    /// Check one item against every category.
    pub fn matches<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.matches_query(item)
            && self.matches_specialties(item)
            && self.matches_sex(item)
            && self.matches_state(item)
    }

    fn matches_query<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        let needle = fold(&self.query);
        if needle.is_empty() {
            return true;
        }
        if item
            .search_fields()
            .iter()
            .any(|field| fold(field).contains(&needle))
        {
            return true;
        }

        // "123.456" should find a CPF stored as digits and vice versa
        if looks_like_cpf(&self.query) {
            let digits = only_digits(&self.query);
            if let Some(cpf) = item.cpf_digits() {
                return cpf.contains(&digits);
            }
        }
        false
    }

    fn matches_specialties<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.specialties.is_empty()
            || item
                .specialty_ids()
                .iter()
                .any(|id| self.specialties.contains(id))
    }

    fn matches_sex<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.sexes.is_empty() || item.sex().is_some_and(|s| self.sexes.contains(&s))
    }

    fn matches_state<T: Filterable + ?Sized>(&self, item: &T) -> bool {
        self.states.is_empty()
            || item
                .state()
                .is_some_and(|s| self.states.contains(&normalize_state(&s)))
    }

    /// Matching items in display order (oldest first, ties keep input order).
    pub fn apply<'a, T: Filterable>(&self, items: &'a [T]) -> Vec<&'a T> {
        let mut matched: Vec<&T> = items.iter().filter(|item| self.matches(*item)).collect();
        matched.sort_by(|a, b| a.created_at().cmp(b.created_at()));
        matched
    }
}

/// Stable sort by creation time, oldest first.
pub fn sort_by_created_at<T: Filterable>(items: &mut [T]) {
    items.sort_by(|a, b| a.created_at().cmp(b.created_at()));
}

fn normalize_state(state: &str) -> String {
    state.trim().to_uppercase()
}

fn looks_like_cpf(query: &str) -> bool {
    let trimmed = query.trim();
    !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '/' | ' '))
}

/// One row of a queue screen: a waiting membership with patient data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitingEntry {
    pub flow_id: i64,
    pub membership_id: i64,
    pub queue_id: i64,
    pub specialty_id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    pub cpf: Option<String>,
    pub sex: Option<Sex>,
    pub state: Option<String>,
    pub triage_id: Option<i64>,
    pub status: FlowStatus,
    /// Whether this membership is the one being attended
    pub in_attendance: bool,
    /// When the patient entered this queue
    pub created_at: String,
}

impl WaitingEntry {
    /// Build the entry for one waiting membership.
    pub fn new(flow: &PatientFlow, membership: &QueueMembership, patient: Option<&Patient>) -> Self {
        Self {
            flow_id: flow.id,
            membership_id: membership.id,
            queue_id: membership.queue_id,
            specialty_id: membership.specialty_id,
            patient_id: flow.patient_id,
            patient_name: flow.patient_name.clone(),
            cpf: patient.and_then(|p| p.cpf.clone()),
            sex: patient.and_then(|p| p.sex),
            state: patient.and_then(|p| p.address.state.clone()),
            triage_id: flow.triage_id,
            status: flow.status(),
            in_attendance: flow.in_attendance == Some(membership.id),
            created_at: membership.entered_at.clone(),
        }
    }
}

impl Filterable for WaitingEntry {
    fn search_fields(&self) -> Vec<String> {
        let mut fields = vec![self.patient_name.clone(), self.patient_id.to_string()];
        fields.extend(self.cpf.clone());
        fields
    }

    fn cpf_digits(&self) -> Option<String> {
        self.cpf.as_deref().map(only_digits)
    }

    fn specialty_ids(&self) -> Vec<i64> {
        vec![self.specialty_id]
    }

    fn sex(&self) -> Option<Sex> {
        self.sex
    }

    fn state(&self) -> Option<String> {
        self.state.clone()
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

impl Filterable for Patient {
    fn search_fields(&self) -> Vec<String> {
        let mut fields = vec![self.name.clone(), self.id.to_string(), self.record_number()];
        fields.extend(self.cpf.clone());
        fields
    }

    fn cpf_digits(&self) -> Option<String> {
        Patient::cpf_digits(self)
    }

    fn sex(&self) -> Option<Sex> {
        self.sex
    }

    fn state(&self) -> Option<String> {
        self.address.state.clone()
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

impl Filterable for Triage {
    fn search_fields(&self) -> Vec<String> {
        vec![
            self.patient_name.clone(),
            self.patient_id.to_string(),
            self.record_number.clone(),
        ]
    }

    fn specialty_ids(&self) -> Vec<i64> {
        Triage::specialty_ids(self)
    }

    fn created_at(&self) -> &str {
        &self.collected_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, specialty_id: i64, sex: Option<Sex>, state: Option<&str>, at: &str) -> WaitingEntry {
        WaitingEntry {
            flow_id: 1,
            membership_id: 1,
            queue_id: specialty_id,
            specialty_id,
            patient_id: 42,
            patient_name: name.into(),
            cpf: Some("529.982.247-25".into()),
            sex,
            state: state.map(String::from),
            triage_id: None,
            status: FlowStatus::Waiting,
            in_attendance: false,
            created_at: at.into(),
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = SearchFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&entry("Ana", 1, None, None, "1")));
    }

    #[test]
    fn test_query_ignores_case_and_accents() {
        let filter = SearchFilter::new().with_query("JOAO");
        assert!(filter.matches(&entry("João", 1, None, None, "1")));
        assert!(filter.matches(&entry("joão ", 1, None, None, "1")));
        assert!(!filter.matches(&entry("Joana", 1, None, None, "1")));
    }

    #[test]
    fn test_query_matches_id_and_cpf() {
        let e = entry("Ana", 1, None, None, "1");
        assert!(SearchFilter::new().with_query("42").matches(&e));
        assert!(SearchFilter::new().with_query("52998224725").matches(&e));
        assert!(SearchFilter::new().with_query("529.982").matches(&e));
        assert!(!SearchFilter::new().with_query("Ana 1").matches(&e));
    }

    #[test]
    fn test_or_within_and_across() {
        let filter = SearchFilter::new()
            .with_specialty(1)
            .with_specialty(2)
            .with_sex(Sex::Female);

        assert!(filter.matches(&entry("A", 1, Some(Sex::Female), None, "1")));
        assert!(filter.matches(&entry("B", 2, Some(Sex::Female), None, "1")));
        assert!(!filter.matches(&entry("C", 3, Some(Sex::Female), None, "1")));
        assert!(!filter.matches(&entry("D", 1, Some(Sex::Male), None, "1")));
        assert!(!filter.matches(&entry("E", 1, None, None, "1")));
    }

    #[test]
    fn test_state_filter_normalizes() {
        let filter = SearchFilter::new().with_state(" mg");
        assert!(filter.matches(&entry("A", 1, None, Some("MG"), "1")));
        assert!(!filter.matches(&entry("A", 1, None, Some("BA"), "1")));
        assert!(!filter.matches(&entry("A", 1, None, None, "1")));
    }

    #[test]
    fn test_apply_sorts_stably() {
        let items = vec![
            entry("late", 1, None, None, "2024-01-01T10:00"),
            entry("first-tie", 1, None, None, "2024-01-01T09:00"),
            entry("second-tie", 1, None, None, "2024-01-01T09:00"),
        ];
        let names: Vec<&str> = SearchFilter::new()
            .apply(&items)
            .into_iter()
            .map(|e| e.patient_name.as_str())
            .collect();
        assert_eq!(names, vec!["first-tie", "second-tie", "late"]);
    }

    #[test]
    fn test_patient_and_triage_filterable() {
        let mut patient = Patient::new("Conceição".into());
        patient.id = 7;
        assert!(SearchFilter::new().with_query("conceicao").matches(&patient));
        assert!(SearchFilter::new().with_query("000007").matches(&patient));

        let triage = Triage::new(7, "Conceição".into(), "Enf.".into());
        assert!(!SearchFilter::new().with_specialty(1).matches(&triage));
    }
}
