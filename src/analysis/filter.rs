//! User filter state and predicate application.
//!
//! Every active field is an exact string match, except the date bounds
//! which compare ISO dates (`YYYY-MM-DD`) lexically and inclusively.
//! Active predicates compose with AND; unset fields match everything.

use crate::models::{ParcelleRecord, TopoRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected filter changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Start date after end date; the end date has been cleared.
    #[error("Start date {start} is after end date {end}; end date cleared")]
    InvertedDateRange { start: String, end: String },
}

/// Currently active predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    pub commune: Option<String>,
    pub nicad: Option<String>,
    pub deliberee: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub topographe: Option<String>,
    pub geometrie: Option<String>,
}

/// A single user filter action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Commune(Option<String>),
    Nicad(Option<String>),
    Deliberee(Option<String>),
    DateRange {
        start: Option<String>,
        end: Option<String>,
    },
    Topographe(Option<String>),
    Geometrie(Option<String>),
    Reset,
}

impl FilterState {
    /// Clear every predicate.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when no predicate is active.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply one user action.
    pub fn apply_change(&mut self, change: FilterChange) -> Result<(), FilterError> {
        match change {
            FilterChange::Commune(v) => self.commune = normalize(v),
            FilterChange::Nicad(v) => self.nicad = normalize(v),
            FilterChange::Deliberee(v) => self.deliberee = normalize(v),
            FilterChange::DateRange { start, end } => return self.set_date_range(start, end),
            FilterChange::Topographe(v) => self.topographe = normalize(v),
            FilterChange::Geometrie(v) => self.geometrie = normalize(v),
            FilterChange::Reset => self.reset(),
        }
        Ok(())
    }

    /// Set the date bounds. An inverted range keeps the start date,
    /// clears the end date and reports the rejection.
    pub fn set_date_range(
        &mut self,
        start: Option<String>,
        end: Option<String>,
    ) -> Result<(), FilterError> {
        let start = normalize(start);
        let end = normalize(end);

        let inverted = match (&start, &end) {
            (Some(s), Some(e)) if s > e => Some(FilterError::InvertedDateRange {
                start: s.clone(),
                end: e.clone(),
            }),
            _ => None,
        };

        if let Some(err) = inverted {
            self.date_start = start;
            self.date_end = None;
            return Err(err);
        }

        self.date_start = start;
        self.date_end = end;
        Ok(())
    }

    fn has_date_bounds(&self) -> bool {
        self.date_start.is_some() || self.date_end.is_some()
    }

    fn date_matches(&self, date: Option<&str>) -> bool {
        if !self.has_date_bounds() {
            return true;
        }
        let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) else {
            return false;
        };
        // Compare the day part only so timestamps stay inside the bound.
        let day = date.get(..10).unwrap_or(date);

        if let Some(ref start) = self.date_start {
            if day < start.as_str() {
                return false;
            }
        }
        if let Some(ref end) = self.date_end {
            if day > end.as_str() {
                return false;
            }
        }
        true
    }

    /// Commune predicate alone, for pre-aggregated per-commune rows.
    pub fn matches_commune(&self, commune: &str) -> bool {
        eq(&self.commune, commune)
    }

    /// Whether a parcel passes every active parcel predicate.
    pub fn matches_parcelle(&self, record: &ParcelleRecord) -> bool {
        eq(&self.commune, &record.commune)
            && eq(&self.nicad, &record.nicad)
            && eq(&self.deliberee, &record.deliberee)
            && eq(
                &self.geometrie,
                record.geometrie.as_deref().unwrap_or_default(),
            )
    }

    /// Whether a topo entry passes every active topo predicate.
    pub fn matches_topo(&self, record: &TopoRecord) -> bool {
        eq(&self.commune, &record.commune)
            && eq(&self.topographe, &record.topographe())
            && self.date_matches(record.date.as_deref())
    }

    /// Filtered copy of the parcels.
    pub fn apply_parcelles(&self, records: &[ParcelleRecord]) -> Vec<ParcelleRecord> {
        records
            .iter()
            .filter(|r| self.matches_parcelle(r))
            .cloned()
            .collect()
    }

    /// Filtered copy of the topo entries.
    pub fn apply_topo(&self, records: &[TopoRecord]) -> Vec<TopoRecord> {
        records
            .iter()
            .filter(|r| self.matches_topo(r))
            .cloned()
            .collect()
    }

    /// Human-readable list of the active predicates.
    pub fn describe(&self) -> Vec<String> {
        let fields = [
            ("Commune", &self.commune),
            ("NICAD", &self.nicad),
            ("Délibérée", &self.deliberee),
            ("Du", &self.date_start),
            ("Au", &self.date_end),
            ("Topographe", &self.topographe),
            ("Géométrie", &self.geometrie),
        ];

        fields
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}", label, v)))
            .collect()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn eq(filter: &Option<String>, value: &str) -> bool {
    filter.as_deref().map_or(true, |f| f == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcelles() -> Vec<ParcelleRecord> {
        vec![
            ParcelleRecord {
                commune: "Bala".to_string(),
                nicad: "Oui".to_string(),
                deliberee: "Non".to_string(),
                geometrie: Some("Polygon".to_string()),
                ..Default::default()
            },
            ParcelleRecord {
                commune: "Bala".to_string(),
                nicad: "Non".to_string(),
                deliberee: "Oui".to_string(),
                ..Default::default()
            },
            ParcelleRecord {
                commune: "Koar".to_string(),
                nicad: "Oui".to_string(),
                deliberee: "Oui".to_string(),
                ..Default::default()
            },
        ]
    }

    fn topo(date: Option<&str>, prenom: &str) -> TopoRecord {
        TopoRecord {
            date: date.map(String::from),
            prenom: prenom.to_string(),
            nom: "Ndiaye".to_string(),
            commune: "Bala".to_string(),
            champs: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = FilterState::default();
        assert!(filter.is_empty());
        assert_eq!(filter.apply_parcelles(&parcelles()).len(), 3);
    }

    #[test]
    fn test_filters_compose_with_and() {
        let mut filter = FilterState::default();
        filter
            .apply_change(FilterChange::Commune(Some("Bala".to_string())))
            .unwrap();
        assert_eq!(filter.apply_parcelles(&parcelles()).len(), 2);

        filter
            .apply_change(FilterChange::Nicad(Some("Oui".to_string())))
            .unwrap();
        let filtered = filter.apply_parcelles(&parcelles());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].deliberee, "Non");

        filter
            .apply_change(FilterChange::Geometrie(Some("Point".to_string())))
            .unwrap();
        assert!(filter.apply_parcelles(&parcelles()).is_empty());
    }

    #[test]
    fn test_blank_value_clears_field() {
        let mut filter = FilterState::default();
        filter
            .apply_change(FilterChange::Commune(Some("  ".to_string())))
            .unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_filter_is_idempotent_and_pure() {
        let source = parcelles();
        let filter = FilterState {
            deliberee: Some("Oui".to_string()),
            ..Default::default()
        };

        let first = filter.apply_parcelles(&source);
        let second = filter.apply_parcelles(&source);

        assert_eq!(first, second);
        assert_eq!(source, parcelles());
    }

    #[test]
    fn test_inverted_date_range_is_rejected() {
        let mut filter = FilterState::default();
        let result = filter.set_date_range(
            Some("2025-05-01".to_string()),
            Some("2025-04-01".to_string()),
        );

        assert!(matches!(
            result,
            Err(FilterError::InvertedDateRange { .. })
        ));
        assert_eq!(filter.date_start.as_deref(), Some("2025-05-01"));
        assert_eq!(filter.date_end, None);

        let records = vec![topo(Some("2025-04-15"), "A"), topo(Some("2025-05-02"), "B")];
        let filtered = filter.apply_topo(&records);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].prenom, "B");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let mut filter = FilterState::default();
        filter
            .set_date_range(
                Some("2025-04-01".to_string()),
                Some("2025-04-30".to_string()),
            )
            .unwrap();

        let records = vec![
            topo(Some("2025-04-01"), "start"),
            topo(Some("2025-04-30T17:00:00"), "end"),
            topo(Some("2025-05-01"), "after"),
            topo(None, "undated"),
        ];

        let names: Vec<_> = filter
            .apply_topo(&records)
            .into_iter()
            .map(|r| r.prenom)
            .collect();
        assert_eq!(names, vec!["start", "end"]);
    }

    #[test]
    fn test_topographe_filter() {
        let filter = FilterState {
            topographe: Some("Fatou Ndiaye".to_string()),
            ..Default::default()
        };
        let records = vec![topo(None, "Fatou"), topo(None, "Ibrahima")];
        assert_eq!(filter.apply_topo(&records).len(), 1);
    }

    #[test]
    fn test_describe_lists_active_fields() {
        let filter = FilterState {
            commune: Some("Bala".to_string()),
            date_end: Some("2025-01-31".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.describe(), vec!["Commune: Bala", "Au: 2025-01-31"]);
    }
}
