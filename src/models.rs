//! Data models for the survey dashboard.
//!
//! This module contains the record types decoded from the JSON extracts
//! and the derived aggregates built from them.

use crate::analysis::parse_numeric;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Bucket used when a record's commune or region cannot be resolved.
pub const UNKNOWN_BUCKET: &str = "N/A";

/// Yes/no flag as written in the extracts (`Oui`/`Non`).
pub const OUI: &str = "Oui";

/// One cadastral parcel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelleRecord {
    /// Parcel identifier.
    #[serde(default, alias = "id_parcelle", deserialize_with = "lenient_string")]
    pub id: String,
    /// Commune name (empty when absent).
    #[serde(default, deserialize_with = "lenient_string")]
    pub commune: String,
    #[serde(default)]
    pub village: Option<String>,
    /// NICAD status (`Oui`/`Non`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub nicad: String,
    /// Surface in hectares.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub superficie: Option<f64>,
    #[serde(default)]
    pub type_usage: Option<String>,
    /// Deliberation status (`Oui`/`Non`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub deliberee: String,
    #[serde(default, alias = "autorite_deliberante")]
    pub autorite: Option<String>,
    #[serde(default, alias = "numero_cadastral")]
    pub num_cadastre: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Geometry kind of the parcel outline (e.g. `Polygon`).
    #[serde(default)]
    pub geometrie: Option<String>,
}

impl ParcelleRecord {
    /// Commune name used as an aggregation key.
    pub fn commune_key(&self) -> &str {
        let commune = self.commune.trim();
        if commune.is_empty() {
            UNKNOWN_BUCKET
        } else {
            commune
        }
    }

    pub fn has_nicad(&self) -> bool {
        self.nicad == OUI
    }

    pub fn is_deliberee(&self) -> bool {
        self.deliberee == OUI
    }
}

/// One topographer field-activity entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopoRecord {
    /// ISO date (`YYYY-MM-DD`).
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub prenom: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nom: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commune: String,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub champs: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub batis: Option<u64>,
    #[serde(default, alias = "totale_parcelles", deserialize_with = "lenient_count")]
    pub total_parcelles: Option<u64>,
}

impl TopoRecord {
    /// Full name of the topographer.
    pub fn topographe(&self) -> String {
        format!("{} {}", self.prenom.trim(), self.nom.trim())
            .trim()
            .to_string()
    }

    /// Total parcels surveyed: the stated total, else the sum of the
    /// present component counts, else `None`.
    pub fn effective_total(&self) -> Option<u64> {
        if let Some(total) = self.total_parcelles {
            return Some(total);
        }
        match (self.champs, self.batis) {
            (None, None) => None,
            (champs, batis) => Some(champs.unwrap_or(0) + batis.unwrap_or(0)),
        }
    }

    /// Year-month key (`YYYY-MM`) when the date is a valid ISO date.
    pub fn month_key(&self) -> Option<String> {
        let date = self.date.as_deref()?.trim();
        let day = date.get(..10)?;
        chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .ok()
            .map(|d| d.format("%Y-%m").to_string())
    }
}

/// Monthly planned vs. achieved parcel count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    #[serde(default, deserialize_with = "lenient_string")]
    pub mois: String,
    /// Planned count.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub valeur: Option<f64>,
    /// Achieved count.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub realise: Option<f64>,
}

/// Global gender split of beneficiaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepartitionGenre {
    #[serde(default, deserialize_with = "lenient_string")]
    pub genre: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_nombre: Option<u64>,
    /// Upstream pre-rounded percentage, kept for reference only.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pourcentage: Option<f64>,
}

/// Gender count per commune.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenreCommune {
    #[serde(default, deserialize_with = "lenient_string")]
    pub commune: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub genre: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub nombre: Option<u64>,
}

/// Gender count per quarter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenreTrimestre {
    #[serde(default, deserialize_with = "lenient_string")]
    pub trimestre: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub genre: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub nombre: Option<u64>,
}

/// Progress of field operations in one commune.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EtatOperation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub region: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commune: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub etat_d_avancement: String,
    #[serde(default)]
    pub date_debut: Option<String>,
    #[serde(default)]
    pub csig: Option<String>,
    #[serde(default)]
    pub progres_des_etapes: Option<String>,
}

/// Full report extract: named sections of summary rows.
pub type RapportComplet = BTreeMap<String, Vec<Value>>;

/// Gender of a beneficiary, normalized from free-form labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Genre {
    Homme,
    Femme,
    Autre,
}

impl From<&str> for Genre {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "homme" | "hommes" | "h" | "masculin" | "m" => Genre::Homme,
            "femme" | "femmes" | "f" | "féminin" | "feminin" => Genre::Femme,
            _ => Genre::Autre,
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Genre::Homme => write!(f, "Hommes"),
            Genre::Femme => write!(f, "Femmes"),
            Genre::Autre => write!(f, "Autre"),
        }
    }
}

/// Running totals for one commune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommuneAggregate {
    pub total: usize,
    pub nicad_oui: usize,
    pub deliberee_oui: usize,
    /// Cumulative surface in hectares.
    pub superficie: f64,
}

/// Parcel totals for one region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionAggregate {
    pub communes: BTreeSet<String>,
    pub total: usize,
}

/// Per-period totals (month or quarter).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub period: String,
    pub planned: f64,
    pub achieved: f64,
    pub champs: u64,
    pub batis: u64,
    pub hommes: u64,
    pub femmes: u64,
}

/// Per-topographer activity summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopographerSummary {
    pub name: String,
    pub records: usize,
    pub champs: u64,
    pub batis: u64,
    pub total: u64,
    pub communes: BTreeSet<String>,
}

/// Overall topo activity, including records without a usable date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TopoTotals {
    pub records: usize,
    pub champs: u64,
    pub batis: u64,
    pub total: u64,
    pub undated: usize,
}

/// Gender split with recomputed percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenderSplit {
    pub hommes: u64,
    pub femmes: u64,
    pub total: u64,
    pub pct_hommes: f64,
    pub pct_femmes: f64,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_numeric(&s),
            _ => None,
        })
        .filter(|f| f.is_finite()))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?
        .filter(|f| *f >= 0.0)
        .map(|f| f.round() as u64))
}
