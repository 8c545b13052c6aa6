//! Dashboard sections, their rendered views and the rendering seam.
//!
//! A [`SectionView`] is everything a renderer needs for one section:
//! KPIs, tables, chart series shaped as `{labels, datasets}` and map
//! markers. Renderers are collaborators behind the [`Renderer`] trait.

pub mod controller;
pub mod prefs;
pub mod sections;

pub use controller::{Dashboard, DashboardOptions};

use crate::loader::ResourceKind;
use serde::Serialize;
use std::fmt;

/// Dashboard sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Parcels per commune and region
    Parcelles,
    /// Beneficiary gender breakdown
    Genre,
    /// Planned vs. achieved parcels
    Projections,
    /// Progress of field operations
    Operations,
    /// Topographer field activity
    Topo,
    /// Full summary report
    Rapport,
}

impl Section {
    pub const ALL: &'static [Section] = &[
        Section::Parcelles,
        Section::Genre,
        Section::Projections,
        Section::Operations,
        Section::Topo,
        Section::Rapport,
    ];

    /// Resources that must be loaded before the section can render.
    pub fn resources(&self) -> &'static [ResourceKind] {
        match self {
            Section::Parcelles => &[ResourceKind::Parcelles],
            Section::Genre => &[
                ResourceKind::RepartitionGenre,
                ResourceKind::GenreCommune,
                ResourceKind::GenreTrimestre,
            ],
            Section::Projections => &[ResourceKind::Projections],
            Section::Operations => &[ResourceKind::EtatOperations],
            Section::Topo => &[ResourceKind::TopoData],
            Section::Rapport => &[ResourceKind::RapportComplet],
        }
    }

    /// Section heading.
    pub fn title(&self) -> &'static str {
        match self {
            Section::Parcelles => "Parcelles",
            Section::Genre => "Répartition par genre",
            Section::Projections => "Projections et réalisations",
            Section::Operations => "État des opérations",
            Section::Topo => "Activité des topographes",
            Section::Rapport => "Rapport complet",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// A headline figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: String,
}

impl Kpi {
    pub fn new(label: impl Into<String>, value: impl ToString) -> Self {
        Self {
            label: label.into(),
            value: value.to_string(),
        }
    }
}

/// A plain table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Chart style requested from the charting collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Doughnut,
    Polar,
}

/// One data series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Chart-ready data. `id` identifies the chart target; rendering a chart
/// with an id already in use replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub id: String,
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// A commune-level map marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub commune: String,
    pub region: String,
    pub popup: String,
}

/// Everything rendered for one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub section: Section,
    pub title: String,
    /// True when at least one resource is synthetic fallback data.
    pub degraded: bool,
    pub fallback_resources: Vec<ResourceKind>,
    /// Active filters, human readable.
    pub filters: Vec<String>,
    pub kpis: Vec<Kpi>,
    pub tables: Vec<Table>,
    pub charts: Vec<ChartData>,
    pub markers: Vec<MapMarker>,
}

impl SectionView {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            title: section.title().to_string(),
            degraded: false,
            fallback_resources: Vec::new(),
            filters: Vec::new(),
            kpis: Vec::new(),
            tables: Vec::new(),
            charts: Vec::new(),
            markers: Vec::new(),
        }
    }
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Transient user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.level {
            NoticeLevel::Warning => "⚠️",
            NoticeLevel::Error => "❌",
        };
        write!(f, "{} {}", icon, self.message)
    }
}

/// Rendering collaborator (charts, map, document export).
pub trait Renderer {
    /// Draw or replace the section. Failures are reported to the user by
    /// the dashboard and never abort navigation.
    fn render(&mut self, view: &SectionView) -> anyhow::Result<()>;
}
