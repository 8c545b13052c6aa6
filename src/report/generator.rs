//! Markdown and JSON report generation.
//!
//! [`ReportRenderer`] is the document-export collaborator: it collects
//! rendered section views (replacing a section rendered twice) and the
//! generators turn them into a report file.

use crate::view::{ChartData, Notice, Renderer, SectionView, Table};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Collects section views as they are rendered.
#[derive(Debug, Default)]
pub struct ReportRenderer {
    views: Vec<SectionView>,
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)] // Accessor for embedders
    pub fn views(&self) -> &[SectionView] {
        &self.views
    }

    pub fn into_views(self) -> Vec<SectionView> {
        self.views
    }
}

impl Renderer for ReportRenderer {
    fn render(&mut self, view: &SectionView) -> Result<()> {
        match self.views.iter_mut().find(|v| v.section == view.section) {
            Some(existing) => *existing = view.clone(),
            None => self.views.push(view.clone()),
        }
        Ok(())
    }
}

/// Metadata about the report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Base URL or directory of the extracts.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    /// True when any section shows fallback data.
    pub degraded: bool,
    /// Preferred display font size, in pixels.
    pub font_size: u32,
    pub duration_seconds: f64,
}

/// The complete dashboard report.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub sections: Vec<SectionView>,
    pub notices: Vec<Notice>,
    #[serde(skip)]
    pub include_charts: bool,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Rapport de suivi foncier\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if report.metadata.degraded {
        output.push_str(
            "> ⚠️ **Données dégradées :** certaines sections affichent des données de \
             démonstration car les fichiers sources étaient indisponibles.\n\n",
        );
    }

    output.push_str(&generate_table_of_contents(&report.sections));

    for view in &report.sections {
        output.push_str(&generate_view_section(view, report.include_charts));
    }

    output.push_str(&generate_notices_section(&report.notices));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Métadonnées\n\n");
    section.push_str(&format!("- **Source :** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Généré le :** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Taille de police :** {} px\n", metadata.font_size));
    section.push_str(&format!(
        "- **Durée :** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

/// Generate the table of contents.
fn generate_table_of_contents(views: &[SectionView]) -> String {
    let mut toc = String::new();

    toc.push_str("## Sommaire\n\n");
    for view in views {
        toc.push_str(&format!("- [{}](#{})\n", view.title, anchor(&view.title)));
    }
    toc.push('\n');

    toc
}

/// Generate one dashboard section.
fn generate_view_section(view: &SectionView, include_charts: bool) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", view.title));

    if view.degraded {
        let names: Vec<String> = view
            .fallback_resources
            .iter()
            .map(|k| k.to_string())
            .collect();
        section.push_str(&format!(
            "> ⚠️ Données de démonstration : {}\n\n",
            names.join(", ")
        ));
    }

    if !view.filters.is_empty() {
        section.push_str(&format!("*Filtres : {}*\n\n", view.filters.join(" · ")));
    }

    if !view.kpis.is_empty() {
        for kpi in &view.kpis {
            section.push_str(&format!("- **{} :** {}\n", kpi.label, kpi.value));
        }
        section.push('\n');
    }

    for table in &view.tables {
        section.push_str(&generate_table(table));
    }

    if include_charts {
        for chart in &view.charts {
            section.push_str(&generate_chart_table(chart));
        }
    }

    if !view.markers.is_empty() {
        let mut map = Table::new("Carte des communes", &["Commune", "Région", "Détail"]);
        for marker in &view.markers {
            map.push_row(vec![
                marker.commune.clone(),
                marker.region.clone(),
                marker.popup.clone(),
            ]);
        }
        section.push_str(&generate_table(&map));
    }

    section
}

/// Render a table as Markdown.
fn generate_table(table: &Table) -> String {
    let mut out = String::new();

    out.push_str(&format!("### {}\n\n", table.title));

    if table.rows.is_empty() {
        out.push_str("*Aucune donnée.*\n\n");
        return out;
    }

    out.push_str(&format!("| {} |\n", escape_row(&table.headers)));
    out.push_str(&format!(
        "|{}\n",
        table.headers.iter().map(|_| ":---|").collect::<String>()
    ));
    for row in &table.rows {
        out.push_str(&format!("| {} |\n", escape_row(row)));
    }
    out.push('\n');

    out
}

fn escape_row(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| c.replace('|', "\\|").replace('\n', " "))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Chart series laid out as a table, one column per dataset.
fn generate_chart_table(chart: &ChartData) -> String {
    let mut headers = vec![String::new()];
    headers.extend(chart.datasets.iter().map(|d| d.label.clone()));

    let rows = chart
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let mut row = vec![label.clone()];
            row.extend(chart.datasets.iter().map(|d| {
                d.data
                    .get(i)
                    .map(|v| format!("{}", v))
                    .unwrap_or_default()
            }));
            row
        })
        .collect();

    generate_table(&Table {
        title: format!("Graphique : {}", chart.title),
        headers,
        rows,
    })
}

/// Generate the notices section.
fn generate_notices_section(notices: &[Notice]) -> String {
    if notices.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Avertissements\n\n");
    for notice in notices {
        section.push_str(&format!("- {}\n", notice));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Rapport généré par cadastats*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write already generated report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
