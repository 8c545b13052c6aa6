//! Section view builders.
//!
//! Each builder filters the raw records, runs the aggregations and lays
//! the results out as KPIs, tables, chart series and map markers.
//! Views are always rebuilt from scratch.

use super::{ChartData, ChartKind, Dataset, Kpi, MapMarker, Section, SectionView, Table};
use crate::analysis::{
    commune_totals, format_percentage, gender_by_commune, gender_split, group_by_commune,
    group_by_region, group_by_topographer, group_gender_by_trimestre, group_topo_by_month,
    percentage, projection_periods, region_lookup, top_n, topo_totals, FilterState,
};
use crate::loader::{LoadedResource, ResourceKind};
use crate::models::{
    EtatOperation, GenreCommune, GenreTrimestre, ParcelleRecord, Projection, RapportComplet,
    RepartitionGenre, TopoRecord, UNKNOWN_BUCKET,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Loaded resources of the active section.
pub type Resources = HashMap<ResourceKind, Arc<LoadedResource>>;

/// Layout options.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub top_n: usize,
    pub include_map: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            include_map: true,
        }
    }
}

/// Build the view of `section` from its loaded resources.
pub fn build_view(
    section: Section,
    resources: &Resources,
    filters: &FilterState,
    options: BuildOptions,
) -> SectionView {
    let mut view = SectionView::new(section);

    view.fallback_resources = section
        .resources()
        .iter()
        .copied()
        .filter(|kind| resources.get(kind).is_some_and(|r| r.is_fallback()))
        .collect();
    view.degraded = !view.fallback_resources.is_empty();
    view.filters = filters.describe();

    match section {
        Section::Parcelles => {
            let parcelles: Vec<ParcelleRecord> = records(resources, ResourceKind::Parcelles);
            parcelles_section(&mut view, &filters.apply_parcelles(&parcelles), options);
        }
        Section::Genre => {
            let repartition: Vec<RepartitionGenre> =
                records(resources, ResourceKind::RepartitionGenre);
            let communes: Vec<GenreCommune> = records(resources, ResourceKind::GenreCommune);
            let communes: Vec<GenreCommune> = communes
                .into_iter()
                .filter(|row| filters.matches_commune(&row.commune))
                .collect();
            let trimestres: Vec<GenreTrimestre> =
                records(resources, ResourceKind::GenreTrimestre);
            genre_section(&mut view, &repartition, &communes, &trimestres, options);
        }
        Section::Projections => {
            let rows: Vec<Projection> = records(resources, ResourceKind::Projections);
            projections_section(&mut view, &rows);
        }
        Section::Operations => {
            let rows: Vec<EtatOperation> = records(resources, ResourceKind::EtatOperations);
            let rows: Vec<EtatOperation> = rows
                .into_iter()
                .filter(|row| filters.matches_commune(&row.commune))
                .collect();
            operations_section(&mut view, &rows);
        }
        Section::Topo => {
            let rows: Vec<TopoRecord> = records(resources, ResourceKind::TopoData);
            topo_section(&mut view, &filters.apply_topo(&rows), options);
        }
        Section::Rapport => {
            let rapport = resources
                .get(&ResourceKind::RapportComplet)
                .map(|r| r.rapport())
                .unwrap_or_default();
            rapport_section(&mut view, &rapport);
        }
    }

    view
}

fn records<T: DeserializeOwned>(resources: &Resources, kind: ResourceKind) -> Vec<T> {
    resources
        .get(&kind)
        .map(|r| r.records())
        .unwrap_or_default()
}

fn parcelles_section(view: &mut SectionView, records: &[ParcelleRecord], options: BuildOptions) {
    let by_commune = group_by_commune(records);
    let by_region = group_by_region(records);
    let totals = commune_totals(&by_commune);
    let total = totals.total as f64;

    view.kpis = vec![
        Kpi::new("Parcelles", format_count(totals.total as u64)),
        Kpi::new(
            "Parcelles avec NICAD",
            format!(
                "{} ({})",
                format_count(totals.nicad_oui as u64),
                format_percentage(totals.nicad_oui as f64, total)
            ),
        ),
        Kpi::new(
            "Parcelles délibérées",
            format!(
                "{} ({})",
                format_count(totals.deliberee_oui as u64),
                format_percentage(totals.deliberee_oui as f64, total)
            ),
        ),
        Kpi::new("Superficie totale", format!("{:.2} ha", totals.superficie)),
        Kpi::new("Communes", by_commune.len()),
        Kpi::new("Régions", by_region.len()),
    ];

    let mut communes = Table::new(
        "Parcelles par commune",
        &[
            "Commune",
            "Parcelles",
            "NICAD",
            "% NICAD",
            "Délibérées",
            "% Délibérées",
            "Superficie (ha)",
        ],
    );
    for (commune, agg) in &by_commune {
        communes.push_row(vec![
            commune.clone(),
            agg.total.to_string(),
            agg.nicad_oui.to_string(),
            format_percentage(agg.nicad_oui as f64, agg.total as f64),
            agg.deliberee_oui.to_string(),
            format_percentage(agg.deliberee_oui as f64, agg.total as f64),
            format!("{:.2}", agg.superficie),
        ]);
    }

    let mut regions = Table::new("Parcelles par région", &["Région", "Communes", "Parcelles", "Part"]);
    for (region, agg) in &by_region {
        regions.push_row(vec![
            region.clone(),
            agg.communes.len().to_string(),
            agg.total.to_string(),
            format_percentage(agg.total as f64, total),
        ]);
    }

    let mut ranking = Table::new(
        format!("Top {} communes", options.top_n),
        &["Rang", "Commune", "Parcelles"],
    );
    let top = top_n(&by_commune, |agg| agg.total as f64, options.top_n);
    for (rank, (commune, count)) in top.iter().enumerate() {
        ranking.push_row(vec![
            (rank + 1).to_string(),
            commune.clone(),
            format!("{}", *count as u64),
        ]);
    }

    view.tables = vec![communes, regions, ranking];

    view.charts = vec![
        ChartData {
            id: "parcelles-commune".to_string(),
            kind: ChartKind::Bar,
            title: "Parcelles par commune".to_string(),
            labels: by_commune.keys().cloned().collect(),
            datasets: vec![
                series("Total", by_commune.values().map(|a| a.total as f64)),
                series("NICAD", by_commune.values().map(|a| a.nicad_oui as f64)),
                series("Délibérées", by_commune.values().map(|a| a.deliberee_oui as f64)),
            ],
        },
        ChartData {
            id: "nicad-statut".to_string(),
            kind: ChartKind::Doughnut,
            title: "Statut NICAD".to_string(),
            labels: vec!["Oui".to_string(), "Non".to_string()],
            datasets: vec![series(
                "Parcelles",
                [totals.nicad_oui as f64, (totals.total - totals.nicad_oui) as f64],
            )],
        },
        ChartData {
            id: "parcelles-region".to_string(),
            kind: ChartKind::Polar,
            title: "Parcelles par région".to_string(),
            labels: by_region.keys().cloned().collect(),
            datasets: vec![series("Parcelles", by_region.values().map(|a| a.total as f64))],
        },
    ];

    if options.include_map {
        let lookup = region_lookup(records);
        view.markers = by_commune
            .iter()
            .map(|(commune, agg)| MapMarker {
                commune: commune.clone(),
                region: lookup
                    .get(commune)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_BUCKET.to_string()),
                popup: format!(
                    "{} : {} parcelles, {} NICAD, {} délibérées",
                    commune, agg.total, agg.nicad_oui, agg.deliberee_oui
                ),
            })
            .collect();
    }
}

fn genre_section(
    view: &mut SectionView,
    repartition: &[RepartitionGenre],
    communes: &[GenreCommune],
    trimestres: &[GenreTrimestre],
    options: BuildOptions,
) {
    let split = gender_split(repartition);

    view.kpis = vec![
        Kpi::new("Bénéficiaires", format_count(split.total)),
        Kpi::new(
            "Hommes",
            format!("{} ({:.1} %)", format_count(split.hommes), split.pct_hommes),
        ),
        Kpi::new(
            "Femmes",
            format!("{} ({:.1} %)", format_count(split.femmes), split.pct_femmes),
        ),
    ];

    let by_commune = gender_by_commune(communes);
    let mut table = Table::new(
        "Genre par commune",
        &["Commune", "Hommes", "Femmes", "Total", "% Femmes"],
    );
    for (commune, s) in &by_commune {
        table.push_row(vec![
            commune.clone(),
            s.hommes.to_string(),
            s.femmes.to_string(),
            s.total.to_string(),
            format!("{:.1} %", s.pct_femmes),
        ]);
    }

    let mut ranking = Table::new(
        "Communes où la part des femmes est la plus élevée",
        &["Commune", "% Femmes"],
    );
    for (commune, pct) in top_n(&by_commune, |s| s.pct_femmes, options.top_n) {
        ranking.push_row(vec![commune, format!("{:.1} %", pct)]);
    }

    let periods = group_gender_by_trimestre(trimestres);
    let mut quarters = Table::new(
        "Évolution trimestrielle",
        &["Trimestre", "Hommes", "Femmes", "% Femmes"],
    );
    for p in &periods {
        quarters.push_row(vec![
            p.period.clone(),
            p.hommes.to_string(),
            p.femmes.to_string(),
            format!(
                "{:.1} %",
                percentage(p.femmes as f64, (p.hommes + p.femmes) as f64)
            ),
        ]);
    }

    view.tables = vec![table, ranking, quarters];

    view.charts = vec![
        ChartData {
            id: "genre-global".to_string(),
            kind: ChartKind::Doughnut,
            title: "Répartition par genre".to_string(),
            labels: vec!["Hommes".to_string(), "Femmes".to_string()],
            datasets: vec![series(
                "Bénéficiaires",
                [split.hommes as f64, split.femmes as f64],
            )],
        },
        ChartData {
            id: "genre-commune".to_string(),
            kind: ChartKind::Bar,
            title: "Genre par commune".to_string(),
            labels: by_commune.keys().cloned().collect(),
            datasets: vec![
                series("Hommes", by_commune.values().map(|s| s.hommes as f64)),
                series("Femmes", by_commune.values().map(|s| s.femmes as f64)),
            ],
        },
        ChartData {
            id: "genre-trimestre".to_string(),
            kind: ChartKind::Line,
            title: "Évolution trimestrielle".to_string(),
            labels: periods.iter().map(|p| p.period.clone()).collect(),
            datasets: vec![
                series("Hommes", periods.iter().map(|p| p.hommes as f64)),
                series("Femmes", periods.iter().map(|p| p.femmes as f64)),
            ],
        },
    ];
}

fn projections_section(view: &mut SectionView, rows: &[Projection]) {
    let periods = projection_periods(rows);
    let planned: f64 = periods.iter().map(|p| p.planned).sum();
    let achieved: f64 = periods.iter().map(|p| p.achieved).sum();

    view.kpis = vec![
        Kpi::new("Objectif cumulé", format_count(planned.round() as u64)),
        Kpi::new("Réalisé cumulé", format_count(achieved.round() as u64)),
        Kpi::new("Taux de réalisation", format_percentage(achieved, planned)),
    ];

    let mut table = Table::new("Projections mensuelles", &["Mois", "Objectif", "Réalisé", "Taux"]);
    for p in &periods {
        table.push_row(vec![
            p.period.clone(),
            format!("{}", p.planned),
            format!("{}", p.achieved),
            format_percentage(p.achieved, p.planned),
        ]);
    }
    view.tables = vec![table];

    view.charts = vec![ChartData {
        id: "projections".to_string(),
        kind: ChartKind::Line,
        title: "Objectif vs réalisé".to_string(),
        labels: periods.iter().map(|p| p.period.clone()).collect(),
        datasets: vec![
            series("Objectif", periods.iter().map(|p| p.planned)),
            series("Réalisé", periods.iter().map(|p| p.achieved)),
        ],
    }];
}

fn operations_section(view: &mut SectionView, rows: &[EtatOperation]) {
    let mut by_state: BTreeMap<String, usize> = BTreeMap::new();
    for row in rows {
        let state = match row.etat_d_avancement.trim() {
            "" => UNKNOWN_BUCKET,
            other => other,
        };
        *by_state.entry(state.to_string()).or_default() += 1;
    }

    view.kpis = vec![Kpi::new("Communes suivies", rows.len())];
    view.kpis.extend(
        by_state
            .iter()
            .map(|(state, count)| Kpi::new(state.clone(), count)),
    );

    let mut table = Table::new(
        "Avancement par commune",
        &["Région", "Commune", "État", "Début", "CSIG", "Étapes"],
    );
    for row in rows {
        table.push_row(vec![
            row.region.clone(),
            row.commune.clone(),
            row.etat_d_avancement.clone(),
            row.date_debut.clone().unwrap_or_default(),
            row.csig.clone().unwrap_or_default(),
            row.progres_des_etapes.clone().unwrap_or_default(),
        ]);
    }
    view.tables = vec![table];

    view.charts = vec![ChartData {
        id: "operations-etat".to_string(),
        kind: ChartKind::Bar,
        title: "Communes par état d'avancement".to_string(),
        labels: by_state.keys().cloned().collect(),
        datasets: vec![series("Communes", by_state.values().map(|c| *c as f64))],
    }];
}

fn topo_section(view: &mut SectionView, records: &[TopoRecord], options: BuildOptions) {
    let totals = topo_totals(records);
    let months = group_topo_by_month(records);
    let topographers = group_by_topographer(records);

    view.kpis = vec![
        Kpi::new("Relevés", totals.records),
        Kpi::new("Champs", format_count(totals.champs)),
        Kpi::new("Bâtis", format_count(totals.batis)),
        Kpi::new("Parcelles levées", format_count(totals.total)),
        Kpi::new("Topographes", topographers.len()),
    ];
    if totals.undated > 0 {
        view.kpis.push(Kpi::new("Relevés sans date", totals.undated));
    }

    let mut monthly = Table::new("Activité mensuelle", &["Mois", "Champs", "Bâtis", "Total"]);
    for m in &months {
        monthly.push_row(vec![
            m.period.clone(),
            m.champs.to_string(),
            m.batis.to_string(),
            format!("{}", m.achieved),
        ]);
    }

    let mut people = Table::new(
        format!("Top {} topographes", options.top_n),
        &["Topographe", "Relevés", "Champs", "Bâtis", "Total", "Communes"],
    );
    for t in topographers.iter().take(options.top_n) {
        people.push_row(vec![
            t.name.clone(),
            t.records.to_string(),
            t.champs.to_string(),
            t.batis.to_string(),
            t.total.to_string(),
            t.communes.iter().cloned().collect::<Vec<_>>().join(", "),
        ]);
    }

    view.tables = vec![monthly, people];

    view.charts = vec![
        ChartData {
            id: "topo-mensuel".to_string(),
            kind: ChartKind::Line,
            title: "Champs et bâtis par mois".to_string(),
            labels: months.iter().map(|m| m.period.clone()).collect(),
            datasets: vec![
                series("Champs", months.iter().map(|m| m.champs as f64)),
                series("Bâtis", months.iter().map(|m| m.batis as f64)),
            ],
        },
        ChartData {
            id: "topo-topographes".to_string(),
            kind: ChartKind::Bar,
            title: "Parcelles par topographe".to_string(),
            labels: topographers
                .iter()
                .take(options.top_n)
                .map(|t| t.name.clone())
                .collect(),
            datasets: vec![series(
                "Parcelles",
                topographers.iter().take(options.top_n).map(|t| t.total as f64),
            )],
        },
    ];
}

fn rapport_section(view: &mut SectionView, rapport: &RapportComplet) {
    view.kpis = vec![Kpi::new("Sections", rapport.len())];

    view.tables = rapport
        .iter()
        .map(|(name, rows)| {
            let mut headers: Vec<String> = Vec::new();
            for row in rows {
                if let Some(obj) = row.as_object() {
                    for key in obj.keys() {
                        if !headers.contains(key) {
                            headers.push(key.clone());
                        }
                    }
                }
            }

            let rows = rows
                .iter()
                .filter_map(Value::as_object)
                .map(|obj| {
                    headers
                        .iter()
                        .map(|h| obj.get(h).map(cell).unwrap_or_default())
                        .collect()
                })
                .collect();

            Table {
                title: name.clone(),
                headers,
                rows,
            }
        })
        .collect();
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn series(label: &str, data: impl IntoIterator<Item = f64>) -> Dataset {
    Dataset {
        label: label.to_string(),
        data: data.into_iter().collect(),
    }
}

/// Integer with space-separated thousands (`48 215`).
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }

    out
}
