//! Record aggregation and statistics.
//!
//! Pure transforms from flat record collections to the grouped summaries
//! every table, chart and map view needs. Empty input always yields
//! zero-valued summaries.

use crate::models::{
    CommuneAggregate, GenderSplit, Genre, GenreCommune, GenreTrimestre, ParcelleRecord,
    PeriodAggregate, Projection, RegionAggregate, RepartitionGenre, TopoRecord, TopoTotals,
    TopographerSummary, UNKNOWN_BUCKET,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Parse a numeric string, rejecting NaN and infinities.
///
/// Accepts a decimal comma (`"1,5"`) as written in some extracts.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Percentage rounded to one decimal place; 0 when the denominator is 0.
pub fn percentage(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return 0.0;
    }
    round1((numerator / denominator) * 100.0)
}

/// Format a percentage for display (`"42.5 %"`).
pub fn format_percentage(numerator: f64, denominator: f64) -> String {
    format!("{:.1} %", percentage(numerator, denominator))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Group parcels by commune.
///
/// Every record lands in a bucket: a missing commune goes to `N/A`, so the
/// bucket totals always sum to the input length.
pub fn group_by_commune(records: &[ParcelleRecord]) -> BTreeMap<String, CommuneAggregate> {
    let mut grouped: BTreeMap<String, CommuneAggregate> = BTreeMap::new();

    for record in records {
        let entry = grouped.entry(record.commune_key().to_string()).or_default();
        entry.total += 1;
        if record.has_nicad() {
            entry.nicad_oui += 1;
        }
        if record.is_deliberee() {
            entry.deliberee_oui += 1;
        }
        if let Some(superficie) = record.superficie.filter(|s| s.is_finite()) {
            entry.superficie += superficie;
        }
    }

    grouped
}

/// Build a commune -> region lookup from the parcels themselves.
///
/// The first record of a commune carrying a non-empty region wins.
pub fn region_lookup(records: &[ParcelleRecord]) -> HashMap<String, String> {
    let mut lookup: HashMap<String, String> = HashMap::new();

    for record in records {
        let Some(region) = record.region.as_deref().map(str::trim) else {
            continue;
        };
        if region.is_empty() {
            continue;
        }
        lookup
            .entry(record.commune_key().to_string())
            .or_insert_with(|| region.to_string());
    }

    lookup
}

/// Sum parcel counts per region. Communes without a resolvable region
/// are counted under `N/A`.
pub fn group_by_region(records: &[ParcelleRecord]) -> BTreeMap<String, RegionAggregate> {
    let lookup = region_lookup(records);
    let mut grouped: BTreeMap<String, RegionAggregate> = BTreeMap::new();

    for (commune, aggregate) in group_by_commune(records) {
        let region = lookup
            .get(&commune)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_BUCKET.to_string());
        let entry = grouped.entry(region).or_default();
        entry.total += aggregate.total;
        entry.communes.insert(commune);
    }

    grouped
}

/// Overall NICAD / deliberation totals across all communes.
pub fn commune_totals(grouped: &BTreeMap<String, CommuneAggregate>) -> CommuneAggregate {
    grouped
        .values()
        .fold(CommuneAggregate::default(), |mut acc, item| {
            acc.total += item.total;
            acc.nicad_oui += item.nicad_oui;
            acc.deliberee_oui += item.deliberee_oui;
            acc.superficie += item.superficie;
            acc
        })
}

/// Monthly champs/bâtis time series. Records without a valid date or
/// without any count are left out.
pub fn group_topo_by_month(records: &[TopoRecord]) -> Vec<PeriodAggregate> {
    let mut grouped: BTreeMap<String, PeriodAggregate> = BTreeMap::new();

    for record in records {
        if record.effective_total().is_none() {
            continue;
        }
        let Some(month) = record.month_key() else {
            continue;
        };
        let entry = grouped.entry(month.clone()).or_insert_with(|| PeriodAggregate {
            period: month,
            ..Default::default()
        });
        entry.champs += record.champs.unwrap_or(0);
        entry.batis += record.batis.unwrap_or(0);
        entry.achieved += record.effective_total().unwrap_or(0) as f64;
    }

    grouped.into_values().collect()
}

/// Simple totals over all topo records, dated or not.
pub fn topo_totals(records: &[TopoRecord]) -> TopoTotals {
    let mut totals = TopoTotals::default();

    for record in records {
        let Some(total) = record.effective_total() else {
            continue;
        };
        totals.records += 1;
        totals.champs += record.champs.unwrap_or(0);
        totals.batis += record.batis.unwrap_or(0);
        totals.total += total;
        if record.month_key().is_none() {
            totals.undated += 1;
        }
    }

    totals
}

/// Per-topographer activity, busiest first (ties by name).
pub fn group_by_topographer(records: &[TopoRecord]) -> Vec<TopographerSummary> {
    let mut grouped: BTreeMap<String, TopographerSummary> = BTreeMap::new();

    for record in records {
        let Some(total) = record.effective_total() else {
            continue;
        };
        let mut name = record.topographe();
        if name.is_empty() {
            name = UNKNOWN_BUCKET.to_string();
        }
        let entry = grouped
            .entry(name.clone())
            .or_insert_with(|| TopographerSummary {
                name,
                ..Default::default()
            });
        entry.records += 1;
        entry.champs += record.champs.unwrap_or(0);
        entry.batis += record.batis.unwrap_or(0);
        entry.total += total;
        if !record.commune.trim().is_empty() {
            entry.communes.insert(record.commune.trim().to_string());
        }
    }

    let mut summaries: Vec<_> = grouped.into_values().collect();
    summaries.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    summaries
}

/// Gender counts per quarter, in chronological order. Rows without a
/// quarter label are dropped since they cannot be placed on the axis.
pub fn group_gender_by_trimestre(rows: &[GenreTrimestre]) -> Vec<PeriodAggregate> {
    let mut grouped: HashMap<String, PeriodAggregate> = HashMap::new();

    for row in rows {
        let label = row.trimestre.trim();
        if label.is_empty() {
            continue;
        }
        let entry = grouped
            .entry(label.to_string())
            .or_insert_with(|| PeriodAggregate {
                period: label.to_string(),
                ..Default::default()
            });
        let count = row.nombre.unwrap_or(0);
        match Genre::from(row.genre.as_str()) {
            Genre::Homme => entry.hommes += count,
            Genre::Femme => entry.femmes += count,
            Genre::Autre => {}
        }
    }

    let mut periods: Vec<_> = grouped.into_values().collect();
    periods.sort_by(|a, b| quarter_sort_key(&a.period).cmp(&quarter_sort_key(&b.period)));
    periods
}

/// Sort key for labels such as `T1 2024`, `2024-T3` or `Q2 2025`.
fn quarter_sort_key(label: &str) -> (Option<u32>, Option<u32>, String) {
    let year = label
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| part.len() == 4)
        .and_then(|part| part.parse().ok());

    let upper = label.to_uppercase();
    let quarter = upper
        .char_indices()
        .filter(|(_, c)| *c == 'T' || *c == 'Q')
        .find_map(|(i, _)| upper[i + 1..].chars().next().and_then(|c| c.to_digit(10)));

    (year, quarter, label.to_string())
}

/// Planned vs. achieved series, in source order.
pub fn projection_periods(rows: &[Projection]) -> Vec<PeriodAggregate> {
    rows.iter()
        .filter(|row| !row.mois.trim().is_empty())
        .map(|row| PeriodAggregate {
            period: row.mois.trim().to_string(),
            planned: row.valeur.unwrap_or(0.0),
            achieved: row.realise.unwrap_or(0.0),
            ..Default::default()
        })
        .collect()
}

/// Global gender split, percentages recomputed from raw counts.
pub fn gender_split(rows: &[RepartitionGenre]) -> GenderSplit {
    let mut split = GenderSplit::default();

    for row in rows {
        let count = row.total_nombre.unwrap_or(0);
        match Genre::from(row.genre.as_str()) {
            Genre::Homme => split.hommes += count,
            Genre::Femme => split.femmes += count,
            Genre::Autre => {}
        }
        split.total += count;
    }

    finish_split(split)
}

/// Gender split per commune.
pub fn gender_by_commune(rows: &[GenreCommune]) -> BTreeMap<String, GenderSplit> {
    let mut grouped: BTreeMap<String, GenderSplit> = BTreeMap::new();

    for row in rows {
        let commune = match row.commune.trim() {
            "" => UNKNOWN_BUCKET,
            other => other,
        };
        let entry = grouped.entry(commune.to_string()).or_default();
        let count = row.nombre.unwrap_or(0);
        match Genre::from(row.genre.as_str()) {
            Genre::Homme => entry.hommes += count,
            Genre::Femme => entry.femmes += count,
            Genre::Autre => {}
        }
        entry.total += count;
    }

    grouped.into_iter().map(|(k, v)| (k, finish_split(v))).collect()
}

fn finish_split(mut split: GenderSplit) -> GenderSplit {
    split.pct_hommes = percentage(split.hommes as f64, split.total as f64);
    split.pct_femmes = percentage(split.femmes as f64, split.total as f64);
    split
}

/// Top `n` entries by `metric`, descending. Ties are broken by key in
/// lexical order so the result is stable whatever the map type.
pub fn top_n<'a, V, F>(
    entries: impl IntoIterator<Item = (&'a String, &'a V)>,
    metric: F,
    n: usize,
) -> Vec<(String, f64)>
where
    V: 'a,
    F: Fn(&V) -> f64,
{
    let mut ranked: Vec<(String, f64)> = entries
        .into_iter()
        .map(|(key, value)| (key.clone(), metric(value)))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parcelle(commune: &str, nicad: &str) -> ParcelleRecord {
        ParcelleRecord {
            commune: commune.to_string(),
            nicad: nicad.to_string(),
            deliberee: "Non".to_string(),
            ..Default::default()
        }
    }

    fn topo(date: Option<&str>, champs: Option<u64>, batis: Option<u64>) -> TopoRecord {
        TopoRecord {
            date: date.map(String::from),
            prenom: "Moussa".to_string(),
            nom: "Sow".to_string(),
            commune: "Bala".to_string(),
            champs,
            batis,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_by_commune_scenario() {
        let records = vec![
            parcelle("A", "Oui"),
            parcelle("A", "Non"),
            parcelle("B", "Oui"),
        ];

        let grouped = group_by_commune(&records);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["A"].total, 2);
        assert_eq!(grouped["A"].nicad_oui, 1);
        assert_eq!(grouped["B"].total, 1);
        assert_eq!(grouped["B"].nicad_oui, 1);
    }

    #[test]
    fn test_group_by_commune_totals_match_input() {
        let mut records = vec![
            parcelle("Bala", "Oui"),
            parcelle("", "Non"),
            parcelle("Koar", "Oui"),
        ];
        records[0].superficie = Some(2.5);
        records[2].superficie = None;
        records[2].deliberee = "Oui".to_string();

        let grouped = group_by_commune(&records);
        let total: usize = grouped.values().map(|a| a.total).sum();

        assert_eq!(total, records.len());
        assert_eq!(grouped[UNKNOWN_BUCKET].total, 1);
        assert_eq!(grouped["Bala"].superficie, 2.5);
        assert_eq!(grouped["Koar"].superficie, 0.0);
        assert_eq!(grouped["Koar"].deliberee_oui, 1);
    }

    #[test]
    fn test_empty_input_gives_zero_summaries() {
        assert!(group_by_commune(&[]).is_empty());
        assert_eq!(commune_totals(&BTreeMap::new()), CommuneAggregate::default());
        assert_eq!(topo_totals(&[]), TopoTotals::default());
        assert_eq!(gender_split(&[]).pct_femmes, 0.0);
    }

    #[test]
    fn test_region_first_match_wins() {
        let mut first = parcelle("Bala", "Oui");
        first.region = Some("Tambacounda".to_string());
        let mut second = parcelle("Bala", "Oui");
        second.region = Some("Kédougou".to_string());
        let mut missing = parcelle("Koar", "Non");
        missing.region = Some("  ".to_string());

        let records = vec![parcelle("Bala", "Non"), first, second, missing];
        let lookup = region_lookup(&records);
        assert_eq!(lookup.get("Bala").map(String::as_str), Some("Tambacounda"));
        assert!(!lookup.contains_key("Koar"));

        let regions = group_by_region(&records);
        assert_eq!(regions["Tambacounda"].total, 3);
        assert_eq!(regions[UNKNOWN_BUCKET].total, 1);
        assert!(regions[UNKNOWN_BUCKET].communes.contains("Koar"));
    }

    #[test]
    fn test_percentage_safety() {
        assert_eq!(percentage(0.0, 0.0), 0.0);
        assert_eq!(percentage(5.0, 0.0), 0.0);
        assert_eq!(percentage(1.0, 3.0), 33.3);
        assert_eq!(percentage(2.0, 3.0), 66.7);
        assert_eq!(format_percentage(1.0, 8.0), "12.5 %");

        for den in 1..50u32 {
            for num in 0..=den {
                let pct = percentage(num as f64, den as f64);
                assert!((0.0..=100.0).contains(&pct));
            }
        }
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric(" 3.5 "), Some(3.5));
        assert_eq!(parse_numeric("1,25"), Some(1.25));
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("n/a"), None);
    }

    #[test]
    fn test_top_n_ties_broken_lexically() {
        let mut grouped: BTreeMap<String, u32> = BTreeMap::new();
        grouped.insert("Z".to_string(), 5);
        grouped.insert("Y".to_string(), 10);
        grouped.insert("X".to_string(), 10);

        let top = top_n(&grouped, |v| *v as f64, 2);
        let keys: Vec<_> = top.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["X", "Y"]);

        let hashed: HashMap<String, u32> = grouped.into_iter().collect();
        let top = top_n(&hashed, |v| *v as f64, 3);
        let keys: Vec<_> = top.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn test_topo_by_month_excludes_undated_from_series() {
        let records = vec![
            topo(Some("2025-02-10"), Some(4), Some(1)),
            topo(Some("2025-02-20"), Some(2), None),
            topo(Some("2025-01-05"), None, Some(3)),
            topo(None, Some(10), Some(10)),
            topo(Some("2025-03-01"), None, None),
        ];

        let series = group_topo_by_month(&records);
        let periods: Vec<_> = series.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(periods, vec!["2025-01", "2025-02"]);
        assert_eq!(series[1].champs, 6);
        assert_eq!(series[1].batis, 1);
        assert_eq!(series[1].achieved, 7.0);

        let totals = topo_totals(&records);
        assert_eq!(totals.records, 4);
        assert_eq!(totals.undated, 1);
        assert_eq!(totals.total, 30);
    }

    #[test]
    fn test_group_by_topographer() {
        let mut other = topo(Some("2025-02-10"), Some(50), None);
        other.prenom = "Awa".to_string();
        other.nom = "Ba".to_string();

        let records = vec![
            topo(Some("2025-02-10"), Some(4), Some(1)),
            topo(Some("2025-02-11"), Some(4), Some(1)),
            other,
        ];

        let summaries = group_by_topographer(&records);
        assert_eq!(summaries[0].name, "Awa Ba");
        assert_eq!(summaries[0].total, 50);
        assert_eq!(summaries[1].name, "Moussa Sow");
        assert_eq!(summaries[1].records, 2);
        assert_eq!(summaries[1].total, 10);
    }

    #[test]
    fn test_gender_by_trimestre_chronological() {
        let rows = vec![
            GenreTrimestre {
                trimestre: "T1 2025".to_string(),
                genre: "Femme".to_string(),
                nombre: Some(4),
            },
            GenreTrimestre {
                trimestre: "T4 2024".to_string(),
                genre: "Homme".to_string(),
                nombre: Some(9),
            },
            GenreTrimestre {
                trimestre: "T1 2025".to_string(),
                genre: "Homme".to_string(),
                nombre: Some(6),
            },
            GenreTrimestre {
                trimestre: String::new(),
                genre: "Homme".to_string(),
                nombre: Some(100),
            },
        ];

        let series = group_gender_by_trimestre(&rows);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].period, "T4 2024");
        assert_eq!(series[1].hommes, 6);
        assert_eq!(series[1].femmes, 4);
    }

    #[test]
    fn test_gender_split_recomputes_percentages() {
        let rows = vec![
            RepartitionGenre {
                genre: "Homme".to_string(),
                total_nombre: Some(2),
                pourcentage: Some(70.0),
            },
            RepartitionGenre {
                genre: "Femme".to_string(),
                total_nombre: Some(1),
                pourcentage: Some(30.0),
            },
        ];

        let split = gender_split(&rows);
        assert_eq!(split.total, 3);
        assert_eq!(split.pct_hommes, 66.7);
        assert_eq!(split.pct_femmes, 33.3);
    }

    #[test]
    fn test_projection_periods_keep_source_order() {
        let rows = vec![
            Projection {
                mois: "Mars".to_string(),
                valeur: Some(100.0),
                realise: Some(80.0),
            },
            Projection {
                mois: "Janvier".to_string(),
                valeur: None,
                realise: Some(10.0),
            },
        ];

        let periods = projection_periods(&rows);
        assert_eq!(periods[0].period, "Mars");
        assert_eq!(periods[1].planned, 0.0);
    }
}
