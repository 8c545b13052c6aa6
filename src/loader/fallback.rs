//! Synthetic data served when a resource cannot be loaded.
//!
//! Tabular resources are generated deterministically from per-commune
//! ratios; pre-aggregated resources are literal representative figures.

use super::ResourceKind;
use crate::models::{ParcelleRecord, TopoRecord};
use serde_json::{json, Value};

/// Commune profile used to generate plausible parcels.
struct CommuneProfile {
    commune: &'static str,
    region: &'static str,
    /// Share of all project parcels, in per mille.
    share: u32,
    /// Percentage of parcels with a NICAD.
    nicad_pct: u32,
    /// Percentage of parcels approved by the council.
    deliberee_pct: u32,
    /// Mean surface in hectares.
    mean_superficie: f64,
}

const COMMUNES: &[CommuneProfile] = &[
    CommuneProfile { commune: "Ndoga Babacar", region: "Tambacounda", share: 180, nicad_pct: 72, deliberee_pct: 41, mean_superficie: 2.8 },
    CommuneProfile { commune: "Missirah", region: "Tambacounda", share: 160, nicad_pct: 65, deliberee_pct: 38, mean_superficie: 3.4 },
    CommuneProfile { commune: "Netteboulou", region: "Tambacounda", share: 140, nicad_pct: 70, deliberee_pct: 52, mean_superficie: 2.1 },
    CommuneProfile { commune: "Bala", region: "Tambacounda", share: 110, nicad_pct: 58, deliberee_pct: 30, mean_superficie: 4.0 },
    CommuneProfile { commune: "Koar", region: "Tambacounda", share: 90, nicad_pct: 61, deliberee_pct: 27, mean_superficie: 3.7 },
    CommuneProfile { commune: "Gabou", region: "Bakel", share: 80, nicad_pct: 55, deliberee_pct: 33, mean_superficie: 2.6 },
    CommuneProfile { commune: "Moudery", region: "Bakel", share: 70, nicad_pct: 49, deliberee_pct: 22, mean_superficie: 1.9 },
    CommuneProfile { commune: "Tomboronkoto", region: "Kédougou", share: 60, nicad_pct: 67, deliberee_pct: 45, mean_superficie: 2.3 },
    CommuneProfile { commune: "Dindefelo", region: "Kédougou", share: 60, nicad_pct: 63, deliberee_pct: 40, mean_superficie: 1.6 },
    CommuneProfile { commune: "Fongolimbi", region: "Kédougou", share: 50, nicad_pct: 52, deliberee_pct: 25, mean_superficie: 2.0 },
];

const USAGES: &[&str] = &["Agricole", "Habitation", "Pâturage", "Maraîchage"];

const TOPOGRAPHES: &[(&str, &str, &str)] = &[
    ("Mamadou", "Diallo", "Ndoga Babacar"),
    ("Aïssatou", "Sow", "Missirah"),
    ("Ousmane", "Ba", "Netteboulou"),
    ("Fatou", "Ndiaye", "Bala"),
    ("Ibrahima", "Camara", "Tomboronkoto"),
];

const MONTHS: &[&str] = &["2024-11", "2024-12", "2025-01", "2025-02", "2025-03", "2025-04"];

/// Number of synthetic parcels generated across all communes.
const SYNTHETIC_PARCELS: u32 = 250;

/// Build the fallback payload for a resource. Never fails: a generation
/// error degrades to an empty array.
pub fn synthesize(kind: ResourceKind) -> Value {
    let generated = match kind {
        ResourceKind::Parcelles => serde_json::to_value(synthetic_parcelles()),
        ResourceKind::TopoData => serde_json::to_value(synthetic_topo()),
        ResourceKind::Projections => Ok(projections()),
        ResourceKind::RepartitionGenre => Ok(repartition_genre()),
        ResourceKind::GenreCommune => Ok(genre_commune()),
        ResourceKind::GenreTrimestre => Ok(genre_trimestre()),
        ResourceKind::EtatOperations => Ok(etat_operations()),
        ResourceKind::RapportComplet => Ok(rapport_complet()),
        ResourceKind::Unknown => Ok(Value::Array(Vec::new())),
    };

    generated.unwrap_or_else(|e| {
        tracing::error!("Fallback generation failed for {:?}: {}", kind, e);
        Value::Array(Vec::new())
    })
}

fn synthetic_parcelles() -> Vec<ParcelleRecord> {
    let mut records = Vec::new();

    for (code, profile) in COMMUNES.iter().enumerate() {
        let count = (SYNTHETIC_PARCELS * profile.share + 500) / 1000;
        for i in 0..count {
            // Spread yes/no flags evenly across the commune's rows.
            let rank = i * 100 / count.max(1);
            let spread = 0.6 + 0.8 * f64::from((i * 37) % 100) / 100.0;

            records.push(ParcelleRecord {
                id: format!("SYN-{:02}-{:04}", code + 1, i + 1),
                commune: profile.commune.to_string(),
                village: Some(format!("{} {}", profile.commune, i % 4 + 1)),
                nicad: yes_no(rank < profile.nicad_pct),
                superficie: Some((profile.mean_superficie * spread * 100.0).round() / 100.0),
                type_usage: Some(USAGES[i as usize % USAGES.len()].to_string()),
                deliberee: yes_no((rank + 17) % 100 < profile.deliberee_pct),
                autorite: Some(format!("Conseil municipal de {}", profile.commune)),
                num_cadastre: (rank < profile.nicad_pct)
                    .then(|| format!("{:04}/{:05}", 1000 + code, i + 1)),
                region: Some(profile.region.to_string()),
                geometrie: Some("Polygon".to_string()),
            });
        }
    }

    records
}

fn synthetic_topo() -> Vec<TopoRecord> {
    let mut records = Vec::new();

    for (t, (prenom, nom, commune)) in TOPOGRAPHES.iter().enumerate() {
        for (m, month) in MONTHS.iter().enumerate() {
            let champs = 18 + ((t * 7 + m * 5) % 15) as u64;
            let batis = 4 + ((t * 3 + m * 2) % 7) as u64;
            records.push(TopoRecord {
                date: Some(format!("{}-{:02}", month, 5 + (t * 4) % 20)),
                prenom: prenom.to_string(),
                nom: nom.to_string(),
                commune: commune.to_string(),
                village: None,
                champs: Some(champs),
                batis: Some(batis),
                total_parcelles: Some(champs + batis),
            });
        }
    }

    records
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "Oui" } else { "Non" };
    label.to_string()
}

fn projections() -> Value {
    json!([
        {"mois": "Janvier", "valeur": 3500, "realise": 2870},
        {"mois": "Février", "valeur": 4000, "realise": 3310},
        {"mois": "Mars", "valeur": 4500, "realise": 4125},
        {"mois": "Avril", "valeur": 5000, "realise": 4380},
        {"mois": "Mai", "valeur": 5500, "realise": 4960},
        {"mois": "Juin", "valeur": 6000, "realise": 0}
    ])
}

fn repartition_genre() -> Value {
    json!([
        {"genre": "Homme", "total_nombre": 27813, "pourcentage": 82.5},
        {"genre": "Femme", "total_nombre": 5904, "pourcentage": 17.5}
    ])
}

fn genre_commune() -> Value {
    json!([
        {"commune": "Ndoga Babacar", "genre": "Homme", "nombre": 4120},
        {"commune": "Ndoga Babacar", "genre": "Femme", "nombre": 890},
        {"commune": "Missirah", "genre": "Homme", "nombre": 3655},
        {"commune": "Missirah", "genre": "Femme", "nombre": 712},
        {"commune": "Netteboulou", "genre": "Homme", "nombre": 3210},
        {"commune": "Netteboulou", "genre": "Femme", "nombre": 804},
        {"commune": "Bala", "genre": "Homme", "nombre": 2488},
        {"commune": "Bala", "genre": "Femme", "nombre": 431},
        {"commune": "Tomboronkoto", "genre": "Homme", "nombre": 1502},
        {"commune": "Tomboronkoto", "genre": "Femme", "nombre": 377}
    ])
}

fn genre_trimestre() -> Value {
    json!([
        {"trimestre": "T3 2024", "genre": "Homme", "nombre": 5320},
        {"trimestre": "T3 2024", "genre": "Femme", "nombre": 1044},
        {"trimestre": "T4 2024", "genre": "Homme", "nombre": 7115},
        {"trimestre": "T4 2024", "genre": "Femme", "nombre": 1502},
        {"trimestre": "T1 2025", "genre": "Homme", "nombre": 8240},
        {"trimestre": "T1 2025", "genre": "Femme", "nombre": 1766},
        {"trimestre": "T2 2025", "genre": "Homme", "nombre": 7138},
        {"trimestre": "T2 2025", "genre": "Femme", "nombre": 1592}
    ])
}

fn etat_operations() -> Value {
    let rows: Vec<Value> = COMMUNES
        .iter()
        .enumerate()
        .map(|(i, profile)| {
            let etat = match i % 3 {
                0 => "Inventaire foncier terminé",
                1 => "Enquêtes publiques en cours",
                _ => "Levés topographiques en cours",
            };
            json!({
                "region": profile.region,
                "commune": profile.commune,
                "etat_d_avancement": etat,
                "date_debut": format!("2024-{:02}-01", 6 + i % 6),
                "csig": format!("CSIG {}", profile.region),
                "progres_des_etapes": format!("{}/7", 7 - i % 4),
            })
        })
        .collect();
    Value::Array(rows)
}

fn rapport_complet() -> Value {
    json!({
        "Synthèse": [
            {"indicateur": "Parcelles levées", "valeur": 48215},
            {"indicateur": "Parcelles avec NICAD", "valeur": 31402},
            {"indicateur": "Parcelles délibérées", "valeur": 17760},
            {"indicateur": "Superficie totale (ha)", "valeur": 131870.4}
        ],
        "Répartition par région": [
            {"region": "Tambacounda", "parcelles": 32940},
            {"region": "Bakel", "parcelles": 7385},
            {"region": "Kédougou", "parcelles": 7890}
        ],
        "Bénéficiaires": [
            {"genre": "Homme", "nombre": 27813},
            {"genre": "Femme", "nombre": 5904}
        ]
    })
}
