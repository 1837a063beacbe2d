use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::error::AtlasError;

/// JSON object that keeps its key order. Dimension labels, clusters and
/// region colors are all displayed in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    // later duplicates overwrite, like a JS object literal
                    if let Some(slot) = out.iter_mut().find(|slot: &&mut (String, V)| slot.0 == k) {
                        slot.1 = v;
                    } else {
                        out.push((k, v));
                    }
                }
                Ok(OrderedMap(out))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    pub id: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_region_color")]
    pub region_color: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
}

fn default_region_color() -> String {
    "#666".to_string()
}

impl Policy {
    /// Short chart label ("ES", "IN₁", ...), falling back to the country name.
    pub fn abbr(&self) -> String {
        known_abbr(&self.id)
            .map(str::to_string)
            .unwrap_or_else(|| self.country.clone())
    }

    pub fn language(&self) -> &str {
        self.language
            .as_deref()
            .or_else(|| known_language(&self.id))
            .unwrap_or("en")
    }

    pub fn doc_type(&self) -> &str {
        self.doc_type
            .as_deref()
            .or_else(|| known_doc_type(&self.id))
            .unwrap_or("Documento")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkEdge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

/// Standard agglomerative linkage: each row is `[a, b, distance, count]`,
/// leaves are `0..n`, the i-th merge creates node `n + i`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DendrogramData {
    #[serde(default)]
    pub linkage_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageRow {
    pub a: usize,
    pub b: usize,
    pub distance: f64,
    pub count: usize,
}

impl DendrogramData {
    pub fn rows(&self) -> Result<Vec<LinkageRow>, AtlasError> {
        self.linkage_matrix
            .iter()
            .enumerate()
            .map(|(i, row)| {
                if row.len() < 3 {
                    return Err(AtlasError::InvalidDataset(format!(
                        "linkage row {} has {} columns",
                        i,
                        row.len()
                    )));
                }
                if row[0] < 0.0 || row[1] < 0.0 {
                    return Err(AtlasError::InvalidDataset(format!(
                        "linkage row {} has a negative child index",
                        i
                    )));
                }
                Ok(LinkageRow {
                    a: row[0] as usize,
                    b: row[1] as usize,
                    distance: row[2],
                    count: row.get(3).map(|c| *c as usize).unwrap_or(0),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SankeyNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SankeyLink {
    pub source: String,
    pub target: String,
    pub value: f64,
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SankeyData {
    #[serde(default)]
    pub nodes: Vec<SankeyNode>,
    #[serde(default)]
    pub links: Vec<SankeyLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Metadata {
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub embedding_model: String,
    #[serde(default)]
    pub num_policies: usize,
}

impl Metadata {
    /// `generated_at` is written as a naive ISO-8601 timestamp.
    pub fn generated_at(&self) -> Option<chrono::NaiveDateTime> {
        let raw = self.generated_at.as_deref()?;
        chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
    }
}

pub type Point2 = [f64; 2];

/// The `results.json` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Dataset {
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub policy_ids: Vec<String>,
    #[serde(default)]
    pub similarity_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub dimension_labels: OrderedMap<String>,
    #[serde(default)]
    pub dimension_scores: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub clusters: OrderedMap<Vec<String>>,
    #[serde(default)]
    pub region_colors: OrderedMap<String>,
    #[serde(default)]
    pub network_edges: Option<Vec<NetworkEdge>>,
    #[serde(default)]
    pub dendrogram: Option<DendrogramData>,
    #[serde(default)]
    pub sankey: Option<SankeyData>,
    #[serde(default)]
    pub umap: Option<Vec<Point2>>,
    #[serde(default)]
    pub tsne: Option<Vec<Point2>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Dataset {
    /// Empty stand-in used when `results.json` cannot be loaded, so the
    /// shell still renders.
    pub fn placeholder() -> Self {
        let dims = [
            ("gobernanza", "Gobernanza y regulación"),
            ("curriculo", "Currículo e integración educativa"),
            ("formacion_docente", "Formación docente"),
            ("infraestructura", "Infraestructura y acceso"),
            ("etica", "Ética y valores"),
            ("investigacion", "Investigación e innovación"),
            ("equidad", "Equidad e inclusión"),
        ];
        let regions = [
            ("europa", "#1976d2"),
            ("americas", "#388e3c"),
            ("asia_pacifico", "#d32f2f"),
            ("internacional", "#7b1fa2"),
        ];
        Dataset {
            dimension_labels: OrderedMap(
                dims.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ),
            region_colors: OrderedMap(
                regions.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ),
            metadata: Metadata {
                generated_at: None,
                embedding_model: "pending".into(),
                num_policies: 0,
            },
            tsne: Some(vec![]),
            ..Default::default()
        }
    }

    /// Check the matrix invariants: square, aligned with `policy_ids`,
    /// symmetric.
    pub fn validate(&self) -> Result<(), AtlasError> {
        let n = self.policy_ids.len();
        if self.similarity_matrix.len() != n {
            return Err(AtlasError::InvalidDataset(format!(
                "matrix has {} rows for {} policy ids",
                self.similarity_matrix.len(),
                n
            )));
        }
        for (i, row) in self.similarity_matrix.iter().enumerate() {
            if row.len() != n {
                return Err(AtlasError::InvalidDataset(format!(
                    "matrix row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
        }
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (self.similarity_matrix[i][j], self.similarity_matrix[j][i]);
                if (a - b).abs() > 1e-6 {
                    return Err(AtlasError::InvalidDataset(format!(
                        "matrix not symmetric at ({}, {}): {} vs {}",
                        i, j, a, b
                    )));
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        for id in &self.policy_ids {
            if !seen.insert(id.as_str()) {
                return Err(AtlasError::InvalidDataset(format!("duplicate policy id {}", id)));
            }
        }
        Ok(())
    }

    /// Projection coordinates, preferring UMAP over t-SNE.
    pub fn projection(&self) -> Option<&[Point2]> {
        match (&self.umap, &self.tsne) {
            (Some(u), _) if !u.is_empty() => Some(u.as_slice()),
            (_, Some(t)) if !t.is_empty() => Some(t.as_slice()),
            _ => None,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* chunk_pairs.json                                                           */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRef {
    pub index: usize,
    #[serde(default)]
    pub dimension: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopChunk {
    pub similarity: f64,
    pub chunk_a: ChunkRef,
    pub chunk_b: ChunkRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPairEntry {
    pub doc_a: String,
    pub doc_b: String,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub top_chunks: Vec<TopChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkPairs {
    #[serde(default)]
    pub pairs: Vec<ChunkPairEntry>,
}

impl ChunkPairs {
    /// Find the precomputed entry for a policy pair in either order. The
    /// flag is true when the stored entry has the ids swapped.
    pub fn find(&self, id_a: &str, id_b: &str) -> Option<(&ChunkPairEntry, bool)> {
        self.pairs.iter().find_map(|p| {
            if p.doc_a == id_a && p.doc_b == id_b {
                Some((p, false))
            } else if p.doc_a == id_b && p.doc_b == id_a {
                Some((p, true))
            } else {
                None
            }
        })
    }
}

/* -------------------------------------------------------------------------- */
/* Known corpus metadata                                                      */
/* -------------------------------------------------------------------------- */

static KNOWN_POLICIES: &[(&str, &str, &str, &str)] = &[
    // (id, abbr, language, document type)
    ("eu_ai_act_2024", "UE", "en", "Ley"),
    ("espana_enia_2020", "ES", "es", "Estrategia nacional"),
    ("francia_villani_report_2018", "FR", "fr", "Reporte"),
    ("canada_pan_canadian_ai_strategy_2017", "CA", "en", "Estrategia nacional"),
    ("brasil_ebia_2021", "BR", "pt", "Estrategia nacional"),
    ("colombia_conpes_3975_2019", "CO", "es", "Política pública (CONPES)"),
    ("japon_ai_strategy_2019", "JP", "en", "Estrategia nacional"),
    ("corea_ai_strategy_2019", "KR", "en", "Estrategia nacional"),
    ("singapur_nais_2019", "SG", "en", "Estrategia nacional"),
    ("india_aiforall_2018", "IN₁", "en", "Estrategia nacional"),
    ("india_nep_2020", "IN₂", "en", "Política educativa"),
    ("australia_ai_action_plan_2021", "AU", "en", "Plan de acción"),
    ("unesco_genai_guidance_2023", "UN", "en", "Guía sectorial"),
    ("wef_future_of_jobs_2020", "WEF", "en", "Reporte"),
];

fn known(id: &str) -> Option<&'static (&'static str, &'static str, &'static str, &'static str)> {
    KNOWN_POLICIES.iter().find(|(k, ..)| *k == id)
}

fn known_abbr(id: &str) -> Option<&'static str> {
    known(id).map(|k| k.1)
}

fn known_language(id: &str) -> Option<&'static str> {
    known(id).map(|k| k.2)
}

fn known_doc_type(id: &str) -> Option<&'static str> {
    known(id).map(|k| k.3)
}

pub fn known_cluster_color(cluster_id: &str) -> Option<&'static str> {
    match cluster_id {
        "1" | "cluster_1" => Some("#d32f2f"),
        "2" | "cluster_2" => Some("#388e3c"),
        "3" | "cluster_3" => Some("#1976d2"),
        _ => None,
    }
}

/// Display color per cluster id; unknown clusters fall back to grey.
pub fn cluster_color(cluster_id: &str) -> &'static str {
    known_cluster_color(cluster_id).unwrap_or("#999")
}

pub fn cluster_name(cluster_id: &str) -> Option<&'static str> {
    match cluster_id {
        "1" => Some("Tecnológico"),
        "2" => Some("Integral"),
        "3" => Some("Regulación"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_keeps_document_order() {
        let json = r#"{"gobernanza":"G","curriculo":"C","equidad":"E"}"#;
        let m: OrderedMap<String> = serde_json::from_str(json).unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["gobernanza", "curriculo", "equidad"]);
        assert_eq!(serde_json::to_string(&m).unwrap(), json);
    }

    #[test]
    fn placeholder_is_valid_and_empty() {
        let d = Dataset::placeholder();
        assert!(d.validate().is_ok());
        assert!(d.policies.is_empty());
        assert_eq!(d.dimension_labels.len(), 7);
        assert!(d.projection().is_none());
    }

    #[test]
    fn validate_rejects_asymmetric_matrix() {
        let d = Dataset {
            policy_ids: vec!["a".into(), "b".into()],
            similarity_matrix: vec![vec![1.0, 0.5], vec![0.6, 1.0]],
            ..Default::default()
        };
        assert!(matches!(d.validate(), Err(AtlasError::InvalidDataset(_))));
    }

    #[test]
    fn validate_rejects_ragged_matrix() {
        let d = Dataset {
            policy_ids: vec!["a".into(), "b".into()],
            similarity_matrix: vec![vec![1.0, 0.5], vec![0.5]],
            ..Default::default()
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn chunk_pairs_lookup_tolerates_order() {
        let cp = ChunkPairs {
            pairs: vec![ChunkPairEntry {
                doc_a: "a".into(),
                doc_b: "b".into(),
                similarity: Some(0.9),
                top_chunks: vec![],
            }],
        };
        assert!(matches!(cp.find("a", "b"), Some((_, false))));
        assert!(matches!(cp.find("b", "a"), Some((_, true))));
        assert!(cp.find("a", "c").is_none());
    }

    #[test]
    fn policy_falls_back_to_known_metadata() {
        let p: Policy = serde_json::from_str(r#"{"id":"brasil_ebia_2021","country":"Brasil"}"#).unwrap();
        assert_eq!(p.abbr(), "BR");
        assert_eq!(p.language(), "pt");
        assert_eq!(p.doc_type(), "Estrategia nacional");

        let q: Policy = serde_json::from_str(r#"{"id":"x","country":"Xland"}"#).unwrap();
        assert_eq!(q.abbr(), "Xland");
        assert_eq!(q.language(), "en");
        assert_eq!(q.region_color, "#666");
    }

    #[test]
    fn metadata_timestamp_parses_python_isoformat() {
        let m = Metadata {
            generated_at: Some("2025-02-01T10:20:30.123456".into()),
            ..Default::default()
        };
        assert!(m.generated_at().is_some());
    }
}
