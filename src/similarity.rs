use itertools::Itertools;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::AtlasError;
use crate::models::{Dataset, Policy};

/// Cluster id reported for policies that no cluster lists.
pub const UNCLUSTERED: &str = "none";

/// Fingerprint of the raw `results.json` bytes. Derived views are memoized
/// per model, and a model is bound to exactly one fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DatasetId(pub u64);

impl DatasetId {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        DatasetId(xxh3_64(bytes))
    }

    /// Fingerprint of an in-memory dataset, through its canonical JSON form.
    pub fn of_dataset(dataset: &Dataset) -> Self {
        let bytes = serde_json::to_vec(dataset).unwrap_or_default();
        Self::of_bytes(&bytes)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// One unordered policy pair with the labels the pair views display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairEntry {
    pub i: usize,
    pub j: usize,
    pub id_a: String,
    pub id_b: String,
    pub label_a: String,
    pub label_b: String,
    pub color_a: String,
    pub color_b: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyProfile {
    pub id: String,
    pub average: f64,
    pub most_similar: Option<Neighbor>,
    pub least_similar: Option<Neighbor>,
    pub cluster: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimilarityStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SimilarityStats {
    /// Population statistics of `values`; all zeros when empty.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return SimilarityStats::default();
        }
        let n = values.len();
        let sorted: Vec<f64> = values.iter().copied().sorted_by(|a, b| a.total_cmp(b)).collect();
        let mean = values.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        SimilarityStats {
            count: n,
            mean,
            median,
            std_dev: var.sqrt(),
            min: sorted[0],
            max: sorted[n - 1],
        }
    }
}

/// Read-only view over a loaded dataset.
pub struct SimilarityModel {
    id: DatasetId,
    dataset: Dataset,
    index: HashMap<String, usize>,
    membership: HashMap<String, String>,
    zero_is_missing: bool,
    pairs: OnceCell<Vec<PairEntry>>,
}

impl fmt::Debug for SimilarityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimilarityModel")
            .field("id", &self.id)
            .field("policies", &self.dataset.policy_ids.len())
            .field("zero_is_missing", &self.zero_is_missing)
            .finish()
    }
}

impl SimilarityModel {
    pub fn new(dataset: Dataset, id: DatasetId, zero_is_missing: bool) -> Self {
        let index = dataset
            .policy_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        // first listing wins if the partition is ever violated
        let mut membership = HashMap::new();
        for (cluster, members) in dataset.clusters.iter() {
            for member in members {
                membership
                    .entry(member.clone())
                    .or_insert_with(|| cluster.to_string());
            }
        }
        SimilarityModel {
            id,
            dataset,
            index,
            membership,
            zero_is_missing,
            pairs: OnceCell::new(),
        }
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let id = DatasetId::of_dataset(&dataset);
        Self::new(dataset, id, true)
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.dataset.policy_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.policy_ids.is_empty()
    }

    pub fn policy_ids(&self) -> &[String] {
        &self.dataset.policy_ids
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn policy(&self, id: &str) -> Option<&Policy> {
        self.dataset.policies.iter().find(|p| p.id == id)
    }

    /// Display label of a policy id, or the id itself when no policy record exists.
    pub fn label(&self, id: &str) -> String {
        self.policy(id).map(Policy::abbr).unwrap_or_else(|| id.to_string())
    }

    pub fn color(&self, id: &str) -> String {
        self.policy(id)
            .map(|p| p.region_color.clone())
            .unwrap_or_else(|| "#999".to_string())
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.dataset.similarity_matrix
    }

    /// Similarity of two policies. Unknown ids are a caller error.
    pub fn pair_similarity(&self, id_a: &str, id_b: &str) -> Result<f64, AtlasError> {
        let i = self.index_of(id_a).ok_or_else(|| AtlasError::not_found(id_a))?;
        let j = self.index_of(id_b).ok_or_else(|| AtlasError::not_found(id_b))?;
        Ok(self.dataset.similarity_matrix[i][j])
    }

    /// Every unordered pair, highest similarity first. Equal values keep
    /// upper-triangle order. Computed on first use.
    pub fn all_pairs_sorted(&self) -> &[PairEntry] {
        self.pairs.get_or_init(|| {
            let n = self.len();
            let ids = &self.dataset.policy_ids;
            let mut pairs: Vec<PairEntry> = (0..n)
                .tuple_combinations()
                .map(|(i, j)| PairEntry {
                    i,
                    j,
                    id_a: ids[i].clone(),
                    id_b: ids[j].clone(),
                    label_a: self.label(&ids[i]),
                    label_b: self.label(&ids[j]),
                    color_a: self.color(&ids[i]),
                    color_b: self.color(&ids[j]),
                    value: self.dataset.similarity_matrix[i][j],
                })
                .collect();
            // stable, so ties stay in enumeration order
            pairs.sort_by(|a, b| b.value.total_cmp(&a.value));
            tracing::debug!("pair list built - dataset={} pairs={}", self.id, pairs.len());
            pairs
        })
    }

    /// Other policies ordered by similarity to `id`, most similar first.
    /// Unknown ids yield an empty list.
    pub fn neighbors_of(&self, id: &str) -> Vec<Neighbor> {
        let Some(i) = self.index_of(id) else {
            return Vec::new();
        };
        let row = &self.dataset.similarity_matrix[i];
        let mut out: Vec<Neighbor> = self
            .dataset
            .policy_ids
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, other)| Neighbor {
                id: other.clone(),
                value: row[j],
            })
            .collect();
        out.sort_by(|a, b| b.value.total_cmp(&a.value));
        out
    }

    pub fn cluster_of(&self, id: &str) -> &str {
        self.membership.get(id).map(String::as_str).unwrap_or(UNCLUSTERED)
    }

    /// Clusters in document order, followed by a `"none"` bucket when some
    /// policies are not listed anywhere.
    pub fn cluster_members(&self) -> Vec<(String, Vec<String>)> {
        let mut out: Vec<(String, Vec<String>)> = self
            .dataset
            .clusters
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let orphans: Vec<String> = self
            .dataset
            .policy_ids
            .iter()
            .filter(|id| !self.membership.contains_key(id.as_str()))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            out.push((UNCLUSTERED.to_string(), orphans));
        }
        out
    }

    pub fn dimension_keys(&self) -> Vec<&str> {
        self.dataset.dimension_labels.keys().collect()
    }

    pub fn dimension_label<'a>(&'a self, key: &'a str) -> &'a str {
        self.dataset
            .dimension_labels
            .get(key)
            .map(String::as_str)
            .unwrap_or(key)
    }

    /// Raw score; missing entries read as 0.
    pub fn score(&self, id: &str, dimension: &str) -> f64 {
        self.dataset
            .dimension_scores
            .get(id)
            .and_then(|s| s.get(dimension))
            .copied()
            .unwrap_or(0.0)
    }

    /// Scores of one policy in dimension-label order.
    pub fn scores_for(&self, id: &str) -> Vec<(String, f64)> {
        self.dimension_keys()
            .into_iter()
            .map(|k| (k.to_string(), self.score(id, k)))
            .collect()
    }

    /// Mean score of a dimension over `subset` (all policies when `None`).
    /// With `zero_is_missing`, zero scores are left out of the mean. An empty
    /// population averages to 0.
    pub fn dimension_average(&self, dimension: &str, subset: Option<&[String]>) -> f64 {
        let ids: Box<dyn Iterator<Item = &String>> = match subset {
            Some(ids) => Box::new(ids.iter()),
            None => Box::new(self.dataset.policy_ids.iter()),
        };
        let values: Vec<f64> = ids
            .map(|id| self.score(id, dimension))
            .filter(|v| !(self.zero_is_missing && *v == 0.0))
            .collect();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    /// Profile card data. Unknown ids yield `None`.
    pub fn profile(&self, id: &str) -> Option<PolicyProfile> {
        self.index_of(id)?;
        let neighbors = self.neighbors_of(id);
        let average = if neighbors.is_empty() {
            0.0
        } else {
            neighbors.iter().map(|n| n.value).sum::<f64>() / neighbors.len() as f64
        };
        // neighbors keep matrix order within equal values; on ties the
        // policy listed last wins at both ends
        let most_similar = neighbors
            .first()
            .and_then(|max| neighbors.iter().take_while(|n| n.value == max.value).last())
            .cloned();
        Some(PolicyProfile {
            id: id.to_string(),
            average,
            most_similar,
            least_similar: neighbors.last().cloned(),
            cluster: self.cluster_of(id).to_string(),
        })
    }

    /// The `k` most similar pairs and the `k` least similar, the latter
    /// lowest first.
    pub fn pair_extremes(&self, k: usize) -> (Vec<PairEntry>, Vec<PairEntry>) {
        let pairs = self.all_pairs_sorted();
        let top = pairs.iter().take(k).cloned().collect();
        let bottom = pairs.iter().rev().take(k).cloned().collect();
        (top, bottom)
    }

    pub fn similarity_stats(&self) -> SimilarityStats {
        let values: Vec<f64> = self.all_pairs_sorted().iter().map(|p| p.value).collect();
        SimilarityStats::of(&values)
    }

    /// Pairs at or above `threshold`, in pair-list order.
    pub fn edges_at_or_above(&self, threshold: f64) -> Vec<&PairEntry> {
        self.all_pairs_sorted()
            .iter()
            .take_while(|p| p.value >= threshold)
            .collect()
    }
}
