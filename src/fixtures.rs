//! Small in-memory datasets shared by the unit tests.

use std::collections::BTreeMap;

use crate::models::{
    Dataset, DendrogramData, Metadata, OrderedMap, Policy, SankeyData, SankeyLink, SankeyNode,
};
use crate::similarity::SimilarityModel;

pub fn policy(id: &str, region: &str, color: &str) -> Policy {
    Policy {
        id: id.to_string(),
        country: format!("Country {}", id),
        title: format!("Strategy {}", id),
        year: 2020,
        region: region.to_string(),
        region_color: color.to_string(),
        language: None,
        doc_type: None,
    }
}

pub fn model_from_matrix(ids: &[&str], matrix: Vec<Vec<f64>>) -> SimilarityModel {
    let dataset = Dataset {
        policies: ids.iter().map(|id| policy(id, "europa", "#1976d2")).collect(),
        policy_ids: ids.iter().map(|s| s.to_string()).collect(),
        similarity_matrix: matrix,
        ..Dataset::placeholder()
    };
    SimilarityModel::from_dataset(dataset)
}

/// A, B, C with `[[1,.9,.5],[.9,1,.6],[.5,.6,1]]`; C is unclustered.
pub fn abc_dataset() -> Dataset {
    let mut scores = BTreeMap::new();
    scores.insert(
        "A".to_string(),
        BTreeMap::from([("gobernanza".to_string(), 0.6), ("etica".to_string(), 0.4)]),
    );
    scores.insert(
        "B".to_string(),
        BTreeMap::from([("gobernanza".to_string(), 0.0), ("etica".to_string(), 0.2)]),
    );
    Dataset {
        policies: vec![
            policy("A", "europa", "#1976d2"),
            policy("B", "americas", "#388e3c"),
            policy("C", "europa", "#1976d2"),
        ],
        policy_ids: vec!["A".into(), "B".into(), "C".into()],
        similarity_matrix: vec![
            vec![1.0, 0.9, 0.5],
            vec![0.9, 1.0, 0.6],
            vec![0.5, 0.6, 1.0],
        ],
        dimension_scores: scores,
        clusters: OrderedMap(vec![("1".into(), vec!["A".into(), "B".into()])]),
        ..Dataset::placeholder()
    }
}

pub fn abc_model() -> SimilarityModel {
    SimilarityModel::from_dataset(abc_dataset())
}

/// Six policies in two index-contiguous clusters of three, with every
/// optional section present.
pub fn sample_dataset() -> Dataset {
    let ids = ["p1", "p2", "p3", "p4", "p5", "p6"];
    let upper = [
        [0.92, 0.71, 0.69, 0.55, 0.52],
        [0.73, 0.70, 0.58, 0.50, 0.0],
        [0.88, 0.62, 0.60, 0.0, 0.0],
        [0.64, 0.61, 0.0, 0.0, 0.0],
        [0.85, 0.0, 0.0, 0.0, 0.0],
    ];
    let n = ids.len();
    let mut matrix = vec![vec![1.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let v = upper[i][j - i - 1];
            matrix[i][j] = v;
            matrix[j][i] = v;
        }
    }

    let regions = [
        ("europa", "#1976d2"),
        ("europa", "#1976d2"),
        ("americas", "#388e3c"),
        ("americas", "#388e3c"),
        ("asia_pacifico", "#d32f2f"),
        ("asia_pacifico", "#d32f2f"),
    ];
    let policies = ids
        .iter()
        .zip(regions.iter())
        .map(|(id, (region, color))| policy(id, region, color))
        .collect();

    let dims = [
        "gobernanza",
        "curriculo",
        "formacion_docente",
        "infraestructura",
        "etica",
        "investigacion",
        "equidad",
    ];
    let mut scores = BTreeMap::new();
    for (i, id) in ids.iter().enumerate() {
        let row = dims
            .iter()
            .enumerate()
            .map(|(d, key)| {
                // p6 has no teacher-training score at all
                let v = if i == 5 && d == 2 { 0.0 } else { 0.1 + 0.05 * ((i + d) % 10) as f64 };
                (key.to_string(), v)
            })
            .collect();
        scores.insert(id.to_string(), row);
    }

    Dataset {
        policies,
        policy_ids: ids.iter().map(|s| s.to_string()).collect(),
        similarity_matrix: matrix,
        dimension_scores: scores,
        clusters: OrderedMap(vec![
            ("1".into(), vec!["p1".into(), "p2".into(), "p3".into()]),
            ("2".into(), vec!["p4".into(), "p5".into(), "p6".into()]),
        ]),
        dendrogram: Some(DendrogramData {
            linkage_matrix: vec![
                vec![0.0, 1.0, 0.1, 2.0],
                vec![2.0, 3.0, 0.15, 2.0],
                vec![4.0, 5.0, 0.2, 2.0],
                vec![6.0, 7.0, 0.5, 4.0],
                vec![8.0, 9.0, 0.8, 6.0],
            ],
            labels: ids.iter().map(|s| s.to_string()).collect(),
        }),
        sankey: Some(SankeyData {
            nodes: vec![
                SankeyNode { id: "europa".into(), label: "Europa".into() },
                SankeyNode { id: "americas".into(), label: "Américas".into() },
                SankeyNode { id: "asia_pacifico".into(), label: "Asia-Pacífico".into() },
                SankeyNode { id: "cluster_1".into(), label: "Cluster 1".into() },
                SankeyNode { id: "cluster_2".into(), label: "Cluster 2".into() },
            ],
            links: vec![
                link("europa", "cluster_1", &["p1", "p2"]),
                link("americas", "cluster_1", &["p3"]),
                link("americas", "cluster_2", &["p4"]),
                link("asia_pacifico", "cluster_2", &["p5", "p6"]),
            ],
        }),
        umap: Some(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [1.0, 2.0],
            [10.0, 10.0],
            [12.0, 10.0],
            [11.0, 13.0],
        ]),
        metadata: Metadata {
            generated_at: Some("2025-02-01T10:20:30".into()),
            embedding_model: "test-embedding".into(),
            num_policies: n,
        },
        ..Dataset::placeholder()
    }
}

fn link(source: &str, target: &str, policies: &[&str]) -> SankeyLink {
    SankeyLink {
        source: source.into(),
        target: target.into(),
        value: policies.len() as f64,
        policies: policies.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn sample_model() -> SimilarityModel {
    SimilarityModel::from_dataset(sample_dataset())
}
