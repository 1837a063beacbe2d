//! Property tests for the similarity model, coordinator, hulls and chunking.

use ai_policy_atlas::charts::projection::{convex_hull, hull_contains};
use ai_policy_atlas::models::Policy;
use ai_policy_atlas::text::{chunk_text, Chunk};
use ai_policy_atlas::{Coordinator, Dataset, SimilarityModel};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Upper-triangle similarity values for `n` policies.
fn matrix_strategy() -> impl Strategy<Value = (usize, Vec<f64>)> {
    (2usize..9).prop_flat_map(|n| (Just(n), prop::collection::vec(0.0f64..=1.0, n * (n - 1) / 2)))
}

fn model_from_upper(n: usize, upper: &[f64]) -> SimilarityModel {
    let ids: Vec<String> = (0..n).map(|i| format!("p{}", i)).collect();
    let mut matrix = vec![vec![1.0; n]; n];
    let mut k = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            matrix[i][j] = upper[k];
            matrix[j][i] = upper[k];
            k += 1;
        }
    }
    let dataset = Dataset {
        policies: ids
            .iter()
            .map(|id| Policy {
                id: id.clone(),
                country: id.to_uppercase(),
                title: format!("Strategy {}", id),
                year: 2020,
                region: "europa".into(),
                region_color: "#1976d2".into(),
                language: None,
                doc_type: None,
            })
            .collect(),
        policy_ids: ids,
        similarity_matrix: matrix,
        ..Dataset::placeholder()
    };
    SimilarityModel::from_dataset(dataset)
}

fn point_strategy() -> impl Strategy<Value = [f64; 2]> {
    (-100.0f64..100.0, -100.0f64..100.0).prop_map(|(x, y)| [x, y])
}

// ============================================================================
// Similarity model
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn pair_list_covers_every_pair_in_descending_order((n, upper) in matrix_strategy()) {
        let model = model_from_upper(n, &upper);
        let pairs = model.all_pairs_sorted();
        prop_assert_eq!(pairs.len(), n * (n - 1) / 2);
        prop_assert!(pairs.iter().all(|p| p.i < p.j));
        prop_assert!(pairs.windows(2).all(|w| w[0].value >= w[1].value));
        for p in pairs {
            prop_assert_eq!(model.pair_similarity(&p.id_a, &p.id_b).unwrap(), p.value);
            prop_assert_eq!(model.pair_similarity(&p.id_b, &p.id_a).unwrap(), p.value);
        }
    }

    #[test]
    fn neighbors_exclude_self_and_are_ordered((n, upper) in matrix_strategy()) {
        let model = model_from_upper(n, &upper);
        let neighbors = model.neighbors_of("p0");
        prop_assert_eq!(neighbors.len(), n - 1);
        prop_assert!(neighbors.iter().all(|nb| nb.id != "p0"));
        prop_assert!(neighbors.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn raising_the_threshold_never_adds_edges(
        (n, upper) in matrix_strategy(),
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
    ) {
        let model = model_from_upper(n, &upper);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let low = model.edges_at_or_above(lo);
        let high = model.edges_at_or_above(hi);
        prop_assert!(high.len() <= low.len());
        prop_assert!(high.iter().all(|e| e.value >= hi));
        prop_assert!(high.iter().all(|e| low.iter().any(|l| l.i == e.i && l.j == e.j)));
    }
}

// ============================================================================
// Coordinator
// ============================================================================

proptest! {
    #[test]
    fn selection_never_exceeds_two_distinct_ids(toggles in prop::collection::vec(0usize..5, 0..40)) {
        let coordinator = Coordinator::new();
        for t in toggles {
            coordinator.toggle_select(format!("p{}", t));
            let selection = coordinator.snapshot().selection;
            prop_assert!(selection.len() <= 2);
            if selection.len() == 2 {
                prop_assert_ne!(&selection[0], &selection[1]);
            }
        }
    }

    #[test]
    fn thresholds_stay_in_unit_range(values in prop::collection::vec(-2.0f64..3.0, 1..10)) {
        let coordinator = Coordinator::new();
        for v in values {
            coordinator.set_filter(ai_policy_atlas::FilterUpdate::new().threshold(v));
            let t = coordinator.snapshot().filters.threshold;
            prop_assert!((0.0..=1.0).contains(&t));
        }
    }
}

// ============================================================================
// Hulls and chunks
// ============================================================================

proptest! {
    #[test]
    fn hull_contains_every_input_point(points in prop::collection::vec(point_strategy(), 3..40)) {
        let hull = convex_hull(&points);
        prop_assume!(hull.len() >= 3);
        for p in &points {
            prop_assert!(hull_contains(&hull, *p), "{:?} outside {:?}", p, hull);
        }
    }

    #[test]
    fn chunks_rebuild_the_trimmed_text(
        lead in "[ \t\n]{0,400}",
        body in "[a-z]{0,1500}",
        tail in "[ \t\n]{0,400}",
        window in 1usize..300,
        overlap_ratio in 0.05f64..0.9,
    ) {
        let text = format!("{}{}{}", lead, body, tail);
        let overlap = ((window as f64) * overlap_ratio) as usize;
        let chunks = chunk_text(&text, window, overlap);
        prop_assert_eq!(rebuild(&text, &chunks), text.trim());
    }

    #[test]
    fn chunks_keep_every_word_in_order(
        text in "[a-z \n]{0,2000}",
        window in 1usize..300,
        overlap_ratio in 0.05f64..0.9,
    ) {
        let overlap = ((window as f64) * overlap_ratio) as usize;
        let chunks = chunk_text(&text, window, overlap);
        for (i, c) in chunks.iter().enumerate() {
            prop_assert_eq!(c.index, i);
            prop_assert!(!c.text.is_empty());
            prop_assert_eq!(c.text.trim(), c.text.as_str());
        }
        let rebuilt = rebuild(&text, &chunks);
        prop_assert!(rebuilt.chars().count() <= text.trim().chars().count());
        prop_assert_eq!(without_whitespace(&rebuilt), without_whitespace(&text));
    }
}

fn without_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Concatenate chunk texts, dropping the part each one shares with the
/// text already covered by earlier chunks.
fn rebuild(text: &str, chunks: &[Chunk]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut rebuilt = String::new();
    let mut covered: usize = 0;
    for c in chunks {
        let lead = chars[c.start..c.end].iter().take_while(|ch| ch.is_whitespace()).count();
        let start = c.start + lead;
        let end = start + c.text.chars().count();
        rebuilt.extend(c.text.chars().skip(covered.saturating_sub(start)));
        covered = covered.max(end);
    }
    rebuilt
}

