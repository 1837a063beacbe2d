//! Side-by-side text comparison of two policies.
//!
//! Raw texts are fetched per policy and cached for the life of the store,
//! split into overlapping character windows, and labeled with a dimension
//! either from the precomputed chunk matches or from a keyword heuristic.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::config::ChunkConfig;
use crate::fetch::{fetch_bytes_opt, Source};
use crate::models::ChunkPairs;
use crate::similarity::SimilarityModel;

/// Dimension assigned when no keyword family matches.
pub const DEFAULT_DIMENSION: &str = "gobernanza";

static KEYWORDS: &[(&str, &[&str])] = &[
    (
        "gobernanza",
        &[
            "regulación", "regulation", "ley", "law", "gobierno", "government", "governance", "gobernanza",
            "legislat", "normat", "supervisión", "marco legal", "compliance",
        ],
    ),
    (
        "curriculo",
        &[
            "currículo", "curriculum", "educación", "education", "plan de estudi", "course", "school", "escuela",
            "learning", "aprendizaje", "teaching", "enseñanza", "literacy", "alfabetización",
        ],
    ),
    (
        "formacion_docente",
        &[
            "docente", "teacher", "profesorado", "capacitación", "training", "profesional", "formación",
            "educator", "pedagog", "instructor",
        ],
    ),
    (
        "infraestructura",
        &[
            "infraestructura", "infrastructure", "connectivity", "conectividad", "internet", "hardware",
            "digital", "cloud", "computing", "plataform", "platform", "data center",
        ],
    ),
    (
        "etica",
        &[
            "ética", "ethic", "privacidad", "privacy", "sesgo", "bias", "transparencia", "transparency", "rights",
            "derechos", "responsible", "responsable", "fairness",
        ],
    ),
    (
        "investigacion",
        &[
            "investigación", "research", "innovación", "innovation", "i+d", "r&d", "development", "desarrollo",
            "scientific", "científic", "laborator", "patent",
        ],
    ),
    (
        "equidad",
        &[
            "equidad", "equity", "inclusión", "inclusion", "brecha", "gap", "diversidad", "diversity", "género",
            "gender", "vulnerable", "acceso", "access", "igualdad", "equality",
        ],
    ),
];

static LEXICON: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    KEYWORDS
        .iter()
        .map(|(dim, words)| {
            let patterns = words
                .iter()
                .filter_map(|w| {
                    let w: String = w.nfc().collect();
                    Regex::new(&format!("(?i){}", regex::escape(&w))).ok()
                })
                .collect();
            (*dim, patterns)
        })
        .collect()
});

/// Keyword-frequency guess of a passage's dimension. Counts every keyword
/// occurrence per family; the first family with the strictly highest count
/// wins, and a passage with no hits falls back to [`DEFAULT_DIMENSION`].
pub fn guess_dimension(text: &str) -> &'static str {
    let normalized: String = text.nfc().collect::<String>().to_lowercase();
    let mut best = DEFAULT_DIMENSION;
    let mut best_count = 0;
    for (dim, patterns) in LEXICON.iter() {
        let count: usize = patterns.iter().map(|re| re.find_iter(&normalized).count()).sum();
        if count > best_count {
            best_count = count;
            best = *dim;
        }
    }
    best
}

/// One window of a policy text. `start..end` are char offsets of the raw
/// window; `text` is the window trimmed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Split `text` into windows of `window` chars advancing by
/// `window - overlap`. Windows that are blank after trimming are dropped
/// and do not take an index.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> Vec<Chunk> {
    if window == 0 {
        return Vec::new();
    }
    let stride = window.saturating_sub(overlap).max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + window).min(chars.len());
        let raw: String = chars[start..end].iter().collect();
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                start,
                end,
                text: trimmed.to_string(),
            });
        }
        start += stride;
    }
    chunks
}

/// Per-policy raw text, fetched from `{base}/{id}.txt` once.
pub struct TextStore {
    client: Client,
    base: Source,
    cache: RwLock<HashMap<String, Arc<str>>>,
}

impl TextStore {
    pub fn new(client: Client, base: Source) -> Self {
        TextStore {
            client,
            base,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Text of `id`, or `None` when it cannot be loaded. Failures are not
    /// cached.
    pub async fn text(&self, id: &str) -> Option<Arc<str>> {
        if let Some(hit) = self.cache.read().await.get(id) {
            debug!("text cache hit - id={}", id);
            return Some(hit.clone());
        }
        let source = match self.base.join(&format!("{}.txt", id)) {
            Ok(source) => source,
            Err(e) => {
                warn!("Text source invalid - id={}, error={:#}", id, e);
                return None;
            }
        };
        match fetch_bytes_opt(&self.client, &source).await {
            Ok(Some(bytes)) => {
                let text: Arc<str> = String::from_utf8_lossy(&bytes).into();
                self.cache.write().await.insert(id.to_string(), text.clone());
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Text unavailable - id={}, error={:#}", id, e);
                None
            }
        }
    }

    pub async fn cached(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Precomputed match of a chunk with a chunk of the other document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMatch {
    pub partner: usize,
    pub similarity: f64,
    #[serde(skip)]
    pub dimension: String,
}

pub type MatchMap = BTreeMap<usize, ChunkMatch>;

/// Match maps for both sides of `(id_a, id_b)`, oriented to that order
/// whichever way the entry is stored. The first match of a chunk wins.
pub fn match_maps(pairs: Option<&ChunkPairs>, id_a: &str, id_b: &str) -> (MatchMap, MatchMap) {
    let mut map_a = MatchMap::new();
    let mut map_b = MatchMap::new();
    let Some((entry, swapped)) = pairs.and_then(|p| p.find(id_a, id_b)) else {
        return (map_a, map_b);
    };
    for top in &entry.top_chunks {
        let (a, b) = if swapped {
            (&top.chunk_b, &top.chunk_a)
        } else {
            (&top.chunk_a, &top.chunk_b)
        };
        map_a.entry(a.index).or_insert_with(|| ChunkMatch {
            partner: b.index,
            similarity: top.similarity,
            dimension: a.dimension.clone(),
        });
        map_b.entry(b.index).or_insert_with(|| ChunkMatch {
            partner: a.index,
            similarity: top.similarity,
            dimension: b.dimension.clone(),
        });
    }
    (map_a, map_b)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkView {
    pub index: usize,
    pub preview: String,
    pub dimension: String,
    #[serde(rename = "match")]
    pub matched: Option<ChunkMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Pane {
    Ready {
        chunks: Vec<ChunkView>,
        /// Chunks beyond the display cap.
        overflow: usize,
    },
    Unavailable,
}

impl Pane {
    pub fn chunks(&self) -> &[ChunkView] {
        match self {
            Pane::Ready { chunks, .. } => chunks,
            Pane::Unavailable => &[],
        }
    }
}

fn preview(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Chunk and label one pane. Precomputed matches supply the dimension;
/// other chunks get the keyword guess.
pub fn build_pane(text: Option<&str>, matches: &MatchMap, cfg: &ChunkConfig) -> Pane {
    let Some(text) = text else {
        return Pane::Unavailable;
    };
    let chunks = chunk_text(text, cfg.window, cfg.overlap);
    let overflow = chunks.len().saturating_sub(cfg.max_display);
    let views = chunks
        .par_iter()
        .take(cfg.max_display)
        .map(|c| {
            let matched = matches.get(&c.index).cloned();
            let dimension = match &matched {
                Some(m) if !m.dimension.is_empty() => m.dimension.clone(),
                _ => guess_dimension(&c.text).to_string(),
            };
            ChunkView {
                index: c.index,
                preview: preview(&c.text, cfg.preview_chars),
                dimension,
                matched,
            }
        })
        .collect();
    Pane::Ready { chunks: views, overflow }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaneHeader {
    pub id: String,
    pub label: String,
    pub color: String,
}

/// Chunks highlighted after a click.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub own: (Side, usize),
    pub partner: Option<(Side, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextComparison {
    pub headers: [PaneHeader; 2],
    pub a: Pane,
    pub b: Pane,
}

impl TextComparison {
    pub fn pane(&self, side: Side) -> &Pane {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// Highlight set for a click on chunk `index` of `side`: the chunk
    /// itself plus its partner on the other side when it has one on screen.
    pub fn click(&self, side: Side, index: usize) -> Option<Highlight> {
        let chunk = self.pane(side).chunks().iter().find(|c| c.index == index)?;
        let other = side.other();
        let partner = chunk
            .matched
            .as_ref()
            .map(|m| m.partner)
            .filter(|p| self.pane(other).chunks().iter().any(|c| c.index == *p))
            .map(|p| (other, p));
        Some(Highlight {
            own: (side, index),
            partner,
        })
    }
}

fn header(model: &SimilarityModel, id: &str) -> PaneHeader {
    let policy = model.policy(id);
    PaneHeader {
        id: id.to_string(),
        label: policy.map(|p| p.country.clone()).unwrap_or_else(|| id.to_string()),
        color: model.color(id),
    }
}

/// Fetch both texts concurrently and build the two panes. A pane whose text
/// cannot be loaded is `Unavailable` without affecting the other.
pub async fn compare(
    store: &TextStore,
    model: &SimilarityModel,
    pairs: Option<&ChunkPairs>,
    id_a: &str,
    id_b: &str,
    cfg: &ChunkConfig,
) -> TextComparison {
    let start = std::time::Instant::now();
    let (text_a, text_b) = futures::future::join(store.text(id_a), store.text(id_b)).await;
    let (map_a, map_b) = match_maps(pairs, id_a, id_b);

    let comparison = TextComparison {
        headers: [header(model, id_a), header(model, id_b)],
        a: build_pane(text_a.as_deref(), &map_a, cfg),
        b: build_pane(text_b.as_deref(), &map_b, cfg),
    };
    info!(
        "Text comparison completed - pair={}/{}, duration={:.2}s, chunks_a={}, chunks_b={}, matches={}",
        id_a,
        id_b,
        start.elapsed().as_secs_f32(),
        comparison.a.chunks().len(),
        comparison.b.chunks().len(),
        map_a.len()
    );
    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::models::{ChunkPairEntry, ChunkRef, TopChunk};

    fn cfg(max_display: usize) -> ChunkConfig {
        ChunkConfig {
            max_display,
            ..ChunkConfig::default()
        }
    }

    fn top(similarity: f64, a: usize, b: usize) -> TopChunk {
        let chunk = |index, dim: &str| ChunkRef {
            index,
            dimension: dim.to_string(),
            text: None,
        };
        TopChunk {
            similarity,
            chunk_a: chunk(a, "etica"),
            chunk_b: chunk(b, "equidad"),
        }
    }

    fn pairs() -> ChunkPairs {
        ChunkPairs {
            pairs: vec![ChunkPairEntry {
                doc_a: "B".into(),
                doc_b: "A".into(),
                similarity: Some(0.9),
                top_chunks: vec![top(0.91, 0, 2), top(0.88, 0, 1), top(0.80, 3, 0)],
            }],
        }
    }

    #[test]
    fn windows_overlap_and_keep_the_tail() {
        let text = "a".repeat(2000);
        let chunks = chunk_text(&text, 800, 200);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 600, 1200, 1800]);
        assert_eq!(chunks[3].text.len(), 200);
        assert!(chunk_text("", 800, 200).is_empty());
        assert!(chunk_text("   \n ", 800, 200).is_empty());
    }

    #[test]
    fn blank_windows_take_no_index() {
        let text = format!("abc{}xyz", " ".repeat(1500));
        let chunks = chunk_text(&text, 800, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].start, 1200);
        assert!(chunks[1].text.ends_with("xyz"));
    }

    #[test]
    fn windows_count_chars_not_bytes() {
        let chunks = chunk_text(&"é".repeat(10), 4, 1);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].text.chars().count(), 4);
    }

    #[test]
    fn keyword_guess() {
        assert_eq!(guess_dimension("Teacher training for every teacher"), "formacion_docente");
        assert_eq!(guess_dimension("ÉTICA, PRIVACIDAD y sesgo"), "etica");
        assert_eq!(guess_dimension("e\u{301}tica y privacidad"), "etica");
        assert_eq!(guess_dimension("nothing relevant"), DEFAULT_DIMENSION);
        // tie goes to the earlier family
        assert_eq!(guess_dimension("ley privacy"), "gobernanza");
    }

    #[test]
    fn match_maps_follow_caller_order() {
        let pairs = pairs();
        let (a, b) = match_maps(Some(&pairs), "A", "B");
        // stored as (B, A), so chunk_b belongs to A
        assert_eq!(a[&2].partner, 0);
        assert_eq!(a[&2].dimension, "equidad");
        assert_eq!(b[&0].partner, 2);
        assert_eq!(b[&0].similarity, 0.91);
        assert_eq!(b.len(), 2);
        assert_eq!(a[&0].partner, 3);

        let (a, b) = match_maps(None, "A", "B");
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn panes_cap_display_and_count_overflow() {
        let text = "x".repeat(5000);
        let pane = build_pane(Some(&text), &MatchMap::new(), &cfg(5));
        let Pane::Ready { chunks, overflow } = pane else {
            panic!("expected ready pane");
        };
        assert_eq!(chunks.len(), 5);
        assert_eq!(overflow, 4);
        assert!(chunks[0].preview.ends_with("..."));
        assert_eq!(chunks[0].preview.chars().count(), 303);
        assert_eq!(build_pane(None, &MatchMap::new(), &cfg(5)), Pane::Unavailable);
    }

    #[tokio::test]
    async fn panes_fail_independently_and_texts_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("{} research and innovation {}", "a".repeat(700), "b".repeat(900));
        std::fs::write(dir.path().join("A.txt"), &body).unwrap();
        let store = TextStore::new(Client::new(), Source::File(dir.path().to_path_buf()));
        let model = fixtures::abc_model();
        let pairs = pairs();

        let cmp = compare(&store, &model, None, "A", "B", &ChunkConfig::default()).await;
        assert_eq!(cmp.b, Pane::Unavailable);
        let dims: Vec<&str> = cmp.a.chunks().iter().map(|c| c.dimension.as_str()).collect();
        assert_eq!(dims, vec!["investigacion", "investigacion", DEFAULT_DIMENSION]);
        assert_eq!(cmp.headers[0].label, "Country A");
        assert_eq!(store.cached().await, 1);

        // precomputed matches override the keyword guess
        let cmp = compare(&store, &model, Some(&pairs), "A", "B", &ChunkConfig::default()).await;
        assert_eq!(cmp.a.chunks()[0].dimension, "equidad");
        assert_eq!(store.cached().await, 1);

        // partner pane is unavailable, so only the clicked chunk lights up
        let hl = cmp.click(Side::A, 0).unwrap();
        assert_eq!(hl.own, (Side::A, 0));
        assert_eq!(hl.partner, None);
        assert!(cmp.click(Side::B, 0).is_none());
    }

    #[tokio::test]
    async fn click_highlights_partner() {
        let dir = tempfile::tempdir().unwrap();
        for id in ["A", "B"] {
            std::fs::write(dir.path().join(format!("{}.txt", id)), "z".repeat(2500)).unwrap();
        }
        let store = TextStore::new(Client::new(), Source::File(dir.path().to_path_buf()));
        let model = fixtures::abc_model();
        let pairs = pairs();
        let cmp = compare(&store, &model, Some(&pairs), "A", "B", &ChunkConfig::default()).await;

        assert_eq!(cmp.click(Side::A, 2).unwrap().partner, Some((Side::B, 0)));
        assert_eq!(cmp.click(Side::B, 3).unwrap().partner, Some((Side::A, 0)));
        assert_eq!(cmp.click(Side::A, 4).unwrap().partner, None);
    }
}
