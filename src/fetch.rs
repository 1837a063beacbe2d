use anyhow::{Context, Result};
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{ChunkPairs, Dataset};
use crate::similarity::{DatasetId, SimilarityModel};

/// Where a document lives: an HTTP(S) URL or a local path.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Source::Http(url),
            _ => Source::File(PathBuf::from(raw)),
        }
    }

    /// `{base}/{name}`, keeping the base's kind.
    pub fn join(&self, name: &str) -> Result<Source> {
        match self {
            Source::Http(base) => {
                let mut base = base.clone();
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                let url = base
                    .join(name)
                    .with_context(|| format!("Joining {} onto {}", name, base))?;
                Ok(Source::Http(url))
            }
            Source::File(dir) => Ok(Source::File(dir.join(name))),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Http(url) => write!(f, "{}", url),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Fetch raw bytes; return Ok(None) when the document does not exist.
pub async fn fetch_bytes_opt(client: &Client, source: &Source) -> Result<Option<Vec<u8>>> {
    let start = std::time::Instant::now();
    debug!("Fetching document - source={}", source);

    let bytes = match source {
        Source::Http(url) => {
            let resp = client
                .get(url.clone())
                .send()
                .await
                .with_context(|| format!("Request failed for {}", url))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                warn!("Document not found (404) - {}", url);
                return Ok(None);
            }
            let resp = resp
                .error_for_status()
                .with_context(|| format!("HTTP error for {}", url))?;
            resp.bytes()
                .await
                .with_context(|| format!("Reading body of {}", url))?
                .to_vec()
        }
        Source::File(path) => match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Document not found - {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("Reading {}", path.display())),
        },
    };

    info!(
        "Document fetch completed - source={}, duration={:.2}s, bytes={}",
        source,
        start.elapsed().as_secs_f32(),
        bytes.len()
    );
    Ok(Some(bytes))
}

/// Parse and check a `results.json` document, fingerprinting its bytes.
pub fn parse_dataset(bytes: &[u8], zero_is_missing: bool) -> Result<SimilarityModel> {
    let dataset: Dataset = serde_json::from_slice(bytes).context("Decoding results.json")?;
    dataset.validate()?;
    let id = DatasetId::of_bytes(bytes);
    debug!(
        "Dataset parsed - id={}, policies={}, dimensions={}",
        id,
        dataset.policy_ids.len(),
        dataset.dimension_labels.len()
    );
    Ok(SimilarityModel::new(dataset, id, zero_is_missing))
}

/// Load the dataset, falling back to the empty placeholder when it cannot be
/// fetched or parsed so the rest of the dashboard still renders.
pub async fn load_dataset(client: &Client, source: &Source, zero_is_missing: bool) -> SimilarityModel {
    let loaded = match fetch_bytes_opt(client, source).await {
        Ok(Some(bytes)) => parse_dataset(&bytes, zero_is_missing).map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };
    match loaded {
        Ok(Some(model)) => {
            info!("Dataset loaded - id={}, policies={}", model.id(), model.len());
            model
        }
        Ok(None) => {
            warn!("Dataset unavailable, using placeholder - source={}", source);
            placeholder_model(zero_is_missing)
        }
        Err(e) => {
            warn!("Dataset unavailable, using placeholder - source={}, error={:#}", source, e);
            placeholder_model(zero_is_missing)
        }
    }
}

fn placeholder_model(zero_is_missing: bool) -> SimilarityModel {
    let dataset = Dataset::placeholder();
    let id = DatasetId::of_dataset(&dataset);
    SimilarityModel::new(dataset, id, zero_is_missing)
}

/// Optional `chunk_pairs.json`; any failure means no precomputed matches.
pub async fn load_chunk_pairs(client: &Client, source: &Source) -> Option<ChunkPairs> {
    let bytes = match fetch_bytes_opt(client, source).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return None,
        Err(e) => {
            warn!("Chunk pairs unavailable - source={}, error={:#}", source, e);
            return None;
        }
    };
    match serde_json::from_slice::<ChunkPairs>(&bytes) {
        Ok(pairs) => {
            info!("Chunk pairs loaded - pairs={}", pairs.pairs.len());
            Some(pairs)
        }
        Err(e) => {
            warn!("Chunk pairs unreadable - source={}, error={}", source, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn sources_distinguish_urls_from_paths() {
        assert!(matches!(Source::parse("https://x.org/data/results.json"), Source::Http(_)));
        assert!(matches!(Source::parse("web/data/results.json"), Source::File(_)));
        assert!(matches!(Source::parse("C:/data/results.json"), Source::File(_)));

        let base = Source::parse("https://x.org/policies/processed");
        assert_eq!(
            base.join("espana.txt").unwrap().to_string(),
            "https://x.org/policies/processed/espana.txt"
        );
        let dir = Source::parse("policies/processed");
        assert_eq!(dir.join("espana.txt").unwrap(), Source::File(PathBuf::from("policies/processed/espana.txt")));
    }

    #[tokio::test]
    async fn missing_dataset_falls_back_to_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::File(dir.path().join("results.json"));
        let model = load_dataset(&Client::new(), &source, true).await;
        assert!(model.is_empty());
        assert_eq!(model.dimension_keys().len(), 7);
    }

    #[tokio::test]
    async fn asymmetric_dataset_is_rejected() {
        let mut data = fixtures::abc_dataset();
        data.similarity_matrix[0][1] = 0.1;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, serde_json::to_vec(&data).unwrap()).unwrap();

        assert!(parse_dataset(&std::fs::read(&path).unwrap(), true).is_err());
        let model = load_dataset(&Client::new(), &Source::File(path), true).await;
        assert!(model.is_empty());
    }

    #[tokio::test]
    async fn dataset_id_is_the_fingerprint_of_the_bytes() {
        let bytes = serde_json::to_vec(&fixtures::sample_dataset()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, &bytes).unwrap();

        let model = load_dataset(&Client::new(), &Source::File(path), true).await;
        assert_eq!(model.len(), 6);
        assert_eq!(model.id(), DatasetId::of_bytes(&bytes));
    }

    #[tokio::test]
    async fn broken_chunk_pairs_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunk_pairs.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(load_chunk_pairs(&Client::new(), &Source::File(path)).await.is_none());
        let missing = Source::File(dir.path().join("nope.json"));
        assert!(load_chunk_pairs(&Client::new(), &missing).await.is_none());
    }
}
