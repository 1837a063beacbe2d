use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::charts::{ChartKind, Surface, SurfaceProvider, View};
use crate::similarity::SimilarityModel;
use crate::state::{Filters, Snapshot};
use crate::text::TextComparison;

/* -------------------------------------------------------------------------- */
/* JSON surfaces                                                              */
/* -------------------------------------------------------------------------- */

/// Surface that keeps the latest view drawn into it.
#[derive(Debug, Default)]
pub struct JsonSurface {
    latest: Option<View>,
    draws: usize,
}

impl Surface for JsonSurface {
    fn supports(&self, _kind: ChartKind) -> bool {
        true
    }

    fn draw(&mut self, view: View) {
        self.latest = Some(view);
        self.draws += 1;
    }
}

/// One [`JsonSurface`] per known container.
#[derive(Debug, Default)]
pub struct JsonSurfaces {
    surfaces: BTreeMap<String, JsonSurface>,
}

impl JsonSurfaces {
    pub fn new<I, S>(containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        JsonSurfaces {
            surfaces: containers
                .into_iter()
                .map(|c| (c.into(), JsonSurface::default()))
                .collect(),
        }
    }

    pub fn view(&self, container: &str) -> Option<&View> {
        self.surfaces.get(container).and_then(|s| s.latest.as_ref())
    }

    pub fn draws(&self, container: &str) -> usize {
        self.surfaces.get(container).map(|s| s.draws).unwrap_or(0)
    }

    /// Containers holding a view, in name order.
    pub fn rendered(&self) -> impl Iterator<Item = (&str, &View)> {
        self.surfaces
            .iter()
            .filter_map(|(name, s)| s.latest.as_ref().map(|v| (name.as_str(), v)))
    }
}

impl SurfaceProvider for JsonSurfaces {
    fn surface(&mut self, container: &str) -> Option<&mut dyn Surface> {
        self.surfaces.get_mut(container).map(|s| s as &mut dyn Surface)
    }
}

/* -------------------------------------------------------------------------- */
/* Files                                                                      */
/* -------------------------------------------------------------------------- */

pub const INDEX_FILE: &str = "view.index.json";
pub const COMPARISON_FILE: &str = "text.comparison.json";

#[derive(Debug, Clone, Serialize)]
pub struct ExportCounts {
    pub policies: usize,
    pub pairs: usize,
    pub views: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportIndex {
    pub version: u32,
    pub dataset: String,
    pub embedding_model: String,
    pub generated_at: Option<String>,
    pub selection: Vec<String>,
    pub filters: Filters,
    pub counts: ExportCounts,
    pub files: Vec<String>,
}

pub fn write_json<P: AsRef<Path>, T: ?Sized + Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, serde_json::to_vec_pretty(value)?).with_context(|| format!("write {:?}", path))
}

pub fn view_file(container: &str) -> String {
    format!("view.{}.json", container)
}

/// Write every rendered view, the optional text comparison, and an index
/// into `out_dir`.
pub fn write_views(
    out_dir: &Path,
    surfaces: &JsonSurfaces,
    model: &SimilarityModel,
    snapshot: &Snapshot,
    comparison: Option<&TextComparison>,
) -> Result<ExportIndex> {
    let start = std::time::Instant::now();
    fs::create_dir_all(out_dir).with_context(|| format!("create {:?}", out_dir))?;

    let mut files = Vec::new();
    for (container, view) in surfaces.rendered() {
        let name = view_file(container);
        write_json(out_dir.join(&name), view)?;
        debug!("view written - container={} kind={}", container, view.kind());
        files.push(name);
    }
    let views = files.len();

    if let Some(cmp) = comparison {
        write_json(out_dir.join(COMPARISON_FILE), cmp)?;
        files.push(COMPARISON_FILE.to_string());
    }

    let meta = &model.dataset().metadata;
    let index = ExportIndex {
        version: 1,
        dataset: model.id().to_string(),
        embedding_model: meta.embedding_model.clone(),
        generated_at: meta.generated_at().map(|t| t.to_string()),
        selection: snapshot.selection.clone(),
        filters: snapshot.filters.clone(),
        counts: ExportCounts {
            policies: model.len(),
            pairs: model.all_pairs_sorted().len(),
            views,
        },
        files,
    };
    write_json(out_dir.join(INDEX_FILE), &index)?;

    info!(
        "Export completed - dir={}, duration={:.2}s, views={}",
        out_dir.display(),
        start.elapsed().as_secs_f32(),
        views
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::testing::render_with;
    use crate::charts::Histogram;
    use crate::fixtures;

    #[test]
    fn surfaces_keep_the_latest_view() {
        let model = fixtures::sample_model();
        let mut surfaces = JsonSurfaces::new(["histogram", "radar"]);
        let view = render_with(&Histogram, &model, &Snapshot::default()).unwrap();
        for _ in 0..2 {
            if let Some(s) = surfaces.surface("histogram") {
                s.draw(view.clone());
            }
        }
        assert!(surfaces.surface("missing").is_none());
        assert_eq!(surfaces.draws("histogram"), 2);
        assert_eq!(surfaces.rendered().count(), 1);
        assert!(surfaces.view("radar").is_none());
    }

    #[test]
    fn writes_views_and_index() {
        let model = fixtures::sample_model();
        let mut surfaces = JsonSurfaces::new(["histogram"]);
        if let Some(s) = surfaces.surface("histogram") {
            s.draw(render_with(&Histogram, &model, &Snapshot::default()).unwrap());
        }
        let dir = tempfile::tempdir().unwrap();
        let index = write_views(dir.path(), &surfaces, &model, &Snapshot::default(), None).unwrap();

        assert_eq!(index.files, vec!["view.histogram.json".to_string()]);
        assert_eq!(index.counts.pairs, 15);
        let raw = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["counts"]["views"], 1);
        assert_eq!(json["filters"]["region"], "all");
        let view: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("view.histogram.json")).unwrap()).unwrap();
        assert_eq!(view["kind"], "histogram");
    }
}
