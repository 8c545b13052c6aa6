//! Dashboard orchestration.
//!
//! The [`Dashboard`] sequences loading, filtering, aggregation and
//! rendering on navigation and filter events. It owns the filter state
//! and the current view; the loader owns the fetch cache.

use super::sections::{build_view, BuildOptions, Resources};
use super::{Notice, Renderer, Section, SectionView};
use crate::analysis::{FilterChange, FilterState};
use crate::loader::{resource_url, DataLoader};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Dashboard settings.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Base URL or directory of the extracts.
    pub source: String,
    pub build: BuildOptions,
}

/// The view controller.
pub struct Dashboard<R: Renderer> {
    loader: Arc<DataLoader>,
    renderer: R,
    options: DashboardOptions,
    filters: FilterState,
    section: Option<Section>,
    resources: Resources,
    view: Option<SectionView>,
    notices: Vec<Notice>,
}

impl<R: Renderer> Dashboard<R> {
    pub fn new(loader: Arc<DataLoader>, renderer: R, options: DashboardOptions) -> Self {
        Self {
            loader,
            renderer,
            options,
            filters: FilterState::default(),
            section: None,
            resources: Resources::new(),
            view: None,
            notices: Vec::new(),
        }
    }

    /// Navigate to a section: reset filters, make sure its resources are
    /// loaded, then build and render its view.
    pub async fn activate(&mut self, section: Section) -> &SectionView {
        info!("Activating section: {}", section);
        self.filters.reset();
        self.section = Some(section);

        let urls: Vec<String> = section
            .resources()
            .iter()
            .map(|kind| resource_url(&self.options.source, *kind))
            .collect();
        let loaded = join_all(urls.iter().map(|url| self.loader.load(url))).await;

        self.resources = section
            .resources()
            .iter()
            .copied()
            .zip(loaded)
            .collect();

        let fallbacks: Vec<String> = self
            .resources
            .values()
            .filter(|r| r.is_fallback())
            .map(|r| r.kind.to_string())
            .collect();
        if !fallbacks.is_empty() {
            self.notices.push(Notice::warning(format!(
                "{} : données de démonstration affichées ({} indisponible)",
                section.title(),
                fallbacks.join(", ")
            )));
        }

        self.refresh()
    }

    /// Apply one filter action and re-render from the loaded data.
    pub fn apply_filter(&mut self, change: FilterChange) -> Option<&SectionView> {
        self.apply_filters([change])
    }

    /// Apply several filter actions, re-rendering once. Rejected changes
    /// become notices; the remaining changes still apply.
    pub fn apply_filters(
        &mut self,
        changes: impl IntoIterator<Item = FilterChange>,
    ) -> Option<&SectionView> {
        for change in changes {
            debug!("Filter change: {:?}", change);
            if let Err(e) = self.filters.apply_change(change) {
                warn!("Filter change rejected: {}", e);
                self.notices.push(Notice::warning(e.to_string()));
            }
        }

        self.section?;
        Some(self.refresh())
    }

    fn refresh(&mut self) -> &SectionView {
        let section = self.section.unwrap_or(Section::Parcelles);
        if !self.filters.is_empty() {
            debug!("Active filters: {}", self.filters.describe().join(", "));
        }
        let view = build_view(
            section,
            &self.resources,
            &self.filters,
            self.options.build,
        );

        if let Err(e) = self.renderer.render(&view) {
            warn!("Rendering {} failed: {:#}", section, e);
            self.notices.push(Notice::error(format!(
                "Impossible d'afficher « {} » : {}",
                section.title(),
                e
            )));
        }

        self.view.insert(view)
    }

    #[allow(dead_code)] // Accessor for embedders
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    #[allow(dead_code)] // Accessor for embedders
    pub fn current_view(&self) -> Option<&SectionView> {
        self.view.as_ref()
    }

    /// Drain pending user-visible notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    #[allow(dead_code)] // Accessor for embedders
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{FetchError, LoaderConfig, Transport};
    use crate::view::NoticeLevel;
    use futures::FutureExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serves fixed bodies by file name and counts fetches per URL.
    #[derive(Default)]
    struct FixtureTransport {
        bodies: HashMap<&'static str, &'static str>,
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl Transport for FixtureTransport {
        fn fetch(&self, url: &str) -> crate::loader::transport::FetchFuture {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self
                .calls
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default() += 1;

            let name = url.rsplit('/').next().unwrap_or(url);
            let body = self.bodies.get(name).copied();
            let url = url.to_string();
            async move {
                body.map(|b| b.as_bytes().to_vec())
                    .ok_or(FetchError::Status { url, status: 404 })
            }
            .boxed()
        }
    }

    /// Records rendered views, optionally failing.
    #[derive(Default)]
    struct RecordingRenderer {
        rendered: Vec<SectionView>,
        fail: bool,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, view: &SectionView) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("canvas unavailable");
            }
            self.rendered.push(view.clone());
            Ok(())
        }
    }

    const PARCELLES: &str = r#"[
        {"commune": "Bala", "nicad": "Oui", "deliberee": "Oui", "region": "Tambacounda"},
        {"commune": "Bala", "nicad": "Non", "deliberee": "Non", "region": "Tambacounda"},
        {"commune": "Koar", "nicad": "Oui", "deliberee": "Non", "region": "Tambacounda"}
    ]"#;

    const TOPO: &str = r#"[
        {"date": "2025-03-02", "prenom": "Awa", "nom": "Ba", "commune": "Bala", "champs": 5, "batis": 1},
        {"date": "2025-04-10", "prenom": "Awa", "nom": "Ba", "commune": "Bala", "champs": 2, "batis": 2}
    ]"#;

    fn dashboard(
        renderer: RecordingRenderer,
    ) -> (Dashboard<RecordingRenderer>, Arc<FixtureTransport>) {
        let mut bodies = HashMap::new();
        bodies.insert("parcelles.json", PARCELLES);
        bodies.insert("topoData.json", TOPO);
        let transport = Arc::new(FixtureTransport {
            bodies,
            ..Default::default()
        });

        let loader = Arc::new(DataLoader::new(
            transport.clone(),
            LoaderConfig {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                deadline: None,
            },
        ));
        let options = DashboardOptions {
            source: "data".to_string(),
            build: BuildOptions::default(),
        };
        (Dashboard::new(loader, renderer, options), transport)
    }

    #[tokio::test]
    async fn test_filter_change_does_not_refetch() {
        let (mut dash, transport) = dashboard(RecordingRenderer::default());

        let view = dash.activate(Section::Parcelles).await;
        assert_eq!(view.kpis[0].value, "3");
        assert_eq!(transport.total.load(Ordering::SeqCst), 1);

        let view = dash
            .apply_filter(FilterChange::Commune(Some("Bala".to_string())))
            .unwrap();
        assert_eq!(view.kpis[0].value, "2");
        assert_eq!(transport.total.load(Ordering::SeqCst), 1);
        assert_eq!(dash.renderer().rendered.len(), 2);
    }

    #[tokio::test]
    async fn test_navigation_resets_filters_and_uses_cache() {
        let (mut dash, transport) = dashboard(RecordingRenderer::default());

        dash.activate(Section::Parcelles).await;
        dash.apply_filter(FilterChange::Nicad(Some("Oui".to_string())));
        assert!(!dash.filters().is_empty());

        dash.activate(Section::Topo).await;
        assert!(dash.filters().is_empty());

        let view = dash.activate(Section::Parcelles).await;
        assert_eq!(view.kpis[0].value, "3");
        assert_eq!(transport.total.load(Ordering::SeqCst), 2);
        assert_eq!(transport.calls.lock().unwrap()["data/parcelles.json"], 1);
    }

    #[tokio::test]
    async fn test_inverted_date_range_becomes_notice() {
        let (mut dash, _) = dashboard(RecordingRenderer::default());
        dash.activate(Section::Topo).await;

        let view = dash
            .apply_filter(FilterChange::DateRange {
                start: Some("2025-05-01".to_string()),
                end: Some("2025-04-01".to_string()),
            })
            .unwrap();

        assert_eq!(view.kpis[0].value, "0");
        assert_eq!(dash.filters().date_end, None);

        let notices = dash.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(dash.take_notices().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_resources_degrade_with_notice() {
        let (mut dash, transport) = dashboard(RecordingRenderer::default());

        let view = dash.activate(Section::Genre).await;
        assert!(view.degraded);
        assert_eq!(view.fallback_resources.len(), 3);
        assert_ne!(view.kpis[0].value, "0");

        // 3 resources, 2 attempts each.
        assert_eq!(transport.total.load(Ordering::SeqCst), 6);

        let notices = dash.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("repartitionGenre"));
    }

    #[tokio::test]
    async fn test_render_failure_is_reported_not_propagated() {
        let renderer = RecordingRenderer {
            fail: true,
            ..Default::default()
        };
        let (mut dash, _) = dashboard(renderer);

        let view = dash.activate(Section::Parcelles).await;
        assert_eq!(view.section, Section::Parcelles);

        let notices = dash.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("canvas unavailable"));
    }

    #[test]
    fn test_filter_before_navigation_has_no_view() {
        let (mut dash, _) = dashboard(RecordingRenderer::default());
        assert!(dash
            .apply_filter(FilterChange::Commune(Some("Bala".to_string())))
            .is_none());
        assert!(dash.current_view().is_none());
        assert!(dash.renderer().rendered.is_empty());
    }
}
