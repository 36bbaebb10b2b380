//! Application state management

use std::sync::Arc;

use crate::cache::{AttachmentLoader, BlobCache, BlobFetcher};
use crate::config::Config;
use crate::registry::HtmlSnapshotDocument;
use crate::render::{DocumentEngine, RendererDispatch};
use crate::viewer::ViewerContext;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    host: Arc<HtmlSnapshotDocument>,
    viewer: ViewerContext,
}

impl AppState {
    /// Wire the viewer up against a markup-snapshot host document
    pub fn new(
        config: Config,
        fetcher: Arc<dyn BlobFetcher>,
        engine: Option<Arc<dyn DocumentEngine>>,
    ) -> Self {
        let host = Arc::new(HtmlSnapshotDocument::new(config.markup.clone()));
        let loader = AttachmentLoader::new(BlobCache::new(config.cache.clone()), fetcher);
        let renderer = RendererDispatch::new(engine, config.render.timeout_secs);

        let viewer = ViewerContext::new(
            config.viewer.clone(),
            config.identity.clone(),
            host.clone(),
            loader,
            config.preload.clone(),
            renderer,
        );

        Self {
            inner: Arc::new(AppStateInner { config, host, viewer }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn host(&self) -> &HtmlSnapshotDocument {
        &self.inner.host
    }

    pub fn viewer(&self) -> &ViewerContext {
        &self.inner.viewer
    }
}
