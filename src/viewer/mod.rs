//! Viewer controller
//!
//! `ViewerContext` is the composition root of the viewer: it owns the
//! registry, the loader and preloader, the renderer dispatch and the
//! viewer state, and exposes the operations the UI drives (rescan, open,
//! navigation, zoom, search, download).
//!
//! All mutable viewer state sits behind one `parking_lot::Mutex` that is
//! never held across an `.await`. Foreground loads are guarded: while the
//! viewer is opening or navigating, further navigation is ignored.

mod intent;
mod notice;
mod state;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

use crate::cache::{extension_for, AttachmentLoader, CacheEntry, FetchError, FetchPriority, PreloadConfig, Preloader};
use crate::registry::{AttachmentRecord, AttachmentRegistry, HostDocument, HostError, IdentityRules, RescanReport};
use crate::render::{RasterConfig, RasterPage, RasterPolicy, RenderError, RenderedView, RendererDispatch, ZoomEffect};
use crate::scheduler::{Debouncer, Throttle, ThrottleOutcome};
use crate::search::{ScrollAnimation, SearchSnapshot};

pub use intent::{key_command, KeyCommand, ViewerIntent};
pub use notice::{Notice, NoticeAction, NoticeKind};
pub use state::{ViewContent, ViewerPhase, ZoomConfig};

use state::ViewerState;

/// Viewer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ViewerConfig {
    pub zoom: ZoomConfig,
    pub raster: RasterConfig,
    /// Quiet period after the last keystroke before searching
    pub search_debounce_ms: u64,
    /// Minimum interval between rescans triggered by host mutations
    pub rescan_interval_ms: u64,
    /// Lifetime of an undismissed notice
    pub notice_timeout_secs: u64,
    /// Duration of the scroll to the active match
    pub scroll_duration_ms: u64,
    /// Gap between pages on the viewer surface, in pixels
    pub page_gap: f32,
    /// Viewport size until the surface reports its own
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomConfig::default(),
            raster: RasterConfig::default(),
            search_debounce_ms: 300,
            rescan_interval_ms: 250,
            notice_timeout_secs: 12,
            scroll_duration_ms: 400,
            page_gap: 16.0,
            viewport_width: 1280.0,
            viewport_height: 800.0,
        }
    }
}

/// Viewer errors
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Viewer is not open")]
    NotOpen,

    #[error("No attachment at position {0}")]
    OutOfRange(usize),

    #[error("Unknown attachment: {0}")]
    UnknownAttachment(String),

    #[error("No document is open")]
    NoDocument,

    #[error("Nothing to download")]
    NothingToDownload,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Navigation {
    /// The item was loaded and is on screen (possibly as an inline error)
    Shown,
    /// Dropped: a load is in flight, the target is current, or out of range
    Ignored,
}

/// Payload handed out by the download action
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
    /// Hex SHA-256 of the payload
    pub digest: String,
    pub cached_at: DateTime<Utc>,
}

/// What handling an intent produced
#[derive(Debug, Clone)]
pub enum IntentOutcome {
    Updated,
    Ignored,
    Download(Download),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterSnapshot {
    pub zoom: f32,
    pub generation: u64,
    pub css_scale: f32,
}

/// Serializable view of the viewer for the UI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerSnapshot {
    pub phase: ViewerPhase,
    pub current: Option<usize>,
    pub count: usize,
    pub zoom: f32,
    pub search_active: bool,
    pub transitioning: bool,
    pub content: ViewContent,
    pub raster: Option<RasterSnapshot>,
    pub search: SearchSnapshot,
    pub scroll_top: f32,
    pub scroll_animation: Option<ScrollAnimation>,
    pub notice: Option<Notice>,
    pub nav_revision: u64,
}

/// Download filename: the display name, plus an extension from the MIME
/// type unless the name already carries one matching it
pub fn download_filename(display_name: &str, mime: &str) -> String {
    let has_matching_extension = Path::new(display_name).extension().is_some()
        && mime_guess::from_path(display_name)
            .iter()
            .any(|guess| guess.essence_str().eq_ignore_ascii_case(mime));

    match extension_for(mime) {
        Some(ext) if !has_matching_extension => format!("{}.{}", display_name, ext),
        _ => display_name.to_string(),
    }
}

/// Viewer context
#[derive(Clone)]
pub struct ViewerContext {
    inner: Arc<ViewerInner>,
}

struct ViewerInner {
    config: ViewerConfig,
    host: Arc<dyn HostDocument>,
    registry: RwLock<AttachmentRegistry>,
    loader: AttachmentLoader,
    preloader: Preloader,
    renderer: RendererDispatch,
    state: Mutex<ViewerState>,
    invalidated: AtomicBool,
    rescan_throttle: Throttle,
    search_debouncer: Debouncer,
    raster_debouncer: Debouncer,
    notice_timer: Debouncer,
}

impl ViewerContext {
    pub fn new(
        config: ViewerConfig,
        identity: IdentityRules,
        host: Arc<dyn HostDocument>,
        loader: AttachmentLoader,
        preload: PreloadConfig,
        renderer: RendererDispatch,
    ) -> Self {
        let state = ViewerState::new(
            config.zoom.default,
            (config.viewport_width, config.viewport_height),
            RasterPolicy::new(config.raster.clone()),
        );

        Self {
            inner: Arc::new(ViewerInner {
                host,
                registry: RwLock::new(AttachmentRegistry::new(identity)),
                preloader: Preloader::new(loader.clone(), preload),
                loader,
                renderer,
                state: Mutex::new(state),
                invalidated: AtomicBool::new(false),
                rescan_throttle: Throttle::new(Duration::from_millis(config.rescan_interval_ms)),
                search_debouncer: Debouncer::new(Duration::from_millis(config.search_debounce_ms)),
                raster_debouncer: Debouncer::new(Duration::from_millis(config.raster.debounce_ms)),
                notice_timer: Debouncer::new(Duration::from_secs(config.notice_timeout_secs)),
                config,
            }),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.inner.config
    }

    pub fn loader(&self) -> &AttachmentLoader {
        &self.inner.loader
    }

    pub fn preloader(&self) -> &Preloader {
        &self.inner.preloader
    }

    /// Whether paginated documents can be previewed at all
    pub fn has_document_engine(&self) -> bool {
        self.inner.renderer.has_engine()
    }

    // ---- registry ----

    /// Reconcile the registry against the host document
    ///
    /// Cache entries of purged hashes are dropped. While the viewer is
    /// open, the current item is followed to its new ordinal, and a change
    /// in attachment count refreshes navigation and restarts preloading.
    pub async fn rescan(&self) -> Result<RescanReport, ViewerError> {
        let markers = match self.inner.host.markers().await {
            Ok(markers) => markers,
            Err(HostError::ContextInvalidated) => {
                self.raise_context_invalidated();
                return Err(HostError::ContextInvalidated.into());
            }
            Err(e) => return Err(e.into()),
        };
        self.inner.invalidated.store(false, Ordering::SeqCst);

        let (report, records) = {
            let mut registry = self.inner.registry.write();
            let report = registry.reconcile(&markers);
            (report, registry.records().to_vec())
        };

        for hash in &report.removed {
            self.inner.loader.cache().remove_hash(hash).await;
        }

        tracing::info!(
            count = report.count,
            added = report.added.len(),
            removed = report.removed.len(),
            "Rescanned host document"
        );

        let restart = {
            let mut st = self.inner.state.lock();
            if st.phase == ViewerPhase::Closed {
                None
            } else {
                if let Some(hash) = st.current_hash.clone() {
                    st.current = match records.iter().position(|r| r.content_hash == hash) {
                        Some(ordinal) => Some(ordinal),
                        None if records.is_empty() => None,
                        None => st.current.map(|ordinal| ordinal.min(records.len() - 1)),
                    };
                }
                if report.count_changed {
                    st.nav_revision += 1;
                    st.current
                } else {
                    None
                }
            }
        };

        if records.is_empty() && self.phase() == ViewerPhase::Open {
            self.close();
        } else if let Some(current) = restart {
            self.inner.preloader.start_preloading(current, &records).await;
        }

        Ok(report)
    }

    /// Rescan after a host mutation, throttled with a trailing run
    pub fn schedule_rescan(&self) -> ThrottleOutcome {
        let ctx = self.clone();
        self.inner.rescan_throttle.trigger(move || async move {
            if let Err(e) = ctx.rescan().await {
                tracing::warn!(error = %e, "Scheduled rescan failed");
            }
        })
    }

    pub fn records(&self) -> Vec<AttachmentRecord> {
        self.inner.registry.read().records().to_vec()
    }

    pub fn count(&self) -> usize {
        self.inner.registry.read().len()
    }

    fn record(&self, ordinal: usize) -> Result<AttachmentRecord, ViewerError> {
        self.inner
            .registry
            .read()
            .get(ordinal)
            .cloned()
            .ok_or(ViewerError::OutOfRange(ordinal))
    }

    /// Foreground load of a record's payload through the cache
    pub async fn load(&self, ordinal: usize) -> Result<Arc<CacheEntry>, ViewerError> {
        let record = self.record(ordinal)?;
        self.fetch(&record).await.map_err(Into::into)
    }

    async fn fetch(&self, record: &AttachmentRecord) -> Result<Arc<CacheEntry>, FetchError> {
        if self.inner.invalidated.load(Ordering::SeqCst) {
            return Err(FetchError::ContextInvalidated);
        }
        self.inner.loader.load(record, FetchPriority::High).await
    }

    // ---- navigation ----

    /// Open the viewer on an item, or move to it when already open
    pub async fn open(&self, ordinal: usize) -> Result<Navigation, ViewerError> {
        let record = self.record(ordinal)?;
        let token = {
            let mut st = self.inner.state.lock();
            match st.phase {
                ViewerPhase::Opening | ViewerPhase::Navigating => {
                    tracing::debug!(ordinal, "Load in flight, ignoring open");
                    return Ok(Navigation::Ignored);
                }
                ViewerPhase::Open if st.current == Some(ordinal) => return Ok(Navigation::Ignored),
                ViewerPhase::Open => st.phase = ViewerPhase::Navigating,
                ViewerPhase::Closed => {
                    st.phase = ViewerPhase::Opening;
                    st.current = Some(ordinal);
                    st.current_hash = Some(record.content_hash.clone());
                    st.filename = Some(record.display_name.clone());
                    st.content = ViewContent::Loading {
                        filename: record.display_name.clone(),
                    };
                }
            }
            st.load_token += 1;
            st.load_token
        };

        tracing::info!(ordinal, hash = %record.content_hash, "Opening attachment");
        self.show(record, token).await
    }

    /// Open the viewer on the item with the given content hash
    pub async fn open_hash(&self, hash: &str) -> Result<Navigation, ViewerError> {
        let ordinal = self
            .inner
            .registry
            .read()
            .ordinal_of(hash)
            .ok_or_else(|| ViewerError::UnknownAttachment(hash.to_string()))?;
        self.open(ordinal).await
    }

    /// Move to an item while open; out-of-range targets are ignored
    pub async fn goto(&self, ordinal: usize) -> Result<Navigation, ViewerError> {
        match self.phase() {
            ViewerPhase::Closed => Err(ViewerError::NotOpen),
            _ if ordinal >= self.count() => Ok(Navigation::Ignored),
            _ => self.open(ordinal).await,
        }
    }

    /// Next item; no wraparound at the end
    pub async fn next(&self) -> Result<Navigation, ViewerError> {
        let current = self.current().ok_or(ViewerError::NotOpen)?;
        self.goto(current + 1).await
    }

    /// Previous item; no wraparound at the start
    pub async fn previous(&self) -> Result<Navigation, ViewerError> {
        let current = self.current().ok_or(ViewerError::NotOpen)?;
        match current.checked_sub(1) {
            Some(target) => self.goto(target).await,
            None => Ok(Navigation::Ignored),
        }
    }

    /// Load, render and commit an item, then warm its neighbours
    async fn show(&self, record: AttachmentRecord, token: u64) -> Result<Navigation, ViewerError> {
        let loaded = self.fetch(&record).await;
        let view = match &loaded {
            Ok(entry) => Some(self.inner.renderer.render(entry).await),
            Err(_) => None,
        };

        let filename = record.display_name.clone();
        let mut invalidated = false;
        let mut preload = false;
        let ordinal = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            if st.load_token != token || st.phase == ViewerPhase::Closed {
                tracing::debug!(ordinal = record.ordinal, "Discarding stale load");
                return Ok(Navigation::Ignored);
            }

            // A rescan may have moved or purged the record while it loaded
            let Some(ordinal) = self.inner.registry.read().ordinal_of(&record.content_hash) else {
                tracing::debug!(hash = %record.content_hash, "Loaded attachment left the host document");
                if st.phase == ViewerPhase::Opening {
                    st.phase = ViewerPhase::Closed;
                    st.current = None;
                    st.current_hash = None;
                    st.filename = None;
                    st.content = ViewContent::Empty;
                } else {
                    st.phase = ViewerPhase::Open;
                }
                return Ok(Navigation::Ignored);
            };

            self.inner.search_debouncer.cancel();
            self.inner.raster_debouncer.cancel();
            st.clear_item();
            st.phase = ViewerPhase::Open;
            st.current = Some(ordinal);
            st.current_hash = Some(record.content_hash.clone());
            st.filename = Some(filename.clone());
            st.zoom = self.inner.config.zoom.default;

            st.content = match (loaded, view) {
                (Ok(entry), Some(view)) => {
                    preload = true;
                    let content = match view {
                        RenderedView::Document(doc) => {
                            let content = ViewContent::Document {
                                filename,
                                mime: entry.mime.clone(),
                                page_count: doc.pages.len(),
                            };
                            st.document = Some(doc);
                            content
                        }
                        RenderedView::Image(image) => ViewContent::Image { filename, image },
                        RenderedView::DownloadOnly { reason } => ViewContent::DownloadOnly {
                            filename,
                            mime: entry.mime.clone(),
                            reason,
                        },
                        RenderedView::NoPreview { mime } => ViewContent::NoPreview { filename, mime },
                    };
                    st.entry = Some(entry);
                    content
                }
                (Err(FetchError::ContextInvalidated), _) => {
                    invalidated = true;
                    ViewContent::ContextInvalidated
                }
                (Err(e), _) => {
                    tracing::warn!(hash = %record.content_hash, error = %e, "Attachment load failed");
                    ViewContent::LoadFailed {
                        filename,
                        reason: e.to_string(),
                    }
                }
                (Ok(_), None) => ViewContent::Empty,
            };
            ordinal
        };

        if invalidated {
            self.raise_context_invalidated();
        }
        if preload {
            let records = self.records();
            self.inner.preloader.start_preloading(ordinal, &records).await;
        }

        Ok(Navigation::Shown)
    }

    /// Close the viewer; in-flight fetches run to completion
    pub fn close(&self) {
        self.inner.search_debouncer.cancel();
        self.inner.raster_debouncer.cancel();
        self.inner.preloader.clear_pending();

        let mut st = self.inner.state.lock();
        if st.phase == ViewerPhase::Closed {
            return;
        }
        st.clear_item();
        st.phase = ViewerPhase::Closed;
        st.current = None;
        st.current_hash = None;
        st.filename = None;
        st.content = ViewContent::Empty;
        st.zoom = self.inner.config.zoom.default;
        st.load_token += 1;
        tracing::info!("Viewer closed");
    }

    pub fn phase(&self) -> ViewerPhase {
        self.inner.state.lock().phase
    }

    pub fn current(&self) -> Option<usize> {
        self.inner.state.lock().current
    }

    // ---- zoom ----

    pub fn zoom_in(&self) -> Result<f32, ViewerError> {
        self.apply_zoom(|zoom, z| zoom.zoom_in(z))
    }

    pub fn zoom_out(&self) -> Result<f32, ViewerError> {
        self.apply_zoom(|zoom, z| zoom.zoom_out(z))
    }

    pub fn reset_zoom(&self) -> Result<f32, ViewerError> {
        self.apply_zoom(|zoom, _| zoom.default)
    }

    pub fn set_zoom(&self, value: f32) -> Result<f32, ViewerError> {
        self.apply_zoom(|zoom, _| zoom.normalize(value))
    }

    fn apply_zoom(&self, step: impl FnOnce(&ZoomConfig, f32) -> f32) -> Result<f32, ViewerError> {
        let (zoom, rerender) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            if st.phase != ViewerPhase::Open {
                return Err(ViewerError::NotOpen);
            }

            st.zoom = step(&self.inner.config.zoom, st.zoom);
            if let Some(layout) = st.layout(self.inner.config.page_gap) {
                st.search.relayout(&layout);
            }

            let rerender = st.document.is_some()
                && matches!(st.raster.on_zoom(st.zoom), ZoomEffect::ScheduleRerender { .. });
            (st.zoom, rerender)
        };

        if rerender {
            let ctx = self.clone();
            self.inner.raster_debouncer.schedule(move || async move {
                ctx.rerender_settled();
            });
        }
        Ok(zoom)
    }

    /// Re-rasterize at the settled zoom if it moved far enough
    fn rerender_settled(&self) {
        let mut st = self.inner.state.lock();
        if st.document.is_none() {
            return;
        }
        let zoom = st.zoom;
        if st.raster.needs_rerender(zoom) {
            let generation = st.raster.mark_rastered(zoom);
            tracing::debug!(zoom, generation, "Re-rasterizing pages");
        }
    }

    /// Rasterize a page of the open document at the current raster zoom
    pub async fn page_raster(&self, page: usize) -> Result<RasterPage, ViewerError> {
        let (doc, scale) = {
            let st = self.inner.state.lock();
            let doc = st.document.clone().ok_or(ViewerError::NoDocument)?;
            (doc, st.raster.raster_zoom())
        };
        Ok(self.inner.renderer.rasterize(&doc, page, scale).await?)
    }

    // ---- search ----

    /// Search input changed
    ///
    /// A blank query clears results immediately; anything else searches
    /// once input has been quiet for the debounce period.
    pub fn search_input(&self, query: &str) -> Result<(), ViewerError> {
        {
            let st = self.inner.state.lock();
            if st.phase != ViewerPhase::Open {
                return Err(ViewerError::NotOpen);
            }
            if st.document.is_none() {
                return Err(ViewerError::NoDocument);
            }
        }

        if query.trim().is_empty() {
            self.clear_search();
            return Ok(());
        }

        let ctx = self.clone();
        let query = query.to_string();
        self.inner.search_debouncer.schedule(move || async move {
            ctx.run_search(&query);
        });
        Ok(())
    }

    /// Search the open document now; returns the match count
    pub fn run_search(&self, query: &str) -> usize {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        let (Some(layout), Some(doc)) = (st.layout(self.inner.config.page_gap), st.document.as_ref()) else {
            return 0;
        };

        let total = st.search.search(query, &doc.text_layers, &layout);
        st.scroll_animation = st.search.scroll_to_active(
            st.scroll_top,
            &layout,
            Duration::from_millis(self.inner.config.scroll_duration_ms),
        );
        if let Some(animation) = &st.scroll_animation {
            st.scroll_top = animation.to;
        }
        total
    }

    pub fn search_next(&self) -> Result<Option<usize>, ViewerError> {
        self.step_search(true)
    }

    pub fn search_previous(&self) -> Result<Option<usize>, ViewerError> {
        self.step_search(false)
    }

    fn step_search(&self, forward: bool) -> Result<Option<usize>, ViewerError> {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.phase != ViewerPhase::Open {
            return Err(ViewerError::NotOpen);
        }

        let index = if forward { st.search.next() } else { st.search.previous() };
        if index.is_some() {
            if let Some(layout) = st.layout(self.inner.config.page_gap) {
                st.scroll_animation = st.search.scroll_to_active(
                    st.scroll_top,
                    &layout,
                    Duration::from_millis(self.inner.config.scroll_duration_ms),
                );
                if let Some(animation) = &st.scroll_animation {
                    st.scroll_top = animation.to;
                }
            }
        }
        Ok(index)
    }

    pub fn clear_search(&self) {
        self.inner.search_debouncer.cancel();
        let mut st = self.inner.state.lock();
        st.search.clear();
        st.scroll_animation = None;
    }

    // ---- surface ----

    pub fn resize(&self, width: f32, height: f32) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        st.viewport = (width.max(0.0), height.max(0.0));
        if let Some(layout) = st.layout(self.inner.config.page_gap) {
            st.search.relayout(&layout);
        }
    }

    pub fn scroll_to(&self, top: f32) {
        let mut st = self.inner.state.lock();
        st.scroll_top = top.max(0.0);
        st.scroll_animation = None;
    }

    /// The payload on screen, named for saving
    pub fn download(&self) -> Result<Download, ViewerError> {
        let st = self.inner.state.lock();
        if st.phase == ViewerPhase::Closed {
            return Err(ViewerError::NotOpen);
        }
        let entry = st.entry.as_ref().ok_or(ViewerError::NothingToDownload)?;
        let name = st.filename.as_deref().unwrap_or("attachment");

        Ok(Download {
            filename: download_filename(name, &entry.mime),
            mime: entry.mime.clone(),
            bytes: Arc::clone(&entry.bytes),
            digest: entry.digest.clone(),
            cached_at: entry.cached_at,
        })
    }

    // ---- notices ----

    /// Raise the context-invalidated banner
    ///
    /// Foreground loads fail until the host document answers again. The
    /// banner dismisses itself after the notice timeout.
    pub fn raise_context_invalidated(&self) {
        self.inner.invalidated.store(true, Ordering::SeqCst);
        self.inner.state.lock().notice = Some(Notice::context_invalidated());
        tracing::warn!("Host context invalidated, page reload required");

        let ctx = self.clone();
        self.inner.notice_timer.schedule(move || async move {
            ctx.inner.state.lock().notice = None;
        });
    }

    /// Dismiss the current notice; returns whether one was showing
    pub fn dismiss_notice(&self) -> bool {
        self.inner.notice_timer.cancel();
        self.inner.state.lock().notice.take().is_some()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.inner.state.lock().notice.clone()
    }

    // ---- intents ----

    pub async fn handle(&self, intent: ViewerIntent) -> Result<IntentOutcome, ViewerError> {
        tracing::trace!(?intent, "Handling intent");

        let outcome = match intent {
            ViewerIntent::ThumbnailClick { hash } => navigated(self.open_hash(&hash).await?),
            ViewerIntent::Open { ordinal } => navigated(self.open(ordinal).await?),
            ViewerIntent::Next => navigated(self.next().await?),
            ViewerIntent::Previous => navigated(self.previous().await?),
            ViewerIntent::Goto { ordinal } => navigated(self.goto(ordinal).await?),
            ViewerIntent::Close => {
                self.close();
                IntentOutcome::Updated
            }
            ViewerIntent::ZoomIn => updated(self.zoom_in()?),
            ViewerIntent::ZoomOut => updated(self.zoom_out()?),
            ViewerIntent::ZoomReset => updated(self.reset_zoom()?),
            ViewerIntent::SetZoom { zoom } => updated(self.set_zoom(zoom)?),
            ViewerIntent::SearchInput { query } => updated(self.search_input(&query)?),
            ViewerIntent::SearchNext => updated(self.search_next()?),
            ViewerIntent::SearchPrevious => updated(self.search_previous()?),
            ViewerIntent::SearchClear => updated(self.clear_search()),
            ViewerIntent::Resize { width, height } => updated(self.resize(width, height)),
            ViewerIntent::Scroll { top } => updated(self.scroll_to(top)),
            ViewerIntent::Key { key, shift } => self.handle_key(&key, shift).await?,
            ViewerIntent::Download => IntentOutcome::Download(self.download()?),
            ViewerIntent::DismissNotice => {
                if self.dismiss_notice() {
                    IntentOutcome::Updated
                } else {
                    IntentOutcome::Ignored
                }
            }
        };
        Ok(outcome)
    }

    async fn handle_key(&self, key: &str, shift: bool) -> Result<IntentOutcome, ViewerError> {
        let (phase, search_active) = {
            let st = self.inner.state.lock();
            (st.phase, st.search.is_active())
        };
        if phase == ViewerPhase::Closed {
            return Ok(IntentOutcome::Ignored);
        }
        let Some(command) = key_command(key, shift, search_active) else {
            return Ok(IntentOutcome::Ignored);
        };
        // Only Escape acts while a load is pending
        if phase != ViewerPhase::Open && command != KeyCommand::Close {
            return Ok(IntentOutcome::Ignored);
        }

        let outcome = match command {
            KeyCommand::Close => {
                self.close();
                IntentOutcome::Updated
            }
            KeyCommand::ClearSearch => updated(self.clear_search()),
            KeyCommand::Next => navigated(self.next().await?),
            KeyCommand::Previous => navigated(self.previous().await?),
            KeyCommand::ZoomIn => updated(self.zoom_in()?),
            KeyCommand::ZoomOut => updated(self.zoom_out()?),
            KeyCommand::ZoomReset => updated(self.reset_zoom()?),
            KeyCommand::SearchNext => updated(self.search_next()?),
            KeyCommand::SearchPrevious => updated(self.search_previous()?),
        };
        Ok(outcome)
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        let count = self.count();
        let st = self.inner.state.lock();

        ViewerSnapshot {
            phase: st.phase,
            current: st.current,
            count,
            zoom: st.zoom,
            search_active: st.search.is_active(),
            transitioning: st.is_transitioning(),
            content: st.content.clone(),
            raster: st.document.as_ref().map(|_| RasterSnapshot {
                zoom: st.raster.raster_zoom(),
                generation: st.raster.generation(),
                css_scale: st.raster.css_scale(st.zoom),
            }),
            search: st.search.snapshot(),
            scroll_top: st.scroll_top,
            scroll_animation: st.scroll_animation,
            notice: st.notice.clone(),
            nav_revision: st.nav_revision,
        }
    }
}

fn navigated(navigation: Navigation) -> IntentOutcome {
    match navigation {
        Navigation::Shown => IntentOutcome::Updated,
        Navigation::Ignored => IntentOutcome::Ignored,
    }
}

fn updated<T>(_: T) -> IntentOutcome {
    IntentOutcome::Updated
}
