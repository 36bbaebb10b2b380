//! Route modules for the viewer control surface

pub mod host;
pub mod viewer;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    document_engine: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        document_engine: state.viewer().has_document_engine(),
    })
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(health_check))
        .nest("/api/v1", host::router())
        .nest("/api/v1/viewer", viewer::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum_test::TestServer;

    use crate::cache::testing::FakeFetcher;
    use crate::config::Config;
    use crate::registry::IdentityRules;
    use crate::render::testing::FakeEngine;
    use crate::search::{Rect, TextLayer, TextRun};
    use crate::state::AppState;

    pub fn thumb(i: usize) -> String {
        format!("https://mail.example.com/att?th=hash{:04}&disp=thd", i)
    }

    pub fn full(i: usize) -> String {
        IdentityRules::default().full_view_url(&thumb(i))
    }

    /// Host markup with `n` attachment containers
    pub fn markup(n: usize) -> String {
        let items: String = (0..n)
            .map(|i| {
                format!(
                    r#"<div data-attachment><img src="{}"><span data-filename>file{}.pdf</span></div>"#,
                    thumb(i).replace('&', "&amp;"),
                    i
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", items)
    }

    pub fn server(n: usize) -> (TestServer, AppState, Arc<FakeFetcher>) {
        let fetcher = Arc::new(FakeFetcher::default());
        for i in 0..n {
            fetcher.serve(&full(i), format!("%PDF-1.7 {}", i).as_bytes(), Some("application/pdf"));
        }

        let layers = vec![TextLayer::new(1, 600.0, 800.0)
            .with_run(TextRun::new("Invoice total", Rect::new(50.0, 100.0, 78.0, 12.0)))];
        let engine = Arc::new(FakeEngine::with_layers(layers));

        let state = AppState::new(Config::default(), fetcher.clone(), Some(engine));
        let server = TestServer::new(super::app(state.clone())).unwrap();
        (server, state, fetcher)
    }
}
