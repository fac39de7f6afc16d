use axum::{
    extract::{Form, State},
    http::header,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    commands::InboundSms,
    fetch::HtmlFetcher,
    notify::Notifier,
    tracker::Tracker,
};

pub async fn sms_handler<F, N>(
    State(tracker): State<Arc<Tracker<F, N>>>,
    Form(sms): Form<InboundSms>,
) -> impl IntoResponse
where
    F: HtmlFetcher + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let reply = tracker.handle_sms(&sms).await;
    info!("Replying to {}: {:?}", sms.from, reply);
    ([(header::CONTENT_TYPE, "text/plain; charset=UTF-8")], reply)
}

pub async fn status_handler<F, N>(State(tracker): State<Arc<Tracker<F, N>>>) -> impl IntoResponse
where
    F: HtmlFetcher + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Json(tracker.status().await)
}

pub fn router<F, N>(tracker: Arc<Tracker<F, N>>) -> Router
where
    F: HtmlFetcher + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    Router::new()
        .route("/sms", post(sms_handler::<F, N>))
        .route("/status", get(status_handler::<F, N>))
        .with_state(tracker)
}

/// Serves the router on `0.0.0.0:<port>` until the process exits.
pub async fn serve(router: Router, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}
