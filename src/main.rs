//! Review Sentinel binary entrypoint.
//! Boots the Axum app on the Shuttle runtime.

use shuttle_axum::ShuttleAxum;

use review_sentinel::logging::{dev_logging_enabled, init_tracing};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    if dev_logging_enabled() {
        init_tracing();
    }

    let router = review_sentinel::app().await?;
    Ok(router.into())
}
