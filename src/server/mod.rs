mod actor;
mod handlers;

use std::net::SocketAddr;

use axum::{
    extract::Extension,
    routing::{get, patch, post},
    Router,
};
use tokio::sync::watch;

use crate::api::DynAPI;
use crate::error::{unexpected_error, Error};
use crate::server::handlers::{bookings, reviews, trips};

pub use actor::{USER_ID_HEADER, USER_ROLES_HEADER};

pub fn router(api: DynAPI) -> Router {
    Router::new()
        .route("/trips", post(trips::create))
        .route("/trips/:id", get(trips::find))
        .route("/trips/:id/cancel", patch(trips::cancel))
        .route("/trips/:id/bookings/pending", get(bookings::find_pending))
        .route("/trips/:id/reviews", post(reviews::create))
        .route("/bookings", post(bookings::create))
        .route("/bookings/:id", get(bookings::find))
        .route("/bookings/:id/confirm", patch(bookings::confirm))
        .route("/bookings/:id/cancel", patch(bookings::cancel))
        .layer(Extension(api))
}

/// Serves the API until `shutdown` flips to `true`, then drains in-flight
/// requests.
pub async fn serve(
    api: DynAPI,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Error> {
    let app = router(api);

    let server = axum::Server::try_bind(&addr).map_err(|err| {
        tracing::error!("failed to bind {}: {}", addr, err);
        unexpected_error()
    })?;

    tracing::info!("listening on {}", addr);

    server
        .serve(app.into_make_service())
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }

            tracing::info!("shutting down http server");
        })
        .await
        .map_err(|err| {
            tracing::error!("http server failed: {}", err);
            unexpected_error()
        })
}
