//! Request pipeline shared by every route.
//!
//! # Layer Order (outermost first)
//! ```text
//! request ID assignment
//!     → tower-http trace spans (debug)
//!     → access log line + metrics (logger.rs)
//!     → request ID echoed on the response
//!     → panic recovery (500 instead of a dropped connection)
//!     → handler
//! ```
//!
//! The write timeout is not part of this stack; [`HttpServer`] applies it
//! from its own configuration.
//!
//! [`HttpServer`]: crate::http::HttpServer

pub mod logger;

use axum::Router;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// Wrap `router` in the standard middleware stack.
pub fn apply(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(propagate_request_id_layer())
        .layer(axum::middleware::from_fn(logger::log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::X_REQUEST_ID;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        apply(
            Router::new()
                .route("/ok", get(|| async { "ok" }))
                .route(
                    "/boom",
                    get(|| async {
                        if true {
                            panic!("handler exploded");
                        }
                        "unreachable"
                    }),
                ),
        )
    }

    #[tokio::test]
    async fn assigns_request_id() {
        let response = app()
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers()[X_REQUEST_ID].to_str().unwrap();
        assert_eq!(id.len(), 36, "expected a UUID, got {id}");
    }

    #[tokio::test]
    async fn keeps_client_request_id() {
        let response = app()
            .oneshot(
                Request::get("/ok")
                    .header(X_REQUEST_ID, "client-chosen")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "client-chosen");
    }

    #[tokio::test]
    async fn recovers_from_panics() {
        let response = app()
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }
}
