use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use warp::http::{Response, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::metrics;
use crate::service::{ApiResponse, CheckService};

/// A check request is a single short URL; anything bigger is refused with 413.
pub const MAX_CHECK_BODY_BYTES: u64 = 16 * 1024;

fn with_service(
    service: Arc<CheckService>,
) -> impl Filter<Extract = (Arc<CheckService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

pub fn routes(
    service: Arc<CheckService>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let check = warp::path!("check")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_CHECK_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_service(service.clone()))
        .and_then(|body: Bytes, service: Arc<CheckService>| async move {
            // Raw text goes through the same `body` unwrapping as a wrapped event.
            let event = json!({ "body": String::from_utf8_lossy(&body) });
            Ok::<_, Rejection>(render(ApiResponse::from_result(service.check_website(&event).await)))
        });

    let history = warp::path!("history")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_service(service))
        .and_then(|params: HashMap<String, String>, service: Arc<CheckService>| async move {
            Ok::<_, Rejection>(render(ApiResponse::from_result(service.get_history(&params).await)))
        });

    let metrics_route = warp::path!("metrics").and(warp::get()).map(|| match metrics::render() {
        Ok((content_type, buf)) => Response::builder()
            .header("Content-Type", content_type)
            .body(buf)
            .unwrap_or_default(),
        Err(e) => {
            tracing::error!("metrics encoding failed: {}", e);
            let mut resp = Response::new(Vec::new());
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    });

    check.or(history).unify().or(metrics_route).unify()
}

fn render(api: ApiResponse) -> Response<Vec<u8>> {
    let status = StatusCode::from_u16(api.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &api.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(api.body.to_string().into_bytes()).unwrap_or_default()
}

pub async fn serve(service: Arc<CheckService>, addr: SocketAddr) {
    tracing::info!("Listening on {}", addr);
    warp::serve(routes(service)).run(addr).await;
}
