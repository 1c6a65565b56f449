//! A `kube::Client` backed by a canned in-process handler, for tests that
//! exercise API-reading code without a cluster.

use http::{Request, Response};
use hyper::Body;

pub(crate) fn with_handler<F>(handler: F) -> kube::Client
where
    F: Fn(Request<Body>) -> Response<Body> + Clone + Send + Sync + 'static,
{
    let svc = tower::service_fn(move |req: Request<Body>| {
        let handler = handler.clone();
        async move { Ok::<_, std::convert::Infallible>(handler(req)) }
    });
    kube::Client::new(svc, "default")
}

/// A client whose handler must never be reached.
pub(crate) fn unreachable() -> kube::Client {
    with_handler(|req| panic!("unexpected API request: {}", req.uri()))
}

pub(crate) fn json_response(value: &serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(value).unwrap()))
        .unwrap()
}

pub(crate) fn not_found() -> Response<Body> {
    let status = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Status",
        "metadata": {},
        "status": "Failure",
        "message": "not found",
        "reason": "NotFound",
        "code": 404,
    });
    Response::builder()
        .status(404)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&status).unwrap()))
        .unwrap()
}
