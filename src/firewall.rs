//! Rejects request URLs and methods that could bypass path-based matching.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::middleware::Next;
use actix_web::{Error, HttpResponse};
use log::warn;

const ALLOWED_METHODS: [Method; 7] = [
    Method::DELETE,
    Method::GET,
    Method::HEAD,
    Method::OPTIONS,
    Method::PATCH,
    Method::POST,
    Method::PUT,
];

// Matched against the lower-cased raw path.
const BLOCKED: [&str; 9] = [";", "%3b", "%2f", "%5c", "\\", "%25", "%2e", "%00", "//"];

/// Reason the request is rejected, if any.
pub fn inspect(method: &Method, path: &str) -> Option<String> {
    if !ALLOWED_METHODS.contains(method) {
        return Some(format!(
            "The request was rejected because the HTTP method \"{method}\" was not included within the list of allowed HTTP methods"
        ));
    }
    let lowered = path.to_ascii_lowercase();
    if let Some(hit) = BLOCKED.iter().find(|b| lowered.contains(*b)) {
        return Some(format!(
            "The request was rejected because the URL contained a potentially malicious String \"{hit}\""
        ));
    }
    if path.chars().any(|c| !(' '..='~').contains(&c)) {
        return Some(
            "The request was rejected because the URL contained a non-printable character"
                .to_string(),
        );
    }
    if !is_normalized(path) {
        return Some("The request was rejected because the URL was not normalized.".to_string());
    }
    None
}

fn is_normalized(path: &str) -> bool {
    path.split('/').all(|segment| segment != "." && segment != "..")
}

pub async fn http_firewall<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    if let Some(reason) = inspect(req.method(), req.uri().path()) {
        warn!("{} {} rejected: {reason}", req.method(), req.uri().path());
        let (req, _) = req.into_parts();
        let res = HttpResponse::BadRequest()
            .content_type("text/plain")
            .body(reason);
        return Ok(ServiceResponse::new(req, res).map_into_right_body());
    }
    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_paths() {
        assert_eq!(inspect(&Method::GET, "/urp/user"), None);
        assert_eq!(inspect(&Method::POST, "/auth/sign-in"), None);
        assert_eq!(inspect(&Method::GET, "/asset/test.tar.gz"), None);
    }

    #[test]
    fn rejects_encoded_and_traversal_paths() {
        for path in [
            "/a;b",
            "/a%2Fb",
            "/a%5cb",
            "/a%252e",
            "/a//b",
            "/a/../b",
            "/a/./b",
            "/a/..",
            "/a%00",
        ] {
            assert!(inspect(&Method::GET, path).is_some(), "{path}");
        }
    }

    #[test]
    fn rejects_unknown_methods() {
        let reason = inspect(&Method::TRACE, "/").unwrap();
        assert!(reason.contains("\"TRACE\""));
    }
}
