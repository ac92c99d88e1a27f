use lantern::http::headers::Headers;
use lantern::http::request::{Body, Method, Request, RequestBuilder, Version};

fn request_with(version: Version, headers: &[(&str, &str)]) -> Request {
    Request {
        method: Method::GET,
        path: "/".to_string(),
        query: None,
        version,
        headers: headers.iter().copied().collect(),
        body: Body::Empty,
        trailers: Headers::new(),
    }
}

#[test]
fn test_request_header_retrieval() {
    let req = request_with(
        Version::Http11,
        &[("Host", "example.com"), ("Content-Type", "application/json")],
    );

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = request_with(Version::Http11, &[("Content-Length", "42")]);

    assert_eq!(req.content_length(), Some(42));
}

#[test]
fn test_request_content_length_missing() {
    let req = request_with(Version::Http11, &[]);

    assert_eq!(req.content_length(), None);
}

#[test]
fn test_request_content_length_invalid() {
    let req = request_with(Version::Http11, &[("Content-Length", "not-a-number")]);

    assert_eq!(req.content_length(), None);
}

#[test]
fn test_request_keep_alive_http11_default() {
    assert!(request_with(Version::Http11, &[]).keep_alive());
}

#[test]
fn test_request_keep_alive_close() {
    let req = request_with(Version::Http11, &[("Connection", "close")]);

    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_close_among_tokens() {
    let req = request_with(Version::Http11, &[("Connection", "Upgrade, Close")]);

    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_http10_needs_opt_in() {
    assert!(!request_with(Version::Http10, &[]).keep_alive());
    assert!(request_with(Version::Http10, &[("Connection", "Keep-Alive")]).keep_alive());
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("OPTIONS"), Some(Method::OPTIONS));
    assert_eq!(Method::from_str("INVALID"), None);
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
}

#[test]
fn test_request_method_body_expectation() {
    assert!(Method::POST.expects_body());
    assert!(Method::PUT.expects_body());
    assert!(!Method::GET.expects_body());
    assert!(!Method::DELETE.expects_body());
}

#[test]
fn test_request_builder_splits_query() {
    let req = RequestBuilder::new()
        .method(Method::GET)
        .path("/search?q=rust&page=2")
        .header("Host", "localhost")
        .build()
        .unwrap();

    assert_eq!(req.path, "/search");
    assert_eq!(req.query.as_deref(), Some("q=rust&page=2"));
    assert_eq!(req.version, Version::Http11);
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}

#[test]
fn test_request_with_body() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/api")
        .body(b"test body content".to_vec())
        .build()
        .unwrap();

    assert_eq!(req.body.len(), 17);
    assert_eq!(req.body.to_bytes(), &b"test body content"[..]);
    assert!(!req.is_chunked());
}

#[test]
fn test_chunked_body_concatenates() {
    let body = Body::Chunked(vec!["ab".into(), "cde".into()]);

    assert_eq!(body.len(), 5);
    assert_eq!(body.to_bytes(), &b"abcde"[..]);
    assert_eq!(body.chunks().count(), 2);
}
