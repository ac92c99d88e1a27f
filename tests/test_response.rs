use bytes::Bytes;
use lantern::http::response::{ChunkSource, Response, ResponseBody, ResponseBuilder, StatusCode};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::NotModified.as_u16(), 304);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::RequestTimeout.as_u16(), 408);
    assert_eq!(StatusCode::LengthRequired.as_u16(), 411);
    assert_eq!(StatusCode::PayloadTooLarge.as_u16(), 413);
    assert_eq!(StatusCode::NotImplemented.as_u16(), 501);
    assert_eq!(StatusCode::ServiceUnavailable.as_u16(), 503);
    assert_eq!(StatusCode::HttpVersionNotSupported.as_u16(), 505);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(StatusCode::MethodNotAllowed.reason_phrase(), "Method Not Allowed");
    assert_eq!(
        StatusCode::HttpVersionNotSupported.reason_phrase(),
        "HTTP Version Not Supported"
    );
    assert_eq!(StatusCode::PayloadTooLarge.to_string(), "413 Payload Too Large");
}

#[test]
fn test_bodiless_statuses() {
    assert!(StatusCode::NoContent.is_bodiless());
    assert!(StatusCode::NotModified.is_bodiless());
    assert!(!StatusCode::Ok.is_bodiless());
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(b"Hello, World!".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body.as_bytes(), b"Hello, World!");
    assert_eq!(response.body.length(), Some(13));
    assert!(!response.close);
}

#[test]
fn test_response_builder_header_replaces() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .header("content-type", "text/html")
        .header("X-Custom", "value")
        .build();

    assert_eq!(response.headers.len(), 2);
    assert_eq!(response.header("Content-Type"), Some("text/html"));
    assert_eq!(response.header("X-Custom"), Some("value"));
}

#[test]
fn test_response_builder_does_not_add_framing_headers() {
    let response = ResponseBuilder::new(StatusCode::Ok).body("test").build();

    assert!(response.header("Content-Length").is_none());
    assert!(response.header("Transfer-Encoding").is_none());
}

#[test]
fn test_response_builder_empty_body() {
    let response = ResponseBuilder::new(StatusCode::NoContent).body(Vec::<u8>::new()).build();

    assert!(matches!(response.body, ResponseBody::Empty));
    assert_eq!(response.body.length(), Some(0));
}

#[test]
fn test_response_builder_stream_lengths() {
    let sized = ResponseBuilder::new(StatusCode::Ok)
        .stream(Some(6), ChunkSource::from_chunks([Bytes::from("abc"), Bytes::from("def")]))
        .build();
    let unsized_body = ResponseBuilder::new(StatusCode::Ok)
        .stream(None, ChunkSource::from_chunks([Bytes::from("abc")]))
        .build();

    assert_eq!(sized.body.length(), Some(6));
    assert_eq!(unsized_body.body.length(), None);
}

#[test]
fn test_response_builder_close() {
    let response = ResponseBuilder::new(StatusCode::Ok).close().build();

    assert!(response.close);
}

#[test]
fn test_response_ok_helper() {
    let response = Response::ok(b"test content".to_vec());

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body.as_bytes(), b"test content");
}

#[test]
fn test_response_not_found_helper() {
    let response = Response::not_found();

    assert_eq!(response.status, StatusCode::NotFound);
    assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));
    assert_eq!(response.body.as_bytes(), b"404 Not Found\n");
}

#[test]
fn test_response_internal_error_helper() {
    let response = Response::internal_error();

    assert_eq!(response.status, StatusCode::InternalServerError);
    assert_eq!(response.body.as_bytes(), b"500 Internal Server Error\n");
}

#[test]
fn test_plain_bodiless_status_has_no_body() {
    let response = Response::plain(StatusCode::NotModified);

    assert!(response.body.as_bytes().is_empty());
}

#[tokio::test]
async fn test_chunk_source_channel() {
    let (tx, mut source) = ChunkSource::channel(2);
    tokio::spawn(async move {
        tx.send(Ok(Bytes::from("one"))).await.unwrap();
        tx.send(Ok(Bytes::from("two"))).await.unwrap();
    });

    assert_eq!(source.next_chunk().await.unwrap().unwrap(), "one");
    assert_eq!(source.next_chunk().await.unwrap().unwrap(), "two");
    assert!(source.next_chunk().await.is_none());
}

#[tokio::test]
async fn test_chunk_source_reader() {
    let data: &'static [u8] = b"0123456789";
    let mut source = ChunkSource::from_reader(data, 4);

    let mut collected = Vec::new();
    while let Some(chunk) = source.next_chunk().await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 10);
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(collected, data);
}
