use bytes::{Bytes, BytesMut};
use lantern::http::chunked::{encode_chunk, encode_last_chunk, ChunkedDecoder};
use lantern::http::parser::ParseError;

const LIMIT: usize = 1024;

#[test]
fn test_encode_chunks() {
    let mut buf = BytesMut::new();
    encode_chunk(b"hello", &mut buf);
    encode_chunk(b"", &mut buf);
    encode_chunk(&[b'x'; 26], &mut buf);
    encode_last_chunk(&mut buf);

    let mut expected = b"5\r\nhello\r\n1a\r\n".to_vec();
    expected.extend_from_slice(&[b'x'; 26]);
    expected.extend_from_slice(b"\r\n0\r\n\r\n");
    assert_eq!(&buf[..], &expected[..]);
}

#[test]
fn test_decode_encoded_body() {
    let mut wire = BytesMut::new();
    for part in [&b"first"[..], &b", second"[..], &b"!"[..]] {
        encode_chunk(part, &mut wire);
    }
    encode_last_chunk(&mut wire);

    let mut decoder = ChunkedDecoder::new(LIMIT, LIMIT);
    assert!(decoder.decode(&wire).unwrap());
    assert_eq!(decoder.consumed(), wire.len());

    let (chunks, trailers) = decoder.finish();
    assert_eq!(
        chunks,
        vec![Bytes::from("first"), Bytes::from(", second"), Bytes::from("!")]
    );
    assert!(trailers.is_empty());
}

#[test]
fn test_decode_empty_and_single_chunk_bodies() {
    let mut empty = BytesMut::new();
    encode_last_chunk(&mut empty);
    let mut decoder = ChunkedDecoder::new(LIMIT, LIMIT);
    assert!(decoder.decode(&empty).unwrap());
    assert!(decoder.finish().0.is_empty());

    let mut single = BytesMut::new();
    encode_chunk(b"x", &mut single);
    encode_last_chunk(&mut single);
    let mut decoder = ChunkedDecoder::new(LIMIT, LIMIT);
    assert!(decoder.decode(&single).unwrap());
    assert_eq!(decoder.finish().0, vec![Bytes::from("x")]);
}

#[test]
fn test_decode_leaves_following_bytes() {
    let wire = b"3\r\nabc\r\n0\r\n\r\nGET / HTTP/1.1\r\n\r\n";
    let mut decoder = ChunkedDecoder::new(LIMIT, LIMIT);

    assert!(decoder.decode(wire).unwrap());
    assert_eq!(decoder.consumed(), 15);
}

#[test]
fn test_decode_across_reads() {
    let wire = b"4;name=value\r\nwiki\r\nA\r\n0123456789\r\n0\r\nExpires: never\r\n\r\n";
    let mut decoder = ChunkedDecoder::new(LIMIT, LIMIT);

    for end in 1..wire.len() {
        assert!(!decoder.decode(&wire[..end]).unwrap(), "finished early at {}", end);
    }
    assert!(decoder.decode(wire).unwrap());
    assert!(decoder.is_done());

    let (chunks, trailers) = decoder.finish();
    assert_eq!(chunks, vec![Bytes::from("wiki"), Bytes::from("0123456789")]);
    assert_eq!(trailers.get("expires"), Some("never"));
}

#[test]
fn test_decode_rejects_bad_framing() {
    let cases: [&[u8]; 4] = [
        b"zz\r\nabc\r\n0\r\n\r\n",
        b"3\r\nabcd\r\n0\r\n\r\n",
        b"\r\n",
        b"ffffffffffffffffffffff\r\n",
    ];
    for wire in cases {
        let mut decoder = ChunkedDecoder::new(usize::MAX, LIMIT);
        assert_eq!(decoder.decode(wire), Err(ParseError::InvalidChunk), "{:?}", wire);
    }
}

#[test]
fn test_decode_enforces_body_limit() {
    let mut decoder = ChunkedDecoder::new(5, LIMIT);

    assert_eq!(
        decoder.decode(b"3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n"),
        Err(ParseError::BodyTooLarge)
    );
}

#[test]
fn test_decode_enforces_trailer_limit() {
    let mut decoder = ChunkedDecoder::new(LIMIT, 16);
    let wire = format!("0\r\nX-Long: {}\r\n\r\n", "v".repeat(32));

    assert_eq!(decoder.decode(wire.as_bytes()), Err(ParseError::HeadersTooLarge));
}
