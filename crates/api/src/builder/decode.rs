use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;
use http::{header::CONTENT_ENCODING, HeaderMap, HeaderValue};
use tracing::trace;

use crate::builder::error::BuilderApiError;

pub(crate) const MAX_PAYLOAD_LENGTH: usize = 1024 * 1024 * 10;

/// Inflates a gzip body, passes raw bodies through.
pub fn decompress_body(headers: &HeaderMap, body: Bytes) -> Result<Bytes, BuilderApiError> {
    const GZIP_HEADER: HeaderValue = HeaderValue::from_static("gzip");

    let is_gzip = matches!(headers.get(CONTENT_ENCODING), Some(header) if header == GZIP_HEADER);
    if !is_gzip {
        return Ok(body);
    }

    // gzip trailer carries the uncompressed size mod 2^32, good enough as a
    // preallocation hint
    let size_hint = gzip_size_hint(&body).unwrap_or(body.len() * 2);
    let mut decoder = GzDecoder::new(body.as_ref());
    let mut buf = Vec::with_capacity(size_hint.min(MAX_PAYLOAD_LENGTH));
    decoder.take(MAX_PAYLOAD_LENGTH as u64 + 1).read_to_end(&mut buf)?;

    if buf.len() > MAX_PAYLOAD_LENGTH {
        return Err(BuilderApiError::PayloadTooLarge {
            max_size: MAX_PAYLOAD_LENGTH,
            size: buf.len(),
        });
    }

    trace!(size_compressed = body.len(), size_uncompressed = buf.len(), "decompressed payload");
    Ok(buf.into())
}

fn gzip_size_hint(buf: &[u8]) -> Option<usize> {
    if buf.len() >= 4 {
        let isize = u32::from_le_bytes(buf[buf.len() - 4..].try_into().ok()?);
        Some(isize as usize)
    } else {
        None
    }
}

/// The fields worth logging before the body has been fully decoded.
#[derive(Debug)]
pub struct SubmissionPeek {
    pub block_hash: String,
    pub value: String,
}

/// Scans the raw JSON for `block_hash` and `value` without decoding the
/// (potentially multi-megabyte) transaction list first.
pub fn peek_submission_info(body: &[u8]) -> Option<SubmissionPeek> {
    let block_hash = find_json_string_field(body, "block_hash")?;
    let value = find_json_string_field(body, "value")?;
    Some(SubmissionPeek { block_hash, value })
}

fn find_json_string_field(body: &[u8], field: &str) -> Option<String> {
    let needle = format!("\"{field}\"");
    let start = body
        .windows(needle.len())
        .position(|window| window == needle.as_bytes())? +
        needle.len();

    let rest = &body[start..];
    let open = rest.iter().position(|&b| b == b'"')?;
    let value = &rest[open + 1..];
    let close = value.iter().position(|&b| b == b'"')?;

    std::str::from_utf8(&value[..close]).ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn peeks_block_hash_and_value() {
        let body = br#"{"message":{"slot":"101","block_hash":"0xbb00","value":"5"},"execution_payload":{}}"#;
        let peek = peek_submission_info(body).unwrap();
        assert_eq!(peek.block_hash, "0xbb00");
        assert_eq!(peek.value, "5");
    }

    #[test]
    fn peek_handles_missing_fields() {
        assert!(peek_submission_info(b"{}").is_none());
    }

    #[test]
    fn gzip_bodies_are_inflated() {
        let payload = br#"{"message":{"slot":"1"}}"#;
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        let inflated = decompress_body(&headers, compressed.into()).unwrap();
        assert_eq!(inflated.as_ref(), payload);
    }

    #[test]
    fn raw_bodies_pass_through() {
        let payload = Bytes::from_static(b"{}");
        let inflated = decompress_body(&HeaderMap::new(), payload.clone()).unwrap();
        assert_eq!(inflated, payload);
    }
}
