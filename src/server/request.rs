use crate::compress::accepts_gzip;
use crate::dispatcher::Request;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use tracing::debug;

/// Bounds applied while reading a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    /// Largest accepted body, in bytes
    pub max_size: usize,
    /// Read granularity, in bytes
    pub block_size: usize,
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_size: 10 * 1024 * 1024,
            block_size: 64 * 1024,
        }
    }
}

/// Why an inbound request could not be turned into a [`Request`].
#[derive(Debug)]
pub enum RequestError {
    /// The body exceeds [`BodyLimits::max_size`]
    TooLarge { limit: usize },
    Io(io::Error),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::TooLarge { limit } => {
                write!(f, "request body exceeds {limit} bytes")
            }
            RequestError::Io(err) => write!(f, "reading request body: {err}"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Io(err) => Some(err),
            RequestError::TooLarge { .. } => None,
        }
    }
}

/// Parse query string parameters from a request target.
///
/// Everything after the first `?` is form-url-decoded; a repeated name keeps
/// its last value.
pub fn parse_query_params(target: &str) -> HashMap<String, String> {
    match target.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
        None => HashMap::new(),
    }
}

/// Read at most `limits.max_size` bytes, `limits.block_size` at a time.
pub fn read_body<R: Read>(mut reader: R, limits: BodyLimits) -> Result<Vec<u8>, RequestError> {
    let mut body = Vec::new();
    let mut block = vec![0u8; limits.block_size.max(1)];
    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(RequestError::Io(err)),
        };
        if body.len() + n > limits.max_size {
            return Err(RequestError::TooLarge {
                limit: limits.max_size,
            });
        }
        body.extend_from_slice(&block[..n]);
    }
    Ok(body)
}

/// Build a dispatcher [`Request`] from its raw parts.
///
/// The path loses its query string, header names are lowercased and the
/// `gzip` flag is derived from `Accept-Encoding`.
pub fn build_request<'a>(
    method: &str,
    target: &str,
    headers: impl IntoIterator<Item = (&'a str, &'a [u8])>,
    body: Vec<u8>,
) -> Request {
    let uri = target.split('?').next().unwrap_or("/").to_string();
    let headers: HashMap<String, String> = headers
        .into_iter()
        .map(|(name, value)| {
            (
                name.to_ascii_lowercase(),
                String::from_utf8_lossy(value).into_owned(),
            )
        })
        .collect();
    let gzip = headers
        .get("accept-encoding")
        .is_some_and(|value| accepts_gzip(value));

    Request {
        method: method.to_string(),
        query: parse_query_params(target),
        uri,
        headers,
        body,
        gzip,
        ..Request::default()
    }
}

/// Convert a `may_minihttp::Request` into a dispatcher [`Request`].
///
/// A declared `Content-Length` over the limit is rejected before the body is
/// read.
pub fn parse_request(
    req: may_minihttp::Request,
    limits: BodyLimits,
) -> Result<Request, RequestError> {
    let method = req.method().to_string();
    let target = req.path().to_string();
    let raw_headers: Vec<(String, Vec<u8>)> = req
        .headers()
        .iter()
        .map(|h| (h.name.to_string(), h.value.to_vec()))
        .collect();

    let declared = raw_headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| std::str::from_utf8(value).ok()?.trim().parse::<usize>().ok());
    if declared.is_some_and(|len| len > limits.max_size) {
        return Err(RequestError::TooLarge {
            limit: limits.max_size,
        });
    }

    let body = read_body(req.body(), limits)?;
    debug!(
        method = %method,
        target = %target,
        header_count = raw_headers.len(),
        body_bytes = body.len(),
        "HTTP request parsed"
    );

    Ok(build_request(
        &method,
        &target,
        raw_headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice())),
        body,
    ))
}
