//! Output compression for compiling handlers.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// Body encoder applied when the client accepts it.
pub trait Compressor: Send + Sync {
    /// Value sent in `Content-Encoding`.
    fn encoding(&self) -> &'static str;

    fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>>;
}

/// gzip at a fixed level.
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    level: Compression,
}

impl Gzip {
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for Gzip {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl Compressor for Gzip {
    fn encoding(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, body: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2 + 32), self.level);
        encoder.write_all(body)?;
        encoder.finish()
    }
}

/// True if an `Accept-Encoding` value lists gzip with a non-zero quality.
#[must_use]
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|item| {
        let mut parts = item.split(';');
        let coding = parts.next().unwrap_or_default().trim();
        if !coding.eq_ignore_ascii_case("gzip") && coding != "*" {
            return false;
        }
        !parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("q=")
                .and_then(|q| q.trim().parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        })
    })
}
