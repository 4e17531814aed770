use crate::dispatcher::Response;
use http::StatusCode;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Headers the transport writes itself.
const TRANSPORT_HEADERS: [&str; 4] = ["content-length", "date", "server", "transfer-encoding"];

/// may_minihttp takes header lines as `&'static str`; every distinct line is
/// leaked once and reused afterwards.
static HEADER_LINES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn intern_header(line: String) -> &'static str {
    let mut lines = HEADER_LINES.lock();
    if let Some(existing) = lines.get(line.as_str()) {
        return existing;
    }
    let leaked: &'static str = Box::leak(line.into_boxed_str());
    lines.insert(leaked);
    leaked
}

/// Canonical reason phrase, `"Unknown"` for unregistered codes.
pub fn status_reason(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}

/// Copy a dispatcher [`Response`] onto the wire response.
pub fn write_response(res: &Response, out: &mut may_minihttp::Response) {
    out.status_code(res.status() as usize, status_reason(res.status()));
    for (name, value) in res.headers() {
        if TRANSPORT_HEADERS
            .iter()
            .any(|skip| name.eq_ignore_ascii_case(skip))
        {
            continue;
        }
        out.header(intern_header(format!("{name}: {value}")));
    }
    out.body_vec(res.body().to_vec());
}

/// Bare status response with a plain text body.
pub fn write_status(out: &mut may_minihttp::Response, status: u16) {
    let reason = status_reason(status);
    out.status_code(status as usize, reason);
    out.header("Content-Type: text/plain");
    out.body_vec(reason.as_bytes().to_vec());
}
