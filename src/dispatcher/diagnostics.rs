//! Built-in error pages.
//!
//! The 403/404 defaults are minimal pages. The 500 renderer shows the stack,
//! a best-effort listing of the failing file centred on the reported line,
//! and the compiled/source texts the handler left on the response. Every
//! piece of dynamic text goes through minijinja's HTML auto-escaping.

use super::context::{Request, Response};
use crate::error::HandlerResult;
use minijinja::{context, Environment};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fs;
use tracing::error;

/// Lines shown on each side of the failing line in the file listing
const LISTING_RADIUS: usize = 15;

const PAGE: &str = r#"<!doctype html>
<html>
    <head>
        <title>{{ title }}</title>
        <style>
body { padding: 5px; }
h1 { padding: 0; margin: 0 }
h2 { padding: 0; margin: 0; margin-top: 10px; }
pre { padding: 0; margin: 0}
.listing { font-family: monospace; white-space: pre; border: 1px solid black; padding: 5px; }
.highlight { background: red; color: white; display: block; }
        </style>
    </head>
    <body>
{%- if heading %}
<h1>{{ heading }}</h1>
{%- endif %}
<div>{{ message }}</div>
{%- if uri %}
<div>Requested resource: {{ uri }}</div>
{%- endif %}
{%- if stack %}
<h2>Stack Trace</h2>
<pre>{{ stack }}</pre>
{%- endif %}
{%- for listing in listings %}
<h2>{{ listing.title }}</h2>
<div class="listing">{% for row in listing.rows %}{% if row.highlight %}<div class="highlight">{{ row.number }} {{ row.text }}</div>{% else %}{{ row.number }} {{ row.text }}
{% endif %}{% endfor %}</div>
{%- endfor %}
{%- if source %}
<h2>Source</h2>
<div class="listing">{{ source }}</div>
{%- endif %}
    </body>
</html>
"#;

static PAGES: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    // `.html` names get HTML auto-escaping by default
    if let Err(err) = env.add_template("page.html", PAGE) {
        error!(error = %err, "built-in error page template failed to parse");
    }
    env
});

#[derive(Debug, Serialize)]
struct ListingRow {
    number: String,
    text: String,
    highlight: bool,
}

#[derive(Debug, Serialize)]
struct Listing {
    title: String,
    rows: Vec<ListingRow>,
}

fn row(number: usize, text: &str, highlight: bool) -> ListingRow {
    ListingRow {
        number: format!("{number:>5}"),
        text: text.to_string(),
        highlight,
    }
}

/// Window of `lines` centred on `line` (1-based).
fn window(lines: &[&str], line: usize) -> Vec<ListingRow> {
    let start = line.saturating_sub(LISTING_RADIUS).max(1);
    let end = (start + 2 * LISTING_RADIUS).min(lines.len());
    (start..=end)
        .filter_map(|n| lines.get(n - 1).map(|text| row(n, text, n == line)))
        .collect()
}

fn full(lines: &[&str], line: Option<usize>) -> Vec<ListingRow> {
    lines
        .iter()
        .enumerate()
        .map(|(i, text)| row(i + 1, text, Some(i + 1) == line))
        .collect()
}

fn render(ctx: minijinja::Value) -> String {
    PAGES
        .get_template("page.html")
        .and_then(|tmpl| tmpl.render(ctx))
        .unwrap_or_else(|err| {
            error!(error = %err, "failed to render built-in error page");
            "<!doctype html><html><body><h1>Error</h1></body></html>".to_string()
        })
}

fn simple_page(title: &str, message: &str) -> String {
    render(context! {
        title => title,
        message => message,
        listings => Vec::<Listing>::new(),
    })
}

/// Default 403 page.
pub fn forbidden(_req: &mut Request, res: &mut Response) -> HandlerResult {
    res.write_head(403, &[("Content-Type", "text/html")]);
    res.end(simple_page("Access denied", "Access Denied"));
    Ok(403)
}

/// Default 404 page.
pub fn not_found(_req: &mut Request, res: &mut Response) -> HandlerResult {
    res.write_head(404, &[("Content-Type", "text/html")]);
    res.end(simple_page("Not Found", "Not found"));
    Ok(404)
}

/// Default diagnostic renderer for the 500 path.
///
/// Reading the implicated file is best effort: if it cannot be read the
/// listing is omitted and the page is still produced.
pub fn render_internal_error(req: &Request, res: &mut Response) {
    let (stack, location) = match &res.error {
        Some(failure) => (failure.stack(), failure.location().cloned()),
        None => (format!("HTTP Error {}", res.status()), None),
    };

    let mut listings = Vec::new();
    if let Some(loc) = &location {
        if let Ok(text) = fs::read_to_string(&loc.file) {
            let lines: Vec<&str> = text.lines().collect();
            listings.push(Listing {
                title: loc.file.display().to_string(),
                rows: window(&lines, loc.line),
            });
        }
    }
    if let Some(compiled) = &res.compiled {
        let lines: Vec<&str> = compiled.lines().collect();
        listings.push(Listing {
            title: "Compiled".to_string(),
            rows: full(&lines, location.as_ref().map(|l| l.line)),
        });
    }

    let page = render(context! {
        title => "500",
        heading => "Error 500",
        message => "Internal Server Error",
        uri => req.uri.as_str(),
        stack => stack,
        listings => listings,
        source => res.source.as_deref(),
    });

    res.write_head(500, &[("Content-Type", "text/html")]);
    res.end(page);
}
