//! Compiling handlers driven through the dispatcher: template rendering,
//! include resolution, status/stop from templates, diagnostics, output
//! finalization and scripts writing their own response.

mod common;

use common::resource_tree::Tree;
use flate2::read::GzDecoder;
use jolt::dispatcher::{Application, Event, Request, Response};
use jolt::error::ControlSignal;
use jolt::handlers::{
    script_file, script_server, stylesheet_file, stylesheet_server, template_file,
    template_server, HandlerOptions,
};
use serde_json::{json, Map};
use std::io::Read;
use std::sync::{Arc, Mutex};

fn get(app: &Application, uri: &str) -> Response {
    let mut req = Request::new("GET", uri);
    let mut res = Response::new();
    app.handle(&mut req, &mut res).unwrap();
    res
}

fn blog_app(tree: &Tree, options: HandlerOptions) -> Application {
    let mut app = Application::new();
    app.register_verb("blog", template_server(tree.path("views"), options));
    app
}

#[test]
fn test_renders_args_and_index() {
    let tree = Tree::new();
    tree.write("views/index.jst", "home");
    tree.write("views/first.jst", "post {{ req.verb }}/{{ req.args[0] }}");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/first");
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("content-type"), Some("text/html"));
    assert_eq!(res.body_text(), "post blog/first");

    assert_eq!(get(&app, "/blog").body_text(), "home");
    assert_eq!(get(&app, "/blog/").body_text(), "home");
}

#[test]
fn test_missing_and_forbidden() {
    let tree = Tree::new();
    tree.write("views/index.jst", "home");
    tree.mkdir("views/empty");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/nothing");
    assert_eq!(res.status(), 404);
    assert!(res.body_text().contains("Not found"));

    let res = get(&app, "/blog/empty");
    assert_eq!(res.status(), 403);
    assert!(res.body_text().contains("Access Denied"));
}

#[test]
fn test_traversal_is_not_found() {
    let tree = Tree::new();
    tree.write("secret.jst", "top secret");
    tree.write("views/index.jst", "home");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/../secret");
    assert_eq!(res.status(), 404);
    assert!(!res.body_text().contains("top secret"));
}

#[test]
fn test_data_and_options_are_visible() {
    let tree = Tree::new();
    tree.write("views/page.jst", "{{ data.user }} @ {{ options.site }}");
    let mut extra = Map::new();
    extra.insert("site".into(), json!("jolt.dev"));
    let mut app = blog_app(&tree, HandlerOptions::default().extra(extra));
    app.on(Event::BeginRequest, |_req, res| {
        res.data.insert("user".into(), json!("ann"));
    });

    assert_eq!(get(&app, "/blog/page").body_text(), "ann @ jolt.dev");
}

#[test]
fn test_include_writes_in_place() {
    let tree = Tree::new();
    tree.write("views/page.jst", "A{{ res.include('part') }}C");
    tree.write("views/part.jst", "B{{ req.args[0] }}");
    let app = blog_app(&tree, HandlerOptions::default());

    assert_eq!(get(&app, "/blog/page").body_text(), "ABpageC");
}

#[test]
fn test_include_falls_back_to_include_path() {
    let tree = Tree::new();
    tree.write("views/page.jst", "[{{ res.include('header') }}]");
    tree.write("shared/header.jst", "shared header");
    let app = blog_app(
        &tree,
        HandlerOptions::default().include_path(tree.path("shared")),
    );

    assert_eq!(get(&app, "/blog/page").body_text(), "[shared header]");
}

#[test]
fn test_include_prefers_own_directory() {
    let tree = Tree::new();
    tree.write("views/page.jst", "{{ res.include('header') }}");
    tree.write("views/header.jst", "local");
    tree.write("shared/header.jst", "shared");
    let app = blog_app(
        &tree,
        HandlerOptions::default().include_path(tree.path("shared")),
    );

    assert_eq!(get(&app, "/blog/page").body_text(), "local");
}

#[test]
fn test_missing_include_returns_status() {
    let tree = Tree::new();
    tree.write(
        "views/page.jst",
        "{% set r = res.include('nope') %}missing={{ r }}",
    );
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/page");
    assert_eq!(res.status(), 200);
    assert_eq!(res.body_text(), "missing=404");
}

#[test]
fn test_template_status_goes_to_error_handler() {
    let tree = Tree::new();
    tree.write("views/page.jst", "partial output{{ res.status(404) }}");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/page");
    assert_eq!(res.status(), 404);
    assert!(!res.body_text().contains("partial output"));
}

#[test]
fn test_status_from_included_template_ends_request() {
    let tree = Tree::new();
    tree.write(
        "views/page.jst",
        "secret page {{ res.include('guard') }} more secret",
    );
    tree.write("views/guard.jst", "{{ res.status(403) }}");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/page");
    assert_eq!(res.status(), 403);
    let body = res.body_text();
    assert!(body.contains("Access Denied"));
    assert!(!body.contains("secret"));
}

#[test]
fn test_status_from_nested_include_reaches_dispatcher() {
    let tree = Tree::new();
    tree.write("views/page.jst", "outer {{ res.include('middle') }} after");
    tree.write("views/middle.jst", "middle {{ res.include('inner') }}");
    tree.write("views/inner.jst", "{% if not data.user %}{{ res.status(404) }}{% endif %}");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/page");
    assert_eq!(res.status(), 404);
    assert!(res.body_text().contains("Not found"));
    assert!(!res.body_text().contains("outer"));
}

#[test]
fn test_template_stop_unwinds() {
    let tree = Tree::new();
    tree.write("views/page.jst", "{{ res.stop() }}");
    let app = blog_app(&tree, HandlerOptions::default());

    let mut req = Request::new("GET", "/blog/page");
    let mut res = Response::new();
    assert_eq!(app.handle(&mut req, &mut res), Err(ControlSignal::Stop));
}

#[test]
fn test_syntax_error_page_shows_compiled_and_source() {
    let tree = Tree::new();
    tree.write("views/page.jst", "<p>ok</p>\n{% if %}\n");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/page");
    assert_eq!(res.status(), 500);
    let body = res.body_text();
    assert!(body.contains("Error 500"));
    assert!(body.contains("<h2>Compiled</h2>"));
    assert!(body.contains("<h2>Source</h2>"));
    assert!(body.contains("&lt;p&gt;ok&lt;"));
    assert!(body.contains(r#"<div class="highlight">"#));
}

#[test]
fn test_failure_after_include_reports_included_resource() {
    let tree = Tree::new();
    tree.write(
        "views/page.jst",
        "outer source {{ res.include('part') }}{{ missing.field }}",
    );
    tree.write("views/part.jst", "included source");
    let mut app = blog_app(&tree, HandlerOptions::default());

    let captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    app.register_internal_error_fn(move |_req, res, _fallback| {
        *sink.lock().unwrap() = res.source.as_deref().map(str::to_string);
        res.end("failed");
        Ok(500)
    });

    get(&app, "/blog/page");
    assert_eq!(
        captured.lock().unwrap().as_deref(),
        Some("included source")
    );
}

#[test]
fn test_runtime_error_in_top_level_reports_its_own_source() {
    let tree = Tree::new();
    tree.write("views/page.jst", "line one\n{{ missing.field }}");
    let app = blog_app(&tree, HandlerOptions::default());

    let res = get(&app, "/blog/page");
    assert_eq!(res.status(), 500);
    let body = res.body_text();
    assert!(body.contains("page.jst:2"));
    assert!(body.contains("line one"));
}

#[test]
fn test_gzip_when_accepted() {
    let tree = Tree::new();
    let text = "compress me ".repeat(50);
    tree.write("views/page.jst", &text);
    let app = blog_app(&tree, HandlerOptions::default());

    let mut req = Request::new("GET", "/blog/page").with_header("Accept-Encoding", "gzip, br");
    let mut res = Response::new();
    app.handle(&mut req, &mut res).unwrap();

    assert_eq!(res.header("content-encoding"), Some("gzip"));
    let mut unpacked = String::new();
    GzDecoder::new(res.body()).read_to_string(&mut unpacked).unwrap();
    assert_eq!(unpacked, text);
}

#[test]
fn test_compress_off_and_content_type_override() {
    let tree = Tree::new();
    tree.write("views/feed.jst", "<rss/>");
    let app = blog_app(
        &tree,
        HandlerOptions::default()
            .compress(false)
            .content_type("application/rss+xml"),
    );

    let mut req = Request::new("GET", "/blog/feed").with_header("accept-encoding", "gzip");
    let mut res = Response::new();
    app.handle(&mut req, &mut res).unwrap();

    assert_eq!(res.header("content-encoding"), None);
    assert_eq!(res.header("content-type"), Some("application/rss+xml"));
    assert_eq!(res.body_text(), "<rss/>");
}

#[test]
fn test_edit_is_picked_up() {
    let tree = Tree::new();
    tree.write("views/page.jst", "before");
    let app = blog_app(&tree, HandlerOptions::default());

    assert_eq!(get(&app, "/blog/page").body_text(), "before");
    tree.rewrite_later("views/page.jst", "after", 10);
    assert_eq!(get(&app, "/blog/page").body_text(), "after");
}

#[test]
fn test_template_file_includes_siblings() {
    let tree = Tree::new();
    tree.write("pages/about.jst", "about {{ res.include('footer') }}");
    tree.write("pages/footer.jst", "footer");
    let mut app = Application::new();
    app.register_verb(
        "about",
        template_file(tree.path("pages/about.jst"), HandlerOptions::default()),
    );

    let res = get(&app, "/about/ignored/args");
    assert_eq!(res.body_text(), "about footer");
}

#[test]
fn test_stylesheets() {
    let tree = Tree::new();
    tree.write("css/index.css", "body {\n  margin: 0px;\n}\n");
    tree.write("css/site.css", "a { color: red; }");
    let mut raw = Map::new();
    raw.insert("minify".into(), json!(false));

    let mut app = Application::new();
    app.register_verb("css", stylesheet_server(tree.path("css"), HandlerOptions::default()));
    app.register_verb(
        "site.css",
        stylesheet_file(tree.path("css/site.css"), HandlerOptions::default().extra(raw)),
    );

    let res = get(&app, "/css/site");
    assert_eq!(res.header("content-type"), Some("text/css"));
    assert_eq!(res.body_text(), "a{color:red}");
    assert_eq!(get(&app, "/css").body_text(), "body{margin:0}");
    assert!(get(&app, "/site.css").body_text().contains("color: red"));
}

#[test]
fn test_broken_stylesheet_is_a_500() {
    let tree = Tree::new();
    tree.write("css/bad.css", "a {}\n..broken { color: red }");
    let mut app = Application::new();
    app.register_verb("css", stylesheet_server(tree.path("css"), HandlerOptions::default()));

    let res = get(&app, "/css/bad");
    assert_eq!(res.status(), 500);
    assert!(res.body_text().contains("<h2>Source</h2>"));
}

#[test]
fn test_script_writes_head_and_body() {
    let tree = Tree::new();
    tree.write(
        "api/user.jss",
        "{{ res.write_head(201, {'Content-Type': 'application/json'}) }}\n\
         {{ res.end({'name': req.args[0]} | tojson) }}",
    );
    let mut app = Application::new();
    app.register_verb("api", script_server(tree.path("api"), HandlerOptions::default()));

    let mut req = Request::new("GET", "/api/user").with_header("Accept-Encoding", "gzip");
    let mut res = Response::new();
    app.handle(&mut req, &mut res).unwrap();

    assert_eq!(res.status(), 201);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.header("content-encoding"), None);
    assert_eq!(res.body_text(), r#"{"name":"user"}"#);
}

#[test]
fn test_script_defaults_to_200_and_drops_text() {
    let tree = Tree::new();
    tree.write("health.jss", "not sent {{ res.end('ok') }}");
    let mut app = Application::new();
    app.register_verb(
        "health",
        script_file(tree.path("health.jss"), HandlerOptions::default()),
    );

    let res = get(&app, "/health");
    assert_eq!(res.status(), 200);
    assert_eq!(res.header("content-type"), None);
    assert_eq!(res.body_text(), "ok");
}

#[test]
fn test_script_status_and_errors_use_error_pages() {
    let tree = Tree::new();
    tree.write("api/private.jss", "{{ res.status(403) }}");
    tree.write("api/broken.jss", "{{ res.end(missing.field) }}");
    let mut app = Application::new();
    app.register_verb("api", script_server(tree.path("api"), HandlerOptions::default()));

    let res = get(&app, "/api/private");
    assert_eq!(res.status(), 403);
    assert!(res.body_text().contains("Access Denied"));

    let res = get(&app, "/api/broken");
    assert_eq!(res.status(), 500);
    assert!(res.body_text().contains("broken.jss:1"));

    assert_eq!(get(&app, "/api/absent").status(), 404);
}
