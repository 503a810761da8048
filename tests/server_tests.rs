//! End-to-end tests against a running dev server
//!
//! Each test serves the fixture project (an application plus one library)
//! through the standard pipeline on a free local port and talks raw
//! HTTP/1.1 to it.

mod common;

use brrtserve::server::ServerOptions;
use common::test_server::{get, parse_response, send_request, start};

#[test]
fn test_etag_is_stable_and_revalidates() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let first = get(&addr, "/index.html", "");
    let second = get(&addr, "/index.html", "");
    let etag = first.header("ETag").unwrap().to_string();
    let revalidated = get(&addr, "/index.html", &format!("If-None-Match: {etag}\r\n"));
    handle.stop();

    assert_eq!(first.status, 200);
    assert!(first.body.contains("hello"));
    assert_eq!(second.header("ETag"), Some(etag.as_str()));
    assert_eq!(revalidated.status, 304);
    assert!(revalidated.body.is_empty());
}

#[test]
fn test_non_read_request_rejected() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let resp = parse_response(&send_request(
        &addr,
        "DELETE /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n",
    ));
    handle.stop();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body, "Cannot DELETE /index.html");
}

#[test]
fn test_csp_reports_collected_when_enabled() {
    let (_dir, handle, addr) = start(ServerOptions {
        serve_csp_reports: true,
        ..ServerOptions::default()
    });
    let report = r#"{"csp-report":{"document-uri":"http://localhost/index.html","violated-directive":"script-src"}}"#;
    let post = format!(
        "POST /.ui5/csp/report.csplog HTTP/1.1\r\nHost: localhost\r\n\
         Content-Type: application/csp-report\r\nContent-Length: {}\r\n\r\n{report}",
        report.len()
    );
    let accepted = parse_response(&send_request(&addr, &post));
    let listed = get(&addr, "/.ui5/csp/csp-reports.json", "");
    handle.stop();

    assert_eq!(accepted.status, 200);
    assert_eq!(listed.status, 200);
    let body: serde_json::Value = serde_json::from_str(&listed.body).unwrap();
    assert_eq!(
        body["csp-reports"][0]["violated-directive"],
        "script-src"
    );
}

#[test]
fn test_sap_target_csp_headers_on_html() {
    let (_dir, handle, addr) = start(ServerOptions {
        send_sap_target_csp: Some(Default::default()),
        ..ServerOptions::default()
    });
    let html = get(&addr, "/index.html", "");
    let script = get(&addr, "/Component.js", "");
    handle.stop();

    let report_only: Vec<_> = html
        .headers
        .iter()
        .filter(|(n, _)| n.eq_ignore_ascii_case("Content-Security-Policy-Report-Only"))
        .collect();
    assert_eq!(report_only.len(), 2);
    assert!(script
        .header("Content-Security-Policy-Report-Only")
        .is_none());
}

#[test]
fn test_theme_built_on_demand() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let css = get(&addr, "/resources/my/lib/themes/base/library.css", "");
    let rtl = get(&addr, "/resources/my/lib/themes/base/library-RTL.css", "");
    let params = get(
        &addr,
        "/resources/my/lib/themes/base/library-parameters.json",
        "",
    );
    handle.stop();

    assert_eq!(css.status, 200);
    assert!(css.body.contains("#32363a"));
    assert!(css.body.contains("float: left"));
    assert!(rtl.body.contains("float: right"));
    let params: serde_json::Value = serde_json::from_str(&params.body).unwrap();
    assert_eq!(params["textColor"], "#32363a");
}

#[test]
fn test_version_info_and_discovery() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let version = get(&addr, "/resources/sap-ui-version.json", "");
    let libs = get(&addr, "/discovery/all_libs", "");
    handle.stop();

    assert_eq!(version.status, 200);
    let info: serde_json::Value = serde_json::from_str(&version.body).unwrap();
    assert_eq!(info["name"], "my.app");
    assert_eq!(info["libraries"][0]["name"], "my.lib");
    assert_eq!(info["libraries"][0]["version"], "2.0.0");

    let libs: serde_json::Value = serde_json::from_str(&libs.body).unwrap();
    assert_eq!(libs["all_libs"][0]["entry"], "my/lib");
}

#[test]
fn test_directory_listing_and_missing_file() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let listing = get(&addr, "/", "");
    let missing = get(&addr, "/does/not/exist.js", "");
    handle.stop();

    assert_eq!(listing.status, 200);
    assert!(listing
        .header("Content-Type")
        .unwrap()
        .starts_with("text/html"));
    assert!(listing.body.contains("Component.js"));
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, "Cannot GET /does/not/exist.js");
}

#[test]
fn test_test_runner_assets_served() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let runner = get(&addr, "/test-resources/sap/ui/qunit/testrunner.html", "");
    handle.stop();
    assert_eq!(runner.status, 200);
    assert!(runner.header("ETag").is_some());
}

#[test]
fn test_supplied_request_id_echoed() {
    let (_dir, handle, addr) = start(ServerOptions::default());
    let sent = ulid::Ulid::new().to_string();
    let echoed = get(&addr, "/index.html", &format!("X-Request-ID: {sent}\r\n"));
    let generated = get(&addr, "/index.html", "");
    handle.stop();

    assert_eq!(echoed.header("X-Request-ID"), Some(sent.as_str()));
    assert!(generated.header("X-Request-ID").is_none());
}

#[test]
fn test_configured_cors_origins() {
    let (_dir, handle, addr) = start(ServerOptions {
        cors: serde_json::json!({ "origins": ["http://localhost:3000"], "maxAge": 600 }),
        ..ServerOptions::default()
    });
    let allowed = get(&addr, "/index.html", "Origin: http://localhost:3000\r\n");
    let foreign = get(&addr, "/index.html", "Origin: http://other.test\r\n");
    let preflight = parse_response(&send_request(
        &addr,
        "OPTIONS /index.html HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost:3000\r\n\
         Access-Control-Request-Method: PUT\r\n\r\n",
    ));
    handle.stop();

    assert_eq!(
        allowed.header("Access-Control-Allow-Origin"),
        Some("http://localhost:3000")
    );
    assert_eq!(foreign.status, 200);
    assert!(foreign.header("Access-Control-Allow-Origin").is_none());
    assert_eq!(preflight.status, 204);
    assert_eq!(preflight.header("Access-Control-Max-Age"), Some("600"));
}
