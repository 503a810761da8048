use http::Method;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::csp::{
    PolicyConfiguration, PolicyEngine, ReportStore, POLICY_PARAMETER, REPORTS_PATH,
    REPORT_CONTENT_TYPE, REPORT_URI,
};
use crate::error::ServeError;
use crate::server::{DevRequest, DevResponse};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CspOptions {
    parameter_name: Option<String>,
    config: PolicyConfiguration,
}

/// Adds CSP headers to HTML pages and collects violation reports.
pub struct CspMiddleware {
    engine: PolicyEngine,
    reports: Arc<ReportStore>,
}

impl CspMiddleware {
    pub fn new(engine: PolicyEngine) -> Self {
        Self {
            engine,
            reports: Arc::new(ReportStore::new()),
        }
    }

    pub fn reports(&self) -> &Arc<ReportStore> {
        &self.reports
    }

    fn accept_report(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        let report: Value =
            serde_json::from_slice(&req.body).map_err(|_| ServeError::MalformedReport {
                url: req.url.clone(),
            })?;
        let Value::Object(report) = report else {
            return Err(ServeError::MalformedReport {
                url: req.url.clone(),
            });
        };
        if self.engine.config().serve_csp_reports {
            self.reports.record(&report);
        } else {
            debug!("CSP report received, report serving disabled");
        }
        res.set_status(200);
        res.set_body(Vec::new());
        Ok(Flow::Done)
    }
}

pub fn create(_ctx: &MiddlewareContext, options: &Value) -> Result<Arc<dyn Middleware>, String> {
    let options: CspOptions = if options.is_null() {
        CspOptions::default()
    } else {
        serde_json::from_value(options.clone()).map_err(|e| format!("invalid CSP options: {e}"))?
    };
    let parameter = options
        .parameter_name
        .unwrap_or_else(|| POLICY_PARAMETER.to_string());
    Ok(Arc::new(CspMiddleware::new(PolicyEngine::new(
        parameter,
        options.config,
    ))))
}

fn is_report_content_type(value: Option<&str>) -> bool {
    value
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(REPORT_CONTENT_TYPE))
}

impl Middleware for CspMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method == Method::POST
            && req.path == REPORT_URI
            && is_report_content_type(req.header("content-type"))
        {
            return self.accept_report(req, res);
        }
        if req.method == Method::GET
            && req.path == REPORTS_PATH
            && self.engine.config().serve_csp_reports
        {
            res.send_pretty_json(200, &self.reports.to_json());
            return Ok(Flow::Done);
        }

        let decision = self
            .engine
            .decide(&req.method, &req.path, req.header("referer"), &req.query);
        for (name, value) in decision.headers() {
            res.append_header(name, value);
        }
        Ok(Flow::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn middleware(serve_reports: bool) -> CspMiddleware {
        let mut defined = BTreeMap::new();
        defined.insert("p1".to_string(), "default-src 'self';".to_string());
        CspMiddleware::new(PolicyEngine::new(
            "csp",
            PolicyConfiguration {
                defined_policies: defined,
                default_policy: Some("p1".to_string()),
                allow_dynamic_policy_selection: true,
                serve_csp_reports: serve_reports,
                ..PolicyConfiguration::default()
            },
        ))
    }

    fn report_request(body: &str) -> DevRequest {
        DevRequest::new(Method::POST, REPORT_URI)
            .with_header("Content-Type", "application/csp-report")
            .with_body(body.as_bytes().to_vec())
    }

    #[test]
    fn test_html_gets_header_and_delegates() {
        let mut res = DevResponse::new();
        let flow = middleware(false)
            .handle(&DevRequest::new(Method::GET, "/x.html"), &mut res)
            .unwrap();
        assert_eq!(flow, Flow::Next);
        assert_eq!(res.header("Content-Security-Policy"), Some("default-src 'self';"));
    }

    #[test]
    fn test_report_accepted_but_not_retained() {
        let mw = middleware(false);
        let mut res = DevResponse::new();
        let flow = mw
            .handle(&report_request(r#"{"csp-report":{"a":1}}"#), &mut res)
            .unwrap();
        assert_eq!(flow, Flow::Done);
        assert!(res.body().is_empty());
        assert!(mw.reports().is_empty());
    }

    #[test]
    fn test_report_retained_and_served() {
        let mw = middleware(true);
        mw.handle(&report_request(r#"{"csp-report":{"a":1}}"#), &mut DevResponse::new())
            .unwrap();
        let mut res = DevResponse::new();
        let flow = mw
            .handle(&DevRequest::new(Method::GET, REPORTS_PATH), &mut res)
            .unwrap();
        assert_eq!(flow, Flow::Done);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({"csp-reports": [{"a": 1}]}));
    }

    #[test]
    fn test_reports_path_not_served_when_disabled() {
        let mut res = DevResponse::new();
        let flow = middleware(false)
            .handle(&DevRequest::new(Method::GET, REPORTS_PATH), &mut res)
            .unwrap();
        assert_eq!(flow, Flow::Next);
    }

    #[test]
    fn test_malformed_report_is_request_error() {
        let mw = middleware(true);
        for body in ["[1,2]", "not json"] {
            let err = mw
                .handle(&report_request(body), &mut DevResponse::new())
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("No body content available: {REPORT_URI}")
            );
        }
    }

    #[test]
    fn test_factory_reads_wrapped_options() {
        let options = json!({
            "parameterName": "csp",
            "config": {"definedPolicies": {"p1": "img-src *;"}, "defaultPolicy": "p1"}
        });
        let mw = create(&MiddlewareContext::for_tests(), &options).unwrap();
        let mut res = DevResponse::new();
        mw.handle(&DevRequest::new(Method::GET, "/index.html"), &mut res)
            .unwrap();
        assert_eq!(res.header("Content-Security-Policy"), Some("img-src *;"));
    }
}
