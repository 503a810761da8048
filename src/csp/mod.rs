//! # CSP Module
//!
//! Request-scoped Content-Security-Policy negotiation for HTML pages.
//!
//! ## Overview
//!
//! For every `GET *.html` request the [`PolicyEngine`] decides on up to two
//! policies (primary and secondary), each either enforcing
//! (`Content-Security-Policy`) or report-only
//! (`Content-Security-Policy-Report-Only`, with a `report-uri` pointing at
//! [`REPORT_URI`]).
//!
//! Pages can ask for a different policy through a query parameter:
//!
//! ```text
//! /index.html?sap-ui-xx-csp-policy=sap-target-level-2          # select by name
//! /index.html?sap-ui-xx-csp-policy=sap-target-level-2:ro       # select, report-only
//! /index.html?sap-ui-xx-csp-policy=default-src%20'self';       # define inline
//! ```
//!
//! Violation reports posted to [`REPORT_URI`] are always accepted. They are
//! only kept, and served at [`REPORTS_PATH`], when report serving is enabled.

mod policy;
mod reports;

pub use policy::{PolicyConfiguration, PolicyDecision, PolicyEngine};
pub use reports::ReportStore;

use serde::Deserialize;
use std::collections::BTreeMap;

pub const HEADER_CSP: &str = "Content-Security-Policy";
pub const HEADER_CSP_REPORT_ONLY: &str = "Content-Security-Policy-Report-Only";

/// Where browsers post violation reports.
pub const REPORT_URI: &str = "/.ui5/csp/report.csplog";
/// Where retained reports are served.
pub const REPORTS_PATH: &str = "/.ui5/csp/csp-reports.json";
/// Content type browsers use when posting reports.
pub const REPORT_CONTENT_TYPE: &str = "application/csp-report";

/// Query parameter the standard server consults for dynamic policies.
pub const POLICY_PARAMETER: &str = "sap-ui-xx-csp-policy";

const TARGET_LEVEL_1: &str = "default-src 'self'; \
    script-src  'self' 'unsafe-eval'; \
    style-src   'self' 'unsafe-inline'; \
    font-src    'self' data:; \
    img-src     'self' * data: blob:; \
    frame-src   'self' https: gap: data: blob: mailto: tel:; \
    worker-src  'self' blob:; \
    child-src   'self' blob:; \
    connect-src 'self' https: wss:; \
    base-uri    'self';";

const TARGET_LEVEL_2: &str = "default-src 'self'; \
    script-src  'self'; \
    style-src   'self' 'unsafe-inline'; \
    font-src    'self' data:; \
    img-src     'self' * data: blob:; \
    frame-src   'self' https: gap: data: blob: mailto: tel:; \
    worker-src  'self' blob:; \
    child-src   'self' blob:; \
    connect-src 'self' https: wss:; \
    base-uri    'self';";

const TARGET_LEVEL_3: &str = "default-src 'self'; \
    script-src  'self'; \
    style-src   'self'; \
    font-src    'self' data:; \
    img-src     'self' * data: blob:; \
    frame-src   'self' https: gap: data: blob: mailto: tel:; \
    worker-src  'self' blob:; \
    child-src   'self' blob:; \
    connect-src 'self' https: wss:; \
    base-uri    'self';";

/// Partial override of the SAP target policy defaults.
///
/// Enabling target CSP with no overrides uses level 1 (report-only) as the
/// primary and level 3 (report-only) as the secondary policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SapTargetCsp {
    pub default_policy: Option<String>,
    pub default_policy_is_report_only: Option<bool>,
    pub default_policy2: Option<String>,
    pub default_policy2_is_report_only: Option<bool>,
    pub ignore_paths: Option<Vec<String>>,
}

/// Configuration used by the standard `csp` middleware.
pub fn server_policy_configuration(
    send_sap_target_csp: Option<&SapTargetCsp>,
    serve_csp_reports: bool,
) -> PolicyConfiguration {
    let defined_policies: BTreeMap<String, String> = [
        ("sap-target-level-1", TARGET_LEVEL_1),
        ("sap-target-level-2", TARGET_LEVEL_2),
        ("sap-target-level-3", TARGET_LEVEL_3),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let mut config = PolicyConfiguration {
        defined_policies,
        allow_dynamic_policy_selection: true,
        allow_dynamic_policy_definition: true,
        serve_csp_reports,
        ..PolicyConfiguration::default()
    };

    if let Some(target) = send_sap_target_csp {
        config.default_policy = Some(
            target
                .default_policy
                .clone()
                .unwrap_or_else(|| "sap-target-level-1".to_string()),
        );
        config.default_policy_is_report_only = target.default_policy_is_report_only.unwrap_or(true);
        config.default_policy2 = Some(
            target
                .default_policy2
                .clone()
                .unwrap_or_else(|| "sap-target-level-3".to_string()),
        );
        config.default_policy2_is_report_only =
            target.default_policy2_is_report_only.unwrap_or(true);
        config.ignore_paths = target
            .ignore_paths
            .clone()
            .unwrap_or_else(|| vec!["test-resources/sap/ui/qunit/testrunner.html".to_string()]);
    }
    config
}
