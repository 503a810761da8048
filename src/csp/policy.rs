use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{HEADER_CSP, HEADER_CSP_REPORT_ONLY, REPORT_URI};

/// `name[:report-only|:ro]`, name restricted to alphanumerics, dash and underscore.
static POLICY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([-_a-z0-9]+)(:report-only|:ro)?$").expect("policy name regex should be valid")
});

const SUFFIX_REPORT_ONLY: &str = ":report-only";
const SUFFIX_RO: &str = ":ro";

/// Static CSP configuration, loaded once per server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyConfiguration {
    /// Named policy texts
    pub defined_policies: BTreeMap<String, String>,
    /// Name of the primary default policy
    pub default_policy: Option<String>,
    pub default_policy_is_report_only: bool,
    /// Name of the secondary default policy
    pub default_policy2: Option<String>,
    pub default_policy2_is_report_only: bool,
    /// Allow `?<param>=<name>[:ro]` to pick a defined policy
    pub allow_dynamic_policy_selection: bool,
    /// Allow `?<param>=<policy text>[:ro]` to define a policy inline
    pub allow_dynamic_policy_definition: bool,
    /// Requests whose path or referer contains one of these are left alone
    pub ignore_paths: Vec<String>,
    /// Retain posted violation reports and serve them as JSON
    pub serve_csp_reports: bool,
}

impl Default for PolicyConfiguration {
    fn default() -> Self {
        Self {
            defined_policies: BTreeMap::new(),
            default_policy: Some("default".to_string()),
            default_policy_is_report_only: false,
            default_policy2: None,
            default_policy2_is_report_only: false,
            allow_dynamic_policy_selection: false,
            allow_dynamic_policy_definition: false,
            ignore_paths: Vec::new(),
            serve_csp_reports: false,
        }
    }
}

/// Outcome of [`PolicyEngine::decide`] for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDecision {
    pub policy: Option<String>,
    pub report_only: bool,
    pub policy2: Option<String>,
    pub report_only2: bool,
}

impl PolicyDecision {
    pub fn is_empty(&self) -> bool {
        self.policy.is_none() && self.policy2.is_none()
    }

    /// Header name/value pairs in emission order, primary first.
    ///
    /// Both entries may carry the same header name; callers must append,
    /// not replace.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        [
            (self.policy.as_deref(), self.report_only),
            (self.policy2.as_deref(), self.report_only2),
        ]
        .into_iter()
        .filter_map(|(policy, report_only)| policy.map(|p| header_for(p, report_only)))
        .collect()
    }
}

/// Report-only values get a trailing `report-uri` directive. Inline
/// definitions may omit the final `;`, which is added before appending.
fn header_for(policy: &str, report_only: bool) -> (&'static str, String) {
    if report_only {
        let policy = policy.trim_end();
        let separator = if policy.is_empty() || policy.ends_with(';') { " " } else { "; " };
        let value = format!("{policy}{separator}report-uri {REPORT_URI};");
        (HEADER_CSP_REPORT_ONLY, value.trim_start().to_string())
    } else {
        (HEADER_CSP, policy.to_string())
    }
}

/// Pure CSP decision function over a static [`PolicyConfiguration`].
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    parameter_name: String,
    config: PolicyConfiguration,
    default_policy: Option<String>,
    default_policy2: Option<String>,
}

impl PolicyEngine {
    /// `parameter_name` is the query parameter consulted for dynamic
    /// selection/definition.
    pub fn new(parameter_name: impl Into<String>, config: PolicyConfiguration) -> Self {
        // Defaults naming an undefined policy resolve to "no policy"
        let lookup = |name: &Option<String>| {
            name.as_ref()
                .and_then(|n| config.defined_policies.get(n))
                .cloned()
        };
        let default_policy = lookup(&config.default_policy);
        let default_policy2 = lookup(&config.default_policy2);
        Self {
            parameter_name: parameter_name.into(),
            config,
            default_policy,
            default_policy2,
        }
    }

    pub fn config(&self) -> &PolicyConfiguration {
        &self.config
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// Compute the policy headers for a request.
    ///
    /// `query` holds decoded query pairs in request order; the last
    /// occurrence of the policy parameter wins.
    pub fn decide(
        &self,
        method: &Method,
        path: &str,
        referer: Option<&str>,
        query: &[(String, String)],
    ) -> PolicyDecision {
        if method != Method::GET || !path.ends_with(".html") {
            return PolicyDecision::default();
        }
        let ignored = self.config.ignore_paths.iter().any(|ignore| {
            path.contains(ignore.as_str()) || referer.is_some_and(|r| r.contains(ignore.as_str()))
        });
        if ignored {
            return PolicyDecision::default();
        }

        let mut decision = PolicyDecision {
            policy: self.default_policy.clone(),
            report_only: self.config.default_policy_is_report_only,
            policy2: self.default_policy2.clone(),
            report_only2: self.config.default_policy2_is_report_only,
        };

        let requested = query
            .iter()
            .rfind(|(k, _)| *k == self.parameter_name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty());

        if let Some(value) = requested {
            if let Some(caps) = POLICY_NAME.captures(value) {
                // Name-shaped values are never reinterpreted as policy text
                if self.config.allow_dynamic_policy_selection {
                    decision.policy = caps
                        .get(1)
                        .and_then(|name| self.config.defined_policies.get(name.as_str()))
                        .cloned();
                    decision.report_only = caps.get(2).is_some();
                }
            } else if self.config.allow_dynamic_policy_definition {
                let (text, report_only) = if let Some(text) = value.strip_suffix(SUFFIX_REPORT_ONLY) {
                    (text, true)
                } else if let Some(text) = value.strip_suffix(SUFFIX_RO) {
                    (text, true)
                } else {
                    (value, false)
                };
                decision.policy = Some(text.to_string());
                decision.report_only = report_only;
            }
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PolicyConfiguration {
        let mut defined = BTreeMap::new();
        defined.insert("p1".to_string(), "default-src 'self';".to_string());
        defined.insert("p2".to_string(), "script-src 'none';".to_string());
        PolicyConfiguration {
            defined_policies: defined,
            default_policy: Some("p1".to_string()),
            allow_dynamic_policy_selection: true,
            allow_dynamic_policy_definition: true,
            ..PolicyConfiguration::default()
        }
    }

    fn q(value: &str) -> Vec<(String, String)> {
        vec![("csp".to_string(), value.to_string())]
    }

    #[test]
    fn test_only_get_html() {
        let engine = PolicyEngine::new("csp", config());
        assert!(engine.decide(&Method::POST, "/x.html", None, &[]).is_empty());
        assert!(engine.decide(&Method::GET, "/x.js", None, &[]).is_empty());
        assert!(engine.decide(&Method::GET, "/x.htm", None, &[]).is_empty());
        assert!(!engine.decide(&Method::GET, "/x.html", None, &[]).is_empty());
    }

    #[test]
    fn test_default_policy_enforcing() {
        let engine = PolicyEngine::new("csp", config());
        let d = engine.decide(&Method::GET, "/x.html", None, &[]);
        assert_eq!(
            d.headers(),
            vec![(HEADER_CSP, "default-src 'self';".to_string())]
        );
    }

    #[test]
    fn test_selection_report_only_suffixes() {
        let engine = PolicyEngine::new("csp", config());
        for suffix in [":report-only", ":ro", ":RO"] {
            let d = engine.decide(&Method::GET, "/x.html", None, &q(&format!("p2{suffix}")));
            assert_eq!(d.policy.as_deref(), Some("script-src 'none';"));
            assert!(d.report_only);
        }
        let d = engine.decide(&Method::GET, "/x.html", None, &q("p2"));
        assert!(!d.report_only);
    }

    #[test]
    fn test_selection_of_undefined_name_drops_primary() {
        let engine = PolicyEngine::new("csp", config());
        let d = engine.decide(&Method::GET, "/x.html", None, &q("nope"));
        assert_eq!(d.policy, None);
    }

    #[test]
    fn test_name_shaped_value_ignored_when_selection_disabled() {
        let cfg = PolicyConfiguration {
            allow_dynamic_policy_selection: false,
            ..config()
        };
        let engine = PolicyEngine::new("csp", cfg);
        let d = engine.decide(&Method::GET, "/x.html", None, &q("p2:ro"));
        // Neither selected nor taken as literal text: default stays
        assert_eq!(d.policy.as_deref(), Some("default-src 'self';"));
        assert!(!d.report_only);
    }

    #[test]
    fn test_literal_definition() {
        let engine = PolicyEngine::new("csp", config());
        let d = engine.decide(
            &Method::GET,
            "/x.html",
            None,
            &q("default-src 'none'; img-src *;:report-only"),
        );
        assert_eq!(d.policy.as_deref(), Some("default-src 'none'; img-src *;"));
        assert!(d.report_only);

        let d = engine.decide(&Method::GET, "/x.html", None, &q("default-src 'none';"));
        assert_eq!(d.policy.as_deref(), Some("default-src 'none';"));
        assert!(!d.report_only);
    }

    #[test]
    fn test_literal_definition_disabled() {
        let cfg = PolicyConfiguration {
            allow_dynamic_policy_definition: false,
            ..config()
        };
        let engine = PolicyEngine::new("csp", cfg);
        let d = engine.decide(&Method::GET, "/x.html", None, &q("default-src 'none';"));
        assert_eq!(d.policy.as_deref(), Some("default-src 'self';"));
    }

    #[test]
    fn test_empty_parameter_is_ignored() {
        let engine = PolicyEngine::new("csp", config());
        let d = engine.decide(&Method::GET, "/x.html", None, &q(""));
        assert_eq!(d.policy.as_deref(), Some("default-src 'self';"));
    }

    #[test]
    fn test_ignore_paths_match_path_and_referer() {
        let cfg = PolicyConfiguration {
            ignore_paths: vec!["qunit/testrunner.html".to_string()],
            ..config()
        };
        let engine = PolicyEngine::new("csp", cfg);
        assert!(engine
            .decide(&Method::GET, "/test-resources/sap/ui/qunit/testrunner.html", None, &[])
            .is_empty());
        assert!(engine
            .decide(
                &Method::GET,
                "/test/unit.html",
                Some("http://localhost:8080/test-resources/sap/ui/qunit/testrunner.html?x"),
                &[]
            )
            .is_empty());
    }

    #[test]
    fn test_both_report_only_accumulate() {
        let cfg = PolicyConfiguration {
            default_policy_is_report_only: true,
            default_policy2: Some("p2".to_string()),
            default_policy2_is_report_only: true,
            ..config()
        };
        let engine = PolicyEngine::new("csp", cfg);
        let headers = engine.decide(&Method::GET, "/x.html", None, &[]).headers();
        assert_eq!(headers.len(), 2);
        assert!(headers.iter().all(|(name, _)| *name == HEADER_CSP_REPORT_ONLY));
        assert_eq!(
            headers[0].1,
            format!("default-src 'self'; report-uri {REPORT_URI};")
        );
        assert_eq!(headers[1].1, format!("script-src 'none'; report-uri {REPORT_URI};"));
    }

    #[test]
    fn test_report_uri_is_a_separate_directive() {
        let engine = PolicyEngine::new("csp", config());
        let d = engine.decide(&Method::GET, "/x.html", None, &q("default-src 'none':ro"));
        assert_eq!(d.policy.as_deref(), Some("default-src 'none'"));
        assert_eq!(
            d.headers(),
            vec![(
                HEADER_CSP_REPORT_ONLY,
                format!("default-src 'none'; report-uri {REPORT_URI};")
            )]
        );

        // Trailing whitespace after the last directive is dropped
        let d = engine.decide(&Method::GET, "/x.html", None, &q("img-src *; :ro"));
        assert_eq!(d.headers()[0].1, format!("img-src *; report-uri {REPORT_URI};"));
    }

    #[test]
    fn test_selection_keeps_secondary() {
        let cfg = PolicyConfiguration {
            default_policy2: Some("p2".to_string()),
            ..config()
        };
        let engine = PolicyEngine::new("csp", cfg);
        let d = engine.decide(&Method::GET, "/x.html", None, &q("p1:ro"));
        assert!(d.report_only);
        assert_eq!(d.policy2.as_deref(), Some("script-src 'none';"));
        assert!(!d.report_only2);
    }

    #[test]
    fn test_undefined_default_yields_nothing() {
        let engine = PolicyEngine::new("csp", PolicyConfiguration::default());
        assert!(engine.decide(&Method::GET, "/x.html", None, &[]).is_empty());
    }
}
