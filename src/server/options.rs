use serde_json::Value;

use crate::csp::SapTargetCsp;

pub const DEFAULT_PORT: u16 = 8080;

/// Settings for one dev server run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub port: u16,
    /// Try the next higher ports when `port` is taken
    pub change_port_if_in_use: bool,
    /// Bind `0.0.0.0` instead of `127.0.0.1`
    pub accept_remote_connections: bool,
    /// Send the SAP target CSP policies by default; the inner value
    /// overrides individual settings
    pub send_sap_target_csp: Option<SapTargetCsp>,
    /// Keep CSP violation reports and serve them as JSON
    pub serve_csp_reports: bool,
    /// Render directory listings without styling
    pub simple_index: bool,
    /// Options of the standard `cors` middleware; `Null` allows all origins
    pub cors: Value,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            change_port_if_in_use: false,
            accept_remote_connections: false,
            send_sap_target_csp: None,
            serve_csp_reports: false,
            simple_index: false,
            cors: Value::Null,
        }
    }
}

impl ServerOptions {
    pub fn host(&self) -> &'static str {
        if self.accept_remote_connections {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}
