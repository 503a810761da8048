use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::server::DevResponse;

/// Header carrying a client-chosen request id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Request identifier attached to the per-request tracing span.
///
/// A valid ULID sent in [`REQUEST_ID_HEADER`] is adopted and echoed back on
/// the response, so a browser tool or test harness can find the server log
/// lines of its own request. Ids generated here stay in the logs only:
/// every distinct header line written costs one leaked string in the HTTP
/// layer, and a fresh id per request would grow that set without bound.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId {
    id: ulid::Ulid,
    supplied: bool,
}

impl RequestId {
    /// Generate a server-side id.
    pub fn new() -> Self {
        Self {
            id: ulid::Ulid::new(),
            supplied: false,
        }
    }

    /// Adopt the client's id when it is a valid ULID, otherwise generate one.
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.trim().parse::<RequestId>().ok())
            .unwrap_or_default()
    }

    /// Whether the client sent this id.
    pub fn is_supplied(&self) -> bool {
        self.supplied
    }

    /// Echo a client-supplied id on the response.
    pub fn echo(&self, res: &mut DevResponse) {
        if self.supplied {
            res.set_header(REQUEST_ID_HEADER, self.to_string());
        }
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Parsed ids count as client-supplied.
impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            id: ulid::Ulid::from_string(s)?,
            supplied: true,
        })
    }
}
