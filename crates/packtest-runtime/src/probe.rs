//! HTTP checks against a ready instance.
//!
//! The client is blocking; call it from synchronous test code, not from
//! inside an async runtime.

use std::fmt;
use std::time::Duration;

use packtest_common::error::{HarnessError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Host address of a published instance port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// Published host port.
    pub port: u16,
}

impl Endpoint {
    /// An endpoint on the local host.
    #[must_use]
    pub fn localhost(port: u16) -> Self {
        Self {
            host: "localhost".into(),
            port,
        }
    }

    /// Builds an `http://` URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        let sep = if path.starts_with('/') { "" } else { "/" };
        format!("http://{}:{}{sep}{path}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Response to a probe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl ProbeResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Blocking HTTP client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::blocking::Client,
    endpoint: Endpoint,
}

impl HttpProbe {
    /// Creates a probe for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Probe` if the HTTP client cannot be built or
    /// the caller is running inside an async runtime.
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(HarnessError::Probe {
                url: endpoint.url("/"),
                message: "blocking probe created inside an async runtime".into(),
            });
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HarnessError::Probe {
                url: endpoint.url("/"),
                message: e.to_string(),
            })?;
        Ok(Self { client, endpoint })
    }

    /// Returns the probed endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends `GET path` and returns whatever came back.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Probe` on transport failure.
    pub fn get(&self, path: &str) -> Result<ProbeResponse> {
        let url = self.endpoint.url(path);
        let probe_err = |e: reqwest::Error| HarnessError::Probe {
            url: url.clone(),
            message: e.to_string(),
        };
        let response = self.client.get(&url).send().map_err(probe_err)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(probe_err)?;
        tracing::debug!(url = %url, status, "probe response");
        Ok(ProbeResponse { status, body })
    }

    /// Sends `GET path` and fails unless the status is 2xx.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Probe` on transport failure or a non-2xx
    /// status.
    pub fn expect_success(&self, path: &str) -> Result<ProbeResponse> {
        let response = self.get(path)?;
        if response.is_success() {
            return Ok(response);
        }
        Err(HarnessError::Probe {
            url: self.endpoint.url(path),
            message: format!("received bad response from application: status {}", response.status),
        })
    }
}
