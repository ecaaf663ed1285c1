//! Page executor seam
//!
//! The pool invokes targets through [`PageExecutor`]/[`PageSession`], which
//! is where site-specific extraction lives. A session is opened once per
//! worker against its bound proxy unit and reused for every target the
//! worker processes; recreating connections per target costs time and makes
//! the traffic pattern more conspicuous.

use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, eyre};
use serde::Deserialize;
use tracing::debug;

use crate::fleet::ProxyUnit;
use crate::queue::Target;

/// Structured data extracted from one page visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageData {
    /// Fixed-size ordered slot states
    pub slots: Vec<String>,

    /// Whether the page offered a purchase action
    pub available: bool,
}

impl PageData {
    /// Whether any slot reports live state
    pub fn stocked(&self) -> bool {
        self.slots.iter().any(|slot| {
            let slot = slot.trim();
            !slot.is_empty() && !slot.eq_ignore_ascii_case("none")
        })
    }
}

/// Outcome of processing one target once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Structured data was extracted
    Data(PageData),

    /// Timeout or empty page; not an error
    NoData,
}

/// One persistent page session bound to a proxy unit
#[async_trait]
pub trait PageSession: Send {
    /// Process one target, honoring the timeout by returning NoData
    async fn execute(&mut self, target: &Target, timeout: Duration) -> Result<ProbeOutcome>;
}

/// Opens page sessions against proxy units
#[async_trait]
pub trait PageExecutor: Send + Sync {
    async fn open_session(&self, unit: &ProxyUnit) -> Result<Box<dyn PageSession>>;
}

/// Wire shape the HTTP executor extracts
#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    slots: Vec<String>,

    #[serde(default)]
    available: bool,
}

/// Default executor: plain HTTP fetch through the unit's proxy endpoint
pub struct HttpExecutor;

/// A reqwest client routed through one proxy unit
pub struct HttpSession {
    http: reqwest::Client,
}

#[async_trait]
impl PageExecutor for HttpExecutor {
    async fn open_session(&self, unit: &ProxyUnit) -> Result<Box<dyn PageSession>> {
        debug!(endpoint = %unit.endpoint, "open_session: called");
        let http = reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(&unit.endpoint)?)
            .build()?;
        Ok(Box::new(HttpSession { http }))
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn execute(&mut self, target: &Target, timeout: Duration) -> Result<ProbeOutcome> {
        debug!(url = %target.url, "execute: called");
        let fetch = async {
            let response = self.http.get(&target.url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(eyre!("HTTP {status} from {}", target.url));
            }
            // An unparseable body is "nothing", not an error
            Ok(response.json::<PageBody>().await.ok())
        };

        match tokio::time::timeout(timeout, fetch).await {
            Err(_) => {
                debug!(url = %target.url, ?timeout, "execute: timed out");
                Ok(ProbeOutcome::NoData)
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(None)) => {
                debug!(url = %target.url, "execute: no structured data in body");
                Ok(ProbeOutcome::NoData)
            }
            Ok(Ok(Some(body))) => Ok(ProbeOutcome::Data(PageData {
                slots: body.slots,
                available: body.available,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stocked_ignores_empty_and_none_slots() {
        let data = PageData {
            slots: vec![String::new(), "none".to_string(), " ".to_string()],
            available: true,
        };
        assert!(!data.stocked());

        let data = PageData {
            slots: vec![String::new(), "3".to_string()],
            available: false,
        };
        assert!(data.stocked());
    }

    #[test]
    fn test_page_body_defaults() {
        let body: PageBody = serde_json::from_str("{}").unwrap();
        assert!(body.slots.is_empty());
        assert!(!body.available);

        let body: PageBody = serde_json::from_str(r#"{"slots": ["a", ""], "available": true}"#).unwrap();
        assert_eq!(body.slots.len(), 2);
        assert!(body.available);
    }
}
