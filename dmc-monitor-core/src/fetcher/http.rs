use crate::config::SourceConfig;
use crate::error::PipelineError;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upper bound on a downloaded report; DMC PDFs are a few MB at most
const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;

/// Blocking HTTP GET, the only network access the pipeline needs
pub trait HttpClient: Send + Sync {
    fn get_text(&self, url: &str) -> Result<String, PipelineError>;
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

impl<T: HttpClient + ?Sized> HttpClient for Arc<T> {
    fn get_text(&self, url: &str) -> Result<String, PipelineError> {
        (**self).get_text(url)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        (**self).get_bytes(url)
    }
}

fn unavailable(url: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::SourceUnavailable {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// ureq-backed client with separate timeouts for listing pages and documents
pub struct UreqClient {
    listing_agent: ureq::Agent,
    document_agent: ureq::Agent,
}

impl UreqClient {
    pub fn new(source: &SourceConfig) -> Self {
        let agent = |timeout_secs: u64| {
            ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(&source.user_agent)
                .build()
        };
        Self {
            listing_agent: agent(source.listing_timeout_secs),
            document_agent: agent(source.document_timeout_secs),
        }
    }

    fn call(agent: &ureq::Agent, url: &str) -> Result<ureq::Response, PipelineError> {
        match agent.get(url).call() {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(code, response)) => Err(unavailable(
                url,
                format!("HTTP {} {}", code, response.status_text()),
            )),
            Err(e) => Err(unavailable(url, e.to_string())),
        }
    }
}

impl HttpClient for UreqClient {
    fn get_text(&self, url: &str) -> Result<String, PipelineError> {
        let response = Self::call(&self.listing_agent, url)?;
        response
            .into_string()
            .map_err(|e| unavailable(url, format!("reading body: {e}")))
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = Self::call(&self.document_agent, url)?;
        read_capped(url, response.into_reader(), MAX_DOCUMENT_BYTES)
    }
}

/// Read a whole body, refusing one longer than `cap` bytes instead of cutting it short
fn read_capped(url: &str, reader: impl Read, cap: u64) -> Result<Vec<u8>, PipelineError> {
    let mut bytes = Vec::new();
    reader
        .take(cap.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| unavailable(url, format!("reading body: {e}")))?;
    if bytes.len() as u64 > cap {
        return Err(unavailable(
            url,
            format!("document exceeds the {cap} byte download limit"),
        ));
    }
    Ok(bytes)
}

/// In-memory client serving canned responses, for tests and offline replays
#[derive(Default)]
pub struct StaticHttpClient {
    responses: HashMap<String, Result<Vec<u8>, u16>>,
    requests: Mutex<Vec<String>>,
}

impl StaticHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Err(status));
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(unavailable(url, format!("HTTP {status}"))),
            None => Err(unavailable(url, "HTTP 404")),
        }
    }
}

impl HttpClient for StaticHttpClient {
    fn get_text(&self, url: &str) -> Result<String, PipelineError> {
        self.respond(url)
            .map(|body| String::from_utf8_lossy(&body).into_owned())
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        self.respond(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const URL: &str = "https://dmc.test/big.pdf";

    #[test]
    fn body_at_the_cap_is_read_whole() {
        let bytes = read_capped(URL, Cursor::new(vec![7u8; 16]), 16).unwrap();
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn oversized_body_is_refused_not_truncated() {
        match read_capped(URL, Cursor::new(vec![7u8; 17]), 16).unwrap_err() {
            PipelineError::SourceUnavailable { url, reason } => {
                assert_eq!(url, URL);
                assert!(reason.contains("16 byte download limit"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
