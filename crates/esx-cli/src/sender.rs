//! 📡 BulkSender: the part that actually talks to Elasticsearch.
//!
//! The formatting core hands us bytes. We POST them to `/_bulk`, collect the status and the
//! body, and hand both back. Deciding what they mean is `BulkFormatter::check_response`'s job.
//!
//! 🔄 This does not retry. Retries are the caller's problem. Good luck.

use std::time::Duration;

use anyhow::{Context, Result};
use esx::EndpointConfig;
use tracing::debug;

/// 📬 What came back from one bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkReply {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub struct BulkSender {
    endpoint: EndpointConfig,
    client: reqwest::Client,
}

impl BulkSender {
    /// 🔧 10s to connect, 30s for the whole request. Bulk bodies can be meaty.
    pub fn new(endpoint: EndpointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("💀 The HTTP client refused to be born. Probably a TLS stack having a bad day.")?;
        Ok(Self { endpoint, client })
    }

    /// 📡 POST one NDJSON body and return whatever Elasticsearch said, good or bad.
    ///
    /// Only transport failures are errors here. A 4xx/5xx is a perfectly valid reply.
    pub async fn send(&self, body: Vec<u8>) -> Result<BulkReply> {
        let bulk_url = self.endpoint.bulk_url();
        debug!("📡 POST {} bytes to {bulk_url}", body.len());

        let mut request = self
            .client
            .post(&bulk_url)
            // ⚠️ not application/json. Elasticsearch is very particular about this.
            .header("Content-Type", "application/x-ndjson");
        if let Some(user) = &self.endpoint.http_user {
            request = request.basic_auth(user, self.endpoint.http_passwd.as_ref());
        }

        let response = request.body(body).send().await.with_context(|| {
            format!(
                "💀 The bulk request to '{bulk_url}' never made it. Check connectivity, check timeouts, check your feelings."
            )
        })?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .context("💀 Elasticsearch answered, then trailed off mid-sentence.")?
            .to_vec();

        debug!("📬 HTTP {status}, {} bytes back", body.len());
        Ok(BulkReply { status, body })
    }
}
