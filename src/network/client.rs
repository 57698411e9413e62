//! Network Client
//!
//! reqwest-based client for probing peers, delivering replication tasks and
//! registering with the primary.

use std::time::Duration;

use super::{endpoint, PeerTransport};
use crate::error::{Error, Result};
use crate::replication::protocol::{RegisterParams, ReplicaAck, ReplicaRequest, PING_PATH, REGISTER_PATH};
use crate::replication::ReplicationTask;

/// HTTP client for talking to peer nodes
#[derive(Clone)]
pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    /// Create a new client; `request_timeout` bounds every call that does not set its own
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http })
    }

    /// Register `self_address` with the primary once
    pub async fn register_with(&self, primary: &str, self_address: &str) -> Result<()> {
        let url = endpoint(primary, REGISTER_PATH);
        let params = RegisterParams {
            address: self_address.to_string(),
        };

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| classify(primary, e))?;

        check_status(primary, &response)?;
        Ok(())
    }

    /// Keep registering with the primary until it accepts us
    pub async fn register_until_accepted(&self, primary: &str, self_address: &str, retry: Duration) {
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            match self.register_with(primary, self_address).await {
                Ok(()) => {
                    tracing::info!("Registered with primary {} as {}", primary, self_address);
                    return;
                }
                Err(e) => {
                    // Primary is often not up yet when replicas start; keep noise low.
                    if attempts == 1 || attempts % 30 == 0 {
                        tracing::warn!(
                            "Registration with primary {} failed (attempt {}): {}",
                            primary,
                            attempts,
                            e
                        );
                    }
                }
            }
            tokio::time::sleep(retry).await;
        }
    }
}

#[async_trait::async_trait]
impl PeerTransport for HttpPeerClient {
    async fn probe(&self, address: &str, timeout: Duration) -> Result<()> {
        let response = self
            .http
            .get(endpoint(address, PING_PATH))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(address, e))?;

        check_status(address, &response)
    }

    async fn deliver(&self, address: &str, task: &ReplicationTask) -> Result<ReplicaAck> {
        let request = ReplicaRequest::for_task(task);
        let url = endpoint(address, request.path());

        let builder = match &request {
            ReplicaRequest::Get { query, .. } => self.http.get(&url).query(query),
            ReplicaRequest::Post { body, .. } => self.http.post(&url).json(body),
        };

        let response = builder.send().await.map_err(|e| classify(address, e))?;
        check_status(address, &response)?;

        let text = response.text().await.map_err(|e| classify(address, e))?;
        match serde_json::from_str::<ReplicaAck>(&text) {
            Ok(ack) => Ok(ack),
            Err(e) => {
                tracing::debug!("Replica {} sent a non-standard acknowledgement: {}", address, e);
                Ok(ReplicaAck {
                    message: text,
                    ..Default::default()
                })
            }
        }
    }
}

fn check_status(address: &str, response: &reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(Error::ReplicaRejected {
            address: address.to_string(),
            status: response.status().as_u16(),
        })
    }
}

fn classify(address: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::ConnectionTimeout(address.to_string())
    } else if e.is_connect() {
        Error::ConnectionFailed {
            address: address.to_string(),
            reason: e.to_string(),
        }
    } else {
        Error::Network(format!("{}: {}", address, e))
    }
}
