use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_auth::{DiscoverySecret, Token};
use pulse_config::Config;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::time::{Duration, Instant};

use crate::services::transport::{RegistryRequest, RegistryTransport, TransportError};

pub const INBOUND_SECRET: &str = "inbound-secret";
pub const DISCOVERY_SECRET: &str = "discovery-secret";

/// Returns a valid configuration with both secrets set, merged with `overrides`.
pub fn test_config(overrides: Value) -> Config {
    let mut values = json!({
        "service": {"name": "metrics-service", "port": 3000},
        "auth": {"secret": INBOUND_SECRET},
        "discovery": {
            "secret": DISCOVERY_SECRET,
            "heartbeat_interval": 10,
            "retry_initial_interval": 100,
            "retry_max_interval": 2,
        },
    });
    merge(&mut values, overrides);
    Config::from_json_value(values).unwrap()
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, source) => *target = source,
    }
}

pub fn discovery_secret() -> DiscoverySecret {
    DISCOVERY_SECRET.parse().unwrap()
}

/// A request observed by [`MockTransport`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub path: String,
    pub token: Token,
    pub payload: Value,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<u16>,
    requests: Vec<RecordedRequest>,
}

/// A transport answering with scripted status codes.
///
/// Once the script is exhausted every request succeeds.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(responses: impl IntoIterator<Item = u16>) -> Self {
        let state = MockState {
            responses: responses.into_iter().collect(),
            requests: Vec::new(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

/// Advances paused time until `count` requests have been recorded in total.
pub async fn wait_for_requests(transport: &MockTransport, count: usize) {
    while transport.requests().len() < count {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

impl RegistryTransport for MockTransport {
    async fn send(&self, request: RegistryRequest) -> Result<(), TransportError> {
        let status = {
            let mut state = self.state.lock();
            state.requests.push(RecordedRequest {
                path: request.path,
                token: request.envelope.token().clone(),
                payload: serde_json::from_slice(request.envelope.payload()).unwrap(),
                at: Instant::now(),
            });
            state.responses.pop_front().unwrap_or(200)
        };

        let status = StatusCode::from_u16(status).unwrap();
        match status.is_success() {
            true => Ok(()),
            false => Err(TransportError::Status(status)),
        }
    }
}
