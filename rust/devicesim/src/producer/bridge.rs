use super::gate::ConnectGate;
use super::interface::{BrokerType, Producer, ProducerConfig};
use super::rest::describe_request_error;
use crate::error::{Result, SimError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::FutureExt;
use log::{debug, info};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use url::Url;

pub const KAFKA_NATIVE_PORT: u16 = 9092;
pub const KAFKA_NATIVE_TLS_PORT: u16 = 9093;
pub const KAFKA_REST_PORT: u16 = 8082;

const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";
const KAFKA_V2: &str = "application/vnd.kafka.v2+json";

/// Resolves the REST proxy base URL for a Kafka connection string.
///
/// `http(s)://` strings are used as given. Native broker addresses
/// (`kafka://host:9092`, `host:9092`, `host`, or a comma-separated bootstrap
/// list, of which the first entry is used) map to the REST proxy's default port
/// on the same host. Any other explicit port is assumed to already be the proxy
/// port. This is a naming convention, not service discovery.
pub fn derive_rest_proxy_url(connection_string: &str, ssl: bool) -> Result<String> {
    let raw = connection_string.trim();
    let invalid = |reason: &str| {
        SimError::Configuration(format!("invalid Kafka connection string '{}': {}", raw, reason))
    };

    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
        return Ok(raw.trim_end_matches('/').to_string());
    }

    let without_scheme = match raw.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("kafka") => rest,
        Some((scheme, _)) => return Err(invalid(&format!("unsupported scheme '{}'", scheme))),
        None => raw,
    };
    let first = without_scheme
        .split(',')
        .next()
        .map(str::trim)
        .filter(|broker| !broker.is_empty())
        .ok_or_else(|| invalid("no broker address"))?;

    let broker = Url::parse(&format!("kafka://{}", first)).map_err(|e| invalid(&e.to_string()))?;
    let host = broker
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| invalid("missing host"))?;
    let port = match broker.port() {
        None | Some(KAFKA_NATIVE_PORT) | Some(KAFKA_NATIVE_TLS_PORT) => KAFKA_REST_PORT,
        Some(port) => port,
    };
    let scheme = if ssl { "https" } else { "http" };
    Ok(format!("{}://{}:{}", scheme, host, port))
}

/// Kafka producer speaking to a REST proxy instead of the native protocol.
///
/// "Connecting" is a HEAD probe of the proxy; there is no session to keep.
pub struct HttpBridgeProducer {
    base_url: Url,
    auth_header: Option<HeaderValue>,
    client: reqwest::Client,
    gate: ConnectGate,
}

impl HttpBridgeProducer {
    pub fn new(config: ProducerConfig) -> Result<Self> {
        config.validate()?;
        let base = derive_rest_proxy_url(&config.connection_string, config.ssl_enabled())?;
        let base_url = Url::parse(&base)
            .map_err(|e| SimError::Configuration(format!("invalid REST proxy URL '{}': {}", base, e)))?;

        let auth_header = match &config.username {
            Some(username) => {
                let token = STANDARD.encode(format!(
                    "{}:{}",
                    username,
                    config.password.as_deref().unwrap_or_default()
                ));
                let mut value = HeaderValue::from_str(&format!("Basic {}", token))
                    .map_err(|e| SimError::Configuration(format!("invalid credentials: {}", e)))?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SimError::Configuration(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            base_url,
            auth_header,
            client,
            gate: ConnectGate::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn topic_url(&self, topic: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SimError::Configuration(format!("cannot extend URL {}", self.base_url)))?
            .pop_if_empty()
            .push("topics")
            .push(topic);
        Ok(url)
    }
}

#[async_trait]
impl Producer for HttpBridgeProducer {
    async fn connect(&self) -> Result<()> {
        let client = self.client.clone();
        let url = self.base_url.clone();
        let auth = self.auth_header.clone();

        self.gate
            .connect(move || {
                async move {
                    let mut request = client.head(url.clone());
                    if let Some(auth) = auth {
                        request = request.header(AUTHORIZATION, auth);
                    }
                    let response = request.send().await.map_err(|e| {
                        SimError::Connection(format!(
                            "REST proxy probe failed: {}",
                            describe_request_error(&e)
                        ))
                    })?;

                    let status = response.status();
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                        return Err(SimError::Connection(format!(
                            "REST proxy at {} rejected credentials ({})",
                            url, status
                        )));
                    }
                    if status.is_server_error() {
                        return Err(SimError::Connection(format!(
                            "REST proxy at {} is unhealthy ({})",
                            url, status
                        )));
                    }
                    debug!("REST proxy probe {} answered {}", url, status);
                    info!("Kafka REST bridge reachable at {}", url);
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    async fn disconnect(&self) {
        self.gate.settle().await;
        self.gate.mark_disconnected();
    }

    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(SimError::NotConnected);
        }
        let url = self.topic_url(destination)?;
        let value = serde_json::from_str::<Value>(message)
            .unwrap_or_else(|_| Value::String(message.to_string()));
        let body = json!({ "records": [{ "value": value }] });

        let mut request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, KAFKA_JSON_V2)
            .header(ACCEPT, KAFKA_V2)
            .body(body.to_string());
        if let Some(auth) = &self.auth_header {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let response = request.send().await.map_err(|e| {
            SimError::Send(format!(
                "REST proxy POST {} failed: {}",
                url,
                describe_request_error(&e)
            ))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(SimError::Rejected {
            status: status.as_u16(),
            message: if detail.is_empty() {
                status.to_string()
            } else {
                detail
            },
        })
    }

    fn is_connected(&self) -> bool {
        self.gate.is_connected()
    }

    fn broker_type(&self) -> BrokerType {
        BrokerType::Kafka
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_from_native_addresses() {
        assert_eq!(
            derive_rest_proxy_url("kafka://broker.local:9092", false).unwrap(),
            "http://broker.local:8082"
        );
        assert_eq!(
            derive_rest_proxy_url("broker.local:9092,broker2.local:9092", false).unwrap(),
            "http://broker.local:8082"
        );
        assert_eq!(
            derive_rest_proxy_url("broker.local", true).unwrap(),
            "https://broker.local:8082"
        );
        assert_eq!(
            derive_rest_proxy_url("broker.local:18082", false).unwrap(),
            "http://broker.local:18082"
        );
    }

    #[test]
    fn test_derive_keeps_http_urls() {
        assert_eq!(
            derive_rest_proxy_url("http://proxy.local:8082/", false).unwrap(),
            "http://proxy.local:8082"
        );
        assert_eq!(
            derive_rest_proxy_url("https://proxy.local/kafka", false).unwrap(),
            "https://proxy.local/kafka"
        );
    }

    #[test]
    fn test_derive_rejects_garbage() {
        assert!(derive_rest_proxy_url("amqp://rabbit:5672", false).is_err());
        assert!(derive_rest_proxy_url("kafka://", false).is_err());
        assert!(derive_rest_proxy_url("http://", false).is_err());
    }

    #[test]
    fn test_topic_url_is_destination_qualified() {
        let producer =
            HttpBridgeProducer::new(ProducerConfig::new("https://proxy.local/kafka")).unwrap();
        assert_eq!(
            producer.topic_url("sensor data").unwrap().as_str(),
            "https://proxy.local/kafka/topics/sensor%20data"
        );

        let producer = HttpBridgeProducer::new(ProducerConfig::new("broker.local:9092")).unwrap();
        assert_eq!(
            producer.topic_url("telemetry").unwrap().as_str(),
            "http://broker.local:8082/topics/telemetry"
        );
    }

    #[test]
    fn test_auth_header_built_once() {
        let producer = HttpBridgeProducer::new(
            ProducerConfig::new("http://proxy.local").with_credentials("sim", "secret"),
        )
        .unwrap();
        let header = producer.auth_header.as_ref().unwrap();
        assert_eq!(header.to_str().unwrap(), "Basic c2ltOnNlY3JldA==");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_send_before_connect() {
        let producer = HttpBridgeProducer::new(ProducerConfig::new("http://127.0.0.1:1")).unwrap();
        assert_eq!(producer.send("t", "{}").await, Err(SimError::NotConnected));
    }
}
