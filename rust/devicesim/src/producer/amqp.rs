use super::gate::ConnectGate;
use super::interface::{BrokerType, Producer, ProducerConfig};
use crate::error::{Result, SimError};
use async_trait::async_trait;
use futures::FutureExt;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::tcp::{AMQPUriTcpExt, HandshakeResult};
use lapin::types::FieldTable;
use lapin::uri::AMQPUri;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use log::{debug, info, warn};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

const REPLY_SUCCESS: u16 = 200;
const PERSISTENT_DELIVERY: u8 = 2;
const CLOSE_GRACE: Duration = Duration::from_secs(3);

struct AmqpSession {
    connection: Connection,
    channel: Channel,
}

/// Queue producer for AMQP 0-9-1 brokers (RabbitMQ) built on `lapin`.
///
/// The connection and its channel are opened in sequence and torn down
/// together; an error on either one clears the connected flag.
pub struct AmqpProducer {
    config: ProducerConfig,
    uri: AMQPUri,
    target: String,
    gate: ConnectGate,
    session: Arc<Mutex<Option<AmqpSession>>>,
}

impl AmqpProducer {
    pub fn new(config: ProducerConfig) -> Result<Self> {
        config.validate()?;
        let raw = amqp_uri(&config)?;
        let uri = raw.parse::<AMQPUri>().map_err(|e| {
            SimError::Configuration(format!("invalid AMQP URI for {}: {}", redacted(&raw), e))
        })?;
        Ok(Self {
            config,
            uri,
            target: redacted(&raw),
            gate: ConnectGate::new(),
            session: Arc::new(Mutex::new(None)),
        })
    }
}

fn amqp_uri(config: &ProducerConfig) -> Result<String> {
    let raw = config.connection_string.trim();
    let invalid = |reason: String| {
        SimError::Configuration(format!("invalid AMQP connection string '{}': {}", raw, reason))
    };
    let mut url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "amqp" if config.ssl_enabled() => {
            url.set_scheme("amqps")
                .map_err(|_| invalid("cannot upgrade to amqps".to_string()))?;
        }
        "amqp" | "amqps" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    if let Some(username) = &config.username {
        url.set_username(username)
            .map_err(|_| invalid("cannot set username".to_string()))?;
        url.set_password(config.password.as_deref())
            .map_err(|_| invalid("cannot set password".to_string()))?;
    }
    Ok(url.to_string())
}

/// Host part of the URI, safe to log.
fn redacted(uri: &str) -> String {
    Url::parse(uri)
        .ok()
        .and_then(|url| {
            url.host_str()
                .map(|host| format!("{}:{}", host, url.port().unwrap_or(5672)))
        })
        .unwrap_or_else(|| "<amqp>".to_string())
}

/// Second handle on the socket lapin is handshaking over.
///
/// lapin drives its I/O on a thread of its own, so dropping the connect future
/// leaves that thread waiting on a silent peer. Shutting the socket down from
/// here is what ends it.
#[derive(Clone, Default)]
struct HandshakeSocket {
    state: Arc<std::sync::Mutex<(Option<TcpStream>, bool)>>,
}

impl HandshakeSocket {
    fn register(&self, socket: &TcpStream) {
        let Ok(clone) = socket.try_clone() else { return };
        let Ok(mut state) = self.state.lock() else { return };
        let (stored, abandoned) = &mut *state;
        if *abandoned {
            let _ = clone.shutdown(Shutdown::Both);
        } else {
            *stored = Some(clone);
        }
    }

    fn abandon(&self) {
        let Ok(mut state) = self.state.lock() else { return };
        let (stored, abandoned) = &mut *state;
        *abandoned = true;
        if let Some(socket) = stored.take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }
}

async fn close_quietly(connection: &Connection) {
    match tokio::time::timeout(CLOSE_GRACE, connection.close(REPLY_SUCCESS, "closing")).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("AMQP connection close failed: {}", e),
        Err(_) => debug!("AMQP connection close timed out"),
    }
}

#[async_trait]
impl Producer for AmqpProducer {
    async fn connect(&self) -> Result<()> {
        let uri = self.uri.clone();
        let target = self.target.clone();
        let session = self.session.clone();
        let connected = self.gate.flag();
        let limit = self.config.timeout();

        self.gate
            .connect(move || {
                async move {
                    let socket = HandshakeSocket::default();
                    let register = socket.clone();
                    let connector = Connection::connector(
                        uri,
                        Box::new(move |uri: &AMQPUri| -> HandshakeResult {
                            let stream = uri.connect()?;
                            register.register(&stream);
                            Ok(stream)
                        }),
                        ConnectionProperties::default(),
                    );
                    let connection = match tokio::time::timeout(limit, connector).await {
                        Ok(Ok(connection)) => connection,
                        Ok(Err(e)) => {
                            socket.abandon();
                            return Err(SimError::Connection(format!(
                                "AMQP connection to {} failed: {}",
                                target, e
                            )))
                        }
                        Err(_) => {
                            socket.abandon();
                            return Err(SimError::Connection(format!(
                                "AMQP connect to {} timed out after {}ms",
                                target,
                                limit.as_millis()
                            )))
                        }
                    };

                    let channel = match tokio::time::timeout(limit, connection.create_channel()).await {
                        Ok(Ok(channel)) => channel,
                        Ok(Err(e)) => {
                            close_quietly(&connection).await;
                            socket.abandon();
                            return Err(SimError::Connection(format!(
                                "AMQP channel creation failed: {}",
                                e
                            )));
                        }
                        Err(_) => {
                            close_quietly(&connection).await;
                            socket.abandon();
                            return Err(SimError::Connection(format!(
                                "AMQP channel creation timed out after {}ms",
                                limit.as_millis()
                            )));
                        }
                    };

                    let flag = connected.clone();
                    connection.on_error(move |e| {
                        warn!("AMQP connection error: {}", e);
                        flag.store(false, Ordering::SeqCst);
                    });
                    let flag = connected;
                    channel.on_error(move |e| {
                        warn!("AMQP channel error: {}", e);
                        flag.store(false, Ordering::SeqCst);
                    });

                    info!("AMQP producer connected to {}", target);
                    *session.lock().await = Some(AmqpSession { connection, channel });
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    async fn disconnect(&self) {
        self.gate.settle().await;
        let session = self.session.lock().await.take();
        if let Some(AmqpSession { connection, channel }) = session {
            if channel.status().connected() {
                match tokio::time::timeout(CLOSE_GRACE, channel.close(REPLY_SUCCESS, "closing")).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!("AMQP channel close failed: {}", e),
                    Err(_) => debug!("AMQP channel close timed out"),
                }
            }
            if connection.status().connected() {
                close_quietly(&connection).await;
            }
        }
        self.gate.mark_disconnected();
    }

    async fn send(&self, destination: &str, message: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(SimError::NotConnected);
        }
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(SimError::NotConnected)?;

        let publish = async {
            session
                .channel
                .queue_declare(
                    destination,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    SimError::Send(format!("AMQP queue '{}' declare failed: {}", destination, e))
                })?;

            let properties = BasicProperties::default()
                .with_content_type("application/json".into())
                .with_delivery_mode(PERSISTENT_DELIVERY);
            session
                .channel
                .basic_publish(
                    "",
                    destination,
                    BasicPublishOptions::default(),
                    message.as_bytes(),
                    properties,
                )
                .await
                .map_err(|e| SimError::Send(format!("AMQP publish to '{}' failed: {}", destination, e)))?
                .await
                .map_err(|e| SimError::Send(format!("AMQP publish to '{}' not confirmed: {}", destination, e)))?;
            Ok::<(), SimError>(())
        };

        let limit = self.config.timeout();
        tokio::time::timeout(limit, publish).await.map_err(|_| {
            SimError::Send(format!(
                "AMQP publish to '{}' timed out after {}ms",
                destination,
                limit.as_millis()
            ))
        })?
    }

    fn is_connected(&self) -> bool {
        if !self.gate.is_connected() {
            return false;
        }
        match self.session.try_lock() {
            Ok(guard) => guard.as_ref().is_some_and(|session| {
                session.connection.status().connected() && session.channel.status().connected()
            }),
            // a send or disconnect holds the session; the flag is authoritative then
            Err(_) => true,
        }
    }

    fn broker_type(&self) -> BrokerType {
        BrokerType::Amqp
    }
}
