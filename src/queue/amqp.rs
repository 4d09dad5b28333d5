//! AMQP implementation of the Queue Gateway
//!
//! One gateway owns one broker connection. Publishing goes through a
//! confirm-mode channel on that connection; each subscription opens its own
//! channel with a prefetch of one, so a worker never holds more than one
//! unacknowledged message.

use crate::config::BrokerConfig;
use crate::queue::{Acknowledge, DeliverySource, Publisher, QueueError};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::Mutex;
use url::Url;

/// AMQP delivery mode for messages that survive a broker restart
const PERSISTENT: u8 = 2;

struct Session {
    connection: Connection,
    channel: Channel,
}

/// Broker connection owner with lazy, reusable sessions
pub struct AmqpGateway {
    config: BrokerConfig,
    session: Mutex<Option<Session>>,
}

impl AmqpGateway {
    /// Creates a gateway without connecting; the first use connects
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
        }
    }

    /// Creates a gateway and connects immediately
    pub async fn connect(config: BrokerConfig) -> Result<Self, QueueError> {
        let gateway = Self::new(config);
        gateway.publishing_channel().await?;
        Ok(gateway)
    }

    pub fn queue(&self) -> &str {
        &self.config.queue
    }

    /// Opens a connection and a confirm-mode channel, declaring the queue
    async fn open_session(&self) -> Result<Session, QueueError> {
        let connection = Connection::connect_uri(broker_uri(&self.config), ConnectionProperties::default())
            .await
            .map_err(|source| QueueError::Connect {
                uri: self.config.display_uri(),
                source,
            })?;

        let channel = self.open_publishing_channel(&connection).await?;

        tracing::info!(
            "Connected to broker {} (queue '{}')",
            self.config.display_uri(),
            self.config.queue
        );

        Ok(Session {
            connection,
            channel,
        })
    }

    /// Opens a confirm-mode channel on `connection` and declares the queue
    async fn open_publishing_channel(&self, connection: &Connection) -> Result<Channel, QueueError> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|source| QueueError::Connect {
                uri: self.config.display_uri(),
                source,
            })?;

        declare_queue(&channel, &self.config.queue).await?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|source| QueueError::Connect {
                uri: self.config.display_uri(),
                source,
            })?;

        Ok(channel)
    }

    /// Returns the live publishing channel, recovering it if it was lost
    ///
    /// A closed channel on a live connection is replaced in place; a dead
    /// connection is closed and a new session opened.
    async fn publishing_channel(&self) -> Result<Channel, QueueError> {
        let mut session = self.session.lock().await;

        if let Some(existing) = session.as_mut() {
            let recovery = Recovery::for_status(
                existing.channel.status().connected(),
                existing.connection.status().connected(),
            );
            match recovery {
                Recovery::Reuse => return Ok(existing.channel.clone()),
                Recovery::NewChannel => {
                    tracing::warn!("Publish channel closed, opening a new one");
                    let channel = self.open_publishing_channel(&existing.connection).await?;
                    existing.channel = channel.clone();
                    return Ok(channel);
                }
                Recovery::Reconnect => {}
            }
        }

        if let Some(stale) = session.take() {
            tracing::warn!("Broker connection lost, reconnecting");
            if let Err(e) = stale.connection.close(200, "reconnecting").await {
                tracing::debug!("Closing stale connection failed: {}", e);
            }
        }

        let fresh = self.open_session().await?;
        let channel = fresh.channel.clone();
        *session = Some(fresh);
        Ok(channel)
    }

    /// Starts consuming from the work queue with a prefetch of one
    pub async fn subscribe(&self) -> Result<AmqpSubscription, QueueError> {
        // Make sure a live connection exists before opening the consumer channel
        self.publishing_channel().await?;

        let channel = {
            let session = self.session.lock().await;
            let connection = &session
                .as_ref()
                .ok_or_else(|| QueueError::Unavailable("no broker session".to_string()))?
                .connection;
            connection.create_channel().await.map_err(QueueError::Consume)?
        };

        declare_queue(&channel, &self.config.queue).await?;

        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(QueueError::Consume)?;

        let consumer_tag = format!("linkrelay-{}", std::process::id());
        let consumer = channel
            .basic_consume(
                &self.config.queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(QueueError::Consume)?;

        tracing::info!("Subscribed to queue '{}' as {}", self.config.queue, consumer_tag);

        Ok(AmqpSubscription {
            channel,
            consumer,
            queue: self.config.queue.clone(),
        })
    }

    /// Closes the broker connection, if one is open
    pub async fn close(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };

        if let Err(e) = session.channel.close(200, "bye").await {
            tracing::debug!("Closing publish channel failed: {}", e);
        }
        match session.connection.close(200, "bye").await {
            Ok(()) => tracing::info!("Broker connection closed"),
            Err(e) => tracing::warn!("Closing broker connection failed: {}", e),
        }
    }
}

#[async_trait]
impl Publisher for AmqpGateway {
    async fn publish(&self, url: &Url) -> Result<(), QueueError> {
        let channel = self.publishing_channel().await?;

        let confirm = channel
            .basic_publish(
                "",
                &self.config.queue,
                BasicPublishOptions::default(),
                url.as_str().as_bytes(),
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|source| QueueError::Publish {
                url: url.to_string(),
                source,
            })?;

        let confirmation = confirm.await.map_err(|source| QueueError::Publish {
            url: url.to_string(),
            source,
        })?;

        if confirmation.is_nack() {
            return Err(QueueError::Nacked {
                url: url.to_string(),
            });
        }

        tracing::info!("Link added to queue: {}", url);
        Ok(())
    }
}

/// How to get a usable publishing channel from an existing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    Reuse,
    NewChannel,
    Reconnect,
}

impl Recovery {
    fn for_status(channel_connected: bool, connection_connected: bool) -> Self {
        match (channel_connected, connection_connected) {
            (true, true) => Self::Reuse,
            (false, true) => Self::NewChannel,
            (_, false) => Self::Reconnect,
        }
    }
}

/// Connection parameters for the broker
///
/// Credentials and vhost are passed as fields rather than through a URI
/// string, so reserved characters in them need no escaping.
fn broker_uri(config: &BrokerConfig) -> AMQPUri {
    AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.vhost.clone(),
        ..AMQPUri::default()
    }
}

async fn declare_queue(channel: &Channel, queue: &str) -> Result<u32, QueueError> {
    let declared = channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| QueueError::Declare {
            queue: queue.to_string(),
            source,
        })?;
    Ok(declared.message_count())
}

/// An active consumer on the work queue
pub struct AmqpSubscription {
    channel: Channel,
    consumer: Consumer,
    queue: String,
}

impl AmqpSubscription {
    /// Cancels the consumer by closing its channel
    ///
    /// Unacknowledged deliveries return to the queue.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "bye").await {
            tracing::debug!("Closing consumer channel failed: {}", e);
        }
    }
}

#[async_trait]
impl DeliverySource for AmqpSubscription {
    type Delivery = AmqpDelivery;

    async fn next_delivery(&mut self) -> Option<Result<AmqpDelivery, QueueError>> {
        self.consumer
            .next()
            .await
            .map(|result| result.map(AmqpDelivery).map_err(QueueError::Consume))
    }

    async fn pending(&mut self) -> Result<u32, QueueError> {
        declare_queue(&self.channel, &self.queue).await
    }
}

/// A message received from the broker
pub struct AmqpDelivery(Delivery);

#[async_trait]
impl Acknowledge for AmqpDelivery {
    fn payload(&self) -> &[u8] {
        &self.0.data
    }

    fn redelivered(&self) -> bool {
        self.0.redelivered
    }

    async fn ack(self) -> Result<(), QueueError> {
        self.0
            .acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(QueueError::Ack)
    }

    async fn reject(self) -> Result<(), QueueError> {
        self.0
            .acker
            .reject(BasicRejectOptions { requeue: false })
            .await
            .map_err(QueueError::Ack)
    }
}
