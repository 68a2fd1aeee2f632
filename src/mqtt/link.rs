//! MQTT link actor - connection lifecycle and message pumping
//!
//! Owns the broker session through the [`Messaging`] capability and talks to
//! the panel exclusively over channels: operator commands flow in, link events
//! (connection transitions and raw status payloads) flow out.

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::{self, LinkConfig};
use super::message::CommandMessage;

/// Everything the link actor needs from a concrete MQTT client.
///
/// One adapter ([`RumqttcLink`]) talks to the real broker; tests drive the
/// actor with a scripted fake instead.
#[async_trait]
pub trait Messaging: Send {
    /// Opens a fresh session; resolves once the broker acknowledges.
    async fn connect(&mut self) -> Result<(), MessagingError>;
    async fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError>;
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), MessagingError>;
    /// Waits for the next inbound event on the open session.
    async fn next_event(&mut self) -> MessagingEvent;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagingEvent {
    Message { topic: String, payload: Vec<u8> },
    Lost(String),
}

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("no open session")]
    NotConnected,
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("mqtt transport unavailable: {0} is not a ws:// or wss:// endpoint")]
    TransportUnavailable(String),
}

/// Notifications from the link actor to the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connecting,
    Connected,
    ConnectFailed(String),
    ConnectionLost(String),
    /// Raw payload received on the status topic.
    Status(Vec<u8>),
}

/// Handle for the spawned link actor.
///
/// The actor is fire-and-forget like the other backend tasks: it runs until
/// the panel side drops its channel ends.
pub struct LinkHandle {}

impl LinkHandle {
    /// Validates the broker endpoint and spawns the connection actor.
    ///
    /// An endpoint that is not a WebSocket URL means the configured transport
    /// cannot exist in this build; the caller keeps the panel running in
    /// local-only mode.
    pub fn spawn(
        config: LinkConfig,
        commands: mpsc::Receiver<CommandMessage>,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Self, LinkError> {
        if !(config.broker_url.starts_with("ws://") || config.broker_url.starts_with("wss://")) {
            return Err(LinkError::TransportUnavailable(config.broker_url));
        }

        info!(broker = %config.broker_url, "starting mqtt link");
        let messaging = RumqttcLink::new(config.clone());
        let actor = MqttLink {
            config,
            commands,
            events,
        };
        tokio::spawn(actor.drive(messaging));
        Ok(Self {})
    }
}

enum SessionEnd {
    Lost(String),
    Closed,
}

struct MqttLink {
    config: LinkConfig,
    commands: mpsc::Receiver<CommandMessage>,
    events: mpsc::Sender<LinkEvent>,
}

impl MqttLink {
    async fn drive<M: Messaging>(mut self, mut messaging: M) {
        loop {
            if self.events.send(LinkEvent::Connecting).await.is_err() {
                return;
            }
            match messaging.connect().await {
                Ok(()) => {
                    info!(broker = %self.config.broker_url, "connected to broker");
                    if self.events.send(LinkEvent::Connected).await.is_err() {
                        return;
                    }
                    let end = match messaging.subscribe(&self.config.status_topic).await {
                        Ok(()) => {
                            debug!(topic = %self.config.status_topic, "subscribed to status topic");
                            self.pump(&mut messaging).await
                        }
                        Err(e) => SessionEnd::Lost(format!("subscribe failed: {e}")),
                    };
                    match end {
                        SessionEnd::Closed => return,
                        SessionEnd::Lost(reason) => {
                            warn!(%reason, "connection lost");
                            if self
                                .events
                                .send(LinkEvent::ConnectionLost(reason))
                                .await
                                .is_err()
                            {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "connection failed");
                    if self
                        .events
                        .send(LinkEvent::ConnectFailed(e.to_string()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
            // One retry per ended attempt. The loop serializes attempts, so a
            // second failure can never stack another pending retry.
            tokio::time::sleep(self.config.retry_delay).await;
        }
    }

    /// Runs one established session until it ends.
    async fn pump<M: Messaging>(&mut self, messaging: &mut M) -> SessionEnd {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(message) => self.publish_command(messaging, message).await,
                    None => return SessionEnd::Closed,
                },
                event = messaging.next_event() => match event {
                    MessagingEvent::Message { topic, payload } => {
                        if topic == self.config.status_topic {
                            if self.events.send(LinkEvent::Status(payload)).await.is_err() {
                                return SessionEnd::Closed;
                            }
                        } else {
                            debug!(%topic, "ignoring message on unexpected topic");
                        }
                    }
                    MessagingEvent::Lost(reason) => return SessionEnd::Lost(reason),
                },
            }
        }
    }

    /// Best-effort transmission; the relay already applied the local display
    /// update, so a failed publish is logged and dropped.
    async fn publish_command<M: Messaging>(&self, messaging: &mut M, message: CommandMessage) {
        let payload = match serde_json::to_vec(&message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to encode command envelope");
                return;
            }
        };
        match messaging.publish(&self.config.command_topic, payload).await {
            Ok(()) => debug!(command = ?message.command, "command published"),
            Err(e) => {
                warn!(error = %e, command = ?message.command, "failed to publish command");
            }
        }
    }
}

/// Concrete [`Messaging`] adapter over `rumqttc`.
///
/// Each [`connect`](Messaging::connect) builds a fresh client: clean session,
/// WebSocket transport, keep-alive and connect timeout from the config, and
/// the per-process random client id.
pub struct RumqttcLink {
    config: LinkConfig,
    client_id: String,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
}

impl RumqttcLink {
    pub fn new(config: LinkConfig) -> Self {
        RumqttcLink {
            client_id: config::session_client_id(),
            config,
            client: None,
            eventloop: None,
        }
    }
}

#[async_trait]
impl Messaging for RumqttcLink {
    async fn connect(&mut self) -> Result<(), MessagingError> {
        let mut options = MqttOptions::new(
            &self.client_id,
            &self.config.broker_url,
            self.config.broker_port,
        );
        options.set_transport(Transport::wss_with_default_config());
        options.set_clean_session(true);
        options.set_keep_alive(self.config.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(options, 16);
        let acked = tokio::time::timeout(self.config.connect_timeout, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(MessagingError::from(e)),
                }
            }
        })
        .await;

        match acked {
            Ok(Ok(())) => {
                self.client = Some(client);
                self.eventloop = Some(eventloop);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MessagingError::ConnectTimeout(self.config.connect_timeout)),
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
        let client = self.client.as_ref().ok_or(MessagingError::NotConnected)?;
        client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        let client = self.client.as_ref().ok_or(MessagingError::NotConnected)?;
        // At-least-once so a command is never silently dropped by the broker.
        client.publish(topic, QoS::AtLeastOnce, false, payload).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> MessagingEvent {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return MessagingEvent::Lost(MessagingError::NotConnected.to_string());
        };
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return MessagingEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    };
                }
                Ok(_) => continue,
                Err(e) => {
                    self.client = None;
                    self.eventloop = None;
                    return MessagingEvent::Lost(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::config::{COMMAND_TOPIC, STATUS_TOPIC};
    use crate::mqtt::message::Command;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    struct FakeMessaging {
        connects: VecDeque<Result<(), MessagingError>>,
        sessions: VecDeque<mpsc::UnboundedReceiver<MessagingEvent>>,
        current: Option<mpsc::UnboundedReceiver<MessagingEvent>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeMessaging {
        fn new(
            connects: Vec<Result<(), MessagingError>>,
            sessions: Vec<mpsc::UnboundedReceiver<MessagingEvent>>,
        ) -> (Self, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let fake = FakeMessaging {
                connects: connects.into(),
                sessions: sessions.into(),
                current: None,
                calls: calls.clone(),
            };
            (fake, calls)
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Messaging for FakeMessaging {
        async fn connect(&mut self) -> Result<(), MessagingError> {
            self.record("connect".to_string());
            match self.connects.pop_front() {
                Some(Ok(())) => {
                    self.current = self.sessions.pop_front();
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                // Script exhausted: park so the test can finish its asserts.
                None => std::future::pending().await,
            }
        }

        async fn subscribe(&mut self, topic: &str) -> Result<(), MessagingError> {
            self.record(format!("subscribe {topic}"));
            Ok(())
        }

        async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
            self.record(format!(
                "publish {topic} {}",
                String::from_utf8_lossy(&payload)
            ));
            Ok(())
        }

        async fn next_event(&mut self) -> MessagingEvent {
            match self.current.as_mut() {
                Some(events) => match events.recv().await {
                    Some(event) => event,
                    None => std::future::pending().await,
                },
                None => std::future::pending().await,
            }
        }
    }

    fn test_config(retry_ms: u64) -> LinkConfig {
        LinkConfig {
            retry_delay: Duration::from_millis(retry_ms),
            ..LinkConfig::default()
        }
    }

    fn spawn_actor(
        config: LinkConfig,
        messaging: FakeMessaging,
    ) -> (
        mpsc::Sender<CommandMessage>,
        mpsc::Receiver<LinkEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(32);
        let actor = MqttLink {
            config,
            commands: command_rx,
            events: event_tx,
        };
        let task = tokio::spawn(actor.drive(messaging));
        (command_tx, event_rx, task)
    }

    async fn next(events: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for link event")
            .expect("event channel closed")
    }

    fn timeout_error() -> MessagingError {
        MessagingError::ConnectTimeout(Duration::from_secs(30))
    }

    #[tokio::test]
    async fn failed_connect_schedules_one_retry_per_attempt() {
        let (_session_tx, session_rx) = mpsc::unbounded_channel();
        let (fake, calls) = FakeMessaging::new(
            vec![Err(timeout_error()), Err(timeout_error()), Ok(())],
            vec![session_rx],
        );
        let started = Instant::now();
        let (_command_tx, mut events, task) = spawn_actor(test_config(25), fake);

        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert!(matches!(next(&mut events).await, LinkEvent::ConnectFailed(_)));
        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert!(matches!(next(&mut events).await, LinkEvent::ConnectFailed(_)));
        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert_eq!(next(&mut events).await, LinkEvent::Connected);

        // two failures, one delayed retry each
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(
            calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| call.as_str() == "connect")
                .count(),
            3
        );
        task.abort();
    }

    #[tokio::test]
    async fn subscribes_to_status_topic_once_per_session() {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let (open_tx, open_rx) = mpsc::unbounded_channel();
        let (fake, calls) = FakeMessaging::new(vec![Ok(()), Ok(())], vec![lost_rx, open_rx]);
        let (_command_tx, mut events, task) = spawn_actor(test_config(5), fake);

        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert_eq!(next(&mut events).await, LinkEvent::Connected);

        lost_tx
            .send(MessagingEvent::Lost("keep alive timeout".to_string()))
            .unwrap();
        assert_eq!(
            next(&mut events).await,
            LinkEvent::ConnectionLost("keep alive timeout".to_string())
        );

        // the unified retry path reconnects and resubscribes after a drop
        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert_eq!(next(&mut events).await, LinkEvent::Connected);

        // a forwarded status proves the second session is subscribed and pumping
        open_tx
            .send(MessagingEvent::Message {
                topic: STATUS_TOPIC.to_string(),
                payload: b"{}".to_vec(),
            })
            .unwrap();
        assert_eq!(next(&mut events).await, LinkEvent::Status(b"{}".to_vec()));

        let expected = format!("subscribe {STATUS_TOPIC}");
        assert_eq!(
            calls
                .lock()
                .unwrap()
                .iter()
                .filter(|call| **call == expected)
                .count(),
            2
        );
        task.abort();
    }

    #[tokio::test]
    async fn commands_are_published_as_json_on_the_command_topic() {
        let (_session_tx, session_rx) = mpsc::unbounded_channel();
        let (fake, calls) = FakeMessaging::new(vec![Ok(())], vec![session_rx]);
        let (command_tx, mut events, task) = spawn_actor(test_config(5), fake);

        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert_eq!(next(&mut events).await, LinkEvent::Connected);

        command_tx
            .send(CommandMessage::new(Command::Green))
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let published = loop {
            if let Some(call) = calls
                .lock()
                .unwrap()
                .iter()
                .find(|call| call.starts_with("publish"))
                .cloned()
            {
                break call;
            }
            assert!(Instant::now() < deadline, "command was never published");
            tokio::time::sleep(Duration::from_millis(10)).await;
        };

        assert!(published.starts_with(&format!("publish {COMMAND_TOPIC} ")));
        assert!(published.contains("\"command\":\"green\""));
        assert!(published.contains("\"source\":\"web\""));
        task.abort();
    }

    #[tokio::test]
    async fn status_payloads_are_forwarded_and_foreign_topics_ignored() {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (fake, _calls) = FakeMessaging::new(vec![Ok(())], vec![session_rx]);
        let (_command_tx, mut events, task) = spawn_actor(test_config(5), fake);

        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert_eq!(next(&mut events).await, LinkEvent::Connected);

        session_tx
            .send(MessagingEvent::Message {
                topic: "some/other/topic".to_string(),
                payload: b"ignored".to_vec(),
            })
            .unwrap();
        session_tx
            .send(MessagingEvent::Message {
                topic: STATUS_TOPIC.to_string(),
                payload: br#"{"status":{"red":true}}"#.to_vec(),
            })
            .unwrap();

        assert_eq!(
            next(&mut events).await,
            LinkEvent::Status(br#"{"status":{"red":true}}"#.to_vec())
        );
        task.abort();
    }

    #[tokio::test]
    async fn actor_exits_when_the_panel_drops_its_command_channel() {
        let (_session_tx, session_rx) = mpsc::unbounded_channel();
        let (fake, _calls) = FakeMessaging::new(vec![Ok(())], vec![session_rx]);
        let (command_tx, mut events, task) = spawn_actor(test_config(5), fake);

        assert_eq!(next(&mut events).await, LinkEvent::Connecting);
        assert_eq!(next(&mut events).await, LinkEvent::Connected);

        drop(command_tx);
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("actor did not exit")
            .unwrap();
    }

    #[tokio::test]
    async fn spawn_rejects_non_websocket_endpoints() {
        let (_command_tx, command_rx) = mpsc::channel(1);
        let (event_tx, _event_rx) = mpsc::channel(1);
        let config = LinkConfig {
            broker_url: "tcp://broker.hivemq.com:1883".to_string(),
            ..LinkConfig::default()
        };

        let spawned = LinkHandle::spawn(config, command_rx, event_tx);
        assert!(matches!(spawned, Err(LinkError::TransportUnavailable(_))));
    }
}
