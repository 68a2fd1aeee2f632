use std::time::Duration;

/// Broker endpoint for the traffic light deployment (MQTT over secure WebSocket).
pub const BROKER_URL: &str = "wss://broker.hivemq.com:8884/mqtt";
pub const BROKER_PORT: u16 = 8884;

/// Panel publishes operator commands here.
pub const COMMAND_TOPIC: &str = "senai928/semaforo/comando";
/// Device publishes its actual lamp state here.
pub const STATUS_TOPIC: &str = "senai928/semaforo/status";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Delay before the single reconnect attempt after a session ends.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub broker_url: String,
    pub broker_port: u16,
    pub command_topic: String,
    pub status_topic: String,
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
    pub retry_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            broker_url: BROKER_URL.to_string(),
            broker_port: BROKER_PORT,
            command_topic: COMMAND_TOPIC.to_string(),
            status_topic: STATUS_TOPIC.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            keep_alive: KEEP_ALIVE,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Public brokers drop the older of two sessions sharing a client id, so every
/// panel instance gets a random suffix.
pub fn session_client_id() -> String {
    format!("webClient_{:08x}", rand::random::<u32>())
}
