//! Command line configuration for the client binary.

use clap::Parser;
use shared::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT};
use std::time::Duration;

/// Headless arena client driven by a movement script
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ClientConfig {
    /// Server host to connect to
    #[clap(short = 's', long, default_value = "127.0.0.1")]
    pub server: String,

    #[clap(long, default_value_t = DEFAULT_TCP_PORT)]
    pub tcp_port: u16,

    #[clap(long, default_value_t = DEFAULT_UDP_PORT)]
    pub udp_port: u16,

    /// Player name shown to other clients
    #[clap(short, long, default_value = "player")]
    pub name: String,

    /// Local simulation frames per second
    #[clap(short, long, default_value = "60")]
    pub tick_rate: u32,

    /// Fire a projectile every N frames, 0 disables
    #[clap(short, long, default_value = "0")]
    pub fire_every: u32,

    /// Request a block under the player every N frames, 0 disables
    #[clap(long, default_value = "0")]
    pub block_every: u32,

    /// Stand still instead of wandering
    #[clap(long)]
    pub idle: bool,

    /// Spawn position, random near the origin when omitted
    #[clap(long, requires = "spawn_y", allow_hyphen_values = true)]
    pub spawn_x: Option<f64>,

    #[clap(long, requires = "spawn_x", allow_hyphen_values = true)]
    pub spawn_y: Option<f64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1".to_string(),
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            name: "player".to_string(),
            tick_rate: 60,
            fire_every: 0,
            block_every: 0,
            idle: false,
            spawn_x: None,
            spawn_y: None,
        }
    }
}

impl ClientConfig {
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.server, self.tcp_port)
    }

    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.server, self.udp_port)
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
