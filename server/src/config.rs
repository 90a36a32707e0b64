//! Command line configuration for the server binary.

use clap::Parser;
use shared::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT, TICK_RATE};
use std::time::Duration;

/// Authoritative arena server
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port for reliable (TCP) packets, 0 picks a free port
    #[clap(long, default_value_t = DEFAULT_TCP_PORT)]
    pub tcp_port: u16,

    /// Port for position (UDP) frames, 0 picks a free port
    #[clap(long, default_value_t = DEFAULT_UDP_PORT)]
    pub udp_port: u16,

    /// Simulation ticks per second
    #[clap(short, long, default_value_t = TICK_RATE)]
    pub tick_rate: u32,

    /// Maximum number of concurrent clients
    #[clap(short, long, default_value = "32")]
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            tick_rate: TICK_RATE,
            max_clients: 32,
        }
    }
}

impl ServerConfig {
    /// Localhost with OS-assigned ports.
    pub fn ephemeral() -> Self {
        Self {
            tcp_port: 0,
            udp_port: 0,
            ..Self::default()
        }
    }

    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }

    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.host, self.udp_port)
    }

    /// Interval between ticks. A zero tick rate is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
