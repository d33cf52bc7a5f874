use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::RelayError;

pub const DEFAULT_PORT: u16 = 9005;
pub const DEFAULT_ROOM_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

/// Keep-alive timing applied to every socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// How often the server sends a WebSocket ping.
    pub ping_interval: Duration,

    /// A socket that sends nothing for this long, pongs included, is closed.
    pub ping_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }
}

/// Runtime settings for the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub listen_addr: SocketAddr,

    /// Empty rooms older than this are removed by the sweep.
    pub room_max_age: Duration,

    /// How often the sweep runs.
    pub sweep_interval: Duration,

    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            room_max_age: DEFAULT_ROOM_MAX_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
        }
    }
}

impl RelayConfig {
    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            ping_interval: self.ping_interval,
            ping_timeout: self.ping_timeout,
        }
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.sweep_interval.is_zero() {
            return Err(RelayError::InvalidConfig(
                "sweep interval must be greater than zero".into(),
            ));
        }
        if self.ping_interval.is_zero() {
            return Err(RelayError::InvalidConfig(
                "ping interval must be greater than zero".into(),
            ));
        }
        // A live client must see at least one ping before it can time out.
        if self.ping_timeout <= self.ping_interval {
            return Err(RelayError::InvalidConfig(format!(
                "ping timeout ({:?}) must be longer than the ping interval ({:?})",
                self.ping_timeout, self.ping_interval
            )));
        }
        Ok(())
    }
}
