use std::time::Duration;

use clap::Parser;

/// Guidance server for remote robots searching the target grid.
#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub(crate) struct Config {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 2222)]
    pub(crate) port: u16,

    /// Key mixed into the server's side of the handshake.
    #[arg(long, default_value_t = 54621)]
    pub(crate) server_key: u16,

    /// Key the client mixes into its confirmation code.
    #[arg(long, default_value_t = 45328)]
    pub(crate) client_key: u16,

    /// How long to wait for client input, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub(crate) read_timeout_ms: u64,

    /// How long to wait for a charging client, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub(crate) recharge_timeout_ms: u64,

    /// Idle time after which the listener shuts down, in milliseconds.
    #[arg(long, default_value_t = 15000)]
    pub(crate) accept_timeout_ms: u64,
}

impl Config {
    pub(crate) fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub(crate) fn recharge_timeout(&self) -> Duration {
        Duration::from_millis(self.recharge_timeout_ms)
    }

    pub(crate) fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}
