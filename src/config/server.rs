use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::schema::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// How long a statement waits for a lock held by another connection,
    /// including a peer instance reconciling the same database.
    pub busy_timeout: Duration,
    /// Rows updated per transaction when backfilling a new column.
    pub backfill_batch_size: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address '{}': {e}", self.host)))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("waterworks.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10000,
            data_dir: PathBuf::from("./data"),
            busy_timeout: Duration::from_secs(5),
            backfill_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}
