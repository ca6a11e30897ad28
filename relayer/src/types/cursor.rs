use bytes::Bytes;

use crate::core::client::storage::StorageClient;
use crate::error::JobError;

const CURSOR_KEY_PREFIX: &str = "lastDownloadedUpdateKey";
const JOB_NAME_PREFIX: &str = "downloadUpdate";

/// Identifies one progress cursor: a network, optionally narrowed to a light client instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CursorKey {
    pub network: String,
    pub light_client: Option<String>,
}

impl CursorKey {
    pub fn new(network: impl Into<String>, light_client: Option<String>) -> Self {
        Self { network: network.into(), light_client }
    }

    /// Store key of the cursor, e.g. `lastDownloadedUpdateKey:mainnet:lc1`.
    pub fn storage_key(&self) -> String {
        match &self.light_client {
            Some(lc) => format!("{CURSOR_KEY_PREFIX}:{}:{lc}", self.network),
            None => format!("{CURSOR_KEY_PREFIX}:{}", self.network),
        }
    }

    /// Deterministic name of the recurring update job, e.g. `downloadUpdatemainnetlc1`.
    pub fn job_name(&self) -> String {
        format!("{JOB_NAME_PREFIX}{}{}", self.network, self.light_client.as_deref().unwrap_or_default())
    }
}

pub fn encode_slot(slot: u64) -> Bytes {
    Bytes::from(slot.to_string())
}

/// Reads the slot stored under `key`, `None` when the cursor was never initialized.
pub async fn read_cursor(storage: &dyn StorageClient, key: &str) -> Result<Option<u64>, JobError> {
    let Some(raw) = storage.get_data(key).await? else {
        return Ok(None);
    };
    let text = String::from_utf8_lossy(&raw);
    text.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| JobError::InvalidCursor { key: key.to_string(), value: text.into_owned() })
}

/// Moves the cursor to `slot` unless it already points further. Returns the stored slot.
pub async fn advance_cursor(storage: &dyn StorageClient, key: &str, slot: u64) -> Result<u64, JobError> {
    let current = read_cursor(storage, key).await?;
    match current {
        Some(current) if current >= slot => Ok(current),
        _ => {
            storage.put_data(encode_slot(slot), key).await?;
            Ok(slot)
        }
    }
}
