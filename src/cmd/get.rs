use bytes::Bytes;
use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::db::Db;
use crate::metrics::{REQUEST_CMD_COUNTER, REQUEST_CMD_ERROR_COUNTER};

/// Retrieve the value of one or more keys.
///
/// Missing keys are silently omitted from the response rather than treated
/// as an error; a store failure aborts the whole reply instead of writing a
/// partial one.
#[derive(Debug)]
pub struct Get {
    keys: Vec<Bytes>,
}

impl Get {
    pub fn new(keys: Vec<Bytes>) -> Get {
        Get { keys }
    }

    /// Applies the command against `db`, writing the response to `dst`.
    #[instrument(skip(self, db, dst))]
    pub(crate) async fn apply(&self, db: &Db, dst: &mut Connection) -> std::io::Result<()> {
        REQUEST_CMD_COUNTER.with_label_values(&["get"]).inc();

        let result = match db.multi_get(&self.keys).await {
            Ok(entries) => {
                debug!(found = entries.len(), "get");
                for entry in &entries {
                    let key = String::from_utf8_lossy(&entry.key);
                    dst.write_line(&format!("VALUE {} {} {}\r\n", key, entry.flags, entry.bytes))
                        .await?;
                    dst.write_raw(&entry.data_block).await?;
                    dst.write_line("\r\n").await?;
                }
                dst.write_line("END\r\n").await
            }
            Err(err) => {
                tracing::error!(%err, "get: storage failure");
                REQUEST_CMD_ERROR_COUNTER.with_label_values(&["get"]).inc();
                dst.write_line("SERVER_ERROR error retrieving stored data\r\n").await
            }
        };
        dst.flush().await?;
        result
    }
}
