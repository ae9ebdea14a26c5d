use bytes::Bytes;
use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::db::Db;
use crate::metrics::{REQUEST_CMD_COUNTER, REQUEST_CMD_ERROR_COUNTER};

/// Remove one key, reporting whether a row actually existed.
#[derive(Debug)]
pub struct Delete {
    key: Bytes,
    noreply: bool,
}

impl Delete {
    pub fn new(key: Bytes, noreply: bool) -> Delete {
        Delete { key, noreply }
    }

    /// Applies the command against `db`, writing the response to `dst`
    /// unless `noreply` suppresses a successful write.
    #[instrument(skip(self, db, dst))]
    pub(crate) async fn apply(&self, db: &Db, dst: &mut Connection) -> std::io::Result<()> {
        REQUEST_CMD_COUNTER.with_label_values(&["delete"]).inc();

        let result = match db.delete(&self.key).await {
            Ok(rows_affected) => {
                debug!(rows_affected, "delete");
                if self.noreply {
                    Ok(())
                } else if rows_affected > 0 {
                    dst.write_line("DELETED\r\n").await
                } else {
                    dst.write_line("NOT FOUND\r\n").await
                }
            }
            Err(err) => {
                tracing::error!(%err, "delete: storage failure");
                REQUEST_CMD_ERROR_COUNTER.with_label_values(&["delete"]).inc();
                dst.write_line("SERVER_ERROR error deleting stored data\r\n").await
            }
        };
        dst.flush().await?;
        result
    }
}
