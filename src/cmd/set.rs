use bytes::Bytes;
use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::db::Db;
use crate::metrics::{REQUEST_CMD_COUNTER, REQUEST_CMD_ERROR_COUNTER};

/// Store `key` together with an opaque, exactly-sized data block.
///
/// Parsing the header line and receiving the data block are two separate
/// steps driven by the connection state machine; by the time `apply` runs,
/// `payload` has already been validated to be exactly `bytes` long.
#[derive(Debug)]
pub struct Set {
    key: Bytes,
    flags: u16,
    bytes: usize,
    noreply: bool,
}

impl Set {
    pub fn new(key: Bytes, flags: u16, bytes: usize, noreply: bool) -> Set {
        Set { key, flags, bytes, noreply }
    }

    /// Applies the command against `db`, writing the response to `dst`
    /// unless `noreply` suppresses a successful write.
    #[instrument(skip(self, db, dst, payload))]
    pub(crate) async fn apply(
        &self,
        db: &Db,
        dst: &mut Connection,
        payload: &[u8],
    ) -> std::io::Result<()> {
        REQUEST_CMD_COUNTER.with_label_values(&["set"]).inc();

        let result = match db.upsert(&self.key, self.flags, self.bytes, payload).await {
            Ok(()) => {
                debug!("set: stored");
                if self.noreply {
                    Ok(())
                } else {
                    dst.write_line("STORED\r\n").await
                }
            }
            Err(err) => {
                tracing::error!(%err, "set: storage failure");
                REQUEST_CMD_ERROR_COUNTER.with_label_values(&["set"]).inc();
                dst.write_line("SERVER_ERROR error storing data\r\n").await
            }
        };
        dst.flush().await?;
        result
    }
}
