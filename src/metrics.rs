//! Process-wide Prometheus counters: connection volume and per-command
//! request/error totals. No HTTP scrape endpoint is exposed here; these
//! counters are registered for in-process observability only.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge};

lazy_static! {
    pub static ref CURRENT_CONNECTION_COUNTER: IntGauge =
        register_int_gauge!("linecache_current_connections", "Current connection counter")
            .unwrap();
    pub static ref TOTAL_CONNECTION_PROCESSED: IntCounter = register_int_counter!(
        "linecache_total_connections_processed_total",
        "Total connections accepted since startup"
    )
    .unwrap();
    pub static ref REQUEST_CMD_COUNTER: IntCounterVec = register_int_counter_vec!(
        "linecache_command_requests_total",
        "Requests received per command",
        &["cmd"]
    )
    .unwrap();
    pub static ref REQUEST_CMD_ERROR_COUNTER: IntCounterVec = register_int_counter_vec!(
        "linecache_command_errors_total",
        "Client/server errors emitted per command",
        &["cmd"]
    )
    .unwrap();
}
