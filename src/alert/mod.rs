pub mod format;
pub mod fwalert;

pub use format::format_alert;
pub use fwalert::{AlertSink, FwalertSink, SinkError};
