pub mod monitor;
pub mod novelty;

pub use monitor::{Monitor, MonitorSettings};
