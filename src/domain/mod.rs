pub mod post;
pub mod state;

pub use post::{fingerprint, Post, PostStats};
pub use state::MonitorState;
