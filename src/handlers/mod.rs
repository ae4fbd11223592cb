//! 핸들러 모듈

pub mod cleanup;
pub mod connection;
pub mod ice;
pub mod matching;
pub mod room;
pub mod signaling;
pub mod stats;

pub use cleanup::*;
pub use connection::*;
pub use ice::*;
pub use matching::*;
pub use room::*;
pub use signaling::*;
pub use stats::*;
