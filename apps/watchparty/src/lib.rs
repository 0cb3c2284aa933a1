pub mod client;
pub mod config;
pub mod playback;
pub mod status;
pub mod sync;
pub mod telemetry;
pub mod transport;
pub mod upload;

pub use watchparty_proto as proto;
