// wibutler-api: Async Rust client for the wibutler hub (REST + push stream)

pub mod devices;
pub mod endpoint;
pub mod error;
pub mod session;
pub mod transport;
pub mod websocket;

pub use devices::{CommandType, Component, ComponentCommand, Device, Output};
pub use endpoint::{DEFAULT_PORT, Endpoint};
pub use error::Error;
pub use session::{Credentials, HubSession};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{
    DeltaSink, DeviceDelta, RealtimeChannel, ReconnectConfig, StreamState, parse_frame,
};
