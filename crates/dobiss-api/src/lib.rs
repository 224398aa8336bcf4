// dobiss-api: async client for the Dobiss gateway local API (REST + status socket)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use auth::TokenProvider;
pub use client::DobissClient;
pub use error::Error;
pub use models::{
    ActionRequest, Delay, DelayUnit, DiscoveryResponse, GroupEntry, GroupInfo, StatusFilter,
    Subject, TempCalendar, coerce_f64, coerce_i64,
};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{SocketMessage, StatusSocket};
