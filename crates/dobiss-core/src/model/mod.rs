// ── Domain model ──
//
// `Entity` carries identity, state and observers; kind-specific behavior
// is exposed through borrowed capability views.

pub mod entity;
pub mod kind;
pub mod output;
pub mod temperature;

pub use entity::{Entity, EntityMetadata, EntitySnapshot, ObjectId, ObserverId, locate_cell};
pub use kind::{EntityKind, classify, icon_name};
pub use output::{Actionable, Output, TurnOff, TurnOn};
pub use temperature::{
    CALENDAR_MINUTES, INDEFINITE_MINUTES, TemperatureControllable, TemperatureState,
    TemperatureZone,
};

/// Client pointed at an unroutable gateway, for tests that never hit the
/// network.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn test_client() -> dobiss_api::DobissClient {
    use std::sync::Arc;

    dobiss_api::DobissClient::new(
        url::Url::parse("http://127.0.0.1:9/api/local/").unwrap(),
        url::Url::parse("ws://127.0.0.1:9/sockets/api").unwrap(),
        Arc::new(dobiss_api::TokenProvider::new(
            secrecy::SecretString::from("test".to_string()),
            "dobiss-test",
        )),
        dobiss_api::TransportConfig::default(),
    )
}
