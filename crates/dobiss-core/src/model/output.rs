// ── Outputs ──
//
// Lights, analog outputs, relays, scenarios, automations and flags all
// take the same on/off action with an optional level and switching delays.

use std::future::Future;
use std::time::Duration;

use serde_json::json;

use dobiss_api::{ActionRequest, Delay};

use super::entity::Entity;
use crate::error::CoreError;

pub const ACTION_OFF: u8 = 0;
pub const ACTION_ON: u8 = 1;

/// Brightness sent to dimmable outputs when none is given.
pub const FULL_BRIGHTNESS: u8 = 100;

/// Parameters for switching an output on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOn {
    /// Level in percent for dimmable outputs; ignored otherwise.
    pub brightness: Option<u8>,
    pub delay_on: Option<Duration>,
    pub delay_off: Option<Duration>,
}

/// Parameters for switching an output off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOff {
    pub delay_on: Option<Duration>,
    pub delay_off: Option<Duration>,
}

/// Operations available on switchable outputs.
pub trait Actionable: Sync {
    fn is_on(&self) -> bool;

    fn turn_on(&self, params: TurnOn) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn turn_off(&self, params: TurnOff) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Off when on, on (full level) otherwise. Decided from the last
    /// observed value.
    fn toggle(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        async move {
            if self.is_on() {
                self.turn_off(TurnOff::default()).await
            } else {
                self.turn_on(TurnOn::default()).await
            }
        }
    }
}

/// Borrowed view of an entity known to be an output.
#[derive(Debug, Clone, Copy)]
pub struct Output<'a> {
    entity: &'a Entity,
}

impl<'a> Output<'a> {
    pub(crate) fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    pub fn on_request(&self, params: &TurnOn) -> ActionRequest {
        let level = if self.entity.dimmable() {
            params.brightness.unwrap_or(FULL_BRIGHTNESS).min(FULL_BRIGHTNESS)
        } else {
            1
        };
        let mut request =
            ActionRequest::new(self.entity.address(), self.entity.channel(), ACTION_ON);
        request.option1 = Some(json!(level));
        request.delayon = params.delay_on.map(|d| Delay::from_seconds(d.as_secs()));
        request.delayoff = params.delay_off.map(|d| Delay::from_seconds(d.as_secs()));
        request
    }

    pub fn off_request(&self, params: &TurnOff) -> ActionRequest {
        let mut request =
            ActionRequest::new(self.entity.address(), self.entity.channel(), ACTION_OFF);
        request.delayon = params.delay_on.map(|d| Delay::from_seconds(d.as_secs()));
        request.delayoff = params.delay_off.map(|d| Delay::from_seconds(d.as_secs()));
        request
    }
}

impl Actionable for Output<'_> {
    fn is_on(&self) -> bool {
        self.entity.is_on()
    }

    async fn turn_on(&self, params: TurnOn) -> Result<(), CoreError> {
        let request = self.on_request(&params);
        tracing::debug!(object_id = %self.entity.object_id(), option1 = ?request.option1, "turn on");
        self.entity.client().action(&request).await?;
        Ok(())
    }

    async fn turn_off(&self, params: TurnOff) -> Result<(), CoreError> {
        let request = self.off_request(&params);
        tracing::debug!(object_id = %self.entity.object_id(), "turn off");
        self.entity.client().action(&request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::entity::EntityMetadata;
    use crate::model::{EntityKind, test_client};

    fn output(dimmable: bool) -> Entity {
        Entity::new(
            65,
            2,
            EntityMetadata {
                name: "Kitchen".into(),
                group: "Ground floor".into(),
                kind: EntityKind::Light,
                dimmable,
                icons_id: 0,
                module_type: 24,
                attributes: BTreeMap::new(),
            },
            test_client(),
        )
    }

    #[test]
    fn non_dimmable_sends_one() {
        let e = output(false);
        let req = e.as_output().unwrap().on_request(&TurnOn {
            brightness: Some(30),
            ..TurnOn::default()
        });
        assert_eq!(req.action, ACTION_ON);
        assert_eq!(req.option1, Some(json!(1)));
    }

    #[test]
    fn dimmable_defaults_to_full_and_clamps() {
        let e = output(true);
        let view = e.as_output().unwrap();
        assert_eq!(view.on_request(&TurnOn::default()).option1, Some(json!(100)));
        let req = view.on_request(&TurnOn {
            brightness: Some(250),
            ..TurnOn::default()
        });
        assert_eq!(req.option1, Some(json!(100)));
    }

    #[test]
    fn off_carries_delays() {
        let e = output(true);
        let req = e.as_output().unwrap().off_request(&TurnOff {
            delay_on: None,
            delay_off: Some(Duration::from_secs(300)),
        });
        assert_eq!(req.action, ACTION_OFF);
        assert_eq!(req.option1, None);
        assert_eq!(
            serde_json::to_value(req.delayoff).unwrap(),
            json!({"value": 5, "unit": "min"})
        );
    }
}
