// ── Temperature zones ──
//
// Zones report a record (`temp`, `asked`, `time`, `calendar`, `status`)
// instead of a scalar. Time travels as a quarter-hour count; 254 means
// "until further notice" and anything outside 1..=253 means the zone
// follows its calendar.

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value, json};

use dobiss_api::{ActionRequest, TempCalendar, coerce_f64, coerce_i64};

use super::entity::Entity;
use crate::error::CoreError;

/// Timer sentinel: the zone follows its calendar.
pub const CALENDAR_MINUTES: i32 = -30;
/// Timer sentinel: manual setpoint with no end time.
pub const INDEFINITE_MINUTES: i32 = -15;
pub const DEFAULT_MANUAL_MINUTES: i32 = 60;

const QUARTER: i32 = 15;
const MAX_QUARTERS: i32 = 253;
const INDEFINITE_QUARTERS: i64 = 254;

/// Setpoint used for manual mode when the zone never reported anything.
pub const FALLBACK_SETPOINT: f64 = 20.0;

/// Temperature action codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempAction {
    Manual,
    SelectCalendar,
    ResetToCalendar,
}

impl TempAction {
    pub fn code(self) -> u8 {
        match self {
            Self::Manual => 1,
            Self::SelectCalendar => 2,
            Self::ResetToCalendar => 3,
        }
    }
}

/// Schedule state of one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureState {
    pub asked_temperature: Option<f64>,
    pub calendar: Option<i64>,
    /// Minutes left on a manual override, or one of the sentinels.
    pub timer_minutes: Option<i32>,
    pub default_manual_minutes: i32,
}

impl Default for TemperatureState {
    fn default() -> Self {
        Self {
            asked_temperature: None,
            calendar: None,
            timer_minutes: None,
            default_manual_minutes: DEFAULT_MANUAL_MINUTES,
        }
    }
}

impl TemperatureState {
    /// A copy of `self` refreshed from a status record. The local default
    /// manual duration is kept.
    pub fn with_record(&self, record: &Map<String, Value>) -> Self {
        Self {
            asked_temperature: record.get("asked").and_then(coerce_f64),
            calendar: record.get("calendar").and_then(coerce_i64),
            timer_minutes: record.get("time").and_then(coerce_i64).map(decode_time),
            default_manual_minutes: self.default_manual_minutes,
        }
    }

    pub fn is_calendar_controlled(&self) -> bool {
        self.timer_minutes.is_none_or(|m| m == CALENDAR_MINUTES)
    }
}

/// Quarter-hour count from the gateway to minutes (or a sentinel).
pub fn decode_time(quarters: i64) -> i32 {
    match quarters {
        INDEFINITE_QUARTERS => INDEFINITE_MINUTES,
        1..=253 => i32::try_from(quarters).map_or(CALENDAR_MINUTES, |q| q * QUARTER),
        _ => CALENDAR_MINUTES,
    }
}

/// Build the action for "hold `temperature` for `minutes`".
///
/// `CALENDAR_MINUTES` hands the zone back to its calendar and
/// `INDEFINITE_MINUTES` holds forever. Positive durations round up to whole
/// quarter hours, clamped to 1..=253 quarters.
pub fn timer_request(
    address: u32,
    channel: u32,
    temperature: f64,
    minutes: i32,
) -> Result<ActionRequest, CoreError> {
    if minutes == CALENDAR_MINUTES {
        return Ok(ActionRequest::new(address, channel, TempAction::ResetToCalendar.code()));
    }

    if !temperature.is_finite() {
        return Err(CoreError::Validation {
            message: format!("temperature {temperature} is not a number"),
        });
    }

    let quarters = match minutes {
        INDEFINITE_MINUTES => INDEFINITE_QUARTERS,
        m if m > 0 => i64::from(((m + QUARTER - 1) / QUARTER).clamp(1, MAX_QUARTERS)),
        other => {
            return Err(CoreError::Validation {
                message: format!(
                    "timer of {other} minutes is invalid (use a positive duration, \
                     {INDEFINITE_MINUTES} for indefinite or {CALENDAR_MINUTES} for calendar)"
                ),
            });
        }
    };

    let mut request = ActionRequest::new(address, channel, TempAction::Manual.code());
    request.option1 = Some(json!(temperature));
    request.option2 = Some(quarters);
    Ok(request)
}

/// Build the action selecting a calendar for a zone.
pub fn calendar_request(address: u32, channel: u32, calendar: &TempCalendar) -> ActionRequest {
    let mut request = ActionRequest::new(address, channel, TempAction::SelectCalendar.code());
    request.option1 = Some(json!(calendar.id));
    request
}

/// Find a calendar by name (case-insensitive).
pub fn find_calendar<'a>(
    calendars: &'a [TempCalendar],
    name: &str,
) -> Result<&'a TempCalendar, CoreError> {
    calendars
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| CoreError::not_found(format!("calendar {name:?}")))
}

fn validate_duration(minutes: i32) -> Result<(), CoreError> {
    if minutes == INDEFINITE_MINUTES || (1..=MAX_QUARTERS * QUARTER).contains(&minutes) {
        Ok(())
    } else {
        Err(CoreError::Validation {
            message: format!("manual duration of {minutes} minutes is out of range"),
        })
    }
}

// ── Capability ───────────────────────────────────────────────────────

/// Operations available on temperature zones.
pub trait TemperatureControllable: Sync {
    /// Hold `temperature` for `minutes` (or one of the timer sentinels).
    fn set_temp_timer(
        &self,
        temperature: f64,
        minutes: i32,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Manual setpoint for the zone's default manual duration.
    fn set_temperature(&self, temperature: f64) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Switch the zone to a calendar.
    fn set_preset(&self, calendar: &TempCalendar) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Manual mode on (current setpoint, default duration) or off (calendar).
    fn set_manual_mode(&self, enabled: bool) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn reset_to_calendar(&self) -> impl Future<Output = Result<(), CoreError>> + Send {
        self.set_temp_timer(FALLBACK_SETPOINT, CALENDAR_MINUTES)
    }

    fn set_default_manual_duration(&self, minutes: i32) -> Result<(), CoreError>;
}

/// Borrowed view of an entity known to be a temperature zone.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureZone<'a> {
    entity: &'a Entity,
}

impl<'a> TemperatureZone<'a> {
    pub(crate) fn new(entity: &'a Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// Temperature used when manual mode is switched on.
    pub fn manual_setpoint(&self) -> f64 {
        let state = self.entity.temperature().unwrap_or_default();
        state
            .asked_temperature
            .or_else(|| self.entity.value())
            .unwrap_or(FALLBACK_SETPOINT)
    }

    pub fn default_manual_minutes(&self) -> i32 {
        self.entity
            .temperature()
            .map_or(DEFAULT_MANUAL_MINUTES, |t| t.default_manual_minutes)
    }
}

impl TemperatureControllable for TemperatureZone<'_> {
    async fn set_temp_timer(&self, temperature: f64, minutes: i32) -> Result<(), CoreError> {
        let request = timer_request(
            self.entity.address(),
            self.entity.channel(),
            temperature,
            minutes,
        )?;
        tracing::debug!(object_id = %self.entity.object_id(), temperature, minutes, "temperature timer");
        self.entity.client().action(&request).await?;
        Ok(())
    }

    async fn set_temperature(&self, temperature: f64) -> Result<(), CoreError> {
        self.set_temp_timer(temperature, self.default_manual_minutes())
            .await
    }

    async fn set_preset(&self, calendar: &TempCalendar) -> Result<(), CoreError> {
        let request = calendar_request(self.entity.address(), self.entity.channel(), calendar);
        tracing::debug!(object_id = %self.entity.object_id(), calendar = %calendar.name, "select calendar");
        self.entity.client().action(&request).await?;
        Ok(())
    }

    async fn set_manual_mode(&self, enabled: bool) -> Result<(), CoreError> {
        if enabled {
            self.set_temp_timer(self.manual_setpoint(), self.default_manual_minutes())
                .await
        } else {
            self.reset_to_calendar().await
        }
    }

    fn set_default_manual_duration(&self, minutes: i32) -> Result<(), CoreError> {
        validate_duration(minutes)?;
        self.entity.set_default_manual_minutes(minutes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn calendar_sentinel_resets_without_time() {
        let req = timer_request(204, 1, 21.0, CALENDAR_MINUTES).unwrap();
        assert_eq!(req.action, 3);
        assert_eq!(req.option1, None);
        assert_eq!(req.option2, None);
    }

    #[test]
    fn indefinite_sentinel_sends_254() {
        let req = timer_request(204, 1, 21.5, INDEFINITE_MINUTES).unwrap();
        assert_eq!(req.action, 1);
        assert_eq!(req.option1, Some(json!(21.5)));
        assert_eq!(req.option2, Some(254));
    }

    #[test]
    fn durations_round_up_to_quarters() {
        assert_eq!(timer_request(204, 1, 20.0, 45).unwrap().option2, Some(3));
        assert_eq!(timer_request(204, 1, 20.0, 46).unwrap().option2, Some(4));
        assert_eq!(timer_request(204, 1, 20.0, 1).unwrap().option2, Some(1));
        assert_eq!(timer_request(204, 1, 20.0, 100_000).unwrap().option2, Some(253));
    }

    #[test]
    fn invalid_timers_are_rejected() {
        assert!(matches!(
            timer_request(204, 1, 20.0, 0),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            timer_request(204, 1, f64::NAN, 30),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn time_decoding() {
        assert_eq!(decode_time(254), INDEFINITE_MINUTES);
        assert_eq!(decode_time(4), 60);
        assert_eq!(decode_time(0), CALENDAR_MINUTES);
        assert_eq!(decode_time(300), CALENDAR_MINUTES);
    }

    #[test]
    fn record_refresh_keeps_local_default() {
        let state = TemperatureState {
            default_manual_minutes: 90,
            ..TemperatureState::default()
        };
        let record = json!({"temp": 19.5, "asked": "21", "time": 8, "calendar": 2});
        let next = state.with_record(record.as_object().unwrap());
        assert_eq!(next.asked_temperature, Some(21.0));
        assert_eq!(next.timer_minutes, Some(120));
        assert_eq!(next.calendar, Some(2));
        assert_eq!(next.default_manual_minutes, 90);
        assert!(!next.is_calendar_controlled());
    }

    #[test]
    fn calendar_lookup() {
        let calendars = vec![
            TempCalendar { id: 1, name: "Winter".into() },
            TempCalendar { id: 2, name: "Holiday".into() },
        ];
        assert_eq!(find_calendar(&calendars, "holiday").unwrap().id, 2);
        assert!(matches!(
            find_calendar(&calendars, "Summer"),
            Err(CoreError::NotFound { .. })
        ));
        let req = calendar_request(204, 0, &calendars[0]);
        assert_eq!(req.action, 2);
        assert_eq!(req.option1, Some(json!(1)));
    }

    #[test]
    fn duration_bounds() {
        assert!(validate_duration(INDEFINITE_MINUTES).is_ok());
        assert!(validate_duration(60).is_ok());
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(CALENDAR_MINUTES).is_err());
    }
}
