// ── Entity kinds ──
//
// Gateway subjects carry two numeric codes: an icon id chosen by the
// installer and a module type fixed by the hardware. Together they decide
// what a subject is.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use dobiss_api::Subject;

/// Installer-chosen icon ids.
pub mod icons {
    pub const LIGHT: i64 = 0;
    pub const PLUG: i64 = 1;
    pub const VENTILATION: i64 = 2;
    pub const UP: i64 = 3;
    pub const DOWN: i64 = 4;
    pub const HEATING: i64 = 5;
    pub const TABLE_LIGHT: i64 = 6;
    pub const DOOR: i64 = 7;
    pub const GARAGE: i64 = 8;
    pub const GATE: i64 = 9;
    pub const RED: i64 = 10;
    pub const GREEN: i64 = 11;
    pub const BLUE: i64 = 12;
    pub const WHITE: i64 = 13;
    pub const INPUT_STATUS: i64 = 100;
    pub const LIGHT_SENSOR: i64 = 101;
    pub const SCENARIO: i64 = 201;
    pub const AUTOMATION: i64 = 202;
    pub const CONDITION: i64 = 203;
    pub const TEMPERATURE: i64 = 204;
    pub const AUDIO: i64 = 205;
    pub const FLAG: i64 = 206;
}

/// Hardware module type codes.
pub mod module_type {
    pub const NXT: i64 = 0;
    pub const INPUT: i64 = 1;
    pub const RELAY: i64 = 8;
    pub const ANALOG: i64 = 24;
    pub const SCENARIO: i64 = 201;
    pub const AUTOMATION: i64 = 202;
    pub const TEMPERATURE: i64 = 204;
    pub const FLAG: i64 = 206;
}

/// Name of the aggregate temperature subject that is not a real zone.
pub const ALL_ZONES: &str = "All zones";

/// What an entity is, and therefore which capabilities it offers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EntityKind {
    Light,
    AnalogOutput,
    Switch,
    Scenario,
    Automation,
    Flag,
    BinarySensor,
    LightSensor,
    TemperatureZone,
}

impl EntityKind {
    /// Kinds that accept on/off actions.
    pub fn is_actionable(self) -> bool {
        matches!(
            self,
            Self::Light
                | Self::AnalogOutput
                | Self::Switch
                | Self::Scenario
                | Self::Automation
                | Self::Flag
        )
    }

    /// Kinds that only report state.
    pub fn is_sensor(self) -> bool {
        matches!(self, Self::BinarySensor | Self::LightSensor)
    }
}

/// Map a discovered subject to its kind. `None` means "not exposed".
pub fn classify(subject: &Subject) -> Option<EntityKind> {
    if matches!(subject.icons_id, icons::LIGHT | icons::TABLE_LIGHT) {
        return Some(EntityKind::Light);
    }

    match subject.module_type {
        module_type::ANALOG => Some(EntityKind::AnalogOutput),
        module_type::RELAY => Some(EntityKind::Switch),
        module_type::INPUT => Some(EntityKind::BinarySensor),
        module_type::FLAG => Some(EntityKind::Flag),
        module_type::SCENARIO => Some(EntityKind::Scenario),
        module_type::AUTOMATION => Some(EntityKind::Automation),
        module_type::TEMPERATURE if subject.name != ALL_ZONES => Some(EntityKind::TemperatureZone),
        module_type::NXT => match subject.icons_id {
            icons::LIGHT_SENSOR => Some(EntityKind::LightSensor),
            icons::INPUT_STATUS => Some(EntityKind::BinarySensor),
            icons::UP | icons::DOWN | icons::DOOR | icons::GARAGE | icons::GATE => {
                Some(EntityKind::Switch)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Material Design icon for an icon id.
pub fn icon_name(icons_id: i64) -> Option<&'static str> {
    Some(match icons_id {
        icons::LIGHT => "mdi:lightbulb",
        icons::PLUG => "mdi:power-plug",
        icons::VENTILATION => "mdi:hvac",
        icons::UP => "mdi:arrow-up",
        icons::DOWN => "mdi:arrow-down",
        icons::HEATING => "mdi:radiator",
        icons::TABLE_LIGHT => "mdi:lamp",
        icons::DOOR => "mdi:door",
        icons::GARAGE => "mdi:garage",
        icons::GATE => "mdi:gate",
        icons::RED => "mdi:exclamation",
        icons::GREEN => "mdi:thumb-up",
        icons::BLUE => "mdi:help",
        icons::WHITE => "mdi:alpha-n",
        icons::INPUT_STATUS => "mdi:list-status",
        icons::LIGHT_SENSOR => "mdi:theme-light-dark",
        icons::SCENARIO => "mdi:movie-open",
        icons::AUTOMATION => "mdi:home-automation",
        icons::CONDITION => "mdi:account-question",
        icons::TEMPERATURE => "mdi:thermometer",
        icons::AUDIO => "mdi:cast-audio",
        icons::FLAG => "mdi:flag",
        _ => return None,
    })
}
