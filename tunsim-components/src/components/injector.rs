//! Weather and incident injector
//!
//! Turns the scripted incident and weather windows of a scenario into the modifiers that the
//! other components consume. Windows are half-open, `[t_start, t_end)`, and are evaluated at the
//! start of each step.
//!
//! Overlapping windows combine as follows:
//!
//! - incident severities add up per segment
//! - weather severities combine by their maximum
//! - capacity multipliers multiply and are floored at `min_capacity_factor`
//! - the speed limit is the minimum of the base limit and every active override

use crate::parameters::InjectorParameters;
use log::debug;
use serde::{Deserialize, Serialize};
use tunsim_core::component::{
    Component, GridType, InputState, OutputState, RequirementDefinition, StateValue,
};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::standard_variables::{
    VAR_CAPACITY_FACTOR, VAR_INCIDENT_ACTIVE, VAR_INCIDENT_OFFSET, VAR_INCIDENT_ONSET,
    VAR_INCIDENT_SEVERITY, VAR_INCIDENT_TYPE, VAR_SPEED_LIMIT, VAR_WEATHER_ACTIVE,
    VAR_WEATHER_SEVERITY, VAR_WEATHER_TYPE,
};
use tunsim_core::timeseries::{FloatValue, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    Collision,
    StalledVehicle,
    WrongWayDriver,
    VehicleFire,
    Flooding,
}

impl IncidentType {
    /// Numeric code reported in frames, 0 is reserved for no incident
    pub fn code(self) -> u8 {
        match self {
            IncidentType::Collision => 1,
            IncidentType::StalledVehicle => 2,
            IncidentType::WrongWayDriver => 3,
            IncidentType::VehicleFire => 4,
            IncidentType::Flooding => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    #[default]
    Clear,
    Rain,
    Fog,
    Snow,
}

impl WeatherType {
    pub fn code(self) -> u8 {
        match self {
            WeatherType::Clear => 0,
            WeatherType::Rain => 1,
            WeatherType::Fog => 2,
            WeatherType::Snow => 3,
        }
    }
}

fn check_window(
    field: &str,
    t_start: Time,
    t_end: Time,
    severity: FloatValue,
    speed_limit: Option<FloatValue>,
) -> TwinResult<()> {
    if !(t_start.is_finite() && t_end.is_finite()) {
        return Err(TwinError::configuration(
            format!("{}.t_start", field),
            "window bounds must be finite",
        ));
    }
    if t_end <= t_start {
        return Err(TwinError::configuration(
            format!("{}.t_end", field),
            format!("must be after t_start ({}), got {}", t_start, t_end),
        ));
    }
    if !(0.0..=1.0).contains(&severity) {
        return Err(TwinError::configuration(
            format!("{}.severity", field),
            format!("must be within [0, 1], got {}", severity),
        ));
    }
    if let Some(limit) = speed_limit {
        if !(limit.is_finite() && limit > 0.0) {
            return Err(TwinError::configuration(
                format!("{}.speed_limit", field),
                format!("must be positive, got {}", limit),
            ));
        }
    }
    Ok(())
}

/// A scripted incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentWindow {
    pub kind: IncidentType,
    pub t_start: Time,
    pub t_end: Time,
    pub severity: FloatValue,
    /// Zero-based index of the affected segment, every segment if unset
    #[serde(default)]
    pub segment: Option<usize>,
    /// Capacity lost before scaling by severity, the injector default if unset
    #[serde(default)]
    pub capacity_drop: Option<FloatValue>,
    #[serde(default)]
    pub speed_limit: Option<FloatValue>,
}

impl IncidentWindow {
    pub fn is_active(&self, t: Time) -> bool {
        self.t_start <= t && t < self.t_end
    }

    pub fn affects(&self, segment: usize) -> bool {
        self.segment.map_or(true, |s| s == segment)
    }

    /// Check the window against a tunnel with `n_segments` segments
    ///
    /// `index` is the position of the window in the scenario and is used to name the field
    /// in errors.
    pub fn validate(&self, index: usize, n_segments: usize) -> TwinResult<()> {
        let field = format!("incidents[{}]", index);
        check_window(
            &field,
            self.t_start,
            self.t_end,
            self.severity,
            self.speed_limit,
        )?;
        if let Some(segment) = self.segment {
            if segment >= n_segments {
                return Err(TwinError::configuration(
                    format!("{}.segment", field),
                    format!(
                        "tunnel has {} segments, got segment {}",
                        n_segments, segment
                    ),
                ));
            }
        }
        if let Some(drop) = self.capacity_drop {
            if !(0.0..=1.0).contains(&drop) {
                return Err(TwinError::configuration(
                    format!("{}.capacity_drop", field),
                    format!("must be within [0, 1], got {}", drop),
                ));
            }
        }
        Ok(())
    }
}

/// A scripted weather period affecting the whole tunnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherWindow {
    pub kind: WeatherType,
    pub t_start: Time,
    pub t_end: Time,
    pub severity: FloatValue,
    #[serde(default)]
    pub speed_limit: Option<FloatValue>,
}

impl WeatherWindow {
    pub fn is_active(&self, t: Time) -> bool {
        self.t_start <= t && t < self.t_end
    }

    pub fn validate(&self, index: usize) -> TwinResult<()> {
        check_window(
            &format!("weather[{}]", index),
            self.t_start,
            self.t_end,
            self.severity,
            self.speed_limit,
        )
    }
}

/// Combined effect of the active windows at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct Modifiers {
    pub speed_limit: FloatValue,
    pub capacity_factor: Vec<FloatValue>,
    pub incident_severity: Vec<FloatValue>,
    pub incident_active: bool,
    /// An incident is active now but wasn't at the start of the previous step
    pub incident_onset: bool,
    /// No incident is active now but one was at the start of the previous step
    pub incident_offset: bool,
    /// Kind of the most severe active incident
    pub incident_type: Option<IncidentType>,
    pub weather_active: bool,
    pub weather_type: WeatherType,
    pub weather_severity: FloatValue,
}

/// Scenario-driven source of incidents and weather
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherIncidentInjector {
    parameters: InjectorParameters,
    n_segments: usize,
    incidents: Vec<IncidentWindow>,
    weather: Vec<WeatherWindow>,
}

impl WeatherIncidentInjector {
    /// Create an injector, rejecting malformed windows
    pub fn new(
        parameters: InjectorParameters,
        n_segments: usize,
        incidents: Vec<IncidentWindow>,
        weather: Vec<WeatherWindow>,
    ) -> TwinResult<Self> {
        parameters.validate()?;
        for (i, window) in incidents.iter().enumerate() {
            window.validate(i, n_segments)?;
        }
        for (i, window) in weather.iter().enumerate() {
            window.validate(i)?;
        }
        Ok(Self {
            parameters,
            n_segments,
            incidents,
            weather,
        })
    }

    pub fn parameters(&self) -> &InjectorParameters {
        &self.parameters
    }

    fn any_incident_active(&self, t: Time) -> bool {
        self.incidents.iter().any(|w| w.is_active(t))
    }

    /// Evaluate the windows at the start of a step of length `dt`
    pub fn modifiers_at(&self, t: Time, dt: Time) -> Modifiers {
        let p = &self.parameters;
        let active_incidents: Vec<&IncidentWindow> =
            self.incidents.iter().filter(|w| w.is_active(t)).collect();
        let active_weather: Vec<&WeatherWindow> =
            self.weather.iter().filter(|w| w.is_active(t)).collect();

        let incident_severity: Vec<FloatValue> = (0..self.n_segments)
            .map(|segment| {
                active_incidents
                    .iter()
                    .filter(|w| w.affects(segment))
                    .map(|w| w.severity)
                    .sum()
            })
            .collect();

        let dominant_weather = active_weather
            .iter()
            .copied()
            .reduce(|a, b| if b.severity > a.severity { b } else { a });
        let weather_severity = dominant_weather.map_or(0.0, |w| w.severity);
        let weather_active = dominant_weather.is_some();

        let capacity_factor = (0..self.n_segments)
            .map(|segment| {
                let incidents: FloatValue = active_incidents
                    .iter()
                    .filter(|w| w.affects(segment))
                    .map(|w| {
                        let drop = w.capacity_drop.unwrap_or(p.incident_capacity_drop);
                        1.0 - drop * (0.5 + 0.5 * w.severity)
                    })
                    .product();
                let weather = if weather_active {
                    p.weather_capacity_factor
                } else {
                    1.0
                };
                (incidents * weather).max(p.min_capacity_factor)
            })
            .collect();

        let incident_limits = active_incidents.iter().filter_map(|w| w.speed_limit);
        let weather_limits = active_weather.iter().map(|w| {
            w.speed_limit.unwrap_or_else(|| {
                (p.base_speed_limit - p.weather_speed_drop_kmh * w.severity)
                    .max(p.min_speed_limit_kmh)
            })
        });
        let speed_limit = incident_limits
            .chain(weather_limits)
            .fold(p.base_speed_limit, FloatValue::min);

        let incident_active = !active_incidents.is_empty();
        let was_active = self.any_incident_active(t - dt);

        Modifiers {
            speed_limit,
            capacity_factor,
            incident_severity,
            incident_active,
            incident_onset: incident_active && !was_active,
            incident_offset: !incident_active && was_active,
            incident_type: active_incidents
                .iter()
                .copied()
                .reduce(|a, b| if b.severity > a.severity { b } else { a })
                .map(|w| w.kind),
            weather_active,
            weather_type: dominant_weather.map_or(WeatherType::Clear, |w| w.kind),
            weather_severity,
        }
    }
}

fn flag(value: bool) -> StateValue {
    StateValue::Scalar(if value { 1.0 } else { 0.0 })
}

#[typetag::serde]
impl Component for WeatherIncidentInjector {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let grid = GridType::Segments(self.n_segments);
        vec![
            VAR_SPEED_LIMIT.output(GridType::Scalar),
            VAR_CAPACITY_FACTOR.output(grid),
            VAR_INCIDENT_SEVERITY.output(grid),
            VAR_INCIDENT_ACTIVE.output(GridType::Scalar),
            VAR_INCIDENT_ONSET.output(GridType::Scalar),
            VAR_INCIDENT_OFFSET.output(GridType::Scalar),
            VAR_INCIDENT_TYPE.output(GridType::Scalar),
            VAR_WEATHER_ACTIVE.output(GridType::Scalar),
            VAR_WEATHER_TYPE.output(GridType::Scalar),
            VAR_WEATHER_SEVERITY.output(GridType::Scalar),
        ]
    }

    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        _input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let m = self.modifiers_at(t_current, t_next - t_current);
        if m.incident_onset {
            debug!("Incident onset at t = {} s", t_current);
        }
        if m.incident_offset {
            debug!("Incident cleared at t = {} s", t_current);
        }
        let incident_type = m.incident_type.map_or(0, IncidentType::code);

        Ok(OutputState::from([
            (
                VAR_SPEED_LIMIT.name.to_string(),
                StateValue::Scalar(m.speed_limit),
            ),
            (
                VAR_CAPACITY_FACTOR.name.to_string(),
                StateValue::Segments(m.capacity_factor),
            ),
            (
                VAR_INCIDENT_SEVERITY.name.to_string(),
                StateValue::Segments(m.incident_severity),
            ),
            (VAR_INCIDENT_ACTIVE.name.to_string(), flag(m.incident_active)),
            (VAR_INCIDENT_ONSET.name.to_string(), flag(m.incident_onset)),
            (VAR_INCIDENT_OFFSET.name.to_string(), flag(m.incident_offset)),
            (
                VAR_INCIDENT_TYPE.name.to_string(),
                StateValue::Scalar(incident_type as FloatValue),
            ),
            (VAR_WEATHER_ACTIVE.name.to_string(), flag(m.weather_active)),
            (
                VAR_WEATHER_TYPE.name.to_string(),
                StateValue::Scalar(m.weather_type.code() as FloatValue),
            ),
            (
                VAR_WEATHER_SEVERITY.name.to_string(),
                StateValue::Scalar(m.weather_severity),
            ),
        ]))
    }

    fn check_invariants(
        &self,
        tick: usize,
        _previous: &InputState,
        current: &InputState,
    ) -> TwinResult<()> {
        let factors = current.segments(VAR_CAPACITY_FACTOR.name, self.n_segments)?;
        let bounds = self.parameters.min_capacity_factor..=1.0;
        if let Some(i) = factors.iter().position(|f| !bounds.contains(f)) {
            return Err(TwinError::InvariantViolation {
                tick,
                variable: VAR_CAPACITY_FACTOR.name.to_string(),
                segment: Some(i),
                value: factors[i],
            });
        }
        Ok(())
    }
}
