//! Scenario definitions
//!
//! A [`Scenario`] is the complete recipe for a single run: the time axis, the traffic demand,
//! the initial state of every segment, the parameters of each component and the scripted
//! incident and weather windows. Scenarios are usually read from TOML:
//!
//! ```toml
//! id = "peak_incident"
//! duration_s = 400.0
//! dt_s = 1.0
//!
//! [demand]
//! base_veh_per_h = 1800.0
//! steps = [
//!     { t_start = 80.0, demand_veh_per_h = 3900.0 },
//!     { t_start = 170.0, demand_veh_per_h = 1500.0 },
//! ]
//!
//! [[segments]]
//! density = 22.5
//! speed = 80.0
//!
//! [[incidents]]
//! kind = "collision"
//! t_start = 100.0
//! t_end = 160.0
//! severity = 0.8
//! ```
//!
//! Parameter blocks (`[traffic]`, `[emission]`, `[visibility]`, `[fan_stage]` and `[injector]`)
//! are optional and any field left out takes its default.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tunsim_components::components::{
    FanStage, IncidentWindow, WeatherIncidentInjector, WeatherWindow,
};
use tunsim_components::parameters::{
    EmissionParameters, FanStageParameters, InjectorParameters, TrafficParameters,
    VisibilityParameters,
};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::timeseries::{FloatValue, Time, TimeAxis};

/// A fixed demand level from `t_start` onwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandStep {
    pub t_start: Time,
    pub demand_veh_per_h: FloatValue,
}

/// Arrivals at the entry portal over time
///
/// Demand follows `base + amplitude * sin(2 pi t / period)`, floored at zero, until the first
/// step starts. From then on the most recent step sets the demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandProfile {
    pub base_veh_per_h: FloatValue,
    pub peak_amplitude_veh_per_h: FloatValue,
    pub peak_period_s: Time,
    /// Overrides ordered by start time
    pub steps: Vec<DemandStep>,
}

impl Default for DemandProfile {
    fn default() -> Self {
        Self {
            base_veh_per_h: 2200.0,
            peak_amplitude_veh_per_h: 0.0,
            peak_period_s: 1800.0,
            steps: vec![],
        }
    }
}

impl DemandProfile {
    /// A demand that never changes
    pub fn constant(demand_veh_per_h: FloatValue) -> Self {
        Self {
            base_veh_per_h: demand_veh_per_h,
            ..Default::default()
        }
    }

    pub fn at(&self, t: Time) -> FloatValue {
        match self.steps.iter().rev().find(|step| step.t_start <= t) {
            Some(step) => step.demand_veh_per_h,
            None => {
                let wave = (2.0 * PI * t / self.peak_period_s).sin();
                (self.base_veh_per_h + self.peak_amplitude_veh_per_h * wave).max(0.0)
            }
        }
    }

    /// Demand at every point of the time axis as a single-column array
    pub fn sample(&self, time_axis: &TimeAxis) -> Array2<FloatValue> {
        let times = time_axis.values();
        Array2::from_shape_fn((times.len(), 1), |(i, _)| self.at(times[i]))
    }

    pub fn validate(&self) -> TwinResult<()> {
        if !(self.base_veh_per_h.is_finite() && self.base_veh_per_h >= 0.0) {
            return Err(TwinError::configuration(
                "demand.base_veh_per_h",
                format!("must be non-negative, got {}", self.base_veh_per_h),
            ));
        }
        if !self.peak_amplitude_veh_per_h.is_finite() {
            return Err(TwinError::configuration(
                "demand.peak_amplitude_veh_per_h",
                "must be finite",
            ));
        }
        if !(self.peak_period_s.is_finite() && self.peak_period_s > 0.0) {
            return Err(TwinError::configuration(
                "demand.peak_period_s",
                format!("must be positive, got {}", self.peak_period_s),
            ));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if !(step.demand_veh_per_h.is_finite() && step.demand_veh_per_h >= 0.0) {
                return Err(TwinError::configuration(
                    format!("demand.steps[{}].demand_veh_per_h", i),
                    format!("must be non-negative, got {}", step.demand_veh_per_h),
                ));
            }
        }
        if let Some(i) = self
            .steps
            .windows(2)
            .position(|pair| !(pair[1].t_start > pair[0].t_start))
        {
            return Err(TwinError::configuration(
                format!("demand.steps[{}].t_start", i + 1),
                "steps must be ordered by increasing start time",
            ));
        }
        Ok(())
    }
}

/// Initial state of a single segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// unit: veh / km
    pub density: FloatValue,
    /// unit: km / h
    pub speed: FloatValue,
    #[serde(default = "default_heavy_vehicle_ratio")]
    pub heavy_vehicle_ratio: FloatValue,
    /// unit: veh
    #[serde(default)]
    pub queue: FloatValue,
    /// Initial CO level in ppm
    ///
    /// Defaults to the level at which the initial traffic's emissions balance the removal
    /// of the initial fan stage.
    #[serde(default)]
    pub co: Option<FloatValue>,
    /// Defaults to the visibility baseline
    #[serde(default)]
    pub visibility: Option<FloatValue>,
}

fn default_heavy_vehicle_ratio() -> FloatValue {
    0.12
}

impl SegmentConfig {
    pub fn new(density: FloatValue, speed: FloatValue) -> Self {
        Self {
            density,
            speed,
            heavy_vehicle_ratio: default_heavy_vehicle_ratio(),
            queue: 0.0,
            co: None,
            visibility: None,
        }
    }
}

/// Complete description of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub duration_s: Time,
    pub dt_s: Time,
    #[serde(default)]
    pub demand: DemandProfile,
    /// Segments ordered from the entry portal
    pub segments: Vec<SegmentConfig>,
    #[serde(default = "default_fan_stage")]
    pub initial_fan_stage: FanStage,
    #[serde(default)]
    pub traffic: TrafficParameters,
    #[serde(default)]
    pub emission: EmissionParameters,
    #[serde(default)]
    pub visibility: VisibilityParameters,
    #[serde(default)]
    pub fan_stage: FanStageParameters,
    #[serde(default)]
    pub injector: InjectorParameters,
    #[serde(default)]
    pub incidents: Vec<IncidentWindow>,
    #[serde(default)]
    pub weather: Vec<WeatherWindow>,
}

fn default_fan_stage() -> FanStage {
    FanStage::Off
}

impl Scenario {
    /// A scenario with default parameters and no windows
    pub fn new(
        id: &str,
        duration_s: Time,
        dt_s: Time,
        demand: DemandProfile,
        segments: Vec<SegmentConfig>,
    ) -> Self {
        Self {
            id: id.to_string(),
            duration_s,
            dt_s,
            demand,
            segments,
            initial_fan_stage: default_fan_stage(),
            traffic: TrafficParameters::default(),
            emission: EmissionParameters::default(),
            visibility: VisibilityParameters::default(),
            fan_stage: FanStageParameters::default(),
            injector: InjectorParameters::default(),
            incidents: vec![],
            weather: vec![],
        }
    }

    pub fn from_toml_str(s: &str) -> TwinResult<Self> {
        toml::from_str(s).map_err(|e| TwinError::configuration("scenario", e.to_string()))
    }

    pub fn to_toml_string(&self) -> TwinResult<String> {
        toml::to_string(self).map_err(|e| TwinError::Error(e.to_string()))
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn time_axis(&self) -> TwinResult<TimeAxis> {
        TimeAxis::from_duration(self.duration_s, self.dt_s)
    }

    /// Check the whole scenario before a run starts
    ///
    /// Besides the parameter blocks and the windows this checks that the explicit Euler
    /// update of the CO level is stable for the chosen step.
    pub fn validate(&self) -> TwinResult<()> {
        if self.segments.is_empty() {
            return Err(TwinError::configuration(
                "segments",
                "a tunnel needs at least one segment",
            ));
        }
        self.time_axis()?;
        self.demand.validate()?;
        self.traffic.validate()?;
        self.emission.validate()?;
        self.visibility.validate()?;
        self.fan_stage.validate()?;
        self.injector.validate()?;
        self.injector()?;

        let tau = self.emission.source_tau_s;
        if self.dt_s >= tau {
            return Err(TwinError::configuration(
                "dt_s",
                format!("must be below emission.source_tau_s ({}), got {}", tau, self.dt_s),
            ));
        }
        let gain = self.dt_s * (1.0 / tau + self.fan_stage.max_removal_rate());
        if gain > 1.0 {
            return Err(TwinError::configuration(
                "dt_s",
                format!(
                    "dt * (1 / source_tau_s + max removal rate) must not exceed 1, got {}",
                    gain
                ),
            ));
        }

        for (i, segment) in self.segments.iter().enumerate() {
            self.validate_segment(i, segment)?;
        }
        Ok(())
    }

    fn validate_segment(&self, index: usize, segment: &SegmentConfig) -> TwinResult<()> {
        let field = |name: &str| format!("segments[{}].{}", index, name);
        let within = |name: &str, value: FloatValue, upper: FloatValue| {
            if (0.0..=upper).contains(&value) {
                Ok(())
            } else {
                Err(TwinError::configuration(
                    field(name),
                    format!("must be within [0, {}], got {}", upper, value),
                ))
            }
        };

        within("density", segment.density, self.traffic.jam_density)?;
        within("speed", segment.speed, self.traffic.free_flow_speed)?;
        within("heavy_vehicle_ratio", segment.heavy_vehicle_ratio, 1.0)?;
        if !(segment.queue.is_finite() && segment.queue >= 0.0) {
            return Err(TwinError::configuration(
                field("queue"),
                format!("must be non-negative, got {}", segment.queue),
            ));
        }
        if let Some(co) = segment.co {
            if !(co.is_finite() && co >= 0.0) {
                return Err(TwinError::configuration(
                    field("co"),
                    format!("must be non-negative, got {}", co),
                ));
            }
        }
        if let Some(visibility) = segment.visibility {
            within("visibility", visibility, self.visibility.baseline)?;
        }
        Ok(())
    }

    /// The injector for this scenario's windows
    pub fn injector(&self) -> TwinResult<WeatherIncidentInjector> {
        WeatherIncidentInjector::new(
            self.injector.clone(),
            self.n_segments(),
            self.incidents.clone(),
            self.weather.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use tunsim_components::components::IncidentType;

    fn scenario() -> Scenario {
        Scenario::new(
            "test",
            100.0,
            1.0,
            DemandProfile::constant(1800.0),
            vec![SegmentConfig::new(22.5, 80.0); 2],
        )
    }

    #[test]
    fn default_scenario_is_valid() {
        scenario().validate().unwrap();
    }

    #[test]
    fn demand_steps_override_the_wave() {
        let demand = DemandProfile {
            base_veh_per_h: 1800.0,
            peak_amplitude_veh_per_h: 600.0,
            peak_period_s: 400.0,
            steps: vec![
                DemandStep {
                    t_start: 80.0,
                    demand_veh_per_h: 3900.0,
                },
                DemandStep {
                    t_start: 170.0,
                    demand_veh_per_h: 1500.0,
                },
            ],
        };
        assert_eq!(demand.at(0.0), 1800.0);
        assert!(is_close!(demand.at(50.0), 1800.0 + 600.0 * (PI / 4.0).sin()));
        assert_eq!(demand.at(80.0), 3900.0);
        assert_eq!(demand.at(169.0), 3900.0);
        assert_eq!(demand.at(170.0), 1500.0);
        assert_eq!(demand.at(1e6), 1500.0);
    }

    #[test]
    fn demand_is_never_negative() {
        let demand = DemandProfile {
            base_veh_per_h: 100.0,
            peak_amplitude_veh_per_h: 500.0,
            peak_period_s: 100.0,
            steps: vec![],
        };
        assert_eq!(demand.at(75.0), 0.0);
    }

    #[test]
    fn sample_matches_time_axis() {
        let time_axis = TimeAxis::from_duration(10.0, 2.0).unwrap();
        let values = DemandProfile::constant(1000.0).sample(&time_axis);
        assert_eq!(values.shape(), &[6, 1]);
        assert!(values.iter().all(|v| *v == 1000.0));
    }

    #[test]
    fn unordered_steps_are_rejected() {
        let mut demand = DemandProfile::constant(1000.0);
        demand.steps = vec![
            DemandStep {
                t_start: 50.0,
                demand_veh_per_h: 1.0,
            },
            DemandStep {
                t_start: 50.0,
                demand_veh_per_h: 2.0,
            },
        ];
        let err = demand.validate().unwrap_err();
        assert!(matches!(
            err,
            TwinError::Configuration { ref field, .. } if field == "demand.steps[1].t_start"
        ));
    }

    #[test]
    fn unstable_step_is_rejected() {
        let mut s = scenario();
        s.dt_s = 40.0;
        s.duration_s = 400.0;
        assert!(matches!(
            s.validate(),
            Err(TwinError::Configuration { ref field, .. }) if field == "dt_s"
        ));

        let mut s = scenario();
        s.dt_s = 30.0;
        s.emission.source_tau_s = 31.0;
        // 30 * (1 / 31 + 0.04) > 1
        assert!(matches!(
            s.validate(),
            Err(TwinError::Configuration { ref field, .. }) if field == "dt_s"
        ));
    }

    #[test]
    fn segment_bounds_are_checked() {
        let mut s = scenario();
        s.segments[1].density = 500.0;
        assert!(matches!(
            s.validate(),
            Err(TwinError::Configuration { ref field, .. }) if field == "segments[1].density"
        ));

        let mut s = scenario();
        s.segments.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn from_toml() {
        let s = Scenario::from_toml_str(
            r#"
            id = "peak_incident"
            duration_s = 400.0
            dt_s = 1.0

            [demand]
            base_veh_per_h = 1800.0
            steps = [
                { t_start = 80.0, demand_veh_per_h = 3900.0 },
                { t_start = 170.0, demand_veh_per_h = 1500.0 },
            ]

            [[segments]]
            density = 22.5
            speed = 80.0

            [traffic]
            jam_density = 160.0

            [fan_stage]
            co_reference_ppm = 40.0

            [[incidents]]
            kind = "collision"
            t_start = 100.0
            t_end = 160.0
            severity = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(s.id, "peak_incident");
        assert_eq!(s.n_segments(), 1);
        assert_eq!(s.segments[0].heavy_vehicle_ratio, 0.12);
        assert_eq!(s.demand.steps.len(), 2);
        assert_eq!(s.traffic.jam_density, 160.0);
        assert_eq!(s.traffic.free_flow_speed, 100.0);
        assert_eq!(s.fan_stage.co_reference_ppm, 40.0);
        assert_eq!(s.fan_stage.removal_rates[1], 0.012);
        assert_eq!(s.incidents[0].kind, IncidentType::Collision);
        assert_eq!(s.initial_fan_stage, FanStage::Off);
        s.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let err = Scenario::from_toml_str("id = 3").unwrap_err();
        assert!(matches!(err, TwinError::Configuration { .. }));
    }

    #[test]
    fn toml_round_trip() {
        let mut s = scenario();
        s.incidents.push(IncidentWindow {
            kind: IncidentType::VehicleFire,
            t_start: 10.0,
            t_end: 20.0,
            severity: 0.5,
            segment: Some(1),
            capacity_drop: None,
            speed_limit: Some(60.0),
        });
        let text = s.to_toml_string().unwrap();
        assert_eq!(Scenario::from_toml_str(&text).unwrap(), s);
    }
}
