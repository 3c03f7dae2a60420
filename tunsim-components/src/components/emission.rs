//! CO emission component
//!
//! Estimates the CO source of each segment from its traffic and filters it with a first-order
//! lag. Ventilation removes CO in proportion to the current level using the removal rate that
//! the fan stage controller set in the previous step.

use crate::parameters::EmissionParameters;
use serde::{Deserialize, Serialize};
use tunsim_core::component::{
    Component, GridType, InputState, OutputState, RequirementDefinition, StateValue,
};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::standard_variables::{
    VAR_CO, VAR_CO_SOURCE, VAR_DENSITY, VAR_HEAVY_VEHICLE_RATIO, VAR_INCIDENT_SEVERITY,
    VAR_REMOVAL_RATE, VAR_SPEED,
};
use tunsim_core::timeseries::{FloatValue, Time};

/// Relative slack allowed when checking the CO level against its bound
const CO_TOLERANCE: FloatValue = 1e-9;

/// CO source with first-order lag and ventilation removal
///
/// The raw source is
///
/// $$S = s \rho \, e(v) \, (1 + w_{hv} h) \, g(v) \, (1 + \sigma a)$$
///
/// where $g(v)$ is the stop-and-go factor, $h$ the heavy vehicle ratio and $\sigma$ the summed
/// incident severity. The CO level follows
///
/// $$c_{n+1} = c_n + \frac{\Delta t}{\tau} (S - c_n) - \Delta t \, r \, c_n$$
///
/// which settles at $S / (1 + \tau r)$ for a constant source and removal rate $r$.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionComponent {
    parameters: EmissionParameters,
    n_segments: usize,
}

impl EmissionComponent {
    pub fn from_parameters(parameters: EmissionParameters, n_segments: usize) -> Self {
        Self {
            parameters,
            n_segments,
        }
    }

    pub fn parameters(&self) -> &EmissionParameters {
        &self.parameters
    }

    /// Emission of a single vehicle at a given speed
    pub fn emission_per_vehicle(&self, speed: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let v = speed.max(0.0);
        p.emission_a0 + p.emission_a1 / (v + p.emission_delta) + p.emission_a2 * v
    }

    /// Multiplier for stop-and-go driving below `stop_go_speed`
    pub fn stop_and_go_factor(&self, speed: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let slowdown = ((p.stop_go_speed - speed.max(0.0)) / p.stop_go_speed).max(0.0);
        1.0 + slowdown * p.stop_go_gain
    }

    /// Unfiltered CO source of a segment
    ///
    /// Increasing in density and in the heavy vehicle share and amplified by incidents.
    pub fn raw_source(
        &self,
        density: FloatValue,
        speed: FloatValue,
        heavy_vehicle_ratio: FloatValue,
        incident_severity: FloatValue,
    ) -> FloatValue {
        let p = &self.parameters;
        let heavy = 1.0 + p.heavy_vehicle_weight * num::clamp(heavy_vehicle_ratio, 0.0, 1.0);
        let incident = 1.0 + incident_severity.max(0.0) * p.amplification_factor;

        p.source_scale
            * density.max(0.0)
            * self.emission_per_vehicle(speed)
            * heavy
            * self.stop_and_go_factor(speed)
            * incident
    }

    /// Advance the filtered CO level by one step
    pub fn update(
        &self,
        dt: Time,
        co_level: FloatValue,
        raw_source: FloatValue,
        removal_rate: FloatValue,
    ) -> FloatValue {
        let tau = self.parameters.source_tau_s;
        (co_level + dt / tau * (raw_source - co_level) - dt * removal_rate * co_level).max(0.0)
    }

    /// Level reached for a constant source and removal rate
    pub fn steady_state(&self, raw_source: FloatValue, removal_rate: FloatValue) -> FloatValue {
        raw_source / (1.0 + self.parameters.source_tau_s * removal_rate)
    }
}

#[typetag::serde]
impl Component for EmissionComponent {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let grid = GridType::Segments(self.n_segments);
        vec![
            VAR_DENSITY.input(grid),
            VAR_SPEED.input(grid),
            VAR_HEAVY_VEHICLE_RATIO.input(grid),
            VAR_INCIDENT_SEVERITY.input(grid),
            VAR_REMOVAL_RATE.lagged(GridType::Scalar),
            VAR_CO.state(grid),
            VAR_CO_SOURCE.output(grid),
        ]
    }

    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let n = self.n_segments;
        let dt = t_next - t_current;
        let density = input_state.segments(VAR_DENSITY.name, n)?;
        let speed = input_state.segments(VAR_SPEED.name, n)?;
        let heavy_vehicle_ratio = input_state.segments(VAR_HEAVY_VEHICLE_RATIO.name, n)?;
        let severity = input_state.segments(VAR_INCIDENT_SEVERITY.name, n)?;
        let removal_rate = input_state.scalar(VAR_REMOVAL_RATE.name)?;
        let co = input_state.segments(VAR_CO.name, n)?;

        let source: Vec<FloatValue> = (0..n)
            .map(|i| self.raw_source(density[i], speed[i], heavy_vehicle_ratio[i], severity[i]))
            .collect();
        let co_next = (0..n)
            .map(|i| self.update(dt, co[i], source[i], removal_rate))
            .collect();

        Ok(OutputState::from([
            (VAR_CO.name.to_string(), StateValue::Segments(co_next)),
            (VAR_CO_SOURCE.name.to_string(), StateValue::Segments(source)),
        ]))
    }

    /// The CO level is never negative and never overshoots both its previous value and the
    /// source that drives it.
    fn check_invariants(
        &self,
        tick: usize,
        previous: &InputState,
        current: &InputState,
    ) -> TwinResult<()> {
        let n = self.n_segments;
        let co_previous = previous.segments(VAR_CO.name, n)?;
        let co = current.segments(VAR_CO.name, n)?;
        let source = current.segments(VAR_CO_SOURCE.name, n)?;

        for i in 0..n {
            let bound = co_previous[i].max(source[i]);
            if !(co[i] >= 0.0 && co[i] <= bound * (1.0 + CO_TOLERANCE) + CO_TOLERANCE) {
                return Err(TwinError::InvariantViolation {
                    tick,
                    variable: VAR_CO.name.to_string(),
                    segment: Some(i),
                    value: co[i],
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use is_close::is_close;
    use ndarray::array;

    fn component() -> EmissionComponent {
        EmissionComponent::from_parameters(EmissionParameters::default(), 1)
    }

    #[test]
    fn test_emission_per_vehicle() {
        let emission = component();
        // 0.6 + 40 / 85 + 0.4
        assert!(is_close!(
            emission.emission_per_vehicle(80.0),
            1.0 + 40.0 / 85.0
        ));
        assert!(is_close!(emission.emission_per_vehicle(0.0), 8.6));
        assert_eq!(
            emission.emission_per_vehicle(-10.0),
            emission.emission_per_vehicle(0.0)
        );
    }

    #[test]
    fn test_stop_and_go() {
        let emission = component();
        assert_eq!(emission.stop_and_go_factor(80.0), 1.0);
        assert_eq!(emission.stop_and_go_factor(40.0), 1.0);
        assert!(is_close!(emission.stop_and_go_factor(20.0), 1.6));
        assert!(is_close!(emission.stop_and_go_factor(0.0), 2.2));
    }

    #[test]
    fn test_raw_source_monotonic() {
        let emission = component();
        let base = emission.raw_source(30.0, 60.0, 0.1, 0.0);

        assert!(emission.raw_source(60.0, 60.0, 0.1, 0.0) > base);
        assert!(emission.raw_source(30.0, 60.0, 0.3, 0.0) > base);
        assert_relative_eq!(
            emission.raw_source(30.0, 60.0, 0.1, 0.8),
            base * (1.0 + 0.8 * 1.5),
            max_relative = 1e-12
        );
        assert_eq!(emission.raw_source(0.0, 60.0, 0.1, 1.0), 0.0);
    }

    #[test]
    fn test_co_never_negative() {
        let emission = component();
        assert_eq!(emission.update(1.0, 10.0, 0.0, 2.0), 0.0);
    }

    #[test]
    fn test_step_response() {
        let emission = component();
        let dt = 0.1;
        let raw_source = 20.0;

        for removal_rate in [0.0, 0.012, 0.04] {
            let expected = emission.steady_state(raw_source, removal_rate);
            let mut co = 0.0;
            for _ in 0..(600.0 / dt) as usize {
                co = emission.update(dt, co, raw_source, removal_rate);
            }
            assert_relative_eq!(co, expected, max_relative = 1e-4);
        }
        assert_relative_eq!(
            emission.steady_state(raw_source, 0.04),
            20.0 / 2.4,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_time_to_63_percent() {
        let emission = component();
        let dt = 0.05;
        let raw_source = 20.0;
        let target = (1.0 - (-1.0_f64).exp()) * emission.steady_state(raw_source, 0.0);

        let mut co = 0.0;
        let mut t = 0.0;
        while co < target {
            co = emission.update(dt, co, raw_source, 0.0);
            t += dt;
        }
        assert_relative_eq!(t, 35.0, max_relative = 0.01);
    }

    #[test]
    fn test_solve_uses_removal_rate() {
        let emission = component();
        let density = array![30.0];
        let speed = array![60.0];
        let hvr = array![0.12];
        let severity = array![0.0];
        let removal = array![0.04];
        let co = array![10.0];
        let input_state = InputState::build(
            vec![
                (VAR_DENSITY.name, density.view()),
                (VAR_SPEED.name, speed.view()),
                (VAR_HEAVY_VEHICLE_RATIO.name, hvr.view()),
                (VAR_INCIDENT_SEVERITY.name, severity.view()),
                (VAR_REMOVAL_RATE.name, removal.view()),
                (VAR_CO.name, co.view()),
            ],
            0.0,
        );

        let output = emission.solve(0.0, 1.0, &input_state).unwrap();
        let source = emission.raw_source(30.0, 60.0, 0.12, 0.0);
        assert_eq!(
            output[VAR_CO_SOURCE.name],
            StateValue::Segments(vec![source])
        );
        assert_eq!(
            output[VAR_CO.name],
            StateValue::Segments(vec![emission.update(1.0, 10.0, source, 0.04)])
        );
    }

    #[test]
    fn test_invariant_catches_overshoot() {
        let emission = component();
        let previous_co = array![5.0];
        let previous_source = array![6.0];
        let co = array![9.0];
        let source = array![6.0];
        let previous = InputState::build(
            vec![
                (VAR_CO.name, previous_co.view()),
                (VAR_CO_SOURCE.name, previous_source.view()),
            ],
            0.0,
        );
        let current = InputState::build(
            vec![(VAR_CO.name, co.view()), (VAR_CO_SOURCE.name, source.view())],
            1.0,
        );

        let err = emission.check_invariants(7, &previous, &current).unwrap_err();
        assert_eq!(
            err,
            TwinError::InvariantViolation {
                tick: 7,
                variable: VAR_CO.name.to_string(),
                segment: Some(0),
                value: 9.0,
            }
        );
    }
}
