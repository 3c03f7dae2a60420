use crate::parameters::VisibilityParameters;
use serde::{Deserialize, Serialize};
use tunsim_core::component::{
    Component, GridType, InputState, OutputState, RequirementDefinition, StateValue,
};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::standard_variables::{
    VAR_CO, VAR_VISIBILITY, VAR_WEATHER_ACTIVE, VAR_WEATHER_SEVERITY,
};
use tunsim_core::timeseries::{FloatValue, Time};

/// Visibility proxy of each segment
///
/// Visibility drops to its target as soon as the air gets worse and recovers towards it with a
/// first-order lag once the air clears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityComponent {
    parameters: VisibilityParameters,
    n_segments: usize,
}

impl VisibilityComponent {
    pub fn from_parameters(parameters: VisibilityParameters, n_segments: usize) -> Self {
        Self {
            parameters,
            n_segments,
        }
    }

    pub fn parameters(&self) -> &VisibilityParameters {
        &self.parameters
    }

    /// Visibility that the given air quality and weather settle at
    pub fn target(
        &self,
        co_level: FloatValue,
        weather_active: bool,
        weather_severity: FloatValue,
    ) -> FloatValue {
        let p = &self.parameters;
        let weather = if weather_active {
            1.0 - p.weather_visibility_loss * num::clamp(weather_severity, 0.0, 1.0)
        } else {
            1.0
        };
        p.baseline * (-co_level.max(0.0) / p.co_extinction_ppm).exp() * weather
    }

    pub fn update(
        &self,
        dt: Time,
        visibility: FloatValue,
        co_level: FloatValue,
        weather_active: bool,
        weather_severity: FloatValue,
    ) -> FloatValue {
        let target = self.target(co_level, weather_active, weather_severity);
        let next = if target <= visibility {
            target
        } else {
            let alpha = (dt / self.parameters.recovery_tau_s).min(1.0);
            visibility + alpha * (target - visibility)
        };
        num::clamp(next, 0.0, self.parameters.baseline)
    }
}

#[typetag::serde]
impl Component for VisibilityComponent {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let grid = GridType::Segments(self.n_segments);
        vec![
            VAR_CO.input(grid),
            VAR_WEATHER_ACTIVE.input(GridType::Scalar),
            VAR_WEATHER_SEVERITY.input(GridType::Scalar),
            VAR_VISIBILITY.state(grid),
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
        let co = input_state.segments(VAR_CO.name, n)?;
        let weather_active = input_state.scalar(VAR_WEATHER_ACTIVE.name)? > 0.5;
        let weather_severity = input_state.scalar(VAR_WEATHER_SEVERITY.name)?;
        let visibility = input_state.segments(VAR_VISIBILITY.name, n)?;

        let next = (0..n)
            .map(|i| self.update(dt, visibility[i], co[i], weather_active, weather_severity))
            .collect();

        Ok(OutputState::from([(
            VAR_VISIBILITY.name.to_string(),
            StateValue::Segments(next),
        )]))
    }

    fn check_invariants(
        &self,
        tick: usize,
        _previous: &InputState,
        current: &InputState,
    ) -> TwinResult<()> {
        let visibility = current.segments(VAR_VISIBILITY.name, self.n_segments)?;
        match visibility
            .iter()
            .position(|v| !(0.0..=self.parameters.baseline).contains(v))
        {
            Some(i) => Err(TwinError::InvariantViolation {
                tick,
                variable: VAR_VISIBILITY.name.to_string(),
                segment: Some(i),
                value: visibility[i],
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use is_close::is_close;
    use ndarray::array;

    fn component() -> VisibilityComponent {
        VisibilityComponent::from_parameters(VisibilityParameters::default(), 2)
    }

    #[test]
    fn clear_air_is_baseline() {
        let visibility = component();
        assert_eq!(visibility.target(0.0, false, 1.0), 1.0);
        assert!(is_close!(
            visibility.target(150.0, false, 0.0),
            (-1.0_f64).exp()
        ));
        assert!(is_close!(visibility.target(0.0, true, 0.5), 0.7));
    }

    #[test]
    fn degradation_is_immediate() {
        let visibility = component();
        let next = visibility.update(1.0, 1.0, 30.0, true, 1.0);
        assert_relative_eq!(next, visibility.target(30.0, true, 1.0));
    }

    #[test]
    fn recovery_is_gradual() {
        let visibility = component();
        let next = visibility.update(1.0, 0.4, 0.0, false, 0.0);
        assert_relative_eq!(next, 0.4 + 0.6 / 60.0, max_relative = 1e-12);

        let mut v = 0.4;
        for _ in 0..600 {
            let next = visibility.update(1.0, v, 0.0, false, 0.0);
            assert!(next >= v);
            assert!(next <= 1.0);
            v = next;
        }
        assert!(v > 0.99);
    }

    #[test]
    fn large_step_jumps_to_target() {
        let visibility = component();
        assert!(is_close!(visibility.update(120.0, 0.2, 0.0, false, 0.0), 1.0));
    }

    #[test]
    fn solve_reads_weather_flags() {
        let visibility = component();
        let co = array![0.0, 75.0];
        let active = array![1.0];
        let severity = array![0.5];
        let current = array![1.0, 1.0];
        let input_state = InputState::build(
            vec![
                (VAR_CO.name, co.view()),
                (VAR_WEATHER_ACTIVE.name, active.view()),
                (VAR_WEATHER_SEVERITY.name, severity.view()),
                (VAR_VISIBILITY.name, current.view()),
            ],
            0.0,
        );

        let output = visibility.solve(0.0, 1.0, &input_state).unwrap();
        let values = output[VAR_VISIBILITY.name].as_segments().unwrap();
        assert!(is_close!(values[0], 0.7));
        assert!(is_close!(values[1], 0.7 * (-0.5_f64).exp()));
    }

    #[test]
    fn invariant_rejects_values_above_baseline() {
        let visibility = component();
        let values = array![1.0, 1.2];
        let state = InputState::build(vec![(VAR_VISIBILITY.name, values.view())], 1.0);

        assert!(matches!(
            visibility.check_invariants(3, &state, &state),
            Err(TwinError::InvariantViolation {
                tick: 3,
                segment: Some(1),
                ..
            })
        ));
    }
}
