//! Segment traffic component
//!
//! A reduced-order macroscopic traffic model for a chain of tunnel segments.
//!
//! # What This Component Does
//!
//! 1. Limits the outflow of each segment by its capacity, which falls once a segment is
//!    congested and is reduced further by incidents and weather.
//! 2. Stores demand that can't leave a segment in a queue. The queue grows while demand
//!    exceeds capacity and relaxes back to zero otherwise.
//! 3. Derives the density from the flowing traffic and the queue. Vehicles that would push a
//!    segment above jam density spill back into the queue of the upstream segment.
//! 4. Relaxes the speed towards the fundamental diagram, capped by the speed limit and slowed
//!    further by the queue.
//!
//! # Inputs
//!
//! - `Traffic|Demand` (veh / h) - arrivals at the entry portal
//! - `Traffic|Speed Limit` (km / h) - active speed limit
//! - `Traffic|Capacity Factor` (1) - capacity multiplier of each segment
//!
//! # States
//!
//! - `Traffic|Density` (veh / km), `Traffic|Speed` (km / h) and `Traffic|Queue` (veh)
//!
//! # Outputs
//!
//! - `Traffic|Inflow`, `Traffic|Outflow` and `Traffic|Capacity` (veh / h)
//! - `Traffic|Heavy Vehicle Ratio` (1)

use crate::parameters::TrafficParameters;
use serde::{Deserialize, Serialize};
use tunsim_core::component::{
    Component, GridType, InputState, OutputState, RequirementDefinition, StateValue,
};
use tunsim_core::errors::{TwinError, TwinResult};
use tunsim_core::standard_variables::{
    VAR_CAPACITY, VAR_CAPACITY_FACTOR, VAR_DEMAND, VAR_DENSITY, VAR_HEAVY_VEHICLE_RATIO,
    VAR_INFLOW, VAR_OUTFLOW, VAR_QUEUE, VAR_SPEED, VAR_SPEED_LIMIT,
};
use tunsim_core::timeseries::{FloatValue, Time};

/// Seconds per hour, flows are expressed per hour
const SECONDS_PER_HOUR: FloatValue = 3600.0;
/// Slack used when comparing flows against capacity
const FLOW_TOLERANCE: FloatValue = 1e-9;

/// State of a segment at the start of a step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentState {
    /// unit: veh / km
    pub density: FloatValue,
    /// unit: km / h
    pub speed: FloatValue,
    /// unit: veh
    pub queue: FloatValue,
}

/// Result of updating a segment over one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentUpdate {
    pub density: FloatValue,
    pub speed: FloatValue,
    pub inflow: FloatValue,
    pub outflow: FloatValue,
    /// Capacity available during the step, including the capacity drop factor
    pub capacity: FloatValue,
    pub queue: FloatValue,
}

/// Per-segment traffic flow with queues and upstream spillback
///
/// Segments are solved from the entry portal downstream.
/// The first segment receives the exogenous demand and every other segment receives the
/// outflow of its upstream neighbour from the same step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficComponent {
    parameters: TrafficParameters,
    /// Heavy vehicle ratio of each segment at zero density
    base_heavy_vehicle_ratio: Vec<FloatValue>,
}

impl TrafficComponent {
    /// Create a traffic component with one segment per base heavy vehicle ratio
    pub fn from_parameters(
        parameters: TrafficParameters,
        base_heavy_vehicle_ratio: Vec<FloatValue>,
    ) -> Self {
        Self {
            parameters,
            base_heavy_vehicle_ratio,
        }
    }

    pub fn parameters(&self) -> &TrafficParameters {
        &self.parameters
    }

    pub fn n_segments(&self) -> usize {
        self.base_heavy_vehicle_ratio.len()
    }

    fn grid(&self) -> GridType {
        GridType::Segments(self.n_segments())
    }

    /// Speed on the fundamental diagram
    ///
    /// Free flow speed at zero density, decreasing monotonically to zero at jam density.
    pub fn equilibrium_speed(&self, density: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let x = num::clamp(density / p.jam_density, 0.0, 1.0);
        p.free_flow_speed * (1.0 - x.powf(p.gamma))
    }

    /// Maximum outflow of a segment at a given density
    ///
    /// Constant up to the critical density, then falling linearly to
    /// `max_flow * (1 - congested_capacity_drop)` at jam density.
    pub fn capacity(&self, density: FloatValue) -> FloatValue {
        let p = &self.parameters;
        if density <= p.critical_density {
            return p.max_flow;
        }
        let congestion = num::clamp(
            (density - p.critical_density) / (p.jam_density - p.critical_density),
            0.0,
            1.0,
        );
        p.max_flow * (1.0 - p.congested_capacity_drop * congestion)
    }

    /// Speed multiplier caused by the queue of a segment
    pub fn queue_drag(&self, queue: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let queue_density = queue / p.segment_length_km;
        let saturation = (queue_density / (p.jam_density - p.critical_density)).min(1.0);
        (1.0 - p.queue_speed_penalty * saturation).max(p.min_queue_drag)
    }

    /// Heavy vehicle ratio of a segment
    ///
    /// Heavy vehicles make up a larger share of slow, dense traffic when
    /// `heavy_vehicle_gain` is positive.
    pub fn heavy_vehicle_ratio(&self, segment: usize, density: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let base = self
            .base_heavy_vehicle_ratio
            .get(segment)
            .copied()
            .unwrap_or(0.0);
        let congestion = num::clamp(density / p.jam_density, 0.0, 1.0);
        num::clamp(base + p.heavy_vehicle_gain * congestion, 0.0, 1.0)
    }

    /// Speed at which traffic leaves a segment
    fn send_speed(&self, speed_limit: FloatValue) -> TwinResult<FloatValue> {
        let speed = self.parameters.free_flow_speed.min(speed_limit);
        if speed > 0.0 {
            Ok(speed)
        } else {
            Err(TwinError::Error(format!(
                "speed limit must be positive, got {}",
                speed_limit
            )))
        }
    }

    fn density_from_flow(
        &self,
        outflow: FloatValue,
        queue: FloatValue,
        send_speed: FloatValue,
    ) -> FloatValue {
        outflow / send_speed + queue / self.parameters.segment_length_km
    }

    /// Capacity-limited outflow, queue and (unclamped) density of a segment
    fn segment_flow(
        &self,
        dt: Time,
        state: &SegmentState,
        inflow: FloatValue,
        capacity_drop_factor: FloatValue,
        send_speed: FloatValue,
    ) -> SegmentUpdate {
        let inflow = inflow.max(0.0);
        let capacity = self.capacity(state.density) * capacity_drop_factor;
        let outflow = inflow.min(capacity).max(0.0);

        let queue = if inflow > outflow {
            state.queue + (inflow - outflow) * dt / SECONDS_PER_HOUR
        } else {
            state.queue * self.parameters.queue_relaxation.powf(dt)
        };

        SegmentUpdate {
            density: self.density_from_flow(outflow, queue, send_speed),
            speed: state.speed,
            inflow,
            outflow,
            capacity,
            queue,
        }
    }

    /// Relax the speed towards its target for the new density and queue
    ///
    /// An empty segment runs at free flow speed. The result never exceeds the speed limit.
    fn relax_speed(
        &self,
        dt: Time,
        speed: FloatValue,
        density: FloatValue,
        queue: FloatValue,
        speed_limit: FloatValue,
    ) -> FloatValue {
        let p = &self.parameters;
        let max_speed = p.free_flow_speed.min(speed_limit);
        if density <= 0.0 {
            return max_speed;
        }
        let target = self.equilibrium_speed(density).min(speed_limit) * self.queue_drag(queue);
        let alpha = (p.speed_relaxation * dt).min(1.0);
        num::clamp(speed + alpha * (target - speed), 0.0, max_speed)
    }

    /// Update a single segment over one step
    ///
    /// The outflow is `min(inflow, capacity(density) * capacity_drop_factor)` using the density
    /// at the start of the step.
    /// No spillback is applied as there is no upstream segment.
    pub fn update_segment(
        &self,
        dt: Time,
        state: &SegmentState,
        inflow: FloatValue,
        speed_limit: FloatValue,
        capacity_drop_factor: FloatValue,
    ) -> TwinResult<SegmentUpdate> {
        let send_speed = self.send_speed(speed_limit)?;
        let mut update = self.segment_flow(dt, state, inflow, capacity_drop_factor, send_speed);
        update.density = update.density.min(self.parameters.jam_density);
        update.speed = self.relax_speed(dt, state.speed, update.density, update.queue, speed_limit);
        Ok(update)
    }

    /// Move vehicles that don't fit into a jammed segment into the upstream queue
    ///
    /// Processed from the exit portal upstream so that spillback can propagate over several
    /// segments in a single step. The first segment is clamped to jam density.
    fn spill_back(&self, updates: &mut [SegmentUpdate], send_speed: FloatValue) {
        let p = &self.parameters;
        for i in (1..updates.len()).rev() {
            let excess = (updates[i].density - p.jam_density) * p.segment_length_km;
            if excess <= 0.0 {
                continue;
            }
            let moved = excess.min(updates[i].queue);
            updates[i].queue -= moved;
            updates[i - 1].queue += moved;
            updates[i].density = self
                .density_from_flow(updates[i].outflow, updates[i].queue, send_speed)
                .min(p.jam_density);
            updates[i - 1].density =
                self.density_from_flow(updates[i - 1].outflow, updates[i - 1].queue, send_speed);
        }
        if let Some(first) = updates.first_mut() {
            first.density = first.density.min(p.jam_density);
        }
    }

    /// Update every segment over one step
    pub fn update(
        &self,
        dt: Time,
        demand: FloatValue,
        speed_limit: FloatValue,
        capacity_drop_factors: &[FloatValue],
        states: &[SegmentState],
    ) -> TwinResult<Vec<SegmentUpdate>> {
        let send_speed = self.send_speed(speed_limit)?;

        let mut inflow = demand;
        let mut updates = Vec::with_capacity(states.len());
        for (state, factor) in states.iter().zip(capacity_drop_factors) {
            let update = self.segment_flow(dt, state, inflow, *factor, send_speed);
            inflow = update.outflow;
            updates.push(update);
        }

        self.spill_back(&mut updates, send_speed);

        for (update, state) in updates.iter_mut().zip(states) {
            update.speed =
                self.relax_speed(dt, state.speed, update.density, update.queue, speed_limit);
        }
        Ok(updates)
    }

    fn violation(
        tick: usize,
        variable: &str,
        segment: usize,
        value: FloatValue,
    ) -> TwinError {
        TwinError::InvariantViolation {
            tick,
            variable: variable.to_string(),
            segment: Some(segment),
            value,
        }
    }
}

#[typetag::serde]
impl Component for TrafficComponent {
    fn definitions(&self) -> Vec<RequirementDefinition> {
        let grid = self.grid();
        vec![
            VAR_DEMAND.input(GridType::Scalar),
            VAR_SPEED_LIMIT.input(GridType::Scalar),
            VAR_CAPACITY_FACTOR.input(grid),
            VAR_DENSITY.state(grid),
            VAR_SPEED.state(grid),
            VAR_QUEUE.state(grid),
            VAR_INFLOW.output(grid),
            VAR_OUTFLOW.output(grid),
            VAR_CAPACITY.output(grid),
            VAR_HEAVY_VEHICLE_RATIO.output(grid),
        ]
    }

    fn solve(
        &self,
        t_current: Time,
        t_next: Time,
        input_state: &InputState,
    ) -> TwinResult<OutputState> {
        let n = self.n_segments();
        let demand = input_state.scalar(VAR_DEMAND.name)?;
        let speed_limit = input_state.scalar(VAR_SPEED_LIMIT.name)?;
        let capacity_factors = input_state.segments(VAR_CAPACITY_FACTOR.name, n)?.to_vec();
        let density = input_state.segments(VAR_DENSITY.name, n)?;
        let speed = input_state.segments(VAR_SPEED.name, n)?;
        let queue = input_state.segments(VAR_QUEUE.name, n)?;

        let states: Vec<SegmentState> = (0..n)
            .map(|i| SegmentState {
                density: density[i],
                speed: speed[i],
                queue: queue[i],
            })
            .collect();

        let updates = self.update(
            t_next - t_current,
            demand,
            speed_limit,
            &capacity_factors,
            &states,
        )?;

        let collect = |f: fn(&SegmentUpdate) -> FloatValue| {
            StateValue::Segments(updates.iter().map(f).collect())
        };
        let heavy_vehicle_ratio = updates
            .iter()
            .enumerate()
            .map(|(i, u)| self.heavy_vehicle_ratio(i, u.density))
            .collect();

        Ok(OutputState::from([
            (VAR_DENSITY.name.to_string(), collect(|u| u.density)),
            (VAR_SPEED.name.to_string(), collect(|u| u.speed)),
            (VAR_QUEUE.name.to_string(), collect(|u| u.queue)),
            (VAR_INFLOW.name.to_string(), collect(|u| u.inflow)),
            (VAR_OUTFLOW.name.to_string(), collect(|u| u.outflow)),
            (VAR_CAPACITY.name.to_string(), collect(|u| u.capacity)),
            (
                VAR_HEAVY_VEHICLE_RATIO.name.to_string(),
                StateValue::Segments(heavy_vehicle_ratio),
            ),
        ]))
    }

    fn check_invariants(
        &self,
        tick: usize,
        _previous: &InputState,
        current: &InputState,
    ) -> TwinResult<()> {
        let p = &self.parameters;
        let n = self.n_segments();
        let speed_limit = current.scalar(VAR_SPEED_LIMIT.name)?;
        let density = current.segments(VAR_DENSITY.name, n)?;
        let speed = current.segments(VAR_SPEED.name, n)?;
        let queue = current.segments(VAR_QUEUE.name, n)?;
        let outflow = current.segments(VAR_OUTFLOW.name, n)?;
        let capacity = current.segments(VAR_CAPACITY.name, n)?;

        for i in 0..n {
            if !(0.0..=p.jam_density).contains(&density[i]) {
                return Err(Self::violation(tick, VAR_DENSITY.name, i, density[i]));
            }
            if !(0.0..=p.free_flow_speed.min(speed_limit)).contains(&speed[i]) {
                return Err(Self::violation(tick, VAR_SPEED.name, i, speed[i]));
            }
            if !(queue[i] >= 0.0 && queue[i].is_finite()) {
                return Err(Self::violation(tick, VAR_QUEUE.name, i, queue[i]));
            }
            if !(outflow[i] >= 0.0 && outflow[i] <= capacity[i] + FLOW_TOLERANCE) {
                return Err(Self::violation(tick, VAR_OUTFLOW.name, i, outflow[i]));
            }
        }
        Ok(())
    }
}
