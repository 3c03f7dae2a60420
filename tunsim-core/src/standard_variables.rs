//! Standard variable definitions for tunnel models.
//!
//! Variable names use `|` as a hierarchical separator:
//! - `Traffic|Density` - vehicle density of each segment
//! - `Air|CO` - filtered CO level of each segment
//! - `Ventilation|Fan Stage` - commanded fan stage for the whole tunnel
//!
//! Segment-resolved variables don't fix their number of segments here,
//! the grid is chosen when a component declares its requirements.

use crate::component::{GridType, RequirementDefinition, RequirementType};

/// Name and unit of a variable shared between components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardVariable {
    pub name: &'static str,
    pub unit: &'static str,
}

impl StandardVariable {
    pub const fn new(name: &'static str, unit: &'static str) -> Self {
        Self { name, unit }
    }

    pub fn requirement(
        &self,
        requirement_type: RequirementType,
        grid_type: GridType,
    ) -> RequirementDefinition {
        RequirementDefinition::new(self.name, self.unit, requirement_type, grid_type)
    }

    pub fn input(&self, grid_type: GridType) -> RequirementDefinition {
        self.requirement(RequirementType::Input, grid_type)
    }

    pub fn output(&self, grid_type: GridType) -> RequirementDefinition {
        self.requirement(RequirementType::Output, grid_type)
    }

    pub fn state(&self, grid_type: GridType) -> RequirementDefinition {
        self.requirement(RequirementType::State, grid_type)
    }

    pub fn lagged(&self, grid_type: GridType) -> RequirementDefinition {
        self.requirement(RequirementType::Lagged, grid_type)
    }
}

// ============================================================================
// Exogenous
// ============================================================================

/// Vehicles arriving at the entry portal
pub const VAR_DEMAND: StandardVariable = StandardVariable::new("Traffic|Demand", "veh / h");

// ============================================================================
// Scenario modifiers
// ============================================================================

pub const VAR_SPEED_LIMIT: StandardVariable =
    StandardVariable::new("Traffic|Speed Limit", "km / h");
/// Multiplier applied to the capacity of each segment
pub const VAR_CAPACITY_FACTOR: StandardVariable =
    StandardVariable::new("Traffic|Capacity Factor", "1");
/// Summed severity of the incidents affecting each segment
pub const VAR_INCIDENT_SEVERITY: StandardVariable =
    StandardVariable::new("Incident|Severity", "1");
pub const VAR_INCIDENT_ACTIVE: StandardVariable = StandardVariable::new("Incident|Active", "1");
pub const VAR_INCIDENT_ONSET: StandardVariable = StandardVariable::new("Incident|Onset", "1");
pub const VAR_INCIDENT_OFFSET: StandardVariable = StandardVariable::new("Incident|Offset", "1");
pub const VAR_INCIDENT_TYPE: StandardVariable = StandardVariable::new("Incident|Type", "1");
pub const VAR_WEATHER_ACTIVE: StandardVariable = StandardVariable::new("Weather|Active", "1");
pub const VAR_WEATHER_TYPE: StandardVariable = StandardVariable::new("Weather|Type", "1");
pub const VAR_WEATHER_SEVERITY: StandardVariable = StandardVariable::new("Weather|Severity", "1");

// ============================================================================
// Traffic
// ============================================================================

pub const VAR_DENSITY: StandardVariable = StandardVariable::new("Traffic|Density", "veh / km");
pub const VAR_SPEED: StandardVariable = StandardVariable::new("Traffic|Speed", "km / h");
pub const VAR_INFLOW: StandardVariable = StandardVariable::new("Traffic|Inflow", "veh / h");
pub const VAR_OUTFLOW: StandardVariable = StandardVariable::new("Traffic|Outflow", "veh / h");
pub const VAR_CAPACITY: StandardVariable = StandardVariable::new("Traffic|Capacity", "veh / h");
/// Vehicles stored in a segment's queue
pub const VAR_QUEUE: StandardVariable = StandardVariable::new("Traffic|Queue", "veh");
pub const VAR_HEAVY_VEHICLE_RATIO: StandardVariable =
    StandardVariable::new("Traffic|Heavy Vehicle Ratio", "1");

// ============================================================================
// Air quality
// ============================================================================

pub const VAR_CO: StandardVariable = StandardVariable::new("Air|CO", "ppm");
/// Unfiltered CO source estimate
pub const VAR_CO_SOURCE: StandardVariable = StandardVariable::new("Air|CO Source", "ppm");
/// Visibility proxy where 1 is clear air
pub const VAR_VISIBILITY: StandardVariable = StandardVariable::new("Air|Visibility", "1");

// ============================================================================
// Ventilation
// ============================================================================

pub const VAR_FAN_STAGE: StandardVariable = StandardVariable::new("Ventilation|Fan Stage", "1");
pub const VAR_REMOVAL_RATE: StandardVariable =
    StandardVariable::new("Ventilation|Removal Rate", "1 / s");
pub const VAR_CONTROL_SIGNAL: StandardVariable =
    StandardVariable::new("Ventilation|Control Signal", "1");
