//! Components of a tunnel model
//!
//! Each component is solved once per step. Within a step they are ordered by the variables
//! they exchange:
//!
//! injector → traffic → emission → visibility → fan stage
//!
//! The fan stage controller closes the loop through the removal rate, which the emission
//! component reads from the previous step.

mod emission;
mod fan_stage;
mod injector;
mod traffic;
mod visibility;

pub use emission::EmissionComponent;
pub use fan_stage::{FanStage, FanStageController};
pub use injector::{
    IncidentType, IncidentWindow, Modifiers, WeatherIncidentInjector, WeatherType, WeatherWindow,
};
pub use traffic::{SegmentState, SegmentUpdate, TrafficComponent};
pub use visibility::VisibilityComponent;
