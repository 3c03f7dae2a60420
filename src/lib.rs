//! A reduced-order digital twin of a road tunnel.
//!
//! Traffic, CO emissions, visibility and ventilation are coupled into a single model that is
//! stepped on a fixed time axis. Each completed tick yields a [`Frame`] of named values that
//! can be recorded or streamed.
//!
//! ```no_run
//! use tunsim::{reset, Scenario};
//!
//! let scenario = Scenario::from_toml_str(&std::fs::read_to_string("scenario.toml")?)?;
//! let mut simulation = reset(&scenario)?;
//! while !simulation.is_finished() {
//!     let frame = simulation.step()?;
//!     println!("{} {:?}", frame.time, frame.get("Ventilation|Fan Stage"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod scenario;
pub mod simulation;

pub use scenario::{DemandProfile, DemandStep, Scenario, SegmentConfig};
pub use simulation::{is_finished, reset, step, Simulation};
pub use tunsim_core::errors::{TwinError, TwinResult};
pub use tunsim_core::frame::Frame;
