//! motion - Stepper-motor motion profiles for the scanner transport
//!
//! This crate models the transport motor's acceleration characteristic and
//! generates the discrete step-timing tables consumed by the motion
//! controller:
//!
//! - **MotorSlope** - a motor's acceleration curve (initial and terminal step
//!   periods plus an acceleration constant)
//! - **StepType** - microstepping mode scaling pulse count per mechanical step
//! - **MotorSlopeTable** - an ordered ramp of 16-bit step periods written into
//!   the controller's acceleration-table memory
//!
//! # Example
//!
//! ```
//! use motion::{create_slope_table_for_speed, MotorSlope, StepType};
//!
//! let slope = MotorSlope::new(62464, 2632, 1.2e-8);
//! let table = create_slope_table_for_speed(&slope, 5000, StepType::Full, 4, 8, 1024).unwrap();
//!
//! // The table ramps down to the requested cruise period.
//! assert_eq!(table.entries().last(), Some(&5000));
//! ```

pub mod slope;

pub use slope::{
    compute_acceleration_for_steps, create_slope_table_for_speed, MotorSlope, MotorSlopeTable,
    SlopeError, StepType,
};
