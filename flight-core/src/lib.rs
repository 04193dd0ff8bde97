//! Gyro signal conditioning and stick-command arming for a multirotor flight controller.
//!
//! Everything in here runs from a single cooperative loop: the caller invokes
//! [`gyro::GyroPipeline::update`] once per gyro sample tick and
//! [`rc::RcControls::process_stick_positions`] once per RC tick, passing elapsed
//! time explicitly. Nothing blocks, allocates or spawns.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod calibration;
pub mod config;
pub mod error;
pub mod filter;
pub mod gyro;
pub mod rc;

pub use calibration::{CalibrationEngine, CalibrationStatus};
pub use config::{FilterConfig, GyroConfig, RcControlsConfig};
pub use error::ConfigError;
pub use filter::FilterChain;
pub use gyro::{GyroPipeline, PipelineState, RawSampleSource};
pub use rc::{RcControls, StickCode, StickGestureDecoder, StickPosition};

pub const XYZ_AXIS_COUNT: usize = 3;

/// Angular rate per axis in degrees per second, indexed by [`Axis`].
pub type Rates = [f32; XYZ_AXIS_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    Roll = 0,
    Pitch = 1,
    Yaw = 2,
}

impl Axis {
    pub const ALL: [Axis; XYZ_AXIS_COUNT] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    pub const fn index(self) -> usize {
        self as usize
    }
}
