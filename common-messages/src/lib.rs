//! Messages exchanged between the handheld remote and the drone over ESP-NOW.
//!
//! Each message travels in its own radio frame, serialized with `wincode`.
#![no_std]

extern crate alloc;
use alloc::boxed::Box;

use wincode::{SchemaRead, SchemaWrite};

/// Remote to drone.
#[derive(Debug, Clone, SchemaWrite, SchemaRead, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum RemoteRequest {
    Ping,
    /// Stick deflections in -500..=500, throttle centered like the others.
    Sticks {
        roll: f32,
        pitch: f32,
        yaw: f32,
        throttle: f32,
    },
    ArmSwitch(bool),
    Modes {
        self_leveling: bool,
        stick_commands_disabled: bool,
    },
    /// The remote lost its own input and wants the drone in failsafe.
    Failsafe(bool),
}

/// Drone to remote.
#[derive(Debug, Clone, SchemaWrite, SchemaRead, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum DroneResponse {
    Pong,
    ArmState {
        armed: bool,
        /// Raw arming-disable bits, zero when arming is allowed.
        disable_flags: u32,
    },
    GyroStatus {
        /// Filtered rates in dps, roll/pitch/yaw.
        rates: [f32; 3],
        overflow: bool,
        calibrating: bool,
        /// Hottest gyro die, °C.
        temperature: Option<f32>,
    },
    /// Play `count` confirmation beeps, zero for the disarm repeat tone.
    Beep(u8),
    Log(Box<[u8]>),
}

impl RemoteRequest {
    /// Sticks in roll, pitch, yaw, throttle order.
    pub fn sticks(roll: f32, pitch: f32, yaw: f32, throttle: f32) -> Self {
        Self::Sticks {
            roll,
            pitch,
            yaw,
            throttle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T>(value: &T) -> T
    where
        T: wincode::SchemaWrite<Src = T> + wincode::SchemaReadOwned<Dst = T>,
    {
        let bytes = wincode::serialize(value).unwrap();
        wincode::deserialize(&bytes).unwrap()
    }

    #[test]
    fn sticks_survive_the_wire() {
        let request = RemoteRequest::sticks(-500.0, 12.5, 499.0, -450.0);
        assert_eq!(roundtrip(&request), request);
    }

    #[test]
    fn status_survives_the_wire() {
        let response = DroneResponse::GyroStatus {
            rates: [1.5, -300.0, 0.0],
            overflow: true,
            calibrating: false,
            temperature: Some(41.5),
        };
        assert_eq!(roundtrip(&response), response);

        let log = DroneResponse::Log(Box::from(*b"gyro calibrated"));
        assert_eq!(roundtrip(&log), log);
    }

    #[test]
    fn requests_fit_an_esp_now_frame() {
        // ESP-NOW v1 payload limit
        const MAX_PAYLOAD: usize = 250;
        let request = RemoteRequest::Modes {
            self_leveling: true,
            stick_commands_disabled: false,
        };
        assert!(wincode::serialize(&request).unwrap().len() <= MAX_PAYLOAD);
        let sticks = RemoteRequest::sticks(0.0, 0.0, 0.0, 0.0);
        assert!(wincode::serialize(&sticks).unwrap().len() <= MAX_PAYLOAD);
    }
}
