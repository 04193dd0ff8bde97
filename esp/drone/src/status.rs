//! Arm state, profiles and beeps owned by the flight loop.

use common_messages::DroneResponse;
use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use flight_core::rc::{
    ArmingControl, ArmingDisableFlags, Beeper, BeeperMode, DisarmReason, ProfileControl,
    RollPitchTrims, SensorCalibration,
};
use flight_core::RcControlsConfig;

use crate::link::RESPONSES_LEN;

pub type ResponseSender = Sender<'static, CriticalSectionRawMutex, DroneResponse, RESPONSES_LEN>;

pub const PID_PROFILE_COUNT: u8 = 3;
pub const RATE_PROFILE_COUNT: u8 = 4;

/// Inputs that decide [`ArmingDisableFlags`], sampled once per RC tick.
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct ArmingInputs {
    pub gyro_missing: bool,
    pub gyro_calibrating: bool,
    pub link_up: bool,
    pub remote_failsafe: bool,
    pub throttle_low: bool,
}

pub struct FlightState {
    armed: bool,
    was_ever_armed: bool,
    trying_to_arm: bool,
    /// Raised by a refused switch arm, cleared once the switch goes off.
    arm_switch_latched: bool,
    arm_switch: bool,
    gyro_cal_on_first_arm: bool,
    disable_flags: ArmingDisableFlags,
    calibration_request: Option<bool>,
    pid_profile: u8,
    rate_profile: u8,
    trims: RollPitchTrims,
    responses: ResponseSender,
}

impl FlightState {
    pub fn new(config: &RcControlsConfig, responses: ResponseSender) -> Self {
        Self {
            armed: false,
            was_ever_armed: false,
            trying_to_arm: false,
            arm_switch_latched: false,
            arm_switch: !config.uses_sticks_for_arming(),
            gyro_cal_on_first_arm: config.gyro_cal_on_first_arm,
            disable_flags: ArmingDisableFlags::CALIBRATING,
            calibration_request: None,
            pid_profile: 0,
            rate_profile: 0,
            trims: RollPitchTrims::default(),
            responses,
        }
    }

    pub fn update_arming_disable_flags(&mut self, inputs: ArmingInputs) {
        let mut flags = ArmingDisableFlags::empty();
        flags.set(ArmingDisableFlags::NO_GYRO, inputs.gyro_missing);
        flags.set(ArmingDisableFlags::CALIBRATING, inputs.gyro_calibrating);
        flags.set(ArmingDisableFlags::RX_FAILSAFE, !inputs.link_up);
        flags.set(ArmingDisableFlags::FAILSAFE, inputs.remote_failsafe);
        flags.set(ArmingDisableFlags::THROTTLE, !self.armed && !inputs.throttle_low);
        flags.set(ArmingDisableFlags::ARM_SWITCH, self.arm_switch_latched);

        if flags != self.disable_flags {
            info!("arming disable flags: {}", flags);
            self.disable_flags = flags;
            self.publish_arm_state();
        }
    }

    /// Hands out a pending gyro calibration request once.
    pub fn take_calibration_request(&mut self) -> Option<bool> {
        self.calibration_request.take()
    }

    pub fn publish_arm_state(&self) {
        self.send(DroneResponse::ArmState {
            armed: self.armed,
            disable_flags: self.disable_flags.bits(),
        });
    }

    pub fn send(&self, response: DroneResponse) {
        if self.responses.try_send(response).is_err() {
            warn!("response queue full, dropping");
        }
    }
}

impl ArmingControl for FlightState {
    fn try_arm(&mut self) {
        if self.armed {
            return;
        }

        if self.gyro_cal_on_first_arm && !self.was_ever_armed && !self.trying_to_arm {
            info!("first arm: recalibrating gyro");
            self.calibration_request = Some(true);
            self.disable_flags = ArmingDisableFlags::CALIBRATING;
            self.trying_to_arm = true;
            return;
        }

        if !self.disable_flags.is_empty() {
            if !self.trying_to_arm && !self.arm_switch_latched {
                warn!("arming refused: {}", self.disable_flags);
            }
            // a switch left on has to be cycled before it may arm
            self.arm_switch_latched = self.arm_switch && !self.trying_to_arm;
            return;
        }

        info!("armed");
        self.armed = true;
        self.was_ever_armed = true;
        self.trying_to_arm = false;
        self.publish_arm_state();
    }

    fn disarm(&mut self, reason: DisarmReason) {
        if !self.armed {
            return;
        }
        info!("disarmed: {}", reason);
        self.armed = false;
        self.publish_arm_state();
    }

    fn reset_trying_to_arm(&mut self) {
        self.trying_to_arm = false;
    }

    fn reset_arming_disabled(&mut self) {
        self.arm_switch_latched = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    fn is_trying_to_arm(&self) -> bool {
        self.trying_to_arm
    }

    fn arming_disable_flags(&self) -> ArmingDisableFlags {
        self.disable_flags
    }
}

impl SensorCalibration for FlightState {
    fn start_gyro_calibration(&mut self, first_arming: bool) {
        self.calibration_request = Some(first_arming);
    }

    // No accelerometer, magnetometer, barometer or GPS on this airframe.
    fn start_acc_calibration(&mut self) {}
    fn start_mag_calibration(&mut self) {}
    fn set_baro_ground_level(&mut self) {}
    fn reset_gps_home(&mut self) {}
}

impl ProfileControl for FlightState {
    fn select_pid_profile(&mut self, index: u8) {
        if index < PID_PROFILE_COUNT && index != self.pid_profile {
            info!("pid profile {}", index + 1);
            self.pid_profile = index;
        }
        self.beep(BeeperMode::Confirmation(index + 1));
    }

    fn select_rate_profile(&mut self, index: u8) {
        if index < RATE_PROFILE_COUNT && index != self.rate_profile {
            info!("rate profile {}", index + 1);
            self.rate_profile = index;
        }
        self.beep(BeeperMode::Confirmation(index + 1));
    }

    fn apply_trim_delta(&mut self, delta: RollPitchTrims) {
        self.trims.roll = self.trims.roll.saturating_add(delta.roll);
        self.trims.pitch = self.trims.pitch.saturating_add(delta.pitch);
        info!("trims {}", self.trims);
    }

    // Settings live in RAM only; the beep still confirms the gesture.
    fn save_config_and_notify(&mut self) {
        info!(
            "save requested: pid {}, rate {}, trims {}",
            self.pid_profile, self.rate_profile, self.trims
        );
        self.beep(BeeperMode::Confirmation(1));
    }
}

impl Beeper for FlightState {
    fn beep(&mut self, mode: BeeperMode) {
        let count = match mode {
            BeeperMode::DisarmRepeat => 0,
            BeeperMode::Confirmation(count) => count,
        };
        self.send(DroneResponse::Beep(count));
    }
}
