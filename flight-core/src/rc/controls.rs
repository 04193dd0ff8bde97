//! Arm/disarm handling and stick command gestures.

use bitflags::bitflags;

use super::sticks::{StickChannels, StickCode, StickGestureDecoder, StickPosition};
use crate::config::RcControlsConfig;

pub const ARM_DELAY_MS: i32 = 500;
pub const STICK_DELAY_MS: i32 = 50;
pub const STICK_AUTOREPEAT_MS: i32 = 250;
pub const CAMERA_REPEAT_MS: i32 = 3 * STICK_DELAY_MS;
/// Long press used to open the camera OSD menu.
pub const CAMERA_MENU_HOLD_MS: u16 = 2000;

/// Consecutive inactive-switch evaluations tolerated before disarming.
pub const SWITCH_DISARM_TICKS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisarmReason {
    Switch,
    Sticks,
    Timeout,
}

bitflags! {
    /// Conditions that currently refuse arming. Owned by the flight status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ArmingDisableFlags: u32 {
        const NO_GYRO = 1 << 0;
        const FAILSAFE = 1 << 1;
        const RX_FAILSAFE = 1 << 2;
        const BAD_RX_RECOVERY = 1 << 3;
        const THROTTLE = 1 << 4;
        const ANGLE = 1 << 5;
        const BOOT_GRACE_TIME = 1 << 6;
        const CALIBRATING = 1 << 7;
        const CLI = 1 << 8;
        const ARM_SWITCH = 1 << 9;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ArmingDisableFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ArmingDisableFlags({=u32:#x})", self.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeeperMode {
    /// Tone repeated while the disarm gesture is held on the ground.
    DisarmRepeat,
    Confirmation(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CameraKey {
    Enter,
    Left,
    Up,
    Right,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RollPitchTrims {
    pub roll: i16,
    pub pitch: i16,
}

/// Receiver-derived mode state sampled each RC tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcModes {
    pub arm_switch: bool,
    pub stick_commands_disabled: bool,
    /// Angle or horizon mode.
    pub self_leveling: bool,
    pub rx_signal: bool,
    pub failsafe_active: bool,
}

/// The owner of the armed state and its disable reasons.
pub trait ArmingControl {
    fn try_arm(&mut self);
    fn disarm(&mut self, reason: DisarmReason);
    fn reset_trying_to_arm(&mut self);
    fn reset_arming_disabled(&mut self);
    fn is_armed(&self) -> bool;
    fn is_trying_to_arm(&self) -> bool;
    fn arming_disable_flags(&self) -> ArmingDisableFlags;
}

pub trait SensorCalibration {
    fn start_gyro_calibration(&mut self, first_arming: bool);
    fn start_acc_calibration(&mut self);
    fn start_mag_calibration(&mut self);
    fn set_baro_ground_level(&mut self);
    fn reset_gps_home(&mut self);
}

pub trait ProfileControl {
    fn select_pid_profile(&mut self, index: u8);
    fn select_rate_profile(&mut self, index: u8);
    fn apply_trim_delta(&mut self, delta: RollPitchTrims);
    fn save_config_and_notify(&mut self);
}

pub trait Beeper {
    fn beep(&mut self, mode: BeeperMode);
}

pub trait Dashboard {
    fn set_page_cycling(&mut self, enabled: bool);
}

pub trait VtxControl {
    fn step_band(&mut self, up: bool);
    fn step_channel(&mut self, up: bool);
}

pub trait CameraControl {
    fn key_press(&mut self, key: CameraKey, hold_ms: u16);
}

/// Everything the flight status side has to offer the stick logic.
pub trait FlightStatus: ArmingControl + SensorCalibration + ProfileControl + Beeper {}

impl<T: ArmingControl + SensorCalibration + ProfileControl + Beeper + ?Sized> FlightStatus for T {}

/// Optional hardware driven by stick commands.
pub trait Peripherals: Dashboard + VtxControl + CameraControl {}

impl<T: Dashboard + VtxControl + CameraControl + ?Sized> Peripherals for T {}

/// Stand-in for hardware that is not fitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl Dashboard for Absent {
    fn set_page_cycling(&mut self, _enabled: bool) {}
}

impl VtxControl for Absent {
    fn step_band(&mut self, _up: bool) {}
    fn step_channel(&mut self, _up: bool) {}
}

impl CameraControl for Absent {
    fn key_press(&mut self, _key: CameraKey, _hold_ms: u16) {}
}

#[derive(Debug, Clone)]
pub struct RcControls {
    config: RcControlsConfig,
    sticks_for_arming: bool,
    decoder: StickGestureDecoder,
    disarm_ticks: u8,
    trim_save_pending: bool,
    low_throttle_ms: u32,
}

impl RcControls {
    /// Stick or switch arming is settled here for the life of the value.
    pub fn new(config: &RcControlsConfig) -> Self {
        let sticks_for_arming = config.uses_sticks_for_arming();
        info!(
            "rc controls: stick arming {}, stick commands {}",
            sticks_for_arming,
            config.uses_stick_commands()
        );
        Self {
            config: *config,
            sticks_for_arming,
            decoder: StickGestureDecoder::default(),
            disarm_ticks: 0,
            trim_save_pending: false,
            low_throttle_ms: 0,
        }
    }

    pub fn is_using_sticks_for_arming(&self) -> bool {
        self.sticks_for_arming
    }

    pub fn decoder(&self) -> &StickGestureDecoder {
        &self.decoder
    }

    pub fn is_trim_save_pending(&self) -> bool {
        self.trim_save_pending
    }

    /// One RC tick. `elapsed_ms` is the time since the previous call.
    pub fn process_stick_positions(
        &mut self,
        channels: &StickChannels,
        elapsed_ms: u32,
        modes: &RcModes,
        status: &mut impl FlightStatus,
        peripherals: &mut impl Peripherals,
    ) {
        let (code, hold_ms) = self.decoder.sample(channels, elapsed_ms);
        self.check_auto_disarm(code, elapsed_ms, status);

        if !self.sticks_for_arming {
            self.process_arm_switch(modes, status);
        } else if code == StickCode::DISARM {
            self.process_disarm_sticks(hold_ms, status);
            return;
        } else if code == StickCode::ARM && !modes.stick_commands_disabled {
            self.process_arm_sticks(hold_ms, status);
            return;
        } else {
            status.reset_trying_to_arm();
        }

        if status.is_armed() || self.decoder.is_locked() || hold_ms <= STICK_DELAY_MS {
            return;
        }
        self.decoder.lock();

        if !self.config.uses_stick_commands() {
            return;
        }
        self.process_commands(code, modes, status, peripherals);
    }

    fn process_arm_switch(&mut self, modes: &RcModes, status: &mut impl FlightStatus) {
        if modes.arm_switch {
            self.disarm_ticks = 0;
            status.try_arm();
            return;
        }

        status.reset_trying_to_arm();
        status.reset_arming_disabled();
        if status.is_armed() && modes.rx_signal && !modes.failsafe_active {
            self.disarm_ticks = self.disarm_ticks.saturating_add(1);
            if self.disarm_ticks > SWITCH_DISARM_TICKS {
                info!("disarm: switch");
                status.disarm(DisarmReason::Switch);
                self.disarm_ticks = 0;
            }
        }
    }

    fn process_disarm_sticks(&mut self, hold_ms: i32, status: &mut impl FlightStatus) {
        if hold_ms < ARM_DELAY_MS || self.decoder.is_locked() {
            return;
        }
        self.decoder.lock();
        status.reset_trying_to_arm();
        if status.is_armed() {
            info!("disarm: sticks");
            status.disarm(DisarmReason::Sticks);
        } else {
            status.beep(BeeperMode::DisarmRepeat);
        }
        // held on: the tone repeats, disarm cannot fire twice
        self.decoder.repeat_after(STICK_AUTOREPEAT_MS);
    }

    fn process_arm_sticks(&mut self, hold_ms: i32, status: &mut impl FlightStatus) {
        if hold_ms < ARM_DELAY_MS || self.decoder.is_locked() {
            return;
        }
        self.decoder.lock();
        if status.is_armed() {
            status.reset_arming_disabled();
            return;
        }

        status.try_arm();
        let waiting_on_calibration = self.config.gyro_cal_on_first_arm
            && status.arming_disable_flags() == ArmingDisableFlags::CALIBRATING;
        if status.is_trying_to_arm() || waiting_on_calibration {
            // keep retrying while the gesture is held
            self.decoder.unlock();
        }
    }

    fn check_auto_disarm(
        &mut self,
        code: StickCode,
        elapsed_ms: u32,
        status: &mut impl FlightStatus,
    ) {
        let delay_ms = self.config.auto_disarm_delay_s as u32 * 1000;
        let enabled = self.sticks_for_arming && self.config.motor_stop && delay_ms > 0;
        if !enabled || !status.is_armed() || code.throttle != StickPosition::Low {
            self.low_throttle_ms = 0;
            return;
        }

        self.low_throttle_ms = self.low_throttle_ms.saturating_add(elapsed_ms);
        if self.low_throttle_ms > delay_ms {
            info!("disarm: throttle low for {} ms", self.low_throttle_ms);
            status.disarm(DisarmReason::Timeout);
            self.low_throttle_ms = 0;
        }
    }

    fn process_commands(
        &mut self,
        code: StickCode,
        modes: &RcModes,
        status: &mut impl FlightStatus,
        peripherals: &mut impl Peripherals,
    ) {
        let sensors = self.config.sensors;

        if code == StickCode::GYRO_CALIBRATION {
            info!("stick command: gyro calibration");
            status.start_gyro_calibration(false);
            if sensors.gps {
                status.reset_gps_home();
            }
            if sensors.baro {
                status.set_baro_ground_level();
            }
            return;
        }

        let pid_profile = match code {
            StickCode::PID_PROFILE_1 => Some(0),
            StickCode::PID_PROFILE_2 => Some(1),
            StickCode::PID_PROFILE_3 => Some(2),
            _ => None,
        };
        if let Some(index) = pid_profile {
            info!("stick command: pid profile {}", index);
            status.select_pid_profile(index);
            return;
        }

        if code == StickCode::SAVE_CONFIG {
            info!("stick command: save");
            status.save_config_and_notify();
        }

        if code == StickCode::ACC_CALIBRATION && sensors.acc {
            status.start_acc_calibration();
            return;
        }

        if code == StickCode::MAG_CALIBRATION && sensors.mag {
            status.start_mag_calibration();
            return;
        }

        if modes.self_leveling {
            if self.trim_save_pending && code.throttle != StickPosition::High {
                status.save_config_and_notify();
                self.trim_save_pending = false;
                return;
            }

            let delta = match code {
                StickCode::TRIM_PITCH_UP => Some(RollPitchTrims { roll: 0, pitch: 1 }),
                StickCode::TRIM_PITCH_DOWN => Some(RollPitchTrims { roll: 0, pitch: -1 }),
                StickCode::TRIM_ROLL_RIGHT => Some(RollPitchTrims { roll: 1, pitch: 0 }),
                StickCode::TRIM_ROLL_LEFT => Some(RollPitchTrims { roll: -1, pitch: 0 }),
                _ => None,
            };
            if let Some(delta) = delta {
                debug!("stick command: trim {} {}", delta.roll, delta.pitch);
                status.apply_trim_delta(delta);
                self.trim_save_pending = true;
                status.beep(BeeperMode::Confirmation(1));
                self.decoder.repeat_after(STICK_AUTOREPEAT_MS);
                return;
            }
        } else {
            let rate_profile = match code {
                StickCode::TRIM_PITCH_UP => Some(0),
                StickCode::TRIM_PITCH_DOWN => Some(1),
                StickCode::TRIM_ROLL_RIGHT => Some(2),
                StickCode::TRIM_ROLL_LEFT => Some(3),
                _ => None,
            };
            if let Some(index) = rate_profile {
                info!("stick command: rate profile {}", index);
                status.select_rate_profile(index);
                return;
            }
        }

        match code {
            StickCode::DASHBOARD_PAGING_OFF => peripherals.set_page_cycling(false),
            StickCode::DASHBOARD_PAGING_ON => peripherals.set_page_cycling(true),
            StickCode::VTX_BAND_UP => peripherals.step_band(true),
            StickCode::VTX_BAND_DOWN => peripherals.step_band(false),
            StickCode::VTX_CHANNEL_UP => peripherals.step_channel(true),
            StickCode::VTX_CHANNEL_DOWN => peripherals.step_channel(false),
            _ => {}
        }

        let camera_key = match code {
            StickCode::CAMERA_ENTER => Some(CameraKey::Enter),
            StickCode::CAMERA_LEFT => Some(CameraKey::Left),
            StickCode::CAMERA_UP => Some(CameraKey::Up),
            StickCode::CAMERA_RIGHT => Some(CameraKey::Right),
            StickCode::CAMERA_DOWN => Some(CameraKey::Down),
            _ => None,
        };
        if let Some(key) = camera_key {
            peripherals.key_press(key, 0);
            self.decoder.repeat_after(CAMERA_REPEAT_MS);
        } else if code == StickCode::CAMERA_MENU {
            peripherals.key_press(CameraKey::Up, CAMERA_MENU_HOLD_MS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOW: f32 = -500.0;
    const HIGH: f32 = 500.0;

    #[derive(Default)]
    struct Status {
        armed: bool,
        trying: bool,
        flags: ArmingDisableFlags,
        disarms: Vec<DisarmReason>,
        beeps: Vec<BeeperMode>,
        gyro_cals: u32,
        pid_profiles: Vec<u8>,
        rate_profiles: Vec<u8>,
        trims: Vec<RollPitchTrims>,
        saves: u32,
    }

    impl ArmingControl for Status {
        fn try_arm(&mut self) {
            if self.flags.is_empty() {
                self.armed = true;
                self.trying = false;
            } else {
                self.trying = true;
            }
        }
        fn disarm(&mut self, reason: DisarmReason) {
            self.armed = false;
            self.disarms.push(reason);
        }
        fn reset_trying_to_arm(&mut self) {
            self.trying = false;
        }
        fn reset_arming_disabled(&mut self) {}
        fn is_armed(&self) -> bool {
            self.armed
        }
        fn is_trying_to_arm(&self) -> bool {
            self.trying
        }
        fn arming_disable_flags(&self) -> ArmingDisableFlags {
            self.flags
        }
    }

    impl SensorCalibration for Status {
        fn start_gyro_calibration(&mut self, _first_arming: bool) {
            self.gyro_cals += 1;
        }
        fn start_acc_calibration(&mut self) {}
        fn start_mag_calibration(&mut self) {}
        fn set_baro_ground_level(&mut self) {}
        fn reset_gps_home(&mut self) {}
    }

    impl ProfileControl for Status {
        fn select_pid_profile(&mut self, index: u8) {
            self.pid_profiles.push(index);
        }
        fn select_rate_profile(&mut self, index: u8) {
            self.rate_profiles.push(index);
        }
        fn apply_trim_delta(&mut self, delta: RollPitchTrims) {
            self.trims.push(delta);
        }
        fn save_config_and_notify(&mut self) {
            self.saves += 1;
        }
    }

    impl Beeper for Status {
        fn beep(&mut self, mode: BeeperMode) {
            self.beeps.push(mode);
        }
    }

    fn stick_config() -> RcControlsConfig {
        RcControlsConfig {
            stick_arming_enabled: true,
            arm_switch_configured: false,
            ..RcControlsConfig::default()
        }
    }

    fn tick(
        rc: &mut RcControls,
        channels: StickChannels,
        elapsed_ms: u32,
        modes: &RcModes,
        status: &mut Status,
    ) {
        rc.process_stick_positions(&channels, elapsed_ms, modes, status, &mut Absent);
    }

    #[test]
    fn arming_mode_is_fixed_at_construction() {
        assert!(!RcControls::new(&RcControlsConfig::default()).is_using_sticks_for_arming());
        assert!(RcControls::new(&stick_config()).is_using_sticks_for_arming());
    }

    #[test]
    fn switch_arm_honours_disable_flags() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status {
            flags: ArmingDisableFlags::THROTTLE,
            ..Status::default()
        };
        let modes = RcModes {
            arm_switch: true,
            ..RcModes::default()
        };
        tick(&mut rc, [0.0; 4], 20, &modes, &mut status);
        assert!(!status.armed);
        assert!(status.trying);
    }

    #[test]
    fn switch_disarm_ignored_without_signal() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status {
            armed: true,
            ..Status::default()
        };
        let modes = RcModes {
            rx_signal: false,
            ..RcModes::default()
        };
        for _ in 0..10 {
            tick(&mut rc, [0.0; 4], 20, &modes, &mut status);
        }
        assert!(status.armed);
    }

    #[test]
    fn arm_gesture_retries_while_waiting_on_calibration() {
        let config = RcControlsConfig {
            gyro_cal_on_first_arm: true,
            ..stick_config()
        };
        let mut rc = RcControls::new(&config);
        let mut status = Status {
            flags: ArmingDisableFlags::CALIBRATING,
            ..Status::default()
        };
        let arm = [0.0, 0.0, HIGH, LOW];
        let modes = RcModes::default();
        for _ in 0..30 {
            tick(&mut rc, arm, 20, &modes, &mut status);
        }
        assert!(!rc.decoder().is_locked());

        status.flags = ArmingDisableFlags::empty();
        tick(&mut rc, arm, 20, &modes, &mut status);
        assert!(status.armed);
        assert!(rc.decoder().is_locked());
    }

    #[test]
    fn arm_gesture_suppressed_by_stick_command_disable() {
        let mut rc = RcControls::new(&stick_config());
        let mut status = Status::default();
        let modes = RcModes {
            stick_commands_disabled: true,
            ..RcModes::default()
        };
        for _ in 0..40 {
            tick(&mut rc, [0.0, 0.0, HIGH, LOW], 20, &modes, &mut status);
        }
        assert!(!status.armed);
    }

    #[test]
    fn no_commands_while_armed() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status {
            armed: true,
            ..Status::default()
        };
        let modes = RcModes {
            arm_switch: true,
            ..RcModes::default()
        };
        for _ in 0..20 {
            tick(&mut rc, [0.0, LOW, LOW, LOW], 20, &modes, &mut status);
        }
        assert_eq!(status.gyro_cals, 0);
    }

    #[test]
    fn gyro_calibration_gesture_fires_once() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status::default();
        let modes = RcModes::default();
        for _ in 0..20 {
            tick(&mut rc, [0.0, LOW, LOW, LOW], 20, &modes, &mut status);
        }
        assert_eq!(status.gyro_cals, 1);
    }

    #[test]
    fn commands_wait_past_the_stick_delay() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status::default();
        let modes = RcModes::default();
        let gesture = [LOW, 0.0, LOW, LOW];
        tick(&mut rc, gesture, 0, &modes, &mut status);
        tick(&mut rc, gesture, 50, &modes, &mut status);
        assert!(status.pid_profiles.is_empty());
        tick(&mut rc, gesture, 1, &modes, &mut status);
        assert_eq!(status.pid_profiles, [0]);
    }

    #[test]
    fn disabled_stick_commands_do_nothing() {
        let config = RcControlsConfig {
            stick_commands_enabled: false,
            ..RcControlsConfig::default()
        };
        let mut rc = RcControls::new(&config);
        let mut status = Status::default();
        for _ in 0..20 {
            tick(&mut rc, [0.0, LOW, LOW, LOW], 20, &RcModes::default(), &mut status);
        }
        assert_eq!(status.gyro_cals, 0);
    }

    #[test]
    fn trims_repeat_and_save_on_release() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status::default();
        let modes = RcModes {
            self_leveling: true,
            ..RcModes::default()
        };
        let pitch_up = [0.0, HIGH, 0.0, HIGH];
        tick(&mut rc, pitch_up, 0, &modes, &mut status);
        // first nudge past 50 ms, then one per 250 ms of hold
        for _ in 0..12 {
            tick(&mut rc, pitch_up, 50, &modes, &mut status);
        }
        assert_eq!(status.trims.len(), 3);
        assert!(status.trims.iter().all(|t| *t == RollPitchTrims { roll: 0, pitch: 1 }));
        assert_eq!(status.beeps, [BeeperMode::Confirmation(1); 3]);
        assert_eq!(status.saves, 0);
        assert!(rc.is_trim_save_pending());

        let released = [0.0; 4];
        tick(&mut rc, released, 0, &modes, &mut status);
        tick(&mut rc, released, 60, &modes, &mut status);
        assert_eq!(status.saves, 1);
        assert!(!rc.is_trim_save_pending());
    }

    #[test]
    fn same_codes_pick_rate_profiles_in_acro() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status::default();
        let modes = RcModes::default();
        let roll_left = [LOW, 0.0, 0.0, HIGH];
        for _ in 0..10 {
            tick(&mut rc, roll_left, 20, &modes, &mut status);
        }
        assert_eq!(status.rate_profiles, [3]);
        assert!(status.trims.is_empty());
    }

    #[test]
    fn auto_disarm_after_low_throttle() {
        let config = RcControlsConfig {
            motor_stop: true,
            auto_disarm_delay_s: 1,
            ..stick_config()
        };
        let mut rc = RcControls::new(&config);
        let mut status = Status {
            armed: true,
            ..Status::default()
        };
        let idle = [0.0, 0.0, 0.0, LOW];
        for _ in 0..10 {
            tick(&mut rc, idle, 100, &RcModes::default(), &mut status);
        }
        assert!(status.armed);
        tick(&mut rc, idle, 100, &RcModes::default(), &mut status);
        assert_eq!(status.disarms, [DisarmReason::Timeout]);
    }

    #[derive(Default)]
    struct Recorder {
        paging: Vec<bool>,
        bands: Vec<bool>,
        keys: Vec<(CameraKey, u16)>,
    }

    impl Dashboard for Recorder {
        fn set_page_cycling(&mut self, enabled: bool) {
            self.paging.push(enabled);
        }
    }

    impl VtxControl for Recorder {
        fn step_band(&mut self, up: bool) {
            self.bands.push(up);
        }
        fn step_channel(&mut self, _up: bool) {}
    }

    impl CameraControl for Recorder {
        fn key_press(&mut self, key: CameraKey, hold_ms: u16) {
            self.keys.push((key, hold_ms));
        }
    }

    #[test]
    fn peripheral_gestures() {
        let mut rc = RcControls::new(&RcControlsConfig::default());
        let mut status = Status::default();
        let mut recorder = Recorder::default();
        let modes = RcModes::default();

        let mut hold =
            |channels: StickChannels, ticks: usize, rc: &mut RcControls, recorder: &mut Recorder| {
                for _ in 0..ticks {
                    rc.process_stick_positions(&channels, 20, &modes, &mut status, recorder);
                }
            };

        hold([HIGH, HIGH, 0.0, LOW], 5, &mut rc, &mut recorder);
        hold([HIGH, 0.0, LOW, HIGH], 5, &mut rc, &mut recorder);
        hold([0.0, HIGH, 0.0, LOW], 5, &mut rc, &mut recorder);
        // enter repeats every 150 ms after the first press at 60 ms
        hold([0.0, 0.0, HIGH, 0.0], 12, &mut rc, &mut recorder);

        assert_eq!(recorder.paging, [true]);
        assert_eq!(recorder.bands, [true]);
        assert_eq!(
            recorder.keys,
            [
                (CameraKey::Up, CAMERA_MENU_HOLD_MS),
                (CameraKey::Enter, 0),
                (CameraKey::Enter, 0),
            ]
        );
    }
}
