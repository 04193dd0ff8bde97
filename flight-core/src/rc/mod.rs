//! Pilot stick handling: gesture decoding, arming and stick commands.

mod controls;
mod sticks;

pub use controls::{
    ARM_DELAY_MS, Absent, ArmingControl, ArmingDisableFlags, Beeper, BeeperMode,
    CAMERA_MENU_HOLD_MS, CAMERA_REPEAT_MS, CameraControl, CameraKey, Dashboard, DisarmReason,
    FlightStatus, Peripherals, ProfileControl, RcControls, RcModes, RollPitchTrims,
    STICK_AUTOREPEAT_MS, STICK_DELAY_MS, SWITCH_DISARM_TICKS, SensorCalibration, VtxControl,
};
pub use sticks::{
    CHANNEL_PITCH, CHANNEL_ROLL, CHANNEL_THROTTLE, CHANNEL_YAW, HOLD_CAP_MS, STICK_COMMAND_MAX,
    STICK_COMMAND_MIN, StickChannels, StickCode, StickGestureDecoder, StickPosition,
    sticks_in_ap_mode_position,
};
