//! Stick position quantization and hold timing.

use StickPosition::{Center as CE, High as HI, Low as LO};

/// Deflection (of ±500) beyond which a stick counts as low or high.
pub const STICK_COMMAND_MIN: f32 = -450.0;
pub const STICK_COMMAND_MAX: f32 = 450.0;

/// Longest hold the decoder tracks.
pub const HOLD_CAP_MS: i32 = i16::MAX as i32;

pub const CHANNEL_ROLL: usize = 0;
pub const CHANNEL_PITCH: usize = 1;
pub const CHANNEL_YAW: usize = 2;
pub const CHANNEL_THROTTLE: usize = 3;

/// Stick deflections in roll, pitch, yaw, throttle/collective order.
pub type StickChannels = [f32; 4];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StickPosition {
    /// Neither below the high threshold nor above the low one (NaN).
    Invalid = 0,
    Low = 1,
    High = 2,
    Center = 3,
}

impl StickPosition {
    pub fn from_deflection(value: f32) -> Self {
        match (value > STICK_COMMAND_MIN, value < STICK_COMMAND_MAX) {
            (true, true) => Self::Center,
            (false, true) => Self::Low,
            (true, false) => Self::High,
            (false, false) => Self::Invalid,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            1 => Self::Low,
            2 => Self::High,
            3 => Self::Center,
            _ => Self::Invalid,
        }
    }
}

/// All four stick positions at once. Packs into one byte, two bits per stick
/// with roll in the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickCode {
    pub throttle: StickPosition,
    pub yaw: StickPosition,
    pub pitch: StickPosition,
    pub roll: StickPosition,
}

impl StickCode {
    pub const INVALID: Self = Self::new(
        StickPosition::Invalid,
        StickPosition::Invalid,
        StickPosition::Invalid,
        StickPosition::Invalid,
    );

    pub const DISARM: Self = Self::new(LO, LO, CE, CE);
    pub const ARM: Self = Self::new(LO, HI, CE, CE);

    pub const GYRO_CALIBRATION: Self = Self::new(LO, LO, LO, CE);
    pub const PID_PROFILE_1: Self = Self::new(LO, LO, CE, LO);
    pub const PID_PROFILE_2: Self = Self::new(LO, LO, HI, CE);
    pub const PID_PROFILE_3: Self = Self::new(LO, LO, CE, HI);
    pub const SAVE_CONFIG: Self = Self::new(LO, LO, LO, HI);
    pub const ACC_CALIBRATION: Self = Self::new(HI, LO, LO, CE);
    pub const MAG_CALIBRATION: Self = Self::new(HI, HI, LO, CE);

    // Trims while self-leveling, rate profiles 1-4 otherwise.
    pub const TRIM_PITCH_UP: Self = Self::new(HI, CE, HI, CE);
    pub const TRIM_PITCH_DOWN: Self = Self::new(HI, CE, LO, CE);
    pub const TRIM_ROLL_RIGHT: Self = Self::new(HI, CE, CE, HI);
    pub const TRIM_ROLL_LEFT: Self = Self::new(HI, CE, CE, LO);

    pub const DASHBOARD_PAGING_OFF: Self = Self::new(LO, CE, HI, LO);
    pub const DASHBOARD_PAGING_ON: Self = Self::new(LO, CE, HI, HI);

    pub const VTX_BAND_UP: Self = Self::new(HI, LO, CE, HI);
    pub const VTX_BAND_DOWN: Self = Self::new(HI, LO, CE, LO);
    pub const VTX_CHANNEL_UP: Self = Self::new(HI, HI, CE, HI);
    pub const VTX_CHANNEL_DOWN: Self = Self::new(HI, HI, CE, LO);

    pub const CAMERA_ENTER: Self = Self::new(CE, HI, CE, CE);
    pub const CAMERA_LEFT: Self = Self::new(CE, CE, CE, LO);
    pub const CAMERA_UP: Self = Self::new(CE, CE, HI, CE);
    pub const CAMERA_RIGHT: Self = Self::new(CE, CE, CE, HI);
    pub const CAMERA_DOWN: Self = Self::new(CE, CE, LO, CE);
    pub const CAMERA_MENU: Self = Self::new(LO, CE, HI, CE);

    pub const fn new(
        throttle: StickPosition,
        yaw: StickPosition,
        pitch: StickPosition,
        roll: StickPosition,
    ) -> Self {
        Self {
            throttle,
            yaw,
            pitch,
            roll,
        }
    }

    pub fn from_channels(channels: &StickChannels) -> Self {
        Self::new(
            StickPosition::from_deflection(channels[CHANNEL_THROTTLE]),
            StickPosition::from_deflection(channels[CHANNEL_YAW]),
            StickPosition::from_deflection(channels[CHANNEL_PITCH]),
            StickPosition::from_deflection(channels[CHANNEL_ROLL]),
        )
    }

    pub const fn bits(self) -> u8 {
        (self.roll as u8)
            | (self.pitch as u8) << 2
            | (self.yaw as u8) << 4
            | (self.throttle as u8) << 6
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self::new(
            StickPosition::from_bits(bits >> 6),
            StickPosition::from_bits(bits >> 4),
            StickPosition::from_bits(bits >> 2),
            StickPosition::from_bits(bits),
        )
    }
}

/// Tracks how long the current [`StickCode`] has been held and whether the
/// action bound to it may fire again.
#[derive(Debug, Clone, Copy)]
pub struct StickGestureDecoder {
    code: StickCode,
    // Goes negative after a repeat rewinds it.
    hold_ms: i32,
    locked: bool,
}

impl Default for StickGestureDecoder {
    fn default() -> Self {
        Self {
            code: StickCode::INVALID,
            hold_ms: 0,
            locked: false,
        }
    }
}

impl StickGestureDecoder {
    /// Quantizes `channels` and returns the code with its hold time. A new
    /// code restarts the hold at zero and lifts the repeat lockout.
    pub fn sample(&mut self, channels: &StickChannels, elapsed_ms: u32) -> (StickCode, i32) {
        let code = StickCode::from_channels(channels);
        if code == self.code {
            let elapsed = elapsed_ms.min(HOLD_CAP_MS as u32) as i32;
            self.hold_ms = (self.hold_ms + elapsed).min(HOLD_CAP_MS);
        } else {
            self.code = code;
            self.hold_ms = 0;
            self.locked = false;
        }
        (self.code, self.hold_ms)
    }

    pub fn code(&self) -> StickCode {
        self.code
    }

    pub fn hold_ms(&self) -> i32 {
        self.hold_ms
    }

    /// Blocks the current gesture from firing again until it changes.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lets the held gesture fire again once another `delay_ms` has passed.
    pub fn repeat_after(&mut self, delay_ms: i32) {
        self.hold_ms -= delay_ms;
        self.locked = false;
    }
}

/// True while roll and pitch both sit inside `deflection` of center.
pub fn sticks_in_ap_mode_position(channels: &StickChannels, deflection: f32) -> bool {
    channels[CHANNEL_ROLL].abs() < deflection && channels[CHANNEL_PITCH].abs() < deflection
}
