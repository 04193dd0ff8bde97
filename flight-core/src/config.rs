//! Read-only configuration for the gyro pipeline and the RC controls.
//!
//! Persistence is someone else's problem; these are plain values with the
//! firmware defaults baked into their `Default` impls.

pub const LPF_MAX_HZ: u16 = 1000;

pub const GYRO_LPF1_TYPE_DEFAULT: LowpassType = LowpassType::Pt1;
pub const GYRO_LPF1_HZ_DEFAULT: u16 = 100;
pub const GYRO_LPF1_DYN_MIN_HZ_DEFAULT: u16 = 0;
pub const GYRO_LPF1_DYN_MAX_HZ_DEFAULT: u16 = 0;

pub const GYRO_LPF2_TYPE_DEFAULT: LowpassType = LowpassType::None;
pub const GYRO_LPF2_HZ_DEFAULT: u16 = 50;

pub const MAX_DYNAMIC_NOTCHES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LowpassType {
    None,
    Pt1,
    Pt2,
    Pt3,
    Biquad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LowpassConfig {
    pub kind: LowpassType,
    pub hz: u16,
}

impl LowpassConfig {
    pub const DISABLED: Self = Self {
        kind: LowpassType::None,
        hz: 0,
    };

    pub const fn is_enabled(&self) -> bool {
        !matches!(self.kind, LowpassType::None) && self.hz > 0
    }
}

/// Static notch: `cutoff_hz` is the lower edge of the rejected band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotchConfig {
    pub center_hz: u16,
    pub cutoff_hz: u16,
}

impl NotchConfig {
    pub const fn is_enabled(&self) -> bool {
        self.center_hz > 0 && self.cutoff_hz > 0
    }
}

/// Throttle-tracking retune of lowpass 1. Disabled while either bound is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DynamicLowpassConfig {
    pub min_hz: u16,
    pub max_hz: u16,
}

impl DynamicLowpassConfig {
    pub const fn is_enabled(&self) -> bool {
        self.min_hz > 0 && self.max_hz > 0
    }
}

/// Notches retuned at runtime by an external spectral estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DynamicNotchConfig {
    pub count: u8,
    /// Quality factor times 100.
    pub q: u16,
    pub min_hz: u16,
    pub max_hz: u16,
}

impl DynamicNotchConfig {
    pub const fn is_enabled(&self) -> bool {
        self.count > 0 && self.q > 0 && self.max_hz > 0
    }
}

impl Default for DynamicNotchConfig {
    fn default() -> Self {
        Self {
            count: 0,
            q: 300,
            min_hz: 100,
            max_hz: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterConfig {
    pub lowpass1: LowpassConfig,
    pub lowpass2: LowpassConfig,
    pub notch1: NotchConfig,
    pub notch2: NotchConfig,
    pub dynamic_lowpass: DynamicLowpassConfig,
    pub dynamic_notch: DynamicNotchConfig,
}

impl FilterConfig {
    /// Every stage disabled, the chain is a pure passthrough.
    pub const PASSTHROUGH: Self = Self {
        lowpass1: LowpassConfig::DISABLED,
        lowpass2: LowpassConfig::DISABLED,
        notch1: NotchConfig {
            center_hz: 0,
            cutoff_hz: 0,
        },
        notch2: NotchConfig {
            center_hz: 0,
            cutoff_hz: 0,
        },
        dynamic_lowpass: DynamicLowpassConfig {
            min_hz: 0,
            max_hz: 0,
        },
        dynamic_notch: DynamicNotchConfig {
            count: 0,
            q: 300,
            min_hz: 100,
            max_hz: 600,
        },
    };
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lowpass1: LowpassConfig {
                kind: GYRO_LPF1_TYPE_DEFAULT,
                hz: GYRO_LPF1_HZ_DEFAULT,
            },
            lowpass2: LowpassConfig {
                kind: GYRO_LPF2_TYPE_DEFAULT,
                hz: GYRO_LPF2_HZ_DEFAULT,
            },
            notch1: NotchConfig::default(),
            notch2: NotchConfig::default(),
            dynamic_lowpass: DynamicLowpassConfig {
                min_hz: GYRO_LPF1_DYN_MIN_HZ_DEFAULT,
                max_hz: GYRO_LPF1_DYN_MAX_HZ_DEFAULT,
            },
            dynamic_notch: DynamicNotchConfig::default(),
        }
    }
}

/// Names a filter stage in configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterSlot {
    Decimation,
    Lowpass1,
    Lowpass2,
    Notch1,
    Notch2,
    DynamicLowpass,
    DynamicNotch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroToUse {
    First,
    Second,
    /// Average across every healthy device.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverflowCheck {
    None,
    Yaw,
    AllAxes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GyroDebugMode {
    None,
    Raw,
    Scaled,
    Filtered,
    DualRaw,
    DualDiff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GyroConfig {
    pub sample_rate_hz: u16,
    pub filter_rate_hz: u16,
    /// Rate of the consumer (PID loop) reading the filtered signal.
    pub target_rate_hz: u16,
    /// Full-scale range reported by the device.
    pub range_dps: u16,
    pub gyro_to_use: GyroToUse,
    /// In 1/100 s.
    pub calibration_duration: u16,
    /// Maximum standard deviation (dps) accepted at the end of a calibration
    /// window. Zero accepts anything.
    pub movement_threshold: u8,
    /// Added to the latched yaw zero, in 1/100 dps.
    pub offset_yaw: i16,
    pub overflow_check: OverflowCheck,
    /// Anti-alias lowpass at the sample rate ahead of decimation, zero disables.
    pub decimation_hz: u16,
    pub filter: FilterConfig,
    pub debug_mode: GyroDebugMode,
}

impl Default for GyroConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 4000,
            filter_rate_hz: 2000,
            target_rate_hz: 1000,
            range_dps: 2000,
            gyro_to_use: GyroToUse::First,
            calibration_duration: 125,
            movement_threshold: 48,
            offset_yaw: 0,
            overflow_check: OverflowCheck::AllAxes,
            decimation_hz: 0,
            filter: FilterConfig::default(),
            debug_mode: GyroDebugMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorPresence {
    pub acc: bool,
    pub mag: bool,
    pub baro: bool,
    pub gps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcControlsConfig {
    pub stick_arming_enabled: bool,
    /// An arm switch is mapped on the receiver; it always wins over sticks.
    pub arm_switch_configured: bool,
    pub stick_commands_enabled: bool,
    pub gyro_cal_on_first_arm: bool,
    /// Seconds of low throttle before an idle craft disarms itself.
    pub auto_disarm_delay_s: u8,
    pub motor_stop: bool,
    pub sensors: SensorPresence,
}

impl RcControlsConfig {
    pub const fn uses_sticks_for_arming(&self) -> bool {
        !self.arm_switch_configured && self.stick_arming_enabled
    }

    pub const fn uses_stick_commands(&self) -> bool {
        self.stick_commands_enabled
    }
}

impl Default for RcControlsConfig {
    fn default() -> Self {
        Self {
            stick_arming_enabled: false,
            arm_switch_configured: true,
            stick_commands_enabled: true,
            gyro_cal_on_first_arm: false,
            auto_disarm_delay_s: 5,
            motor_stop: false,
            sensors: SensorPresence::default(),
        }
    }
}
