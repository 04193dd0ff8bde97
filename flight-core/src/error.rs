use crate::config::FilterSlot;

/// Configuration rejected while building the pipeline or its filters.
///
/// The real-time path never produces these; they only come out of
/// construction and reconfiguration.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,

    #[error("filter rate {filter_hz} Hz exceeds sample rate {sample_hz} Hz")]
    FilterRateAboveSampleRate { sample_hz: u16, filter_hz: u16 },

    #[error("target rate {target_hz} Hz must be in 1..={filter_hz} Hz")]
    InvalidTargetRate { filter_hz: u16, target_hz: u16 },

    #[error("{slot:?} cutoff {hz} Hz is at or above Nyquist ({nyquist_hz} Hz)")]
    AboveNyquist {
        slot: FilterSlot,
        hz: u16,
        nyquist_hz: u16,
    },

    #[error("{slot:?} cutoff {hz} Hz exceeds the {max_hz} Hz lowpass limit")]
    LowpassAboveMax {
        slot: FilterSlot,
        hz: u16,
        max_hz: u16,
    },

    #[error("{slot:?} cutoff {cutoff_hz} Hz must be below its center {center_hz} Hz")]
    NotchCutoffNotBelowCenter {
        slot: FilterSlot,
        center_hz: u16,
        cutoff_hz: u16,
    },

    #[error("dynamic range min {min_hz} Hz exceeds max {max_hz} Hz")]
    DynamicRangeInverted { min_hz: u16, max_hz: u16 },

    #[error("{count} dynamic notches requested, at most {max} supported")]
    TooManyDynamicNotches { count: u8, max: u8 },

    #[error("gyro range must be non-zero")]
    ZeroGyroRange,

    #[error("calibration duration must be non-zero")]
    ZeroCalibrationDuration,
}
