//! Per-axis filter chain run on the calibrated gyro signal.
//!
//! Stage order is fixed: lowpass 1, lowpass 2, notch 1, notch 2, then the
//! dynamic notches. Disabled stages are simply not in the chain, so a fully
//! disabled chain hands its input back untouched.

mod biquad;
mod decimator;
mod pt;

pub use biquad::{BUTTERWORTH_Q, Biquad, BiquadKind, notch_q};
pub use decimator::Decimator;
pub use pt::{Pt1, Pt2, Pt3, pt1_gain, pt2_gain, pt3_gain};

use crate::config::{
    FilterConfig, FilterSlot, LPF_MAX_HZ, LowpassType, MAX_DYNAMIC_NOTCHES, NotchConfig,
};
use crate::error::ConfigError;
use crate::{Rates, XYZ_AXIS_COUNT};

const MAX_STAGES: usize = 4 + MAX_DYNAMIC_NOTCHES;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStage {
    Pt1(Pt1),
    Pt2(Pt2),
    Pt3(Pt3),
    Biquad(Biquad),
}

impl FilterStage {
    pub fn lowpass(kind: LowpassType, hz: f32, dt: f32) -> Option<Self> {
        match kind {
            LowpassType::None => None,
            LowpassType::Pt1 => Some(Self::Pt1(Pt1::new(hz, dt))),
            LowpassType::Pt2 => Some(Self::Pt2(Pt2::new(hz, dt))),
            LowpassType::Pt3 => Some(Self::Pt3(Pt3::new(hz, dt))),
            LowpassType::Biquad => Some(Self::Biquad(Biquad::lowpass(hz, dt))),
        }
    }

    pub fn notch(center_hz: f32, q: f32, dt: f32) -> Self {
        Self::Biquad(Biquad::notch(center_hz, dt, q))
    }

    fn retune_lowpass(&mut self, hz: f32, dt: f32) {
        match self {
            Self::Pt1(f) => f.set_cutoff(hz, dt),
            Self::Pt2(f) => f.set_cutoff(hz, dt),
            Self::Pt3(f) => f.set_cutoff(hz, dt),
            Self::Biquad(f) => f.update(BiquadKind::Lowpass, hz, dt, BUTTERWORTH_Q),
        }
    }

    fn retune_notch(&mut self, center_hz: f32, q: f32, dt: f32) {
        if let Self::Biquad(f) = self {
            f.update(BiquadKind::Notch, center_hz, dt, q);
        }
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        match self {
            Self::Pt1(f) => f.apply(input),
            Self::Pt2(f) => f.apply(input),
            Self::Pt3(f) => f.apply(input),
            Self::Biquad(f) => f.apply(input),
        }
    }
}

// Filler for unused slots; never applied.
const UNUSED_STAGE: FilterStage = FilterStage::Pt1(Pt1::IDLE);

#[derive(Debug, Clone, Copy)]
struct Layout {
    len: usize,
    lowpass1: Option<usize>,
    dynamic_notch_start: usize,
    dynamic_notch_count: usize,
}

#[derive(Debug, Clone)]
pub struct FilterChain {
    stages: [[FilterStage; MAX_STAGES]; XYZ_AXIS_COUNT],
    layout: Layout,
    config: FilterConfig,
    dt: f32,
    dynamic_lowpass_hz: u16,
    dynamic_notch_hz: [u16; MAX_DYNAMIC_NOTCHES],
    anti_alias: Option<[Biquad; XYZ_AXIS_COUNT]>,
    decimator: Decimator,
}

impl FilterChain {
    /// A chain with no stages and no anti-alias filter.
    pub fn passthrough(filter_rate_hz: u16) -> Self {
        Self {
            stages: [[UNUSED_STAGE; MAX_STAGES]; XYZ_AXIS_COUNT],
            layout: Layout {
                len: 0,
                lowpass1: None,
                dynamic_notch_start: 0,
                dynamic_notch_count: 0,
            },
            config: FilterConfig::PASSTHROUGH,
            dt: 1.0 / filter_rate_hz.max(1) as f32,
            dynamic_lowpass_hz: 0,
            dynamic_notch_hz: [0; MAX_DYNAMIC_NOTCHES],
            anti_alias: None,
            decimator: Decimator::default(),
        }
    }

    pub fn new(config: &FilterConfig, filter_rate_hz: u16) -> Result<Self, ConfigError> {
        let mut chain = Self::passthrough(filter_rate_hz);
        chain.configure(config, filter_rate_hz)?;
        Ok(chain)
    }

    /// Rebuilds every stage from `config`. On error the previous chain is
    /// left untouched.
    pub fn configure(
        &mut self,
        config: &FilterConfig,
        filter_rate_hz: u16,
    ) -> Result<(), ConfigError> {
        validate(config, filter_rate_hz)?;

        let dt = 1.0 / filter_rate_hz as f32;
        let mut stages = [[UNUSED_STAGE; MAX_STAGES]; XYZ_AXIS_COUNT];
        let mut len = 0;

        let mut push = |stage: FilterStage, len: &mut usize| {
            for axis in stages.iter_mut() {
                axis[*len] = stage;
            }
            *len += 1;
        };

        let dynamic_lowpass = config.dynamic_lowpass.is_enabled();
        let lowpass1_hz = if dynamic_lowpass {
            config.dynamic_lowpass.min_hz
        } else {
            config.lowpass1.hz
        };

        let mut lowpass1 = None;
        if lowpass1_hz > 0 {
            let kind = config.lowpass1.kind;
            if let Some(stage) = FilterStage::lowpass(kind, lowpass1_hz as f32, dt) {
                lowpass1 = Some(len);
                push(stage, &mut len);
            }
        }

        if config.lowpass2.is_enabled() {
            let lowpass2 = config.lowpass2;
            if let Some(stage) = FilterStage::lowpass(lowpass2.kind, lowpass2.hz as f32, dt) {
                push(stage, &mut len);
            }
        }

        for notch in [config.notch1, config.notch2] {
            if notch.is_enabled() {
                let q = notch_q(notch.center_hz as f32, notch.cutoff_hz as f32);
                push(FilterStage::notch(notch.center_hz as f32, q, dt), &mut len);
            }
        }

        let dynamic_notch_start = len;
        let mut dynamic_notch_hz = [0; MAX_DYNAMIC_NOTCHES];
        let dynamic_notch_count = if config.dynamic_notch.is_enabled() {
            let q = config.dynamic_notch.q as f32 / 100.0;
            let center = config.dynamic_notch.max_hz;
            for hz in dynamic_notch_hz
                .iter_mut()
                .take(config.dynamic_notch.count as usize)
            {
                *hz = center;
                push(FilterStage::notch(center as f32, q, dt), &mut len);
            }
            config.dynamic_notch.count as usize
        } else {
            0
        };

        self.stages = stages;
        self.layout = Layout {
            len,
            lowpass1,
            dynamic_notch_start,
            dynamic_notch_count,
        };
        self.config = *config;
        self.dt = dt;
        self.dynamic_lowpass_hz = if dynamic_lowpass && lowpass1.is_some() {
            lowpass1_hz
        } else {
            0
        };
        self.dynamic_notch_hz = dynamic_notch_hz;

        debug!(
            "filter chain: {} stages at {} Hz, {} dynamic notches",
            len, filter_rate_hz, dynamic_notch_count
        );
        Ok(())
    }

    /// Anti-alias lowpass run at the sample rate before decimation.
    pub fn set_decimation_lowpass(
        &mut self,
        sample_rate_hz: u16,
        hz: u16,
    ) -> Result<(), ConfigError> {
        if hz == 0 {
            self.anti_alias = None;
            return Ok(());
        }
        if sample_rate_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        check_nyquist(FilterSlot::Decimation, hz, sample_rate_hz)?;

        let dt = 1.0 / sample_rate_hz as f32;
        self.anti_alias = Some([Biquad::lowpass(hz as f32, dt); XYZ_AXIS_COUNT]);
        Ok(())
    }

    /// Feeds one sample-rate sample into the downsampler.
    pub fn decimate(&mut self, sample: &Rates) {
        match &mut self.anti_alias {
            Some(filters) => {
                let mut smoothed = *sample;
                for (value, filter) in smoothed.iter_mut().zip(filters.iter_mut()) {
                    *value = filter.apply(*value);
                }
                self.decimator.push(&smoothed);
            }
            None => self.decimator.push(sample),
        }
    }

    /// Average of everything fed since the last call.
    pub fn take_decimated(&mut self) -> Option<Rates> {
        self.decimator.take()
    }

    pub fn reset_decimator(&mut self) {
        self.decimator.reset();
    }

    /// Runs one filter-rate sample through every configured stage.
    #[inline]
    pub fn apply(&mut self, mut sample: Rates) -> Rates {
        let len = self.layout.len;
        for (value, stages) in sample.iter_mut().zip(self.stages.iter_mut()) {
            for stage in stages[..len].iter_mut() {
                *value = stage.apply(*value);
            }
        }
        sample
    }

    pub fn stage_count(&self) -> usize {
        self.layout.len
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn dynamic_lowpass_hz(&self) -> Option<u16> {
        (self.dynamic_lowpass_hz > 0).then_some(self.dynamic_lowpass_hz)
    }

    /// Moves lowpass 1 between its dynamic bounds following `throttle`
    /// (0..=1). Returns whether the cutoff changed.
    pub fn update_dynamic_lowpass(&mut self, throttle: f32) -> bool {
        let Some(index) = self.layout.lowpass1 else {
            return false;
        };
        if self.dynamic_lowpass_hz == 0 {
            return false;
        }

        let bounds = self.config.dynamic_lowpass;
        let span = (bounds.max_hz - bounds.min_hz) as f32;
        let hz = bounds.min_hz + (span * throttle.clamp(0.0, 1.0)) as u16;
        if hz == self.dynamic_lowpass_hz {
            return false;
        }

        for axis in self.stages.iter_mut() {
            axis[index].retune_lowpass(hz as f32, self.dt);
        }
        trace!("dynamic lowpass {} -> {} Hz", self.dynamic_lowpass_hz, hz);
        self.dynamic_lowpass_hz = hz;
        true
    }

    pub fn dynamic_notch_count(&self) -> usize {
        self.layout.dynamic_notch_count
    }

    pub fn dynamic_notch_hz(&self, index: usize) -> Option<u16> {
        (index < self.layout.dynamic_notch_count).then(|| self.dynamic_notch_hz[index])
    }

    /// Entry point for the external spectral estimator. The center is clamped
    /// to the configured range; returns false for an unknown notch.
    pub fn set_dynamic_notch(&mut self, index: usize, center_hz: u16) -> bool {
        if index >= self.layout.dynamic_notch_count {
            return false;
        }
        let bounds = self.config.dynamic_notch;
        let center = center_hz.clamp(bounds.min_hz, bounds.max_hz);
        let q = bounds.q as f32 / 100.0;

        let slot = self.layout.dynamic_notch_start + index;
        for axis in self.stages.iter_mut() {
            axis[slot].retune_notch(center as f32, q, self.dt);
        }
        self.dynamic_notch_hz[index] = center;
        true
    }
}

fn check_nyquist(slot: FilterSlot, hz: u16, rate_hz: u16) -> Result<(), ConfigError> {
    let nyquist_hz = rate_hz / 2;
    if hz >= nyquist_hz {
        return Err(ConfigError::AboveNyquist {
            slot,
            hz,
            nyquist_hz,
        });
    }
    Ok(())
}

fn check_lowpass(slot: FilterSlot, hz: u16, rate_hz: u16) -> Result<(), ConfigError> {
    if hz > LPF_MAX_HZ {
        return Err(ConfigError::LowpassAboveMax {
            slot,
            hz,
            max_hz: LPF_MAX_HZ,
        });
    }
    check_nyquist(slot, hz, rate_hz)
}

fn check_notch(slot: FilterSlot, notch: &NotchConfig, rate_hz: u16) -> Result<(), ConfigError> {
    if !notch.is_enabled() {
        return Ok(());
    }
    check_nyquist(slot, notch.center_hz, rate_hz)?;
    if notch.cutoff_hz >= notch.center_hz {
        return Err(ConfigError::NotchCutoffNotBelowCenter {
            slot,
            center_hz: notch.center_hz,
            cutoff_hz: notch.cutoff_hz,
        });
    }
    Ok(())
}

fn validate(config: &FilterConfig, rate_hz: u16) -> Result<(), ConfigError> {
    if rate_hz == 0 {
        return Err(ConfigError::ZeroSampleRate);
    }

    if config.lowpass1.is_enabled() {
        check_lowpass(FilterSlot::Lowpass1, config.lowpass1.hz, rate_hz)?;
    }
    if config.lowpass2.is_enabled() {
        check_lowpass(FilterSlot::Lowpass2, config.lowpass2.hz, rate_hz)?;
    }

    let dynamic_lowpass = config.dynamic_lowpass;
    if dynamic_lowpass.is_enabled() && config.lowpass1.kind != LowpassType::None {
        if dynamic_lowpass.min_hz > dynamic_lowpass.max_hz {
            return Err(ConfigError::DynamicRangeInverted {
                min_hz: dynamic_lowpass.min_hz,
                max_hz: dynamic_lowpass.max_hz,
            });
        }
        check_lowpass(FilterSlot::DynamicLowpass, dynamic_lowpass.max_hz, rate_hz)?;
    }

    check_notch(FilterSlot::Notch1, &config.notch1, rate_hz)?;
    check_notch(FilterSlot::Notch2, &config.notch2, rate_hz)?;

    let dynamic_notch = config.dynamic_notch;
    if dynamic_notch.is_enabled() {
        if dynamic_notch.count as usize > MAX_DYNAMIC_NOTCHES {
            return Err(ConfigError::TooManyDynamicNotches {
                count: dynamic_notch.count,
                max: MAX_DYNAMIC_NOTCHES as u8,
            });
        }
        if dynamic_notch.min_hz > dynamic_notch.max_hz {
            return Err(ConfigError::DynamicRangeInverted {
                min_hz: dynamic_notch.min_hz,
                max_hz: dynamic_notch.max_hz,
            });
        }
        check_nyquist(FilterSlot::DynamicNotch, dynamic_notch.max_hz, rate_hz)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DynamicLowpassConfig, DynamicNotchConfig, LowpassConfig};
    use approx::assert_relative_eq;

    const RATE_HZ: u16 = 2000;

    #[test]
    fn disabled_chain_is_identity() {
        let mut chain = FilterChain::new(&FilterConfig::PASSTHROUGH, RATE_HZ).unwrap();
        assert_eq!(chain.stage_count(), 0);
        for sample in [[0.0, 1.0, -1.0], [1234.5, -0.001, 7.25], [f32::MAX, f32::MIN, 3.0]] {
            assert_eq!(chain.apply(sample), sample);
        }
    }

    #[test]
    fn default_config_builds_only_lowpass1() {
        let chain = FilterChain::new(&FilterConfig::default(), RATE_HZ).unwrap();
        assert_eq!(chain.stage_count(), 1);
    }

    #[test]
    fn stages_follow_enabled_slots() {
        let config = FilterConfig {
            lowpass2: LowpassConfig {
                kind: LowpassType::Biquad,
                hz: 150,
            },
            notch1: NotchConfig {
                center_hz: 260,
                cutoff_hz: 160,
            },
            dynamic_notch: DynamicNotchConfig {
                count: 2,
                ..DynamicNotchConfig::default()
            },
            ..FilterConfig::default()
        };
        let chain = FilterChain::new(&config, RATE_HZ).unwrap();
        assert_eq!(chain.stage_count(), 5);
        assert_eq!(chain.dynamic_notch_count(), 2);
    }

    #[test]
    fn decimation_is_a_running_average() {
        let mut chain = FilterChain::passthrough(RATE_HZ);
        chain.decimate(&[1.0, 10.0, -2.0]);
        chain.decimate(&[2.0, 20.0, -4.0]);
        chain.decimate(&[3.0, 30.0, -6.0]);
        chain.decimate(&[6.0, 40.0, -8.0]);
        let out = chain.take_decimated().unwrap();
        assert_relative_eq!(out[0], 3.0);
        assert_relative_eq!(out[1], 25.0);
        assert_relative_eq!(out[2], -5.0);
        assert_eq!(chain.take_decimated(), None);
    }

    #[test]
    fn rejected_config_keeps_previous_chain() {
        let mut chain = FilterChain::new(&FilterConfig::default(), RATE_HZ).unwrap();
        let bad = FilterConfig {
            lowpass1: LowpassConfig {
                kind: LowpassType::Pt1,
                hz: 1000,
            },
            ..FilterConfig::default()
        };
        assert_eq!(
            chain.configure(&bad, RATE_HZ),
            Err(ConfigError::AboveNyquist {
                slot: FilterSlot::Lowpass1,
                hz: 1000,
                nyquist_hz: 1000
            })
        );
        assert_eq!(chain.stage_count(), 1);
        assert_eq!(chain.config().lowpass1.hz, 100);
    }

    #[test]
    fn notch_cutoff_must_sit_below_center() {
        let config = FilterConfig {
            notch2: NotchConfig {
                center_hz: 200,
                cutoff_hz: 200,
            },
            ..FilterConfig::default()
        };
        assert!(matches!(
            FilterChain::new(&config, RATE_HZ),
            Err(ConfigError::NotchCutoffNotBelowCenter {
                slot: FilterSlot::Notch2,
                ..
            })
        ));
    }

    #[test]
    fn lowpass_cutoff_is_capped() {
        let config = FilterConfig {
            lowpass2: LowpassConfig {
                kind: LowpassType::Pt1,
                hz: LPF_MAX_HZ + 1,
            },
            ..FilterConfig::default()
        };
        // Nyquist at 4 kHz would allow it
        assert_eq!(
            FilterChain::new(&config, 4000).err(),
            Some(ConfigError::LowpassAboveMax {
                slot: FilterSlot::Lowpass2,
                hz: LPF_MAX_HZ + 1,
                max_hz: LPF_MAX_HZ,
            })
        );

        let at_limit = FilterConfig {
            lowpass2: LowpassConfig {
                kind: LowpassType::Pt1,
                hz: LPF_MAX_HZ,
            },
            ..FilterConfig::default()
        };
        assert!(FilterChain::new(&at_limit, 4000).is_ok());
    }

    #[test]
    fn too_many_dynamic_notches() {
        let config = FilterConfig {
            dynamic_notch: DynamicNotchConfig {
                count: MAX_DYNAMIC_NOTCHES as u8 + 1,
                ..DynamicNotchConfig::default()
            },
            ..FilterConfig::default()
        };
        assert!(matches!(
            FilterChain::new(&config, RATE_HZ),
            Err(ConfigError::TooManyDynamicNotches { .. })
        ));
    }

    #[test]
    fn dynamic_notch_center_is_clamped() {
        let config = FilterConfig {
            dynamic_notch: DynamicNotchConfig {
                count: 1,
                q: 300,
                min_hz: 100,
                max_hz: 600,
            },
            ..FilterConfig::PASSTHROUGH
        };
        let mut chain = FilterChain::new(&config, RATE_HZ).unwrap();
        assert_eq!(chain.dynamic_notch_hz(0), Some(600));
        assert!(chain.set_dynamic_notch(0, 20));
        assert_eq!(chain.dynamic_notch_hz(0), Some(100));
        assert!(chain.set_dynamic_notch(0, 350));
        assert_eq!(chain.dynamic_notch_hz(0), Some(350));
        assert!(!chain.set_dynamic_notch(1, 350));
    }

    #[test]
    fn dynamic_lowpass_tracks_throttle() {
        let config = FilterConfig {
            dynamic_lowpass: DynamicLowpassConfig {
                min_hz: 100,
                max_hz: 300,
            },
            ..FilterConfig::default()
        };
        let mut chain = FilterChain::new(&config, RATE_HZ).unwrap();
        assert_eq!(chain.dynamic_lowpass_hz(), Some(100));
        assert!(!chain.update_dynamic_lowpass(0.0));
        assert!(chain.update_dynamic_lowpass(0.5));
        assert_eq!(chain.dynamic_lowpass_hz(), Some(200));
        assert!(chain.update_dynamic_lowpass(7.0));
        assert_eq!(chain.dynamic_lowpass_hz(), Some(300));
    }

    #[test]
    fn static_lowpass_ignores_throttle() {
        let mut chain = FilterChain::new(&FilterConfig::default(), RATE_HZ).unwrap();
        assert_eq!(chain.dynamic_lowpass_hz(), None);
        assert!(!chain.update_dynamic_lowpass(1.0));
    }

    #[test]
    fn anti_alias_rejects_out_of_range_cutoff() {
        let mut chain = FilterChain::passthrough(RATE_HZ);
        assert!(chain.set_decimation_lowpass(4000, 2500).is_err());
        assert!(chain.set_decimation_lowpass(4000, 500).is_ok());
        assert!(chain.set_decimation_lowpass(4000, 0).is_ok());
    }

    #[test]
    fn axes_do_not_couple() {
        let mut chain = FilterChain::new(&FilterConfig::default(), RATE_HZ).unwrap();
        let mut out = [0.0; 3];
        for _ in 0..200 {
            out = chain.apply([5.0, 0.0, 0.0]);
        }
        assert!(out[0] > 4.9);
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 0.0);
    }
}
