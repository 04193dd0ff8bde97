//! Gyro acquisition, calibration and filtering, run once per sample tick.

use bitflags::bitflags;

use crate::calibration::CalibrationEngine;
use crate::config::{FilterConfig, GyroConfig, GyroDebugMode, GyroToUse, OverflowCheck};
use crate::error::ConfigError;
use crate::filter::FilterChain;
use crate::{Axis, Rates, XYZ_AXIS_COUNT};

pub const MAX_GYRO_DEVICES: usize = 2;
pub const DEBUG_VALUE_COUNT: usize = 4;

// An overflowed axis clears once it drops below this share of the range.
const OVERFLOW_CLEAR_RATIO: f32 = 0.9;

/// Non-blocking access to the physical gyros.
pub trait RawSampleSource {
    /// One fresh sample in dps from `device`, or `None` when nothing new is
    /// ready. Must return immediately.
    fn read_sample(&mut self, device: usize) -> Option<Rates>;

    /// Die temperature of `device` in °C, `None` when the device has no
    /// sensor or the read failed.
    fn read_temperature(&mut self, _device: usize) -> Option<f32> {
        None
    }
}

bitflags! {
    /// Axes currently flagged as saturated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AxisMask: u8 {
        const ROLL = 0b001;
        const PITCH = 0b010;
        const YAW = 0b100;
    }
}

impl AxisMask {
    pub const fn of(axis: Axis) -> Self {
        Self::from_bits_truncate(1 << axis.index())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AxisMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AxisMask({=u8:#05b})", self.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineState {
    Uninitialized,
    Calibrating,
    Active,
}

/// Integer divisors between the sample, filter and target rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoopTiming {
    pub sample_looptime_us: u32,
    pub filter_looptime_us: u32,
    pub target_looptime_us: u32,
    /// Sample ticks per filter run.
    pub decimation: u16,
    /// Filter runs per target (PID) tick.
    pub target_denom: u16,
}

fn rounded_ratio(num: u16, den: u16) -> u16 {
    ((num as u32 + den as u32 / 2) / den as u32).max(1) as u16
}

impl LoopTiming {
    pub fn new(config: &GyroConfig) -> Result<Self, ConfigError> {
        let sample_hz = config.sample_rate_hz;
        let filter_hz = config.filter_rate_hz;
        let target_hz = config.target_rate_hz;

        if sample_hz == 0 || filter_hz == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if filter_hz > sample_hz {
            return Err(ConfigError::FilterRateAboveSampleRate {
                sample_hz,
                filter_hz,
            });
        }
        if target_hz == 0 || target_hz > filter_hz {
            return Err(ConfigError::InvalidTargetRate {
                filter_hz,
                target_hz,
            });
        }

        let decimation = rounded_ratio(sample_hz, filter_hz);
        let target_denom = rounded_ratio(filter_hz, target_hz);
        let sample_looptime_us = 1_000_000 / sample_hz as u32;

        Ok(Self {
            sample_looptime_us,
            filter_looptime_us: sample_looptime_us * decimation as u32,
            target_looptime_us: sample_looptime_us * decimation as u32 * target_denom as u32,
            decimation,
            target_denom,
        })
    }
}

#[derive(Debug, Clone)]
struct GyroDevice {
    raw: Rates,
    fresh: bool,
    zero: Rates,
    calibration: CalibrationEngine,
    overflow: AxisMask,
    // Consecutive calibration ticks without a sample.
    starved_cycles: u32,
    /// Gave nothing for a whole calibration window; out of the merge until
    /// the next calibration.
    failed: bool,
}

impl GyroDevice {
    fn new(calibration: CalibrationEngine) -> Self {
        Self {
            raw: [0.0; XYZ_AXIS_COUNT],
            fresh: false,
            zero: [0.0; XYZ_AXIS_COUNT],
            calibration,
            overflow: AxisMask::empty(),
            starved_cycles: 0,
            failed: false,
        }
    }

    fn usable(&self) -> bool {
        !self.failed && self.fresh && self.raw.iter().all(|v| v.is_finite())
    }

    fn calibrated(&self) -> Rates {
        let mut out = self.raw;
        for (value, zero) in out.iter_mut().zip(self.zero.iter()) {
            *value -= zero;
        }
        out
    }

    fn check_overflow(&mut self, mode: OverflowCheck, range_dps: f32, index: usize) {
        let checked = match mode {
            OverflowCheck::None => {
                self.overflow = AxisMask::empty();
                return;
            }
            OverflowCheck::Yaw => AxisMask::YAW,
            OverflowCheck::AllAxes => AxisMask::all(),
        };

        let before = self.overflow;
        for axis in Axis::ALL {
            let bit = AxisMask::of(axis);
            if !checked.contains(bit) {
                continue;
            }
            let magnitude = self.raw[axis.index()].abs();
            if magnitude >= range_dps {
                self.overflow.insert(bit);
            } else if magnitude < range_dps * OVERFLOW_CLEAR_RATIO {
                self.overflow.remove(bit);
            }
        }

        if before.is_empty() && !self.overflow.is_empty() {
            warn!("gyro {} overflow on {:?}", index, self.overflow);
        } else if !before.is_empty() && self.overflow.is_empty() {
            info!("gyro {} overflow cleared", index);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CalibrationRequest {
    first_arming: bool,
    armed: bool,
}

#[derive(Debug, Clone)]
pub struct GyroPipeline {
    config: GyroConfig,
    timing: LoopTiming,
    state: PipelineState,

    devices: [GyroDevice; MAX_GYRO_DEVICES],
    first_device: usize,
    last_device: usize,

    pending: Option<CalibrationRequest>,
    // Re-calibrating in flight: keep running on the previous zero.
    keep_flying: bool,

    filters: FilterChain,
    range_dps: f32,

    scaled: Rates,
    filtered: Rates,
    sample_ticks: u16,
    filter_runs: u16,
    filter_tick: bool,
    target_tick: bool,

    accumulated: Rates,
    accumulated_count: u32,

    temperature: Option<f32>,

    debug: [i16; DEBUG_VALUE_COUNT],
}

impl GyroPipeline {
    /// `device_count` is how many physical gyros the source exposes (1 or 2).
    /// Calibration starts on the first [`GyroPipeline::update`].
    pub fn new(config: &GyroConfig, device_count: usize) -> Result<Self, ConfigError> {
        if config.range_dps == 0 {
            return Err(ConfigError::ZeroGyroRange);
        }
        if config.calibration_duration == 0 {
            return Err(ConfigError::ZeroCalibrationDuration);
        }
        let timing = LoopTiming::new(config)?;

        let mut filters = FilterChain::new(&config.filter, config.filter_rate_hz)?;
        filters.set_decimation_lowpass(config.sample_rate_hz, config.decimation_hz)?;

        let device_count = device_count.clamp(1, MAX_GYRO_DEVICES);
        let (first_device, last_device) = match config.gyro_to_use {
            GyroToUse::Second if device_count > 1 => (1, 1),
            GyroToUse::Both if device_count > 1 => (0, 1),
            GyroToUse::First => (0, 0),
            other => {
                warn!("{:?} gyro selection needs two devices, using the first", other);
                (0, 0)
            }
        };

        let window =
            CalibrationEngine::cycles_for(config.calibration_duration, config.sample_rate_hz);
        let engine = CalibrationEngine::new(window, config.movement_threshold);

        info!(
            "gyro pipeline: sample {} us, decimation {}, target denom {}",
            timing.sample_looptime_us, timing.decimation, timing.target_denom
        );

        Ok(Self {
            config: *config,
            timing,
            state: PipelineState::Uninitialized,
            devices: [GyroDevice::new(engine.clone()), GyroDevice::new(engine)],
            first_device,
            last_device,
            pending: Some(CalibrationRequest {
                first_arming: false,
                armed: false,
            }),
            keep_flying: false,
            filters,
            range_dps: config.range_dps as f32,
            scaled: [0.0; XYZ_AXIS_COUNT],
            filtered: [0.0; XYZ_AXIS_COUNT],
            sample_ticks: 0,
            filter_runs: 0,
            filter_tick: false,
            target_tick: false,
            accumulated: [0.0; XYZ_AXIS_COUNT],
            accumulated_count: 0,
            temperature: None,
            debug: [0; DEBUG_VALUE_COUNT],
        })
    }

    /// Asks for a new calibration window. It takes effect at the start of the
    /// next update. When `armed`, the signal keeps flowing on the previous
    /// zero until the new one latches.
    pub fn start_calibration(&mut self, first_arming: bool, armed: bool) {
        self.pending = Some(CalibrationRequest {
            first_arming,
            armed,
        });
    }

    fn begin_calibration(&mut self, request: CalibrationRequest) {
        // A repeated request inside an armed window must not drop the signal.
        self.keep_flying =
            request.armed && (self.state == PipelineState::Active || self.keep_flying);
        for device in self.used_devices_mut() {
            device.calibration.start(request.first_arming);
            device.starved_cycles = 0;
            device.failed = false;
        }
        if !self.keep_flying {
            self.filtered = [0.0; XYZ_AXIS_COUNT];
            self.scaled = [0.0; XYZ_AXIS_COUNT];
            self.filters.reset_decimator();
        }
        self.set_state(PipelineState::Calibrating);
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state != state {
            debug!("gyro pipeline {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    fn used_devices(&self) -> &[GyroDevice] {
        &self.devices[self.first_device..=self.last_device]
    }

    fn used_devices_mut(&mut self) -> &mut [GyroDevice] {
        &mut self.devices[self.first_device..=self.last_device]
    }

    /// One sample tick.
    pub fn update(&mut self, source: &mut impl RawSampleSource) {
        if let Some(request) = self.pending.take() {
            self.begin_calibration(request);
        }

        self.filter_tick = false;
        self.target_tick = false;

        let mode = self.config.overflow_check;
        let range_dps = self.range_dps;
        for index in self.first_device..=self.last_device {
            let device = &mut self.devices[index];
            match source.read_sample(index) {
                Some(sample) => {
                    device.raw = sample;
                    device.fresh = true;
                    device.check_overflow(mode, range_dps, index);
                }
                None => device.fresh = false,
            }
        }

        match self.state {
            PipelineState::Uninitialized => {}
            PipelineState::Calibrating => {
                self.calibrate();
                if self.keep_flying {
                    self.process();
                }
            }
            PipelineState::Active => self.process(),
        }

        self.update_debug();
    }

    fn calibrate(&mut self) {
        let first_device = self.first_device;
        for (index, device) in self.used_devices_mut().iter_mut().enumerate() {
            if device.failed {
                continue;
            }
            if !device.fresh {
                device.starved_cycles = device.starved_cycles.saturating_add(1);
                if device.starved_cycles >= device.calibration.window_cycles() {
                    warn!(
                        "gyro {} silent for a whole calibration window, dropped",
                        first_device + index
                    );
                    device.failed = true;
                }
                continue;
            }
            device.starved_cycles = 0;
            if device.overflow.is_empty() {
                device.calibration.update(&device.raw);
            } else {
                device.calibration.skip();
            }
        }

        let finished = self
            .used_devices()
            .iter()
            .all(|d| d.failed || d.calibration.is_complete());
        if !finished {
            return;
        }

        let yaw_offset = self.config.offset_yaw as f32 / 100.0;
        for device in self.used_devices_mut().iter_mut().filter(|d| !d.failed) {
            device.zero = *device.calibration.offset();
            device.zero[Axis::Yaw.index()] -= yaw_offset;
        }
        if !self.keep_flying {
            self.filters.reset_decimator();
            self.sample_ticks = 0;
        }
        self.keep_flying = false;
        self.set_state(PipelineState::Active);
    }

    /// Healthy devices are averaged; when none is healthy any usable
    /// (overflowed) device is used instead.
    fn merged_sample(&self) -> Option<Rates> {
        let mut healthy = ([0.0; XYZ_AXIS_COUNT], 0u8);
        let mut overflowed = ([0.0; XYZ_AXIS_COUNT], 0u8);

        for device in self.used_devices().iter().filter(|d| d.usable()) {
            let acc = if device.overflow.is_empty() {
                &mut healthy
            } else {
                &mut overflowed
            };
            for (sum, value) in acc.0.iter_mut().zip(device.calibrated()) {
                *sum += value;
            }
            acc.1 += 1;
        }

        [healthy, overflowed]
            .into_iter()
            .find(|(_, n)| *n > 0)
            .map(|(sum, n)| sum.map(|v| v / n as f32))
    }

    fn process(&mut self) {
        if let Some(sample) = self.merged_sample() {
            self.scaled = sample;
            self.filters.decimate(&sample);
        }

        self.sample_ticks += 1;
        if self.sample_ticks < self.timing.decimation {
            return;
        }
        self.sample_ticks = 0;

        // Nothing arrived for this filter period: hold the last output.
        let Some(average) = self.filters.take_decimated() else {
            return;
        };
        self.filtered = self.filters.apply(average);
        self.filter_tick = true;

        for (sum, value) in self.accumulated.iter_mut().zip(self.filtered) {
            *sum += value;
        }
        self.accumulated_count += 1;

        self.filter_runs += 1;
        if self.filter_runs >= self.timing.target_denom {
            self.filter_runs = 0;
            self.target_tick = true;
        }
    }

    fn update_debug(&mut self) {
        let to_debug = |v: f32| libm::roundf(v) as i16;
        let first = &self.devices[self.first_device];
        let second = &self.devices[self.last_device];

        match self.config.debug_mode {
            GyroDebugMode::None => {}
            GyroDebugMode::Raw => {
                for axis in 0..XYZ_AXIS_COUNT {
                    self.debug[axis] = to_debug(first.raw[axis]);
                }
            }
            GyroDebugMode::Scaled => {
                for axis in 0..XYZ_AXIS_COUNT {
                    self.debug[axis] = to_debug(self.scaled[axis]);
                }
            }
            GyroDebugMode::Filtered => {
                for axis in 0..XYZ_AXIS_COUNT {
                    self.debug[axis] = to_debug(self.filtered[axis]);
                }
            }
            GyroDebugMode::DualRaw => {
                self.debug = [
                    to_debug(first.raw[0]),
                    to_debug(first.raw[1]),
                    to_debug(second.raw[0]),
                    to_debug(second.raw[1]),
                ];
            }
            GyroDebugMode::DualDiff => {
                for axis in 0..XYZ_AXIS_COUNT {
                    let diff = first.calibrated()[axis] - second.calibrated()[axis];
                    self.debug[axis] = to_debug(diff);
                }
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn timing(&self) -> &LoopTiming {
        &self.timing
    }

    pub fn config(&self) -> &GyroConfig {
        &self.config
    }

    /// The published, filtered rates in dps.
    pub fn filtered(&self) -> &Rates {
        &self.filtered
    }

    /// Calibrated rates before filtering.
    pub fn scaled(&self) -> &Rates {
        &self.scaled
    }

    pub fn abs_rate_dps(&self, axis: Axis) -> f32 {
        self.filtered[axis.index()].abs()
    }

    pub fn is_calibration_complete(&self) -> bool {
        self.state == PipelineState::Active && self.pending.is_none()
    }

    pub fn is_first_arming_calibration_running(&self) -> bool {
        self.state == PipelineState::Calibrating
            && self.used_devices().iter().any(|d| {
                let calibration = &d.calibration;
                !d.failed && calibration.is_running() && calibration.is_first_arming_calibration()
            })
    }

    /// Whether the last calibration window ended without excess movement on
    /// every live device.
    pub fn calibration_noise_acceptable(&self) -> bool {
        self.live_device_count() > 0
            && self
                .used_devices()
                .iter()
                .filter(|d| !d.failed)
                .all(|d| d.calibration.noise_acceptable())
    }

    /// Selected devices still feeding the merge. Zero means there is no
    /// usable gyro even though calibration completed.
    pub fn live_device_count(&self) -> usize {
        self.used_devices().iter().filter(|d| !d.failed).count()
    }

    /// Reads the die temperature of every live device and keeps the
    /// hottest. Meant for a slow housekeeping rate, not every sample tick.
    pub fn read_temperature(&mut self, source: &mut impl RawSampleSource) {
        let mut hottest: Option<f32> = None;
        for index in self.first_device..=self.last_device {
            if self.devices[index].failed {
                continue;
            }
            let Some(celsius) = source.read_temperature(index).filter(|t| t.is_finite()) else {
                continue;
            };
            hottest = Some(hottest.map_or(celsius, |t| t.max(celsius)));
        }
        if hottest.is_some() {
            self.temperature = hottest;
        }
    }

    /// Last temperature read, in °C.
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    pub fn calibration_dispersion(&self) -> &Rates {
        self.devices[self.first_device].calibration.dispersion()
    }

    pub fn overflow_detected(&self) -> bool {
        !self.overflow_axes().is_empty()
    }

    /// Not reported during a ground calibration window; those samples are
    /// only kept out of the offset.
    pub fn overflow_axes(&self) -> AxisMask {
        if self.state != PipelineState::Active && !self.keep_flying {
            return AxisMask::empty();
        }
        self.used_devices()
            .iter()
            .fold(AxisMask::empty(), |mask, d| mask | d.overflow)
    }

    /// True when this tick produced a new filtered sample.
    pub fn is_filter_tick(&self) -> bool {
        self.filter_tick
    }

    /// True on the ticks the rate consumer (PID loop) should run.
    pub fn is_target_tick(&self) -> bool {
        self.target_tick
    }

    /// Mean of the filtered rates since the last call, for the attitude
    /// estimator. Resets the accumulator.
    pub fn accumulation_average(&mut self) -> Option<Rates> {
        if self.accumulated_count == 0 {
            return None;
        }
        let n = self.accumulated_count as f32;
        let average = self.accumulated.map(|sum| sum / n);
        self.accumulated = [0.0; XYZ_AXIS_COUNT];
        self.accumulated_count = 0;
        Some(average)
    }

    pub fn debug_values(&self) -> &[i16; DEBUG_VALUE_COUNT] {
        &self.debug
    }

    /// Rebuilds the filter stages; on error the running chain is kept.
    pub fn configure_filters(&mut self, filter: &FilterConfig) -> Result<(), ConfigError> {
        self.filters.configure(filter, self.config.filter_rate_hz)?;
        self.config.filter = *filter;
        Ok(())
    }

    /// Hook for the throttle-driven lowpass and the spectral notch estimator.
    pub fn filters_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }
}
