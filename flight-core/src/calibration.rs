//! Gyro zero-rate calibration over a fixed window of samples.

use crate::{Rates, XYZ_AXIS_COUNT};

/// Windows thrown away for movement before the result is accepted anyway.
pub const MAX_CALIBRATION_RESTARTS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationStatus {
    /// Never started since construction.
    Idle,
    Running,
    Done,
}

/// Single-pass mean and variance (Welford).
#[derive(Debug, Clone, Copy, Default)]
struct Variance {
    count: u32,
    mean: f32,
    m2: f32,
}

impl Variance {
    fn push(&mut self, x: f32) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f32;
        self.m2 += delta * (x - self.mean);
    }

    fn variance(&self) -> f32 {
        if self.count > 1 {
            self.m2 / (self.count - 1) as f32
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f32 {
        libm::sqrtf(self.variance())
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    window_cycles: u32,
    cycles_remaining: u32,
    movement_threshold: f32,

    sum: Rates,
    variance: [Variance; XYZ_AXIS_COUNT],
    accepted: u32,

    offset: Rates,
    dispersion: Rates,
    restarts: u8,
    noise_acceptable: bool,
    first_arming: bool,
    status: CalibrationStatus,
}

impl CalibrationEngine {
    /// `movement_threshold` is the largest standard deviation (dps) accepted
    /// at the end of a window; zero disables the check.
    pub fn new(window_cycles: u32, movement_threshold: u8) -> Self {
        Self {
            window_cycles: window_cycles.max(1),
            cycles_remaining: 0,
            movement_threshold: movement_threshold as f32,
            sum: [0.0; XYZ_AXIS_COUNT],
            variance: [Variance::default(); XYZ_AXIS_COUNT],
            accepted: 0,
            offset: [0.0; XYZ_AXIS_COUNT],
            dispersion: [0.0; XYZ_AXIS_COUNT],
            restarts: 0,
            noise_acceptable: false,
            first_arming: false,
            status: CalibrationStatus::Idle,
        }
    }

    /// Window length for a duration in 1/100 s at `sample_rate_hz`.
    pub fn cycles_for(duration_cs: u16, sample_rate_hz: u16) -> u32 {
        (duration_cs as u32 * sample_rate_hz as u32 / 100).max(1)
    }

    /// Opens a fresh window. Any progress made so far is dropped.
    pub fn start(&mut self, first_arming: bool) {
        self.reset_window();
        self.restarts = 0;
        self.noise_acceptable = false;
        self.first_arming = first_arming;
        self.status = CalibrationStatus::Running;
        info!(
            "gyro calibration started, {} cycles, first arming: {}",
            self.window_cycles, first_arming
        );
    }

    fn reset_window(&mut self) {
        self.cycles_remaining = self.window_cycles;
        self.sum = [0.0; XYZ_AXIS_COUNT];
        self.variance = [Variance::default(); XYZ_AXIS_COUNT];
        self.accepted = 0;
    }

    /// Feeds one raw sample. Non-finite samples use up their cycle without
    /// touching the statistics.
    pub fn update(&mut self, sample: &Rates) -> CalibrationStatus {
        if self.status != CalibrationStatus::Running {
            return self.status;
        }

        if sample.iter().all(|v| v.is_finite()) {
            for axis in 0..XYZ_AXIS_COUNT {
                self.sum[axis] += sample[axis];
                self.variance[axis].push(sample[axis]);
            }
            self.accepted += 1;
        } else {
            trace!("calibration sample discarded: not finite");
        }

        self.advance()
    }

    /// Spends one cycle without accumulating, used for samples the caller
    /// already knows are bad (overflowed).
    pub fn skip(&mut self) -> CalibrationStatus {
        if self.status != CalibrationStatus::Running {
            return self.status;
        }
        self.advance()
    }

    fn advance(&mut self) -> CalibrationStatus {
        self.cycles_remaining = self.cycles_remaining.saturating_sub(1);
        if self.cycles_remaining == 0 {
            self.finish();
        }
        self.status
    }

    fn finish(&mut self) {
        let dispersion = self.variance.map(|v| v.std_dev());
        let moved = self.movement_threshold > 0.0
            && dispersion.iter().any(|&sd| sd > self.movement_threshold);

        if moved && self.restarts < MAX_CALIBRATION_RESTARTS {
            self.restarts += 1;
            warn!(
                "gyro moved during calibration (stdev {:?}), restart {}",
                dispersion, self.restarts
            );
            self.reset_window();
            return;
        }

        self.offset = if self.accepted > 0 {
            let n = self.accepted as f32;
            self.sum.map(|sum| sum / n)
        } else {
            [0.0; XYZ_AXIS_COUNT]
        };
        self.dispersion = dispersion;
        self.noise_acceptable = !moved && self.accepted > 0;
        self.status = CalibrationStatus::Done;

        if self.noise_acceptable {
            info!(
                "gyro calibration done, offset {:?}, stdev {:?}",
                self.offset, self.dispersion
            );
        } else {
            warn!(
                "gyro calibration latched without a quiet window, offset {:?}, stdev {:?}",
                self.offset, self.dispersion
            );
        }
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == CalibrationStatus::Done
    }

    pub fn is_running(&self) -> bool {
        self.status == CalibrationStatus::Running
    }

    pub fn is_first_arming_calibration(&self) -> bool {
        self.first_arming
    }

    pub fn window_cycles(&self) -> u32 {
        self.window_cycles
    }

    pub fn cycles_remaining(&self) -> u32 {
        self.cycles_remaining
    }

    pub fn restarts(&self) -> u8 {
        self.restarts
    }

    /// Per-axis zero rate; only meaningful once complete.
    pub fn offset(&self) -> &Rates {
        &self.offset
    }

    /// Per-axis standard deviation of the accepted window.
    pub fn dispersion(&self) -> &Rates {
        &self.dispersion
    }

    /// False when the window ran out of restarts or saw no usable sample.
    pub fn noise_acceptable(&self) -> bool {
        self.noise_acceptable
    }
}
