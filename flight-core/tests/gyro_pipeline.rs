use approx::assert_relative_eq;

use flight_core::config::{FilterConfig, LowpassConfig, LowpassType};
use flight_core::{GyroConfig, GyroPipeline, PipelineState, Rates, RawSampleSource};

/// Replays a fixed script, one entry per tick, then repeats the last entry.
struct Script {
    samples: Vec<Option<Rates>>,
    next: usize,
    celsius: Option<f32>,
}

impl Script {
    fn new(samples: Vec<Option<Rates>>) -> Self {
        Self {
            samples,
            next: 0,
            celsius: None,
        }
    }
}

impl RawSampleSource for Script {
    fn read_sample(&mut self, _device: usize) -> Option<Rates> {
        let index = self.next.min(self.samples.len() - 1);
        self.next += 1;
        self.samples[index]
    }

    fn read_temperature(&mut self, _device: usize) -> Option<f32> {
        self.celsius
    }
}

/// Cheap deterministic noise in [-1, 1].
fn noise(seed: &mut u32) -> f32 {
    *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    (*seed >> 8) as f32 / (1u32 << 23) as f32 - 1.0
}

fn config() -> GyroConfig {
    GyroConfig {
        sample_rate_hz: 2000,
        filter_rate_hz: 1000,
        target_rate_hz: 500,
        calibration_duration: 10,
        ..GyroConfig::default()
    }
}

// 10 cs at 2 kHz
const WINDOW: usize = 200;

#[test]
fn output_is_zero_until_calibrated() {
    let mut seed = 7;
    let samples = (0..WINDOW)
        .map(|_| Some([3.0 + noise(&mut seed), -7.0 + noise(&mut seed), 0.5 + noise(&mut seed)]))
        .collect();
    let mut source = Script::new(samples);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();

    for _ in 0..WINDOW {
        pipeline.update(&mut source);
        assert_eq!(*pipeline.filtered(), [0.0; 3]);
        assert!(!pipeline.is_target_tick());
    }
    assert_eq!(pipeline.state(), PipelineState::Active);
    assert!(pipeline.calibration_noise_acceptable());
}

#[test]
fn calibrated_signal_settles_on_true_rate() {
    let mut seed = 99;
    let bias = [3.0, -7.0, 0.5];
    let mut samples: Vec<Option<Rates>> = (0..WINDOW)
        .map(|_| Some(bias.map(|b| b + 0.2 * noise(&mut seed))))
        .collect();
    // then a steady 100 dps roll on top of the bias
    samples.push(Some([bias[0] + 100.0, bias[1], bias[2]]));

    let mut source = Script::new(samples);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();
    for _ in 0..WINDOW + 2000 {
        pipeline.update(&mut source);
    }

    let rates = pipeline.filtered();
    assert_relative_eq!(rates[0], 100.0, epsilon = 0.1);
    assert_relative_eq!(rates[1], 0.0, epsilon = 0.1);
    assert_relative_eq!(rates[2], 0.0, epsilon = 0.1);
}

#[test]
fn dropped_samples_do_not_stall_calibration() {
    let samples = (0..WINDOW * 2)
        .map(|i| if i % 2 == 0 { Some([1.0; 3]) } else { None })
        .collect();
    let mut source = Script::new(samples);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();
    for _ in 0..WINDOW * 2 {
        pipeline.update(&mut source);
    }
    assert!(pipeline.is_calibration_complete());
}

#[test]
fn nan_samples_still_complete_calibration() {
    let mut source = Script::new(vec![Some([f32::NAN; 3])]);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();
    for _ in 0..WINDOW {
        pipeline.update(&mut source);
    }
    assert!(pipeline.is_calibration_complete());
    assert!(!pipeline.calibration_noise_acceptable());

    pipeline.update(&mut source);
    assert_eq!(*pipeline.filtered(), [0.0; 3]);
}

#[test]
fn overflow_raises_flag_for_that_axis() {
    let mut samples = vec![Some([0.0; 3]); WINDOW];
    samples.push(Some([0.0, 2100.0, 0.0]));
    let mut source = Script::new(samples);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();
    for _ in 0..=WINDOW {
        pipeline.update(&mut source);
    }
    assert!(pipeline.overflow_detected());
    assert_eq!(pipeline.overflow_axes(), flight_core::gyro::AxisMask::PITCH);
}

#[test]
fn target_ticks_follow_divisors() {
    let mut source = Script::new(vec![Some([0.0; 3])]);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();
    for _ in 0..WINDOW {
        pipeline.update(&mut source);
    }

    let mut filter_ticks = 0;
    let mut target_ticks = 0;
    for _ in 0..400 {
        pipeline.update(&mut source);
        filter_ticks += pipeline.is_filter_tick() as u32;
        target_ticks += pipeline.is_target_tick() as u32;
    }
    assert_eq!(filter_ticks, 200);
    assert_eq!(target_ticks, 100);
}

#[test]
fn reconfigured_filters_apply_without_recalibrating() {
    let mut source = Script::new(vec![Some([0.0; 3])]);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();
    for _ in 0..WINDOW {
        pipeline.update(&mut source);
    }

    let filter = FilterConfig {
        lowpass2: LowpassConfig {
            kind: LowpassType::Biquad,
            hz: 80,
        },
        ..FilterConfig::default()
    };
    pipeline.configure_filters(&filter).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Active);
    assert_eq!(pipeline.filters_mut().stage_count(), 2);

    let too_high = FilterConfig {
        lowpass2: LowpassConfig {
            kind: LowpassType::Pt1,
            hz: 600,
        },
        ..FilterConfig::default()
    };
    assert!(pipeline.configure_filters(&too_high).is_err());
    assert_eq!(pipeline.config().filter, filter);
}

#[test]
fn temperature_follows_housekeeping_reads() {
    let mut source = Script::new(vec![Some([0.0; 3])]);
    let mut pipeline = GyroPipeline::new(&config(), 1).unwrap();

    source.celsius = Some(31.25);
    for _ in 0..WINDOW {
        pipeline.update(&mut source);
    }
    // sample ticks alone never touch the sensor temperature
    assert_eq!(pipeline.temperature(), None);

    pipeline.read_temperature(&mut source);
    assert_relative_eq!(pipeline.temperature().unwrap(), 31.25);

    source.celsius = None;
    pipeline.read_temperature(&mut source);
    assert_relative_eq!(pipeline.temperature().unwrap(), 31.25);
}
