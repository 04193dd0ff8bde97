//! Second-order sections (RBJ cookbook), transposed direct form II.

use core::f32::consts::{FRAC_1_SQRT_2, PI};

pub const BUTTERWORTH_Q: f32 = FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadKind {
    Lowpass,
    Notch,
}

/// Notch quality factor for a band whose lower edge sits at `cutoff_hz`.
pub fn notch_q(center_hz: f32, cutoff_hz: f32) -> f32 {
    center_hz * cutoff_hz / (center_hz * center_hz - cutoff_hz * cutoff_hz)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
}

impl Biquad {
    pub fn lowpass(cutoff_hz: f32, dt: f32) -> Self {
        Self::new(BiquadKind::Lowpass, cutoff_hz, dt, BUTTERWORTH_Q)
    }

    pub fn notch(center_hz: f32, dt: f32, q: f32) -> Self {
        Self::new(BiquadKind::Notch, center_hz, dt, q)
    }

    pub fn new(kind: BiquadKind, hz: f32, dt: f32, q: f32) -> Self {
        let mut filter = Self::default();
        filter.update(kind, hz, dt, q);
        filter
    }

    /// Recomputes the coefficients and keeps the history, so retuning a
    /// running filter does not glitch its output.
    pub fn update(&mut self, kind: BiquadKind, hz: f32, dt: f32, q: f32) {
        let omega = 2.0 * PI * hz * dt;
        let sn = libm::sinf(omega);
        let cs = libm::cosf(omega);
        let alpha = sn / (2.0 * q);

        let (b0, b1, b2) = match kind {
            BiquadKind::Lowpass => {
                let b1 = 1.0 - cs;
                (b1 * 0.5, b1, b1 * 0.5)
            }
            BiquadKind::Notch => (1.0, -2.0 * cs, 1.0),
        };
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = (-2.0 * cs) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        let result = self.b0 * input + self.x1;
        self.x1 = self.b1 * input - self.a1 * result + self.x2;
        self.x2 = self.b2 * input - self.a2 * result;
        result
    }
}
