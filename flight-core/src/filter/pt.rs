//! First-order lowpass sections and their cascades.

use core::f32::consts::PI;

// Cutoff corrections so a cascade of n first-order sections keeps its -3 dB
// point at the requested frequency: 1 / sqrt(2^(1/n) - 1).
const PT2_CUTOFF_CORRECTION: f32 = 1.553_774;
const PT3_CUTOFF_CORRECTION: f32 = 1.961_459_2;

pub fn pt1_gain(cutoff_hz: f32, dt: f32) -> f32 {
    let omega = 2.0 * PI * cutoff_hz * dt;
    omega / (omega + 1.0)
}

pub fn pt2_gain(cutoff_hz: f32, dt: f32) -> f32 {
    pt1_gain(cutoff_hz * PT2_CUTOFF_CORRECTION, dt)
}

pub fn pt3_gain(cutoff_hz: f32, dt: f32) -> f32 {
    pt1_gain(cutoff_hz * PT3_CUTOFF_CORRECTION, dt)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pt1 {
    state: f32,
    k: f32,
}

impl Pt1 {
    pub(crate) const IDLE: Self = Self { state: 0.0, k: 0.0 };

    pub fn new(cutoff_hz: f32, dt: f32) -> Self {
        Self {
            state: 0.0,
            k: pt1_gain(cutoff_hz, dt),
        }
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32, dt: f32) {
        self.k = pt1_gain(cutoff_hz, dt);
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        self.state += self.k * (input - self.state);
        self.state
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pt2 {
    state: f32,
    state1: f32,
    k: f32,
}

impl Pt2 {
    pub fn new(cutoff_hz: f32, dt: f32) -> Self {
        Self {
            state: 0.0,
            state1: 0.0,
            k: pt2_gain(cutoff_hz, dt),
        }
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32, dt: f32) {
        self.k = pt2_gain(cutoff_hz, dt);
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        self.state1 += self.k * (input - self.state1);
        self.state += self.k * (self.state1 - self.state);
        self.state
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pt3 {
    state: f32,
    state1: f32,
    state2: f32,
    k: f32,
}

impl Pt3 {
    pub fn new(cutoff_hz: f32, dt: f32) -> Self {
        Self {
            state: 0.0,
            state1: 0.0,
            state2: 0.0,
            k: pt3_gain(cutoff_hz, dt),
        }
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32, dt: f32) {
        self.k = pt3_gain(cutoff_hz, dt);
    }

    #[inline]
    pub fn apply(&mut self, input: f32) -> f32 {
        self.state1 += self.k * (input - self.state1);
        self.state2 += self.k * (self.state1 - self.state2);
        self.state += self.k * (self.state2 - self.state);
        self.state
    }
}
