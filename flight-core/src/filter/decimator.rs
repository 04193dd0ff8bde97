use crate::{Rates, XYZ_AXIS_COUNT};

/// Running-average downsampler between the sample rate and the filter rate.
///
/// Every sample pushed since the last [`Decimator::take`] contributes equally
/// to the next output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decimator {
    sum: Rates,
    count: u16,
}

impl Decimator {
    pub fn push(&mut self, sample: &Rates) {
        for axis in 0..XYZ_AXIS_COUNT {
            self.sum[axis] += sample[axis];
        }
        self.count = self.count.saturating_add(1);
    }

    pub fn pending(&self) -> u16 {
        self.count
    }

    pub fn take(&mut self) -> Option<Rates> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f32;
        let average = self.sum.map(|sum| sum / n);
        *self = Self::default();
        Some(average)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yields_nothing() {
        assert_eq!(Decimator::default().take(), None);
    }

    #[test]
    fn averages_and_clears() {
        let mut d = Decimator::default();
        d.push(&[1.0, 2.0, -4.0]);
        d.push(&[3.0, 2.0, 0.0]);
        assert_eq!(d.pending(), 2);
        assert_eq!(d.take(), Some([2.0, 2.0, -2.0]));
        assert_eq!(d.take(), None);
    }
}
