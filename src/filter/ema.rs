//! Exponential Moving Average.

use nalgebra::{Point2, Vector2};

use super::Filter;

/// Values that can be linearly interpolated.
pub trait Lerp: Copy {
    /// Moves `self` towards `target` by the fraction `t`.
    fn lerp(self, target: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

impl Lerp for Point2<f32> {
    #[inline]
    fn lerp(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

impl Lerp for Vector2<f32> {
    #[inline]
    fn lerp(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

/// An Exponential Moving Average (EMA) filter.
///
/// Each output is `prev + (raw - prev) * factor`. The first value passes through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    factor: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// `factor` is the weight of the newest value and must be between 0.0 and 1.0. Values close
    /// to 1.0 track the input closely, values close to 0.0 smooth heavily.
    ///
    /// # Panics
    ///
    /// This method will panic if `factor` is not in between 0.0 and 1.0.
    pub fn new(factor: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&factor),
            "EMA factor must be in 0.0..=1.0, got {factor}"
        );
        Self { factor }
    }

    #[inline]
    pub fn factor(&self) -> f32 {
        self.factor
    }
}

impl<V: Lerp> Filter<V> for Ema {
    type State = Option<V>;

    fn filter(&self, state: &mut Self::State, value: V) -> V {
        let out = match *state {
            Some(prev) => prev.lerp(value, self.factor),
            None => value,
        };
        *state = Some(out);
        out
    }
}

/// An [`Ema`] over angles in degrees that always blends along the shorter arc.
///
/// Without this, a roll angle crossing the ±180° boundary would make the filtered value sweep
/// through the whole circle. Outputs are normalized to `[-180, 180)`.
#[derive(Debug, Clone, Copy)]
pub struct AngleEma {
    ema: Ema,
}

impl AngleEma {
    /// Creates a new angle filter. See [`Ema::new`] for the meaning of `factor`.
    pub fn new(factor: f32) -> Self {
        Self {
            ema: Ema::new(factor),
        }
    }
}

impl Filter<f32> for AngleEma {
    type State = Option<f32>;

    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        let out = match *state {
            Some(prev) => {
                let mut delta = value - prev;
                if delta > 180.0 {
                    delta -= 360.0;
                } else if delta < -180.0 {
                    delta += 360.0;
                }
                normalize_degrees(prev + delta * self.ema.factor)
            }
            None => value,
        };
        *state = Some(out);
        out
    }
}

/// Wraps an angle in degrees into `[-180, 180)`.
pub(crate) fn normalize_degrees(deg: f32) -> f32 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}
