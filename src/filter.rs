//! Temporal smoothing filters.
//!
//! Filters are split into an immutable parameter object implementing [`Filter`] and a mutable
//! [`Filter::State`], so that the state can be inspected, reset and owned by whoever drives the
//! filter.

mod ema;

use std::marker::PhantomData;

pub use ema::{AngleEma, Ema, Lerp};
pub(crate) use ema::normalize_degrees;

/// A filter for values of type `V`.
pub trait Filter<V> {
    /// The filter's internal state. [`Default::default`] must produce a state that has not seen
    /// any value yet.
    type State: Default;

    /// Feeds a new value into the filter, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}

/// Bundles a [`Filter`] with its state, for when nobody else needs to look at the state.
pub struct SimpleFilter<F: Filter<V>, V> {
    filter: F,
    state: F::State,
    _value: PhantomData<fn(V) -> V>,
}

impl<F: Filter<V>, V> SimpleFilter<F, V> {
    /// Wraps `filter` with a fresh state.
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            state: F::State::default(),
            _value: PhantomData,
        }
    }

    /// Feeds `value` through the filter. See [`Filter::filter`].
    pub fn filter(&mut self, value: V) -> V {
        self.filter.filter(&mut self.state, value)
    }

    /// Forgets all previously seen values.
    pub fn reset(&mut self) {
        self.state = F::State::default();
    }
}
