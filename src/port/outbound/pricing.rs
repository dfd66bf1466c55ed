//! Price evolution port.
//!
//! The simulator asks a [`PriceModel`] for each product's next price once per
//! tick. Implementations own their randomness; the simulator only supplies
//! the current price.

/// Produces the next price from the current one.
pub trait PriceModel: Send {
    /// Next price after one tick. Must be at least 1.
    fn next_price(&mut self, current: i64) -> i64;
}

impl<M: PriceModel + ?Sized> PriceModel for Box<M> {
    fn next_price(&mut self, current: i64) -> i64 {
        (**self).next_price(current)
    }
}
