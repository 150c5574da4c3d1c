//! Bounded streaming statistics

mod ring;
mod rolling;

pub use ring::RingBuffer;
pub use rolling::RollingWindow;
