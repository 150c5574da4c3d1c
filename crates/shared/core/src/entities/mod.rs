mod book;
mod event;
mod side;
mod trade;

pub use book::{BookLevel, BookSnapshot};
pub use event::FeedEvent;
pub use side::Side;
pub use trade::TradeTick;
