//! In-process operation event bus.

mod bus;

pub use bus::{EventBus, OperationEvent};
