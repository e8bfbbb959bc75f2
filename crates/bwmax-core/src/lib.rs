pub mod config;
pub mod logging;

pub mod control;
pub mod counter;
pub mod error;
pub mod events;
pub mod fetch;
pub mod qos;
pub mod sampler;
pub mod session;
pub mod worker;

pub use error::SessionError;
pub use events::{Event, EventSink};
pub use session::{RunSession, SessionReport};
