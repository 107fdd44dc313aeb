//! Test doubles shared by the unit and behavioural suites.

mod channel;
mod sink;
mod sleeper;
mod world;

pub use channel::{Call, ScriptedChannel};
pub use sink::RecordingTelemetrySink;
pub use sleeper::CountingSleeper;
pub use world::{TestWorld, world};
