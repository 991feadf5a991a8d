//! Producers of battery pack telemetry: an equivalent-circuit pack model,
//! scripted scenarios and replay of recorded logs.

pub mod pack;
pub mod replay;
pub mod scenario;

pub use pack::{PackModel, PackParameters};
pub use scenario::Scenario;
