//! Driver wiring for the courier decision core.
//!
//! The library half exposes the [`Driver`] (sensor events in, actuator
//! commands out) and a scripted in-process world used by the end-to-end
//! scenarios and by `local://` hosts.

#![forbid(unsafe_code)]

pub mod driver;
pub mod sim;

pub use driver::Driver;
pub use sim::SimWorld;
