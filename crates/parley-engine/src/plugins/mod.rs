//! Optional lifecycle plugins. Each registers hooks on a [`DialogApp`](crate::DialogApp)
//! from an explicitly constructed configuration value.

pub mod auto_load;

pub use auto_load::{auto_load, AutoLoadConfig};
