pub mod config;
pub mod info;
pub mod predict;
pub mod samples;

pub use config::*;
pub use info::*;
pub use predict::*;
pub use samples::*;
