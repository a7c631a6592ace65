pub mod channel;
pub mod config;
pub mod error;
pub mod feed;
pub mod format;
pub mod geometry;
pub mod gpx_util;
pub mod maneuver_display;
pub mod observer;
pub mod reference_tracker;
pub mod session;
pub mod snap;
pub mod tracker;

pub use config::*;
pub use error::*;
pub use session::*;
pub use tracker::*;

#[cfg(test)]
pub(crate) mod test_support;
