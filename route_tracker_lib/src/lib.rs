pub mod fix;
pub mod guidance;
pub mod progress;
pub mod route;
pub mod spatial;
pub mod units;
