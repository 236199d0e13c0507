pub mod actors;
pub mod analytics;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod context;
pub mod monitors;
pub mod storage;
pub mod sync;
pub mod util;
