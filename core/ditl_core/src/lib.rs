pub mod activity;
pub mod api;
pub mod calendar;
pub mod clip;
pub mod clock;
pub mod error;
pub mod quick_start;
pub mod running;
pub mod settings;
pub mod stats;
pub mod store;
pub mod timeline;
