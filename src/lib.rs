//! Library catalogue service: lending lifecycle, access rules, and review
//! aggregation, served over HTTP.

pub mod app;
pub mod modules;

pub use app::App;
