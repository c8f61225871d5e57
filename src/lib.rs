//! fast-merge - GitLab merge request and cherry-pick helper.
//!
//! The library backs a UI that talks to it over a line-delimited JSON
//! bridge: it creates merge requests and cherry-pick merge requests through
//! the GitLab REST API and pushes merge-conflict results once GitLab has
//! finished checking them.

pub mod bridge;
pub mod commands;
pub mod error;
pub mod models;
pub mod services;

pub use bridge::{run, serve, BridgeOptions};
pub use error::AppError;
