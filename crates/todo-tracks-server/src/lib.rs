// crates/todo-tracks-server/src/lib.rs
// todo-tracks - TODO markers tracked across git branches

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod browse;
pub mod cache;
pub mod config;
pub mod discover;
pub mod error;
pub mod git;
pub mod markers;
pub mod pattern;
pub mod repository;
pub mod status;
pub mod tree;
pub mod web;

pub use error::{Result, TrackError};
pub use repository::{RepoOptions, Repository};
pub use todo_tracks_types as types;
