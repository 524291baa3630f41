//! # Pathfetch Forum
//!
//! A small forum served and read through `pathfetch`. It exposes its modules
//! for integration testing.

pub mod db;
pub mod lifecycle;
pub mod model;
pub mod pages;
