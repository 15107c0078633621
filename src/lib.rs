// src/lib.rs

//! Dealcast Library
//!
//! Collects marketplace listings, drops the ones already broadcast, and
//! delivers the rest to a channel and to matching subscribers.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
