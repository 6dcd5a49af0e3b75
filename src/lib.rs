//! tally library
//!
//! Chat polls and quizzes: drafting, publishing, live vote tallies and
//! creator-only management, delivered through a pluggable transport.

pub mod channels;
pub mod cli;
pub mod config;
pub mod logging;
pub mod polls;
