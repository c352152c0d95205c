//! hackd: a hackathon collaboration backend.
//!
//! Four domain registries (teams, projects, mentors, chat rooms), each a
//! single-writer worker over an actor-style kernel; a chat singleton
//! with pub/sub fan-out that is globally unique across a small cluster;
//! and whole-file JSON snapshots written after every mutation and
//! replayed on start.
//!
//! The [`facade::Hub`] returned by [`supervisor::start`] is the whole
//! public surface.

pub mod chat;
pub mod config;
pub mod error;
pub mod facade;
pub mod harness;
pub mod kernel;
pub mod model;
pub mod registry;
pub mod store;
pub mod supervisor;

pub use config::Config;
pub use error::{DomainError, DomainResult};
pub use facade::Hub;
