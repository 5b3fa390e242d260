//! Event log, type machine, world clock, and acting scheduler for Chronicle.
//!
//! This crate turns the raw tables of `chronicle-db` into a world: facts are
//! appended as events and retracted by cancellation, relationships and tags
//! are views over valid events, and a deterministic scheduler advances one
//! global clock while interleaving every acting and tickable entity fairly.
//!
//! # Modules
//!
//! - [`world`] -- The [`World`] context that owns every subsystem.
//! - [`scheduler`] -- The time-ordered acting loop and [`AdvanceSummary`].
//! - [`acting`] -- [`Acting`] trait implemented by autonomous behaviours.
//! - [`ticking`] -- [`Tickable`] trait for entities that only age with time.
//! - [`actions`] -- [`ActionKind`] trait, action storage, queue outcomes.
//! - [`builtin`] -- The `action_wait` and `action_move` kinds.
//! - [`event_log`] -- Append, cancel, and validity queries.
//! - [`relationships`] -- Provider/receiver verb edges.
//! - [`tags`] -- Entity tags with optional integer values.
//! - [`entities`] -- Entity creation and core flags.
//! - [`registry`] -- Label interning and the core label set.
//! - [`clock`] -- The persisted, monotonic world clock.
//! - [`ids`] -- The global id allocator.
//! - [`config`] -- Configuration loading from `chronicle-config.yaml`.
//! - [`error`] -- [`CoreError`].

pub mod acting;
pub mod actions;
pub mod builtin;
pub mod clock;
pub mod config;
pub mod entities;
pub mod error;
pub mod event_log;
pub mod ids;
pub mod registry;
pub mod relationships;
pub mod scheduler;
pub mod tags;
pub mod ticking;
pub mod world;

pub use acting::{Acting, Idle};
pub use actions::{ActionKind, PerformOutcome, QueueOutcome};
pub use builtin::BuiltinKinds;
pub use config::ChronicleConfig;
pub use error::CoreError;
pub use scheduler::AdvanceSummary;
pub use ticking::Tickable;
pub use world::World;
