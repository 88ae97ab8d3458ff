//! Database entity models for the scheduling engine.
//!
//! These Sea-ORM entities describe the three logical collections the engine
//! persists: bookable trial sessions, mentor-owned availability templates,
//! and named counters used to mint numeric identifiers.

/// Bookable time slots and their booking state.
pub mod trial_session;

/// Reusable weekly availability patterns owned by a mentor.
pub mod availability_template;

/// Per-key monotonic counters.
pub mod sequence;
