//! Shared vocabulary for buildtrace components
//!
//! Every stage of a run speaks the types in this crate: reporters (the
//! preload library and the compiler wrapper) send [`Report`] payloads to
//! the collector, the collector persists [`EventRecord`]s, and citnames
//! reads them back. The [`envs`] module owns the reserved environment
//! keys that thread a session through an arbitrary process tree.

pub mod envs;
pub mod event;
pub mod wire;

pub use event::{Event, EventRecord, Execution, Report};
pub use wire::{read_frame, write_frame, WireError};
