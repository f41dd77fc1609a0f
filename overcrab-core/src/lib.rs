//! # Overcrab Core
//!
//! Processing-time bounded `ROWS` over-window aggregation for keyed streams.
//!
//! - [`window`] — The [`OverWindowOperator`](window::OverWindowOperator): per-key
//!   row buffer, timestamp order index, window resolution and pruning.
//! - [`time`] — Processing-time clocks, timers and idle-key retention.
//! - [`state`] — Keyed state backends: [`HashMapStateBackend`](state::HashMapStateBackend).
//! - [`serializer`] — Versioned binary serializers for timestamps and their
//!   compatibility snapshots.
//! - [`runtime`] — Operator contract, hash partitioning, the task loop and the
//!   [`ParallelRunner`](runtime::ParallelRunner).
//! - [`config`] — Window and retention configuration.
//! - [`types`] — Stream elements, barriers and [`JoinedRow`](types::JoinedRow).

pub mod config;
pub mod runtime;
pub mod serializer;
pub mod state;
pub mod time;
pub mod types;
pub mod window;
