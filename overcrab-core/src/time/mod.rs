//! Processing-time services: the clock, per-key timers and idle-key retention.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::config::RetentionConfig;
use crate::state::{KeyedStateBackend, ValueStateHandle};
use crate::types::ProcessingTime;

mod clock;
mod retention;
mod timer_service;

pub use clock::*;
pub use retention::*;
pub use timer_service::*;

#[cfg(test)]
#[path = "tests/time_tests.rs"]
mod tests;
