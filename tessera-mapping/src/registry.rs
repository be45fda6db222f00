//! Per-type mapping/command memoization.
//!
//! The cost of building a mapping and rendering its command text is paid
//! once per record type. The table is keyed by `TypeId`, guarded for the
//! first build, and hands out immutable shared values afterwards -
//! build-once-then-freeze.

use crate::column::MappedRecord;
use crate::commands::TableCommands;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tessera_core::TesseraResult;

static REGISTRY: Lazy<RwLock<HashMap<TypeId, Arc<TableCommands>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Mapping and cached command text for a record type.
///
/// The first call per type runs `R::build_mapping()` and derives the
/// command templates; every later call returns the same shared value.
/// Build failures are configuration errors and are reported on every
/// call rather than cached.
pub fn commands_for<R: MappedRecord>() -> TesseraResult<Arc<TableCommands>> {
    let key = TypeId::of::<R>();
    {
        let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(commands) = registry.get(&key) {
            return Ok(Arc::clone(commands));
        }
    }

    // Built outside the write lock; a racing first build is resolved by
    // or_insert keeping whichever entry landed first.
    let commands = Arc::new(TableCommands::new(R::build_mapping()?));
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(registry.entry(key).or_insert(commands)))
}
