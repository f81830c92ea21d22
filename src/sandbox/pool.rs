//! Warm execution units, pooled per language
//!
//! Units are handed out round-robin. The cursor is advanced with a single
//! atomic `fetch_add`, so concurrent acquires never observe the same cursor
//! value. The pool does not block when every unit is busy: with more
//! concurrent sessions than units, a busy unit is shared and a warning is
//! logged.
//!
//! Every acquire yields its own [`UnitLease`]. A shared unit therefore has
//! one lease per session, and each session resets the unit when it gives its
//! lease back.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    error::{AppError, AppResult},
    models::Language,
};

/// A long-lived sandbox that executes commands for one language
#[derive(Debug)]
pub struct ExecutionUnit {
    id: String,
    language: Language,
    holders: AtomicUsize,
}

impl ExecutionUnit {
    pub fn new(id: impl Into<String>, language: Language) -> Self {
        Self {
            id: id.into(),
            language,
            holders: AtomicUsize::new(0),
        }
    }

    /// Runtime identifier (the container ID)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Number of sessions currently holding a lease on this unit
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }
}

/// One session's hold on a pooled unit
///
/// Not `Clone`: a lease is given back exactly once, by dropping it.
#[derive(Debug)]
pub struct UnitLease {
    unit: Arc<ExecutionUnit>,
}

impl Deref for UnitLease {
    type Target = ExecutionUnit;

    fn deref(&self) -> &ExecutionUnit {
        &self.unit
    }
}

impl Drop for UnitLease {
    fn drop(&mut self) {
        self.unit.holders.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct LanguagePool {
    units: Vec<Arc<ExecutionUnit>>,
    cursor: AtomicUsize,
}

/// Per-language round-robin pools
#[derive(Debug, Default)]
pub struct UnitPool {
    pools: HashMap<Language, LanguagePool>,
}

impl UnitPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a warm unit under its language
    pub fn insert(&mut self, unit: ExecutionUnit) {
        self.pools
            .entry(unit.language)
            .or_default()
            .units
            .push(Arc::new(unit));
    }

    /// Lease the next unit of a language in round-robin order
    pub fn acquire(&self, language: Language) -> AppResult<UnitLease> {
        let pool = self
            .pools
            .get(&language)
            .filter(|pool| !pool.units.is_empty())
            .ok_or_else(|| {
                AppError::NotFound(format!("No container pool for language: {language}"))
            })?;

        let index = pool.cursor.fetch_add(1, Ordering::Relaxed) % pool.units.len();
        let unit = Arc::clone(&pool.units[index]);

        if unit.holders.fetch_add(1, Ordering::AcqRel) > 0 {
            tracing::warn!(
                language = %language,
                unit_id = %unit.id,
                "All units busy, sharing an in-use unit"
            );
        }

        Ok(UnitLease { unit })
    }

    /// Number of units registered for a language
    pub fn size(&self, language: Language) -> usize {
        self.pools.get(&language).map_or(0, |pool| pool.units.len())
    }

    /// Total number of units across all languages
    pub fn len(&self) -> usize {
        self.pools.values().map(|pool| pool.units.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every unit, leaving the pool empty
    pub fn drain(&mut self) -> Vec<Arc<ExecutionUnit>> {
        self.pools
            .drain()
            .flat_map(|(_, pool)| pool.units)
            .collect()
    }
}
