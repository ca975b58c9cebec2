//! Priority-tiered composition of string stores.
//!
//! [`TieredStore`] presents a [`TierSet`] as one logical store with a
//! read-through-highest policy:
//!
//! - reads walk the tiers from highest to lowest priority and return the
//!   first hit, optionally repairing the higher tiers that missed
//! - writes go to the highest tier first, which decides the outcome, and
//!   then best-effort to every lower tier
//! - deletes and clears reach every tier, so a value removed from a higher
//!   tier cannot resurface from a lower one
//!
//! A tier miss and a tier failure are kept apart throughout. A read only
//! reports "not found" when no tier failed.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, trace, warn};

use tierkv_store::{BackendKind, Priority, StoreError, StoreResult, StringStore};

use crate::config::TierConfig;
use crate::error::TierResult;
use crate::factory::{assemble, HostCapabilities, TierSet};

/// Cross-tier state of one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KeyState {
    /// No tier holds the key.
    Absent,
    /// Every tier that holds the key agrees on its value.
    Present {
        value: String,
        /// Holding tiers, highest priority first.
        tiers: Vec<BackendKind>,
    },
    /// Tiers hold different values; highest priority first.
    Divergent { values: Vec<(BackendKind, String)> },
}

/// One logical [`StringStore`] over a set of tiers.
#[derive(Debug)]
pub struct TieredStore {
    tiers: TierSet,
    read_repair: bool,
}

impl TieredStore {
    pub fn new(tiers: TierSet, read_repair: bool) -> Self {
        Self { tiers, read_repair }
    }

    /// Assemble the tiers the host supports and compose them.
    pub async fn from_config(config: &TierConfig, caps: &HostCapabilities) -> TierResult<Self> {
        let tiers = assemble(config, caps).await?;
        Ok(Self::new(tiers, config.read_repair))
    }

    /// The composed tiers, for addressing one of them directly.
    pub fn tiers(&self) -> &TierSet {
        &self.tiers
    }

    pub fn read_repair(&self) -> bool {
        self.read_repair
    }

    /// Report how `key` is held across the tiers.
    ///
    /// Unlike [`get`](StringStore::get), every tier is consulted and any
    /// tier failure is returned.
    pub async fn inspect(&self, key: &str) -> StoreResult<KeyState> {
        self.validate_key(key)?;
        let mut found: Vec<(BackendKind, String)> = Vec::new();
        for tier in self.tiers.iter_by_precedence() {
            if let Some(value) = tier.get(key).await? {
                found.push((tier.backend(), value));
            }
        }

        let Some((_, first)) = found.first() else {
            return Ok(KeyState::Absent);
        };
        if found.iter().all(|(_, v)| v == first) {
            let value = first.clone();
            Ok(KeyState::Present {
                value,
                tiers: found.into_iter().map(|(b, _)| b).collect(),
            })
        } else {
            Ok(KeyState::Divergent { values: found })
        }
    }

    /// Write `value` into each of `missed`, logging failures.
    async fn repair(&self, missed: &[&dyn StringStore], key: &str, value: &str) {
        for tier in missed {
            match tier.set(key, value).await {
                Ok(()) => debug!(backend = %tier.backend(), key, "tier repaired"),
                Err(e) => warn!(backend = %tier.backend(), key, error = %e, "read repair failed"),
            }
        }
    }
}

#[async_trait]
impl StringStore for TieredStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Tiered
    }

    fn scope(&self) -> &str {
        self.tiers.highest().scope()
    }

    fn priority(&self) -> Priority {
        self.tiers.highest().priority()
    }

    /// A key is usable only if every tier accepts it.
    fn validate_key(&self, key: &str) -> StoreResult<()> {
        for tier in self.tiers.iter() {
            tier.validate_key(key)?;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.validate_key(key)?;
        let mut missed: Vec<&dyn StringStore> = Vec::new();
        let mut first_failure: Option<StoreError> = None;

        for tier in self.tiers.iter_by_precedence() {
            match tier.get(key).await {
                Ok(Some(value)) => {
                    trace!(backend = %tier.backend(), key, "tiered hit");
                    if self.read_repair && !missed.is_empty() {
                        self.repair(&missed, key, &value).await;
                    }
                    return Ok(Some(value));
                }
                Ok(None) => missed.push(tier.as_ref()),
                Err(e) => {
                    warn!(backend = %tier.backend(), key, error = %e, "tier read failed; trying next tier");
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.validate_key(key)?;
        self.tiers.highest().set(key, value).await?;

        for tier in self.tiers.iter_by_precedence().skip(1) {
            if let Err(e) = tier.set(key, value).await {
                warn!(backend = %tier.backend(), key, error = %e, "lower tier write failed");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.validate_key(key)?;
        let mut removed = false;
        let mut first_failure: Option<StoreError> = None;
        for tier in self.tiers.iter_by_precedence() {
            match tier.delete(key).await {
                Ok(r) => removed |= r,
                Err(e) => {
                    warn!(backend = %tier.backend(), key, error = %e, "tier delete failed");
                    first_failure.get_or_insert(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut first_failure: Option<StoreError> = None;
        for tier in self.tiers.iter_by_precedence() {
            if let Err(e) = tier.clear().await {
                warn!(backend = %tier.backend(), error = %e, "tier clear failed");
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut union = BTreeSet::new();
        let mut first_failure: Option<StoreError> = None;
        let mut answered = 0usize;
        for tier in self.tiers.iter() {
            match tier.keys().await {
                Ok(keys) => {
                    answered += 1;
                    union.extend(keys);
                }
                Err(e) => {
                    warn!(backend = %tier.backend(), error = %e, "tier key listing failed; skipped");
                    first_failure.get_or_insert(e);
                }
            }
        }
        match first_failure {
            Some(e) if answered == 0 => Err(e),
            _ => Ok(union.into_iter().collect()),
        }
    }
}
