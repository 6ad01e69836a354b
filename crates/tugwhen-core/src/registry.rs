//! Stub registry: registered specifications per target member.
//!
//! Each `(target, member)` pair owns a [`Bucket`] of specifications in
//! registration order. Buckets are append-only and shared with the installed
//! interceptor, so a specification registered later is seen by the live
//! interceptor on its next call. Resolution returns the first specification
//! whose key matches; registration order is the only tie-break.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::behavior::Behavior;
use crate::key::CanonicalKey;
use crate::matcher::{matches, KeywordMatch};

// ============================================================================
// Keys
// ============================================================================

/// Identifies one member of one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetKey {
    target: String,
    member: String,
}

impl TargetKey {
    pub fn new(target: impl Into<String>, member: impl Into<String>) -> Self {
        TargetKey {
            target: target.into(),
            member: member.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.member)
    }
}

/// A registered `(example key, behavior)` pair.
#[derive(Debug, Clone)]
pub struct CallSpecification {
    key: CanonicalKey,
    behavior: Behavior,
}

impl CallSpecification {
    pub fn new(key: CanonicalKey, behavior: Behavior) -> Self {
        CallSpecification { key, behavior }
    }

    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }
}

/// No specification in a bucket matches a call.
///
/// Never surfaced to callers: the interceptor answers it by running the
/// original implementation.
#[derive(Debug, Clone, Error)]
#[error("no specification for {target} matches {call}")]
pub struct UnmatchedCall {
    pub target: TargetKey,
    pub call: CanonicalKey,
}

// ============================================================================
// Buckets
// ============================================================================

/// Ordered specifications of one target member.
#[derive(Debug)]
pub struct Bucket {
    target: TargetKey,
    entries: Vec<CallSpecification>,
}

/// A bucket shared between the registry and a live interceptor.
pub type SharedBucket = Arc<RwLock<Bucket>>;

impl Bucket {
    pub fn new(target: TargetKey) -> Self {
        Bucket {
            target,
            entries: Vec::new(),
        }
    }

    pub fn target(&self) -> &TargetKey {
        &self.target
    }

    /// Append a specification and return its index.
    ///
    /// An entry whose key equals an earlier one is kept but can never win:
    /// the earlier entry always matches first.
    pub fn push(&mut self, spec: CallSpecification) -> usize {
        if let Some(earlier) = self.entries.iter().position(|e| e.key == spec.key) {
            warn!(
                target_key = %self.target,
                key = %spec.key,
                earlier,
                "specification is shadowed by an identical earlier one"
            );
        }
        self.entries.push(spec);
        self.entries.len() - 1
    }

    /// First specification matching `call`, with its index.
    pub fn resolve(
        &self,
        call: &CanonicalKey,
        keywords: KeywordMatch,
    ) -> Result<(usize, Behavior), UnmatchedCall> {
        self.entries
            .iter()
            .position(|spec| matches(call, &spec.key, keywords))
            .map(|index| (index, self.entries[index].behavior.clone()))
            .ok_or_else(|| UnmatchedCall {
                target: self.target.clone(),
                call: call.clone(),
            })
    }

    pub fn entries(&self) -> &[CallSpecification] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn read_bucket(bucket: &SharedBucket) -> RwLockReadGuard<'_, Bucket> {
    bucket.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_bucket(bucket: &SharedBucket) -> RwLockWriteGuard<'_, Bucket> {
    bucket.write().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Registry
// ============================================================================

/// All buckets of one stubbing context.
#[derive(Debug, Default)]
pub struct StubRegistry {
    buckets: BTreeMap<TargetKey, SharedBucket>,
}

impl StubRegistry {
    pub fn new() -> Self {
        StubRegistry::default()
    }

    /// Append `spec` to the bucket of `target`, creating it if needed.
    pub fn register(&mut self, target: TargetKey, spec: CallSpecification) -> SharedBucket {
        let bucket = self
            .buckets
            .entry(target.clone())
            .or_insert_with(|| Arc::new(RwLock::new(Bucket::new(target.clone()))));
        let index = write_bucket(bucket).push(spec);
        debug!(target_key = %target, index, "registered specification");
        Arc::clone(bucket)
    }

    pub fn bucket(&self, target: &TargetKey) -> Option<SharedBucket> {
        self.buckets.get(target).map(Arc::clone)
    }

    /// Behavior of the first specification of `target` matching `call`.
    pub fn lookup(
        &self,
        target: &TargetKey,
        call: &CanonicalKey,
        keywords: KeywordMatch,
    ) -> Option<Behavior> {
        let bucket = self.buckets.get(target)?;
        let resolved = read_bucket(bucket).resolve(call, keywords);
        resolved.ok().map(|(_, behavior)| behavior)
    }

    /// Forget every specification. Buckets still held by live interceptors
    /// are emptied, so those interceptors fall back to the original.
    pub fn clear(&mut self) {
        for bucket in self.buckets.values() {
            write_bucket(bucket).clear();
        }
        self.buckets.clear();
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetKey> {
        self.buckets.keys()
    }

    /// Total number of registered specifications.
    pub fn len(&self) -> usize {
        self.buckets.values().map(|b| read_bucket(b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
