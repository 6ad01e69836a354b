//! Patchable targets.
//!
//! A [`Target`] is a named collection of members (functions, methods, class
//! methods), each with a declared [`Signature`] and a swappable slot holding
//! the callable that currently implements it. Code under test calls members
//! through [`Target::invoke`], so replacing a slot's callable intercepts every
//! later call without touching the caller.
//!
//! The [`PatchTarget`] trait is the seam the interceptor works against; only a
//! [`PatchHandle`] ever swaps a slot, and stopping the handle restores the
//! callable that was there before. A slot holds at most one live patch, so a
//! restore never writes back a stale replacement.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::bind::CallArgs;
use crate::error::CallResult;
use crate::signature::Signature;
use crate::value::Value;

/// A member implementation: receives the raw call arguments.
pub type Callable = Arc<dyn Fn(&CallArgs) -> CallResult + Send + Sync>;

/// Errors raised by the patch layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("{target} has no member '{member}'")]
    UnknownMember { target: String, member: String },

    #[error("{target}.{member} is already patched")]
    AlreadyPatched { target: String, member: String },
}

// ============================================================================
// Patch Target Seam
// ============================================================================

/// Something whose members can be temporarily replaced.
pub trait PatchTarget {
    /// Name used in diagnostics and as half of the registry key.
    fn display_name(&self) -> &str;

    /// Declared signature of `member`.
    fn signature(&self, member: &str) -> Option<Signature>;

    /// Callable currently installed for `member`.
    fn current(&self, member: &str) -> Option<Callable>;

    /// Install `replacement` for `member` until the returned handle stops.
    ///
    /// Fails with [`PatchError::AlreadyPatched`] while another handle is live.
    fn patch(&self, member: &str, replacement: Callable) -> Result<PatchHandle, PatchError>;

    /// Returns true while a patch of `member` is live.
    fn is_patched(&self, _member: &str) -> bool {
        false
    }
}

// ============================================================================
// Slots
// ============================================================================

struct Slot {
    callable: RwLock<Callable>,
    patched: AtomicBool,
}

impl Slot {
    fn new(callable: Callable) -> Self {
        Slot {
            callable: RwLock::new(callable),
            patched: AtomicBool::new(false),
        }
    }

    fn get(&self) -> Callable {
        Arc::clone(&self.callable.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn swap(&self, callable: Callable) -> Callable {
        let mut guard = self.callable.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, callable)
    }
}

#[derive(Clone)]
struct Member {
    signature: Signature,
    slot: Arc<Slot>,
}

// ============================================================================
// Target
// ============================================================================

/// A named set of swappable members.
///
/// Cloning a `Target` shares its slots: a patch applied through one clone is
/// visible through all of them.
#[derive(Clone)]
pub struct Target {
    name: String,
    members: BTreeMap<String, Member>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Target {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    /// Builder form of [`Target::define`].
    pub fn member<F>(mut self, name: impl Into<String>, signature: Signature, f: F) -> Self
    where
        F: Fn(&CallArgs) -> CallResult + Send + Sync + 'static,
    {
        self.define(name, signature, f);
        self
    }

    /// Define (or redefine) a member with its original implementation.
    pub fn define<F>(&mut self, name: impl Into<String>, signature: Signature, f: F)
    where
        F: Fn(&CallArgs) -> CallResult + Send + Sync + 'static,
    {
        self.members.insert(
            name.into(),
            Member {
                signature,
                slot: Arc::new(Slot::new(Arc::new(f))),
            },
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Returns true while a patch of `member` is active.
    pub fn is_patched(&self, member: &str) -> bool {
        self.members
            .get(member)
            .is_some_and(|m| m.slot.patched.load(Ordering::SeqCst))
    }

    /// Call `member` through its slot.
    pub fn invoke(&self, member: &str, args: CallArgs) -> CallResult {
        let callable = self.current(member).ok_or_else(|| self.unknown(member))?;
        callable(&args)
    }

    /// Call `member` as a method of `receiver`.
    pub fn invoke_method(
        &self,
        member: &str,
        receiver: impl Into<Value>,
        args: CallArgs,
    ) -> CallResult {
        self.invoke(member, args.with_receiver(receiver))
    }

    fn unknown(&self, member: &str) -> PatchError {
        PatchError::UnknownMember {
            target: self.name.clone(),
            member: member.to_string(),
        }
    }
}

impl PatchTarget for Target {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn signature(&self, member: &str) -> Option<Signature> {
        self.members.get(member).map(|m| m.signature.clone())
    }

    fn current(&self, member: &str) -> Option<Callable> {
        self.members.get(member).map(|m| m.slot.get())
    }

    fn is_patched(&self, member: &str) -> bool {
        Target::is_patched(self, member)
    }

    fn patch(&self, member: &str, replacement: Callable) -> Result<PatchHandle, PatchError> {
        let slot = self
            .members
            .get(member)
            .map(|m| Arc::clone(&m.slot))
            .ok_or_else(|| self.unknown(member))?;
        if slot
            .patched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PatchError::AlreadyPatched {
                target: self.name.clone(),
                member: member.to_string(),
            });
        }
        let previous = slot.swap(replacement);
        debug!(target_name = %self.name, member, "patched");
        Ok(PatchHandle {
            label: format!("{}.{}", self.name, member),
            slot,
            previous: Some(previous),
        })
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Patch Handle
// ============================================================================

/// An active patch. Stopping it (explicitly or on drop) restores the callable
/// the slot held before the patch.
pub struct PatchHandle {
    label: String,
    slot: Arc<Slot>,
    previous: Option<Callable>,
}

impl PatchHandle {
    /// Restore the pre-patch callable. Stopping twice is a no-op.
    pub fn stop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.slot.swap(previous);
            self.slot.patched.store(false, Ordering::SeqCst);
            debug!(patch = %self.label, "restored");
        }
    }

    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }

    /// `target.member` this handle patches.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for PatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchHandle")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::error::CallError;
    use crate::signature::Parameter;

    fn calculator() -> Target {
        Target::new("Calculator")
            .member(
                "double",
                Signature::new(vec![Parameter::regular("x")]).unwrap(),
                |args: &CallArgs| Ok(Value::Int(args.get(0).and_then(Value::as_int).unwrap_or(0) * 2)),
            )
            .member("zero", Signature::empty(), |_: &CallArgs| Ok(Value::Int(0)))
    }

    fn constant(v: i64) -> Callable {
        Arc::new(move |_: &CallArgs| Ok(Value::Int(v)))
    }

    #[test]
    fn invokes_original() {
        let target = calculator();
        assert_eq!(target.invoke("double", args!(21)).unwrap(), Value::Int(42));
        assert!(!target.is_patched("double"));
    }

    #[test]
    fn unknown_member_is_reported() {
        let err = calculator().invoke("triple", args!(1)).unwrap_err();
        assert!(matches!(
            err,
            CallError::Patch(PatchError::UnknownMember { ref member, .. }) if member == "triple"
        ));
        assert_eq!(err.to_string(), "Calculator has no member 'triple'");
    }

    #[test]
    fn patch_replaces_and_stop_restores() {
        let target = calculator();
        let mut handle = target.patch("double", constant(7)).unwrap();
        assert!(target.is_patched("double"));
        assert_eq!(target.invoke("double", args!(21)).unwrap(), Value::Int(7));

        handle.stop();
        assert!(!handle.is_active());
        assert!(!target.is_patched("double"));
        assert_eq!(target.invoke("double", args!(21)).unwrap(), Value::Int(42));

        handle.stop();
        assert_eq!(target.invoke("double", args!(21)).unwrap(), Value::Int(42));
    }

    #[test]
    fn drop_restores() {
        let target = calculator();
        {
            let _handle = target.patch("zero", constant(1)).unwrap();
            assert_eq!(target.invoke("zero", args!()).unwrap(), Value::Int(1));
        }
        assert_eq!(target.invoke("zero", args!()).unwrap(), Value::Int(0));
    }

    #[test]
    fn members_are_independent() {
        let target = calculator();
        let _handle = target.patch("zero", constant(5)).unwrap();
        assert_eq!(target.invoke("double", args!(2)).unwrap(), Value::Int(4));
        assert!(!target.is_patched("double"));
    }

    #[test]
    fn second_live_patch_is_rejected() {
        let target = calculator();
        let alias = target.clone();
        let mut first = target.patch("zero", constant(1)).unwrap();

        let err = alias.patch("zero", constant(2)).unwrap_err();
        assert_eq!(
            err,
            PatchError::AlreadyPatched {
                target: "Calculator".to_string(),
                member: "zero".to_string(),
            }
        );
        assert_eq!(target.invoke("zero", args!()).unwrap(), Value::Int(1));

        first.stop();
        assert!(!PatchTarget::is_patched(&target, "zero"));
        assert_eq!(target.invoke("zero", args!()).unwrap(), Value::Int(0));

        let _again = alias.patch("zero", constant(3)).unwrap();
        assert_eq!(target.invoke("zero", args!()).unwrap(), Value::Int(3));
    }

    #[test]
    fn clones_share_slots() {
        let target = calculator();
        let alias = target.clone();
        let _handle = target.patch("zero", constant(3)).unwrap();
        assert_eq!(alias.invoke("zero", args!()).unwrap(), Value::Int(3));
    }

    #[test]
    fn patching_unknown_member_fails() {
        let err = calculator().patch("nope", constant(1)).unwrap_err();
        assert_eq!(
            err,
            PatchError::UnknownMember {
                target: "Calculator".to_string(),
                member: "nope".to_string(),
            }
        );
    }

    #[test]
    fn method_receives_receiver_first() {
        let target = Target::new("Klass").member(
            "whoami",
            Signature::new(vec![Parameter::regular("self")]).unwrap(),
            |args: &CallArgs| Ok(args.get(0).cloned().unwrap_or(Value::None)),
        );
        let obj = crate::value::ObjectRef::new("Klass");
        assert_eq!(
            target.invoke_method("whoami", &obj, args!()).unwrap(),
            Value::Object(obj)
        );
        assert_eq!(target.members().collect::<Vec<_>>(), ["whoami"]);
    }
}
