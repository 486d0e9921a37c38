//! Callback bridge between native signals and host handlers.
//!
//! A signal slot owns its handler. For host callables that ownership is an
//! `Arc<dyn HostCallable>`; the host reference is retained once when the
//! handler is wrapped and released once when the last `Arc` goes away, which
//! happens when the emitter is destroyed or the slot is reconnected.
//!
//! ```text
//! PushButton ──owns──▶ Slot ──owns──▶ Arc<ForeignCallable> ──retain/release──▶ host object
//! ```

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use crate::handle::ObjectId;

/// A handler living on the host side of the boundary.
pub trait HostCallable: Send + Sync {
    /// Whether the host considers this value invocable.
    fn is_callable(&self) -> bool;

    /// Invoke with no arguments. Results are the host's to discard.
    fn call(&self);
}

/// C description of a host callable.
///
/// `invoke` is `None` when the host value is not callable. `retain` and
/// `release` bracket the bridge's co-ownership of `user_data`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostCallback {
    pub user_data: *mut c_void,
    pub invoke: Option<extern "C" fn(*mut c_void)>,
    pub retain: Option<extern "C" fn(*mut c_void)>,
    pub release: Option<extern "C" fn(*mut c_void)>,
}

/// Callback for native clients. Receives the emitting handle.
pub type NoArgumentsCallback = extern "C" fn(sender: usize);

/// A retained host callable received through [`HostCallback`].
pub struct ForeignCallable {
    raw: HostCallback,
}

// SAFETY: every toolkit call runs on the event-dispatch thread, and
// `user_data` is only ever handed back to the host's own functions.
unsafe impl Send for ForeignCallable {}
unsafe impl Sync for ForeignCallable {}

impl ForeignCallable {
    /// Take a reference to the host value.
    pub fn retain(raw: HostCallback) -> Self {
        if let Some(retain) = raw.retain {
            retain(raw.user_data);
        }
        Self { raw }
    }
}

impl HostCallable for ForeignCallable {
    fn is_callable(&self) -> bool {
        self.raw.invoke.is_some()
    }

    fn call(&self) {
        if let Some(invoke) = self.raw.invoke {
            invoke(self.raw.user_data);
        }
    }
}

impl Drop for ForeignCallable {
    fn drop(&mut self) {
        if let Some(release) = self.raw.release {
            release(self.raw.user_data);
        }
    }
}

/// Signals an object can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Clicked,
    Destroyed,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Clicked => "clicked",
            Signal::Destroyed => "destroyed",
        })
    }
}

/// What a slot holds.
#[derive(Clone)]
pub enum Handler {
    Host(Arc<dyn HostCallable>),
    /// Plain function pointer; assumed to outlive the emitter.
    Native(NoArgumentsCallback),
}

/// Outcome of one signal emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Invoked,
    NotCallable,
    Unconnected,
}

impl Handler {
    pub fn host(callable: impl HostCallable + 'static) -> Self {
        Handler::Host(Arc::new(callable))
    }

    /// Deliver one emission of `signal` from `sender`.
    ///
    /// Must be called without the toolkit lock held: handlers may call back
    /// into the toolkit.
    pub fn deliver(&self, sender: ObjectId, signal: Signal) -> Delivery {
        match self {
            Handler::Host(callable) => {
                if callable.is_callable() {
                    callable.call();
                    Delivery::Invoked
                } else {
                    log::warn!("{signal} handler of {sender} is not callable; ignoring");
                    Delivery::NotCallable
                }
            }
            Handler::Native(callback) => {
                callback(sender.to_raw());
                Delivery::Invoked
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Host(_) => f.write_str("Handler::Host"),
            Handler::Native(callback) => write!(f, "Handler::Native({:p})", *callback as *const ()),
        }
    }
}

/// Single-occupancy handler slot.
#[derive(Debug, Default)]
pub struct Slot {
    handler: Option<Handler>,
}

impl Slot {
    /// Connect `handler`, handing back whatever it replaced.
    ///
    /// The caller drops the returned handler once the toolkit lock is
    /// released, since releasing a host reference may re-enter the toolkit.
    pub fn connect(&mut self, handler: Handler) -> Option<Handler> {
        self.handler.replace(handler)
    }

    pub fn take(&mut self) -> Option<Handler> {
        self.handler.take()
    }

    /// A clone for delivery outside the lock.
    pub fn handler(&self) -> Option<Handler> {
        self.handler.clone()
    }
}
