//! Release and steal state for gracefully terminating nodes.
//!
//! Envelope-style nodes embed a [`Releasable`] and expose it through
//! [`Unit::releasable`](crate::node::Unit::releasable). The flags form
//! a tiny latched state machine: `release()`/`steal()` only *request*
//! the transition, and the node acknowledges it at the start of its
//! next process pass. Requests arriving while a transition is already
//! in flight are ignored.
//!
//! When such a node finishes it marks itself done; the prepare wrapper
//! then fires a one-shot done notification carrying the node's
//! user-data tag, which hosts use to observe voice lifetimes.

use alloc::boxed::Box;

use crate::node::UserData;

/// Callback invoked once when a releasable node finishes.
pub type DoneListener = Box<dyn FnMut(UserData)>;

/// Latched release/steal flags plus the one-shot done notification.
#[derive(Default)]
pub struct Releasable {
    should_release: bool,
    should_steal: bool,
    steal_forced: bool,
    is_releasing: bool,
    is_stealing: bool,
    is_done: bool,
    done_sent: bool,
    done_listener: Option<DoneListener>,
}

impl Releasable {
    /// Fresh state with no transition requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a graceful release. Ignored while already releasing or
    /// stealing.
    pub fn request_release(&mut self) {
        if !self.is_releasing && !self.is_stealing {
            self.should_release = true;
        }
    }

    /// Requests a steal. A forced steal finishes this block without
    /// even the usual one-block fade. Ignored while already stealing.
    pub fn request_steal(&mut self, forced: bool) {
        if !self.is_stealing {
            self.should_steal = true;
            self.steal_forced = forced;
        }
    }

    /// `true` once a release has been requested.
    #[must_use]
    pub fn should_release(&self) -> bool {
        self.should_release
    }

    /// `true` once a steal has been requested.
    #[must_use]
    pub fn should_steal(&self) -> bool {
        self.should_steal
    }

    /// `true` if the pending steal was forced.
    #[must_use]
    pub fn steal_forced(&self) -> bool {
        self.steal_forced
    }

    /// `true` once the node has acknowledged the release.
    #[must_use]
    pub fn is_releasing(&self) -> bool {
        self.is_releasing
    }

    /// `true` once the node has acknowledged the steal.
    #[must_use]
    pub fn is_stealing(&self) -> bool {
        self.is_stealing
    }

    /// `true` once the node has finished entirely.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// Acknowledges a pending release.
    pub fn mark_releasing(&mut self) {
        self.is_releasing = true;
    }

    /// Acknowledges a pending steal.
    pub fn mark_stealing(&mut self) {
        self.is_stealing = true;
    }

    /// Marks the node finished; the done notification fires on the
    /// next prepare pass.
    pub fn mark_done(&mut self) {
        self.is_done = true;
    }

    /// Installs the one-shot done callback.
    ///
    /// The callback must not touch the node it is installed on; it
    /// runs while that node is borrowed.
    pub fn set_done_listener(&mut self, listener: DoneListener) {
        self.done_listener = Some(listener);
    }

    /// Fires the done callback if the node is done and it has not
    /// fired yet. Called by the prepare wrapper.
    pub fn notify_done(&mut self, user_data: UserData) {
        if self.is_done && !self.done_sent {
            self.done_sent = true;
            if let Some(listener) = self.done_listener.as_mut() {
                listener(user_data);
            }
        }
    }
}
