//! Per-object monitors.
//!
//! A monitor is a re-entrant {owner, depth, waiters} record. Entry blocks
//! on a condvar while another thread owns it; the record is released only
//! when the owner's depth returns to zero.

use parking_lot::{Condvar, Mutex};

use crate::fault::FaultKind;

#[derive(Debug, Default)]
struct MonState {
    owner: Option<u64>,
    depth: u32,
    waiters: u32,
}

/// One object's monitor.
#[derive(Debug, Default)]
pub struct Monitor {
    state: Mutex<MonState>,
    available: Condvar,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the monitor as `thread`, blocking while another thread owns
    /// it. Re-entry by the owner increments the depth.
    pub fn enter(&self, thread: u64) {
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(thread);
                    state.depth = 1;
                    return;
                }
                Some(owner) if owner == thread => {
                    state.depth += 1;
                    return;
                }
                Some(_) => {
                    state.waiters += 1;
                    self.available.wait(&mut state);
                    state.waiters -= 1;
                }
            }
        }
    }

    /// Exit the monitor as `thread`. Releases it and wakes one waiter when
    /// the depth reaches zero.
    pub fn exit(&self, thread: u64) -> Result<(), FaultKind> {
        let mut state = self.state.lock();
        if state.owner != Some(thread) {
            return Err(FaultKind::IllegalMonitorState);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.available.notify_one();
        }
        Ok(())
    }

    /// Current entry depth of `thread`, 0 if it is not the owner.
    pub fn depth_of(&self, thread: u64) -> u32 {
        let state = self.state.lock();
        if state.owner == Some(thread) {
            state.depth
        } else {
            0
        }
    }

    /// Number of threads blocked in [`enter`](Monitor::enter).
    pub fn waiters(&self) -> u32 {
        self.state.lock().waiters
    }
}
