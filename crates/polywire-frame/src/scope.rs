//! Single-thread ownership bracket for a wire.

use std::backtrace::Backtrace;
use std::thread::{self, ThreadId};

use crate::error::{FrameError, Result};

/// Tracks which thread currently owns a wire.
///
/// A wire instance is not safe for concurrent use. `start_use` captures the
/// calling thread and an acquisition backtrace; a later `start_use` from a
/// different thread fails with [`FrameError::InUse`] naming both threads.
/// Brackets nest: ownership is released once every `start_use` has been
/// matched by an `end_use`.
#[derive(Debug, Default)]
pub struct UseScope {
    owner: Option<Owner>,
    count: u32,
}

#[derive(Debug)]
struct Owner {
    thread: ThreadId,
    description: String,
}

fn describe_current() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => format!("{name} ({:?})", current.id()),
        None => format!("{:?}", current.id()),
    }
}

impl UseScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the wire for the current thread.
    pub fn start_use(&mut self) -> Result<()> {
        let current = thread::current().id();
        match &self.owner {
            Some(owner) if owner.thread != current => {
                return Err(FrameError::InUse {
                    owner: owner.description.clone(),
                    current: describe_current(),
                });
            }
            Some(_) => {}
            None => {
                let acquired_at = Backtrace::capture();
                self.owner = Some(Owner {
                    thread: current,
                    description: format!("{}, acquired at: {acquired_at}", describe_current()),
                });
            }
        }
        self.count += 1;
        Ok(())
    }

    /// Release one level of ownership.
    pub fn end_use(&mut self) -> Result<()> {
        let current = thread::current().id();
        match &self.owner {
            Some(owner) if owner.thread == current => {
                self.count = self.count.saturating_sub(1);
                if self.count == 0 {
                    self.owner = None;
                }
                Ok(())
            }
            Some(owner) => Err(FrameError::InUse {
                owner: owner.description.clone(),
                current: describe_current(),
            }),
            None => Err(FrameError::InUse {
                owner: "nobody".to_string(),
                current: describe_current(),
            }),
        }
    }

    /// True while some thread holds the wire.
    pub fn is_held(&self) -> bool {
        self.owner.is_some()
    }
}
