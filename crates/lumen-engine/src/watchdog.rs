// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Advisory time limits for render passes.

use crossbeam_channel::{RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

type ExpiryCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies an armed deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadlineId(u64);

enum Command {
    Arm {
        id: DeadlineId,
        deadline: Instant,
        on_expiry: ExpiryCallback,
    },
    Cancel(DeadlineId),
    Shutdown,
}

struct Pending {
    id: DeadlineId,
    deadline: Instant,
    on_expiry: ExpiryCallback,
}

/// A single thread that runs a callback when an armed deadline passes.
///
/// The thread sleeps until the nearest deadline or the next command, whichever
/// comes first. Expiry only runs the callback: the work being timed is never
/// interrupted.
pub struct TimeoutWatchdog {
    sender: Sender<Command>,
    next_id: AtomicU64,
    handle: Option<thread::JoinHandle<()>>,
}

impl TimeoutWatchdog {
    /// Starts the watchdog thread.
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Command>();
        let handle = thread::Builder::new()
            .name("lumen-watchdog".into())
            .spawn(move || {
                let mut pending: Vec<Pending> = Vec::new();
                log::debug!("Timeout watchdog started.");
                loop {
                    let received = match pending.iter().map(|p| p.deadline).min() {
                        Some(deadline) => receiver
                            .recv_timeout(deadline.saturating_duration_since(Instant::now())),
                        None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match received {
                        Ok(Command::Arm {
                            id,
                            deadline,
                            on_expiry,
                        }) => pending.push(Pending {
                            id,
                            deadline,
                            on_expiry,
                        }),
                        Ok(Command::Cancel(id)) => pending.retain(|p| p.id != id),
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    let now = Instant::now();
                    let (expired, waiting): (Vec<_>, Vec<_>) =
                        pending.drain(..).partition(|p| p.deadline <= now);
                    pending = waiting;
                    for entry in expired {
                        (entry.on_expiry)();
                    }
                }
                log::debug!(
                    "Timeout watchdog stopped with {} deadline(s) pending.",
                    pending.len()
                );
            })?;
        Ok(Self {
            sender,
            next_id: AtomicU64::new(0),
            handle: Some(handle),
        })
    }

    /// Runs `on_expiry` on the watchdog thread once `timeout` has elapsed,
    /// unless the deadline is cancelled first.
    pub fn arm<F>(&self, timeout: Duration, on_expiry: F) -> DeadlineId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = DeadlineId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let command = Command::Arm {
            id,
            deadline: Instant::now() + timeout,
            on_expiry: Box::new(on_expiry),
        };
        if self.sender.send(command).is_err() {
            log::error!("Timeout watchdog is gone, deadline {id:?} will never fire.");
        }
        id
    }

    /// Forgets a deadline. Does nothing if it already fired.
    pub fn cancel(&self, id: DeadlineId) {
        // A send failure means the thread has stopped and nothing can fire anyway.
        let _ = self.sender.send(Command::Cancel(id));
    }
}

impl Drop for TimeoutWatchdog {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Timeout watchdog thread panicked.");
            }
        }
    }
}
