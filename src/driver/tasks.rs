//! Work marshalled onto the frame thread.
//!
//! Callers on other threads enqueue a closure and block until the frame
//! thread has run it.  A caller that already is the frame thread, or that
//! calls before the loop has started, runs the closure inline.

use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame loop went away before running the task.
    #[error("frame loop stopped before the task ran")]
    Stopped,
}

pub(crate) struct Task {
    run: Box<dyn FnOnce() + Send>,
}

impl Task {
    pub(crate) fn run(self) {
        (self.run)();
    }
}

/// Cloneable, `Send` handle used by other threads to reach the frame thread.
#[derive(Clone)]
pub struct FrameHandle {
    sender: Sender<Task>,
    frame_thread: Arc<RwLock<Option<ThreadId>>>,
}

impl FrameHandle {
    /// `true` when called from the thread currently running the frame loop.
    pub fn is_frame_thread(&self) -> bool {
        *self.frame_thread.read() == Some(thread::current().id())
    }

    /// Runs `f` on the frame thread and returns its result.
    ///
    /// Blocks until the frame thread has drained the task.  Runs inline when
    /// the loop is not running or when already on the frame thread.
    pub fn run_on_frame<F, R>(&self, f: F) -> Result<R, FrameError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let running = self.frame_thread.read();
        let inline = match *running {
            None => true,
            Some(id) => id == thread::current().id(),
        };
        if inline {
            drop(running);
            return Ok(f());
        }

        let (done_tx, done_rx) = bounded(1);
        let task = Task {
            run: Box::new(move || {
                let _ = done_tx.send(f());
            }),
        };
        // Hold the guard until the task is queued so `exit` drains it.
        let sent = self.sender.send(task);
        drop(running);
        sent.map_err(|_| FrameError::Stopped)?;
        done_rx.recv().map_err(|_| FrameError::Stopped)
    }
}

/// The frame thread's end of the queue.
pub(crate) struct FrameTasks {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    frame_thread: Arc<RwLock<Option<ThreadId>>>,
}

impl FrameTasks {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        FrameTasks {
            sender,
            receiver,
            frame_thread: Arc::new(RwLock::new(None)),
        }
    }

    pub(crate) fn handle(&self) -> FrameHandle {
        FrameHandle {
            sender: self.sender.clone(),
            frame_thread: Arc::clone(&self.frame_thread),
        }
    }

    pub(crate) fn receiver(&self) -> &Receiver<Task> {
        &self.receiver
    }

    /// Claims the calling thread as the frame thread.
    pub(crate) fn enter(&self) {
        *self.frame_thread.write() = Some(thread::current().id());
    }

    /// Releases the frame thread and runs whatever is still queued, so no
    /// caller is left blocked.
    pub(crate) fn exit(&self) {
        *self.frame_thread.write() = None;
        self.drain();
    }

    /// Runs every queued task.  Returns how many ran.
    pub(crate) fn drain(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task.run();
            ran += 1;
        }
        ran
    }
}
