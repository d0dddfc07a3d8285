use std::{
    sync::{
        mpsc::{channel, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use log::{debug, error, warn};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a piece of work is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// The single thread that owns the window and the view tree.
    Ui,
    /// The camera setup queue.
    Background,
}

/// Posts work onto the UI thread.
pub trait UiDispatcher: Send + Sync {
    fn dispatch(&self, task: Task);
}

/// Slint event loop dispatcher.
pub struct SlintDispatcher;

impl UiDispatcher for SlintDispatcher {
    fn dispatch(&self, task: Task) {
        if let Err(err) = slint::invoke_from_event_loop(task) {
            error!("failed to post task to the event loop: {err}");
        }
    }
}

/// A named worker thread that runs tasks one at a time, in submission order.
///
/// A task that blocks (waiting on a permission prompt, for instance) holds
/// back everything queued after it.
pub struct SerialQueue {
    label: String,
    sender: Option<Sender<Task>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialQueue {
    pub fn new(label: &str) -> Result<Self> {
        let (sender, receiver) = channel::<Task>();
        let worker = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for task in receiver {
                    task();
                }
            })
            .with_context(|| format!("failed to spawn queue thread {label}"))?;
        debug!("serial queue {label} started");
        Ok(Self {
            label: label.to_string(),
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dispatch(&self, task: impl FnOnce() + Send + 'static) {
        let sent = match self.sender.as_ref() {
            Some(sender) => sender.send(Box::new(task)).is_ok(),
            None => false,
        };
        if !sent {
            warn!("serial queue {} is closed, task dropped", self.label);
        }
    }

    /// Blocks until every task queued before this call has finished.
    pub fn wait_idle(&self) {
        let (done_sender, done_receiver) = channel();
        self.dispatch(move || {
            let _ = done_sender.send(());
        });
        let _ = done_receiver.recv();
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit on its own. It is
        // not joined: a task may still be parked on an OS callback.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

/// The two execution contexts the camera controller hops between.
#[derive(Clone)]
pub struct Executors {
    ui: Arc<dyn UiDispatcher>,
    background: Arc<SerialQueue>,
}

impl Executors {
    pub fn new(ui: Arc<dyn UiDispatcher>, background: SerialQueue) -> Self {
        Self {
            ui,
            background: Arc::new(background),
        }
    }

    pub fn run_on(&self, context: ExecutionContext, task: impl FnOnce() + Send + 'static) {
        match context {
            ExecutionContext::Ui => self.ui.dispatch(Box::new(task)),
            ExecutionContext::Background => self.background.dispatch(task),
        }
    }

    pub fn background(&self) -> &SerialQueue {
        &self.background
    }
}
