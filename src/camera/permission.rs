use std::{sync::mpsc::channel, time::Duration};

use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Authorized,
    Denied,
    NotDetermined,
}

pub type AccessCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// The OS camera privacy check.
pub trait PermissionGate: Send + Sync {
    fn authorization_status(&self) -> PermissionState;

    /// Prompts the user. `on_result` is called exactly once, from any thread.
    fn request_access(&self, on_result: AccessCallback);
}

/// Resolves camera access, parking the calling thread while a prompt is open.
pub fn resolve_access(gate: &dyn PermissionGate) -> bool {
    match gate.authorization_status() {
        PermissionState::Authorized => true,
        PermissionState::Denied => false,
        PermissionState::NotDetermined => {
            info!("requesting camera permission");
            let (sender, receiver) = channel();
            gate.request_access(Box::new(move |granted| {
                let _ = sender.send(granted);
            }));
            match receiver.recv() {
                Ok(granted) => granted,
                Err(_) => {
                    warn!("permission request dropped without an answer");
                    false
                }
            }
        }
    }
}

/// Where a system permission prompt stands, judged from the grant and from
/// window focus: the prompt is its own activity, so the app loses focus while
/// it is up and gets it back once the user answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptProgress {
    Pending,
    Granted,
    Refused,
}

#[derive(Debug)]
pub struct PromptWatch {
    /// How long the prompt has to appear before the request counts as
    /// answered by the system ("don't ask again").
    grace: Duration,
    timeout: Duration,
    prompt_shown: bool,
}

impl PromptWatch {
    pub fn new(grace: Duration, timeout: Duration) -> Self {
        Self {
            grace,
            timeout,
            prompt_shown: false,
        }
    }

    pub fn observe(&mut self, granted: bool, has_focus: bool, elapsed: Duration) -> PromptProgress {
        if granted {
            return PromptProgress::Granted;
        }
        if !has_focus {
            self.prompt_shown = true;
        } else if self.prompt_shown {
            debug!("permission prompt dismissed without a grant");
            return PromptProgress::Refused;
        } else if elapsed >= self.grace {
            debug!("no permission prompt after {:?}", self.grace);
            return PromptProgress::Refused;
        }
        if elapsed >= self.timeout {
            warn!("camera permission still pending after {:?}", self.timeout);
            return PromptProgress::Refused;
        }
        PromptProgress::Pending
    }
}

/// Gate for platforms that do not guard the camera.
pub struct Unrestricted;

impl PermissionGate for Unrestricted {
    fn authorization_status(&self) -> PermissionState {
        PermissionState::Authorized
    }

    fn request_access(&self, on_result: AccessCallback) {
        on_result(true)
    }
}
