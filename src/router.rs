use log::{info, warn};

use crate::settings::SettingsStore;

pub const DID_LAUNCH_BEFORE: &str = "did_launch_before";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Onboarding,
    Camera,
}

/// Decides the first screen once per process and tracks navigation after that.
pub struct LaunchRouter {
    current: Screen,
    listeners: Vec<Box<dyn Fn(Screen)>>,
}

impl LaunchRouter {
    /// First launch shows onboarding and records the launch; every later
    /// launch goes straight to the camera.
    pub fn initialize(store: &dyn SettingsStore) -> Self {
        let current = if store.get_bool(DID_LAUNCH_BEFORE) {
            Screen::Camera
        } else {
            if let Err(err) = store.set_bool(DID_LAUNCH_BEFORE, true) {
                warn!("failed to record first launch: {err:?}");
            }
            Screen::Onboarding
        };
        info!("initial screen: {current:?}");
        Self {
            current,
            listeners: vec![],
        }
    }

    pub fn current_screen(&self) -> Screen {
        self.current
    }

    pub fn navigate(&mut self, to: Screen) {
        info!("navigate {:?} -> {to:?}", self.current);
        self.current = to;
        for listener in &self.listeners {
            listener(to);
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(Screen) + 'static) {
        self.listeners.push(Box::new(listener));
    }
}
