use std::{
    cell::RefCell,
    path::PathBuf,
    rc::Rc,
    sync::{mpsc::channel, Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Result;
use log::{info, warn};
use slint::{ComponentHandle, Image, Timer, TimerMode, Weak};

use crate::{
    camera::{
        self, CaptureError, CaptureSessionController, DeviceOrientation, PreviewHost, Rect, ScreenBounds,
        SessionState, SharedPreview,
    },
    config::{self, AppConfig},
    executor::{Executors, SerialQueue, SlintDispatcher},
    logging,
    router::{LaunchRouter, Screen},
    settings::{FileSettingsStore, MemorySettingsStore, SettingsStore},
};

slint::slint! {
    import { Button, VerticalBox } from "std-widgets.slint";

    export enum Page { onboarding, camera }

    component HelpBadge inherits Rectangle {
        callback clicked;
        width: 30px;
        height: 30px;
        border-radius: 15px;
        background: #d1d1d6;
        Text {
            text: "?";
            font-size: 20px;
            font-weight: 700;
            color: #1c1c1e;
            horizontal-alignment: center;
            vertical-alignment: center;
        }
        TouchArea {
            clicked => { root.clicked(); }
        }
    }

    component PenColorResult inherits Rectangle {
        in property <string> result;
        width: 260px;
        height: 50px;
        background: #d1d1d680;
        Text {
            text: root.result;
            font-size: 24px;
            font-weight: 700;
            color: black;
            horizontal-alignment: center;
            vertical-alignment: center;
        }
    }

    export component MainWindow inherits Window {
        in property <Page> page: Page.onboarding;
        in property <image> camera-texture;
        in property <bool> preview-attached: false;
        in property <string> camera-status;
        in property <string> pen-color-result: "Cor da caneta";
        callback navigate(Page);

        title: "Cromatico";
        preferred-width: 390px;
        preferred-height: 844px;
        background: #1c1c1e;

        if root.page == Page.onboarding: VerticalBox {
            alignment: center;
            Text {
                text: "Cromatico";
                font-size: 32px;
                font-weight: 700;
                color: white;
                horizontal-alignment: center;
            }
            Text {
                text: "Aponte a câmera para uma caneta e veja o nome da cor dela na parte de baixo da tela.";
                wrap: word-wrap;
                color: #d1d1d6;
                horizontal-alignment: center;
            }
            Text {
                text: "Toque no ? a qualquer momento para ver estas instruções de novo.";
                wrap: word-wrap;
                color: #d1d1d6;
                horizontal-alignment: center;
            }
            Button {
                text: "Começar";
                clicked => { root.navigate(Page.camera); }
            }
        }

        if root.page == Page.camera: Rectangle {
            width: 100%;
            height: 100%;
            if root.preview-attached: Image {
                width: 100%;
                height: 100%;
                source: root.camera-texture;
                image-fit: cover;
            }
            if root.camera-status != "": Text {
                x: 24px;
                y: (parent.height - self.height) / 2;
                width: parent.width - 48px;
                text: root.camera-status;
                font-size: 18px;
                color: white;
                wrap: word-wrap;
                horizontal-alignment: center;
            }
            HelpBadge {
                x: parent.width - self.width - 16px;
                y: 16px;
                clicked => { root.navigate(Page.onboarding); }
            }
            PenColorResult {
                x: (parent.width - self.width) / 2;
                y: parent.height - self.height - 16px;
                result: root.pen-color-result;
            }
        }
    }
}

fn page_for(screen: Screen) -> Page {
    match screen {
        Screen::Onboarding => Page::Onboarding,
        Screen::Camera => Page::Camera,
    }
}

fn screen_for(page: Page) -> Screen {
    match page {
        Page::Onboarding => Screen::Onboarding,
        Page::Camera => Screen::Camera,
    }
}

fn status_text(reason: &CaptureError) -> &'static str {
    match reason {
        CaptureError::PermissionDenied => "Sem permissão para usar a câmera.",
        CaptureError::DeviceUnavailable => "Nenhuma câmera encontrada.",
        _ => "Não foi possível iniciar a câmera.",
    }
}

/// Logical size of the window, refreshed by the frame timer.
struct WindowBounds(Mutex<Rect>);

impl ScreenBounds for WindowBounds {
    fn bounds(&self) -> Rect {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct WindowHost {
    window: Weak<MainWindow>,
    preview: Arc<Mutex<Option<SharedPreview>>>,
}

impl PreviewHost for WindowHost {
    fn attach_preview(&self, preview: SharedPreview) {
        *self.preview.lock().unwrap_or_else(PoisonError::into_inner) = Some(preview);
        if let Some(app) = self.window.upgrade() {
            app.set_camera_status("".into());
            app.set_preview_attached(true);
        }
        info!("preview attached");
    }

    fn capture_unavailable(&self, reason: &CaptureError) {
        if let Some(app) = self.window.upgrade() {
            app.set_camera_status(status_text(reason).into());
        }
    }
}

/// Remembers the layout last applied to a running preview. A rotation is due
/// whenever the window size or the device orientation moved since then; a
/// 180 degree flip changes only the orientation.
#[derive(Default)]
struct LayoutWatch {
    applied: Option<(Rect, DeviceOrientation)>,
}

impl LayoutWatch {
    fn changed(&mut self, bounds: Rect, orientation: DeviceOrientation) -> bool {
        let layout = Some((bounds, orientation));
        if self.applied == layout {
            return false;
        }
        self.applied = layout;
        true
    }
}

fn data_dir(#[cfg(target_os = "android")] android_app: &slint::android::AndroidApp) -> Result<PathBuf> {
    #[cfg(target_os = "android")]
    return camera::files_dir(android_app);
    #[cfg(not(target_os = "android"))]
    {
        config::desktop_data_dir()
    }
}

fn open_settings(dir: &std::path::Path) -> Box<dyn SettingsStore> {
    match FileSettingsStore::open(config::settings_path(dir)) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!("settings unavailable, first-launch state will not persist: {err:?}");
            Box::new(MemorySettingsStore::default())
        }
    }
}

pub fn run(#[cfg(target_os = "android")] android_app: slint::android::AndroidApp) -> Result<()> {
    let data_dir = data_dir(
        #[cfg(target_os = "android")]
        &android_app,
    )?;
    let (config, config_error) = match AppConfig::load_or_create(&data_dir) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    logging::init(config.level_filter());
    if let Some(err) = config_error {
        warn!("using default config: {err:?}");
    }
    info!("data dir: {}", data_dir.display());

    #[cfg(target_os = "android")]
    slint::android::init(android_app.clone())?;

    let store = open_settings(&data_dir);
    let router = Rc::new(RefCell::new(LaunchRouter::initialize(store.as_ref())));

    let app = MainWindow::new()?;
    app.set_page(page_for(router.borrow().current_screen()));

    let app_weak = app.as_weak();
    router.borrow_mut().subscribe(move |screen| {
        if let Some(app) = app_weak.upgrade() {
            app.set_page(page_for(screen));
        }
    });
    let router_clone = router.clone();
    app.on_navigate(move |page| router_clone.borrow_mut().navigate(screen_for(page)));

    let bounds = Arc::new(WindowBounds(Mutex::new(Rect::default())));
    let attached: Arc<Mutex<Option<SharedPreview>>> = Arc::default();
    let (frame_sender, frame_receiver) = channel();
    let orientation = camera::default_orientation_source(
        #[cfg(target_os = "android")]
        &android_app,
    );

    // The controller is built the first time the camera page shows and then
    // lives as long as the window.
    let mut make_controller = Some({
        let backend = camera::default_backend(&config);
        let gate = camera::default_permission_gate(
            #[cfg(target_os = "android")]
            &android_app,
            &config,
        );
        let host = Arc::new(WindowHost {
            window: app.as_weak(),
            preview: attached.clone(),
        });
        let executors = Executors::new(Arc::new(SlintDispatcher), SerialQueue::new("sessionQueue")?);
        let bounds = bounds.clone();
        move || CaptureSessionController::new(backend, gate, bounds, host, executors, frame_sender)
    });
    let mut controller: Option<CaptureSessionController> = None;
    let mut last_bounds = None;
    let mut layout = LayoutWatch::default();

    let app_weak = app.as_weak();
    let timer = Timer::default();
    timer.start(TimerMode::Repeated, Duration::from_millis(config.frame_poll_ms), move || {
        let mut latest = None;
        while let Ok(buffer) = frame_receiver.try_recv() {
            latest = Some(buffer);
        }
        let Some(app) = app_weak.upgrade() else {
            return;
        };

        let window = app.window();
        let size = window.size().to_logical(window.scale_factor());
        let rect = Rect::from_size(size.width, size.height);
        if last_bounds != Some(rect) {
            *bounds.0.lock().unwrap_or_else(PoisonError::into_inner) = rect;
            last_bounds = Some(rect);
        }

        if router.borrow().current_screen() != Screen::Camera {
            return;
        }
        if let Some(make) = make_controller.take() {
            let created = make();
            created.activate();
            controller = Some(created);
        }
        let Some(controller) = controller.as_ref() else {
            return;
        };
        // Also covers the first tick after the session comes up, so a launch
        // in landscape rotates the preview straight away.
        if controller.state() == SessionState::Running {
            let current = orientation.current();
            if layout.changed(rect, current) {
                controller.handle_rotation(current);
            }
        }

        let preview = attached.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let (Some(buffer), Some(preview)) = (latest, preview) {
            let frame = preview.lock().unwrap_or_else(PoisonError::into_inner).render(buffer);
            app.set_camera_texture(Image::from_rgba8(frame));
        }
    });

    app.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_and_screens_correspond() {
        for screen in [Screen::Onboarding, Screen::Camera] {
            assert_eq!(screen_for(page_for(screen)), screen);
        }
    }

    #[test]
    fn layout_watch_fires_on_resize_and_on_flip() {
        let landscape = Rect::from_size(844., 390.);
        let mut watch = LayoutWatch::default();

        assert!(watch.changed(Rect::from_size(390., 844.), DeviceOrientation::Portrait));
        assert!(!watch.changed(Rect::from_size(390., 844.), DeviceOrientation::Portrait));
        assert!(watch.changed(landscape, DeviceOrientation::LandscapeLeft));
        // Same window size, device turned half way round.
        assert!(watch.changed(landscape, DeviceOrientation::LandscapeRight));
        assert!(!watch.changed(landscape, DeviceOrientation::LandscapeRight));
    }

    #[test]
    fn every_failure_has_a_status_line() {
        assert_ne!(
            status_text(&CaptureError::PermissionDenied),
            status_text(&CaptureError::DeviceUnavailable)
        );
        assert!(!status_text(&CaptureError::Backend("x".to_string())).is_empty());
    }
}
