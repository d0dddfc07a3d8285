mod app;

pub mod camera;
pub mod config;
pub mod executor;
pub mod logging;
pub mod router;
pub mod settings;

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: slint::android::AndroidApp) {
    if let Err(err) = app::run(app) {
        log::error!("cromatico exited with error: {err:?}");
    }
}

#[cfg(not(target_os = "android"))]
pub fn run() -> anyhow::Result<()> {
    app::run()
}
