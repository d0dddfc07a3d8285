use log::LevelFilter;

#[cfg(target_os = "android")]
pub fn init(level: LevelFilter) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level)
            .with_tag("cromatico"),
    );
}

/// `RUST_LOG` wins over the configured level.
#[cfg(not(target_os = "android"))]
pub fn init(level: LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(level.to_string().to_lowercase());
    let _ = env_logger::Builder::from_env(env).try_init();
}
