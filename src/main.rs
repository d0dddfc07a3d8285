#[cfg(not(target_os = "android"))]
fn main() -> anyhow::Result<()> {
    cromatico::run()
}

#[cfg(target_os = "android")]
fn main() {}
