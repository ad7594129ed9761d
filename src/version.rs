use std::sync::LazyLock;

/// Version of the software: the Cargo package version, suffixed with the git
/// commit when `MAPMERGE_GIT_HASH` is set at build time.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("MAPMERGE_GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{version}-{hash}"),
        _ => version.to_string(),
    }
});
