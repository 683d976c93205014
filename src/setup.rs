use env_logger::{Builder, Env};
pub use log::{debug, info, warn};

/// Install a logger reading `RUST_LOG`, at `info` level by default.
/// Safe to call more than once, later calls are no-ops.
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("info")).try_init();
}
