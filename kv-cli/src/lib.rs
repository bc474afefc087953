//! `kvcli` binaries (`server`, `client`): argument parsing, directory
//! scanning for `.job` files, the interactive client REPL, logging/panic-hook
//! bootstrap, and config loading. The engine itself lives in `kv`.

pub mod config;
pub mod script;
pub mod trace;

use std::env;
use std::panic;

/// Installs `human_panic`'s crash-report hook, matching the teacher's
/// `setup_panic_hooks` in both binaries.
pub fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();

    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);
            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta)
                .expect("human-panic: printing error message to console failed");
        }));
    }
}

/// `~/.kvcli`, the shared log directory for both binaries.
pub fn default_log_dir() -> String {
    format!("{}/.kvcli", env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
