//! Structured logging setup.
//!
//! The subscriber is installed behind a `reload::Layer` so the level
//! can be raised or lowered once `log_level` is known, without the
//! panic a second `tracing_subscriber::fmt().init()` call would cause
//! (`penguin-rs`'s `reload_handle` idiom). `main` installs a default
//! filter before `Config::load` runs, so the "config failed to load"
//! log line always has a subscriber to reach.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{prelude::*, reload};

pub struct Handle(reload::Handle<LevelFilter, tracing_subscriber::Registry>);

impl Handle {
    pub fn set_filter(&self, filter: LevelFilter) {
        self.0
            .reload(filter)
            .expect("resetting log level failed (this is a bug)");
    }
}

pub fn init(default_filter: LevelFilter) -> Handle {
    let (level_layer, reload_handle) = reload::Layer::new(default_filter);
    tracing_subscriber::registry()
        .with(level_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Handle(reload_handle)
}
