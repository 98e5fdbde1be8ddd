// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Console logging for PubSub applications and tests.

use std::{
    fmt,
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use env_logger::{fmt::Color, Builder};

/// Environment variable holding the filter, in `env_logger` syntax, e.g.
/// `opcua_pubsub=debug,hex=trace`.
pub const LOG_ENV_VAR: &str = "RUST_OPCUA_LOG";

struct Pad<T> {
    value: T,
    width: usize,
}

impl<T: fmt::Display> fmt::Display for Pad<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{: <width$}", self.value, width = self.width)
    }
}

fn level_color(level: log::Level) -> (Color, Option<Color>) {
    match level {
        log::Level::Error => (Color::White, Some(Color::Red)),
        log::Level::Warn => (Color::Yellow, None),
        log::Level::Info => (Color::Cyan, None),
        log::Level::Debug => (Color::Green, None),
        log::Level::Trace => (Color::Ansi256(8), None),
    }
}

/// Installs the console logger. Safe to call more than once, only the first call has an effect.
pub fn init() {
    lazy_static! {
        static ref INITIALISED: AtomicBool = AtomicBool::new(false);
    }

    if !INITIALISED.swap(true, Ordering::Relaxed) {
        // Reads the filter from RUST_OPCUA_LOG rather than RUST_LOG so cargo and other tools
        // don't flood the console
        let mut builder = Builder::from_env(LOG_ENV_VAR);
        builder.format(|f, record| {
            let now = chrono::Utc::now();
            let time_fmt = now.format("%Y-%m-%d %H:%M:%S%.3f");

            let mut style = f.style();
            let (fg, bg) = level_color(record.metadata().level());
            style.set_color(fg);
            if let Some(bg) = bg {
                style.set_bg(bg);
            }
            let level = style.value(Pad {
                value: record.level(),
                width: 5,
            });

            let mut style = f.style();
            let target = style.set_bold(true).value(Pad {
                value: record.target(),
                width: 48,
            });

            writeln!(f, "{} {} {} {}", time_fmt, level, target, record.args())
        });
        // A logger may already be installed by the host application
        if builder.try_init().is_err() {
            eprintln!("A logger is already installed, console logging not initialised");
        } else {
            info!(
                "Logging is enabled, use {} environment variable to control filtering, logging level",
                LOG_ENV_VAR
            );
        }
    }
}
