// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Functionality shared by the publisher and subscriber halves of PubSub: diagnostics, url
//! handling and configuration persistence.

lazy_static! {
    pub static ref RUNTIME: crate::core::runtime::Runtime =
        crate::core::runtime::Runtime::default();
}

/// Returns a vector of all currently existing runtime components as a vector of strings.
#[macro_export]
macro_rules! runtime_components {
    () => {{
        use $crate::core::RUNTIME;
        RUNTIME.components()
    }};
}

/// Registers a running component (e.g. a receive loop or timer task) when it starts. Calls the
/// corresponding deregister macro when it finishes so the set of live tasks can be inspected.
#[macro_export]
macro_rules! register_runtime_component {
    ( $component_name:expr ) => {
        $crate::core::RUNTIME.register_component($component_name);
    };
}

/// See `register_runtime_component`
#[macro_export]
macro_rules! deregister_runtime_component {
    ( $component_name:expr ) => {
        $crate::core::RUNTIME.deregister_component($component_name);
    };
}

/// Contains debugging utility helper functions
pub mod debug {
    /// Prints out the content of a slice in hex and visible char format to aid debugging.
    pub fn log_buffer(message: &str, buf: &[u8]) {
        // No point doing anything unless debug level is on
        if !log_enabled!(target: "hex", log::Level::Trace) {
            return;
        }

        let line_len = 32;
        let len = buf.len();
        let last_line_padding = ((len / line_len) + 1) * line_len - len;

        trace!(target: "hex", "{}", message);

        let mut char_line = String::new();
        let mut hex_line = format!("{:08x}: ", 0);

        for (i, value) in buf.iter().enumerate() {
            if i > 0 && i % line_len == 0 {
                trace!(target: "hex", "{} {}", hex_line, char_line);
                hex_line = format!("{:08x}: ", i);
                char_line.clear();
            }
            hex_line = format!("{} {:02x}", hex_line, value);
            char_line.push(if (32..=126).contains(value) {
                *value as char
            } else {
                '.'
            });
        }
        if last_line_padding > 0 {
            for _ in 0..last_line_padding {
                hex_line.push_str("   ");
            }
            trace!(target: "hex", "{} {}", hex_line, char_line);
        }
    }
}

pub mod constants {
    /// Default OPC UA port number, also the port of the UADP discovery multicast group.
    pub const DEFAULT_OPC_UA_PORT: u16 = 4840;
    /// Default MQTT broker port
    pub const DEFAULT_MQTT_PORT: u16 = 1883;
    /// Default MQTT over TLS broker port
    pub const DEFAULT_MQTTS_PORT: u16 = 8883;
}

pub mod config;
pub mod runtime;
pub mod url;

pub mod prelude {
    pub use super::{config::Config, url::*};
}
