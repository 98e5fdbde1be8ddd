// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::BTreeSet;

use crate::sync::Mutex;

/// Tracks the background tasks (receive loops, publish timers, discovery runners) that are in
/// existence. Used to check that stopping a connection really stopped everything it started.
#[derive(Default)]
pub struct Runtime {
    running_components: Mutex<BTreeSet<String>>,
}

impl Runtime {
    pub fn components(&self) -> Vec<String> {
        let running_components = trace_lock!(self.running_components);
        running_components.iter().cloned().collect()
    }

    pub fn register_component(&self, key: &str) {
        debug!("registering component {}", key);
        let mut running_components = trace_lock!(self.running_components);
        if !running_components.insert(key.to_string()) {
            trace!("Shouldn't be registering component {} more than once", key);
        }
    }

    pub fn deregister_component(&self, key: &str) {
        debug!("deregistering component {}", key);
        let mut running_components = trace_lock!(self.running_components);
        if !running_components.remove(key) {
            trace!(
                "Shouldn't be deregistering component {} which doesn't exist",
                key
            );
        }
    }
}
