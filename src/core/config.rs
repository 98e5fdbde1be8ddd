// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
    result::Result,
};

/// A trait that handles the loading / saving and validity of configuration information.
pub trait Config: serde::Serialize {
    fn save(&self, path: &Path) -> Result<(), ()> {
        if !self.is_valid() {
            error!("Config isn't valid and won't be saved");
            return Err(());
        }
        let s = serde_yaml::to_string(&self).map_err(|err| {
            error!("Cannot serialize configuration, error = {}", err);
        })?;
        let mut f = File::create(path).map_err(|_| {
            error!("Cannot create the path to save the config");
        })?;
        f.write_all(s.as_bytes()).map_err(|err| {
            error!("Could not save config - error = {:?}", err);
        })
    }

    fn load<A>(path: &Path) -> Result<A, ()>
    where
        for<'de> A: Config + serde::Deserialize<'de>,
    {
        let mut f = File::open(path).map_err(|_| {
            error!("Cannot open configuration file {}", path.to_string_lossy());
        })?;
        let mut s = String::new();
        if f.read_to_string(&mut s).is_err() {
            error!(
                "Cannot read configuration file {} to string",
                path.to_string_lossy()
            );
            return Err(());
        }
        serde_yaml::from_str(&s).map_err(|err| {
            error!(
                "Cannot deserialize configuration from {}, error reason: {}",
                path.to_string_lossy(),
                err
            );
        })
    }

    fn is_valid(&self) -> bool;
}
