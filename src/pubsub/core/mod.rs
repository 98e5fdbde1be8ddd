// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The PubSub data model: what is published, how it is grouped and how subscribers select it.

pub mod configuration_version;
pub mod connection_config;
pub mod data_set;
pub mod data_set_meta_data;
pub mod data_set_reader;
pub mod data_set_writer;
pub mod data_store;
pub mod endpoint;
pub mod published_data_set;
pub mod publisher_id;
pub mod writer_group;

pub use self::{
    configuration_version::*, connection_config::*, data_set::*, data_set_meta_data::*,
    data_set_reader::*, data_set_writer::*, data_store::*, endpoint::*, published_data_set::*,
    publisher_id::*, writer_group::*,
};
