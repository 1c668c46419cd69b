// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Resource access layer of a WebDAV server exposing local directories as
//! named drives: sandboxed path resolution, in-memory locking, multi-status
//! listings and mutations that send deleted data to a recycler.

#[macro_use]
extern crate log;

use crate::api::StorageApi;
use crate::config::DavConfig;
use crate::error::ConfigError;
use crate::service::DavService;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lock;
pub mod mutation;
pub mod resolver;
pub mod service;

pub use crate::error::{DavError, DavResult};
pub use crate::mutation::Outcome;
pub use crate::service::{Depth, GetResponse, LockGrant};

/// Creates a WebDAV service over the configured drives
pub async fn make_service(
    config: &DavConfig, api: Box<dyn StorageApi>,
) -> Result<DavService, ConfigError> {
    DavService::new(config, api).await
}
