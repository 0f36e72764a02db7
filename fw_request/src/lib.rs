// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Firmware requests for Broadcom FullMAC wireless adapters.
//!
//! A bus driver that has read the chip id and revision from the hardware turns them into a
//! [`FirmwareRequest`] with [`RequestBuilder::alloc`], then hands the request to a
//! [`FirmwareFetcher`]. The fetcher loads every item of the request in order, trying board
//! specific variants of each file first, and passes the loaded buffers back to the caller.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fw_request::chips::Bus;
//! use fw_request::loader::DirectoryLoader;
//! use fw_request::FirmwareFetcher;
//! use fw_request::RequestBuilder;
//!
//! let mut names = Bus::Sdio.default_names();
//! let req = RequestBuilder::new()
//!     .board_types(["raspberrypi,4-model-b"])
//!     .alloc(0x4345, 6, Bus::Sdio.table(), &mut names)
//!     .unwrap();
//! let fetcher = FirmwareFetcher::new(Arc::new(DirectoryLoader::new("/lib/firmware")));
//! let (result, req) = fetcher.acquire_sync(req);
//! ```

// Firmware directories as literals, for building the static mapping tables.
macro_rules! fw_default_path {
    () => {
        "brcm/"
    };
}

macro_rules! cy_fw_default_path {
    () => {
        "cypress/"
    };
}

mod acquire;
pub mod chips;
mod dispatch;
pub mod loader;
mod mapping;
pub mod nvram;
mod request;

use std::collections::TryReserveError;

use remain::sorted;
use thiserror::Error;

pub use crate::acquire::FailureReason;
pub use crate::acquire::FirmwareFailure;
pub use crate::acquire::FirmwareFetcher;
pub use crate::acquire::PendingFirmware;
pub use crate::dispatch::dispatch_async;
pub use crate::dispatch::dispatch_sync;
pub use crate::dispatch::Completion;
pub use crate::dispatch::FirmwareDevice;
pub use crate::mapping::resolve;
pub use crate::mapping::FirmwareMapping;
pub use crate::request::alt_fw_path;
pub use crate::request::build_request;
pub use crate::request::FirmwareItem;
pub use crate::request::FirmwareKind;
pub use crate::request::FirmwareName;
pub use crate::request::FirmwarePayload;
pub use crate::request::FirmwareRequest;
pub use crate::request::ItemFlags;
pub use crate::request::RequestBuilder;

/// Maximum number of board type candidates a request may carry.
pub const FW_MAX_BOARD_TYPES: usize = 8;

/// Maximum length of a firmware path, including any board type qualifier.
pub const FW_NAME_LEN: usize = 320;

/// Directory of the Broadcom firmware files, relative to the firmware root.
pub const FW_DEFAULT_PATH: &str = fw_default_path!();

/// Directory of the Cypress/Infineon firmware files, relative to the firmware root.
pub const CY_FW_DEFAULT_PATH: &str = cy_fw_default_path!();

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to allocate firmware request: {0}")]
    Allocation(TryReserveError),
    #[error("too many board types: {0} (max {FW_MAX_BOARD_TYPES})")]
    BoardTypeCount(usize),
    #[error("firmware item {0} has no path")]
    EmptyPath(usize),
    #[error("firmware request has no items")]
    EmptyRequest,
    #[error("primary firmware image {0} cannot be optional")]
    OptionalPrimary(String),
    #[error("firmware path too long: {0}")]
    PathTooLong(String),
    #[error("payload of {0} is already loaded")]
    PayloadAlreadySet(String),
    #[error("failed to spawn firmware worker: {0}")]
    SpawnWorker(std::io::Error),
    #[error("unknown chip {chip:#x} rev {chiprev}")]
    UnknownChip { chip: u32, chiprev: u32 },
    #[error("unrecognized firmware extension: {0}")]
    UnknownExtension(String),
}

pub type Result<T> = std::result::Result<T, Error>;
