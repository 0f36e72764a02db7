// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::panic;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use log::debug;
use log::error;
use log::info;
use log::warn;
use remain::sorted;
use thiserror::Error;

use crate::alt_fw_path;
use crate::dispatch::dispatch_async;
use crate::dispatch::dispatch_sync;
use crate::dispatch::Completion;
use crate::dispatch::FirmwareDevice;
use crate::loader::FirmwareLoader;
use crate::loader::LoadError;
use crate::nvram;
use crate::nvram::NvramNormalizer;
use crate::nvram::NvramStripper;
use crate::FirmwareKind;
use crate::FirmwarePayload;
use crate::FirmwareRequest;
use crate::Result;

/// Why an item could not be loaded.
#[sorted]
#[derive(Error, Debug)]
pub enum FailureReason {
    #[error("invalid request: {0}")]
    Invalid(crate::Error),
    #[error("{0}")]
    Load(LoadError),
    #[error("malformed nvram: {0}")]
    Normalize(nvram::Error),
    #[error("{0}")]
    Payload(crate::Error),
}

/// The item that made a request fail.
#[derive(Error, Debug)]
#[error("firmware item {index} ({path}): {reason}")]
pub struct FirmwareFailure {
    pub index: usize,
    pub path: String,
    pub reason: FailureReason,
}

/// Loads the items of [`FirmwareRequest`]s.
#[derive(Clone)]
pub struct FirmwareFetcher {
    loader: Arc<dyn FirmwareLoader>,
    normalizer: Arc<dyn NvramNormalizer>,
}

impl FirmwareFetcher {
    /// Creates a fetcher reading files from `loader`, normalizing NVRAM with [`NvramStripper`].
    pub fn new(loader: Arc<dyn FirmwareLoader>) -> FirmwareFetcher {
        FirmwareFetcher {
            loader,
            normalizer: Arc::new(NvramStripper::new()),
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn NvramNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Loads every item of `req` on the calling thread.
    ///
    /// The request is always returned. On failure none of its items hold a payload.
    pub fn acquire_sync(
        &self,
        mut req: FirmwareRequest,
    ) -> (std::result::Result<(), FirmwareFailure>, FirmwareRequest) {
        let result = match req.validate() {
            Ok(()) => self.run(&mut req),
            Err(e) => Err(FirmwareFailure {
                index: 0,
                path: String::new(),
                reason: FailureReason::Invalid(e),
            }),
        };
        (result, req)
    }

    /// Loads every item of `req` on the calling thread and passes the outcome to `on_complete`.
    ///
    /// `on_complete` is called exactly once, with the request when every required item was
    /// loaded or with the failing item otherwise.
    pub fn acquire_sync_with<F>(&self, req: FirmwareRequest, on_complete: F)
    where
        F: FnOnce(std::result::Result<FirmwareRequest, FirmwareFailure>),
    {
        let (result, req) = self.acquire_sync(req);
        dispatch_sync(Completion::reporting(result, req), on_complete);
    }

    /// Loads every item of `req` on a worker thread.
    ///
    /// Once all required items are loaded `on_complete` is called on the worker thread with the
    /// request. If a required item cannot be loaded `on_complete` is never called, the request is
    /// dropped and removal of `device` is requested instead.
    ///
    /// An invalid request is rejected before the worker is started.
    pub fn acquire_async<F>(
        &self,
        req: FirmwareRequest,
        device: Arc<dyn FirmwareDevice>,
        on_complete: F,
    ) -> Result<PendingFirmware>
    where
        F: FnOnce(FirmwareRequest) + Send + 'static,
    {
        req.validate()?;

        let fetcher = self.clone();
        let handle = thread::Builder::new()
            .name(format!("fw_{}", device.debug_label()))
            .spawn(move || {
                let (result, req) = fetcher.acquire_sync(req);
                dispatch_async(Completion::escalating(result, req), &*device, on_complete);
            })
            .map_err(crate::Error::SpawnWorker)?;

        Ok(PendingFirmware { handle })
    }

    fn run(&self, req: &mut FirmwareRequest) -> std::result::Result<(), FirmwareFailure> {
        for index in 0..req.items.len() {
            if let Err(e) = self.fetch_item(req, index) {
                req.release();
                return Err(e);
            }
        }
        info!(
            "firmware request complete: {} items, board type {}",
            req.item_count(),
            req.board_type().unwrap_or("none")
        );
        Ok(())
    }

    fn fetch_item(
        &self,
        req: &mut FirmwareRequest,
        index: usize,
    ) -> std::result::Result<(), FirmwareFailure> {
        let item = &req.items[index];
        let optional = item.is_optional();
        let kind = item.kind();

        let (path, data) = match self.load(req, index) {
            Ok(loaded) => loaded,
            Err(e) if optional => {
                warn!("optional firmware {} not loaded: {}", req.items[index].path(), e);
                return Ok(());
            }
            Err(e) => {
                error!("failed to load firmware {}: {}", req.items[index].path(), e);
                return Err(FirmwareFailure {
                    index,
                    path: req.items[index].path().to_owned(),
                    reason: FailureReason::Load(e),
                });
            }
        };

        let payload = match kind {
            FirmwareKind::Nvram => {
                match self.normalizer.normalize(&data, req.domain_nr, req.bus_nr) {
                    Ok(nvram) => FirmwarePayload::Nvram(nvram),
                    Err(e) => {
                        error!("failed to parse nvram {}: {}", path, e);
                        return Err(FirmwareFailure {
                            index,
                            path,
                            reason: FailureReason::Normalize(e),
                        });
                    }
                }
            }
            FirmwareKind::Binary | FirmwareKind::TrxSecureElement | FirmwareKind::TrxSecure => {
                FirmwarePayload::Binary(data)
            }
        };

        let item = &mut req.items[index];
        item.set_path(path);
        item.fill(payload).map_err(|e| FirmwareFailure {
            index,
            path: item.path().to_owned(),
            reason: FailureReason::Payload(e),
        })
    }

    // Tries the board specific variants of the item before the item itself. The first board type
    // that has a file is used for all following items.
    fn load(
        &self,
        req: &mut FirmwareRequest,
        index: usize,
    ) -> std::result::Result<(String, Vec<u8>), LoadError> {
        let path = req.items[index].path().to_owned();
        let candidates: Vec<usize> = match req.board_index {
            Some(board) => vec![board],
            None => (0..req.board_types.len()).collect(),
        };

        for board in candidates {
            let Some(alt_path) = alt_fw_path(&path, &req.board_types[board]) else {
                continue;
            };
            match self.load_file(&alt_path) {
                Ok(data) => {
                    if req.board_index.is_none() {
                        info!("using board type {}", req.board_types[board]);
                        req.board_index = Some(board);
                    }
                    return Ok((alt_path, data));
                }
                Err(e) => debug!("{}", e),
            }
        }

        let data = self.load_file(&path)?;
        Ok((path, data))
    }

    // A loaded item never holds an empty buffer, whatever the loader returns.
    fn load_file(&self, path: &str) -> std::result::Result<Vec<u8>, LoadError> {
        let data = self.loader.load(path)?;
        if data.is_empty() {
            return Err(LoadError::Empty(path.to_owned()));
        }
        Ok(data)
    }
}

/// A request being loaded on a worker thread.
pub struct PendingFirmware {
    handle: JoinHandle<()>,
}

impl PendingFirmware {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits until the completion handler has run or device removal has been requested.
    pub fn wait(self) {
        if let Err(e) = self.handle.join() {
            panic::resume_unwind(e);
        }
    }
}
