// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use log::error;

use crate::FirmwareFailure;
use crate::FirmwareRequest;

/// The device firmware is requested for.
pub trait FirmwareDevice: Send + Sync {
    /// Name used in log messages and worker thread names.
    fn debug_label(&self) -> String;

    /// Detaches the device. Called when its firmware cannot be loaded asynchronously.
    fn request_removal(&self);
}

/// Terminal state of a firmware request.
#[derive(Debug)]
pub enum Completion {
    /// Every required item was loaded. The request holds the loaded payloads.
    Success(FirmwareRequest),
    /// A required item could not be loaded.
    Failure(FirmwareFailure),
    /// A required item could not be loaded and the device has to go away.
    Escalate(FirmwareFailure),
}

impl Completion {
    /// Completion of a synchronous request, which reports failures to the caller.
    pub fn reporting(
        result: std::result::Result<(), FirmwareFailure>,
        req: FirmwareRequest,
    ) -> Completion {
        match result {
            Ok(()) => Completion::Success(req),
            Err(failure) => Completion::Failure(failure),
        }
    }

    /// Completion of an asynchronous request, which turns failures into device removal.
    pub fn escalating(
        result: std::result::Result<(), FirmwareFailure>,
        req: FirmwareRequest,
    ) -> Completion {
        match result {
            Ok(()) => Completion::Success(req),
            Err(failure) => Completion::Escalate(failure),
        }
    }
}

/// Hands the outcome of a synchronous request to `on_complete`, whatever it is.
pub fn dispatch_sync<F>(completion: Completion, on_complete: F)
where
    F: FnOnce(std::result::Result<FirmwareRequest, FirmwareFailure>),
{
    match completion {
        Completion::Success(req) => on_complete(Ok(req)),
        Completion::Failure(failure) | Completion::Escalate(failure) => on_complete(Err(failure)),
    }
}

/// Hands a successfully loaded request to `on_complete`, or requests removal of `device`.
pub fn dispatch_async<F>(completion: Completion, device: &dyn FirmwareDevice, on_complete: F)
where
    F: FnOnce(FirmwareRequest),
{
    match completion {
        Completion::Success(req) => on_complete(req),
        Completion::Failure(failure) | Completion::Escalate(failure) => {
            error!(
                "{}: failed to load firmware, removing device: {}",
                device.debug_label(),
                failure
            );
            device.request_removal();
        }
    }
}
