// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Loads firmware requests from a firmware tree on disk.

use std::fs;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::sync::Mutex;

use fw_request::chips::Bus;
use fw_request::chips::ChipId;
use fw_request::loader;
use fw_request::loader::DirectoryLoader;
use fw_request::loader::FirmwareLoader;
use fw_request::FailureReason;
use fw_request::FirmwareDevice;
use fw_request::FirmwareFetcher;
use fw_request::FirmwarePayload;
use fw_request::RequestBuilder;
use tempfile::TempDir;

const BOARD: &str = "raspberrypi,4-model-b";

// Counts the files the fetcher asks for.
struct CountingLoader {
    inner: DirectoryLoader,
    paths: Mutex<Vec<String>>,
}

impl CountingLoader {
    fn new(dir: &TempDir) -> Arc<CountingLoader> {
        Arc::new(CountingLoader {
            inner: DirectoryLoader::new(dir.path()),
            paths: Mutex::new(Vec::new()),
        })
    }

    fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

impl FirmwareLoader for CountingLoader {
    fn load(&self, path: &str) -> loader::Result<Vec<u8>> {
        self.paths.lock().unwrap().push(path.to_owned());
        self.inner.load(path)
    }
}

#[derive(Default)]
struct TestDevice {
    removals: AtomicUsize,
}

impl FirmwareDevice for TestDevice {
    fn debug_label(&self) -> String {
        "mmc1:0001:1".to_owned()
    }

    fn request_removal(&self) {
        self.removals.fetch_add(1, Ordering::SeqCst);
    }
}

fn firmware_tree(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, data) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, data).unwrap();
    }
    dir
}

fn sdio_43455() -> fw_request::FirmwareRequest {
    RequestBuilder::new()
        .board_types([BOARD, "brcm,bcm4345c0"])
        .alloc(
            ChipId::Bcm4345 as u32,
            6,
            Bus::Sdio.table(),
            &mut Bus::Sdio.default_names(),
        )
        .unwrap()
}

#[test]
fn sdio_board_specific_firmware() {
    let dir = firmware_tree(&[
        ("brcm/brcmfmac43455-sdio.bin", b"generic code"),
        (
            "brcm/brcmfmac43455-sdio.raspberrypi,4-model-b.bin",
            b"rpi4 code",
        ),
        (
            "brcm/brcmfmac43455-sdio.raspberrypi,4-model-b.txt",
            b"# rpi4\nboardflags=0x00480201\nboardrev=0x1304\n",
        ),
    ]);
    let loader = CountingLoader::new(&dir);
    let fetcher = FirmwareFetcher::new(loader.clone());

    let (result, mut req) = fetcher.acquire_sync(sdio_43455());
    result.unwrap();

    assert_eq!(req.board_type(), Some(BOARD));
    assert_eq!(
        req.take_payload(0),
        Some(FirmwarePayload::Binary(b"rpi4 code".to_vec()))
    );
    let nvram = req.take_payload(1).unwrap();
    assert!(nvram
        .data()
        .starts_with(b"boardflags=0x00480201\0boardrev=0x1304\0"));
    assert!(!req.items()[2].is_loaded());

    // The second board type is never tried once the first one is found.
    assert_eq!(
        loader.paths(),
        [
            "brcm/brcmfmac43455-sdio.raspberrypi,4-model-b.bin",
            "brcm/brcmfmac43455-sdio.raspberrypi,4-model-b.txt",
            "brcm/brcmfmac43455-sdio.raspberrypi,4-model-b.clm_blob",
            "brcm/brcmfmac43455-sdio.clm_blob",
        ]
    );
}

#[test]
fn sync_completion_handler() {
    let dir = firmware_tree(&[("brcm/brcmfmac43455-sdio.bin", b"code")]);
    let fetcher = FirmwareFetcher::new(Arc::new(DirectoryLoader::new(dir.path())));

    let mut outcomes = Vec::new();
    fetcher.acquire_sync_with(sdio_43455(), |res| outcomes.push(res));

    assert_eq!(outcomes.len(), 1);
    let failure = outcomes.pop().unwrap().unwrap_err();
    assert_eq!(failure.index, 1);
    assert_eq!(failure.path, "brcm/brcmfmac43455-sdio.txt");
    assert!(matches!(failure.reason, FailureReason::Load(_)));
}

#[test]
fn pcie_async_without_nvram() {
    let dir = firmware_tree(&[
        ("brcm/brcmfmac4356-pcie.bin", b"code"),
        ("brcm/brcmfmac4356-pcie.clm_blob", b"clm"),
    ]);
    let fetcher = FirmwareFetcher::new(Arc::new(DirectoryLoader::new(dir.path())));
    let device = Arc::new(TestDevice::default());
    let req = RequestBuilder::new()
        .bus_location(0, 1)
        .alloc(
            ChipId::Bcm4356 as u32,
            2,
            Bus::Pcie.table(),
            &mut Bus::Pcie.default_names(),
        )
        .unwrap();

    let (tx, rx) = channel();
    fetcher
        .acquire_async(req, device.clone(), move |req| tx.send(req).unwrap())
        .unwrap()
        .wait();

    let req = rx.recv().unwrap();
    assert!(req.is_complete());
    let loaded: Vec<bool> = req.items().iter().map(|item| item.is_loaded()).collect();
    assert_eq!(loaded, [true, false, true, false]);
    assert_eq!(device.removals.load(Ordering::SeqCst), 0);
}

#[test]
fn async_missing_firmware_removes_device() {
    let dir = firmware_tree(&[("brcm/brcmfmac43455-sdio.txt", b"boardrev=0x1304\n")]);
    let loader = CountingLoader::new(&dir);
    let fetcher = FirmwareFetcher::new(loader.clone());
    let device = Arc::new(TestDevice::default());

    let (tx, rx) = channel::<()>();
    fetcher
        .acquire_async(sdio_43455(), device.clone(), move |_| tx.send(()).unwrap())
        .unwrap()
        .wait();

    assert!(rx.recv().is_err());
    assert_eq!(device.removals.load(Ordering::SeqCst), 1);
    // Only the code image is tried: both board types, then the generic file.
    assert_eq!(loader.paths().len(), 3);
}
