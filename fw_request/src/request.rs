// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use bitflags::bitflags;
use log::debug;

use crate::resolve;
use crate::Error;
use crate::FirmwareMapping;
use crate::Result;
use crate::FW_MAX_BOARD_TYPES;
use crate::FW_NAME_LEN;

/// How the contents of a firmware file are used by the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FirmwareKind {
    /// Firmware image or blob downloaded as-is.
    Binary,
    /// NVRAM text, normalized before it is handed out.
    Nvram,
    /// Secure-element TRX image.
    TrxSecureElement,
    /// Secure-boot TRX image.
    TrxSecure,
}

impl FirmwareKind {
    /// Classifies a firmware file by its extension, with or without the leading dot.
    pub fn from_extension(extension: &str) -> Option<FirmwareKind> {
        match extension.strip_prefix('.').unwrap_or(extension) {
            "bin" | "clm_blob" | "txcap_blob" => Some(FirmwareKind::Binary),
            "txt" => Some(FirmwareKind::Nvram),
            "trxse" => Some(FirmwareKind::TrxSecureElement),
            "trxs" => Some(FirmwareKind::TrxSecure),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ItemFlags: u16 {
        /// Failing to load the item does not fail the request.
        const OPTIONAL = 0x0001;
    }
}

/// Contents of a loaded firmware item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirmwarePayload {
    /// File contents as read from the loader.
    Binary(Vec<u8>),
    /// Normalized NVRAM, ready to be downloaded to the device.
    Nvram(Vec<u8>),
}

impl FirmwarePayload {
    pub fn data(&self) -> &[u8] {
        match self {
            FirmwarePayload::Binary(data) | FirmwarePayload::Nvram(data) => data,
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        match self {
            FirmwarePayload::Binary(data) | FirmwarePayload::Nvram(data) => data,
        }
    }
}

/// A single file of a [`FirmwareRequest`].
#[derive(Debug)]
pub struct FirmwareItem {
    path: String,
    kind: FirmwareKind,
    flags: ItemFlags,
    payload: Option<FirmwarePayload>,
}

impl FirmwareItem {
    /// Path of the file. Once loaded this is the path the file was actually found at, which may
    /// include a board type qualifier.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> FirmwareKind {
        self.kind
    }

    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    pub fn is_optional(&self) -> bool {
        self.flags.contains(ItemFlags::OPTIONAL)
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    pub fn payload(&self) -> Option<&FirmwarePayload> {
        self.payload.as_ref()
    }

    /// Takes ownership of the loaded contents, leaving the item empty.
    pub fn take_payload(&mut self) -> Option<FirmwarePayload> {
        self.payload.take()
    }

    pub(crate) fn set_path(&mut self, path: String) {
        self.path = path;
    }

    pub(crate) fn fill(&mut self, payload: FirmwarePayload) -> Result<()> {
        if self.payload.is_some() {
            return Err(Error::PayloadAlreadySet(self.path.clone()));
        }
        self.payload = Some(payload);
        Ok(())
    }
}

/// File name of one item to request, before the request is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareName {
    pub extension: String,
    pub optional: bool,
    path: String,
}

impl FirmwareName {
    /// A file the device cannot work without.
    pub fn new(extension: impl Into<String>) -> FirmwareName {
        FirmwareName {
            extension: extension.into(),
            optional: false,
            path: String::new(),
        }
    }

    pub fn optional(extension: impl Into<String>) -> FirmwareName {
        FirmwareName {
            optional: true,
            ..FirmwareName::new(extension)
        }
    }

    /// Full path, set when the name is used to build a request.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// All the files a device needs, loaded in order by a [`crate::FirmwareFetcher`].
#[derive(Debug)]
pub struct FirmwareRequest {
    pub domain_nr: u16,
    pub bus_nr: u16,
    n_items: u32,
    pub(crate) board_types: Vec<String>,
    pub(crate) board_index: Option<usize>,
    pub(crate) items: Vec<FirmwareItem>,
}

impl FirmwareRequest {
    pub fn item_count(&self) -> u32 {
        self.n_items
    }

    pub fn items(&self) -> &[FirmwareItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&FirmwareItem> {
        self.items.get(index)
    }

    /// Takes ownership of the contents of item `index`.
    pub fn take_payload(&mut self, index: usize) -> Option<FirmwarePayload> {
        self.items.get_mut(index)?.take_payload()
    }

    /// Board type candidates, most specific first.
    pub fn board_types(&self) -> &[String] {
        &self.board_types
    }

    /// The board type the files of this request were found for, once one has been found.
    pub fn board_type(&self) -> Option<&str> {
        self.board_index
            .and_then(|i| self.board_types.get(i))
            .map(String::as_str)
    }

    /// Returns true when every item that is not optional has been loaded.
    pub fn is_complete(&self) -> bool {
        self.items
            .iter()
            .all(|item| item.is_optional() || item.is_loaded())
    }

    /// Checks that the request can be handed to a fetcher.
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(Error::EmptyRequest);
        }
        if let Some(index) = self.items.iter().position(|item| item.path.is_empty()) {
            return Err(Error::EmptyPath(index));
        }
        Ok(())
    }

    /// Drops every loaded payload.
    pub(crate) fn release(&mut self) {
        for item in &mut self.items {
            item.payload = None;
        }
    }
}

/// Returns the board specific variant of `path`: `<base>.<board_type><extension>`.
///
/// A `/` in the board type is replaced by `-`. Returns `None` when `path` has no extension or the
/// variant does not fit in [`FW_NAME_LEN`].
pub fn alt_fw_path(path: &str, board_type: &str) -> Option<String> {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    let dot = path[file_start..].rfind('.')? + file_start;
    if dot == file_start {
        return None;
    }
    let (base, suffix) = path.split_at(dot);
    let alt = format!("{}.{}{}", base, board_type.replace('/', "-"), suffix);
    if alt.len() >= FW_NAME_LEN {
        return None;
    }
    Some(alt)
}

/// Builds [`FirmwareRequest`]s.
#[derive(Clone, Debug, Default)]
pub struct RequestBuilder {
    fw_path: Option<String>,
    board_types: Vec<String>,
    domain_nr: u16,
    bus_nr: u16,
}

impl RequestBuilder {
    pub fn new() -> RequestBuilder {
        Default::default()
    }

    /// Directory prepended to every path, overriding the firmware root of the loader.
    pub fn firmware_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.fw_path = if path.is_empty() { None } else { Some(path) };
        self
    }

    /// Board type candidates, most specific first.
    pub fn board_types<I, S>(mut self, board_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.board_types = board_types.into_iter().map(Into::into).collect();
        self
    }

    /// PCI domain and bus numbers of the device, used to select its NVRAM entries.
    pub fn bus_location(mut self, domain_nr: u16, bus_nr: u16) -> Self {
        self.domain_nr = domain_nr;
        self.bus_nr = bus_nr;
        self
    }

    /// Builds a request for the files `<base><extension>` of every entry of `names`, setting the
    /// path of each name.
    pub fn build(&self, base: &str, names: &mut [FirmwareName]) -> Result<FirmwareRequest> {
        if self.board_types.len() > FW_MAX_BOARD_TYPES {
            return Err(Error::BoardTypeCount(self.board_types.len()));
        }

        let mut items = Vec::new();
        items.try_reserve_exact(names.len()).map_err(Error::Allocation)?;
        let mut board_types = Vec::new();
        board_types
            .try_reserve_exact(self.board_types.len())
            .map_err(Error::Allocation)?;
        board_types.extend(self.board_types.iter().cloned());

        for (index, name) in names.iter_mut().enumerate() {
            let kind = FirmwareKind::from_extension(&name.extension)
                .ok_or_else(|| Error::UnknownExtension(name.extension.clone()))?;
            let path = self.fw_name(base, &name.extension)?;
            if index == 0 && name.optional {
                return Err(Error::OptionalPrimary(path));
            }
            let mut flags = ItemFlags::empty();
            if name.optional {
                flags |= ItemFlags::OPTIONAL;
            }
            debug!("firmware item {}: {} ({:?})", index, path, kind);
            name.path = path.clone();
            items.push(FirmwareItem {
                path,
                kind,
                flags,
                payload: None,
            });
        }

        Ok(FirmwareRequest {
            domain_nr: self.domain_nr,
            bus_nr: self.bus_nr,
            n_items: items.len() as u32,
            board_types,
            board_index: None,
            items,
        })
    }

    /// Looks up the firmware of revision `chiprev` of `chip` in `table` and builds a request
    /// for it.
    pub fn alloc(
        &self,
        chip: u32,
        chiprev: u32,
        table: &[FirmwareMapping],
        names: &mut [FirmwareName],
    ) -> Result<FirmwareRequest> {
        let base = resolve(chip, chiprev, table).ok_or(Error::UnknownChip { chip, chiprev })?;
        debug!("using {} for chip {:#x} rev {}", base, chip, chiprev);
        self.build(base, names)
    }

    fn fw_name(&self, base: &str, extension: &str) -> Result<String> {
        let mut path = String::new();
        if let Some(fw_path) = &self.fw_path {
            path.push_str(fw_path);
            if !fw_path.ends_with('/') {
                path.push('/');
            }
        }
        path.push_str(base);
        if !extension.starts_with('.') {
            path.push('.');
        }
        path.push_str(extension);
        if path.len() >= FW_NAME_LEN {
            return Err(Error::PathTooLong(path));
        }
        Ok(path)
    }
}

/// Builds a request for `base` with board type candidates `board_types`.
pub fn build_request<S: AsRef<str>>(
    base: &str,
    names: &mut [FirmwareName],
    board_types: &[S],
) -> Result<FirmwareRequest> {
    RequestBuilder::new()
        .board_types(board_types.iter().map(|s| s.as_ref().to_owned()))
        .build(base, names)
}
