// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::borrow::Cow;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use fw_request::chips::Bus;
use fw_request::FirmwareMapping;
use fw_request::FirmwareName;
use remain::sorted;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::cmdline::parse_item;
use crate::cmdline::LoadCommand;

/// Firmware root used when neither the command line nor the config file name one.
pub const DEFAULT_FW_ROOT: &str = "/lib/firmware";

#[sorted]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid firmware item in config: {0}")]
    InvalidItem(String),
    #[error("failed to open config file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// A firmware mapping added on top of the built-in table of a bus.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct MappingConfig {
    pub chip: u32,
    pub revmask: u32,
    pub base: String,
}

/// Defaults for `brcmfw load`, read from a JSON file.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case", default)]
pub struct Config {
    pub fw_root: Vec<PathBuf>,
    pub fw_path: Option<String>,
    pub board_types: Vec<String>,
    /// Items as `EXT[:optional]`, replacing the default items of the bus.
    pub items: Vec<String>,
    pub domain: Option<u16>,
    pub bus_nr: Option<u16>,
    pub keep_mac: bool,
    /// Searched before the built-in table, so they can also override it.
    pub mappings: Vec<MappingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config> {
        let file = File::open(path).map_err(|source| ConfigError::Open {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}

/// Settings of a load, combining the command line with the config file.
#[derive(Debug)]
pub struct LoadOptions {
    pub bus: Bus,
    pub chip: u32,
    pub rev: u32,
    pub fw_roots: Vec<PathBuf>,
    pub fw_path: Option<String>,
    pub board_types: Vec<String>,
    pub names: Vec<FirmwareName>,
    pub domain_nr: u16,
    pub bus_nr: u16,
    pub strip_mac: bool,
    pub table: Vec<FirmwareMapping>,
    pub background: bool,
}

impl LoadOptions {
    /// Values given on the command line win over the ones from `cfg`.
    pub fn merge(cmd: LoadCommand, cfg: Config) -> Result<LoadOptions> {
        let fw_roots = first_non_empty(cmd.fw_root, cfg.fw_root)
            .unwrap_or_else(|| vec![PathBuf::from(DEFAULT_FW_ROOT)]);
        let board_types = first_non_empty(cmd.board_type, cfg.board_types).unwrap_or_default();

        let names = if !cmd.item.is_empty() {
            cmd.item
        } else if !cfg.items.is_empty() {
            cfg.items
                .iter()
                .map(|item| parse_item(item).map_err(ConfigError::InvalidItem))
                .collect::<Result<Vec<_>>>()?
        } else {
            cmd.bus.default_names()
        };

        let mut table: Vec<FirmwareMapping> = cfg
            .mappings
            .into_iter()
            .map(|m| FirmwareMapping {
                chip_id: m.chip,
                revmask: m.revmask,
                fw_base: Cow::Owned(m.base),
            })
            .collect();
        table.extend_from_slice(cmd.bus.table());

        Ok(LoadOptions {
            bus: cmd.bus,
            chip: cmd.chip,
            rev: cmd.rev,
            fw_roots,
            fw_path: cmd.fw_path.or(cfg.fw_path),
            board_types,
            names,
            domain_nr: cmd.domain.or(cfg.domain).unwrap_or(0),
            bus_nr: cmd.bus_nr.or(cfg.bus_nr).unwrap_or(0),
            strip_mac: !(cmd.keep_mac || cfg.keep_mac),
            table,
            background: cmd.background,
        })
    }
}

fn first_non_empty<T>(a: Vec<T>, b: Vec<T>) -> Option<Vec<T>> {
    [a, b].into_iter().find(|v| !v.is_empty())
}
