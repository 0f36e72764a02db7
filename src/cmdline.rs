// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;

use argh::FromArgs;
use fw_request::chips::Bus;
use fw_request::FirmwareName;

#[derive(FromArgs)]
/// Inspect and load Broadcom FullMAC firmware
pub struct Command {
    /// log level filter, overridden by RUST_LOG (default: info)
    #[argh(option, default = "String::from(\"info\")")]
    pub log_level: String,
    #[argh(subcommand)]
    pub command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Commands {
    Resolve(ResolveCommand),
    Tables(TablesCommand),
    Load(LoadCommand),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "resolve")]
/// Print the firmware base name of a chip revision
pub struct ResolveCommand {
    /// bus the chip is attached through (sdio or pcie)
    #[argh(option)]
    pub bus: Bus,
    /// chip id, hex or decimal
    #[argh(option, from_str_fn(parse_hex_or_decimal))]
    pub chip: u32,
    /// chip revision
    #[argh(option, from_str_fn(parse_hex_or_decimal))]
    pub rev: u32,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "tables")]
/// List the built-in firmware mappings of a bus
pub struct TablesCommand {
    /// bus to list (sdio or pcie)
    #[argh(option)]
    pub bus: Bus,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "load")]
/// Load the firmware files of a chip revision and report each item
pub struct LoadCommand {
    /// bus the chip is attached through (sdio or pcie)
    #[argh(option)]
    pub bus: Bus,
    /// chip id, hex or decimal
    #[argh(option, from_str_fn(parse_hex_or_decimal))]
    pub chip: u32,
    /// chip revision
    #[argh(option, from_str_fn(parse_hex_or_decimal))]
    pub rev: u32,
    /// firmware search directory, may be given more than once (default: /lib/firmware)
    #[argh(option, arg_name = "DIR")]
    pub fw_root: Vec<PathBuf>,
    /// path prepended to every firmware file name
    #[argh(option, arg_name = "PATH")]
    pub fw_path: Option<String>,
    /// board type candidate, most specific first
    #[argh(option, arg_name = "TYPE")]
    pub board_type: Vec<String>,
    /// firmware file extension to request, with ":optional" if the file may be missing
    #[argh(option, arg_name = "EXT[:optional]", from_str_fn(parse_item))]
    pub item: Vec<FirmwareName>,
    /// PCI domain of the device
    #[argh(option, from_str_fn(parse_u16))]
    pub domain: Option<u16>,
    /// PCI bus number of the device
    #[argh(option, from_str_fn(parse_u16))]
    pub bus_nr: Option<u16>,
    /// keep macaddr entries in the NVRAM
    #[argh(switch)]
    pub keep_mac: bool,
    /// load on a worker thread, removing the device on failure
    #[argh(switch, long = "async")]
    pub background: bool,
    /// JSON file with defaults for the options above
    #[argh(option, arg_name = "FILE")]
    pub cfg: Option<PathBuf>,
}

/// Parses a number with an optional `0x` prefix.
pub fn parse_hex_or_decimal(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn parse_u16(s: &str) -> Result<u16, String> {
    let value = parse_hex_or_decimal(s)?;
    u16::try_from(value).map_err(|_| format!("{} is out of range", s))
}

/// Parses `EXT[:optional]` into a firmware name.
pub fn parse_item(s: &str) -> Result<FirmwareName, String> {
    let (extension, optional) = match s.split_once(':') {
        Some((ext, "optional")) => (ext, true),
        Some((_, flag)) => return Err(format!("invalid item flag '{}'", flag)),
        None => (s, false),
    };
    if extension.is_empty() {
        return Err(format!("missing extension in '{}'", s));
    }
    let extension = if extension.starts_with('.') {
        extension.to_owned()
    } else {
        format!(".{}", extension)
    };
    Ok(if optional {
        FirmwareName::optional(extension)
    } else {
        FirmwareName::new(extension)
    })
}
