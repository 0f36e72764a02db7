// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Command line front end of the brcmfmac firmware request library.

mod cmdline;
mod config;

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc::channel;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Context;
use fw_request::chips::ChipId;
use fw_request::loader::DirectoryLoader;
use fw_request::nvram::NvramStripper;
use fw_request::resolve;
use fw_request::FirmwareDevice;
use fw_request::FirmwareFetcher;
use fw_request::FirmwareMapping;
use fw_request::FirmwareRequest;
use fw_request::RequestBuilder;
use log::info;
use log::warn;

use crate::cmdline::Command;
use crate::cmdline::Commands;
use crate::cmdline::LoadCommand;
use crate::cmdline::ResolveCommand;
use crate::cmdline::TablesCommand;
use crate::config::Config;
use crate::config::LoadOptions;

/// Stand-in for the bus device, remembering whether it was asked to detach.
struct CliDevice {
    label: String,
    removed: AtomicBool,
}

impl CliDevice {
    fn new(opts: &LoadOptions) -> CliDevice {
        CliDevice {
            label: format!("{}-{:04x}:{:02x}", opts.bus, opts.domain_nr, opts.bus_nr),
            removed: AtomicBool::new(false),
        }
    }

    fn removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

impl FirmwareDevice for CliDevice {
    fn debug_label(&self) -> String {
        self.label.clone()
    }

    fn request_removal(&self) {
        warn!("{}: device removal requested", self.label);
        self.removed.store(true, Ordering::SeqCst);
    }
}

fn chip_name(chip: u32) -> String {
    match ChipId::n(chip) {
        Some(id) => format!("{:?}", id),
        None => format!("{:#x}", chip),
    }
}

fn resolve_cmd(cmd: ResolveCommand) -> anyhow::Result<()> {
    let base = resolve(cmd.chip, cmd.rev, cmd.bus.table()).ok_or_else(|| {
        anyhow!(
            "no {} firmware for chip {} rev {}",
            cmd.bus,
            chip_name(cmd.chip),
            cmd.rev
        )
    })?;
    println!("{}", base);
    Ok(())
}

fn format_table(table: &[FirmwareMapping]) -> Vec<String> {
    table
        .iter()
        .map(|entry| {
            format!(
                "{:<10} {:#010x} {}",
                chip_name(entry.chip_id),
                entry.revmask,
                entry.fw_base
            )
        })
        .collect()
}

fn tables_cmd(cmd: TablesCommand) -> anyhow::Result<()> {
    for line in format_table(cmd.bus.table()) {
        println!("{}", line);
    }
    Ok(())
}

fn report(req: &FirmwareRequest) {
    if let Some(board) = req.board_type() {
        println!("board type: {}", board);
    }
    for (index, item) in req.items().iter().enumerate() {
        match item.payload() {
            Some(payload) => println!(
                "{}: {} ({:?}, {} bytes)",
                index,
                item.path(),
                item.kind(),
                payload.len()
            ),
            None => println!("{}: {} (not loaded)", index, item.path()),
        }
    }
}

fn load_cmd(cmd: LoadCommand) -> anyhow::Result<()> {
    let cfg = match &cmd.cfg {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let mut opts = LoadOptions::merge(cmd, cfg)?;

    let mut builder = RequestBuilder::new()
        .board_types(opts.board_types.clone())
        .bus_location(opts.domain_nr, opts.bus_nr);
    if let Some(fw_path) = &opts.fw_path {
        builder = builder.firmware_path(fw_path.clone());
    }
    let req = builder
        .alloc(opts.chip, opts.rev, &opts.table, &mut opts.names)
        .context("failed to build firmware request")?;

    let loader = DirectoryLoader::with_roots(opts.fw_roots.clone());
    let fetcher = FirmwareFetcher::new(Arc::new(loader))
        .with_normalizer(Arc::new(NvramStripper::new().strip_mac(opts.strip_mac)));

    if !opts.background {
        let (result, req) = fetcher.acquire_sync(req);
        result?;
        report(&req);
        return Ok(());
    }

    let device = Arc::new(CliDevice::new(&opts));
    let (tx, rx) = channel();
    fetcher
        .acquire_async(req, device.clone(), move |req| {
            // The receiver outlives the worker.
            let _ = tx.send(req);
        })
        .context("failed to start firmware request")?
        .wait();
    match rx.recv() {
        Ok(req) => {
            report(&req);
            Ok(())
        }
        Err(_) if device.removed() => bail!("firmware load failed, device removed"),
        Err(_) => bail!("firmware worker exited without completing"),
    }
}

fn brcmfw_main() -> anyhow::Result<()> {
    let args: Command = argh::from_env();

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .parse_default_env()
        .init();

    match args.command {
        Commands::Resolve(cmd) => resolve_cmd(cmd),
        Commands::Tables(cmd) => tables_cmd(cmd),
        Commands::Load(cmd) => {
            info!(
                "loading {} firmware for chip {} rev {}",
                cmd.bus,
                chip_name(cmd.chip),
                cmd.rev
            );
            load_cmd(cmd)
        }
    }
}

fn main() {
    if let Err(e) = brcmfw_main() {
        eprintln!("brcmfw: {:#}", e);
        std::process::exit(1);
    }
}
