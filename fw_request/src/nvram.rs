// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! NVRAM normalization.
//!
//! NVRAM files are text files of `key=value` entries, separated by whitespace and possibly
//! commented with `#`. The device expects the entries as a sequence of NUL terminated strings,
//! padded to a multiple of 4 bytes and followed by a length token.
//!
//! A single file may describe several devices on the same board. Such files either contain
//! `devpathN=pcie/<domain>/<bus>` entries and prefix every key of device N with `N:`, or prefix
//! every key with `pcie/<domain>/<bus>/`. Only the entries of the requesting device are kept.

use log::debug;
use log::info;
use remain::sorted;
use thiserror::Error;

/// Input beyond this size is ignored.
pub const FW_MAX_NVRAM_SIZE: usize = 64000;

const DEFAULT_BOARDREV: &[u8] = b"boardrev=0xff";

#[sorted]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("no devpath entry for pci domain {domain_nr} bus {bus_nr}")]
    DevpathNotFound { domain_nr: u16, bus_nr: u16 },
    #[error("nvram is empty")]
    Empty,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Turns the contents of an NVRAM file into what is downloaded to the device.
pub trait NvramNormalizer: Send + Sync {
    fn normalize(&self, data: &[u8], domain_nr: u16, bus_nr: u16) -> Result<Vec<u8>>;
}

/// The default [`NvramNormalizer`].
#[derive(Clone, Debug, Default)]
pub struct NvramStripper {
    strip_mac: bool,
}

impl NvramStripper {
    pub fn new() -> NvramStripper {
        Default::default()
    }

    /// Drops `macaddr` entries, for platforms that provide the MAC address themselves.
    pub fn strip_mac(mut self, strip_mac: bool) -> Self {
        self.strip_mac = strip_mac;
        self
    }
}

impl NvramNormalizer for NvramStripper {
    fn normalize(&self, data: &[u8], domain_nr: u16, bus_nr: u16) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(Error::Empty);
        }

        let mut parser = Parser::new(data, self.strip_mac);
        parser.run();

        let entries = if parser.multi_dev_v1 {
            strip_multi_v1(&parser.entries, domain_nr, bus_nr)?
        } else if parser.multi_dev_v2 {
            strip_multi_v2(&parser.entries, domain_nr, bus_nr)
        } else {
            parser.entries
        };

        Ok(finish(&entries))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Key,
    Value,
    Comment,
    End,
}

fn is_nvram_char(c: u8) -> bool {
    c != b'#' && c > 0x20 && c < 0x7f
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\r' | b'\n' | b'\t')
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    entry: usize,
    line: usize,
    column: usize,
    // Size of the entries once NUL terminated.
    size: usize,
    entries: Vec<&'a [u8]>,
    multi_dev_v1: bool,
    multi_dev_v2: bool,
    strip_mac: bool,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8], strip_mac: bool) -> Parser<'a> {
        Parser {
            data: &data[..data.len().min(FW_MAX_NVRAM_SIZE)],
            pos: 0,
            entry: 0,
            line: 1,
            column: 1,
            size: 0,
            entries: Vec::new(),
            multi_dev_v1: false,
            multi_dev_v2: false,
            strip_mac,
        }
    }

    fn run(&mut self) {
        let mut state = State::Idle;
        while self.pos < self.data.len() {
            state = match state {
                State::Idle => self.idle(),
                State::Key => self.key(),
                State::Value => self.value(),
                State::Comment => self.comment(),
                State::End => break,
            };
        }
        // Last entry without trailing whitespace.
        if state == State::Value {
            self.add_entry();
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
        self.column += 1;
    }

    fn idle(&mut self) -> State {
        let c = self.data[self.pos];
        if c == b'\n' {
            return State::Comment;
        }
        if is_whitespace(c) || c == 0 {
            self.advance();
            return State::Idle;
        }
        if c == b'#' {
            return State::Comment;
        }
        if is_nvram_char(c) {
            self.entry = self.pos;
            return State::Key;
        }
        debug!(
            "nvram ln={}:col={}: ignoring invalid character",
            self.line, self.column
        );
        State::Comment
    }

    fn key(&mut self) -> State {
        let c = self.data[self.pos];
        let mut state = State::Key;
        if c == b'=' {
            let key = &self.data[self.entry..self.pos];
            // RAW1 is a binary blob the device does not use.
            state = if key.starts_with(b"RAW1") {
                State::Comment
            } else {
                State::Value
            };
            if key.starts_with(b"devpath") {
                self.multi_dev_v1 = true;
            }
            if key.starts_with(b"pcie/") {
                self.multi_dev_v2 = true;
            }
            if self.strip_mac && key.starts_with(b"macaddr") {
                state = State::Comment;
            }
        } else if !is_nvram_char(c) {
            debug!(
                "nvram ln={}:col={}: '=' expected, skip invalid key entry",
                self.line, self.column
            );
            return State::Comment;
        }
        self.advance();
        state
    }

    fn value(&mut self) -> State {
        if !is_nvram_char(self.data[self.pos]) {
            return self.add_entry();
        }
        self.advance();
        State::Value
    }

    fn add_entry(&mut self) -> State {
        let entry = &self.data[self.entry..self.pos];
        if self.size + entry.len() + 1 >= FW_MAX_NVRAM_SIZE {
            return State::End;
        }
        self.size += entry.len() + 1;
        self.entries.push(entry);
        State::Idle
    }

    fn comment(&mut self) -> State {
        match self.data[self.pos..]
            .iter()
            .position(|&c| c == b'\n' || c == b'\r')
        {
            Some(eol) => {
                self.line += 1;
                self.column = 1;
                self.pos += eol + 1;
                State::Idle
            }
            None => {
                self.pos = self.data.len();
                State::End
            }
        }
    }
}

// Matches `=pci/<domain>/<bus>` or `=pcie/<domain>/<bus>`, optionally followed by more path.
fn devpath_matches(value: &[u8], domain_nr: u16, bus_nr: u16) -> bool {
    let location = format!("/{}/{}", domain_nr, bus_nr);
    let Some(rest) = value
        .strip_prefix(b"=pcie")
        .or_else(|| value.strip_prefix(b"=pci"))
    else {
        return false;
    };
    match rest.strip_prefix(location.as_bytes()) {
        Some(tail) => tail.is_empty() || tail[0] == b'/',
        None => false,
    }
}

fn strip_multi_v1<'a>(
    entries: &[&'a [u8]],
    domain_nr: u16,
    bus_nr: u16,
) -> Result<Vec<&'a [u8]>> {
    let id = entries
        .iter()
        .find_map(|entry| {
            let rest = entry.strip_prefix(b"devpath")?;
            let (&id, value) = rest.split_first()?;
            (id.is_ascii_digit() && devpath_matches(value, domain_nr, bus_nr)).then_some(id)
        })
        .ok_or(Error::DevpathNotFound { domain_nr, bus_nr })?;

    info!(
        "nvram: using device {} for pci domain {} bus {}",
        id - b'0',
        domain_nr,
        bus_nr
    );
    Ok(entries
        .iter()
        .filter_map(|&entry| match entry {
            [c, b':', rest @ ..] if *c == id => Some(rest),
            _ => None,
        })
        .collect())
}

fn strip_multi_v2<'a>(entries: &[&'a [u8]], domain_nr: u16, bus_nr: u16) -> Vec<&'a [u8]> {
    let prefix = format!("pcie/{}/{}/", domain_nr, bus_nr);
    entries
        .iter()
        .filter_map(|&entry| entry.strip_prefix(prefix.as_bytes()))
        .collect()
}

// Serializes the entries, adding the defaults the device requires, and appends the length token.
fn finish(entries: &[&[u8]]) -> Vec<u8> {
    let mut nvram = Vec::new();
    for entry in entries {
        nvram.extend_from_slice(entry);
        nvram.push(0);
    }
    if !entries.iter().any(|entry| entry.starts_with(b"boardrev")) {
        nvram.extend_from_slice(DEFAULT_BOARDREV);
        nvram.push(0);
    }

    let padded = (nvram.len() + 1).next_multiple_of(4);
    nvram.resize(padded, 0);

    let words = (padded / 4) as u32;
    let token = (!words << 16) | (words & 0x0000ffff);
    nvram.extend_from_slice(&token.to_le_bytes());
    nvram
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(data: &[u8]) -> Result<Vec<u8>> {
        NvramStripper::new().normalize(data, 0, 0)
    }

    // Splits normalized NVRAM back into its entries, checking the padding and token.
    fn entries(nvram: &[u8]) -> Vec<String> {
        assert_eq!(nvram.len() % 4, 0);
        let (body, token) = nvram.split_at(nvram.len() - 4);
        let words = (body.len() / 4) as u32;
        assert_eq!(
            u32::from_le_bytes(token.try_into().unwrap()),
            (!words << 16) | words
        );
        assert_eq!(body.last(), Some(&0));
        body.split(|&c| c == 0)
            .filter(|entry| !entry.is_empty())
            .map(|entry| String::from_utf8(entry.to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn exact_layout() {
        let mut want = b"a=1\0boardrev=0xff\0\0\0".to_vec();
        want.extend_from_slice(&0xfffa0005u32.to_le_bytes());
        assert_eq!(normalize(b"a=1\n").unwrap(), want);
    }

    #[test]
    fn strip_comments_and_whitespace() {
        let data = b"# board config\n\
            manfid=0x2d0\r\n\
            \tprodid=0x0727   # trailing comment\n\
            \n\
            vendid=0x14e4\n\
            boardrev=0x1301\n";
        assert_eq!(
            entries(&normalize(data).unwrap()),
            [
                "manfid=0x2d0",
                "prodid=0x0727",
                "vendid=0x14e4",
                "boardrev=0x1301"
            ]
        );
    }

    #[test]
    fn default_boardrev() {
        assert_eq!(
            entries(&normalize(b"sromrev=11").unwrap()),
            ["sromrev=11", "boardrev=0xff"]
        );
        assert_eq!(
            entries(&normalize(b"# nothing but comments\n").unwrap()),
            ["boardrev=0xff"]
        );
    }

    #[test]
    fn skip_invalid_entries() {
        let data = b"good=1\nbad key=2\n\x01junk=3\nRAW1=80 32 fe\nalso=ok\n";
        assert_eq!(
            entries(&normalize(data).unwrap()),
            ["good=1", "also=ok", "boardrev=0xff"]
        );
    }

    #[test]
    fn strip_macaddr() {
        let data = b"macaddr=00:90:4c:c5:12:38\nccode=US\n";
        assert_eq!(
            entries(&normalize(data).unwrap()),
            ["macaddr=00:90:4c:c5:12:38", "ccode=US", "boardrev=0xff"]
        );
        let stripper = NvramStripper::new().strip_mac(true);
        assert_eq!(
            entries(&stripper.normalize(data, 0, 0).unwrap()),
            ["ccode=US", "boardrev=0xff"]
        );
    }

    #[test]
    fn multi_device_v1() {
        let data = b"devpath0=pcie/1/4/\n\
            0:boardrev=0x1101\n\
            0:sromrev=11\n\
            devpath1=pcie/2/1\n\
            1:sromrev=13\n\
            shared=1\n";
        let stripper = NvramStripper::new();
        assert_eq!(
            entries(&stripper.normalize(data, 1, 4).unwrap()),
            ["boardrev=0x1101", "sromrev=11"]
        );
        assert_eq!(
            entries(&stripper.normalize(data, 2, 1).unwrap()),
            ["sromrev=13", "boardrev=0xff"]
        );
        assert_eq!(
            stripper.normalize(data, 1, 40),
            Err(Error::DevpathNotFound {
                domain_nr: 1,
                bus_nr: 40
            })
        );
    }

    #[test]
    fn multi_device_v1_pci() {
        let data = b"devpath3=pci/0/1\n3:ccode=DE\n";
        assert_eq!(
            entries(&NvramStripper::new().normalize(data, 0, 1).unwrap()),
            ["ccode=DE", "boardrev=0xff"]
        );
    }

    #[test]
    fn multi_device_v2() {
        let data = b"pcie/1/4/sromrev=11\npcie/1/4/boardrev=0x1250\npcie/2/1/sromrev=13\n";
        let stripper = NvramStripper::new();
        assert_eq!(
            entries(&stripper.normalize(data, 1, 4).unwrap()),
            ["sromrev=11", "boardrev=0x1250"]
        );
        assert_eq!(
            entries(&stripper.normalize(data, 3, 3).unwrap()),
            ["boardrev=0xff"]
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(b""), Err(Error::Empty));
    }

    #[test]
    fn oversized_input() {
        let mut data = Vec::new();
        let mut i = 0;
        while data.len() < 2 * FW_MAX_NVRAM_SIZE {
            data.extend_from_slice(format!("key{}=value{}\n", i, i).as_bytes());
            i += 1;
        }
        let nvram = normalize(&data).unwrap();
        assert!(nvram.len() < FW_MAX_NVRAM_SIZE + 32);
        assert_eq!(entries(&nvram).first().map(String::as_str), Some("key0=value0"));
    }
}
