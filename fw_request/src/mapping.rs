// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::borrow::Cow;

/// Maps a chip id and a set of chip revisions to the base name of its firmware files.
///
/// Each bus type has its own table of mappings, see [`crate::chips`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareMapping {
    /// ID of the chip.
    pub chip_id: u32,
    /// Bitmask of revisions, e.g. 0x10 means rev 4 only, 0xf means rev 0-3.
    pub revmask: u32,
    /// Firmware file name without extension, relative to the firmware root.
    pub fw_base: Cow<'static, str>,
}

impl FirmwareMapping {
    pub const fn new(chip_id: u32, revmask: u32, fw_base: &'static str) -> FirmwareMapping {
        FirmwareMapping {
            chip_id,
            revmask,
            fw_base: Cow::Borrowed(fw_base),
        }
    }

    /// Returns true if this entry covers revision `chiprev` of `chip`.
    pub fn matches(&self, chip: u32, chiprev: u32) -> bool {
        self.chip_id == chip
            && self
                .revmask
                .checked_shr(chiprev)
                .is_some_and(|mask| mask & 1 == 1)
    }
}

/// Looks up the firmware base name of revision `chiprev` of `chip` in `table`.
///
/// Entries are searched in table order and the first match wins. Returns `None` when the chip is
/// not supported.
pub fn resolve(chip: u32, chiprev: u32, table: &[FirmwareMapping]) -> Option<&str> {
    table
        .iter()
        .find(|entry| entry.matches(chip, chiprev))
        .map(|entry| entry.fw_base.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[FirmwareMapping] = &[
        FirmwareMapping::new(0x1234, 0x0000000f, "chipX"),
        FirmwareMapping::new(0x1234, 0xfffffff0, "chipY"),
        FirmwareMapping::new(0x5678, 0xffffffff, "chipZ"),
    ];

    #[test]
    fn revision_in_mask() {
        assert_eq!(resolve(0x1234, 2, TABLE), Some("chipX"));
        assert_eq!(resolve(0x1234, 0, TABLE), Some("chipX"));
        assert_eq!(resolve(0x1234, 4, TABLE), Some("chipY"));
        assert_eq!(resolve(0x5678, 31, TABLE), Some("chipZ"));
    }

    #[test]
    fn revision_not_in_mask() {
        let table = [FirmwareMapping::new(0x1234, 0x0f, "chipX")];
        assert_eq!(resolve(0x1234, 2, &table), Some("chipX"));
        assert_eq!(resolve(0x1234, 4, &table), None);
    }

    #[test]
    fn unknown_chip() {
        assert_eq!(resolve(0x4321, 0, TABLE), None);
        assert_eq!(resolve(0x1234, 0, &[]), None);
    }

    #[test]
    fn revision_out_of_range() {
        assert_eq!(resolve(0x5678, 32, TABLE), None);
        assert_eq!(resolve(0x5678, u32::MAX, TABLE), None);
    }

    #[test]
    fn overlapping_masks_first_match() {
        let table = [
            FirmwareMapping::new(0x1234, 0x03, "first"),
            FirmwareMapping::new(0x1234, 0x02, "second"),
        ];
        assert_eq!(resolve(0x1234, 1, &table), Some("first"));
    }

    #[test]
    fn lookup_is_pure() {
        let queries = [(0x1234, 3), (0x5678, 7), (0x1234, 9), (0x9999, 0)];
        let first: Vec<_> = queries
            .iter()
            .map(|&(chip, rev)| resolve(chip, rev, TABLE))
            .collect();
        let reversed: Vec<_> = queries
            .iter()
            .rev()
            .map(|&(chip, rev)| resolve(chip, rev, TABLE))
            .collect();
        assert_eq!(first, reversed.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn owned_base_name() {
        let table = [FirmwareMapping {
            chip_id: 0x4345,
            revmask: 0x40,
            fw_base: Cow::Owned(String::from("vendor/custom")),
        }];
        assert_eq!(resolve(0x4345, 6, &table), Some("vendor/custom"));
    }
}
