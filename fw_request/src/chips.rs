// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Chip ids and firmware mapping tables of the supported bus types.

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use enumn::N;

use crate::FirmwareMapping;
use crate::FirmwareName;

/// Chip ids as read from the chipcommon core.
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum ChipId {
    Bcm4329 = 0x4329,
    Bcm4330 = 0x4330,
    Bcm4334 = 0x4334,
    Bcm4335 = 0x4335,
    Bcm4339 = 0x4339,
    Bcm4345 = 0x4345,
    Bcm4350 = 0x4350,
    Bcm4354 = 0x4354,
    Bcm4356 = 0x4356,
    Bcm4358 = 0x4358,
    Bcm4359 = 0x4359,
    Bcm4364 = 0x4364,
    Bcm4365 = 0x4365,
    Bcm4366 = 0x4366,
    Bcm4371 = 0x4371,
    Bcm43241 = 0x4324,
    Bcm43143 = 0xa887,
    Bcm43340 = 0xa994,
    Bcm43341 = 0xa995,
    Bcm43362 = 0xa962,
    Bcm43430 = 0xa9a6,
    Bcm43567 = 0xaa6f,
    Bcm43569 = 0xaa71,
    Bcm43570 = 0xaa72,
    Bcm43602 = 0xaa52,
    Cy4373 = 0x4373,
    Cy43012 = 0xa804,
    Cy43752 = 0xaae8,
    Cy55572 = 0xd908,
}

macro_rules! brcmf_fw {
    ($chip:expr, $revmask:expr, $base:literal) => {
        FirmwareMapping::new($chip as u32, $revmask, concat!(fw_default_path!(), $base))
    };
}

macro_rules! cy_fw {
    ($chip:expr, $revmask:expr, $base:literal) => {
        FirmwareMapping::new($chip as u32, $revmask, concat!(cy_fw_default_path!(), $base))
    };
}

pub static SDIO_FIRMWARE_TABLE: &[FirmwareMapping] = &[
    brcmf_fw!(ChipId::Bcm43143, 0xffffffff, "brcmfmac43143-sdio"),
    brcmf_fw!(ChipId::Bcm43241, 0x0000001f, "brcmfmac43241b0-sdio"),
    brcmf_fw!(ChipId::Bcm43241, 0x00000020, "brcmfmac43241b4-sdio"),
    brcmf_fw!(ChipId::Bcm43241, 0xffffffc0, "brcmfmac43241b5-sdio"),
    brcmf_fw!(ChipId::Bcm4329, 0xffffffff, "brcmfmac4329-sdio"),
    brcmf_fw!(ChipId::Bcm4330, 0xffffffff, "brcmfmac4330-sdio"),
    brcmf_fw!(ChipId::Bcm4334, 0xffffffff, "brcmfmac4334-sdio"),
    brcmf_fw!(ChipId::Bcm43340, 0xffffffff, "brcmfmac43340-sdio"),
    brcmf_fw!(ChipId::Bcm43341, 0xffffffff, "brcmfmac43340-sdio"),
    brcmf_fw!(ChipId::Bcm4335, 0xffffffff, "brcmfmac4335-sdio"),
    brcmf_fw!(ChipId::Bcm43362, 0xfffffffe, "brcmfmac43362-sdio"),
    brcmf_fw!(ChipId::Bcm4339, 0xffffffff, "brcmfmac4339-sdio"),
    brcmf_fw!(ChipId::Bcm43430, 0x00000001, "brcmfmac43430a0-sdio"),
    brcmf_fw!(ChipId::Bcm43430, 0xfffffffe, "brcmfmac43430-sdio"),
    brcmf_fw!(ChipId::Bcm4345, 0x00000200, "brcmfmac43456-sdio"),
    brcmf_fw!(ChipId::Bcm4345, 0xfffffdc0, "brcmfmac43455-sdio"),
    brcmf_fw!(ChipId::Bcm4354, 0xffffffff, "brcmfmac4354-sdio"),
    brcmf_fw!(ChipId::Bcm4356, 0xffffffff, "brcmfmac4356-sdio"),
    brcmf_fw!(ChipId::Bcm4359, 0xffffffff, "brcmfmac4359-sdio"),
    brcmf_fw!(ChipId::Cy4373, 0xffffffff, "brcmfmac4373-sdio"),
    brcmf_fw!(ChipId::Cy43012, 0xffffffff, "brcmfmac43012-sdio"),
    brcmf_fw!(ChipId::Cy43752, 0xffffffff, "brcmfmac43752-sdio"),
    cy_fw!(ChipId::Cy55572, 0xffffffff, "cyfmac55572-sdio"),
];

pub static PCIE_FIRMWARE_TABLE: &[FirmwareMapping] = &[
    brcmf_fw!(ChipId::Bcm43602, 0xffffffff, "brcmfmac43602-pcie"),
    brcmf_fw!(ChipId::Bcm4350, 0x000000ff, "brcmfmac4350c2-pcie"),
    brcmf_fw!(ChipId::Bcm4350, 0xffffff00, "brcmfmac4350-pcie"),
    brcmf_fw!(ChipId::Bcm4356, 0xffffffff, "brcmfmac4356-pcie"),
    brcmf_fw!(ChipId::Bcm43567, 0xffffffff, "brcmfmac43570-pcie"),
    brcmf_fw!(ChipId::Bcm43569, 0xffffffff, "brcmfmac43570-pcie"),
    brcmf_fw!(ChipId::Bcm43570, 0xffffffff, "brcmfmac43570-pcie"),
    brcmf_fw!(ChipId::Bcm4358, 0xffffffff, "brcmfmac4358-pcie"),
    brcmf_fw!(ChipId::Bcm4359, 0xffffffff, "brcmfmac4359-pcie"),
    brcmf_fw!(ChipId::Bcm4364, 0x0000000f, "brcmfmac4364b2-pcie"),
    brcmf_fw!(ChipId::Bcm4364, 0xfffffff0, "brcmfmac4364b3-pcie"),
    brcmf_fw!(ChipId::Bcm4365, 0x0000000f, "brcmfmac4365b-pcie"),
    brcmf_fw!(ChipId::Bcm4365, 0xfffffff0, "brcmfmac4365c-pcie"),
    brcmf_fw!(ChipId::Bcm4366, 0x0000000f, "brcmfmac4366b-pcie"),
    brcmf_fw!(ChipId::Bcm4366, 0xfffffff0, "brcmfmac4366c-pcie"),
    brcmf_fw!(ChipId::Bcm4371, 0xffffffff, "brcmfmac4371-pcie"),
];

/// Host bus the chip is attached through.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    Sdio,
    Pcie,
}

impl Bus {
    /// Firmware mapping table of chips supported on this bus.
    pub fn table(&self) -> &'static [FirmwareMapping] {
        match self {
            Bus::Sdio => SDIO_FIRMWARE_TABLE,
            Bus::Pcie => PCIE_FIRMWARE_TABLE,
        }
    }

    /// Files a bus driver requests for every chip: the firmware image, the NVRAM and the
    /// optional country local matrix and transmit capability blobs.
    ///
    /// SDIO boards cannot run without NVRAM, PCIe boards may keep it in OTP instead.
    pub fn default_names(&self) -> Vec<FirmwareName> {
        let nvram = match self {
            Bus::Sdio => FirmwareName::new(".txt"),
            Bus::Pcie => FirmwareName::optional(".txt"),
        };
        let mut names = vec![FirmwareName::new(".bin"), nvram];
        names.push(FirmwareName::optional(".clm_blob"));
        if *self == Bus::Pcie {
            names.push(FirmwareName::optional(".txcap_blob"));
        }
        names
    }
}

impl Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Bus::Sdio => write!(f, "sdio"),
            Bus::Pcie => write!(f, "pcie"),
        }
    }
}

impl FromStr for Bus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sdio" => Ok(Bus::Sdio),
            "pcie" => Ok(Bus::Pcie),
            _ => Err(format!("invalid bus type '{}', expected sdio or pcie", s)),
        }
    }
}
