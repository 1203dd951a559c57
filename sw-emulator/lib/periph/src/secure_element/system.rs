/*++

Licensed under the Apache-2.0 license.

File Name:

    system.rs

Abstract:

    File contains the secure element device commands: random numbers,
    device data, the flash data region and the QSPI reference clock.

--*/

use super::{FlashGeometry, Request, ResponseCode, SeError};
use rand::RngCore;
use symcrypto_emu_bus::MemoryAccess;
use symcrypto_emu_types::emu_enum;

mod constants {
    #![allow(unused)]

    pub const QSPI_FLASH_HOST_BASE: u32 = 0x0100_0000;
    pub const CODE_REGION_UNIT: u32 = 32 * 1024;
    pub const CODE_REGION_SIZE_MASK: u32 = 0xfff;
    pub const ERASED: u8 = 0xff;

    pub const DEVICE_DATA_LOCATION_SHIFT: u32 = 12;
    pub const DEVICE_DATA_TYPE_SHIFT: u32 = 4;
    pub const DEVICE_DATA_SIZE_MASK: u32 = 0xff;
    /// Value reported for every device data read
    pub const DEVICE_DATA_VALUE: u32 = 1;

    pub const QSPI_INT_DIV_SHIFT: u32 = 16;
    pub const QSPI_FRAC_DIV_MASK: u32 = 0xffff;
    pub const QSPI_FRAC_DIV_LIMIT: u32 = 2048;
    pub const QSPI_INT_DIV_MIN: u32 = 5;
    pub const QSPI_INT_DIV_MAX: u32 = 12;
}

emu_enum!(
    /// Device data section, high nibble of the location
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    DeviceDataLocation;
    u32;
    {
        Cc = 0,
        Di = 1,
        WaferProbe = 2,
    };
    Unknown
);

emu_enum!(
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    DeviceDataReadSize;
    u32;
    {
        WholeElement = 0,
        ChunkOfElement = 1,
        OneWord = 2,
        GetSize = 3,
        GetValue = 4,
    };
    Unknown
);

fn check_geometry(flash: &FlashGeometry) -> Result<(), SeError> {
    if flash.size == 0 || flash.page_size == 0 {
        tracing::error!(
            size = flash.size,
            page_size = flash.page_size,
            "flash geometry not configured"
        );
        Err(SeError::Response(ResponseCode::Abort))?
    }
    Ok(())
}

/// Fail unless `len` bytes from `start` lie inside the flash.
fn check_flash_range(flash: &FlashGeometry, start: u32, len: u32) -> Result<(), SeError> {
    match start.checked_add(len) {
        Some(end) if end <= flash.size => Ok(()),
        _ => {
            tracing::error!(start, len, size = flash.size, "range outside flash");
            Err(SeError::Response(ResponseCode::InvalidParameter))
        }
    }
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn random(req: &mut Request) -> Result<(), SeError> {
    req.expect_params(1, ResponseCode::InvalidParameter)?;
    let output = req.outputs().next_descriptor(req.memory)?;
    let len = req.params[0] as usize;
    if len > output.size {
        tracing::error!(len, size = output.size, "random output buffer too small");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    let mut bytes = vec![0; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    Ok(req.memory.write_bytes(output.data_address, &bytes)?)
}

pub(super) fn read_device_data(req: &mut Request) -> Result<(), SeError> {
    if !(1..=2).contains(&req.params.len()) {
        tracing::error!(count = req.params.len(), "invalid parameter count");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    let location = req.options >> constants::DEVICE_DATA_LOCATION_SHIFT;
    let section = DeviceDataLocation::from(location >> constants::DEVICE_DATA_TYPE_SHIFT);
    if !section.is_valid() {
        tracing::error!(location, "invalid device data location");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }

    let read_size = DeviceDataReadSize::from(req.options & constants::DEVICE_DATA_SIZE_MASK);
    match read_size {
        DeviceDataReadSize::WholeElement
        | DeviceDataReadSize::OneWord
        | DeviceDataReadSize::GetSize => {}
        DeviceDataReadSize::ChunkOfElement => {
            if req.params.len() != 2 {
                tracing::error!("chunk read needs an offset and a length");
                Err(SeError::Response(ResponseCode::Abort))?
            }
        }
        DeviceDataReadSize::GetValue => {
            if location != 0 {
                tracing::error!(location, "values are only read from the CC section");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
        }
        DeviceDataReadSize::Unknown => {
            tracing::error!(options = req.options, "invalid device data read size");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        }
    }
    tracing::debug!(%section, %read_size, "read device data");

    let output = req.outputs().next_descriptor(req.memory)?;
    Ok(req
        .memory
        .write_word(output.data_address, constants::DEVICE_DATA_VALUE)?)
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn flash_erase(req: &mut Request, flash: &FlashGeometry) -> Result<(), SeError> {
    req.expect_params(2, ResponseCode::InvalidParameter)?;
    check_geometry(flash)?;
    let start = req.params[0] / flash.page_size * flash.page_size;
    let len = flash.page_size.checked_mul(req.params[1]).ok_or_else(|| {
        tracing::error!(pages = req.params[1], "erase length overflow");
        SeError::Response(ResponseCode::InvalidParameter)
    })?;
    check_flash_range(flash, start, len)?;
    tracing::debug!(start, len, "flash erase");
    Ok(req
        .memory
        .write_bytes(start, &vec![constants::ERASED; len as usize])?)
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn flash_write(req: &mut Request, flash: &FlashGeometry) -> Result<(), SeError> {
    req.expect_params(2, ResponseCode::InvalidParameter)?;
    check_geometry(flash)?;
    let (start, len) = (req.params[0], req.params[1]);
    check_flash_range(flash, start, len)?;
    let input = req.inputs().next_descriptor(req.memory)?;
    tracing::debug!(start, len, source = input.data_address, "flash write");
    Ok(req
        .memory
        .copy_bytes(input.data_address, start, len as usize)?)
}

/// Writes the data region address to the first output node and its length
/// to the second.
pub(super) fn flash_data_region(req: &mut Request, flash: &FlashGeometry) -> Result<(), SeError> {
    req.expect_params(0, ResponseCode::InvalidParameter)?;
    let mut outputs = req.outputs();
    let address_node = outputs.next_descriptor(req.memory)?;
    let length_node = outputs.next_descriptor(req.memory)?;
    check_geometry(flash)?;

    let len = flash.size.saturating_sub(flash.data_region_start);
    let address = constants::QSPI_FLASH_HOST_BASE.wrapping_add(flash.size - len);
    req.memory.write_word(address_node.data_address, address)?;
    req.memory.write_word(length_node.data_address, len)?;
    Ok(())
}

pub(super) fn flash_code_region(req: &mut Request, flash: &FlashGeometry) -> Result<(), SeError> {
    req.expect_params(0, ResponseCode::InvalidParameter)?;
    let output = req.outputs().next_descriptor(req.memory)?;
    check_geometry(flash)?;

    // protection, bank swap and closed bits stay clear
    let config = (flash.region_size / constants::CODE_REGION_UNIT) & constants::CODE_REGION_SIZE_MASK;
    Ok(req.memory.write_word(output.data_address, config)?)
}

pub(super) fn configure_qspi(req: &mut Request) -> Result<(), SeError> {
    match req.options {
        // FSRCO
        0x01 | 0x0100 => req.expect_params(0, ResponseCode::InvalidParameter),
        // FLPLL
        0x02 | 0x0200 => {
            req.expect_params(4, ResponseCode::InvalidParameter)?;
            let ref_clock = req.params[0];
            let int_div = req.params[1] >> constants::QSPI_INT_DIV_SHIFT;
            let frac_div = req.params[1] & constants::QSPI_FRAC_DIV_MASK;
            if ref_clock != 0 && ref_clock != 2 {
                tracing::error!(ref_clock, "invalid FLPLL reference clock");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
            if frac_div >= constants::QSPI_FRAC_DIV_LIMIT
                || int_div <= constants::QSPI_INT_DIV_MIN
                || int_div >= constants::QSPI_INT_DIV_MAX
            {
                tracing::error!(int_div, frac_div, "invalid FLPLL divider");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
            tracing::debug!(ref_clock, int_div, frac_div, "QSPI clock from FLPLL");
            Ok(())
        }
        options => {
            tracing::error!(options, "invalid QSPI clock option");
            Err(SeError::Response(ResponseCode::InvalidParameter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_element::harness::Harness;
    use crate::secure_element::{SecureElementConfig, NULL_DESCRIPTOR};

    const RANDOM: u32 = 0x0700;
    const READ_DEVICE_DATA: u32 = 0x4330;
    const CONFIGURE_QSPI: u32 = 0xff15;
    const FLASH_CODE_REGION: u32 = 0xff53;
    const FLASH_ERASE: u32 = 0xff62;
    const FLASH_WRITE: u32 = 0xff63;
    const FLASH_DATA_REGION: u32 = 0xff64;

    fn flash_config() -> SecureElementConfig {
        SecureElementConfig {
            flash: FlashGeometry {
                size: 0x10_0000,
                page_size: 0x1000,
                region_size: 0x4_0000,
                code_region_start: 0,
                code_region_end: 0x4_0000,
                data_region_start: 0xc_0000,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_random() {
        let mut h = Harness::new(SecureElementConfig::default());
        let output = h.chain(&[(0x3000, 64)]);
        assert_eq!(h.command(RANDOM, 0, NULL_DESCRIPTOR, output, &[64]), ResponseCode::Ok);
        assert_ne!(h.read_bytes(0x3000, 64), vec![0; 64]);
        assert_eq!(
            h.command(RANDOM, 0, NULL_DESCRIPTOR, output, &[]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_random_larger_than_output() {
        let mut h = Harness::new(SecureElementConfig::default());
        let output = h.chain(&[(0x3000, 16)]);
        assert_eq!(
            h.command(RANDOM, 0, NULL_DESCRIPTOR, output, &[0xffff_ffff]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(
            h.command(RANDOM, 0, NULL_DESCRIPTOR, output, &[17]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(h.read_bytes(0x3000, 17), vec![0; 17]);
    }

    #[test]
    fn test_read_device_data() {
        let mut h = Harness::new(SecureElementConfig::default());
        let output = h.chain(&[(0x3000, 4)]);
        // DI section, one word
        let options = (0x10 << 12) | 2;
        assert_eq!(
            h.command(READ_DEVICE_DATA, options, NULL_DESCRIPTOR, output, &[0]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_word(0x3000), 1);
    }

    #[test]
    fn test_read_device_data_errors() {
        let mut h = Harness::new(SecureElementConfig::default());
        let output = h.chain(&[(0x3000, 4)]);
        let cases = [
            // invalid section
            (0x30 << 12, &[0][..], ResponseCode::InvalidParameter),
            // chunk without length
            (1, &[0][..], ResponseCode::Abort),
            // value outside the CC section
            ((0x10 << 12) | 4, &[0][..], ResponseCode::InvalidParameter),
            (5, &[0][..], ResponseCode::InvalidParameter),
            (0, &[][..], ResponseCode::InvalidParameter),
        ];
        for (options, params, expected) in cases {
            assert_eq!(
                h.command(READ_DEVICE_DATA, options, NULL_DESCRIPTOR, output, params),
                expected
            );
        }
        assert_eq!(h.read_word(0x3000), 0);
    }

    #[test]
    fn test_flash_erase_then_write() {
        let mut h = Harness::new(flash_config());
        h.write_bytes(0x8000, &[0x12; 0x2000]);
        assert_eq!(
            h.command(FLASH_ERASE, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[0x8123, 2]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x8000, 0x2000), vec![0xff; 0x2000]);

        h.write_bytes(0x2000, &[1, 2, 3, 4, 5]);
        let input = h.chain(&[(0x2000, 5)]);
        assert_eq!(
            h.command(FLASH_WRITE, 0, input, NULL_DESCRIPTOR, &[0x8010, 5]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x8010, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(h.read_bytes(0x8000, 0x10), vec![0xff; 0x10]);
        assert_eq!(h.read_bytes(0x8015, 0x10), vec![0xff; 0x10]);
    }

    #[test]
    fn test_flash_range_outside_flash() {
        let mut h = Harness::new(SecureElementConfig {
            flash: FlashGeometry {
                size: 0x8000,
                page_size: 0x1000,
                ..Default::default()
            },
            ..Default::default()
        });
        h.write_bytes(0x7000, &[0x12; 0x1000]);
        assert_eq!(
            h.command(FLASH_ERASE, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[0, 0xf_ffff]),
            ResponseCode::InvalidParameter
        );
        // last page plus one
        assert_eq!(
            h.command(FLASH_ERASE, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[0x7000, 2]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(h.read_bytes(0x7000, 0x1000), vec![0x12; 0x1000]);
        assert_eq!(
            h.command(FLASH_ERASE, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[0x7000, 1]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x7000, 0x1000), vec![0xff; 0x1000]);

        let input = h.chain(&[(0x2000, 4)]);
        assert_eq!(
            h.command(FLASH_WRITE, 0, input, NULL_DESCRIPTOR, &[0x7ffe, 4]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(
            h.command(FLASH_WRITE, 0, input, NULL_DESCRIPTOR, &[0xffff_fffe, 4]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_flash_requires_geometry() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2000, 4)]);
        let output = h.chain(&[(0x3000, 4), (0x3004, 4)]);
        assert_eq!(
            h.command(FLASH_ERASE, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[0, 1]),
            ResponseCode::Abort
        );
        assert_eq!(
            h.command(FLASH_WRITE, 0, input, NULL_DESCRIPTOR, &[0x8000, 4]),
            ResponseCode::Abort
        );
        assert_eq!(
            h.command(FLASH_DATA_REGION, 0, NULL_DESCRIPTOR, output, &[]),
            ResponseCode::Abort
        );
        assert_eq!(
            h.command(FLASH_ERASE, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[0]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_flash_data_region() {
        let mut h = Harness::new(flash_config());
        let output = h.chain(&[(0x3000, 4), (0x3004, 4)]);
        assert_eq!(
            h.command(FLASH_DATA_REGION, 0, NULL_DESCRIPTOR, output, &[]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_word(0x3000), 0x010c_0000);
        assert_eq!(h.read_word(0x3004), 0x4_0000);
    }

    #[test]
    fn test_flash_code_region() {
        let mut h = Harness::new(flash_config());
        let output = h.chain(&[(0x3000, 4)]);
        assert_eq!(
            h.command(FLASH_CODE_REGION, 0, NULL_DESCRIPTOR, output, &[]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_word(0x3000), 8);
    }

    #[test]
    fn test_configure_qspi() {
        let mut h = Harness::new(SecureElementConfig::default());
        let none = NULL_DESCRIPTOR;
        assert_eq!(h.command(CONFIGURE_QSPI, 0x01, none, none, &[]), ResponseCode::Ok);
        assert_eq!(
            h.command(CONFIGURE_QSPI, 0x0100, none, none, &[1]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(
            h.command(CONFIGURE_QSPI, 0x02, none, none, &[2, (8 << 16) | 100, 0, 0]),
            ResponseCode::Ok
        );
        for params in [
            [1, 8 << 16, 0, 0],
            [0, 5 << 16, 0, 0],
            [0, 12 << 16, 0, 0],
            [0, (8 << 16) | 2048, 0, 0],
        ] {
            assert_eq!(
                h.command(CONFIGURE_QSPI, 0x0200, none, none, &params),
                ResponseCode::InvalidParameter
            );
        }
        assert_eq!(
            h.command(CONFIGURE_QSPI, 0x03, none, none, &[]),
            ResponseCode::InvalidParameter
        );
    }
}
