//! Devices without interface objects, read straight from their memory map.

use super::{Error, Session, group_addresses};
use crate::codec;
use crate::objects::{ObjectType, pid};
use crate::parameters::{CommonParameter, InternalParameter};

pub(super) const PROGRAMMING_MODE: u16 = 0x0060;
const MANUFACTURER_DATA: u16 = 0x0101;
const DOMAIN_ADDRESS: u16 = 0x0102;
const MANUFACTURER_ID: u16 = 0x0104;
const REQUIRED_PEI_TYPE: u16 = 0x0109;
const RUN_ERROR: u16 = 0x010D;
const INDIVIDUAL_ADDRESS: u16 = 0x0117;

/// Load state machines of BCU 2 devices, kept in RAM.
const BCU2_LOAD_STATES: [(ObjectType, u16); 3] = [
    (ObjectType::AddressTable, 0xB6EA),
    (ObjectType::AssociationTable, 0xB6EB),
    (ObjectType::ApplicationProgram, 0xB6EC),
];
const BCU2_RUN_STATE: u16 = 0xB6ED;

pub(super) fn read_tp_bcu1(session: &mut Session<'_, '_>) -> Result<(), Error> {
    bcu1_layout(session, 3)
}

/// PL110 devices keep their domain address where TP devices have the rest of the manufacturer
/// data.
pub(super) fn read_pl_bcu1(session: &mut Session<'_, '_>) -> Result<(), Error> {
    bcu1_layout(session, 1)?;
    session.cursor.enter("General");
    session.decode_memory(CommonParameter::DomainAddress, DOMAIN_ADDRESS, 2, codec::domain_address)?;
    Ok(())
}

pub(super) fn read_tp_bcu2(session: &mut Session<'_, '_>) -> Result<(), Error> {
    bcu1_layout(session, 3)?;
    session.decode_property(
        CommonParameter::SerialNumber,
        0,
        pid::SERIAL_NUMBER,
        codec::serial_number,
    )?;
    for (object_type, address) in BCU2_LOAD_STATES {
        session.cursor.enter_object(object_type);
        session.decode_memory(CommonParameter::LoadStateControl, address, 1, codec::load_state)?;
    }
    session.decode_memory(CommonParameter::RunStateControl, BCU2_RUN_STATE, 1, codec::run_state)?;
    Ok(())
}

fn bcu1_layout(session: &mut Session<'_, '_>, manufacturer_data: u16) -> Result<(), Error> {
    use CommonParameter::*;
    session.cursor.enter("General");
    session.decode_memory(Manufacturer, MANUFACTURER_ID, 1, codec::manufacturer)?;
    session.decode_memory(ManufacturerData, MANUFACTURER_DATA, manufacturer_data, codec::hex)?;
    session.decode_memory(ProgramVersion, MANUFACTURER_ID, 4, codec::bcu1_program_version)?;
    session.decode_memory(RequiredPEIType, REQUIRED_PEI_TYPE, 1, codec::pei_type)?;
    session.actual_pei_type()?;
    session.decode_memory(RunError, RUN_ERROR, 1, codec::run_error)?;
    session.decode_memory(
        InternalParameter::IndividualAddress,
        INDIVIDUAL_ADDRESS,
        2,
        codec::individual_addresses,
    )?;
    session.decode_memory(ProgrammingMode, PROGRAMMING_MODE, 1, codec::programming_mode)?;
    group_addresses::read(session)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{count, run, value};
    use crate::device_image::DeviceImage;
    use crate::objects::{ObjectType, pid};
    use crate::parameters::{CommonParameter, InternalParameter, Parameter};

    fn bcu1(descriptor: u16) -> DeviceImage {
        DeviceImage::new(descriptor)
            .with_memory(0x0060, &[0x2e])
            .with_memory(0x0101, &[0x00, 0x12, 0x34])
            .with_memory(0x0104, &[0x01, 0x20, 0x51, 0x12])
            .with_memory(0x0109, &[0x02])
            .with_memory(0x010D, &[0xff])
            .with_memory(0x0116, &[0x03, 0x11, 0x05, 0x88, 0x01, 0x08, 0x02])
    }

    #[test]
    fn tp_bcu1() {
        let items = run(&mut bcu1(0x0012).with_adc(4, 25)).unwrap();
        assert_eq!(value(&items, CommonParameter::Manufacturer), Some("Siemens"));
        assert_eq!(value(&items, CommonParameter::ManufacturerData), Some("001234"));
        assert_eq!(value(&items, CommonParameter::ProgramVersion), Some("Siemens [2051] v1.2"));
        assert_eq!(value(&items, CommonParameter::RequiredPEIType), Some("2 (4 inputs, 1 output (LED))"));
        assert_eq!(value(&items, CommonParameter::ActualPEIType), Some("2 (4 inputs, 1 output (LED))"));
        assert_eq!(value(&items, CommonParameter::RunError), Some("OK"));
        assert_eq!(value(&items, InternalParameter::IndividualAddress), Some("1.1.5"));
        assert_eq!(value(&items, CommonParameter::ProgrammingMode), Some("inactive"));
        assert_eq!(value(&items, CommonParameter::GroupAddresses), Some("1/0/1(R), 1/0/2"));
        assert_eq!(count(&items, CommonParameter::DomainAddress), 0);
        assert!(items.iter().all(|i| i.category == "General"));
    }

    #[test]
    fn pl_bcu1_has_a_domain_address() {
        let items = run(&mut bcu1(0x1012)).unwrap();
        assert_eq!(value(&items, CommonParameter::KNXMedium), Some("PL110"));
        assert_eq!(value(&items, CommonParameter::ManufacturerData), Some("00"));
        assert_eq!(value(&items, CommonParameter::DomainAddress), Some("0x1234"));
    }

    #[test]
    fn tp_bcu2_load_states() {
        let mut image = bcu1(0x0020)
            .with_object(ObjectType::Device, [(pid::SERIAL_NUMBER, &[0, 1, 0, 0, 0x30, 0x39])])
            .with_memory(0xB6EA, &[0x01, 0x01, 0x02, 0x01]);
        let items = run(&mut image).unwrap();
        assert_eq!(value(&items, CommonParameter::SerialNumber), Some("0001:00003039"));
        let states = items
            .iter()
            .filter(|i| {
                i.parameter == Parameter::from(CommonParameter::LoadStateControl)
                    || i.parameter == Parameter::from(CommonParameter::RunStateControl)
            })
            .map(|i| (i.category.as_str(), i.value.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            states,
            [
                ("Address Table", "Loaded"),
                ("Association Table", "Loaded"),
                ("Application Program", "Loading"),
                ("Application Program", "Running"),
            ]
        );
    }
}
