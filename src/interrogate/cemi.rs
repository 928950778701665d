//! cEMI server and RF medium objects.

use super::{Error, Session, Skip};
use crate::codec;
use crate::objects::{ObjectType, pid};
use crate::parameters::{CemiParameter, RfParameter};

pub(super) fn read_cemi_server(session: &mut Session<'_, '_>) -> Result<(), Error> {
    use CemiParameter::*;
    for index in session.objects.indices(ObjectType::CemiServer).to_vec() {
        session.cursor.enter_object(ObjectType::CemiServer);
        session.decode_property(
            SupportedCommModes,
            index,
            pid::cemi::COMM_MODES_SUPPORTED,
            codec::supported_comm_modes,
        )?;
        session.decode_property(
            SelectedCommMode,
            index,
            pid::cemi::COMM_MODE,
            codec::selected_comm_mode,
        )?;
        let address = session.individual_address_pair(
            index,
            pid::cemi::CLIENT_SNA,
            pid::cemi::CLIENT_DEVICE_ADDRESS,
        );
        session.settle(ClientIndividualAddress, address)?;
        let supported = filtering_modes(
            session,
            index,
            pid::cemi::FILTERING_MODE_SUPPORT,
            pid::cemi::LEGACY_FILTERING_MODE_SUPPORT,
        );
        session.settle(SupportedFilteringModes, supported)?;
        let selected = filtering_modes(
            session,
            index,
            pid::cemi::FILTERING_MODE_SELECT,
            pid::cemi::LEGACY_FILTERING_MODE_SELECT,
        );
        session.settle(SelectedFilteringModes, selected)?;
        session.decode_property(
            SupportedRFModes,
            index,
            pid::cemi::RF_MODE_SUPPORT,
            codec::supported_rf_modes,
        )?;
        session.decode_property(
            SelectedRFMode,
            index,
            pid::cemi::RF_MODE_SELECT,
            codec::selected_rf_mode,
        )?;
    }
    Ok(())
}

/// Older cEMI servers use different property ids for the filtering modes.
fn filtering_modes(
    session: &mut Session<'_, '_>,
    index: u8,
    pid: u8,
    legacy_pid: u8,
) -> Result<(String, Vec<u8>), Skip> {
    let decode = |raw: Vec<u8>| -> Result<(String, Vec<u8>), Skip> {
        Ok((codec::filtering_modes(&raw)?, raw))
    };
    match session.property(index, pid) {
        Ok(raw) => decode(raw),
        Err(Skip::Unsupported(_)) => decode(session.property(index, legacy_pid)?),
        Err(e) => Err(e),
    }
}

pub(super) fn read_rf_medium(session: &mut Session<'_, '_>) -> Result<(), Error> {
    for index in session.objects.indices(ObjectType::RfMedium).to_vec() {
        session.cursor.enter_object(ObjectType::RfMedium);
        session.decode_property(
            RfParameter::DomainAddress,
            index,
            pid::rf::DOMAIN_ADDRESS,
            codec::domain_address,
        )?;
    }
    Ok(())
}
