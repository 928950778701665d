//! KNXnet/IP parameter object.
//!
//! Configured addresses are only interesting when they differ from the ones currently in use, so
//! most of this pass remembers what it has read so far.

use super::{Error, Session, Skip};
use crate::codec::{self, Malformed};
use crate::objects::{ObjectType, pid};
use crate::parameters::KnxIpParameter;
use tracing::debug;

const NAME_LENGTH: u16 = 30;
const NAME_PAGE: u8 = 10;

pub(super) fn read(session: &mut Session<'_, '_>) -> Result<(), Error> {
    for index in session.objects.indices(ObjectType::KnxnetIpParameter).to_vec() {
        session.cursor.enter_object(ObjectType::KnxnetIpParameter);
        read_object(session, index)?;
    }
    Ok(())
}

fn read_object(session: &mut Session<'_, '_>, index: u8) -> Result<(), Error> {
    use KnxIpParameter::*;
    use pid::knxip;
    let name = device_name(session, index);
    session.settle(DeviceName, name)?;
    let capabilities = session.decode_property(
        Capabilities,
        index,
        knxip::DEVICE_CAPABILITIES,
        codec::device_capabilities,
    )?;
    session.decode_property(MACAddress, index, knxip::MAC_ADDRESS, codec::mac_address)?;

    let current = session.decode_property(
        CurrentIPAssignment,
        index,
        knxip::CURRENT_IP_ASSIGNMENT_METHOD,
        codec::ip_assignment,
    )?;
    let current_ip = session.decode_property(
        CurrentIPAddress,
        index,
        knxip::CURRENT_IP_ADDRESS,
        codec::ip_address,
    )?;
    let current_mask = session.decode_property(
        CurrentSubnetMask,
        index,
        knxip::CURRENT_SUBNET_MASK,
        codec::ip_address,
    )?;
    let current_gateway = session.decode_property(
        CurrentDefaultGateway,
        index,
        knxip::CURRENT_DEFAULT_GATEWAY,
        codec::ip_address,
    )?;

    let current_method = current.as_deref().and_then(|c| c.first().copied()).unwrap_or(0);
    if current_method & (codec::IP_ASSIGNMENT_DHCP | codec::IP_ASSIGNMENT_BOOTP) != 0 {
        session.decode_property(DHCPServer, index, knxip::DHCP_BOOTP_SERVER, codec::ip_address)?;
    }

    let configured = session.property(index, knxip::IP_ASSIGNMENT_METHOD).and_then(|raw| {
        let value = codec::ip_assignment(&raw)?;
        if current.as_deref() == Some(raw.as_slice()) {
            Err(Skip::Absent)
        } else {
            Ok((value, raw))
        }
    });
    let configured_method = match &configured {
        Ok((_, raw)) => raw.first().copied(),
        Err(Skip::Absent) => Some(current_method),
        Err(_) => None,
    };
    session.settle(ConfiguredIPAssignment, configured)?;

    if configured_method.unwrap_or(current_method) & codec::IP_ASSIGNMENT_MANUAL != 0 {
        let configured_addresses = [
            (IPAddress, knxip::IP_ADDRESS, current_ip),
            (SubnetMask, knxip::SUBNET_MASK, current_mask),
            (DefaultGateway, knxip::DEFAULT_GATEWAY, current_gateway),
        ];
        for (parameter, property_id, current) in configured_addresses {
            let read = session.property(index, property_id).and_then(|raw| {
                let value = codec::ip_address(&raw)?;
                if current.as_deref() == Some(raw.as_slice()) {
                    Err(Skip::Absent)
                } else {
                    Ok((value, raw))
                }
            });
            session.settle(parameter, read)?;
        }
    }

    session.decode_property(
        RoutingMulticast,
        index,
        knxip::ROUTING_MULTICAST_ADDRESS,
        codec::ip_address,
    )?;
    session.decode_property(MulticastTTL, index, knxip::TTL, codec::unsigned)?;
    session.decode_property(
        MessagesToMulticastIP,
        index,
        knxip::MSG_TRANSMIT_TO_IP,
        codec::unsigned,
    )?;

    let tunneling = capabilities
        .as_deref()
        .and_then(|c| c.first_chunk::<2>())
        .is_some_and(|c| u16::from_be_bytes(*c) & codec::CAPABILITY_TUNNELING != 0);
    if tunneling {
        let addresses = session
            .property_elements(index, knxip::ADDITIONAL_INDIVIDUAL_ADDRESSES)
            .and_then(|raw| Ok((codec::individual_addresses(&raw)?, raw)));
        session.settle(AdditionalIndividualAddresses, addresses)?;
    }
    Ok(())
}

/// The friendly name, read in pages until it ends or the device stops answering.
fn device_name(session: &mut Session<'_, '_>, index: u8) -> Result<(String, Vec<u8>), Skip> {
    let mut raw: Vec<u8> = Vec::with_capacity(usize::from(NAME_LENGTH));
    let mut start = 1;
    while start <= NAME_LENGTH && !raw.contains(&0) {
        let count = NAME_PAGE.min(u8::try_from(NAME_LENGTH - start + 1).unwrap_or(NAME_PAGE));
        match session.client.read_property(index, pid::knxip::FRIENDLY_NAME, start, count) {
            Ok(page) => raw.extend(page),
            Err(e) if e.is_recoverable() && !raw.is_empty() => {
                debug!(message = "device name ends early", start, error = %e);
                break;
            }
            Err(e) => return Err(e.into()),
        }
        start += u16::from(count);
    }
    if raw.is_empty() {
        return Err(Malformed { expected: 1, actual: 0 }.into());
    }
    Ok((codec::latin1_string(&raw)?, raw))
}
