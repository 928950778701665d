//! Interface objects and the discovery of where a device keeps them.

use crate::client::{ManagementClient, ReadError};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

/// Property identifiers used by the engine.
///
/// Property ids are only unique within an object type, hence the grouping.
pub mod pid {
    pub const OBJECT_TYPE: u8 = 1;
    pub const LOAD_STATE_CONTROL: u8 = 5;
    pub const RUN_STATE_CONTROL: u8 = 6;
    pub const TABLE_REFERENCE: u8 = 7;
    pub const SERVICE_CONTROL: u8 = 8;
    pub const FIRMWARE_REVISION: u8 = 9;
    pub const SERIAL_NUMBER: u8 = 11;
    pub const MANUFACTURER_ID: u8 = 12;
    pub const PROGRAM_VERSION: u8 = 13;
    pub const ORDER_INFO: u8 = 15;
    pub const PEI_TYPE: u8 = 16;
    pub const TABLE: u8 = 23;
    pub const VERSION: u8 = 25;
    pub const ERROR_CODE: u8 = 28;

    /// Device object.
    pub mod device {
        pub const ERROR_FLAGS: u8 = 53;
        pub const PROGRAMMING_MODE: u8 = 54;
        pub const MAX_APDU_LENGTH: u8 = 56;
        pub const SUBNET_ADDRESS: u8 = 57;
        pub const DEVICE_ADDRESS: u8 = 58;
        pub const IO_LIST: u8 = 71;
        pub const HARDWARE_TYPE: u8 = 78;
        pub const RF_DOMAIN_ADDRESS: u8 = 82;
        pub const DEVICE_DESCRIPTOR: u8 = 83;
    }

    /// cEMI server object.
    pub mod cemi {
        pub const COMM_MODE: u8 = 52;
        pub const CLIENT_SNA: u8 = 57;
        pub const CLIENT_DEVICE_ADDRESS: u8 = 58;
        pub const RF_MODE_SELECT: u8 = 60;
        pub const RF_MODE_SUPPORT: u8 = 61;
        pub const LEGACY_FILTERING_MODE_SELECT: u8 = 62;
        pub const LEGACY_FILTERING_MODE_SUPPORT: u8 = 63;
        pub const COMM_MODES_SUPPORTED: u8 = 64;
        pub const FILTERING_MODE_SUPPORT: u8 = 65;
        pub const FILTERING_MODE_SELECT: u8 = 66;
    }

    /// RF medium object.
    pub mod rf {
        /// Not the same id as the device object uses for its domain address.
        pub const DOMAIN_ADDRESS: u8 = 56;
    }

    /// KNXnet/IP parameter object.
    pub mod knxip {
        pub const ADDITIONAL_INDIVIDUAL_ADDRESSES: u8 = 53;
        pub const CURRENT_IP_ASSIGNMENT_METHOD: u8 = 54;
        pub const IP_ASSIGNMENT_METHOD: u8 = 55;
        pub const CURRENT_IP_ADDRESS: u8 = 57;
        pub const CURRENT_SUBNET_MASK: u8 = 58;
        pub const CURRENT_DEFAULT_GATEWAY: u8 = 59;
        pub const IP_ADDRESS: u8 = 60;
        pub const SUBNET_MASK: u8 = 61;
        pub const DEFAULT_GATEWAY: u8 = 62;
        pub const DHCP_BOOTP_SERVER: u8 = 63;
        pub const MAC_ADDRESS: u8 = 64;
        pub const ROUTING_MULTICAST_ADDRESS: u8 = 66;
        pub const TTL: u8 = 67;
        pub const DEVICE_CAPABILITIES: u8 = 68;
        pub const MSG_TRANSMIT_TO_IP: u8 = 74;
        pub const FRIENDLY_NAME: u8 = 76;
    }

    /// Security object.
    pub mod security {
        pub const SECURITY_MODE: u8 = 51;
        pub const SECURITY_FAILURES_LOG: u8 = 55;
        pub const SECURITY_REPORT: u8 = 57;
    }
}

/// The largest number of elements a single property read may ask for.
pub const MAX_ELEMENTS_PER_READ: u8 = 15;

/// Object indices at or above this are never probed.
const PROBE_LIMIT: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Device,
    AddressTable,
    AssociationTable,
    ApplicationProgram,
    InterfaceProgram,
    ObjectAssociationTable,
    Router,
    LteAddressRoutingTable,
    CemiServer,
    GroupObjectTable,
    PollingMaster,
    KnxnetIpParameter,
    FileServer,
    Security,
    RfMedium,
    Other(u16),
}

impl ObjectType {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Device,
            1 => Self::AddressTable,
            2 => Self::AssociationTable,
            3 => Self::ApplicationProgram,
            4 => Self::InterfaceProgram,
            5 => Self::ObjectAssociationTable,
            6 => Self::Router,
            7 => Self::LteAddressRoutingTable,
            8 => Self::CemiServer,
            9 => Self::GroupObjectTable,
            10 => Self::PollingMaster,
            11 => Self::KnxnetIpParameter,
            13 => Self::FileServer,
            17 => Self::Security,
            19 => Self::RfMedium,
            other => Self::Other(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Device => 0,
            Self::AddressTable => 1,
            Self::AssociationTable => 2,
            Self::ApplicationProgram => 3,
            Self::InterfaceProgram => 4,
            Self::ObjectAssociationTable => 5,
            Self::Router => 6,
            Self::LteAddressRoutingTable => 7,
            Self::CemiServer => 8,
            Self::GroupObjectTable => 9,
            Self::PollingMaster => 10,
            Self::KnxnetIpParameter => 11,
            Self::FileServer => 13,
            Self::Security => 17,
            Self::RfMedium => 19,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Device => "Device",
            Self::AddressTable => "Address Table",
            Self::AssociationTable => "Association Table",
            Self::ApplicationProgram => "Application Program",
            Self::InterfaceProgram => "Interface Program",
            Self::ObjectAssociationTable => "Object Association Table",
            Self::Router => "Router",
            Self::LteAddressRoutingTable => "LTE Address Routing Table",
            Self::CemiServer => "cEMI Server",
            Self::GroupObjectTable => "Group Object Table",
            Self::PollingMaster => "Polling Master",
            Self::KnxnetIpParameter => "KNXnet/IP Parameter",
            Self::FileServer => "File Server",
            Self::Security => "Security",
            Self::RfMedium => "RF Medium",
            Self::Other(code) => return write!(f, "Object Type {code}"),
        })
    }
}

/// Where each interface object type lives on the device.
///
/// A type missing from the map is not present on the device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexMap(BTreeMap<ObjectType, Vec<u8>>);

impl IndexMap {
    fn insert(&mut self, object_type: ObjectType, index: u8) {
        self.0.entry(object_type).or_default().push(index);
    }

    pub fn indices(&self, object_type: ObjectType) -> &[u8] {
        self.0.get(&object_type).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn first(&self, object_type: ObjectType) -> Option<u8> {
        self.indices(object_type).first().copied()
    }

    pub fn contains(&self, object_type: ObjectType) -> bool {
        self.0.contains_key(&object_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectType, &[u8])> {
        self.0.iter().map(|(t, i)| (*t, i.as_slice()))
    }
}

impl FromIterator<(ObjectType, u8)> for IndexMap {
    fn from_iter<T: IntoIterator<Item = (ObjectType, u8)>>(iter: T) -> Self {
        let mut map = Self::default();
        for (object_type, index) in iter {
            map.insert(object_type, index);
        }
        map
    }
}

/// Discovers the interface objects of a device.
///
/// Only transport failures and interruptions are returned as errors; the device refusing a
/// request just steers the discovery towards its fallbacks.
pub fn locate(client: &mut dyn ManagementClient) -> Result<IndexMap, ReadError> {
    match list_objects(client)? {
        Some(map) => Ok(map),
        None => probe_objects(client),
    }
}

fn recoverable<T>(result: Result<T, ReadError>, what: &str) -> Result<Option<T>, ReadError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_recoverable() => {
            debug!(message = "read failed", what, error = %e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Direct listing through the device object's interface object list.
fn list_objects(client: &mut dyn ManagementClient) -> Result<Option<IndexMap>, ReadError> {
    let count = client.read_property(0, pid::device::IO_LIST, 0, 1);
    let Some(count) = recoverable(count, "interface object count")? else {
        return Ok(None);
    };
    let Some(count) = count.first_chunk::<2>().map(|c| u16::from_be_bytes(*c)) else {
        return Ok(None);
    };
    if count == 0 {
        debug!(message = "device lists no interface objects");
        return Ok(None);
    }
    let mut types = Vec::with_capacity(usize::from(count) * 2);
    let mut start = 1u16;
    while start <= count {
        let elements = u8::try_from(count - start + 1).unwrap_or(u8::MAX).min(MAX_ELEMENTS_PER_READ);
        let page = client.read_property(0, pid::device::IO_LIST, start, elements);
        let Some(page) = recoverable(page, "interface object list")? else {
            return Ok(None);
        };
        types.extend_from_slice(&page);
        start += u16::from(elements);
    }
    let map = types
        .chunks_exact(2)
        .zip(0..=u8::MAX)
        .map(|(code, index)| (ObjectType::from_code(u16::from_be_bytes([code[0], code[1]])), index))
        .collect::<IndexMap>();
    trace!(message = "listed interface objects", ?map);
    Ok(Some(map))
}

/// Linear probe of the object type property, stopping at the first index the device rejects.
fn probe_objects(client: &mut dyn ManagementClient) -> Result<IndexMap, ReadError> {
    let mut map = IndexMap::default();
    map.insert(ObjectType::Device, 0);
    for index in 1..PROBE_LIMIT {
        let read = client.read_property(index, pid::OBJECT_TYPE, 1, 1);
        let Some(data) = recoverable(read, "object type")? else {
            break;
        };
        let Some(code) = data.first_chunk::<2>().map(|c| u16::from_be_bytes(*c)) else {
            debug!(message = "malformed object type", index, ?data);
            break;
        };
        map.insert(ObjectType::from_code(code), index);
    }
    if map.0.values().map(Vec::len).sum::<usize>() == 1 {
        // USB interfaces tend to hide their cEMI server from the probe.
        debug!(message = "only the device object was found, assuming a cEMI server at index 1");
        map.insert(ObjectType::CemiServer, 1);
    }
    trace!(message = "probed interface objects", ?map);
    Ok(map)
}
