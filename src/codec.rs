//! Decoders turning raw property and memory contents into display strings.
//!
//! Every decoder takes the bytes exactly as the device returned them. Decoders that need a fixed
//! number of bytes fail with [`Malformed`] when fewer are available and ignore any excess.
//! Decoders may legitimately return an empty string, which means there is nothing worth
//! reporting.

use crate::descriptor::DeviceDescriptor;
use crate::manufacturer;
use num_traits::FromPrimitive as _;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("expected at least {expected} bytes, got {actual}")]
pub struct Malformed {
    pub expected: usize,
    pub actual: usize,
}

pub type Decoded = Result<String, Malformed>;

fn chunk<const N: usize>(data: &[u8]) -> Result<&[u8; N], Malformed> {
    data.first_chunk::<N>().ok_or(Malformed { expected: N, actual: data.len() })
}

fn byte(data: &[u8]) -> Result<u8, Malformed> {
    chunk::<1>(data).map(|[b]| *b)
}

fn word(data: &[u8]) -> Result<u16, Malformed> {
    chunk::<2>(data).map(|b| u16::from_be_bytes(*b))
}

/// Lists the names of the bits set in `value`, bit 0 first.
fn flags(value: u32, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .enumerate()
        .filter(|&(bit, _)| value & (1 << bit) != 0)
        .map(|(_, name)| name.to_string())
        .collect()
}

pub fn hex(data: &[u8]) -> Decoded {
    Ok(hex::encode(data))
}

pub fn unsigned(data: &[u8]) -> Decoded {
    let value = match data.len() {
        0 => return Err(Malformed { expected: 1, actual: 0 }),
        1..=8 => data.iter().fold(0u64, |acc, b| acc << 8 | u64::from(*b)),
        _ => return hex(data),
    };
    Ok(value.to_string())
}

pub fn individual_address(raw: u16) -> String {
    format!("{}.{}.{}", raw >> 12, (raw >> 8) & 0xf, raw & 0xff)
}

pub fn group_address(raw: u16) -> String {
    format!("{}/{}/{}", (raw >> 11) & 0x1f, (raw >> 8) & 0x7, raw & 0xff)
}

pub fn individual_addresses(data: &[u8]) -> Decoded {
    let addresses = data
        .chunks_exact(2)
        .map(|c| individual_address(u16::from_be_bytes([c[0], c[1]])))
        .collect::<Vec<_>>();
    Ok(addresses.join(", "))
}

/// A list of plain 2-byte group addresses.
pub fn group_addresses(data: &[u8]) -> Decoded {
    let addresses = data
        .chunks_exact(2)
        .map(|c| group_address(u16::from_be_bytes([c[0], c[1]])))
        .collect::<Vec<_>>();
    Ok(addresses.join(", "))
}

/// Group address table entries where bit 15 marks the device as a responder for that address.
pub fn group_addresses_with_responder(data: &[u8]) -> Decoded {
    let addresses = data
        .chunks_exact(2)
        .map(|c| {
            let raw = u16::from_be_bytes([c[0], c[1]]);
            let address = group_address(raw & 0x7fff);
            if raw & 0x8000 != 0 { format!("{address}(R)") } else { address }
        })
        .collect::<Vec<_>>();
    Ok(addresses.join(", "))
}

pub fn manufacturer_name(id: u16) -> String {
    match manufacturer::name(id) {
        Some(name) => name.to_string(),
        None => format!("Unknown manufacturer ({id})"),
    }
}

/// Manufacturer id, either one byte (BCU 1 memory) or two bytes (device object).
pub fn manufacturer(data: &[u8]) -> Decoded {
    let id = match data {
        [id] => u16::from(*id),
        _ => word(data)?,
    };
    Ok(manufacturer_name(id))
}

pub fn serial_number(data: &[u8]) -> Decoded {
    let sn = chunk::<6>(data)?;
    let manufacturer = u16::from_be_bytes([sn[0], sn[1]]);
    let number = u32::from_be_bytes([sn[2], sn[3], sn[4], sn[5]]);
    Ok(format!("{manufacturer:04x}:{number:08x}"))
}

pub fn device_descriptor(data: &[u8]) -> Decoded {
    let dd = DeviceDescriptor::from_bytes(*chunk::<2>(data)?);
    Ok(dd.to_string())
}

pub fn medium(descriptor: DeviceDescriptor) -> String {
    descriptor.medium().to_string()
}

pub fn firmware_type(descriptor: DeviceDescriptor) -> String {
    match descriptor.firmware_type() {
        0 => "BCU 1, BCU 2, BIM M113",
        1 => "Unidirectional devices",
        3 => "Property based device management",
        7 => "BIM M112",
        8 => "IR decoder, TP1 legacy",
        9 => "Repeater, coupler",
        _ => return format!("Unknown ({})", descriptor.firmware_type()),
    }
    .to_string()
}

pub fn firmware_version(descriptor: DeviceDescriptor) -> String {
    let version = descriptor.firmware_version();
    format!("{}.{}", version >> 4, version & 0xf)
}

static PEI_TYPES: [&str; 21] = [
    "No adapter",
    "Illegal adapter",
    "4 inputs, 1 output (LED)",
    "Reserved",
    "2 inputs / 2 outputs, 1 output (LED)",
    "Reserved",
    "3 inputs / 1 output, 1 output (LED)",
    "Reserved",
    "5 inputs",
    "Reserved",
    "FT 1.2 protocol",
    "Reserved",
    "Serial sync message protocol",
    "Reserved",
    "Serial sync data block protocol",
    "Reserved",
    "Serial async message protocol",
    "Programmable I/O",
    "Reserved",
    "4 outputs, 1 output (LED)",
    "Download of application",
];

pub fn pei_type_name(pei: u8) -> String {
    match PEI_TYPES.get(usize::from(pei)) {
        Some(name) => format!("{pei} ({name})"),
        None => format!("{pei} (Unknown)"),
    }
}

pub fn pei_type(data: &[u8]) -> Decoded {
    Ok(pei_type_name(byte(data)?))
}

/// Converts an analog reading of the PEI sense channel into the connected PEI type.
pub fn actual_pei_type(adc: u32) -> u8 {
    let pei = (10 * u64::from(adc) + 60) / 128;
    u8::try_from(pei).unwrap_or(u8::MAX)
}

pub fn firmware_revision(data: &[u8]) -> Decoded {
    Ok(byte(data)?.to_string())
}

pub fn service_control(data: &[u8]) -> Decoded {
    let value = word(data)?;
    let disabled = flags(u32::from(value >> 8), &["1", "2", "3", "4", "5", "6", "7", "8"]);
    let disabled = if disabled.is_empty() { "none".to_string() } else { disabled.join(", ") };
    let address_write = if value & 0x04 != 0 { "enabled" } else { "disabled" };
    let user_stopped = if value & 0x01 != 0 { ", user application stopped" } else { "" };
    Ok(format!(
        "disabled EMI services: {disabled}, individual address write {address_write}{user_stopped}"
    ))
}

/// PL110 domain address (2 bytes) or RF domain address (6 bytes).
pub fn domain_address(data: &[u8]) -> Decoded {
    match data.len() {
        2 => Ok(format!("0x{:04x}", word(data)?)),
        0 | 1 => Err(Malformed { expected: 2, actual: data.len() }),
        _ => Ok(format!("0x{}", hex::encode(data))),
    }
}

/// `PID_VERSION`: 5 bits magic number, 5 bits version, 6 bits revision.
pub fn software_version(data: &[u8]) -> Decoded {
    let value = word(data)?;
    let magic = value >> 11;
    let version = (value >> 6) & 0x1f;
    let revision = value & 0x3f;
    Ok(format!("{version}.{revision} (magic {magic})"))
}

pub fn max_apdu_length(data: &[u8]) -> Decoded {
    Ok(word(data)?.to_string())
}

/// Flags read as error when the bit is cleared.
fn active_low_errors(value: u8, names: &[&str; 8]) -> String {
    let errors = flags(u32::from(!value), names);
    if errors.is_empty() { "OK".to_string() } else { errors.join(", ") }
}

pub fn error_flags(data: &[u8]) -> Decoded {
    Ok(active_low_errors(
        byte(data)?,
        &[
            "System 1 internal system error",
            "Illegal system state",
            "Checksum / CRC error in internal RAM",
            "Stack overflow",
            "Inconsistent system tables",
            "Transceiver error",
            "Confirmation error",
            "Checksum / CRC error in EEPROM",
        ],
    ))
}

/// BCU 1 run error byte.
pub fn run_error(data: &[u8]) -> Decoded {
    Ok(active_low_errors(
        byte(data)?,
        &[
            "Buffer error",
            "System heap error",
            "EEPROM header checksum error",
            "Illegal system state",
            "Stack overflow",
            "EEPROM checksum error",
            "Temperature / supply error",
            "Reserved",
        ],
    ))
}

pub fn programming_mode(data: &[u8]) -> Decoded {
    Ok(if byte(data)? & 0x01 != 0 { "active" } else { "inactive" }.to_string())
}

fn version(v: u8) -> String {
    format!("{}.{}", v >> 4, v & 0xf)
}

/// `PID_PROGRAM_VERSION`: manufacturer (2), application / device type (2), version (1).
pub fn program_version(data: &[u8]) -> Decoded {
    let pv = chunk::<5>(data)?;
    let manufacturer = manufacturer_name(u16::from_be_bytes([pv[0], pv[1]]));
    let kind = u16::from_be_bytes([pv[2], pv[3]]);
    Ok(format!("{manufacturer} [{kind:04x}] v{}", version(pv[4])))
}

/// BCU 1 memory: manufacturer (1), device type (2), version (1).
pub fn bcu1_program_version(data: &[u8]) -> Decoded {
    let pv = chunk::<4>(data)?;
    let manufacturer = manufacturer_name(u16::from(pv[0]));
    let kind = u16::from_be_bytes([pv[1], pv[2]]);
    Ok(format!("{manufacturer} [{kind:04x}] v{}", version(pv[3])))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, num_derive::FromPrimitive)]
pub enum LoadState {
    Unloaded = 0,
    Loaded = 1,
    Loading = 2,
    Error = 3,
    Unloading = 4,
    LoadCompleting = 5,
}

impl LoadState {
    fn describe(self) -> &'static str {
        match self {
            Self::Unloaded => "Unloaded",
            Self::Loaded => "Loaded",
            Self::Loading => "Loading",
            Self::Error => "Error (during load process)",
            Self::Unloading => "Unloading",
            Self::LoadCompleting => "Load Completing",
        }
    }
}

pub fn load_state(data: &[u8]) -> Decoded {
    let state = byte(data)?;
    Ok(match LoadState::from_u8(state) {
        Some(state) => state.describe().to_string(),
        None => format!("Invalid load status {state}"),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, num_derive::FromPrimitive)]
enum RunState {
    Halted = 0,
    Running = 1,
    Ready = 2,
    Terminated = 3,
    Starting = 4,
    ShuttingDown = 5,
}

pub fn run_state(data: &[u8]) -> Decoded {
    let state = byte(data)?;
    Ok(match RunState::from_u8(state) {
        Some(RunState::Halted) => "Halted or not loaded".to_string(),
        Some(RunState::Running) => "Running".to_string(),
        Some(RunState::Ready) => "Ready for being executed".to_string(),
        Some(RunState::Terminated) => "Terminated (app stopped)".to_string(),
        Some(RunState::Starting) => "Starting".to_string(),
        Some(RunState::ShuttingDown) => "Shutting down".to_string(),
        None => format!("Invalid run state {state}"),
    })
}

static ERROR_CLASS_SYSTEM: [&str; 19] = [
    "no fault",
    "general device fault (e.g., RAM, EEPROM, UI, watchdog, ...)",
    "communication fault",
    "configuration fault",
    "hardware fault",
    "software fault",
    "insufficient non-volatile memory",
    "insufficient volatile memory",
    "memory allocation command with size 0 received",
    "CRC error",
    "watchdog reset detected",
    "invalid opcode detected",
    "general protection fault",
    "maximal table length exceeded",
    "undefined load command received",
    "group address table is not sorted",
    "invalid connection number (TSAP)",
    "invalid group object number (ASAP)",
    "group object type exceeds (PID_MAX_APDU_LENGTH - 2)",
];

/// DPT 20.011, error class system.
pub fn error_class_system(data: &[u8]) -> Decoded {
    let class = byte(data)?;
    Ok(match ERROR_CLASS_SYSTEM.get(usize::from(class)) {
        Some(description) => description.to_string(),
        None => format!("reserved error class {class}"),
    })
}

pub fn supported_comm_modes(data: &[u8]) -> Decoded {
    let value = word(data)?;
    let modes = flags(
        u32::from(value),
        &["Data link layer", "Data link layer busmonitor", "Data link layer raw frames", "cEMI transport layer"],
    );
    Ok(modes.join(", "))
}

pub fn selected_comm_mode(data: &[u8]) -> Decoded {
    let mode = byte(data)?;
    Ok(match mode {
        0x00 => "Data link layer".to_string(),
        0x01 => "Data link layer busmonitor".to_string(),
        0x02 => "Data link layer raw frames".to_string(),
        0x06 => "cEMI transport layer".to_string(),
        0xff => "no layer".to_string(),
        _ => format!("unknown/unspecified ({mode})"),
    })
}

pub fn filtering_modes(data: &[u8]) -> Decoded {
    let value = match data {
        [b] => u16::from(*b),
        _ => word(data)?,
    };
    let modes = flags(
        u32::from(value),
        &["group addresses", "individual addresses", "domain address", "extended group addresses"],
    );
    if modes.is_empty() { Ok("no filtering".to_string()) } else { Ok(modes.join(", ")) }
}

pub fn supported_rf_modes(data: &[u8]) -> Decoded {
    let modes = flags(
        u32::from(byte(data)?),
        &["asynchronous", "asynchronous + BiBat master", "asynchronous + BiBat slave"],
    );
    Ok(modes.join(", "))
}

pub fn selected_rf_mode(data: &[u8]) -> Decoded {
    let mode = byte(data)?;
    Ok(match mode & 0x03 {
        0 => "asynchronous".to_string(),
        1 => "asynchronous + BiBat master".to_string(),
        2 => "asynchronous + BiBat slave".to_string(),
        _ => format!("reserved ({mode})"),
    })
}

/// Zero-terminated ISO 8859-1 text.
pub fn latin1_string(data: &[u8]) -> Decoded {
    Ok(data.iter().take_while(|&&b| b != 0).map(|&b| char::from(b)).collect())
}

pub const CAPABILITY_TUNNELING: u16 = 0x02;

pub fn device_capabilities(data: &[u8]) -> Decoded {
    let caps = flags(
        u32::from(word(data)?),
        &[
            "Device Management",
            "Tunneling",
            "Routing",
            "Remote Logging",
            "Remote Configuration and Diagnosis",
            "Object Server",
        ],
    );
    Ok(caps.join(", "))
}

pub fn mac_address(data: &[u8]) -> Decoded {
    let mac = chunk::<6>(data)?;
    let parts = mac.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>();
    Ok(parts.join(":"))
}

pub const IP_ASSIGNMENT_MANUAL: u8 = 0x01;
pub const IP_ASSIGNMENT_BOOTP: u8 = 0x02;
pub const IP_ASSIGNMENT_DHCP: u8 = 0x04;

pub fn ip_assignment(data: &[u8]) -> Decoded {
    let methods = flags(u32::from(byte(data)? & 0x0f), &["manual", "BootP", "DHCP", "AutoIP"]);
    Ok(methods.join(", "))
}

pub fn ip_address(data: &[u8]) -> Decoded {
    let ip = chunk::<4>(data)?;
    Ok(std::net::Ipv4Addr::from(*ip).to_string())
}

pub fn security_mode(data: &[u8]) -> Decoded {
    Ok(if byte(data)? & 0x01 != 0 { "on" } else { "off" }.to_string())
}

pub fn security_failure(data: &[u8]) -> Decoded {
    Ok(if byte(data)? & 0x01 != 0 { "yes" } else { "no" }.to_string())
}

pub fn security_failure_counters(data: &[u8]) -> Decoded {
    let c = chunk::<8>(data)?;
    let counter = |i: usize| u16::from_be_bytes([c[2 * i], c[2 * i + 1]]);
    Ok(format!(
        "control field {}, sequence {}, cryptographic {}, access/role {}",
        counter(0),
        counter(1),
        counter(2),
        counter(3)
    ))
}

fn security_error(code: u8) -> String {
    match code {
        1 => "control field error".to_string(),
        2 => "sequence number error".to_string(),
        3 => "cryptographic error".to_string(),
        4 => "access/role error".to_string(),
        _ => format!("unknown error {code}"),
    }
}

/// One security failure log entry: index, source, destination, extended control field, sequence
/// number (6 bytes), error.
pub fn security_failure_log_entry(data: &[u8]) -> Decoded {
    let entry = chunk::<13>(data)?;
    let source = individual_address(u16::from_be_bytes([entry[1], entry[2]]));
    let raw_destination = u16::from_be_bytes([entry[3], entry[4]]);
    let destination = if entry[5] & 0x80 != 0 {
        group_address(raw_destination)
    } else {
        individual_address(raw_destination)
    };
    let sequence = entry[6..12].iter().fold(0u64, |acc, b| acc << 8 | u64::from(*b));
    Ok(format!("{source}->{destination} seq {sequence}: {}", security_error(entry[12])))
}
