//! The interrogation session: works out what kind of device is on the other end and reads
//! everything worth knowing about it.
//!
//! Reads the device refuses, and data that cannot be decoded, are logged and skipped. Only an
//! unobtainable device descriptor, transport failures and interruptions end a session early.

use crate::client::{ManagementClient, ReadError};
use crate::codec::{self, Decoded, Malformed};
use crate::descriptor::{self, DeviceDescriptor, Medium, Strategy};
use crate::objects::{self, IndexMap, MAX_ELEMENTS_PER_READ, ObjectType, pid};
use crate::parameters::{CommonParameter, InternalParameter, Parameter};
use crate::sink::{CategoryCursor, ResultItem, ResultSink};
use tracing::{debug, info, warn};

mod cemi;
mod group_addresses;
mod knxip;
mod memory;
mod security;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not obtain the device descriptor")]
    DeviceDescriptor(#[source] ReadError),
    #[error("communication with the device failed")]
    Transport(#[source] ReadError),
    #[error("the interrogation was canceled")]
    Canceled,
}

impl From<ReadError> for Error {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Interrupted => Self::Canceled,
            e => Self::Transport(e),
        }
    }
}

/// Why a single parameter produced no result.
#[derive(Debug)]
enum Skip {
    /// The device refused a read.
    Unsupported(ReadError),
    Malformed(Malformed),
    /// Nothing to report, for a reason other than a failed read.
    Absent,
    /// The session must end.
    Abort(ReadError),
}

impl From<ReadError> for Skip {
    fn from(e: ReadError) -> Self {
        if e.is_recoverable() { Self::Unsupported(e) } else { Self::Abort(e) }
    }
}

impl From<Malformed> for Skip {
    fn from(e: Malformed) -> Self {
        Self::Malformed(e)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Use this descriptor instead of reading it from the device.
    pub descriptor: Option<DeviceDescriptor>,
}

/// Reads and decodes all parameters of the device behind `client` into `sink`.
pub fn interrogate(
    client: &mut dyn ManagementClient,
    options: &Options,
    sink: &mut ResultSink<'_>,
) -> Result<(), Error> {
    let descriptor = match options.descriptor {
        Some(descriptor) => descriptor,
        None => match client.read_device_descriptor() {
            Ok(bytes) => DeviceDescriptor::from_bytes(bytes),
            Err(ReadError::Interrupted) => return Err(Error::Canceled),
            Err(e) => return Err(Error::DeviceDescriptor(e)),
        },
    };
    info!(message = "interrogating device", %descriptor);
    let mut session = Session {
        client,
        sink,
        descriptor,
        objects: IndexMap::default(),
        system_b: descriptor::is_system_b(descriptor),
        group_addresses_done: false,
        cursor: CategoryCursor::default(),
    };
    session.run()
}

struct Session<'s, 'a> {
    client: &'s mut dyn ManagementClient,
    sink: &'s mut ResultSink<'a>,
    descriptor: DeviceDescriptor,
    objects: IndexMap,
    system_b: bool,
    group_addresses_done: bool,
    cursor: CategoryCursor,
}

impl Session<'_, '_> {
    fn run(&mut self) -> Result<(), Error> {
        self.cursor.enter("General");
        self.descriptor_parameters();
        let strategy = descriptor::classify(self.descriptor);
        debug!(message = "selected strategy", ?strategy);
        match strategy {
            Strategy::PlBcu1 => memory::read_pl_bcu1(self),
            Strategy::TpBcu1 => memory::read_tp_bcu1(self),
            Strategy::TpBcu2 => memory::read_tp_bcu2(self),
            Strategy::PropertyBased => self.read_objects(),
            Strategy::ObjectDiscovery => match self.client.read_property(0, pid::OBJECT_TYPE, 1, 1) {
                Ok(_) => self.read_objects(),
                Err(e) if e.is_recoverable() => {
                    debug!(message = "no interface objects, reading memory", error = %e);
                    match self.descriptor.medium() {
                        Medium::Pl110 => memory::read_pl_bcu1(self),
                        _ => memory::read_tp_bcu1(self),
                    }
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    fn descriptor_parameters(&mut self) {
        let dd = self.descriptor;
        let raw = dd.to_bytes().to_vec();
        self.emit(CommonParameter::DeviceDescriptor, dd.to_string(), raw.clone());
        self.emit(CommonParameter::KNXMedium, codec::medium(dd), raw.clone());
        self.emit(CommonParameter::FirmwareType, codec::firmware_type(dd), raw.clone());
        self.emit(CommonParameter::FirmwareVersion, codec::firmware_version(dd), raw);
    }

    fn read_objects(&mut self) -> Result<(), Error> {
        self.objects = objects::locate(self.client)?;
        self.interface_objects();
        self.device_object()?;
        self.programs()?;
        self.tables()?;
        self.cursor.enter(ObjectType::AddressTable.to_string());
        group_addresses::read(self)?;
        cemi::read_cemi_server(self)?;
        cemi::read_rf_medium(self)?;
        match knxip::read(self) {
            Err(Error::Transport(e)) => {
                warn!(message = "KNXnet/IP parameters could not be read", error = %e);
            }
            result => result?,
        }
        security::read(self)
    }

    fn interface_objects(&mut self) {
        let listing = self
            .objects
            .iter()
            .map(|(object_type, indices)| {
                let indices = indices.iter().map(u8::to_string).collect::<Vec<_>>();
                format!("{object_type} ({})", indices.join(", "))
            })
            .collect::<Vec<_>>();
        self.cursor.enter("General");
        self.emit(InternalParameter::InterfaceObjects, listing.join(", "), Vec::new());
    }

    fn device_object(&mut self) -> Result<(), Error> {
        self.cursor.enter_object(ObjectType::Device);
        if let Some(index) = self.objects.first(ObjectType::Device) {
            use CommonParameter::*;
            self.decode_property(Manufacturer, index, pid::MANUFACTURER_ID, codec::manufacturer)?;
            self.decode_property(OrderInfo, index, pid::ORDER_INFO, codec::hex)?;
            self.decode_property(SerialNumber, index, pid::SERIAL_NUMBER, codec::serial_number)?;
            self.decode_property(RequiredPEIType, index, pid::PEI_TYPE, codec::pei_type)?;
            self.decode_property(HardwareType, index, pid::device::HARDWARE_TYPE, codec::hex)?;
            self.decode_property(
                FirmwareRevision,
                index,
                pid::FIRMWARE_REVISION,
                codec::firmware_revision,
            )?;
            if self.combined_profile(index)? {
                self.secondary_individual_address(index)?;
            }
            self.decode_property(ServiceControl, index, pid::SERVICE_CONTROL, codec::service_control)?;
            self.decode_property(
                RFDomainAddress,
                index,
                pid::device::RF_DOMAIN_ADDRESS,
                codec::domain_address,
            )?;
            self.decode_property(SoftwareVersion, index, pid::VERSION, codec::software_version)?;
            self.decode_property(
                MaxAPDULength,
                index,
                pid::device::MAX_APDU_LENGTH,
                codec::max_apdu_length,
            )?;
            self.decode_property(ErrorFlags, index, pid::device::ERROR_FLAGS, codec::error_flags)?;
        }
        self.actual_pei_type()?;
        self.programming_mode()
    }

    /// Reports the secondary descriptor of devices that combine two device profiles.
    fn combined_profile(&mut self, index: u8) -> Result<bool, Error> {
        let dd0 = self.descriptor.to_bytes();
        let read = self.property(index, pid::device::DEVICE_DESCRIPTOR).and_then(|raw| {
            let value = codec::device_descriptor(&raw)?;
            if raw[..2] == dd0 { Err(Skip::Absent) } else { Ok((value, raw)) }
        });
        Ok(self.settle(CommonParameter::SecondaryDeviceDescriptor, read)?.is_some())
    }

    fn secondary_individual_address(&mut self, index: u8) -> Result<(), Error> {
        let read = self.individual_address_pair(
            index,
            pid::device::SUBNET_ADDRESS,
            pid::device::DEVICE_ADDRESS,
        );
        self.settle(CommonParameter::SecondaryIndividualAddress, read)?;
        Ok(())
    }

    /// An individual address split over a subnet and a device address property.
    fn individual_address_pair(
        &mut self,
        index: u8,
        subnet_pid: u8,
        device_pid: u8,
    ) -> Result<(String, Vec<u8>), Skip> {
        let subnet = self.property(index, subnet_pid)?;
        let device = self.property(index, device_pid)?;
        let raw = [subnet.as_slice(), device.as_slice()].concat();
        let value = match *raw.as_slice() {
            [subnet, device] => codec::individual_address(u16::from_be_bytes([subnet, device])),
            _ => return Err(Malformed { expected: 2, actual: raw.len() }.into()),
        };
        Ok((value, raw))
    }

    fn actual_pei_type(&mut self) -> Result<(), Error> {
        let read = match self.client.read_analog_channel(4, 1) {
            Ok(adc) => {
                let pei = codec::actual_pei_type(adc);
                debug!(message = "analog PEI reading", adc, pei);
                Ok((codec::pei_type_name(pei), adc.to_be_bytes().to_vec()))
            }
            Err(e) => Err(Skip::from(e)),
        };
        self.settle(CommonParameter::ActualPEIType, read)?;
        Ok(())
    }

    fn programming_mode(&mut self) -> Result<(), Error> {
        let parameter = CommonParameter::ProgrammingMode;
        if let Some(index) = self.objects.first(ObjectType::Device) {
            let read = self.property(index, pid::device::PROGRAMMING_MODE);
            let read = read.and_then(|raw| Ok((codec::programming_mode(&raw)?, raw)));
            match read {
                Err(Skip::Abort(e)) => return Err(e.into()),
                Err(e) => debug!(message = "falling back to memory", ?parameter, error = ?e),
                Ok((value, raw)) => {
                    self.emit(parameter, value, raw);
                    return Ok(());
                }
            }
        }
        self.decode_memory(parameter, memory::PROGRAMMING_MODE, 1, codec::programming_mode)?;
        Ok(())
    }

    fn programs(&mut self) -> Result<(), Error> {
        for object_type in [ObjectType::ApplicationProgram, ObjectType::InterfaceProgram] {
            for index in self.objects.indices(object_type).to_vec() {
                self.cursor.enter_object(object_type);
                self.decode_property(
                    CommonParameter::ProgramVersion,
                    index,
                    pid::PROGRAM_VERSION,
                    codec::program_version,
                )?;
                self.load_state(index)?;
                if object_type == ObjectType::ApplicationProgram {
                    self.decode_property(
                        CommonParameter::RunStateControl,
                        index,
                        pid::RUN_STATE_CONTROL,
                        codec::run_state,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn tables(&mut self) -> Result<(), Error> {
        for object_type in [ObjectType::AddressTable, ObjectType::AssociationTable] {
            for index in self.objects.indices(object_type).to_vec() {
                self.cursor.enter_object(object_type);
                self.load_state(index)?;
            }
        }
        Ok(())
    }

    /// Load state of a program or table object, with the error cause on System B devices.
    fn load_state(&mut self, index: u8) -> Result<(), Error> {
        let raw = self.decode_property(
            CommonParameter::LoadStateControl,
            index,
            pid::LOAD_STATE_CONTROL,
            codec::load_state,
        )?;
        let failed = raw.as_deref().and_then(|r| r.first().copied())
            == Some(codec::LoadState::Error as u8);
        if self.system_b && failed {
            self.decode_property(
                CommonParameter::LoadStateError,
                index,
                pid::ERROR_CODE,
                codec::error_class_system,
            )?;
        }
        Ok(())
    }

    /// First element of a property.
    fn property(&mut self, index: u8, pid: u8) -> Result<Vec<u8>, Skip> {
        Ok(self.client.read_property(index, pid, 1, 1)?)
    }

    /// All elements of a property, read in as many requests as needed.
    fn property_elements(&mut self, index: u8, pid: u8) -> Result<Vec<u8>, Skip> {
        let count = self.client.read_property(index, pid, 0, 1)?;
        let count = match count.first_chunk::<2>() {
            Some(count) => u16::from_be_bytes(*count),
            None => return Err(Malformed { expected: 2, actual: count.len() }.into()),
        };
        if count == 0 {
            return Err(Skip::Absent);
        }
        let mut data = Vec::new();
        let mut start = 1u16;
        while start <= count {
            let remaining = u8::try_from(count - start + 1).unwrap_or(u8::MAX);
            let elements = remaining.min(MAX_ELEMENTS_PER_READ);
            data.extend(self.client.read_property(index, pid, start, elements)?);
            start += u16::from(elements);
        }
        Ok(data)
    }

    fn memory(&mut self, address: u16, length: u16) -> Result<Vec<u8>, Skip> {
        Ok(self.client.read_memory(address, length)?)
    }

    /// Emits a decoded value, or logs why there is none.
    ///
    /// Returns the raw bytes of emitted values.
    fn settle(
        &mut self,
        parameter: impl Into<Parameter>,
        read: Result<(String, Vec<u8>), Skip>,
    ) -> Result<Option<Vec<u8>>, Error> {
        let parameter = parameter.into();
        match read {
            Ok((value, raw)) => {
                let emitted = self.emit(parameter, value, raw.clone());
                Ok(emitted.then_some(raw))
            }
            Err(Skip::Abort(e)) => Err(e.into()),
            Err(Skip::Absent) => {
                debug!(message = "nothing to report", %parameter);
                Ok(None)
            }
            Err(Skip::Unsupported(e)) => {
                debug!(message = "read failed", %parameter, error = %e);
                Ok(None)
            }
            Err(Skip::Malformed(e)) => {
                debug!(message = "could not decode", %parameter, error = %e);
                Ok(None)
            }
        }
    }

    /// Reads the first element of a property and emits it decoded with `codec`.
    fn decode_property(
        &mut self,
        parameter: impl Into<Parameter>,
        index: u8,
        pid: u8,
        codec: fn(&[u8]) -> Decoded,
    ) -> Result<Option<Vec<u8>>, Error> {
        let read = self.property(index, pid).and_then(|raw| Ok((codec(&raw)?, raw)));
        self.settle(parameter, read)
    }

    fn decode_memory(
        &mut self,
        parameter: impl Into<Parameter>,
        address: u16,
        length: u16,
        codec: fn(&[u8]) -> Decoded,
    ) -> Result<Option<Vec<u8>>, Error> {
        let read = self.memory(address, length).and_then(|raw| Ok((codec(&raw)?, raw)));
        self.settle(parameter, read)
    }

    /// Hands a result to the sink unless the value is empty.
    fn emit(&mut self, parameter: impl Into<Parameter>, value: String, raw: Vec<u8>) -> bool {
        let parameter = parameter.into();
        if value.is_empty() {
            debug!(message = "empty value", %parameter);
            return false;
        }
        self.cursor.announce();
        let category = self.cursor.current().to_string();
        self.sink.push(ResultItem { category, parameter, value, raw });
        true
    }
}
