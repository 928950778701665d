//! An offline device: interface objects, memory and analog readings described up front.
//!
//! Images are loaded from JSON for the `info` command, and built in code for tests. Reads are
//! served with the same failure behaviour a real device would show: missing properties, objects
//! past the end of the table and unpopulated memory are refused at the protocol level.
//!
//! ```json
//! {
//!   "descriptor": "07B0",
//!   "io_list": true,
//!   "objects": [
//!     { "type": 0, "properties": [ { "pid": 12, "elements": ["00c5"] } ] }
//!   ],
//!   "memory": [ { "address": 96, "data": "01" } ],
//!   "adc": [ { "channel": 4, "value": 122 } ],
//!   "function_properties": [
//!     { "object_type": 17, "pid": 51, "service": 0, "output": "01" }
//!   ]
//! }
//! ```

use crate::client::{ManagementClient, ReadError};
use crate::descriptor::{self, DeviceDescriptor};
use crate::objects::{ObjectType, pid};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::trace;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read the device image at {1:?}")]
    ReadFile(#[source] std::io::Error, PathBuf),
    #[error("could not parse the device image")]
    Parse(#[source] serde_json::Error),
    #[error("`{1}` is not valid hexadecimal data")]
    Hex(#[source] hex::FromHexError, String),
    #[error("invalid device descriptor")]
    Descriptor(#[source] descriptor::ParseError),
    #[error("memory block at {0:#06x} extends past the end of the address space")]
    MemoryOverflow(u16),
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageFile {
    descriptor: Option<String>,
    #[serde(default)]
    io_list: bool,
    #[serde(default)]
    objects: Vec<ObjectFile>,
    #[serde(default)]
    memory: Vec<MemoryFile>,
    #[serde(default)]
    adc: Vec<AnalogFile>,
    #[serde(default)]
    function_properties: Vec<FunctionPropertyFile>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ObjectFile {
    #[serde(rename = "type")]
    object_type: u16,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    properties: Vec<PropertyFile>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PropertyFile {
    pid: u8,
    elements: Vec<String>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MemoryFile {
    address: u16,
    data: String,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalogFile {
    channel: u8,
    value: u32,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionPropertyFile {
    object_type: u16,
    #[serde(default = "default_instance")]
    instance: u8,
    pid: u8,
    service: u8,
    #[serde(default)]
    input: String,
    output: String,
}

fn default_instance() -> u8 {
    1
}

fn decode_hex(data: &str) -> Result<Vec<u8>, Error> {
    hex::decode(data).map_err(|e| Error::Hex(e, data.to_string()))
}

struct ObjectImage {
    object_type: ObjectType,
    /// Not visible to an object type probe, but otherwise readable.
    hidden: bool,
    properties: BTreeMap<u8, Vec<Vec<u8>>>,
}

struct FunctionPropertyImage {
    object_type: u16,
    instance: u8,
    pid: u8,
    service: u8,
    input: Vec<u8>,
    output: Vec<u8>,
}

/// Tracks which addresses of the 64 KiB address space hold a value.
const BITMASK_WORDS: usize = 0x10000 / u64::BITS as usize;

struct AddressBitmask([u64; BITMASK_WORDS]);

impl AddressBitmask {
    fn new() -> Self {
        Self([0; BITMASK_WORDS])
    }

    fn word_bit_mask(address: u16) -> (usize, u64) {
        let word = (u32::from(address) / u64::BITS) as usize;
        let bit_mask = 1 << u64::from(u32::from(address) % u64::BITS);
        (word, bit_mask)
    }

    fn is_set(&self, address: u16) -> bool {
        let (word, bitmask) = Self::word_bit_mask(address);
        (self.0[word] & bitmask) != 0
    }

    fn set(&mut self, address: u16) {
        let (word, bitmask) = Self::word_bit_mask(address);
        self.0[word] |= bitmask;
    }
}

struct MemoryImage {
    values: Vec<u8>,
    present: AddressBitmask,
}

impl MemoryImage {
    fn new() -> Self {
        Self { values: vec![0; 0x10000], present: AddressBitmask::new() }
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), Error> {
        let start = usize::from(address);
        if start + data.len() > self.values.len() {
            return Err(Error::MemoryOverflow(address));
        }
        self.values[start..][..data.len()].copy_from_slice(data);
        for offset in 0..data.len() {
            self.present.set(address + offset as u16);
        }
        Ok(())
    }

    /// Reads a range only when every byte of it is populated.
    fn read(&self, address: u16, length: u16) -> Option<Vec<u8>> {
        let start = usize::from(address);
        let end = start + usize::from(length);
        if end > self.values.len() {
            return None;
        }
        let complete = (start..end).all(|a| self.present.is_set(a as u16));
        complete.then(|| self.values[start..end].to_vec())
    }
}

#[derive(serde::Deserialize)]
#[serde(try_from = "ImageFile")]
pub struct DeviceImage {
    descriptor: Option<DeviceDescriptor>,
    io_list: bool,
    objects: Vec<ObjectImage>,
    memory: MemoryImage,
    adc: BTreeMap<u8, u32>,
    function_properties: Vec<FunctionPropertyImage>,
    reads: usize,
    interrupt_after: Option<usize>,
    /// Properties whose reads lose the connection, as `(object index, pid)`.
    broken_properties: BTreeSet<(u8, u8)>,
}

impl TryFrom<ImageFile> for DeviceImage {
    type Error = Error;
    fn try_from(file: ImageFile) -> Result<Self, Self::Error> {
        let mut image = Self::without_descriptor();
        image.descriptor = match file.descriptor {
            None => None,
            Some(dd) => Some(dd.parse().map_err(Error::Descriptor)?),
        };
        image.io_list = file.io_list;
        for object in file.objects {
            let mut properties = BTreeMap::new();
            for property in object.properties {
                let elements = property
                    .elements
                    .iter()
                    .map(|e| decode_hex(e))
                    .collect::<Result<Vec<_>, _>>()?;
                properties.insert(property.pid, elements);
            }
            image.objects.push(ObjectImage {
                object_type: ObjectType::from_code(object.object_type),
                hidden: object.hidden,
                properties,
            });
        }
        for block in file.memory {
            image.memory.write(block.address, &decode_hex(&block.data)?)?;
        }
        image.adc = file.adc.into_iter().map(|a| (a.channel, a.value)).collect();
        for fp in file.function_properties {
            image.function_properties.push(FunctionPropertyImage {
                object_type: fp.object_type,
                instance: fp.instance,
                pid: fp.pid,
                service: fp.service,
                input: decode_hex(&fp.input)?,
                output: decode_hex(&fp.output)?,
            });
        }
        Ok(image)
    }
}

impl DeviceImage {
    pub fn new(descriptor: u16) -> Self {
        Self { descriptor: Some(DeviceDescriptor::new(descriptor)), ..Self::without_descriptor() }
    }

    /// A device that refuses to report its device descriptor.
    pub fn without_descriptor() -> Self {
        Self {
            descriptor: None,
            io_list: false,
            objects: Vec::new(),
            memory: MemoryImage::new(),
            adc: BTreeMap::new(),
            function_properties: Vec::new(),
            reads: 0,
            interrupt_after: None,
            broken_properties: BTreeSet::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let json =
            std::fs::read_to_string(path).map_err(|e| Error::ReadFile(e, path.to_path_buf()))?;
        Self::from_json(&json)
    }

    fn push_object<const N: usize>(
        mut self,
        object_type: ObjectType,
        hidden: bool,
        properties: [(u8, &[u8]); N],
    ) -> Self {
        let properties = properties.into_iter().map(|(pid, value)| (pid, vec![value.to_vec()]));
        self.objects.push(ObjectImage { object_type, hidden, properties: properties.collect() });
        self
    }

    /// Appends an interface object whose properties each hold a single element.
    pub fn with_object<const N: usize>(
        self,
        object_type: ObjectType,
        properties: [(u8, &[u8]); N],
    ) -> Self {
        self.push_object(object_type, false, properties)
    }

    /// Appends an interface object that does not answer object type probes.
    pub fn with_hidden_object<const N: usize>(
        self,
        object_type: ObjectType,
        properties: [(u8, &[u8]); N],
    ) -> Self {
        self.push_object(object_type, true, properties)
    }

    /// Sets all elements of a property on the object at `index`.
    ///
    /// Panics when no object exists at `index`.
    pub fn with_property(
        mut self,
        index: u8,
        pid: u8,
        elements: impl IntoIterator<Item = Vec<u8>>,
    ) -> Self {
        let object = &mut self.objects[usize::from(index)];
        object.properties.insert(pid, elements.into_iter().collect());
        self
    }

    /// Makes the device object list all objects in its interface object list property.
    pub fn with_io_list(mut self) -> Self {
        self.io_list = true;
        self
    }

    /// Populates memory starting at `address`.
    ///
    /// Panics when the data runs past the end of the address space.
    pub fn with_memory(mut self, address: u16, data: &[u8]) -> Self {
        if let Err(e) = self.memory.write(address, data) {
            panic!("{e}");
        }
        self
    }

    pub fn with_adc(mut self, channel: u8, value: u32) -> Self {
        self.adc.insert(channel, value);
        self
    }

    pub fn with_function_property(
        mut self,
        object_type: ObjectType,
        instance: u8,
        pid: u8,
        service: u8,
        input: &[u8],
        output: &[u8],
    ) -> Self {
        self.function_properties.push(FunctionPropertyImage {
            object_type: object_type.code(),
            instance,
            pid,
            service,
            input: input.to_vec(),
            output: output.to_vec(),
        });
        self
    }

    /// Interrupts every read after the first `reads` ones.
    pub fn interrupt_after(mut self, reads: usize) -> Self {
        self.interrupt_after = Some(reads);
        self
    }

    /// Makes every read of a property fail as if the connection dropped.
    pub fn fail_property(mut self, object_index: u8, pid: u8) -> Self {
        self.broken_properties.insert((object_index, pid));
        self
    }

    /// Number of reads served or refused so far.
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn count_read(&mut self) -> Result<(), ReadError> {
        self.reads += 1;
        match self.interrupt_after {
            Some(limit) if self.reads > limit => Err(ReadError::Interrupted),
            _ => Ok(()),
        }
    }

    /// All elements of a property, including the ones the device synthesizes.
    fn elements(&self, object_index: u8, pid: u8) -> Result<Vec<Vec<u8>>, ReadError> {
        let Some(object) = self.objects.get(usize::from(object_index)) else {
            return Err(ReadError::protocol(format!("no interface object at index {object_index}")));
        };
        if let Some(elements) = object.properties.get(&pid) {
            return Ok(elements.clone());
        }
        match pid {
            pid::OBJECT_TYPE if !object.hidden => {
                Ok(vec![object.object_type.code().to_be_bytes().to_vec()])
            }
            pid::device::IO_LIST if object_index == 0 && self.io_list => Ok(self
                .objects
                .iter()
                .map(|o| o.object_type.code().to_be_bytes().to_vec())
                .collect()),
            _ => Err(ReadError::protocol(format!(
                "property {pid} does not exist on object {object_index}"
            ))),
        }
    }
}

impl ManagementClient for DeviceImage {
    fn read_device_descriptor(&mut self) -> Result<[u8; 2], ReadError> {
        self.count_read()?;
        self.descriptor
            .map(DeviceDescriptor::to_bytes)
            .ok_or_else(|| ReadError::protocol("device descriptor is not available"))
    }

    fn read_property(
        &mut self,
        object_index: u8,
        pid: u8,
        start: u16,
        count: u8,
    ) -> Result<Vec<u8>, ReadError> {
        self.count_read()?;
        trace!(message = "property read", object_index, pid, start, count);
        if self.broken_properties.contains(&(object_index, pid)) {
            let e = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection lost");
            return Err(ReadError::Transport(e));
        }
        let elements = self.elements(object_index, pid)?;
        if start == 0 {
            let current = u16::try_from(elements.len()).unwrap_or(u16::MAX);
            return Ok(current.to_be_bytes().to_vec());
        }
        let first = usize::from(start) - 1;
        let Some(range) = elements.get(first..first + usize::from(count)) else {
            return Err(ReadError::protocol(format!(
                "elements {start}..{} of property {pid} are out of range",
                first + usize::from(count)
            )));
        };
        if range.is_empty() {
            return Err(ReadError::protocol("zero elements requested"));
        }
        Ok(range.concat())
    }

    fn read_memory(&mut self, address: u16, length: u16) -> Result<Vec<u8>, ReadError> {
        self.count_read()?;
        trace!(message = "memory read", address, length);
        self.memory
            .read(address, length)
            .ok_or_else(|| ReadError::protocol(format!("memory {address:#06x} is not accessible")))
    }

    fn read_analog_channel(&mut self, channel: u8, _repeat: u8) -> Result<u32, ReadError> {
        self.count_read()?;
        self.adc
            .get(&channel)
            .copied()
            .ok_or_else(|| ReadError::protocol(format!("no reading for channel {channel}")))
    }

    fn read_function_property_state(
        &mut self,
        object_type: u16,
        object_instance: u8,
        pid: u8,
        service: u8,
        input: &[u8],
    ) -> Result<Vec<u8>, ReadError> {
        self.count_read()?;
        self.function_properties
            .iter()
            .find(|fp| {
                fp.object_type == object_type
                    && fp.instance == object_instance
                    && fp.pid == pid
                    && fp.service == service
                    && fp.input == input
            })
            .map(|fp| fp.output.clone())
            .ok_or_else(|| ReadError::protocol(format!("function property {pid} is not supported")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &str = r#"{
        "descriptor": "0x07B0",
        "io_list": true,
        "objects": [
            { "type": 0, "properties": [ { "pid": 12, "elements": ["00c5"] } ] },
            { "type": 1, "properties": [ { "pid": 23, "elements": ["0a01", "0a02"] } ] }
        ],
        "memory": [ { "address": 96, "data": "01" } ],
        "adc": [ { "channel": 4, "value": 122 } ],
        "function_properties": [
            { "object_type": 17, "pid": 51, "service": 0, "output": "01" }
        ]
    }"#;

    #[test]
    fn loads_json_images() {
        let mut image = DeviceImage::from_json(IMAGE).unwrap();
        assert_eq!(image.read_device_descriptor().unwrap(), [0x07, 0xB0]);
        assert_eq!(image.read_property(0, 12, 1, 1).unwrap(), [0x00, 0xc5]);
        assert_eq!(image.read_property(1, 23, 0, 1).unwrap(), [0, 2]);
        assert_eq!(image.read_property(1, 23, 1, 2).unwrap(), [0x0a, 0x01, 0x0a, 0x02]);
        assert_eq!(image.read_property(0, pid::device::IO_LIST, 1, 2).unwrap(), [0, 0, 0, 1]);
        assert_eq!(image.read_memory(0x0060, 1).unwrap(), [0x01]);
        assert_eq!(image.read_analog_channel(4, 1).unwrap(), 122);
        assert_eq!(image.read_function_property_state(17, 1, 51, 0, &[]).unwrap(), [0x01]);
        assert_eq!(image.reads(), 8);
    }

    #[test]
    fn rejects_bad_hex() {
        let result = DeviceImage::from_json(r#"{ "memory": [ { "address": 0, "data": "zz" } ] }"#);
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn refuses_what_is_not_there() {
        let mut image = DeviceImage::without_descriptor()
            .with_object(ObjectType::Device, [])
            .with_memory(0x0100, &[1, 2]);
        assert!(image.read_device_descriptor().unwrap_err().is_recoverable());
        assert!(image.read_property(0, 12, 1, 1).unwrap_err().is_recoverable());
        assert!(image.read_property(1, pid::OBJECT_TYPE, 1, 1).unwrap_err().is_recoverable());
        assert!(image.read_property(0, pid::OBJECT_TYPE, 2, 1).is_err());
        assert_eq!(image.read_memory(0x0100, 2).unwrap(), [1, 2]);
        assert!(image.read_memory(0x0100, 3).is_err());
        assert!(image.read_memory(0xffff, 2).is_err());
    }

    #[test]
    fn hidden_objects_only_hide_their_type() {
        let mut image = DeviceImage::new(0x091A)
            .with_object(ObjectType::Device, [])
            .with_hidden_object(ObjectType::CemiServer, [(pid::cemi::COMM_MODE, &[0x00])]);
        assert!(image.read_property(1, pid::OBJECT_TYPE, 1, 1).is_err());
        assert_eq!(image.read_property(1, pid::cemi::COMM_MODE, 1, 1).unwrap(), [0x00]);
    }

    #[test]
    fn broken_properties_fail_at_the_transport() {
        let mut image = DeviceImage::new(0x07B0)
            .with_object(ObjectType::Device, [(pid::MANUFACTURER_ID, &[0x00, 0xc5])])
            .fail_property(0, pid::MANUFACTURER_ID);
        let e = image.read_property(0, pid::MANUFACTURER_ID, 1, 1).unwrap_err();
        assert!(matches!(e, ReadError::Transport(_)));
        assert!(!e.is_recoverable());
        assert!(image.read_property(0, pid::OBJECT_TYPE, 1, 1).is_ok());
    }

    #[test]
    fn interrupts_after_the_given_number_of_reads() {
        let mut image = DeviceImage::new(0x0012).interrupt_after(1);
        assert!(image.read_device_descriptor().is_ok());
        assert!(matches!(image.read_device_descriptor(), Err(ReadError::Interrupted)));
    }
}
