use knx_device_info::codec;
use knx_device_info::descriptor::{self, DeviceDescriptor, Strategy};
use knx_device_info::device_image::DeviceImage;
use knx_device_info::interrogate::{self, Error, Options};
use knx_device_info::objects::{self, ObjectType, pid};
use knx_device_info::parameters::{
    CemiParameter, CommonParameter, InternalParameter, KnxIpParameter, Parameter,
    SecurityParameter,
};
use knx_device_info::sink::{ResultItem, ResultSink};

fn interrogate(image: &mut DeviceImage) -> Result<Vec<ResultItem>, Error> {
    let mut sink = ResultSink::new();
    interrogate::interrogate(image, &Options::default(), &mut sink)?;
    Ok(sink.into_items())
}

fn values(items: &[ResultItem], parameter: impl Into<Parameter>) -> Vec<&str> {
    let parameter = parameter.into();
    items.iter().filter(|i| i.parameter == parameter).map(|i| i.value.as_str()).collect()
}

const SYSTEM_B_IMAGE: &str = r#"{
    "descriptor": "07B0",
    "io_list": true,
    "objects": [
        { "type": 0, "properties": [
            { "pid": 12, "elements": ["00c5"] },
            { "pid": 11, "elements": ["00c5000012ab"] },
            { "pid": 54, "elements": ["00"] }
        ] },
        { "type": 1, "properties": [
            { "pid": 5, "elements": ["01"] },
            { "pid": 23, "elements": ["0801", "0802", "1003"] }
        ] },
        { "type": 3, "properties": [
            { "pid": 5, "elements": ["03"] },
            { "pid": 28, "elements": ["09"] },
            { "pid": 6, "elements": ["01"] }
        ] },
        { "type": 8, "properties": [
            { "pid": 52, "elements": ["06"] }
        ] }
    ]
}"#;

#[test]
fn system_b_device_from_json() {
    let mut image = DeviceImage::from_json(SYSTEM_B_IMAGE).unwrap();
    let items = interrogate(&mut image).unwrap();
    assert_eq!(values(&items, CommonParameter::Manufacturer), ["Weinzierl Engineering GmbH"]);
    assert_eq!(values(&items, CommonParameter::SerialNumber), ["00c5:000012ab"]);
    assert_eq!(values(&items, CommonParameter::ProgrammingMode), ["inactive"]);
    assert_eq!(values(&items, CommonParameter::LoadStateError), ["CRC error"]);
    assert_eq!(values(&items, CommonParameter::RunStateControl), ["Running"]);
    assert_eq!(values(&items, CommonParameter::GroupAddresses), ["1/0/1, 1/0/2, 2/0/3"]);
    assert_eq!(values(&items, CemiParameter::SelectedCommMode), ["cEMI transport layer"]);
    assert_eq!(
        values(&items, InternalParameter::InterfaceObjects),
        ["Device (0), Address Table (1), Application Program (2), cEMI Server (3)"]
    );
    let general = items.iter().take_while(|i| i.category == "General").count();
    assert!(general >= 4);
}

#[test]
fn group_addresses_are_reported_once_per_session() {
    let mut image = DeviceImage::from_json(SYSTEM_B_IMAGE).unwrap();
    let first = interrogate(&mut image).unwrap();
    let second = interrogate(&mut image).unwrap();
    let first = values(&first, CommonParameter::GroupAddresses);
    let second = values(&second, CommonParameter::GroupAddresses);
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
}

#[test]
fn load_states_read_from_objects() {
    for (state, expected) in [
        (0u8, "Unloaded"),
        (1, "Loaded"),
        (2, "Loading"),
        (3, "Error (during load process)"),
        (4, "Unloading"),
        (5, "Load Completing"),
        (7, "Invalid load status 7"),
    ] {
        let mut image = DeviceImage::new(0x0705)
            .with_object(ObjectType::Device, [])
            .with_object(ObjectType::AssociationTable, [(pid::LOAD_STATE_CONTROL, &[state])])
            .with_io_list();
        let items = interrogate(&mut image).unwrap();
        assert_eq!(values(&items, CommonParameter::LoadStateControl), [expected]);
        assert_eq!(items.last().map(|i| i.category.as_str()), Some("Association Table"));
    }
}

#[test]
fn manufacturer_names() {
    assert_eq!(codec::manufacturer(&[0x00, 197]).unwrap(), "Weinzierl Engineering GmbH");
    assert_eq!(codec::manufacturer(&[197]).unwrap(), "Weinzierl Engineering GmbH");
    assert_eq!(codec::manufacturer(&[0xff, 0xfe]).unwrap(), "Unknown manufacturer (65534)");
}

#[test]
fn classification_is_a_partition() {
    let mut counts = std::collections::HashMap::new();
    for dd in 0..=u16::MAX {
        *counts.entry(descriptor::classify(DeviceDescriptor::new(dd))).or_insert(0u32) += 1;
    }
    assert_eq!(counts[&Strategy::PlBcu1], 2);
    assert_eq!(counts[&Strategy::TpBcu1], 3);
    assert_eq!(counts[&Strategy::TpBcu2], 2);
    assert_eq!(counts[&Strategy::PropertyBased], 14);
    assert_eq!(counts.values().sum::<u32>(), 0x10000);
}

#[test]
fn locator_falls_back_to_probing() {
    let mut image = DeviceImage::new(0x07B0)
        .with_object(ObjectType::Device, [])
        .with_object(ObjectType::CemiServer, []);
    let map = objects::locate(&mut image).unwrap();
    assert_eq!(map.indices(ObjectType::CemiServer), &[1]);
    assert_eq!(map.iter().count(), 2);
}

fn knxip_router(current: &str, configured: &str) -> DeviceImage {
    let json = format!(
        r#"{{
            "descriptor": "57B0",
            "io_list": true,
            "objects": [
                {{ "type": 0 }},
                {{ "type": 11, "properties": [
                    {{ "pid": 54, "elements": ["{current}"] }},
                    {{ "pid": 55, "elements": ["{configured}"] }},
                    {{ "pid": 57, "elements": ["c0a80114"] }},
                    {{ "pid": 60, "elements": ["c0a80114"] }}
                ] }}
            ]
        }}"#
    );
    DeviceImage::from_json(&json).unwrap()
}

#[test]
fn configured_assignment_only_when_different() {
    let items = interrogate(&mut knxip_router("01", "01")).unwrap();
    assert_eq!(values(&items, KnxIpParameter::CurrentIPAssignment), ["manual"]);
    assert!(values(&items, KnxIpParameter::ConfiguredIPAssignment).is_empty());
    assert!(values(&items, KnxIpParameter::IPAddress).is_empty());

    let items = interrogate(&mut knxip_router("04", "05")).unwrap();
    assert_eq!(values(&items, KnxIpParameter::ConfiguredIPAssignment), ["manual, DHCP"]);
    assert!(values(&items, KnxIpParameter::IPAddress).is_empty());
}

#[test]
fn three_security_failures() {
    let mut image = DeviceImage::new(0x07B0)
        .with_object(ObjectType::Device, [])
        .with_object(ObjectType::Security, [])
        .with_io_list();
    for index in 0..3u8 {
        let entry = [index, 0x11, 0x01, 0x11, 0x02, 0x00, 0, 0, 0, 0, 0x01, index, 3];
        image = image.with_function_property(
            ObjectType::Security,
            1,
            pid::security::SECURITY_FAILURES_LOG,
            1,
            &[index],
            &entry,
        );
    }
    let mut image = image.with_function_property(
        ObjectType::Security,
        1,
        pid::security::SECURITY_FAILURES_LOG,
        1,
        &[3],
        &[],
    );
    let items = interrogate(&mut image).unwrap();
    assert_eq!(
        values(&items, SecurityParameter::LastSecurityFailure),
        [
            "1.1.1->1.1.2 seq 256: cryptographic error",
            "1.1.1->1.1.2 seq 257: cryptographic error",
            "1.1.1->1.1.2 seq 258: cryptographic error",
        ]
    );
}

#[test]
fn interruption_is_reported_as_cancellation() {
    let mut image = DeviceImage::from_json(SYSTEM_B_IMAGE).unwrap().interrupt_after(5);
    let mut seen = Vec::new();
    let mut sink = ResultSink::forwarding(|item: ResultItem| seen.push(item));
    let result = interrogate::interrogate(&mut image, &Options::default(), &mut sink);
    drop(sink);
    assert!(matches!(result, Err(Error::Canceled)));
    assert_eq!(image.reads(), 6);
    assert!(seen.iter().all(|i| !i.value.is_empty()));
}

#[test]
fn unobtainable_descriptor_is_fatal() {
    let mut image = DeviceImage::from_json(r#"{ "objects": [ { "type": 0 } ] }"#).unwrap();
    let result = interrogate(&mut image);
    assert!(matches!(result, Err(Error::DeviceDescriptor(_))));

    let mut sink = ResultSink::new();
    let options = Options { descriptor: Some("0x0705".parse().unwrap()) };
    interrogate::interrogate(&mut image, &options, &mut sink).unwrap();
    assert_eq!(values(sink.items(), CommonParameter::DeviceDescriptor), ["0705"]);
}

#[test]
fn bcu1_memory_image() {
    let mut image = DeviceImage::from_json(
        r#"{
            "descriptor": "0012",
            "memory": [
                { "address": 96, "data": "01" },
                { "address": 260, "data": "c5a0010a" },
                { "address": 278, "data": "0211050801" }
            ]
        }"#,
    )
    .unwrap();
    let items = interrogate(&mut image).unwrap();
    assert_eq!(values(&items, CommonParameter::Manufacturer), ["Weinzierl Engineering GmbH"]);
    assert_eq!(
        values(&items, CommonParameter::ProgramVersion),
        ["Weinzierl Engineering GmbH [a001] v0.10"]
    );
    assert_eq!(values(&items, CommonParameter::ProgrammingMode), ["active"]);
    assert_eq!(values(&items, InternalParameter::IndividualAddress), ["1.1.5"]);
    assert_eq!(values(&items, CommonParameter::GroupAddresses), ["1/0/1"]);
    assert!(items.iter().all(|i| i.category == "General"));
}

#[test]
fn demo_router_image() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/knxip-router.json");
    let mut image = DeviceImage::load(&path).unwrap();
    let items = interrogate(&mut image).unwrap();
    assert_eq!(values(&items, KnxIpParameter::DeviceName), ["KNX IP Router"]);
    assert_eq!(
        values(&items, KnxIpParameter::Capabilities),
        ["Device Management, Tunneling, Routing"]
    );
    assert_eq!(values(&items, KnxIpParameter::CurrentIPAssignment), ["DHCP"]);
    assert_eq!(values(&items, KnxIpParameter::DHCPServer), ["192.168.1.1"]);
    assert_eq!(values(&items, KnxIpParameter::ConfiguredIPAssignment), ["manual, DHCP"]);
    assert_eq!(values(&items, KnxIpParameter::IPAddress), ["192.168.1.100"]);
    assert_eq!(values(&items, KnxIpParameter::MulticastTTL), ["16"]);
    assert_eq!(
        values(&items, KnxIpParameter::AdditionalIndividualAddresses),
        ["1.1.241, 1.1.242, 1.1.243"]
    );
    assert_eq!(values(&items, CommonParameter::GroupAddresses), ["1/0/1, 1/0/2, 1/2/16"]);
    let router = items.iter().find(|i| i.parameter == Parameter::from(KnxIpParameter::MACAddress));
    assert_eq!(router.map(|i| i.category.as_str()), Some("KNXnet/IP Parameter"));
}
