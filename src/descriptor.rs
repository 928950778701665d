//! Device descriptor type 0 and the device generation it implies.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor(u16);

impl DeviceDescriptor {
    pub const fn new(mask_version: u16) -> Self {
        Self(mask_version)
    }

    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    pub const fn mask_version(self) -> u16 {
        self.0
    }

    pub fn medium(self) -> Medium {
        let code = (self.0 >> 12) as u8;
        Medium::from_repr(code).unwrap_or(Medium::Unknown)
    }

    pub const fn firmware_type(self) -> u8 {
        ((self.0 >> 8) & 0xf) as u8
    }

    pub const fn firmware_version(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("`{0}` is not a 16-bit hexadecimal device descriptor")]
pub struct ParseError(String);

impl FromStr for DeviceDescriptor {
    type Err = ParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        u16::from_str_radix(digits, 16).map(Self).map_err(|_| ParseError(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::FromRepr, strum::IntoStaticStr)]
#[repr(u8)]
pub enum Medium {
    #[strum(serialize = "TP1")]
    Tp1 = 0,
    #[strum(serialize = "PL110")]
    Pl110 = 1,
    #[strum(serialize = "RF")]
    Rf = 2,
    #[strum(serialize = "TP0")]
    Tp0 = 3,
    #[strum(serialize = "PL132")]
    Pl132 = 4,
    #[strum(serialize = "KNX IP")]
    KnxIp = 5,
    #[strum(serialize = "unknown")]
    Unknown = 0xff,
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(<&'static str>::from(self))
    }
}

/// How the parameters of a device are laid out and therefore how they have to be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray)]
pub enum Strategy {
    /// PL110 BCU 1, flat memory only.
    PlBcu1,
    /// TP1 BCU 1 (three mask revisions sharing one memory layout).
    TpBcu1,
    /// TP1 BCU 2, flat memory with load state machines in RAM.
    TpBcu2,
    /// Known to expose interface objects (System 2, System 7, System 300, System B, ...).
    PropertyBased,
    /// Unknown mask version, check for interface objects before trusting them.
    ObjectDiscovery,
}

static STRATEGIES: [(u16, Strategy); 21] = [
    (0x0010, Strategy::TpBcu1),
    (0x0011, Strategy::TpBcu1),
    (0x0012, Strategy::TpBcu1),
    (0x0020, Strategy::TpBcu2),
    (0x0021, Strategy::TpBcu2),
    (0x0025, Strategy::PropertyBased),
    (0x0300, Strategy::PropertyBased),
    (0x0310, Strategy::PropertyBased),
    (0x0701, Strategy::PropertyBased),
    (0x0705, Strategy::PropertyBased),
    (0x07B0, Strategy::PropertyBased),
    (0x091A, Strategy::PropertyBased),
    (0x1012, Strategy::PlBcu1),
    (0x1013, Strategy::PlBcu1),
    (0x1310, Strategy::PropertyBased),
    (0x17B0, Strategy::PropertyBased),
    (0x2010, Strategy::PropertyBased),
    (0x2311, Strategy::PropertyBased),
    (0x27B0, Strategy::PropertyBased),
    (0x5705, Strategy::PropertyBased),
    (0x57B0, Strategy::PropertyBased),
];

/// Devices with the extended load state error property and a 16-bit group address table length.
static SYSTEM_B: [u16; 4] = [0x07B0, 0x17B0, 0x27B0, 0x57B0];

pub fn classify(descriptor: DeviceDescriptor) -> Strategy {
    STRATEGIES
        .binary_search_by_key(&descriptor.mask_version(), |&(dd, _)| dd)
        .map(|index| STRATEGIES[index].1)
        .unwrap_or(Strategy::ObjectDiscovery)
}

pub fn is_system_b(descriptor: DeviceDescriptor) -> bool {
    SYSTEM_B.contains(&descriptor.mask_version())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::VariantArray as _;

    #[test]
    fn strategy_table_is_sorted_and_unique() {
        assert!(STRATEGIES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn strategies_partition_the_descriptor_space() {
        let mut counts = [0usize; Strategy::VARIANTS.len()];
        for dd in 0..=u16::MAX {
            let strategy = classify(DeviceDescriptor::new(dd));
            let matching = Strategy::VARIANTS.iter().filter(|s| **s == strategy).count();
            assert_eq!(matching, 1);
            counts[Strategy::VARIANTS.iter().position(|s| *s == strategy).unwrap()] += 1;
            let listed = STRATEGIES.iter().any(|&(known, _)| known == dd);
            if !listed {
                assert_eq!(strategy, Strategy::ObjectDiscovery, "{dd:04X}");
            }
        }
        assert_eq!(counts.iter().sum::<usize>(), 0x10000);
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn known_generations() {
        assert_eq!(classify(DeviceDescriptor::new(0x0012)), Strategy::TpBcu1);
        assert_eq!(classify(DeviceDescriptor::new(0x0011)), Strategy::TpBcu1);
        assert_eq!(classify(DeviceDescriptor::new(0x0021)), Strategy::TpBcu2);
        assert_eq!(classify(DeviceDescriptor::new(0x1013)), Strategy::PlBcu1);
        assert_eq!(classify(DeviceDescriptor::new(0x07B0)), Strategy::PropertyBased);
        assert_eq!(classify(DeviceDescriptor::new(0x0705)), Strategy::PropertyBased);
        assert_eq!(classify(DeviceDescriptor::new(0x1234)), Strategy::ObjectDiscovery);
    }

    #[test]
    fn system_b_is_exactly_four_descriptors() {
        let count = (0..=u16::MAX).filter(|&dd| is_system_b(DeviceDescriptor::new(dd))).count();
        assert_eq!(count, 4);
        assert!(is_system_b(DeviceDescriptor::new(0x57B0)));
        assert!(!is_system_b(DeviceDescriptor::new(0x0705)));
    }

    #[test]
    fn descriptor_fields() {
        let dd = DeviceDescriptor::from_bytes([0x57, 0xB0]);
        assert_eq!(dd.mask_version(), 0x57B0);
        assert_eq!(dd.medium(), Medium::KnxIp);
        assert_eq!(dd.firmware_type(), 7);
        assert_eq!(dd.firmware_version(), 0xB0);
        assert_eq!(DeviceDescriptor::new(0xA000).medium(), Medium::Unknown);
        assert_eq!(dd.to_string(), "57B0");
    }

    #[test]
    fn parse() {
        assert_eq!("0x07b0".parse::<DeviceDescriptor>().unwrap(), DeviceDescriptor::new(0x07B0));
        assert_eq!("0012".parse::<DeviceDescriptor>().unwrap(), DeviceDescriptor::new(0x0012));
        assert!("zz".parse::<DeviceDescriptor>().is_err());
    }
}
