//! The parameters an interrogation can produce.
//!
//! Identities are the enum variant names; the human readable name is derived from them by
//! splitting the identity into words, keeping acronyms such as `IP` or `PEI` together.

use std::fmt;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray, strum::IntoStaticStr,
)]
pub enum CommonParameter {
    DeviceDescriptor,
    KNXMedium,
    FirmwareType,
    FirmwareVersion,
    Manufacturer,
    ManufacturerData,
    OrderInfo,
    SerialNumber,
    RequiredPEIType,
    ActualPEIType,
    HardwareType,
    FirmwareRevision,
    SecondaryDeviceDescriptor,
    SecondaryIndividualAddress,
    ServiceControl,
    DomainAddress,
    RFDomainAddress,
    SoftwareVersion,
    MaxAPDULength,
    ErrorFlags,
    RunError,
    ProgrammingMode,
    ProgramVersion,
    LoadStateControl,
    LoadStateError,
    RunStateControl,
    GroupAddresses,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray, strum::IntoStaticStr,
)]
pub enum CemiParameter {
    SupportedCommModes,
    SelectedCommMode,
    ClientIndividualAddress,
    SupportedFilteringModes,
    SelectedFilteringModes,
    SupportedRFModes,
    SelectedRFMode,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray, strum::IntoStaticStr,
)]
pub enum KnxIpParameter {
    DeviceName,
    Capabilities,
    MACAddress,
    CurrentIPAssignment,
    CurrentIPAddress,
    CurrentSubnetMask,
    CurrentDefaultGateway,
    DHCPServer,
    ConfiguredIPAssignment,
    IPAddress,
    SubnetMask,
    DefaultGateway,
    RoutingMulticast,
    MulticastTTL,
    MessagesToMulticastIP,
    AdditionalIndividualAddresses,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray, strum::IntoStaticStr,
)]
pub enum RfParameter {
    DomainAddress,
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray, strum::IntoStaticStr,
)]
pub enum SecurityParameter {
    SecurityMode,
    SecurityFailure,
    SecurityFailureCounters,
    LastSecurityFailure,
}

/// Values the engine works out along the way rather than reading from a single source.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::VariantArray, strum::IntoStaticStr,
)]
pub enum InternalParameter {
    InterfaceObjects,
    IndividualAddress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::IntoStaticStr)]
pub enum ParameterSet {
    Common,
    #[strum(serialize = "cEMI")]
    Cemi,
    #[strum(serialize = "KNX-IP")]
    KnxIp,
    #[strum(serialize = "RF")]
    Rf,
    Security,
    Internal,
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(<&'static str>::from(self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    Common(CommonParameter),
    Cemi(CemiParameter),
    KnxIp(KnxIpParameter),
    Rf(RfParameter),
    Security(SecurityParameter),
    Internal(InternalParameter),
}

impl Parameter {
    /// Every known parameter, set by set.
    pub fn all() -> impl Iterator<Item = Parameter> {
        use strum::VariantArray;
        let common = CommonParameter::VARIANTS.iter().copied().map(Self::Common);
        let cemi = CemiParameter::VARIANTS.iter().copied().map(Self::Cemi);
        let knxip = KnxIpParameter::VARIANTS.iter().copied().map(Self::KnxIp);
        let rf = RfParameter::VARIANTS.iter().copied().map(Self::Rf);
        let security = SecurityParameter::VARIANTS.iter().copied().map(Self::Security);
        let internal = InternalParameter::VARIANTS.iter().copied().map(Self::Internal);
        common.chain(cemi).chain(knxip).chain(rf).chain(security).chain(internal)
    }

    pub fn identity(&self) -> &'static str {
        match *self {
            Self::Common(p) => p.into(),
            Self::Cemi(p) => p.into(),
            Self::KnxIp(p) => p.into(),
            Self::Rf(p) => p.into(),
            Self::Security(p) => p.into(),
            Self::Internal(p) => p.into(),
        }
    }

    pub fn set(&self) -> ParameterSet {
        match self {
            Self::Common(_) => ParameterSet::Common,
            Self::Cemi(_) => ParameterSet::Cemi,
            Self::KnxIp(_) => ParameterSet::KnxIp,
            Self::Rf(_) => ParameterSet::Rf,
            Self::Security(_) => ParameterSet::Security,
            Self::Internal(_) => ParameterSet::Internal,
        }
    }

    pub fn display_name(&self) -> String {
        friendly_name(self.identity())
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl serde::Serialize for Parameter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_name())
    }
}

macro_rules! into_parameter {
    ($($set: ident => $variant: ident,)*) => {
        $(impl From<$set> for Parameter {
            fn from(p: $set) -> Self {
                Self::$variant(p)
            }
        })*
    };
}

into_parameter! {
    CommonParameter => Common,
    CemiParameter => Cemi,
    KnxIpParameter => KnxIp,
    RfParameter => Rf,
    SecurityParameter => Security,
    InternalParameter => Internal,
}

/// Inserts a space in front of every capital that starts a new word.
///
/// A capital starts a word when it follows a lower-case letter or a digit, or when it is the last
/// capital of an acronym that is immediately followed by a lower-case letter.
pub fn friendly_name(identity: &str) -> String {
    let chars = identity.chars().collect::<Vec<_>>();
    let mut name = String::with_capacity(identity.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let previous = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if previous.is_lowercase()
                || previous.is_ascii_digit()
                || (previous.is_uppercase() && next_is_lower)
            {
                name.push(' ');
            }
        }
        name.push(c);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_names() {
        assert_eq!(friendly_name("ProgrammingMode"), "Programming Mode");
        assert_eq!(friendly_name("CurrentIPAddress"), "Current IP Address");
        assert_eq!(friendly_name("KNXMedium"), "KNX Medium");
        assert_eq!(friendly_name("MulticastTTL"), "Multicast TTL");
        assert_eq!(friendly_name("DHCPServer"), "DHCP Server");
        assert_eq!(friendly_name("Manufacturer"), "Manufacturer");
    }

    #[test]
    fn display_names_of_reported_parameters() {
        assert_eq!(
            Parameter::from(KnxIpParameter::ConfiguredIPAssignment).display_name(),
            "Configured IP Assignment"
        );
        assert_eq!(
            Parameter::from(SecurityParameter::LastSecurityFailure).display_name(),
            "Last Security Failure"
        );
        assert_eq!(Parameter::from(CommonParameter::MaxAPDULength).display_name(), "Max APDU Length");
        assert_eq!(Parameter::from(CommonParameter::RequiredPEIType).to_string(), "Required PEI Type");
    }

    #[test]
    fn all_parameters_have_unique_names_within_their_set() {
        let all = Parameter::all().collect::<Vec<_>>();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!(a.set() != b.set() || a.identity() != b.identity());
            }
        }
        assert_eq!(all.iter().filter(|p| p.set() == ParameterSet::Rf).count(), 1);
    }
}
