//! GPU vendor identification and driver versions.

use std::fmt;
use std::str::FromStr;

/// Four-part driver version, compared lexicographically.
///
/// Field order matters: the derived `Ord` compares major, then minor, then
/// release, then build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverVersion {
    pub major: i32,
    pub minor: i32,
    pub release: i32,
    pub build: i32,
}

impl DriverVersion {
    pub const fn new(major: i32, minor: i32, release: i32, build: i32) -> Self {
        Self {
            major,
            minor,
            release,
            build,
        }
    }

    /// Parse a dotted version string.
    ///
    /// Missing trailing parts stay zero and unparsable parts read as zero,
    /// matching how drivers report partial versions such as `"331.82"`.
    pub fn from_string(version: &str) -> Self {
        let mut parts = version
            .trim()
            .split('.')
            .map(|part| part.trim().parse::<i32>().unwrap_or(0));
        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            release: parts.next().unwrap_or(0),
            build: parts.next().unwrap_or(0),
        }
    }

    /// Strictly older; equal versions are not older.
    pub fn is_older_than(&self, other: &DriverVersion) -> bool {
        self < other
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.release, self.build)
    }
}

impl FromStr for DriverVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_string(s))
    }
}

/// GPU vendors known to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    #[default]
    Unknown,
    Nvidia,
    Amd,
    Intel,
    ImaginationTechnologies,
    /// Apple software renderer
    Apple,
    Nokia,
    /// Microsoft software device
    MsSoftware,
    /// Microsoft WARP (Windows Advanced Rasterization Platform) software device
    MsWarp,
    /// Arm Mali
    Arm,
    Qualcomm,
    /// WebGL on Mozilla/Firefox based browser
    Mozilla,
    /// WebGL on WebKit/Chrome base browser
    Webkit,
}

impl GpuVendor {
    pub const ALL: [GpuVendor; 13] = [
        GpuVendor::Unknown,
        GpuVendor::Nvidia,
        GpuVendor::Amd,
        GpuVendor::Intel,
        GpuVendor::ImaginationTechnologies,
        GpuVendor::Apple,
        GpuVendor::Nokia,
        GpuVendor::MsSoftware,
        GpuVendor::MsWarp,
        GpuVendor::Arm,
        GpuVendor::Qualcomm,
        GpuVendor::Mozilla,
        GpuVendor::Webkit,
    ];

    /// Canonical vendor string, as written in descriptor files.
    pub const fn as_str(self) -> &'static str {
        match self {
            GpuVendor::Unknown => "unknown",
            GpuVendor::Nvidia => "nvidia",
            GpuVendor::Amd => "amd",
            GpuVendor::Intel => "intel",
            GpuVendor::ImaginationTechnologies => "imagination technologies",
            GpuVendor::Apple => "apple",
            GpuVendor::Nokia => "nokia",
            GpuVendor::MsSoftware => "microsoft",
            GpuVendor::MsWarp => "ms warp",
            GpuVendor::Arm => "arm",
            GpuVendor::Qualcomm => "qualcomm",
            GpuVendor::Mozilla => "mozilla",
            GpuVendor::Webkit => "webkit",
        }
    }

    /// Case-sensitive lookup; anything unmatched is [`GpuVendor::Unknown`].
    pub fn from_vendor_str(s: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|vendor| vendor.as_str() == s)
            .unwrap_or(GpuVendor::Unknown)
    }

    /// Map a PCI vendor id, as reported by adapters, to a vendor.
    pub fn from_pci_id(id: u32) -> Self {
        match id {
            0x10DE => GpuVendor::Nvidia,
            0x1002 | 0x1022 => GpuVendor::Amd,
            0x8086 => GpuVendor::Intel,
            0x1010 => GpuVendor::ImaginationTechnologies,
            0x106B => GpuVendor::Apple,
            0x13B5 => GpuVendor::Arm,
            0x5143 => GpuVendor::Qualcomm,
            0x1414 => GpuVendor::MsSoftware,
            _ => GpuVendor::Unknown,
        }
    }
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        let v1 = DriverVersion::new(1, 0, 0, 0);
        let v2 = DriverVersion::new(1, 1, 0, 0);
        let v3 = DriverVersion::new(1, 1, 1, 0);
        let v4 = DriverVersion::new(1, 1, 1, 1);

        assert!(v1.is_older_than(&v2));
        assert!(v2.is_older_than(&v3));
        assert!(v3.is_older_than(&v4));
        assert!(!v4.is_older_than(&v1));
        assert!(!v1.is_older_than(&v1));
    }

    #[test]
    fn test_version_string_round_trip() {
        let v = DriverVersion::new(331, 82, 4, 1);
        assert_eq!(v.to_string(), "331.82.4.1");
        assert_eq!(DriverVersion::from_string(&v.to_string()), v);
    }

    #[test]
    fn test_version_partial_parse() {
        assert_eq!(DriverVersion::from_string("10.2"), DriverVersion::new(10, 2, 0, 0));
        assert_eq!(DriverVersion::from_string(""), DriverVersion::default());
        assert_eq!(DriverVersion::from_string("3.x.7"), DriverVersion::new(3, 0, 7, 0));
        let parsed: DriverVersion = "1.2.3.4".parse().unwrap();
        assert_eq!(parsed, DriverVersion::new(1, 2, 3, 4));
    }

    #[test]
    fn test_vendor_round_trip() {
        for vendor in GpuVendor::ALL.iter().skip(1) {
            assert_eq!(GpuVendor::from_vendor_str(vendor.as_str()), *vendor);
        }
    }

    #[test]
    fn test_vendor_lookup_is_case_sensitive() {
        assert_eq!(GpuVendor::from_vendor_str("NVIDIA"), GpuVendor::Unknown);
        assert_eq!(GpuVendor::from_vendor_str("nvidia"), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_str("3dfx"), GpuVendor::Unknown);
    }

    #[test]
    fn test_pci_ids() {
        assert_eq!(GpuVendor::from_pci_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_pci_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_pci_id(0xFFFF), GpuVendor::Unknown);
    }
}
