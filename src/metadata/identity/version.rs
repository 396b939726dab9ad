//! Four-part assembly version numbers.

use std::{fmt, str::FromStr};

use crate::{error::malformed_error, Error};

/// A .NET assembly version: four 16-bit components `major.minor.build.revision`.
///
/// Versions order lexicographically over the four components; the runtime context's
/// loaded-assembly table deliberately ignores them (version-agnostic keying), while
/// the signature comparer consults them according to its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Significant API changes, breaking compatibility
    pub major: u16,
    /// Feature additions, backward compatible
    pub minor: u16,
    /// Bug fixes and minor updates
    pub build: u16,
    /// Emergency patches and hotfixes
    pub revision: u16,
}

impl AssemblyVersion {
    /// Create a version from its four components
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = [0u16; 4];
        let mut count = 0;

        for part in s.split('.') {
            if count == 4 {
                return Err(malformed_error!("Version has more than 4 components - {}", s));
            }
            components[count] = part
                .trim()
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component - {}", part))?;
            count += 1;
        }

        if count == 0 {
            return Err(malformed_error!("Empty version string"));
        }

        Ok(AssemblyVersion {
            major: components[0],
            minor: components[1],
            build: components[2],
            revision: components[3],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let version: AssemblyVersion = "4.0.30319.42000".parse().unwrap();
        assert_eq!(version, AssemblyVersion::new(4, 0, 30319, 42000));
    }

    #[test]
    fn test_parse_short() {
        let version: AssemblyVersion = "2.1".parse().unwrap();
        assert_eq!(version, AssemblyVersion::new(2, 1, 0, 0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("1.2.3.4.5".parse::<AssemblyVersion>().is_err());
        assert!("a.b".parse::<AssemblyVersion>().is_err());
        assert!("".parse::<AssemblyVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        let old: AssemblyVersion = "1.0.0.0".parse().unwrap();
        let new: AssemblyVersion = "1.0.0.1".parse().unwrap();
        assert!(old < new);
        assert!("2.0.0.0".parse::<AssemblyVersion>().unwrap() > new);
    }

    #[test]
    fn test_display_round_trip() {
        let version = AssemblyVersion::new(4, 2, 1, 0);
        assert_eq!(version.to_string(), "4.2.1.0");
        assert_eq!(version.to_string().parse::<AssemblyVersion>().unwrap(), version);
    }
}
