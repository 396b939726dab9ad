//! Target runtime identities and the runtime prober.
//!
//! A module's metadata does not name its runtime directly; the prober infers it
//! from three signals, in increasing precision: the assembly definition itself
//! (when the module *is* a corlib), the referenced corlib versions, and the
//! `TargetFrameworkAttribute` moniker on the assembly row. Resolvers use the
//! probed [`TargetRuntime`] to pick their probing strategy and the expected
//! corlib identity.

use std::fmt;

use crate::{
    file::parser::Parser,
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion, StrongName},
        model::{CilAssembly, CilModule, CustomAttributeCtor, MemberRefParent, TypeDefOrRef},
    },
};

/// Public key token of `mscorlib` and the classic framework libraries
const MSCORLIB_TOKEN: u64 = 0xB77A_5C56_1934_E089;
/// Public key token of `netstandard` and `System.Runtime`
const NETSTANDARD_TOKEN: u64 = 0xCC7B_13FF_CD2D_DD51;
/// Public key token of `System.Private.CoreLib`
const CORELIB_TOKEN: u64 = 0x7CEC_85D7_BEA7_798E;

/// The runtime family a module targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFamily {
    /// The classic .NET Framework
    NetFramework,
    /// The .NET Standard contract surface
    NetStandard,
    /// .NET Core and .NET 5+
    NetCoreApp,
}

impl RuntimeFamily {
    /// Ordering used when corlib signals from different families conflict;
    /// the more specific family wins.
    fn rank(self) -> u8 {
        match self {
            RuntimeFamily::NetFramework => 0,
            RuntimeFamily::NetStandard => 1,
            RuntimeFamily::NetCoreApp => 2,
        }
    }
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFamily::NetFramework => f.write_str(".NETFramework"),
            RuntimeFamily::NetStandard => f.write_str(".NETStandard"),
            RuntimeFamily::NetCoreApp => f.write_str(".NETCoreApp"),
        }
    }
}

/// A runtime family plus version, e.g. `.NETCoreApp,Version=v3.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetRuntime {
    /// The runtime family
    pub family: RuntimeFamily,
    /// The runtime version; only major/minor are meaningful
    pub version: AssemblyVersion,
}

impl TargetRuntime {
    /// A .NET Framework target
    #[must_use]
    pub fn net_framework(major: u16, minor: u16) -> Self {
        TargetRuntime {
            family: RuntimeFamily::NetFramework,
            version: AssemblyVersion::new(major, minor, 0, 0),
        }
    }

    /// A .NET Standard target
    #[must_use]
    pub fn net_standard(major: u16, minor: u16) -> Self {
        TargetRuntime {
            family: RuntimeFamily::NetStandard,
            version: AssemblyVersion::new(major, minor, 0, 0),
        }
    }

    /// A .NET Core / .NET 5+ target
    #[must_use]
    pub fn net_core(major: u16, minor: u16) -> Self {
        TargetRuntime {
            family: RuntimeFamily::NetCoreApp,
            version: AssemblyVersion::new(major, minor, 0, 0),
        }
    }

    /// The identity callers assume when probing fails completely
    #[must_use]
    pub fn fallback() -> Self {
        TargetRuntime::net_framework(4, 0)
    }

    /// Parse a framework moniker such as `.NETCoreApp,Version=v3.1`
    #[must_use]
    pub fn parse_moniker(moniker: &str) -> Option<Self> {
        let mut parts = moniker.split(',');
        let family = match parts.next()?.trim() {
            ".NETFramework" => RuntimeFamily::NetFramework,
            ".NETStandard" => RuntimeFamily::NetStandard,
            ".NETCoreApp" => RuntimeFamily::NetCoreApp,
            _ => return None,
        };

        for part in parts {
            let part = part.trim();
            if let Some(version) = part.strip_prefix("Version=v") {
                let version: AssemblyVersion = version.parse().ok()?;
                return Some(TargetRuntime { family, version });
            }
        }

        None
    }

    /// Format the framework moniker for this target
    #[must_use]
    pub fn moniker(&self) -> String {
        format!(
            "{},Version=v{}.{}",
            self.family, self.version.major, self.version.minor
        )
    }

    /// Returns true when `name` is one of the known corlib assembly names
    #[must_use]
    pub fn is_known_corlib(name: &str) -> bool {
        matches!(
            name,
            "mscorlib" | "netstandard" | "System.Runtime" | "System.Private.CoreLib"
        )
    }

    /// The expected implementation corlib identity for this runtime
    #[must_use]
    pub fn corlib_identity(&self) -> AssemblyIdentity {
        match self.family {
            RuntimeFamily::NetFramework => {
                let version = if self.version.major >= 4 {
                    AssemblyVersion::new(4, 0, 0, 0)
                } else if self.version.major >= 2 {
                    AssemblyVersion::new(2, 0, 0, 0)
                } else {
                    AssemblyVersion::new(1, 0, 3300, 0)
                };
                AssemblyIdentity::new("mscorlib", version)
                    .with_strong_name(StrongName::Token(MSCORLIB_TOKEN))
            }
            RuntimeFamily::NetStandard => AssemblyIdentity::new(
                "netstandard",
                AssemblyVersion::new(self.version.major, self.version.minor, 0, 0),
            )
            .with_strong_name(StrongName::Token(NETSTANDARD_TOKEN)),
            RuntimeFamily::NetCoreApp => {
                let version = if self.version.major >= 5 {
                    AssemblyVersion::new(self.version.major, 0, 0, 0)
                } else {
                    AssemblyVersion::new(4, 0, 0, 0)
                };
                AssemblyIdentity::new("System.Private.CoreLib", version)
                    .with_strong_name(StrongName::Token(CORELIB_TOKEN))
            }
        }
    }

    /// Map a known-corlib identity to the runtime it implies.
    ///
    /// `mscorlib` versions map to framework versions directly, `netstandard` to
    /// standard versions, `System.Private.CoreLib` to core 1.0, and
    /// `System.Runtime` by its version quadruple; any `System.Runtime` major of
    /// 5 or above is .NET `major.minor` itself.
    #[must_use]
    pub fn from_corlib(identity: &AssemblyIdentity) -> Option<Self> {
        let version = identity.version;
        match identity.name.as_str() {
            "mscorlib" => Some(TargetRuntime::net_framework(version.major, version.minor)),
            "netstandard" => Some(TargetRuntime::net_standard(version.major, version.minor)),
            "System.Private.CoreLib" => Some(TargetRuntime::net_core(1, 0)),
            "System.Runtime" => {
                if version.major >= 5 {
                    return Some(TargetRuntime::net_core(version.major, version.minor));
                }
                match (version.major, version.minor, version.build, version.revision) {
                    (4, 0, 0, 0) => Some(TargetRuntime::net_standard(1, 2)),
                    (4, 0, 10, 0) => Some(TargetRuntime::net_standard(1, 3)),
                    (4, 0, 20, 0) => Some(TargetRuntime::net_standard(1, 5)),
                    (4, 1, 0, 0) => Some(TargetRuntime::net_core(1, 0)),
                    (4, 1, 1, 0) => Some(TargetRuntime::net_core(1, 1)),
                    (4, 2, 0, 0) => Some(TargetRuntime::net_core(2, 0)),
                    (4, 2, 1, 0) => Some(TargetRuntime::net_core(3, 0)),
                    (4, 2, 2, 0) => Some(TargetRuntime::net_core(3, 1)),
                    _ => Some(TargetRuntime::net_standard(2, 0)),
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for TargetRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.moniker())
    }
}

/// Infers the runtime a module targets from its metadata.
pub struct RuntimeProber;

impl RuntimeProber {
    /// Probe an assembly: its own identity, its manifest module's corlib
    /// references, and its `TargetFrameworkAttribute`.
    ///
    /// Returns `None` when no signal was found; callers fall back to
    /// [`TargetRuntime::fallback`].
    #[must_use]
    pub fn probe_assembly(assembly: &CilAssembly) -> Option<TargetRuntime> {
        let mut best = TargetRuntime::from_corlib(&assembly.identity);

        if let Some(module) = assembly.manifest_module() {
            best = Self::merge_reference_signals(&module, best);
        }

        Self::apply_target_framework_attribute(assembly, best)
    }

    /// Probe a module; modules detached from an assembly use reference signals
    /// only.
    #[must_use]
    pub fn probe_module(module: &CilModule) -> Option<TargetRuntime> {
        match module.assembly() {
            Some(assembly) => Self::probe_assembly(&assembly),
            None => Self::merge_reference_signals(module, None),
        }
    }

    /// Walk the assembly-reference table for known-corlib names
    fn merge_reference_signals(
        module: &CilModule,
        mut best: Option<TargetRuntime>,
    ) -> Option<TargetRuntime> {
        for reference in module.assembly_refs() {
            if let Some(candidate) = TargetRuntime::from_corlib(&reference.identity) {
                best = Some(Self::better(best, candidate));
            }
        }
        best
    }

    /// Prefer the more specific family; within a family, the higher version
    fn better(best: Option<TargetRuntime>, candidate: TargetRuntime) -> TargetRuntime {
        let Some(best) = best else {
            return candidate;
        };

        if candidate.family == best.family {
            if candidate.version > best.version {
                candidate
            } else {
                best
            }
        } else if candidate.family.rank() > best.family.rank() {
            candidate
        } else {
            best
        }
    }

    /// Walk the assembly's custom attributes for `TargetFrameworkAttribute`
    /// and prefer its moniker version when the family agrees and the version
    /// is higher.
    fn apply_target_framework_attribute(
        assembly: &CilAssembly,
        best: Option<TargetRuntime>,
    ) -> Option<TargetRuntime> {
        let mut best = best;

        for attribute in assembly.custom_attributes() {
            let CustomAttributeCtor::MemberRef(member_ref) = &attribute.constructor else {
                continue;
            };
            let MemberRefParent::Type(TypeDefOrRef::Reference(declaring)) = &member_ref.parent
            else {
                continue;
            };
            if !declaring.is_type_of(
                Some("System.Runtime.Versioning"),
                "TargetFrameworkAttribute",
            ) {
                continue;
            }

            let Some(candidate) = Self::read_moniker_argument(&attribute.blob) else {
                continue;
            };

            best = Some(match best {
                None => candidate,
                Some(best) => {
                    // Never lower an already-found version
                    if candidate.family == best.family && candidate.version > best.version {
                        candidate
                    } else {
                        best
                    }
                }
            });
        }

        best
    }

    /// Decode the first serialized string argument of a CA blob (after the
    /// 2-byte prologue) as a framework moniker
    fn read_moniker_argument(blob: &[u8]) -> Option<TargetRuntime> {
        let mut parser = Parser::new(blob);
        if parser.read_le::<u16>().ok()? != 0x0001 {
            return None;
        }

        let moniker = parser.read_ser_string().ok()??;
        TargetRuntime::parse_moniker(&moniker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_moniker() {
        assert_eq!(
            TargetRuntime::parse_moniker(".NETCoreApp,Version=v3.1"),
            Some(TargetRuntime::net_core(3, 1))
        );
        assert_eq!(
            TargetRuntime::parse_moniker(".NETFramework,Version=v4.8"),
            Some(TargetRuntime::net_framework(4, 8))
        );
        assert_eq!(
            TargetRuntime::parse_moniker(".NETStandard,Version=v2.0"),
            Some(TargetRuntime::net_standard(2, 0))
        );
        assert_eq!(TargetRuntime::parse_moniker("Silverlight,Version=v5.0"), None);
        assert_eq!(TargetRuntime::parse_moniker(".NETCoreApp"), None);
    }

    #[test]
    fn test_moniker_round_trip() {
        let runtime = TargetRuntime::net_core(6, 0);
        assert_eq!(
            TargetRuntime::parse_moniker(&runtime.moniker()),
            Some(runtime)
        );
    }

    #[test]
    fn test_corlib_identities() {
        let framework = TargetRuntime::net_framework(4, 8).corlib_identity();
        assert_eq!(framework.name, "mscorlib");
        assert_eq!(framework.version, AssemblyVersion::new(4, 0, 0, 0));
        assert_eq!(framework.public_key_token(), Some(MSCORLIB_TOKEN));

        let core = TargetRuntime::net_core(3, 1).corlib_identity();
        assert_eq!(core.name, "System.Private.CoreLib");
        assert_eq!(core.public_key_token(), Some(CORELIB_TOKEN));

        let standard = TargetRuntime::net_standard(2, 0).corlib_identity();
        assert_eq!(standard.name, "netstandard");
        assert_eq!(standard.version, AssemblyVersion::new(2, 0, 0, 0));
    }

    #[test]
    fn test_from_corlib_system_runtime_quadruples() {
        let runtime_ref = AssemblyIdentity::new("System.Runtime", AssemblyVersion::new(4, 2, 1, 0));
        assert_eq!(
            TargetRuntime::from_corlib(&runtime_ref),
            Some(TargetRuntime::net_core(3, 0))
        );

        let net6 = AssemblyIdentity::new("System.Runtime", AssemblyVersion::new(6, 0, 0, 0));
        assert_eq!(
            TargetRuntime::from_corlib(&net6),
            Some(TargetRuntime::net_core(6, 0))
        );

        let unknown = AssemblyIdentity::new("System.Xml", AssemblyVersion::new(4, 0, 0, 0));
        assert_eq!(TargetRuntime::from_corlib(&unknown), None);
    }

    #[test]
    fn test_better_prefers_specific_family_then_version() {
        let framework = TargetRuntime::net_framework(4, 0);
        let core_old = TargetRuntime::net_core(3, 0);
        let core_new = TargetRuntime::net_core(3, 1);

        assert_eq!(RuntimeProber::better(Some(framework), core_old), core_old);
        assert_eq!(RuntimeProber::better(Some(core_new), core_old), core_new);
        assert_eq!(RuntimeProber::better(Some(core_old), framework), core_old);
        assert_eq!(RuntimeProber::better(None, framework), framework);
    }
}
