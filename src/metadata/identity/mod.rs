//! Assembly identity: names, versions and strong names.
//!
//! The identity layer is the foundation of cross-assembly resolution. It provides
//! byte-exact names, four-part [`AssemblyVersion`] numbers, [`StrongName`] public
//! keys/tokens (with the SHA-1 token derivation of §II.6.3) and the composed
//! [`AssemblyIdentity`] with both the default and the version-agnostic comparison
//! used by the runtime context.

mod assembly;
mod strongname;
mod version;

pub use assembly::{AssemblyFlags, AssemblyIdentity};
pub use strongname::{AssemblyHashAlgorithm, StrongName};
pub use version::AssemblyVersion;
