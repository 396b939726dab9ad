// Copyright 2025-2026 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(dead_code)]
#![deny(unsafe_code)]

//! # dotresolve
//!
//! A pure-Rust library for modelling .NET assemblies, modules, types, members and
//! blob signatures (ECMA-335), and for resolving cross-assembly references to their
//! definitions inside a bounded runtime context - without Windows or the .NET
//! runtime.
//!
//! # Architecture
//!
//! The library is organized into layers that mirror how the runtime itself looks
//! things up:
//!
//! - **Blob Layer**: positional readers and writers for the compressed encodings
//!   signatures live in
//! - **Identity Layer**: byte-exact assembly names, versions and strong names,
//!   with the SHA-1 public-key-token derivation
//! - **Entity Model**: definitions (assembly, module, type, member), references,
//!   exported-type forwarders and type specifications
//! - **Signature Layer**: the type-expression tree of §II.23.2 with injected
//!   resolvers, tolerant parsing and symmetric encoding
//! - **Resolution Layer**: the runtime context with its loaded-assembly table,
//!   type cache, assembly resolvers for both runtime families, and the
//!   reference-to-definition lookup algorithms
//!
//! ## Key Components
//!
//! - [`crate::metadata::context::RuntimeContext`] - the analysis-time analogue of
//!   a process's loader state
//! - [`crate::metadata::model`] - the metadata entity model
//! - [`crate::metadata::signatures`] - blob signature parsing and encoding
//! - [`crate::metadata::comparer::SignatureComparer`] - structural equality with
//!   configurable version strictness
//! - [`crate::metadata::probing`] - GAC, shared-framework and bundle probing
//!
//! # Error Handling
//!
//! Recoverable resolution outcomes are statuses, not panics or unwinding: every
//! resolution entry point returns [`ResolutionResult`] whose error side is the
//! [`ResolutionError`] taxonomy (assembly not found, type not found, circular
//! scope, ...). Blob-level problems are reported to an injected listener while
//! parsing substitutes typed placeholders and carries on. The crate-level
//! [`Error`] covers parse failures, identity errors and programmer errors such
//! as importing an invalid placeholder.
//!
//! # Example
//!
//! ```rust,ignore
//! use dotresolve::prelude::*;
//! use std::sync::Arc;
//!
//! // Attach an assembly to a fresh context for .NET Framework 4.0 and
//! // resolve a type reference against it.
//! let context = RuntimeContext::new(
//!     TargetRuntime::net_framework(4, 0),
//!     reader,
//!     file_service,
//! );
//! context.add_assembly(&assembly)?;
//!
//! let resolved = context.resolve_type(&reference.into(), Some(&module))?;
//! assert!(resolved.is_type_of(Some("System"), "Object"));
//! # Ok::<(), dotresolve::Error>(())
//! ```

pub(crate) mod error;
pub mod file;
pub mod metadata;
pub mod prelude;

pub use error::{Error, ResolutionError, ResolutionResult};

/// Crate-wide result alias over [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
