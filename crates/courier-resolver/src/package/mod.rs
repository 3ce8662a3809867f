// Package model
//
// Packages, the links between them, and the adapters that build them from
// catalog documents and host discovery records.

mod link;
mod loader;
#[allow(clippy::module_inception)]
mod package;

pub use link::{Link, LinkType};
pub use loader::{InstalledUnit, License, PackageData, HOST_UNIT_TYPE, SYNTHETIC_VERSION};
pub(crate) use loader::qualify;
pub use package::{Package, DEFAULT_TYPE, PLATFORM_TYPE};
