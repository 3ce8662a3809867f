//! Package sources
//!
//! A repository yields fully built [`Package`](crate::package::Package)
//! values. The solver never talks to a repository directly: repositories are
//! loaded into a [`Pool`](crate::solver::Pool) first.

mod array;
mod composite;
mod installed;
mod platform;
mod traits;

pub use array::ArrayRepository;
pub use composite::CompositeRepository;
pub use installed::InstalledRepository;
pub use platform::{is_platform_name, PlatformRepository, DEFAULT_PLATFORM_VERSION};
pub use traits::Repository;
