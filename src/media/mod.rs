//! Media enumeration module
//!
//! # Submodules
//!
//! - `kind` - Classification by extension and container signature
//! - `enumerator` - Lazy, deterministic walk of a device root

pub mod enumerator;
pub mod kind;

pub use enumerator::{
    enumerate, enumerate_path, EnumerationOptions, EnumerationStats, MediaCandidate,
    MediaEnumerator,
};
pub use kind::MediaKind;
