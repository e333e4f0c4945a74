#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

/// Normalized keys
mod slug;
pub use self::slug::Slug;

/// Resolution of document keys against canonical names
mod index;
pub use self::index::{SlugCollision, SlugIndex};
