//! # folio-index
//!
//! Secondary indexes stored alongside the documents they describe.
//!
//! Every container in a folio database may own one [`Index`]. The leaf kinds
//! are:
//!
//! - [`HashIndex`]: key → content hash of the resource the key names (or the
//!   inverse), with auxiliary namespaces filled by supplying indexes
//! - [`KeyedHashIndex`]: a hash index whose key is derived from each item by
//!   a [`KeyMapper`]
//! - [`DictIndex`]: entries maintained by a registered [`DictHook`]
//!
//! [`ContainerIndex`] composes named subindexes. Rebuilds are planned with
//! [`plan`] and written through an [`IndexHost`] with [`apply`].

pub mod dict;
pub mod error;
pub mod ext;
pub mod hash;
pub mod index;
pub mod keyed;
pub mod proxy;
pub mod registry;
pub mod remap;
pub mod update;

pub use dict::DictIndex;
pub use error::{IndexError, IndexResult, IndexUpdateError};
pub use ext::{DictHook, Extensions, MapperFn, SourceItem};
pub use hash::{ContentResolver, HashIndex, Namespace};
pub use index::{ContainerIndex, Index, Match};
pub use keyed::{field_key, KeyMapper, KeyedHashIndex, DEFAULT_KEY_FIELD};
pub use proxy::{AsMapping, KeyProxy, Proxied};
pub use registry::{IndexLocation, IndexRegistry};
pub use remap::LazyRemap;
pub use update::{apply, plan, resolve_supply, IndexHost, UpdateStep};
