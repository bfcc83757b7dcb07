//! Containers with strongly-typed indices.

mod keyed_vec;

pub use keyed_vec::KeyedVec;
pub use keyed_vec::StorageKey;
