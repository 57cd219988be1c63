mod memory;
#[cfg(feature = "sled")]
mod sled;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ErrorKind, Result};

pub use memory::MemoryDb;
#[cfg(feature = "sled")]
pub use self::sled::SledDb as Database;

pub trait Identifiable {
    fn get_id(&self) -> Uuid;
}

pub trait Collectable {
    fn get_collection_name() -> &'static str;
}

/// Raw key-value storage backing payments and orders.
///
/// Kept object safe so the checkout flow can hold any backend behind an
/// `Arc<dyn Store>`; typed access goes through [`StoreExt`].
pub trait Store: Send + Sync {
    fn get_raw(&self, collection: &str, id: Uuid) -> Result<Option<Vec<u8>>>;
    fn set_raw(&self, collection: &str, id: Uuid, bytes: Vec<u8>) -> Result<()>;
    fn remove_raw(&self, collection: &str, id: Uuid) -> Result<()>;
    /// Returns all values stored in the collection, in no particular order.
    fn collection_raw(&self, collection: &str) -> Result<Vec<Vec<u8>>>;
}

/// Typed access on top of any [`Store`].
pub trait StoreExt: Store {
    /// Gets an item from the collection defined for the item type.
    fn get<T: DeserializeOwned + Collectable>(&self, id: Uuid) -> Result<T> {
        match self.get_raw(T::get_collection_name(), id)? {
            Some(bytes) => decode(&bytes),
            None => Err(ErrorKind::NotFound(format!(
                "entity with id '{}' not found in collection {}",
                id,
                T::get_collection_name()
            ))
            .into()),
        }
    }

    fn set<T: Serialize + Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        self.set_raw(T::get_collection_name(), value.get_id(), encode(value)?)
    }

    fn remove<T: Identifiable + Collectable>(&self, value: &T) -> Result<()> {
        self.remove_raw(T::get_collection_name(), value.get_id())
    }

    fn get_collection<T: DeserializeOwned + Collectable>(&self) -> Result<Vec<T>> {
        self.collection_raw(T::get_collection_name())?
            .iter()
            .map(|bytes| decode(bytes))
            .collect()
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let t: T = pot::from_slice(bytes)?;
    Ok(t)
}

pub fn encode<T: serde::Serialize>(item: &T) -> Result<Vec<u8>> {
    let bytes = pot::to_vec(item)?;
    Ok(bytes)
}
