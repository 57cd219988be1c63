use uuid::Uuid;

use crate::Result;

use super::Store;

#[derive(Clone, Debug)]
pub struct SledDb {
    inner: sled::Db,
}

impl SledDb {
    /// Opens (or creates) the database at the default `./db` location.
    pub fn new() -> Result<Self> {
        Self::open("./db")
    }

    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let inner = sled::Config::default().path(path).open()?;
        Ok(Self { inner })
    }

    /// Database living only as long as the handle, removed on drop.
    pub fn temporary() -> Result<Self> {
        let inner = sled::Config::default().temporary(true).open()?;
        Ok(Self { inner })
    }

    pub fn clear_at(&self, collection: &str) -> Result<()> {
        let tree = self.inner.open_tree(collection)?;
        tree.clear()?;
        Ok(())
    }

    /// Flushes dirty buffers to disk.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl Store for SledDb {
    fn get_raw(&self, collection: &str, id: Uuid) -> Result<Option<Vec<u8>>> {
        let tree = self.inner.open_tree(collection)?;
        Ok(tree.get(id.as_bytes())?.map(|v| v.to_vec()))
    }

    fn set_raw(&self, collection: &str, id: Uuid, bytes: Vec<u8>) -> Result<()> {
        let tree = self.inner.open_tree(collection)?;
        tree.insert(id.as_bytes(), bytes)?;
        Ok(())
    }

    fn remove_raw(&self, collection: &str, id: Uuid) -> Result<()> {
        let tree = self.inner.open_tree(collection)?;
        tree.remove(id.as_bytes())?;
        Ok(())
    }

    fn collection_raw(&self, collection: &str) -> Result<Vec<Vec<u8>>> {
        let tree = self.inner.open_tree(collection)?;
        let mut out = Vec::new();
        for entry in tree.iter() {
            let (_, value) = entry?;
            out.push(value.to_vec());
        }
        Ok(out)
    }
}
