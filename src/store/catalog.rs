use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use derive_new::new;

use crate::common::config::PageId;
use crate::error::{KvError, KvResult};

/// Name of the catalog file that sits next to the page directory.
pub const CATALOG_FILE: &str = "KVSTORE";

/// Store metadata persisted across open/close: the path the store was
/// created with, its configured size, and where the tree root currently
/// hangs.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Catalog {
    pub path: String,
    pub max_mem: u64,
    pub root_page_id: PageId,
}

impl Catalog {
    fn file(dir: &Path) -> PathBuf {
        dir.join(CATALOG_FILE)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::file(dir).is_file()
    }

    /// Write the catalog under `dir`: the little-endian fixed fields, then
    /// the path bytes.
    pub fn save(&self, dir: &Path) -> KvResult<()> {
        let mut buf = Vec::with_capacity(20 + self.path.len());
        buf.extend_from_slice(&self.max_mem.to_le_bytes());
        buf.extend_from_slice(&self.root_page_id.to_le_bytes());
        buf.extend_from_slice(&(self.path.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.path.as_bytes());

        let mut file = File::create(Self::file(dir))?;
        file.write_all(&buf)?;
        Ok(())
    }

    /// Read the catalog back; NotFound when no store lives under `dir`.
    pub fn load(dir: &Path) -> KvResult<Catalog> {
        let mut bytes = Vec::new();
        match File::open(Self::file(dir)) {
            Ok(mut file) => {
                file.read_to_end(&mut bytes)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(KvError::NotFound),
            Err(e) => return Err(e.into()),
        }
        if bytes.len() < 20 {
            return Err(KvError::Internal("catalog file is truncated".to_string()));
        }
        let max_mem = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let root_page_id = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let path_len = u32::from_le_bytes(bytes[16..20].try_into().unwrap()) as usize;
        if bytes.len() < 20 + path_len {
            return Err(KvError::Internal("catalog file is truncated".to_string()));
        }
        let path = String::from_utf8(bytes[20..20 + path_len].to_vec())
            .map_err(|_| KvError::Internal("catalog path is not utf-8".to_string()))?;
        Ok(Catalog {
            path,
            max_mem,
            root_page_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    #[test]
    fn test_catalog_round_trip() {
        let dir = TempDir::new("pagekv").unwrap();
        let catalog = Catalog::new("some/store".to_string(), 1 << 20, 17);
        catalog.save(dir.path()).unwrap();

        assert!(Catalog::exists(dir.path()));
        assert_eq!(catalog, Catalog::load(dir.path()).unwrap());
    }

    #[test]
    fn test_catalog_missing() {
        let dir = TempDir::new("pagekv").unwrap();
        assert!(!Catalog::exists(dir.path()));
        assert!(matches!(Catalog::load(dir.path()), Err(KvError::NotFound)));
    }

    #[test]
    fn test_catalog_overwrite() {
        let dir = TempDir::new("pagekv").unwrap();
        Catalog::new(".".to_string(), 1024, 1).save(dir.path()).unwrap();

        let updated = Catalog::new(".".to_string(), 1024, 9);
        updated.save(dir.path()).unwrap();
        assert_eq!(updated, Catalog::load(dir.path()).unwrap());
    }
}
