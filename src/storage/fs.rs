//! File system document backend.
//!
//! One bincode file per document:
//!
//! ```text
//! <root>/
//!   projects/<project id>.bin
//!   fragments/<project id>/<fragment id>.bin
//!   states/<state id>.bin
//! ```
//!
//! Ids are escaped into file names. Writes are atomic (write to `.tmp`,
//! fsync, rename) so a crash never leaves a torn document behind.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::documents::{Fragment, ProcessingState, Project};
use super::DocumentStore;
use crate::error::{CartographError, Result};

const EXT: &str = "bin";

/// Storage rooted at a directory (by default `.cartograph/store`).
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Initialize the storage directory tree.
    pub async fn init(root: &Path) -> Result<Self> {
        for dir in ["projects", "fragments", "states"] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn project_path(&self, project_id: &str) -> PathBuf {
        self.root.join("projects").join(file_name(project_id))
    }

    fn fragment_dir(&self, parent_project_id: &str) -> PathBuf {
        self.root.join("fragments").join(escape_id(parent_project_id))
    }

    fn state_path(&self, state_id: &str) -> PathBuf {
        self.root.join("states").join(file_name(state_id))
    }
}

/// Escape an id into a portable file name component. `[A-Za-z0-9.-]` pass
/// through; every other byte becomes `_XX`.
fn escape_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{:02X}", b));
        }
    }
    out
}

fn unescape_id(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn file_name(id: &str) -> String {
    format!("{}.{}", escape_id(id), EXT)
}

async fn write_doc<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let bytes = bincode::serialize(doc).map_err(|e| {
        CartographError::SerializeError(format!("bincode {}: {}", path.display(), e))
    })?;

    // Atomic write: write to .tmp, then rename
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    fs::rename(&tmp_path, path).await?;

    debug!(path = %path.display(), bytes = bytes.len(), "document written");
    Ok(())
}

async fn read_doc<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => {
            let doc = bincode::deserialize(&bytes).map_err(|e| {
                CartographError::ParseError(format!("bincode {}: {}", path.display(), e))
            })?;
            Ok(Some(doc))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_doc(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Ids of every `.bin` document in `dir`, sorted. A missing dir is empty.
async fn list_ids(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(unescape_id)
        {
            ids.push(id);
        }
    }
    ids.sort();
    Ok(ids)
}

async fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut docs = Vec::new();
    for id in list_ids(dir).await? {
        if let Some(doc) = read_doc(&dir.join(file_name(&id))).await? {
            docs.push(doc);
        }
    }
    Ok(docs)
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn put_project(&self, project: &Project) -> Result<()> {
        write_doc(&self.project_path(&project.project_id), project).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        read_doc(&self.project_path(project_id)).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        remove_doc(&self.project_path(project_id)).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        read_all(&self.root.join("projects")).await
    }

    async fn put_fragments(&self, fragments: &[Fragment]) -> Result<()> {
        for fragment in fragments {
            let dir = self.fragment_dir(&fragment.parent_project_id);
            fs::create_dir_all(&dir).await?;
            write_doc(&dir.join(file_name(&fragment.fragment_id)), fragment).await?;
        }
        Ok(())
    }

    async fn get_fragments(
        &self,
        parent_project_id: &str,
        fragment_ids: &[String],
    ) -> Result<Vec<Fragment>> {
        let dir = self.fragment_dir(parent_project_id);
        let mut fragments = Vec::with_capacity(fragment_ids.len());
        for id in fragment_ids {
            if let Some(fragment) = read_doc(&dir.join(file_name(id))).await? {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    async fn list_fragment_ids(&self, parent_project_id: &str) -> Result<Vec<String>> {
        list_ids(&self.fragment_dir(parent_project_id)).await
    }

    async fn delete_fragments(
        &self,
        parent_project_id: &str,
        fragment_ids: &[String],
    ) -> Result<usize> {
        let dir = self.fragment_dir(parent_project_id);
        let mut removed = 0;
        for id in fragment_ids {
            if remove_doc(&dir.join(file_name(id))).await? {
                removed += 1;
            }
        }
        if list_ids(&dir).await?.is_empty() {
            // Leftover .tmp files are not documents; ignore failures here.
            let _ = fs::remove_dir_all(&dir).await;
        }
        Ok(removed)
    }

    async fn put_state(&self, state: &ProcessingState) -> Result<()> {
        write_doc(&self.state_path(&state.id), state).await
    }

    async fn get_state(&self, state_id: &str) -> Result<Option<ProcessingState>> {
        read_doc(&self.state_path(state_id)).await
    }

    async fn list_states(&self) -> Result<Vec<ProcessingState>> {
        read_all(&self.root.join("states")).await
    }

    async fn delete_state(&self, state_id: &str) -> Result<bool> {
        remove_doc(&self.state_path(state_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeKind};
    use tempfile::tempdir;

    #[test]
    fn test_escape_roundtrip() {
        for id in ["v1::bin/Shop.Core.dll", "p#g2#0", "plain-id.1", "ünï_code"] {
            let escaped = escape_id(id);
            assert!(!escaped.contains('/'));
            assert!(!escaped.contains('#'));
            assert_eq!(unescape_id(&escaped).as_deref(), Some(id));
        }
    }

    #[tokio::test]
    async fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FsStore::init(dir.path()).await.unwrap();

        let mut project = Project::new("Shop/Core", "Shop.Core");
        project
            .nodes
            .push(Node::new("c1", "Order", "Shop.Order", NodeKind::Class));
        store.put_project(&project).await.unwrap();

        let loaded = store.get_project("Shop/Core").await.unwrap().unwrap();
        assert_eq!(loaded, project);
        assert_eq!(store.list_projects().await.unwrap().len(), 1);

        // No .tmp left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("projects"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_documents_are_none() {
        let dir = tempdir().unwrap();
        let store = FsStore::init(dir.path()).await.unwrap();
        assert!(store.get_project("nope").await.unwrap().is_none());
        assert!(store.get_state("nope").await.unwrap().is_none());
        assert!(!store.delete_project("nope").await.unwrap());
        assert!(store.list_fragment_ids("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fragment_listing_and_delete() {
        let dir = tempdir().unwrap();
        let store = FsStore::init(dir.path()).await.unwrap();

        let fragments: Vec<Fragment> = (0..3)
            .map(|i| Fragment {
                fragment_id: format!("p1#g0#{}", i),
                parent_project_id: "p1".into(),
                chunk_index: i,
                total_chunks: 3,
                nodes: Vec::new(),
                edges: Vec::new(),
            })
            .collect();
        store.put_fragments(&fragments).await.unwrap();

        let ids = store.list_fragment_ids("p1").await.unwrap();
        assert_eq!(ids, vec!["p1#g0#0", "p1#g0#1", "p1#g0#2"]);

        let removed = store.delete_fragments("p1", &ids).await.unwrap();
        assert_eq!(removed, 3);
        assert!(!dir.path().join("fragments").join("p1").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_parse_error() {
        let dir = tempdir().unwrap();
        let store = FsStore::init(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("states").join("bad.bin"), b"\x01").unwrap();
        let result = store.get_state("bad").await;
        assert!(matches!(result, Err(CartographError::ParseError(_))));
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refused"))
        }
    }

    #[tokio::test]
    async fn test_unencodable_document_is_serialize_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.bin");
        let result = write_doc(&path, &Unencodable).await;
        assert!(matches!(result, Err(CartographError::SerializeError(_))));
        assert!(!path.exists());
    }
}
