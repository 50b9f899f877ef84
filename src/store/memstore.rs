//! Simple in-memory store.
//!
//! This implementation has state, so if you create a
//! new instance in a handler(), it will be empty every time.
//!
//! This means you have to create the instance once, and
//! share it between requests.
//!
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use futures_util::{stream, FutureExt, StreamExt};
use parking_lot::Mutex;

use crate::davpath::DavPath;
use crate::locks::DavLock;
use crate::props::Property;
use crate::store::*;

/// Ephemeral in-memory store.
#[derive(Debug)]
pub struct MemStore {
    tree: Mutex<BTreeMap<DavPath, Node>>,
}

#[derive(Debug, Clone)]
struct Node {
    kind: EntityType,
    content: Bytes,
    modified: SystemTime,
    props: Vec<Property>,
    lock: Option<DavLock>,
}

impl Node {
    fn new(kind: EntityType, content: Bytes) -> Node {
        Node {
            kind,
            content,
            modified: SystemTime::now(),
            props: Vec::new(),
            lock: None,
        }
    }

    fn entity(&self, path: &DavPath) -> Entity {
        let size = self.content.len() as u64;
        let etag = match self.kind {
            EntityType::Item => {
                let t = self
                    .modified
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_micros())
                    .unwrap_or(0);
                Some(format!("{:x}-{:x}", size, t))
            }
            EntityType::Collection => None,
        };
        Entity {
            path: path.clone(),
            kind: self.kind,
            size,
            last_modified: self.modified,
            etag,
            lock: self.lock.clone(),
        }
    }
}

type Tree = BTreeMap<DavPath, Node>;

// everything below `path`. Not a range scan: "/a.txt" sorts between
// "/a" and "/a/b".
fn descendants<'t>(tree: &'t Tree, path: &'t DavPath) -> impl Iterator<Item = &'t DavPath> + 't {
    tree.keys().filter(move |p| *p != path && p.starts_with(path))
}

fn children(tree: &Tree, path: &DavPath) -> Vec<DavPath> {
    descendants(tree, path)
        .filter(|p| p.parent() == *path)
        .cloned()
        .collect()
}

fn parent_is_collection(tree: &Tree, path: &DavPath) -> bool {
    matches!(
        tree.get(&path.parent()),
        Some(Node {
            kind: EntityType::Collection,
            ..
        })
    )
}

impl MemStore {
    /// Create a new, empty store. The root collection always exists.
    pub fn new() -> Arc<MemStore> {
        let mut tree = BTreeMap::new();
        tree.insert(
            DavPath::root(),
            Node::new(EntityType::Collection, Bytes::new()),
        );
        Arc::new(MemStore {
            tree: Mutex::new(tree),
        })
    }

    fn with_node<T>(&self, path: &DavPath, f: impl FnOnce(&mut Node) -> T) -> StoreResult<T> {
        let mut tree = self.tree.lock();
        match tree.get_mut(path) {
            Some(node) => Ok(f(node)),
            None => Err(StoreError::NotFound),
        }
    }
}

impl DavStore for MemStore {
    fn exists<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, bool> {
        async move { Ok(self.tree.lock().contains_key(path)) }.boxed()
    }

    fn entity<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, Entity> {
        async move { self.with_node(path, |node| node.entity(path)) }.boxed()
    }

    fn list<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, Vec<DavPath>> {
        async move {
            trace!("MS: list {:?}", path);
            let tree = self.tree.lock();
            match tree.get(path) {
                Some(node) if node.kind == EntityType::Collection => Ok(children(&tree, path)),
                Some(_) => Ok(Vec::new()),
                None => Err(StoreError::NotFound),
            }
        }
        .boxed()
    }

    fn content<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ContentStream<'static>> {
        async move {
            trace!("MS: content {:?}", path);
            let data = self.with_node(path, |node| match node.kind {
                EntityType::Item => Ok(node.content.clone()),
                EntityType::Collection => Err(StoreError::Forbidden),
            })??;
            Ok(Box::pin(stream::once(async move { Ok(data) })) as ContentStream<'static>)
        }
        .boxed()
    }

    fn create_item<'a>(
        &'a self,
        path: &'a DavPath,
        mut content: ContentStream<'a>,
    ) -> StoreFuture<'a, ()> {
        async move {
            trace!("MS: create_item {:?}", path);
            let mut buf = BytesMut::new();
            while let Some(chunk) = content.next().await {
                buf.extend_from_slice(&chunk?);
            }
            let mut tree = self.tree.lock();
            if !parent_is_collection(&tree, path) {
                return Err(StoreError::NotFound);
            }
            match tree.get_mut(path) {
                Some(node) if node.kind == EntityType::Collection => Err(StoreError::Forbidden),
                Some(node) => {
                    node.content = buf.freeze();
                    node.modified = SystemTime::now();
                    Ok(())
                }
                None => {
                    tree.insert(path.clone(), Node::new(EntityType::Item, buf.freeze()));
                    Ok(())
                }
            }
        }
        .boxed()
    }

    fn create_collection<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ()> {
        async move {
            trace!("MS: create_collection {:?}", path);
            let mut tree = self.tree.lock();
            if tree.contains_key(path) {
                return Err(StoreError::Exists);
            }
            if !parent_is_collection(&tree, path) {
                return Err(StoreError::NotFound);
            }
            tree.insert(
                path.clone(),
                Node::new(EntityType::Collection, Bytes::new()),
            );
            Ok(())
        }
        .boxed()
    }

    fn delete<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ()> {
        async move {
            trace!("MS: delete {:?}", path);
            if path.is_root() {
                return Err(StoreError::Forbidden);
            }
            let mut tree = self.tree.lock();
            if tree.remove(path).is_none() {
                return Err(StoreError::NotFound);
            }
            // never leave orphans behind.
            let orphans: Vec<DavPath> = descendants(&tree, path).cloned().collect();
            for p in orphans {
                tree.remove(&p);
            }
            Ok(())
        }
        .boxed()
    }

    fn properties<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, Vec<Property>> {
        async move { self.with_node(path, |node| node.props.clone()) }.boxed()
    }

    fn set_properties<'a>(
        &'a self,
        path: &'a DavPath,
        props: Vec<Property>,
    ) -> StoreFuture<'a, ()> {
        async move {
            trace!("MS: set_properties {:?} ({} props)", path, props.len());
            self.with_node(path, |node| node.props = props)
        }
        .boxed()
    }

    fn lock<'a>(&'a self, path: &'a DavPath, lock: DavLock) -> StoreFuture<'a, Entity> {
        async move {
            trace!("MS: lock {:?} {}", path, lock.token_urn());
            self.with_node(path, |node| {
                node.lock = Some(lock);
                node.entity(path)
            })
        }
        .boxed()
    }

    fn unlock<'a>(&'a self, path: &'a DavPath) -> StoreFuture<'a, ()> {
        async move {
            trace!("MS: unlock {:?}", path);
            self.with_node(path, |node| node.lock = None)
        }
        .boxed()
    }
}
