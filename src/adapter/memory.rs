//! 内存文档存储
//!
//! 进程内的适配器实现，主要服务于单元测试和无外部依赖的本地开发。
//! 语义与MongoDB适配器保持一致：按集合名分桶，文档保持插入顺序。

use crate::error::DocDbResult;
use crate::types::{Criteria, Document, UpdateOperation};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::DocumentStore;

/// 内存存储适配器
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清空指定集合（测试辅助）
    pub fn clear(&self, collection: &str) {
        self.collections.write().remove(collection);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> DocDbResult<Option<Document>> {
        let guard = self.collections.read();
        let found = guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| criteria.matches(doc)).cloned());
        Ok(found)
    }

    async fn find(&self, collection: &str, criteria: &Criteria) -> DocDbResult<Vec<Document>> {
        let guard = self.collections.read();
        let found = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| criteria.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }

    async fn insert_one(&self, collection: &str, doc: &Document) -> DocDbResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc.clone());
        Ok(())
    }

    async fn insert_many(&self, collection: &str, docs: &[Document]) -> DocDbResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(docs.iter().cloned());
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &str,
        criteria: &Criteria,
        doc: &Document,
    ) -> DocDbResult<u64> {
        let mut guard = self.collections.write();
        if let Some(docs) = guard.get_mut(collection) {
            if let Some(existing) = docs.iter_mut().find(|d| criteria.matches(d)) {
                *existing = doc.clone();
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn update_many(
        &self,
        collection: &str,
        criteria: &Criteria,
        operations: &[UpdateOperation],
    ) -> DocDbResult<u64> {
        let mut guard = self.collections.write();
        let mut matched = 0;
        if let Some(docs) = guard.get_mut(collection) {
            for doc in docs.iter_mut().filter(|d| criteria.matches(d)) {
                for op in operations {
                    op.apply_to(doc);
                }
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete_many(&self, collection: &str, criteria: &Criteria) -> DocDbResult<u64> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !criteria.matches(doc));
        Ok((before - docs.len()) as u64)
    }

    async fn count(&self, collection: &str, criteria: &Criteria) -> DocDbResult<u64> {
        let guard = self.collections.read();
        let count = guard
            .get(collection)
            .map(|docs| docs.iter().filter(|doc| criteria.matches(doc)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }
}
