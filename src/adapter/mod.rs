//! 存储适配器模块
//!
//! 提供统一的文档存储操作接口，屏蔽内存存储与MongoDB的实现差异。
//! 所有ODM语义位于该trait之上，适配器只负责忠实执行。

use crate::error::DocDbResult;
use crate::types::{Criteria, Document, UpdateOperation};
use async_trait::async_trait;

mod memory;
#[cfg(feature = "mongodb-support")]
mod mongodb;

pub use memory::MemoryStore;
#[cfg(feature = "mongodb-support")]
pub use mongodb::MongoStore;

/// 文档存储适配器trait，定义统一的存储操作接口
///
/// 所有操作均为非阻塞异步调用；存储层报告的失败原样通过 `Err` 转发，
/// 本层不做分类。"未命中"不是错误：`find_one` 以 `Ok(None)` 表达。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 查找首个匹配文档
    async fn find_one(&self, collection: &str, criteria: &Criteria)
        -> DocDbResult<Option<Document>>;

    /// 查找全部匹配文档
    async fn find(&self, collection: &str, criteria: &Criteria) -> DocDbResult<Vec<Document>>;

    /// 插入单个文档
    async fn insert_one(&self, collection: &str, doc: &Document) -> DocDbResult<()>;

    /// 批量插入文档
    async fn insert_many(&self, collection: &str, docs: &[Document]) -> DocDbResult<()>;

    /// 整体替换首个匹配文档，返回实际替换数量（0或1）
    async fn replace_one(
        &self,
        collection: &str,
        criteria: &Criteria,
        doc: &Document,
    ) -> DocDbResult<u64>;

    /// 对所有匹配文档应用更新操作，返回匹配数量
    async fn update_many(
        &self,
        collection: &str,
        criteria: &Criteria,
        operations: &[UpdateOperation],
    ) -> DocDbResult<u64>;

    /// 删除所有匹配文档，返回删除数量
    async fn delete_many(&self, collection: &str, criteria: &Criteria) -> DocDbResult<u64>;

    /// 统计匹配文档数量
    async fn count(&self, collection: &str, criteria: &Criteria) -> DocDbResult<u64>;
}
