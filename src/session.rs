//! 会话持久化
//!
//! 会话作为普通实体落在专用集合中：主键即会话标识，负载收纳在
//! `data` 对象属性里，过期时间戳由调用方维护。配套的集合容器提供
//! 按时间戳清理过期会话的操作，供外部的周期任务调用。

use std::sync::Arc;

use rat_logger::debug;

use crate::attribute::{integer_attr, object_attr};
use crate::collection::Collection;
use crate::db::Db;
use crate::entity::Entity;
use crate::error::{DocDbError, DocDbResult};
use crate::schema::Schema;
use crate::types::{
    CompareOp, Criteria, DataValue, Document, ObjectId, PRIMARY_KEY_FIELD,
};

/// 默认会话集合名
pub const DEFAULT_SESSIONS_COLLECTION: &str = "_docdb_sessions";

/// 过期时间字段名，Unix 时间戳（秒）
pub const EXPIRES_FIELD: &str = "expires_at";

/// 负载字段名
pub const DATA_FIELD: &str = "data";

/// 会话规格不进注册表：集合名可配置，按实例构建即可
fn session_schema(collection: &str) -> Arc<Schema> {
    Arc::new(
        Schema::new(collection, collection)
            .with_attribute(
                DATA_FIELD,
                object_attr().with_default(DataValue::Object(Document::new())),
            )
            .with_attribute(EXPIRES_FIELD, integer_attr(None, None)),
    )
}

/// 会话实体
///
/// 过期时间不会自动续期，调用方在每次请求时通过
/// [`touch`](Session::touch) 写入新的时间戳。
#[derive(Debug, Clone)]
pub struct Session {
    entity: Entity,
}

impl Session {
    /// 在默认会话集合上创建空会话
    pub fn new(db: Db) -> Self {
        Self::with_collection(db, DEFAULT_SESSIONS_COLLECTION)
    }

    /// 在指定集合上创建空会话
    pub fn with_collection(db: Db, collection: &str) -> Self {
        Self {
            entity: Entity::with_schema(db, session_schema(collection)),
        }
    }

    /// 打开默认集合中指定标识的会话
    pub async fn open(db: Db, key: &ObjectId) -> DocDbResult<Self> {
        Self::open_in(db, DEFAULT_SESSIONS_COLLECTION, key).await
    }

    /// 打开指定集合中指定标识的会话
    ///
    /// 命中即加载；未命中得到携带该主键的新会话，首次
    /// [`save`](Session::save) 时落库。
    pub async fn open_in(db: Db, collection: &str, key: &ObjectId) -> DocDbResult<Self> {
        let mut session = Self::with_collection(db, collection);
        match session.entity.load(key).await {
            Ok(()) => {}
            Err(DocDbError::NotFound { .. }) => {
                session.entity.set(PRIMARY_KEY_FIELD, key.clone())?;
                debug!("会话未命中，准备新建: key={}", key);
            }
            Err(err) => return Err(err),
        }
        Ok(session)
    }

    /// 会话标识
    pub fn key(&self) -> Option<ObjectId> {
        self.entity.key()
    }

    /// 会话是否已落库
    pub fn exists(&self) -> bool {
        self.entity.exists()
    }

    /// 底层实体
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// 可变的底层实体
    pub fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    /// 负载对象
    pub fn data(&self) -> Option<&Document> {
        match self.entity.get(DATA_FIELD) {
            Some(DataValue::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// 整体替换负载对象
    pub fn set_data(&mut self, data: Document) -> DocDbResult<()> {
        self.entity.set(DATA_FIELD, DataValue::Object(data))
    }

    /// 写入负载中的单个键
    pub fn put(&mut self, field: &str, value: impl Into<DataValue>) -> DocDbResult<()> {
        let mut data = match self.entity.get(DATA_FIELD) {
            Some(DataValue::Object(map)) => map.clone(),
            _ => Document::new(),
        };
        data.insert(field.to_string(), value.into());
        self.entity.set(DATA_FIELD, DataValue::Object(data))
    }

    /// 读取负载中的单个键
    pub fn fetch(&self, field: &str) -> Option<&DataValue> {
        self.data().and_then(|data| data.get(field))
    }

    /// 写入新的过期时间戳
    pub fn touch(&mut self, expires_at: i64) -> DocDbResult<()> {
        self.entity.set(EXPIRES_FIELD, expires_at)
    }

    /// 当前过期时间戳
    pub fn expires_at(&self) -> Option<i64> {
        match self.entity.get(EXPIRES_FIELD) {
            Some(DataValue::Int(ts)) => Some(*ts),
            _ => None,
        }
    }

    /// 保存会话：新会话插入，已有会话增量更新
    pub async fn save(&mut self) -> DocDbResult<()> {
        self.entity.update().await
    }

    /// 删除会话记录
    pub async fn delete(&mut self) -> DocDbResult<bool> {
        self.entity.delete().await
    }
}

/// 会话集合容器
#[derive(Debug, Clone)]
pub struct Sessions {
    collection: Collection,
}

impl Sessions {
    /// 绑定到默认会话集合
    pub fn new(db: Db) -> Self {
        Self::with_collection(db, DEFAULT_SESSIONS_COLLECTION)
    }

    /// 绑定到指定会话集合
    pub fn with_collection(db: Db, collection: &str) -> Self {
        Self {
            collection: Collection::new(db, collection),
        }
    }

    /// 底层集合容器
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    /// 可变的底层集合容器
    pub fn collection_mut(&mut self) -> &mut Collection {
        &mut self.collection
    }

    /// 清理过期时间严格早于 `now` 的会话，返回删除数量
    pub async fn sweep_expired(&mut self, now: i64) -> DocDbResult<u64> {
        let removed = self
            .collection
            .remove(Criteria::field_cmp(EXPIRES_FIELD, CompareOp::Lt, now))
            .await?;
        if removed > 0 {
            debug!("清理过期会话: count={}, now={}", removed, now);
        }
        Ok(removed)
    }
}
