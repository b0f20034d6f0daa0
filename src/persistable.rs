//! 持久化绑定模块
//!
//! [`Persistable`] 将命名集合与注入的数据库句柄绑定，是实体与集合容器的
//! 公共底座；[`Operate`] 是附着在绑定上的条件跟踪助手，记录最近一次使用的
//! 查询条件并以显式的操作符方法对该条件下发就地更新。

use crate::db::Db;
use crate::error::{DocDbError, DocDbResult};
use crate::types::{Criteria, DataValue, UpdateOperation};

/// 条件跟踪助手
///
/// 主键简写在记录时规范化为主键等值条件。更新操作符为显式方法，
/// 每个方法针对最近记录的条件下发一次就地更新，返回匹配文档数量。
#[derive(Debug, Clone)]
pub struct Operate {
    db: Db,
    collection: String,
    criteria: Option<Criteria>,
}

impl Operate {
    fn new(db: Db, collection: &str) -> Self {
        Self {
            db,
            collection: collection.to_string(),
            criteria: None,
        }
    }

    /// 记录最近一次使用的查询条件
    pub fn set_criteria(&mut self, criteria: impl Into<Criteria>) {
        self.criteria = Some(criteria.into());
    }

    /// 最近记录的查询条件
    pub fn last_criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    async fn apply(&self, operation: UpdateOperation) -> DocDbResult<u64> {
        let criteria = self.criteria.clone().ok_or_else(|| DocDbError::QueryError {
            message: format!("集合 {} 未记录查询条件，无法应用更新操作", self.collection),
        })?;
        let store = self.db.store().await?;
        store
            .update_many(&self.collection, &criteria, &[operation])
            .await
    }

    /// 对最近条件设置字段值
    pub async fn set(&self, field: &str, value: impl Into<DataValue>) -> DocDbResult<u64> {
        self.apply(UpdateOperation::set(field, value)).await
    }

    /// 对最近条件移除字段
    pub async fn unset(&self, field: &str) -> DocDbResult<u64> {
        self.apply(UpdateOperation::unset(field)).await
    }

    /// 对最近条件递增数值字段
    pub async fn inc(&self, field: &str, amount: i64) -> DocDbResult<u64> {
        self.apply(UpdateOperation::increment(field, amount)).await
    }

    /// 对最近条件向数组字段追加元素
    pub async fn push(&self, field: &str, value: impl Into<DataValue>) -> DocDbResult<u64> {
        self.apply(UpdateOperation::push(field, value)).await
    }

    /// 对最近条件从数组字段移除元素
    pub async fn pull(&self, field: &str, value: impl Into<DataValue>) -> DocDbResult<u64> {
        self.apply(UpdateOperation::pull(field, value)).await
    }
}

/// 持久化基础绑定
///
/// 未绑定集合的对象不能执行任何存储操作。
#[derive(Debug, Clone, Default)]
pub struct Persistable {
    db: Option<Db>,
    collection: Option<String>,
    operate: Option<Operate>,
}

impl Persistable {
    /// 创建未绑定的底座
    pub fn unbound() -> Self {
        Self::default()
    }

    /// 绑定命名集合与数据库句柄，并附着条件跟踪助手
    pub fn bind_collection(&mut self, db: Db, collection: &str) {
        self.operate = Some(Operate::new(db.clone(), collection));
        self.db = Some(db);
        self.collection = Some(collection.to_string());
    }

    /// 是否已绑定集合
    pub fn is_bound(&self) -> bool {
        self.db.is_some() && self.collection.is_some()
    }

    /// 绑定的集合名
    pub fn collection_name(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// 绑定的数据库句柄
    pub fn db(&self) -> Option<&Db> {
        self.db.as_ref()
    }

    /// 条件跟踪助手
    pub fn operate(&self) -> Option<&Operate> {
        self.operate.as_ref()
    }

    /// 可变的条件跟踪助手
    pub fn operate_mut(&mut self) -> Option<&mut Operate> {
        self.operate.as_mut()
    }

    /// 取得绑定的句柄与集合名，未绑定时返回错误
    pub(crate) fn bound(&self, type_name: &str) -> DocDbResult<(&Db, &str)> {
        match (&self.db, &self.collection) {
            (Some(db), Some(name)) => Ok((db, name.as_str())),
            _ => Err(DocDbError::NotBound {
                type_name: type_name.to_string(),
            }),
        }
    }

    /// 释放底层连接，配置保留，后续操作按需重建
    pub fn sleep(&self) {
        if let Some(db) = &self.db {
            db.sleep();
        }
    }

    /// 重新建立底层连接
    pub async fn wakeup(&self) -> DocDbResult<()> {
        match &self.db {
            Some(db) => db.wakeup().await,
            None => Err(DocDbError::NotBound {
                type_name: "Persistable".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, ObjectId, PRIMARY_KEY_FIELD};

    fn bound_persistable(collection: &str) -> (Db, Persistable) {
        let db = Db::memory();
        let mut persistable = Persistable::unbound();
        persistable.bind_collection(db.clone(), collection);
        (db, persistable)
    }

    async fn seed_doc(db: &Db, collection: &str) -> ObjectId {
        let oid = ObjectId::new();
        let mut doc = Document::new();
        doc.insert(PRIMARY_KEY_FIELD.to_string(), oid.clone().into());
        doc.insert("count".to_string(), 1.into());
        doc.insert("tags".to_string(), DataValue::Array(vec!["a".into()]));
        let store = db.store().await.unwrap();
        store.insert_one(collection, &doc).await.unwrap();
        oid
    }

    #[test]
    fn test_bind_and_collection_name() {
        let (_db, persistable) = bound_persistable("things");
        assert!(persistable.is_bound());
        assert_eq!(persistable.collection_name(), Some("things"));
        assert!(persistable.operate().is_some());

        let unbound = Persistable::unbound();
        assert!(!unbound.is_bound());
        let err = unbound.bound("Entity").unwrap_err();
        match err {
            DocDbError::NotBound { type_name } => assert_eq!(type_name, "Entity"),
            other => panic!("意外的错误类型: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_operate_key_shorthand_normalized() {
        let (db, mut persistable) = bound_persistable("op_keys");
        let oid = seed_doc(&db, "op_keys").await;

        let operate = persistable.operate_mut().unwrap();
        operate.set_criteria(oid.clone());
        let conditions = operate.last_criteria().unwrap().clone().into_conditions();
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].field, PRIMARY_KEY_FIELD);

        let matched = operate.set("name", "新名字").await.unwrap();
        assert_eq!(matched, 1);

        let store = db.store().await.unwrap();
        let found = store
            .find_one("op_keys", &Criteria::key(oid))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get("name"), Some(&DataValue::String("新名字".into())));
    }

    #[tokio::test]
    async fn test_operate_inc_push_pull_unset() {
        let (db, mut persistable) = bound_persistable("op_mixed");
        let oid = seed_doc(&db, "op_mixed").await;

        let operate = persistable.operate_mut().unwrap();
        operate.set_criteria(oid.clone());
        operate.inc("count", 4).await.unwrap();
        operate.push("tags", "b").await.unwrap();
        operate.pull("tags", "a").await.unwrap();
        operate.unset("count").await.unwrap();

        let store = db.store().await.unwrap();
        let found = store
            .find_one("op_mixed", &Criteria::key(oid))
            .await
            .unwrap()
            .unwrap();
        assert!(!found.contains_key("count"));
        assert_eq!(
            found.get("tags"),
            Some(&DataValue::Array(vec!["b".into()]))
        );
    }

    #[tokio::test]
    async fn test_operate_requires_recorded_criteria() {
        let (_db, persistable) = bound_persistable("op_none");
        let err = persistable
            .operate()
            .unwrap()
            .set("name", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, DocDbError::QueryError { .. }));
    }

    #[tokio::test]
    async fn test_sleep_wakeup_delegate() {
        let (db, persistable) = bound_persistable("op_sleep");
        let _ = db.store().await.unwrap();
        assert!(db.is_connected());
        persistable.sleep();
        assert!(!db.is_connected());
        persistable.wakeup().await.unwrap();
        assert!(db.is_connected());

        let unbound = Persistable::unbound();
        assert!(unbound.wakeup().await.is_err());
    }
}
