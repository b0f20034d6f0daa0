//! 实体生命周期模块
//!
//! [`Entity`] 是绑定到命名集合的单文档模型：经过属性规格校验的可变记录，
//! 提供异步的加载、保存、更新与删除操作，并在插入时维护一对多引用的
//! 反向引用级联。
//!
//! 生命周期：构造时预填充各属性默认值，属性经校验的赋值器写入，
//! 插入时缺少主键则自动分配，更新以主键寻址下发增量修改，
//! 删除后存在标志清除。未绑定集合的实体不能执行任何存储操作。

use crate::db::Db;
use crate::error::{DocDbError, DocDbResult};
use crate::persistable::{Operate, Persistable};
use crate::schema::{lookup_schema, require_schema, Schema};
use crate::types::{
    Criteria, DataValue, Document, ObjectId, UpdateOperation, PRIMARY_KEY_FIELD,
};
use rat_logger::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// 单文档实体
#[derive(Debug, Clone)]
pub struct Entity {
    persistable: Persistable,
    schema: Option<Arc<Schema>>,
    attributes: Document,
    pending_unset: HashSet<String>,
    exists: bool,
}

impl Entity {
    /// 创建未绑定的实体
    pub fn unbound() -> Self {
        Self {
            persistable: Persistable::unbound(),
            schema: None,
            attributes: Document::new(),
            pending_unset: HashSet::new(),
            exists: false,
        }
    }

    /// 创建绑定到命名集合的无规格实体，所有字段不经校验直接接受
    pub fn new(db: Db, collection: &str) -> Self {
        let mut entity = Self::unbound();
        entity.persistable.bind_collection(db, collection);
        entity
    }

    /// 创建绑定到模型规格的实体，默认值预填充
    pub fn with_schema(db: Db, schema: Arc<Schema>) -> Self {
        let mut entity = Self::unbound();
        entity.persistable.bind_collection(db, &schema.collection);
        entity.attributes = schema.defaults();
        entity.schema = Some(schema);
        entity
    }

    /// 按已注册的模型名创建实体
    pub fn for_model(db: Db, model: &str) -> DocDbResult<Self> {
        let schema = require_schema(model)?;
        Ok(Self::with_schema(db, schema))
    }

    /// 绑定的集合名
    pub fn collection_name(&self) -> Option<&str> {
        self.persistable.collection_name()
    }

    /// 是否已绑定集合
    pub fn is_bound(&self) -> bool {
        self.persistable.is_bound()
    }

    /// 关联的模型规格
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// 当前属性映射
    pub fn attributes(&self) -> &Document {
        &self.attributes
    }

    /// 读取单个属性值
    pub fn get(&self, field: &str) -> Option<&DataValue> {
        self.attributes.get(field)
    }

    /// 当前主键
    pub fn key(&self) -> Option<ObjectId> {
        match self.attributes.get(PRIMARY_KEY_FIELD) {
            Some(DataValue::ObjectId(oid)) => Some(oid.clone()),
            Some(DataValue::String(s)) => ObjectId::parse_str(s).ok(),
            _ => None,
        }
    }

    /// 记录是否已存在于存储中
    ///
    /// 仅当已经加载/保存过且携带主键时为真。
    pub fn exists(&self) -> bool {
        self.exists && self.attributes.contains_key(PRIMARY_KEY_FIELD)
    }

    /// 条件跟踪助手
    pub fn operate(&self) -> Option<&Operate> {
        self.persistable.operate()
    }

    /// 可变的条件跟踪助手
    pub fn operate_mut(&mut self) -> Option<&mut Operate> {
        self.persistable.operate_mut()
    }

    /// 释放底层连接
    pub fn sleep(&self) {
        self.persistable.sleep();
    }

    /// 重新建立底层连接
    pub async fn wakeup(&self) -> DocDbResult<()> {
        self.persistable.wakeup().await
    }

    fn model_label(&self) -> String {
        match (&self.schema, self.persistable.collection_name()) {
            (Some(schema), _) => schema.model.clone(),
            (None, Some(collection)) => collection.to_string(),
            (None, None) => "Entity".to_string(),
        }
    }

    /// 设置单个属性，已声明字段先校验后转换
    ///
    /// 校验失败返回无效属性错误且不写入；规格拒绝未知字段时，
    /// 设置未声明字段返回未知属性错误。
    pub fn set(&mut self, field: &str, value: impl Into<DataValue>) -> DocDbResult<()> {
        let value = value.into();
        let value = match &self.schema {
            Some(schema) => schema.validate_and_cast(field, value)?,
            None => value,
        };
        self.pending_unset.remove(field);
        self.attributes.insert(field.to_string(), value);
        Ok(())
    }

    /// 移除单个属性并记录为下次更新时的移除目标
    pub fn remove_attribute(&mut self, field: &str) -> Option<DataValue> {
        let removed = self.attributes.remove(field);
        if removed.is_some() {
            self.pending_unset.insert(field.to_string());
        }
        removed
    }

    /// 重置属性映射为默认值后批量设置，并标记存在状态
    pub fn set_attributes(&mut self, attributes: Document, exists: bool) -> DocDbResult<()> {
        self.attributes = match &self.schema {
            Some(schema) => schema.defaults(),
            None => Document::new(),
        };
        self.pending_unset.clear();
        self.exists = exists;
        for (field, value) in attributes {
            self.set(&field, value)?;
        }
        Ok(())
    }

    /// 批量合并属性，逐个经过校验
    pub fn update_attributes(&mut self, attributes: Document) -> DocDbResult<()> {
        for (field, value) in attributes {
            self.set(&field, value)?;
        }
        Ok(())
    }

    /// 按主键加载
    ///
    /// 命中时以存储文档整体替换内存属性并标记存在；未命中时返回
    /// 未找到错误，实体状态保持不变。
    pub async fn load(&mut self, key: &ObjectId) -> DocDbResult<()> {
        self.load_by(key.clone()).await
    }

    /// 按条件加载，命中后查询条件规范化为所加载文档的主键
    pub async fn load_by(&mut self, criteria: impl Into<Criteria>) -> DocDbResult<()> {
        let (db, collection) = self.bound_parts()?;
        let criteria = criteria.into();
        debug!("加载实体: collection={}", collection);
        if let Some(operate) = self.persistable.operate_mut() {
            operate.set_criteria(criteria.clone());
        }
        let store = db.store().await?;
        match store.find_one(&collection, &criteria).await? {
            Some(doc) => {
                self.attributes = doc;
                self.pending_unset.clear();
                self.exists = true;
                self.record_key_criteria();
                Ok(())
            }
            None => Err(DocDbError::NotFound { collection }),
        }
    }

    /// 保存实体
    ///
    /// 不存在且未强制更新时走插入；已存在（或强制更新且携带主键）
    /// 时走按主键的增量更新。
    pub async fn save(&mut self, force_update: bool) -> DocDbResult<()> {
        if (self.exists() || force_update) && self.key().is_some() {
            self.do_update().await
        } else {
            self.do_insert().await
        }
    }

    /// 增量更新
    ///
    /// 对主键寻址的文档设置当前所有字段，并移除自上次加载以来
    /// 删除的属性；实体尚不存在时退回保存。
    pub async fn update(&mut self) -> DocDbResult<()> {
        if self.exists() {
            self.do_update().await
        } else {
            self.save(false).await
        }
    }

    async fn do_insert(&mut self) -> DocDbResult<()> {
        let (db, collection) = self.bound_parts()?;
        if self.key().is_none() {
            self.set(PRIMARY_KEY_FIELD, ObjectId::new())?;
        }
        self.check_required()?;

        let key = self.key();
        debug!(
            "插入实体: collection={}, id={:?}",
            collection,
            key.as_ref().map(|k| k.to_string())
        );
        let store = db.store().await?;
        store.insert_one(&collection, &self.attributes).await?;
        self.exists = true;
        self.pending_unset.clear();
        self.record_key_criteria();

        self.run_cascades(&store).await
    }

    async fn do_update(&mut self) -> DocDbResult<()> {
        let (db, collection) = self.bound_parts()?;
        self.check_required()?;
        let key = self.key().ok_or_else(|| DocDbError::MissingAttribute {
            model: self.model_label(),
            field: PRIMARY_KEY_FIELD.to_string(),
        })?;

        let mut operations = Vec::new();
        for (field, value) in &self.attributes {
            if field != PRIMARY_KEY_FIELD {
                operations.push(UpdateOperation::set(field.clone(), value.clone()));
            }
        }
        for field in &self.pending_unset {
            operations.push(UpdateOperation::unset(field.clone()));
        }
        // 除主键外无任何字段变更时没有可下发的操作
        if operations.is_empty() {
            self.exists = true;
            self.record_key_criteria();
            return Ok(());
        }

        debug!(
            "更新实体: collection={}, id={}, 操作数量={}",
            collection,
            key,
            operations.len()
        );
        let store = db.store().await?;
        let matched = store
            .update_many(&collection, &Criteria::key(key.clone()), &operations)
            .await?;
        if matched == 0 {
            return Err(DocDbError::NotFound { collection });
        }
        self.exists = true;
        self.pending_unset.clear();
        self.record_key_criteria();
        Ok(())
    }

    /// 删除自身记录
    ///
    /// 实体不存在时不执行任何操作并返回 `Ok(false)`。
    pub async fn delete(&mut self) -> DocDbResult<bool> {
        if !self.exists() {
            return Ok(false);
        }
        match self.key() {
            Some(key) => self.delete_by_key(&key).await,
            None => Ok(false),
        }
    }

    /// 按主键删除
    pub async fn delete_by_key(&mut self, key: &ObjectId) -> DocDbResult<bool> {
        self.delete_by(key.clone()).await
    }

    /// 按条件删除
    pub async fn delete_by(&mut self, criteria: impl Into<Criteria>) -> DocDbResult<bool> {
        let (db, collection) = self.bound_parts()?;
        let criteria = criteria.into();
        debug!("删除实体: collection={}", collection);
        let store = db.store().await?;
        store.delete_many(&collection, &criteria).await?;
        self.exists = false;
        Ok(true)
    }

    /// 构造并保存实体的类级便捷操作
    pub async fn create(db: Db, model: &str, attributes: Document) -> DocDbResult<Entity> {
        let mut entity = Entity::for_model(db, model)?;
        entity.set_attributes(attributes, false)?;
        entity.save(false).await?;
        Ok(entity)
    }

    /// 按主键加载后批量更新的类级便捷操作
    ///
    /// 记录不存在时传播加载错误，不执行更新。
    pub async fn fast_update(
        db: Db,
        model: &str,
        key: &ObjectId,
        attributes: Document,
    ) -> DocDbResult<Entity> {
        let mut entity = Entity::for_model(db, model)?;
        entity.load(key).await?;
        entity.update_attributes(attributes)?;
        entity.update().await?;
        Ok(entity)
    }

    /// 属性映射副本，主键渲染为字符串形式，存储表示不变
    pub fn to_response_document(&self) -> Document {
        let mut response = self.attributes.clone();
        if let Some(value) = response.get_mut(PRIMARY_KEY_FIELD) {
            if let DataValue::ObjectId(oid) = value {
                *value = DataValue::String(oid.to_string());
            }
        }
        response
    }

    /// 响应 JSON 字符串
    pub fn to_response_json(&self) -> DocDbResult<String> {
        DataValue::Object(self.to_response_document()).to_json_string()
    }

    fn bound_parts(&self) -> DocDbResult<(Db, String)> {
        let (db, collection) = self.persistable.bound("Entity")?;
        Ok((db.clone(), collection.to_string()))
    }

    fn check_required(&self) -> DocDbResult<()> {
        if let Some(schema) = &self.schema {
            for field in schema.required_fields() {
                if !self.attributes.contains_key(field) {
                    return Err(DocDbError::MissingAttribute {
                        model: schema.model.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn record_key_criteria(&mut self) {
        if let Some(key) = self.key() {
            if let Some(operate) = self.persistable.operate_mut() {
                operate.set_criteria(key);
            }
        }
    }

    /// 对每个一对多引用字段执行反向引用级联
    ///
    /// 逐个目标文档：读取、检查反向引用数组、追加自身主键。主写入
    /// 已经提交，级联失败通过插入自身的错误通道返回，不回滚。
    async fn run_cascades(
        &self,
        store: &Arc<dyn crate::adapter::DocumentStore>,
    ) -> DocDbResult<()> {
        let schema = match &self.schema {
            Some(schema) => Arc::clone(schema),
            None => return Ok(()),
        };
        let own_key = match self.key() {
            Some(key) => key,
            None => return Ok(()),
        };

        for (field, model, stack) in schema.has_many_refs() {
            let targets = match self.attributes.get(field) {
                Some(DataValue::Array(items)) => items.clone(),
                _ => continue,
            };
            let ref_collection = lookup_schema(model)
                .map(|s| s.collection.clone())
                .unwrap_or_else(|| model.to_string());

            for target in targets {
                self.cascade_append(store, &ref_collection, stack, &target, &own_key)
                    .await?;
            }
        }
        Ok(())
    }

    async fn cascade_append(
        &self,
        store: &Arc<dyn crate::adapter::DocumentStore>,
        ref_collection: &str,
        stack: &str,
        target: &DataValue,
        own_key: &ObjectId,
    ) -> DocDbResult<()> {
        let criteria = match target {
            DataValue::ObjectId(oid) => Criteria::key(oid.clone()),
            other => Criteria::field_eq(PRIMARY_KEY_FIELD, other.clone()),
        };

        let doc = match store.find_one(ref_collection, &criteria).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                warn!(
                    "级联失败: 目标文档不存在: collection={}, 目标={}",
                    ref_collection, target
                );
                return Err(DocDbError::CascadeError {
                    collection: ref_collection.to_string(),
                    key: target.to_string(),
                    message: "引用的目标文档不存在".to_string(),
                });
            }
            Err(e) => {
                warn!(
                    "级联失败: 读取目标文档出错: collection={}, 目标={}, 错误={}",
                    ref_collection, target, e
                );
                return Err(DocDbError::CascadeError {
                    collection: ref_collection.to_string(),
                    key: target.to_string(),
                    message: e.to_string(),
                });
            }
        };

        // 反向引用数组已包含自身主键时跳过，保证至多追加一次
        let own_value = DataValue::ObjectId(own_key.clone());
        if let Some(DataValue::Array(existing)) = doc.get(stack) {
            if existing.contains(&own_value) {
                debug!(
                    "级联跳过: 反向引用已存在: collection={}, 目标={}, 字段={}",
                    ref_collection, target, stack
                );
                return Ok(());
            }
        }

        let matched = store
            .update_many(
                ref_collection,
                &criteria,
                &[UpdateOperation::push(stack.to_string(), own_value)],
            )
            .await
            .map_err(|e| {
                warn!(
                    "级联失败: 追加反向引用出错: collection={}, 目标={}, 错误={}",
                    ref_collection, target, e
                );
                DocDbError::CascadeError {
                    collection: ref_collection.to_string(),
                    key: target.to_string(),
                    message: e.to_string(),
                }
            })?;
        if matched == 0 {
            return Err(DocDbError::CascadeError {
                collection: ref_collection.to_string(),
                key: target.to_string(),
                message: "级联更新未匹配任何文档".to_string(),
            });
        }
        debug!(
            "级联追加反向引用: collection={}, 目标={}, 字段={}",
            ref_collection, target, stack
        );
        Ok(())
    }
}

/// 实体相等性：主键的字符串形式相等即相等，任一方无主键则不相等
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl PartialEq<ObjectId> for Entity {
    fn eq(&self, other: &ObjectId) -> bool {
        self.key().map(|k| k.as_str() == other.as_str()).unwrap_or(false)
    }
}
