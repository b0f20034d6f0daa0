//! 集合容器模块
//!
//! [`Collection`] 是绑定到命名集合的多文档容器：异步的查找、批量插入
//! 与批量删除，加载结果上的按需二级索引，以及按下标把原始文档物化为
//! 已加载状态实体的能力。
//!
//! 二级索引按属性名惰性构建并缓存；底层文档列表被替换时缓存整体失效，
//! 下次使用时重建。

use crate::db::Db;
use crate::entity::Entity;
use crate::error::{DocDbError, DocDbResult};
use crate::persistable::{Operate, Persistable};
use crate::schema::{require_schema, Schema};
use crate::types::{Criteria, DataValue, Document, PRIMARY_KEY_FIELD};
use rat_logger::debug;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 多文档集合容器
#[derive(Debug, Clone)]
pub struct Collection {
    persistable: Persistable,
    schema: Option<Arc<Schema>>,
    data: Vec<Document>,
    indexes: HashMap<String, HashMap<String, Vec<usize>>>,
    loaded: bool,
}

impl Collection {
    /// 创建未绑定的集合容器
    pub fn unbound() -> Self {
        Self {
            persistable: Persistable::unbound(),
            schema: None,
            data: Vec::new(),
            indexes: HashMap::new(),
            loaded: false,
        }
    }

    /// 创建绑定到命名集合的容器
    pub fn new(db: Db, collection: &str) -> Self {
        let mut container = Self::unbound();
        container.persistable.bind_collection(db, collection);
        container
    }

    /// 创建绑定到模型规格的容器，物化的实体携带该规格
    pub fn with_schema(db: Db, schema: Arc<Schema>) -> Self {
        let mut container = Self::unbound();
        container.persistable.bind_collection(db, &schema.collection);
        container.schema = Some(schema);
        container
    }

    /// 按已注册的模型名创建容器
    pub fn for_model(db: Db, model: &str) -> DocDbResult<Self> {
        let schema = require_schema(model)?;
        Ok(Self::with_schema(db, schema))
    }

    /// 构造并加载的类级便捷操作
    pub async fn find(
        db: Db,
        collection: &str,
        criteria: impl Into<Criteria>,
    ) -> DocDbResult<Collection> {
        let mut container = Collection::new(db, collection);
        container.load(criteria).await?;
        Ok(container)
    }

    /// 绑定的集合名
    pub fn collection_name(&self) -> Option<&str> {
        self.persistable.collection_name()
    }

    /// 是否已绑定集合
    pub fn is_bound(&self) -> bool {
        self.persistable.is_bound()
    }

    /// 已加载的文档数量
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否没有已加载的文档
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 是否持有已加载的文档
    pub fn exists(&self) -> bool {
        !self.data.is_empty()
    }

    /// 按下标读取原始文档
    pub fn get(&self, index: usize) -> Option<&Document> {
        self.data.get(index)
    }

    /// 已加载的原始文档
    pub fn items(&self) -> &[Document] {
        &self.data
    }

    /// 替换已加载的文档列表，二级索引缓存失效
    pub fn set_items(&mut self, items: Vec<Document>) {
        self.data = items;
        self.loaded = true;
        self.indexes.clear();
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

    fn bound_parts(&self) -> DocDbResult<(Db, String)> {
        let (db, collection) = self.persistable.bound("Collection")?;
        Ok((db.clone(), collection.to_string()))
    }

    /// 按条件异步加载，成功后整体替换内存文档列表
    pub async fn load(&mut self, criteria: impl Into<Criteria>) -> DocDbResult<()> {
        let (db, collection) = self.bound_parts()?;
        let criteria = criteria.into();
        if let Some(operate) = self.persistable.operate_mut() {
            operate.set_criteria(criteria.clone());
        }
        let store = db.store().await?;
        let docs = store.find(&collection, &criteria).await?;
        debug!("加载集合: collection={}, 条目数量={}", collection, docs.len());
        self.set_items(docs);
        Ok(())
    }

    /// 已加载的文档数量；尚未加载过时先按条件加载一次
    pub async fn count(&mut self, criteria: impl Into<Criteria>) -> DocDbResult<usize> {
        if !self.loaded {
            self.load(criteria).await?;
        }
        Ok(self.data.len())
    }

    /// 批量插入，成功后以插入的条目替换内存文档列表
    pub async fn insert(&mut self, items: Vec<Document>) -> DocDbResult<()> {
        let (db, collection) = self.bound_parts()?;
        let store = db.store().await?;
        store.insert_many(&collection, &items).await?;
        debug!(
            "批量插入集合: collection={}, 条目数量={}",
            collection,
            items.len()
        );
        self.set_items(items);
        Ok(())
    }

    /// 按条件批量删除，返回删除数量
    ///
    /// 内存文档列表随之清空，下一次 `count` 会重新加载。
    pub async fn remove(&mut self, criteria: impl Into<Criteria>) -> DocDbResult<u64> {
        let (db, collection) = self.bound_parts()?;
        let criteria = criteria.into();
        let store = db.store().await?;
        let removed = store.delete_many(&collection, &criteria).await?;
        debug!(
            "批量删除集合: collection={}, 删除数量={}",
            collection, removed
        );
        self.data.clear();
        self.loaded = false;
        self.indexes.clear();
        Ok(removed)
    }

    /// 确保属性的二级索引已构建
    fn ensure_index(&mut self, attribute: &str) {
        if self.indexes.contains_key(attribute) {
            return;
        }
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, doc) in self.data.iter().enumerate() {
            if let Some(value) = doc.get(attribute) {
                index.entry(value.index_key()).or_default().push(position);
            }
        }
        debug!(
            "构建二级索引: attribute={}, 取值数量={}",
            attribute,
            index.len()
        );
        self.indexes.insert(attribute.to_string(), index);
    }

    /// 通过缓存的二级索引查找属性值对应的文档
    ///
    /// 首次访问某个属性时构建索引并缓存，直到文档列表被替换。
    pub fn get_indexed_by(&mut self, attribute: &str, value: &DataValue) -> Vec<&Document> {
        self.ensure_index(attribute);
        let positions = self
            .indexes
            .get(attribute)
            .and_then(|index| index.get(&value.index_key()))
            .cloned()
            .unwrap_or_default();
        positions.into_iter().map(|pos| &self.data[pos]).collect()
    }

    /// 跨多个属性等值过滤的并集查找（过滤条件之间为或语义）
    pub fn get_by_attribute(&mut self, filters: &[(&str, DataValue)]) -> Vec<&Document> {
        let mut positions = Vec::new();
        let mut seen = HashSet::new();
        for (attribute, value) in filters {
            self.ensure_index(attribute);
            if let Some(matched) = self
                .indexes
                .get(*attribute)
                .and_then(|index| index.get(&value.index_key()))
            {
                for pos in matched {
                    if seen.insert(*pos) {
                        positions.push(*pos);
                    }
                }
            }
        }
        positions.into_iter().map(|pos| &self.data[pos]).collect()
    }

    /// 某个属性在已加载文档中的取值序列，缺少该属性的文档跳过
    pub fn attribute_values(&self, attribute: &str) -> Vec<&DataValue> {
        self.data
            .iter()
            .filter_map(|doc| doc.get(attribute))
            .collect()
    }

    /// 把指定下标的文档物化为已加载状态的实体
    pub fn entity_at(&self, index: usize) -> DocDbResult<Entity> {
        let doc = self.data.get(index).ok_or_else(|| DocDbError::QueryError {
            message: format!("集合下标越界: index={}, len={}", index, self.data.len()),
        })?;
        let (db, collection) = self.bound_parts()?;
        let mut entity = match &self.schema {
            Some(schema) => Entity::with_schema(db, Arc::clone(schema)),
            None => Entity::new(db, &collection),
        };
        entity.set_attributes(doc.clone(), true)?;
        Ok(entity)
    }

    /// 文档列表副本，主键渲染为字符串形式
    pub fn to_response_documents(&self) -> Vec<Document> {
        self.data
            .iter()
            .map(|doc| {
                let mut response = doc.clone();
                if let Some(value) = response.get_mut(PRIMARY_KEY_FIELD) {
                    if let DataValue::ObjectId(oid) = value {
                        *value = DataValue::String(oid.to_string());
                    }
                }
                response
            })
            .collect()
    }
}
