//! MongoDB存储适配器
//!
//! 在 [`DocumentStore`] 契约与 mongodb 驱动之间转换：DataValue与BSON互转、
//! 条件文档构建、更新操作符映射。主键 `_id` 在能解析时以驱动的ObjectId写入。

use crate::config::DbConfig;
use crate::error::{DocDbError, DocDbResult};
use crate::types::{
    CompareOp, Criteria, DataValue, Document, UpdateOperation, UpdateOperator, PRIMARY_KEY_FIELD,
};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use rat_logger::debug;

use super::DocumentStore;

/// MongoDB存储适配器
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// 按配置建立连接
    pub async fn connect(config: &DbConfig) -> DocDbResult<Self> {
        config.validate()?;
        let uri = config.build_uri();
        let options = ClientOptions::parse(&uri)
            .await
            .map_err(|e| DocDbError::ConnectionError {
                message: format!("解析MongoDB连接URI失败: {}", e),
            })?;
        let client = Client::with_options(options).map_err(|e| DocDbError::ConnectionError {
            message: format!("创建MongoDB客户端失败: {}", e),
        })?;
        let database = client.database(&config.database);
        Ok(Self { database })
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }
}

/// 将DataValue转换为BSON值
fn data_value_to_bson(value: &DataValue) -> Bson {
    match value {
        DataValue::Null => Bson::Null,
        DataValue::Bool(b) => Bson::Boolean(*b),
        DataValue::Int(i) => Bson::Int64(*i),
        DataValue::Float(f) => Bson::Double(*f),
        DataValue::String(s) => Bson::String(s.clone()),
        DataValue::Bytes(bytes) => Bson::Binary(mongodb::bson::Binary {
            bytes: bytes.clone(),
            subtype: mongodb::bson::spec::BinarySubtype::Generic,
        }),
        DataValue::DateTime(dt) => {
            Bson::DateTime(mongodb::bson::DateTime::from_system_time((*dt).into()))
        }
        DataValue::ObjectId(oid) => {
            // 能解析则以驱动的ObjectId类型写入，保持存储层的规范标识符形式
            match mongodb::bson::oid::ObjectId::parse_str(oid.as_str()) {
                Ok(parsed) => Bson::ObjectId(parsed),
                Err(_) => Bson::String(oid.to_string()),
            }
        }
        DataValue::Uuid(uuid) => Bson::String(uuid.to_string()),
        DataValue::Array(arr) => Bson::Array(arr.iter().map(data_value_to_bson).collect()),
        DataValue::Object(obj) => {
            let mut bson_doc = BsonDocument::new();
            for (key, value) in obj {
                bson_doc.insert(key, data_value_to_bson(value));
            }
            Bson::Document(bson_doc)
        }
    }
}

/// 将BSON转换为DataValue
fn bson_to_data_value(bson: &Bson) -> DataValue {
    match bson {
        Bson::Null | Bson::Undefined => DataValue::Null,
        Bson::Boolean(b) => DataValue::Bool(*b),
        Bson::Int32(i) => DataValue::Int(*i as i64),
        Bson::Int64(i) => DataValue::Int(*i),
        Bson::Double(d) => DataValue::Float(*d),
        Bson::String(s) => DataValue::String(s.clone()),
        Bson::Binary(bin) => DataValue::Bytes(bin.bytes.clone()),
        Bson::DateTime(dt) => {
            DataValue::DateTime(chrono::DateTime::<chrono::Utc>::from(dt.to_system_time()))
        }
        Bson::ObjectId(oid) => match crate::types::ObjectId::parse_str(&oid.to_hex()) {
            Ok(parsed) => DataValue::ObjectId(parsed),
            Err(_) => DataValue::String(oid.to_hex()),
        },
        Bson::Array(arr) => DataValue::Array(arr.iter().map(bson_to_data_value).collect()),
        Bson::Document(doc) => DataValue::Object(
            doc.iter()
                .map(|(k, v)| (k.to_string(), bson_to_data_value(v)))
                .collect(),
        ),
        other => DataValue::String(format!("{:?}", other)),
    }
}

/// 将文档转换为BSON文档
fn document_to_bson(doc: &Document) -> BsonDocument {
    let mut bson_doc = BsonDocument::new();
    for (key, value) in doc {
        bson_doc.insert(key, data_value_to_bson(value));
    }
    bson_doc
}

/// 将BSON文档转换为文档
fn bson_to_document(bson_doc: &BsonDocument) -> Document {
    bson_doc
        .iter()
        .map(|(k, v)| (k.to_string(), bson_to_data_value(v)))
        .collect()
}

/// 构建条件值，主键字段的字符串形式提升为ObjectId
fn condition_value_to_bson(field: &str, value: &DataValue) -> Bson {
    if field == PRIMARY_KEY_FIELD {
        if let DataValue::String(s) = value {
            if let Ok(oid) = mongodb::bson::oid::ObjectId::parse_str(s) {
                return Bson::ObjectId(oid);
            }
        }
    }
    data_value_to_bson(value)
}

/// 将查询条件构建为BSON过滤文档
fn criteria_to_filter(criteria: &Criteria) -> BsonDocument {
    let conditions = criteria.clone().into_conditions();
    let mut parts: Vec<BsonDocument> = Vec::with_capacity(conditions.len());

    for condition in &conditions {
        let value = condition_value_to_bson(&condition.field, &condition.value);
        let part = match condition.operator {
            CompareOp::Eq => doc! { &condition.field: value },
            CompareOp::Ne => doc! { &condition.field: { "$ne": value } },
            CompareOp::Gt => doc! { &condition.field: { "$gt": value } },
            CompareOp::Gte => doc! { &condition.field: { "$gte": value } },
            CompareOp::Lt => doc! { &condition.field: { "$lt": value } },
            CompareOp::Lte => doc! { &condition.field: { "$lte": value } },
            CompareOp::In => doc! { &condition.field: { "$in": value } },
            CompareOp::Exists => {
                let exists = !matches!(condition.value, DataValue::Bool(false));
                doc! { &condition.field: { "$exists": exists } }
            }
        };
        parts.push(part);
    }

    match parts.len() {
        0 => BsonDocument::new(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => doc! { "$and": parts },
    }
}

/// 将更新操作列表构建为BSON更新文档
fn operations_to_update(operations: &[UpdateOperation]) -> BsonDocument {
    let mut set_doc = BsonDocument::new();
    let mut unset_doc = BsonDocument::new();
    let mut inc_doc = BsonDocument::new();
    let mut push_doc = BsonDocument::new();
    let mut pull_doc = BsonDocument::new();

    for op in operations {
        let value = data_value_to_bson(&op.value);
        match op.operation {
            UpdateOperator::Set => {
                set_doc.insert(&op.field, value);
            }
            UpdateOperator::Unset => {
                unset_doc.insert(&op.field, Bson::String(String::new()));
            }
            UpdateOperator::Increment => {
                inc_doc.insert(&op.field, value);
            }
            UpdateOperator::Push => {
                push_doc.insert(&op.field, value);
            }
            UpdateOperator::Pull => {
                pull_doc.insert(&op.field, value);
            }
        }
    }

    let mut update = BsonDocument::new();
    if !set_doc.is_empty() {
        update.insert("$set", set_doc);
    }
    if !unset_doc.is_empty() {
        update.insert("$unset", unset_doc);
    }
    if !inc_doc.is_empty() {
        update.insert("$inc", inc_doc);
    }
    if !push_doc.is_empty() {
        update.insert("$push", push_doc);
    }
    if !pull_doc.is_empty() {
        update.insert("$pull", pull_doc);
    }
    update
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_one(
        &self,
        collection: &str,
        criteria: &Criteria,
    ) -> DocDbResult<Option<Document>> {
        let filter = criteria_to_filter(criteria);
        debug!("执行MongoDB单文档查询 {}: {:?}", collection, filter);

        let result = self
            .collection(collection)
            .find_one(filter, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB查询失败: {}", e),
            })?;
        Ok(result.map(|doc| bson_to_document(&doc)))
    }

    async fn find(&self, collection: &str, criteria: &Criteria) -> DocDbResult<Vec<Document>> {
        let filter = criteria_to_filter(criteria);
        debug!("执行MongoDB查询 {}: {:?}", collection, filter);

        let mut cursor = self
            .collection(collection)
            .find(filter, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB查询失败: {}", e),
            })?;

        let mut results = Vec::new();
        while cursor.advance().await.map_err(|e| DocDbError::QueryError {
            message: format!("MongoDB游标遍历失败: {}", e),
        })? {
            let doc = cursor
                .deserialize_current()
                .map_err(|e| DocDbError::QueryError {
                    message: format!("MongoDB文档反序列化失败: {}", e),
                })?;
            results.push(bson_to_document(&doc));
        }
        Ok(results)
    }

    async fn insert_one(&self, collection: &str, doc: &Document) -> DocDbResult<()> {
        let bson_doc = document_to_bson(doc);
        debug!("执行MongoDB插入到集合 {}: {:?}", collection, bson_doc);

        self.collection(collection)
            .insert_one(bson_doc, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB插入失败: {}", e),
            })?;
        Ok(())
    }

    async fn insert_many(&self, collection: &str, docs: &[Document]) -> DocDbResult<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let bson_docs: Vec<BsonDocument> = docs.iter().map(document_to_bson).collect();
        debug!(
            "执行MongoDB批量插入到集合 {}: {} 条",
            collection,
            bson_docs.len()
        );

        self.collection(collection)
            .insert_many(bson_docs, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB批量插入失败: {}", e),
            })?;
        Ok(())
    }

    async fn replace_one(
        &self,
        collection: &str,
        criteria: &Criteria,
        doc: &Document,
    ) -> DocDbResult<u64> {
        let filter = criteria_to_filter(criteria);
        let replacement = document_to_bson(doc);
        debug!("执行MongoDB文档替换 {}: {:?}", collection, filter);

        let result = self
            .collection(collection)
            .replace_one(filter, replacement, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB替换失败: {}", e),
            })?;
        Ok(result.modified_count)
    }

    async fn update_many(
        &self,
        collection: &str,
        criteria: &Criteria,
        operations: &[UpdateOperation],
    ) -> DocDbResult<u64> {
        if operations.is_empty() {
            return Ok(0);
        }
        let filter = criteria_to_filter(criteria);
        let update = operations_to_update(operations);
        debug!(
            "执行MongoDB更新 {}: {:?} => {:?}",
            collection, filter, update
        );

        let result = self
            .collection(collection)
            .update_many(filter, update, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB更新失败: {}", e),
            })?;
        Ok(result.matched_count)
    }

    async fn delete_many(&self, collection: &str, criteria: &Criteria) -> DocDbResult<u64> {
        let filter = criteria_to_filter(criteria);
        debug!("执行MongoDB删除 {}: {:?}", collection, filter);

        let result = self
            .collection(collection)
            .delete_many(filter, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB删除失败: {}", e),
            })?;
        Ok(result.deleted_count)
    }

    async fn count(&self, collection: &str, criteria: &Criteria) -> DocDbResult<u64> {
        let filter = criteria_to_filter(criteria);
        debug!("执行MongoDB计数 {}: {:?}", collection, filter);

        self.collection(collection)
            .count_documents(filter, None)
            .await
            .map_err(|e| DocDbError::QueryError {
                message: format!("MongoDB计数失败: {}", e),
            })
    }
}
