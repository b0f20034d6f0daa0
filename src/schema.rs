//! 模型规格注册模块
//!
//! 维护模型名到属性规格集合的进程级注册表。模型在启动阶段显式注册，
//! 供实体的赋值校验、必填检查与引用校验委托查询。

use crate::attribute::{primary_key, Attribute, AttributeKind};
use crate::error::{DocDbError, DocDbResult};
use crate::types::{DataValue, Document, PRIMARY_KEY_FIELD};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use rat_logger::debug;
use std::collections::HashMap;
use std::sync::Arc;

/// 进程级模型规格注册表
static SCHEMA_REGISTRY: Lazy<DashMap<String, Arc<Schema>>> = Lazy::new(DashMap::new);

/// 模型规格
///
/// 描述一个模型的字段属性规格集合与绑定的集合名。
/// 构造时自动补充主键属性规格。
#[derive(Debug, Clone)]
pub struct Schema {
    /// 模型名，注册表的键
    pub model: String,
    /// 绑定的集合名
    pub collection: String,
    /// 字段名到属性规格的映射
    pub attributes: HashMap<String, Attribute>,
    /// 是否接受规格之外的未知字段
    pub accept_unknown: bool,
}

impl Schema {
    /// 创建新的模型规格，自动包含主键属性
    pub fn new(model: &str, collection: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(PRIMARY_KEY_FIELD.to_string(), primary_key());
        Self {
            model: model.to_string(),
            collection: collection.to_string(),
            attributes,
            accept_unknown: true,
        }
    }

    /// 添加字段属性规格
    pub fn with_attribute(mut self, field: &str, spec: Attribute) -> Self {
        self.attributes.insert(field.to_string(), spec);
        self
    }

    /// 拒绝规格之外的未知字段
    pub fn deny_unknown(mut self) -> Self {
        self.accept_unknown = false;
        self
    }

    /// 获取字段的属性规格
    pub fn attribute(&self, field: &str) -> Option<&Attribute> {
        self.attributes.get(field)
    }

    /// 字段是否在规格中声明
    pub fn has_attribute(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }

    /// 必填字段名列表
    pub fn required_fields(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// 声明了默认值的字段，实体构造时预填充
    pub fn defaults(&self) -> Document {
        self.attributes
            .iter()
            .filter_map(|(name, spec)| {
                spec.default
                    .as_ref()
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    /// 一对多引用字段列表，返回 (字段名, 目标模型, 反向引用数组字段)
    pub fn has_many_refs(&self) -> Vec<(&str, &str, &str)> {
        self.attributes
            .iter()
            .filter_map(|(name, spec)| match &spec.kind {
                AttributeKind::HasMany { model, stack } => {
                    Some((name.as_str(), model.as_str(), stack.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// 校验并转换一次字段赋值
    ///
    /// 已声明字段先校验后转换；未声明字段在 `accept_unknown` 时原样通过，
    /// 否则返回未知属性错误。
    pub fn validate_and_cast(&self, field: &str, value: DataValue) -> DocDbResult<DataValue> {
        match self.attributes.get(field) {
            Some(spec) => {
                spec.validate_named(field, &value)?;
                Ok(spec.cast(value))
            }
            None if self.accept_unknown => Ok(value),
            None => Err(DocDbError::UnknownAttribute {
                field: field.to_string(),
            }),
        }
    }
}

/// 注册模型规格，重复注册时覆盖旧规格
pub fn register_schema(schema: Schema) -> Arc<Schema> {
    if SCHEMA_REGISTRY.contains_key(&schema.model) {
        debug!("模型规格已存在，将更新: {}", schema.model);
    }
    debug!(
        "注册模型规格: 模型={}, 集合={}, 字段数量={}",
        schema.model,
        schema.collection,
        schema.attributes.len()
    );
    let schema = Arc::new(schema);
    SCHEMA_REGISTRY.insert(schema.model.clone(), Arc::clone(&schema));
    schema
}

/// 查询已注册的模型规格
pub fn lookup_schema(model: &str) -> Option<Arc<Schema>> {
    SCHEMA_REGISTRY
        .get(model)
        .map(|entry| Arc::clone(entry.value()))
}

/// 查询模型规格，未注册时返回错误
pub fn require_schema(model: &str) -> DocDbResult<Arc<Schema>> {
    lookup_schema(model).ok_or_else(|| DocDbError::SchemaNotRegistered {
        model: model.to_string(),
    })
}

/// 模型是否已注册
pub fn has_schema(model: &str) -> bool {
    SCHEMA_REGISTRY.contains_key(model)
}

/// 所有已注册的模型名
pub fn registered_models() -> Vec<String> {
    SCHEMA_REGISTRY
        .iter()
        .map(|entry| entry.key().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{has_one, integer_attr, string_attr};
    use crate::types::ObjectId;

    #[test]
    fn test_schema_auto_primary_key() {
        let schema = Schema::new("test_sc_users", "users");
        assert!(schema.has_attribute(PRIMARY_KEY_FIELD));
        let spec = schema.attribute(PRIMARY_KEY_FIELD).unwrap();
        assert!(matches!(spec.kind, AttributeKind::PrimaryKey));
        assert!(spec.required);
    }

    #[test]
    fn test_validate_and_cast_declared_field() {
        let schema = Schema::new("test_sc_books", "books")
            .with_attribute("title", string_attr(Some(10), None, None));

        let cast = schema
            .validate_and_cast("title", DataValue::String("深入浅出".into()))
            .unwrap();
        assert_eq!(cast, DataValue::String("深入浅出".into()));

        let err = schema
            .validate_and_cast("title", DataValue::Int(1))
            .unwrap_err();
        assert!(matches!(err, DocDbError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_unknown_field_policy() {
        let open = Schema::new("test_sc_open", "open");
        let value = open
            .validate_and_cast("extra", DataValue::Int(7))
            .unwrap();
        assert_eq!(value, DataValue::Int(7));

        let closed = Schema::new("test_sc_closed", "closed").deny_unknown();
        let err = closed
            .validate_and_cast("extra", DataValue::Int(7))
            .unwrap_err();
        match err {
            DocDbError::UnknownAttribute { field } => assert_eq!(field, "extra"),
            other => panic!("意外的错误类型: {:?}", other),
        }
    }

    #[test]
    fn test_registry_roundtrip() {
        register_schema(
            Schema::new("test_sc_reg", "reg").with_attribute("age", integer_attr(Some(0), None)),
        );
        assert!(has_schema("test_sc_reg"));
        let schema = lookup_schema("test_sc_reg").unwrap();
        assert_eq!(schema.collection, "reg");
        assert!(schema.has_attribute("age"));
        assert!(require_schema("test_sc_missing").is_err());
    }

    #[test]
    fn test_reference_delegates_to_registered_key_spec() {
        register_schema(Schema::new("test_sc_targets", "targets"));
        let spec = has_one("test_sc_targets");
        let oid = ObjectId::new();
        assert!(spec.validate(&DataValue::ObjectId(oid.clone())));
        assert!(spec.validate(&DataValue::String(oid.to_string())));
        assert!(!spec.validate(&DataValue::String("无效键".into())));
    }

    #[test]
    fn test_required_and_defaults() {
        let schema = Schema::new("test_sc_props", "props")
            .with_attribute("name", string_attr(None, None, None).required())
            .with_attribute(
                "score",
                integer_attr(None, None).with_default(DataValue::Int(0)),
            );

        let mut required = schema.required_fields();
        required.sort();
        assert_eq!(required, vec![PRIMARY_KEY_FIELD, "name"]);

        let defaults = schema.defaults();
        assert_eq!(defaults.get("score"), Some(&DataValue::Int(0)));
        assert!(!defaults.contains_key("name"));
    }
}
