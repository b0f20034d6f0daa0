//! 属性规格模块
//!
//! 定义模型字段的声明式规格：类型、可空性、长度/范围边界、默认值与引用关系。
//! 契约为先校验后转换：`validate` 通过的值才可交给 `cast`，
//! `cast` 对未通过校验的值不保证有意义的结果。

use crate::error::{DocDbError, DocDbResult};
use crate::types::{DataValue, ObjectId, PRIMARY_KEY_FIELD};
use serde::{Deserialize, Serialize};

/// 属性类型枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// 任意类型，只应用基础规则（可空性与长度边界）
    Any,
    /// 字符串类型
    String { regex: Option<String> },
    /// 整数类型
    Integer {
        min_value: Option<i64>,
        max_value: Option<i64>,
    },
    /// 浮点数类型，整数值提升后参与范围检查
    Float {
        min_value: Option<f64>,
        max_value: Option<f64>,
    },
    /// 布尔类型
    Boolean,
    /// 日期时间类型，接受 RFC3339 字符串
    DateTime,
    /// UUID类型，接受标准格式字符串
    Uuid,
    /// 数组类型，元素逐个按 item_type 校验
    Array { item_type: Box<AttributeKind> },
    /// 对象/嵌套文档类型
    Object,
    /// 主键类型，校验即检查能否转换为规范主键
    PrimaryKey,
    /// 一对一引用：字段保存目标模型的一个主键
    HasOne { model: String },
    /// 一对多引用：字段保存目标模型的主键数组，
    /// 插入时向目标文档的 stack 反向引用数组级联追加自身主键
    HasMany { model: String, stack: String },
    /// 多对一引用：主键数组，不触发级联维护
    References { model: String },
}

impl AttributeKind {
    /// 类型层面的值检查，不含可空性与长度边界
    pub fn accepts(&self, value: &DataValue) -> bool {
        match self {
            AttributeKind::Any => true,
            AttributeKind::String { regex } => match value {
                DataValue::String(s) => match regex {
                    Some(pattern) => regex::Regex::new(pattern)
                        .map(|re| re.is_match(s))
                        .unwrap_or(false),
                    None => true,
                },
                _ => false,
            },
            AttributeKind::Integer {
                min_value,
                max_value,
            } => match value {
                DataValue::Int(i) => {
                    min_value.map_or(true, |min| *i >= min)
                        && max_value.map_or(true, |max| *i <= max)
                }
                _ => false,
            },
            AttributeKind::Float {
                min_value,
                max_value,
            } => {
                let f = match value {
                    DataValue::Float(f) => *f,
                    DataValue::Int(i) => *i as f64,
                    _ => return false,
                };
                min_value.map_or(true, |min| f >= min) && max_value.map_or(true, |max| f <= max)
            }
            AttributeKind::Boolean => matches!(value, DataValue::Bool(_)),
            AttributeKind::DateTime => match value {
                DataValue::DateTime(_) => true,
                DataValue::String(s) => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
                _ => false,
            },
            AttributeKind::Uuid => match value {
                DataValue::Uuid(_) => true,
                DataValue::String(s) => uuid::Uuid::parse_str(s).is_ok(),
                _ => false,
            },
            AttributeKind::Array { item_type } => match value {
                DataValue::Array(items) => items.iter().all(|item| item_type.accepts(item)),
                _ => false,
            },
            AttributeKind::Object => matches!(value, DataValue::Object(_)),
            AttributeKind::PrimaryKey => key_like(value),
            AttributeKind::HasOne { model } => key_accepted(model, value),
            AttributeKind::HasMany { model, .. } | AttributeKind::References { model } => {
                match value {
                    DataValue::Array(items) => items.iter().all(|item| key_accepted(model, item)),
                    _ => false,
                }
            }
        }
    }

    /// 类型层面的值转换，只对通过 [`accepts`](Self::accepts) 的值调用
    pub fn coerce(&self, value: DataValue) -> DataValue {
        match self {
            AttributeKind::Float { .. } => match value {
                DataValue::Int(i) => DataValue::Float(i as f64),
                other => other,
            },
            AttributeKind::DateTime => match value {
                DataValue::String(s) => match chrono::DateTime::parse_from_rfc3339(&s) {
                    Ok(dt) => DataValue::DateTime(dt.with_timezone(&chrono::Utc)),
                    Err(_) => DataValue::String(s),
                },
                other => other,
            },
            AttributeKind::Uuid => match value {
                DataValue::String(s) => match uuid::Uuid::parse_str(&s) {
                    Ok(u) => DataValue::Uuid(u),
                    Err(_) => DataValue::String(s),
                },
                other => other,
            },
            AttributeKind::Array { item_type } => match value {
                DataValue::Array(items) => DataValue::Array(
                    items.into_iter().map(|item| item_type.coerce(item)).collect(),
                ),
                other => other,
            },
            AttributeKind::PrimaryKey | AttributeKind::HasOne { .. } => coerce_key(value),
            AttributeKind::HasMany { .. } | AttributeKind::References { .. } => match value {
                DataValue::Array(items) => {
                    DataValue::Array(items.into_iter().map(coerce_key).collect())
                }
                other => other,
            },
            _ => value,
        }
    }
}

/// 值是否具有规范主键形式
fn key_like(value: &DataValue) -> bool {
    match value {
        DataValue::ObjectId(_) => true,
        DataValue::String(s) => ObjectId::is_valid(s),
        _ => false,
    }
}

/// 将主键形式的值规范化为 [`DataValue::ObjectId`]
fn coerce_key(value: DataValue) -> DataValue {
    match value {
        DataValue::String(s) => match ObjectId::parse_str(&s) {
            Ok(oid) => DataValue::ObjectId(oid),
            Err(_) => DataValue::String(s),
        },
        other => other,
    }
}

/// 引用值检查：目标模型已注册时委托其主键规格，
/// 未注册时退回规范主键形式检查
fn key_accepted(model: &str, value: &DataValue) -> bool {
    if let Some(schema) = crate::schema::lookup_schema(model) {
        if let Some(spec) = schema.attribute(PRIMARY_KEY_FIELD) {
            // 仅当目标主键规格确为主键类型时委托，避免畸形注册造成递归
            if matches!(spec.kind, AttributeKind::PrimaryKey) {
                return spec.validate(value);
            }
        }
    }
    key_like(value)
}

/// 属性规格
///
/// `required` 表示持久化时字段必须存在，在插入/更新前检查；
/// `nullable` 表示字段存在时其值允许为空，在赋值校验时检查。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// 属性类型
    pub kind: AttributeKind,
    /// 持久化时是否必须存在
    pub required: bool,
    /// 值是否允许为空
    pub nullable: bool,
    /// 默认值，实体构造时预填充
    pub default: Option<DataValue>,
    /// 最小长度，只对序列/字符串类值有意义
    pub min_length: Option<usize>,
    /// 最大长度，只对序列/字符串类值有意义
    pub max_length: Option<usize>,
}

impl Attribute {
    /// 创建新的属性规格
    pub fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            required: false,
            nullable: false,
            default: None,
            min_length: None,
            max_length: None,
        }
    }

    /// 设置为必填属性
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// 设置为可空属性
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// 设置默认值
    pub fn with_default(mut self, value: DataValue) -> Self {
        self.default = Some(value);
        self
    }

    /// 设置长度边界
    pub fn with_length(mut self, min_length: Option<usize>, max_length: Option<usize>) -> Self {
        self.min_length = min_length;
        self.max_length = max_length;
        self
    }

    /// 校验属性值
    pub fn validate(&self, value: &DataValue) -> bool {
        if value.is_null() {
            return self.nullable;
        }
        if let Some(len) = value.length() {
            if let Some(min_len) = self.min_length {
                if len < min_len {
                    return false;
                }
            }
            if let Some(max_len) = self.max_length {
                if len > max_len {
                    return false;
                }
            }
        }
        self.kind.accepts(value)
    }

    /// 带字段名的校验，失败时返回携带字段名与违规值的错误
    pub fn validate_named(&self, field: &str, value: &DataValue) -> DocDbResult<()> {
        if self.validate(value) {
            Ok(())
        } else {
            Err(DocDbError::InvalidAttribute {
                field: field.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// 转换属性值，只对通过 [`validate`](Self::validate) 的值调用
    pub fn cast(&self, value: DataValue) -> DataValue {
        if value.is_null() {
            return value;
        }
        self.kind.coerce(value)
    }
}

/// 便捷函数：创建字符串属性
pub fn string_attr(
    max_length: Option<usize>,
    min_length: Option<usize>,
    regex: Option<String>,
) -> Attribute {
    Attribute::new(AttributeKind::String { regex }).with_length(min_length, max_length)
}

/// 便捷函数：创建整数属性
pub fn integer_attr(min_value: Option<i64>, max_value: Option<i64>) -> Attribute {
    Attribute::new(AttributeKind::Integer {
        min_value,
        max_value,
    })
}

/// 便捷函数：创建浮点数属性
pub fn float_attr(min_value: Option<f64>, max_value: Option<f64>) -> Attribute {
    Attribute::new(AttributeKind::Float {
        min_value,
        max_value,
    })
}

/// 便捷函数：创建布尔属性
pub fn boolean_attr() -> Attribute {
    Attribute::new(AttributeKind::Boolean)
}

/// 便捷函数：创建日期时间属性
pub fn datetime_attr() -> Attribute {
    Attribute::new(AttributeKind::DateTime)
}

/// 便捷函数：创建UUID属性
pub fn uuid_attr() -> Attribute {
    Attribute::new(AttributeKind::Uuid)
}

/// 便捷函数：创建对象属性
pub fn object_attr() -> Attribute {
    Attribute::new(AttributeKind::Object)
}

/// 便捷函数：创建任意类型属性
pub fn any_attr() -> Attribute {
    Attribute::new(AttributeKind::Any)
}

/// 便捷函数：创建数组属性
pub fn array_attr(
    item_type: AttributeKind,
    max_items: Option<usize>,
    min_items: Option<usize>,
) -> Attribute {
    Attribute::new(AttributeKind::Array {
        item_type: Box::new(item_type),
    })
    .with_length(min_items, max_items)
}

/// 便捷函数：创建主键属性
pub fn primary_key() -> Attribute {
    Attribute::new(AttributeKind::PrimaryKey).required()
}

/// 便捷函数：创建一对一引用属性
pub fn has_one(model: &str) -> Attribute {
    Attribute::new(AttributeKind::HasOne {
        model: model.to_string(),
    })
    .required()
}

/// 便捷函数：创建一对多引用属性，stack 为目标文档的反向引用数组字段名
pub fn has_many(model: &str, stack: &str) -> Attribute {
    Attribute::new(AttributeKind::HasMany {
        model: model.to_string(),
        stack: stack.to_string(),
    })
    .with_default(DataValue::Array(Vec::new()))
}

/// 便捷函数：创建多对一引用属性
pub fn references(model: &str) -> Attribute {
    Attribute::new(AttributeKind::References {
        model: model.to_string(),
    })
    .with_default(DataValue::Array(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_length_bounds() {
        let attr = string_attr(Some(5), Some(2), None);
        assert!(attr.validate(&DataValue::String("abc".into())));
        assert!(!attr.validate(&DataValue::String("a".into())));
        assert!(!attr.validate(&DataValue::String("abcdef".into())));
        assert!(!attr.validate(&DataValue::Int(3)));
    }

    #[test]
    fn test_string_regex() {
        let attr = string_attr(None, None, Some(r"^[a-z]+$".to_string()));
        assert!(attr.validate(&DataValue::String("hello".into())));
        assert!(!attr.validate(&DataValue::String("Hello123".into())));
    }

    #[test]
    fn test_nullable() {
        let attr = string_attr(None, None, None);
        assert!(!attr.validate(&DataValue::Null));
        let attr = attr.nullable();
        assert!(attr.validate(&DataValue::Null));
    }

    #[test]
    fn test_integer_range() {
        let attr = integer_attr(Some(0), Some(100));
        assert!(attr.validate(&DataValue::Int(50)));
        assert!(!attr.validate(&DataValue::Int(-1)));
        assert!(!attr.validate(&DataValue::Int(101)));
        assert!(!attr.validate(&DataValue::Float(50.0)));
    }

    #[test]
    fn test_float_accepts_int_and_casts() {
        let attr = float_attr(Some(0.0), None);
        assert!(attr.validate(&DataValue::Int(3)));
        assert_eq!(attr.cast(DataValue::Int(3)), DataValue::Float(3.0));
        assert!(!attr.validate(&DataValue::Int(-3)));
    }

    #[test]
    fn test_array_items_validated() {
        let attr = array_attr(
            AttributeKind::Integer {
                min_value: Some(0),
                max_value: None,
            },
            Some(3),
            None,
        );
        assert!(attr.validate(&DataValue::Array(vec![
            DataValue::Int(1),
            DataValue::Int(2),
        ])));
        assert!(!attr.validate(&DataValue::Array(vec![
            DataValue::Int(1),
            DataValue::Int(-2),
        ])));
        assert!(!attr.validate(&DataValue::Array(vec![
            DataValue::Int(1),
            DataValue::String("x".into()),
        ])));
        assert!(!attr.validate(&DataValue::Array(vec![
            DataValue::Int(1),
            DataValue::Int(2),
            DataValue::Int(3),
            DataValue::Int(4),
        ])));
    }

    #[test]
    fn test_primary_key_validate_and_cast() {
        let attr = primary_key();
        let oid = ObjectId::new();
        assert!(attr.validate(&DataValue::ObjectId(oid.clone())));
        assert!(attr.validate(&DataValue::String(oid.to_string())));
        assert!(!attr.validate(&DataValue::String("不是主键".into())));
        assert!(!attr.validate(&DataValue::Int(1)));

        let cast = attr.cast(DataValue::String(oid.to_string()));
        assert_eq!(cast, DataValue::ObjectId(oid));
    }

    #[test]
    fn test_has_one_fallback_without_registry() {
        let attr = has_one("unregistered_model");
        let oid = ObjectId::new();
        assert!(attr.validate(&DataValue::String(oid.to_string())));
        assert!(!attr.validate(&DataValue::String("junk".into())));
        assert!(attr.required);
    }

    #[test]
    fn test_references_default_shape() {
        let attr = references("tags");
        assert!(!attr.required);
        assert_eq!(attr.default, Some(DataValue::Array(Vec::new())));
        let oid = ObjectId::new();
        assert!(attr.validate(&DataValue::Array(vec![DataValue::ObjectId(oid)])));
        assert!(!attr.validate(&DataValue::Array(vec![DataValue::Int(1)])));
        assert!(!attr.validate(&DataValue::String("abc".into())));
    }

    #[test]
    fn test_has_many_casts_elements() {
        let attr = has_many("users", "followers");
        let oid = ObjectId::new();
        let cast = attr.cast(DataValue::Array(vec![DataValue::String(oid.to_string())]));
        assert_eq!(cast, DataValue::Array(vec![DataValue::ObjectId(oid)]));
    }

    #[test]
    fn test_datetime_cast_from_string() {
        let attr = datetime_attr();
        assert!(attr.validate(&DataValue::String("2024-01-01T00:00:00Z".into())));
        assert!(!attr.validate(&DataValue::String("昨天".into())));
        let cast = attr.cast(DataValue::String("2024-01-01T00:00:00Z".into()));
        assert!(matches!(cast, DataValue::DateTime(_)));
    }

    #[test]
    fn test_validate_named_carries_field() {
        let attr = integer_attr(Some(0), None);
        let err = attr
            .validate_named("age", &DataValue::Int(-1))
            .unwrap_err();
        match err {
            DocDbError::InvalidAttribute { field, value } => {
                assert_eq!(field, "age");
                assert_eq!(value, "-1");
            }
            other => panic!("意外的错误类型: {:?}", other),
        }
    }

    #[test]
    fn test_with_default_prefills() {
        let attr = integer_attr(None, None).with_default(DataValue::Int(0));
        assert_eq!(attr.default, Some(DataValue::Int(0)));
    }
}
