//! 通用数据值类型
//!
//! 文档由字段名到 [`DataValue`] 的映射构成，在内存、JSON 和底层存储
//! 表示之间往返转换。

use crate::error::{DocDbError, DocDbResult};
use crate::types::object_id::ObjectId;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

/// 文档：字段名到数据值的映射
pub type Document = HashMap<String, DataValue>;

/// 通用数据值类型
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    /// 空值
    Null,
    /// 布尔值
    Bool(bool),
    /// 整数
    Int(i64),
    /// 浮点数
    Float(f64),
    /// 字符串
    String(String),
    /// 字节数组
    Bytes(Vec<u8>),
    /// UTC日期时间
    DateTime(DateTime<Utc>),
    /// 文档主键
    ObjectId(ObjectId),
    /// UUID
    Uuid(Uuid),
    /// 数组
    Array(Vec<DataValue>),
    /// 对象/嵌套文档
    Object(HashMap<String, DataValue>),
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Null => write!(f, "null"),
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Int(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::String(s) => write!(f, "{}", s),
            DataValue::Bytes(bytes) => write!(f, "[{} bytes]", bytes.len()),
            DataValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            DataValue::ObjectId(oid) => write!(f, "{}", oid),
            DataValue::Uuid(uuid) => write!(f, "{}", uuid),
            DataValue::Array(_) | DataValue::Object(_) => {
                write!(f, "{}", self.to_json_value())
            }
        }
    }
}

impl std::fmt::Debug for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Debug 与 Display 保持一致，显示实际值而不是类型构造函数
        write!(f, "{}", self)
    }
}

impl DataValue {
    /// 获取数据类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "boolean",
            DataValue::Int(_) => "integer",
            DataValue::Float(_) => "float",
            DataValue::String(_) => "string",
            DataValue::Bytes(_) => "bytes",
            DataValue::DateTime(_) => "datetime",
            DataValue::ObjectId(_) => "object_id",
            DataValue::Uuid(_) => "uuid",
            DataValue::Array(_) => "array",
            DataValue::Object(_) => "object",
        }
    }

    /// 判断是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// 序列/字符串类值的长度，非序列类型返回 None
    pub fn length(&self) -> Option<usize> {
        match self {
            DataValue::String(s) => Some(s.chars().count()),
            DataValue::Bytes(b) => Some(b.len()),
            DataValue::Array(a) => Some(a.len()),
            DataValue::Object(o) => Some(o.len()),
            _ => None,
        }
    }

    /// 转换为 JSON 值（主键与UUID渲染为字符串，字节渲染为 base64）
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            DataValue::Null => serde_json::Value::Null,
            DataValue::Bool(b) => serde_json::Value::Bool(*b),
            DataValue::Int(i) => serde_json::Value::Number(serde_json::Number::from(*i)),
            DataValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            DataValue::String(s) => serde_json::Value::String(s.clone()),
            DataValue::Bytes(b) => serde_json::Value::String(BASE64.encode(b)),
            DataValue::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            DataValue::ObjectId(oid) => serde_json::Value::String(oid.to_string()),
            DataValue::Uuid(u) => serde_json::Value::String(u.to_string()),
            DataValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(|v| v.to_json_value()).collect())
            }
            DataValue::Object(obj) => {
                let map: serde_json::Map<String, serde_json::Value> = obj
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect();
                serde_json::Value::Object(map)
            }
        }
    }

    /// 从 JSON 值解析为对应的 DataValue 类型
    pub fn from_json_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DataValue::Null,
            serde_json::Value::Bool(b) => DataValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DataValue::Int(i)
                } else {
                    DataValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => DataValue::String(s),
            serde_json::Value::Array(arr) => {
                DataValue::Array(arr.into_iter().map(DataValue::from_json_value).collect())
            }
            serde_json::Value::Object(obj) => DataValue::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, DataValue::from_json_value(v)))
                    .collect(),
            ),
        }
    }

    /// 转换为 JSON 字符串
    pub fn to_json_string(&self) -> DocDbResult<String> {
        serde_json::to_string(&self.to_json_value()).map_err(|e| {
            DocDbError::SerializationError {
                message: format!("DataValue 转换为 JSON 失败: {}", e),
            }
        })
    }

    /// 生成二级索引键
    ///
    /// 带类型标签，避免不同类型的相同字面值（如整数1与字符串"1"）互相碰撞。
    pub fn index_key(&self) -> String {
        match self {
            DataValue::Null => "n:".to_string(),
            DataValue::Bool(b) => format!("b:{}", b),
            DataValue::Int(i) => format!("i:{}", i),
            DataValue::Float(f) => format!("f:{}", f),
            DataValue::String(s) => format!("s:{}", s),
            DataValue::Bytes(b) => format!("x:{}", BASE64.encode(b)),
            DataValue::DateTime(dt) => format!("t:{}", dt.timestamp_millis()),
            DataValue::ObjectId(oid) => format!("o:{}", oid),
            DataValue::Uuid(u) => format!("u:{}", u),
            DataValue::Array(_) | DataValue::Object(_) => {
                format!("j:{}", self.to_json_value())
            }
        }
    }

    /// 同型值比较，用于比较型查询条件；类型不可比时返回 None
    pub fn compare_order(&self, other: &DataValue) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Int(a), DataValue::Int(b)) => Some(a.cmp(b)),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b),
            (DataValue::Int(a), DataValue::Float(b)) => (*a as f64).partial_cmp(b),
            (DataValue::Float(a), DataValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (DataValue::String(a), DataValue::String(b)) => Some(a.cmp(b)),
            (DataValue::DateTime(a), DataValue::DateTime(b)) => Some(a.cmp(b)),
            (DataValue::ObjectId(a), DataValue::ObjectId(b)) => Some(a.as_str().cmp(b.as_str())),
            (DataValue::Bool(a), DataValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(value)
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        DataValue::Int(value as i64)
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        DataValue::Int(value)
    }
}

impl From<f32> for DataValue {
    fn from(value: f32) -> Self {
        DataValue::Float(value as f64)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Float(value)
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(value: Vec<u8>) -> Self {
        DataValue::Bytes(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::DateTime(value)
    }
}

impl From<ObjectId> for DataValue {
    fn from(value: ObjectId) -> Self {
        DataValue::ObjectId(value)
    }
}

impl From<Uuid> for DataValue {
    fn from(value: Uuid) -> Self {
        DataValue::Uuid(value)
    }
}

impl From<Vec<DataValue>> for DataValue {
    fn from(value: Vec<DataValue>) -> Self {
        DataValue::Array(value)
    }
}

impl From<HashMap<String, DataValue>> for DataValue {
    fn from(value: HashMap<String, DataValue>) -> Self {
        DataValue::Object(value)
    }
}
