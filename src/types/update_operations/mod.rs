//! 就地更新操作
//!
//! 操作符为显式枚举，每种操作一个类型化构造函数，不做动态名称拼接。

use crate::types::data_value::{DataValue, Document};
use serde::{Deserialize, Serialize};

/// 更新操作符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateOperator {
    /// 直接设置值
    Set,
    /// 删除字段
    Unset,
    /// 原子性增加
    Increment,
    /// 向数组尾部追加
    Push,
    /// 从数组中移除所有等值元素
    Pull,
}

/// 更新操作定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOperation {
    /// 要更新的字段名
    pub field: String,
    /// 更新操作类型
    pub operation: UpdateOperator,
    /// 更新的值
    pub value: DataValue,
}

impl UpdateOperation {
    /// 创建一个设置操作
    pub fn set(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            operation: UpdateOperator::Set,
            value: value.into(),
        }
    }

    /// 创建一个删除字段操作
    pub fn unset(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operation: UpdateOperator::Unset,
            value: DataValue::Null,
        }
    }

    /// 创建一个增加操作
    pub fn increment(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            operation: UpdateOperator::Increment,
            value: value.into(),
        }
    }

    /// 创建一个数组追加操作
    pub fn push(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            operation: UpdateOperator::Push,
            value: value.into(),
        }
    }

    /// 创建一个数组移除操作
    pub fn pull(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            operation: UpdateOperator::Pull,
            value: value.into(),
        }
    }

    /// 将操作就地应用到文档上（内存存储使用）
    pub fn apply_to(&self, doc: &mut Document) {
        match self.operation {
            UpdateOperator::Set => {
                doc.insert(self.field.clone(), self.value.clone());
            }
            UpdateOperator::Unset => {
                doc.remove(&self.field);
            }
            UpdateOperator::Increment => {
                let current = doc.get(&self.field).cloned().unwrap_or(DataValue::Int(0));
                let next = match (&current, &self.value) {
                    (DataValue::Int(a), DataValue::Int(b)) => DataValue::Int(a + b),
                    (DataValue::Float(a), DataValue::Float(b)) => DataValue::Float(a + b),
                    (DataValue::Int(a), DataValue::Float(b)) => {
                        DataValue::Float(*a as f64 + b)
                    }
                    (DataValue::Float(a), DataValue::Int(b)) => {
                        DataValue::Float(a + *b as f64)
                    }
                    _ => current,
                };
                doc.insert(self.field.clone(), next);
            }
            UpdateOperator::Push => {
                match doc.get_mut(&self.field) {
                    Some(DataValue::Array(items)) => items.push(self.value.clone()),
                    _ => {
                        doc.insert(
                            self.field.clone(),
                            DataValue::Array(vec![self.value.clone()]),
                        );
                    }
                }
            }
            UpdateOperator::Pull => {
                if let Some(DataValue::Array(items)) = doc.get_mut(&self.field) {
                    items.retain(|item| item != &self.value);
                }
            }
        }
    }
}
