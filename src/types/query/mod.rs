//! 查询条件类型
//!
//! 过滤条件限定为等值文档、主键简写和少量比较操作；不提供查询规划。

use crate::types::data_value::{DataValue, Document};
use crate::types::object_id::ObjectId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 主键字段名
pub const PRIMARY_KEY_FIELD: &str = "_id";

/// 比较操作符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompareOp {
    /// 等于
    Eq,
    /// 不等于
    Ne,
    /// 大于
    Gt,
    /// 大于等于
    Gte,
    /// 小于
    Lt,
    /// 小于等于
    Lte,
    /// 在列表中
    In,
    /// 字段存在
    Exists,
}

/// 单个查询条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCondition {
    /// 字段名
    pub field: String,
    /// 操作符
    pub operator: CompareOp,
    /// 值
    pub value: DataValue,
}

impl QueryCondition {
    pub fn new(field: impl Into<String>, operator: CompareOp, value: impl Into<DataValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// 判断文档是否满足该条件
    pub fn matches(&self, doc: &Document) -> bool {
        let actual = doc.get(&self.field);
        match self.operator {
            CompareOp::Exists => {
                let want = !matches!(self.value, DataValue::Bool(false));
                actual.is_some() == want
            }
            CompareOp::Eq => actual.map_or(false, |v| values_equal(v, &self.value)),
            CompareOp::Ne => actual.map_or(true, |v| !values_equal(v, &self.value)),
            CompareOp::In => {
                let Some(v) = actual else { return false };
                match &self.value {
                    DataValue::Array(candidates) => {
                        candidates.iter().any(|c| values_equal(v, c))
                    }
                    _ => false,
                }
            }
            CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                let Some(v) = actual else { return false };
                let Some(ord) = v.compare_order(&self.value) else {
                    return false;
                };
                match self.operator {
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Gte => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Lte => ord != Ordering::Greater,
                    _ => unreachable!(),
                }
            }
        }
    }
}

/// 等值比较，主键与其字符串形式视为相等
fn values_equal(a: &DataValue, b: &DataValue) -> bool {
    match (a, b) {
        (DataValue::ObjectId(oid), DataValue::String(s))
        | (DataValue::String(s), DataValue::ObjectId(oid)) => oid.as_str() == s,
        (DataValue::Int(i), DataValue::Float(f)) | (DataValue::Float(f), DataValue::Int(i)) => {
            (*i as f64) == *f
        }
        _ => a == b,
    }
}

/// 查询条件：选择记录的过滤器
///
/// 主键简写在发往存储层前规范化为 `{_id: key}` 等值文档。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criteria {
    /// 匹配全部文档
    All,
    /// 主键简写
    Key(ObjectId),
    /// 等值过滤文档
    Equals(Document),
    /// 比较条件列表（AND 连接）
    Conditions(Vec<QueryCondition>),
}

impl Criteria {
    /// 以主键构建条件
    pub fn key(id: ObjectId) -> Self {
        Criteria::Key(id)
    }

    /// 以单字段等值构建条件
    pub fn field_eq(field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        let mut doc = Document::new();
        doc.insert(field.into(), value.into());
        Criteria::Equals(doc)
    }

    /// 以单个比较条件构建
    pub fn field_cmp(
        field: impl Into<String>,
        operator: CompareOp,
        value: impl Into<DataValue>,
    ) -> Self {
        Criteria::Conditions(vec![QueryCondition::new(field, operator, value)])
    }

    /// 追加一个等值条件
    pub fn and_eq(self, field: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.and_cmp(field, CompareOp::Eq, value)
    }

    /// 追加一个比较条件
    pub fn and_cmp(
        self,
        field: impl Into<String>,
        operator: CompareOp,
        value: impl Into<DataValue>,
    ) -> Self {
        let extra = QueryCondition::new(field, operator, value);
        let mut conditions = self.into_conditions();
        conditions.push(extra);
        Criteria::Conditions(conditions)
    }

    /// 规范化为条件列表
    pub fn into_conditions(self) -> Vec<QueryCondition> {
        match self {
            Criteria::All => Vec::new(),
            Criteria::Key(id) => vec![QueryCondition::new(
                PRIMARY_KEY_FIELD,
                CompareOp::Eq,
                DataValue::ObjectId(id),
            )],
            Criteria::Equals(doc) => doc
                .into_iter()
                .map(|(field, value)| QueryCondition::new(field, CompareOp::Eq, value))
                .collect(),
            Criteria::Conditions(conditions) => conditions,
        }
    }

    /// 判断文档是否满足全部条件
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Criteria::All => true,
            Criteria::Key(id) => doc.get(PRIMARY_KEY_FIELD).map_or(false, |v| {
                values_equal(v, &DataValue::ObjectId(id.clone()))
            }),
            Criteria::Equals(fields) => fields
                .iter()
                .all(|(field, value)| doc.get(field).map_or(false, |v| values_equal(v, value))),
            Criteria::Conditions(conditions) => conditions.iter().all(|c| c.matches(doc)),
        }
    }

    /// 是否为空条件（匹配全部）
    pub fn is_all(&self) -> bool {
        match self {
            Criteria::All => true,
            Criteria::Equals(doc) => doc.is_empty(),
            Criteria::Conditions(conditions) => conditions.is_empty(),
            Criteria::Key(_) => false,
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria::All
    }
}

impl From<ObjectId> for Criteria {
    fn from(id: ObjectId) -> Self {
        Criteria::Key(id)
    }
}

impl From<Document> for Criteria {
    fn from(doc: Document) -> Self {
        Criteria::Equals(doc)
    }
}
