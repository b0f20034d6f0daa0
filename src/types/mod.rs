//! 核心数据类型定义
//!
//! 定义文档值、主键、查询条件和更新操作等通用类型

pub mod data_value;
pub mod object_id;
pub mod query;
pub mod update_operations;

// 重新导出所有公共类型以保持API兼容性
pub use data_value::{DataValue, Document};
pub use object_id::ObjectId;
pub use query::{CompareOp, Criteria, QueryCondition, PRIMARY_KEY_FIELD};
pub use update_operations::{UpdateOperation, UpdateOperator};
