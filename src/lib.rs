//! rat_docdb - 文档数据库ODM库
//!
//! 提供模型规格、实体生命周期与带索引的集合容器的统一持久化接口，
//! 通过可替换的存储适配器支持内存存储与MongoDB

// 导出所有公共模块
pub mod error;
pub mod types;
pub mod config;
pub mod adapter;
pub mod db;
pub mod attribute;
pub mod schema;
pub mod persistable;
pub mod entity;
pub mod collection;
pub mod session;
pub mod macros;

// 重新导出常用类型和函数
pub use error::{DocDbError, DocDbResult};
pub use types::*;
pub use config::DbConfig;
pub use adapter::{DocumentStore, MemoryStore};
#[cfg(feature = "mongodb-support")]
pub use adapter::MongoStore;
pub use db::Db;
pub use attribute::{
    any_attr, array_attr, boolean_attr, datetime_attr, float_attr, has_many, has_one,
    integer_attr, object_attr, primary_key, references, string_attr, uuid_attr, Attribute,
    AttributeKind,
};
pub use schema::{
    has_schema, lookup_schema, register_schema, registered_models, require_schema, Schema,
};
pub use persistable::{Operate, Persistable};
pub use entity::Entity;
pub use collection::Collection;
pub use session::{Session, Sessions, DATA_FIELD, DEFAULT_SESSIONS_COLLECTION, EXPIRES_FIELD};

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_docdb库
///
/// 注意：日志系统由调用者自行初始化，本库不自动安装日志后端
pub fn init() {
    // 库的基本初始化逻辑
    // 日志系统由调用者负责初始化
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}
