//! 错误类型定义
//!
//! 提供库级统一错误类型：模式校验错误在赋值/提交前同步抛出，
//! 存储层错误通过异步操作的返回值原样转发，不做二次分类。

use thiserror::Error;

/// 文档ODM统一错误类型
#[derive(Error, Debug)]
pub enum DocDbError {
    /// 连接错误
    #[error("连接错误: {message}")]
    ConnectionError { message: String },

    /// 配置错误
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    /// 查询/存储操作错误（底层存储报告的失败，原样转发）
    #[error("查询错误: {message}")]
    QueryError { message: String },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    SerializationError { message: String },

    /// 属性校验失败（字段已声明，值不符合规格）
    #[error("无效属性: 字段 '{field}' 不接受值 {value}")]
    InvalidAttribute { field: String, value: String },

    /// 未声明的属性（模式拒绝未知字段时）
    #[error("未知属性: 字段 '{field}' 未在模式中声明")]
    UnknownAttribute { field: String },

    /// 必填属性缺失（插入/更新提交前检查）
    #[error("缺失属性: 模型 '{model}' 的必填字段 '{field}' 不存在")]
    MissingAttribute { model: String, field: String },

    /// 查询未命中任何文档
    #[error("未找到记录: 集合 '{collection}' 中无匹配文档")]
    NotFound { collection: String },

    /// 未绑定集合即发起存储操作
    #[error("未绑定集合: '{type_name}' 尚未绑定任何集合")]
    NotBound { type_name: String },

    /// 引用级联写入失败（主写入不回滚）
    #[error("级联更新失败: 集合 '{collection}' 主键 '{key}': {message}")]
    CascadeError {
        collection: String,
        key: String,
        message: String,
    },

    /// 模式未注册
    #[error("模式未注册: 模型 '{model}' 不在注册表中")]
    SchemaNotRegistered { model: String },
}

/// 统一结果类型
pub type DocDbResult<T> = Result<T, DocDbError>;

impl DocDbError {
    /// 是否为模式校验类错误（同步抛出的三类）
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            DocDbError::InvalidAttribute { .. }
                | DocDbError::UnknownAttribute { .. }
                | DocDbError::MissingAttribute { .. }
        )
    }

    /// 是否为"未找到"（非异常状态，调用方通过 exists 标志区分）
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocDbError::NotFound { .. })
    }
}
