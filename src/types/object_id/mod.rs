//! 文档主键类型
//!
//! 生成类似MongoDB ObjectId的24位十六进制主键：
//! 时间戳(4字节) + 随机机器标识(5字节) + 计数器(3字节)

use crate::error::{DocDbError, DocDbResult};
use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 进程级随机机器标识（5字节），进程启动时生成一次
static MACHINE_ID: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut bytes = [0u8; 5];
    rand::thread_rng().fill(&mut bytes);
    bytes
});

/// 自增计数器，随机播种，取低3字节
static COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(rand::thread_rng().r#gen::<u32>() & 0xFF_FFFF));

/// 文档主键
///
/// 内部以24位小写十六进制字符串存储，与存储层的规范标识符类型一致。
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// 生成一个新的主键
    pub fn new() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as u32;

        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) & 0xFF_FFFF;

        let machine = *MACHINE_ID;
        let hex = format!(
            "{:08x}{:02x}{:02x}{:02x}{:02x}{:02x}{:06x}",
            timestamp, machine[0], machine[1], machine[2], machine[3], machine[4], counter
        );
        ObjectId(hex)
    }

    /// 从字符串解析主键，要求为24位十六进制
    pub fn parse_str(s: &str) -> DocDbResult<Self> {
        let s = s.trim();
        if s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(ObjectId(s.to_lowercase()))
        } else {
            Err(DocDbError::InvalidAttribute {
                field: "_id".to_string(),
                value: s.to_string(),
            })
        }
    }

    /// 判断字符串是否为合法主键形式
    pub fn is_valid(s: &str) -> bool {
        let s = s.trim();
        s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// 获取十六进制字符串表示
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = DocDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}
