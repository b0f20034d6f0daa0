//! 数据库连接句柄
//!
//! [`Db`] 是包裹共享内部状态的轻量句柄，按需克隆后注入到每个实体和
//! 集合中。连接在首次使用时惰性建立（可观测的一次性日志），`sleep`
//! 释放连接，`wakeup` 或任意后续操作按同一配置重新建立。

use crate::adapter::{DocumentStore, MemoryStore};
use crate::config::DbConfig;
use crate::error::DocDbResult;
use parking_lot::RwLock;
use rat_logger::info;
use std::sync::Arc;

/// 后端选择：外部注入的共享存储，或按配置连接MongoDB
enum Backend {
    /// 进程内共享的存储实例（内存存储或调用方注入的实现）
    Shared(Arc<dyn DocumentStore>),
    /// 按配置惰性连接MongoDB
    #[cfg(feature = "mongodb-support")]
    Mongo,
}

struct DbInner {
    config: DbConfig,
    backend: Backend,
    /// 活动连接；`None` 表示尚未建立或已被 `sleep` 释放
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
}

/// 数据库连接句柄
///
/// 克隆开销极低，所有克隆共享同一连接状态。配置在构建后不可变。
#[derive(Clone)]
pub struct Db {
    inner: Arc<DbInner>,
}

impl Db {
    /// 创建MongoDB后端句柄，连接在首次操作时建立
    #[cfg(feature = "mongodb-support")]
    pub fn new(config: DbConfig) -> DocDbResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(DbInner {
                config,
                backend: Backend::Mongo,
                store: RwLock::new(None),
            }),
        })
    }

    /// 以内存存储创建句柄，用于测试和本地开发
    pub fn memory() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), DbConfig::default())
    }

    /// 以外部提供的存储实例创建句柄
    pub fn with_store(store: Arc<dyn DocumentStore>, config: DbConfig) -> Self {
        Self {
            inner: Arc::new(DbInner {
                config,
                backend: Backend::Shared(store),
                store: RwLock::new(None),
            }),
        }
    }

    /// 当前配置
    pub fn config(&self) -> &DbConfig {
        &self.inner.config
    }

    /// 是否持有活动连接
    pub fn is_connected(&self) -> bool {
        self.inner.store.read().is_some()
    }

    /// 获取活动连接，必要时惰性建立
    pub async fn store(&self) -> DocDbResult<Arc<dyn DocumentStore>> {
        if let Some(store) = self.inner.store.read().clone() {
            return Ok(store);
        }

        let store = self.establish().await?;

        let mut guard = self.inner.store.write();
        if let Some(existing) = guard.clone() {
            // 并发建立时沿用先写入的连接
            return Ok(existing);
        }
        *guard = Some(store.clone());
        info!(
            "已建立文档存储连接: {}:{}/{} (连接池 {})",
            self.inner.config.host,
            self.inner.config.port,
            self.inner.config.database,
            self.inner.config.pool_id
        );
        Ok(store)
    }

    async fn establish(&self) -> DocDbResult<Arc<dyn DocumentStore>> {
        match &self.inner.backend {
            Backend::Shared(store) => Ok(store.clone()),
            #[cfg(feature = "mongodb-support")]
            Backend::Mongo => {
                let store = crate::adapter::MongoStore::connect(&self.inner.config).await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// 释放活动连接；后续操作或 `wakeup` 会重新建立
    pub fn sleep(&self) {
        let released = self.inner.store.write().take().is_some();
        if released {
            info!(
                "已释放文档存储连接: {}:{}",
                self.inner.config.host, self.inner.config.port
            );
        }
    }

    /// 立即重新建立连接
    pub async fn wakeup(&self) -> DocDbResult<()> {
        self.store().await.map(|_| ())
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("pool_id", &self.inner.config.pool_id)
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("database", &self.inner.config.database)
            .field("connected", &self.is_connected())
            .finish()
    }
}
