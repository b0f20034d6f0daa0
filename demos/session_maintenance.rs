//! 会话持久化与过期清理示例
//!
//! 展示会话的打开、负载写入、过期时间维护与批量清理，
//! 以及连接句柄的休眠与唤醒。

use rat_docdb::*;
use rat_logger::handler::term::TermConfig;
use rat_logger::{LevelFilter, LoggerBuilder};
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[tokio::main]
async fn main() -> DocDbResult<()> {
    // 初始化日志系统
    let _ = LoggerBuilder::new()
        .with_level(LevelFilter::Debug)
        .add_terminal_with_config(TermConfig::default())
        .init();

    rat_docdb::init();
    println!("=== rat_docdb 会话维护示例 ===");

    let db = Db::memory();
    let lifetime_secs = 30 * 60;

    // 1. 打开新会话：未命中时得到携带该标识的待插入会话
    println!("\n1. 打开新会话...");
    let session_id = ObjectId::new();
    let mut session = Session::open(db.clone(), &session_id).await?;
    println!("   会话标识: {}，已存在: {}", session_id, session.exists());

    session.put("nickname", "青鸟")?;
    session.put("login_count", 1)?;
    session.touch(unix_now() + lifetime_secs)?;
    session.save().await?;
    println!("✅ 会话已落库");

    // 2. 再次打开同一会话：命中并回读负载
    println!("\n2. 重新打开会话...");
    let reopened = Session::open(db.clone(), &session_id).await?;
    println!(
        "   已存在: {}，昵称: {:?}，过期时间: {:?}",
        reopened.exists(),
        reopened.fetch("nickname"),
        reopened.expires_at()
    );

    // 3. 模拟一批已过期的会话
    println!("\n3. 写入已过期的会话...");
    for offset in [3600_i64, 7200, 10800] {
        let mut stale = Session::open(db.clone(), &ObjectId::new()).await?;
        stale.touch(unix_now() - offset)?;
        stale.save().await?;
    }
    println!("✅ 已写入3个过期会话");

    // 4. 周期清理：移除过期时间早于当前时刻的全部会话
    println!("\n4. 执行过期清理...");
    let mut sessions = Sessions::new(db.clone());
    let removed = sessions.sweep_expired(unix_now()).await?;
    println!("✅ 清理了 {} 个过期会话", removed);

    let remaining = sessions.collection_mut().count(Criteria::All).await?;
    println!("   剩余会话数量: {}", remaining);

    // 5. 释放连接后按原配置重新唤醒
    println!("\n5. 连接休眠与唤醒...");
    db.sleep();
    println!("   已释放连接，持有状态: {}", db.is_connected());
    db.wakeup().await?;
    println!("✅ 连接已重新建立，持有状态: {}", db.is_connected());

    println!("\n=== 示例结束 ===");
    Ok(())
}
