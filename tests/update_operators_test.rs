//! 更新操作与条件跟踪集成测试
//!
//! 条件跟踪助手在加载后持有最近一次查询条件，五种更新操作
//! 直接下发到存储层，内存属性不随之变化，以重新加载观察结果。

use rat_docdb::*;

async fn seed_article(db: &Db) -> Result<ObjectId, Box<dyn std::error::Error>> {
    let key = ObjectId::new();
    let mut doc = Document::new();
    doc.insert(PRIMARY_KEY_FIELD.to_string(), key.clone().into());
    doc.insert("title".to_string(), "起步".into());
    doc.insert("views".to_string(), DataValue::Int(8));
    doc.insert(
        "tags".to_string(),
        DataValue::Array(vec!["文档".into(), "数据库".into()]),
    );
    let store = db.store().await?;
    store.insert_one("it_articles", &doc).await?;
    Ok(key)
}

#[tokio::test]
async fn test_operate_requires_recorded_criteria() -> Result<(), Box<dyn std::error::Error>> {
    let db = Db::memory();
    let entity = Entity::new(db, "it_articles");
    let operate = entity.operate().ok_or("绑定实体应持有条件跟踪助手")?;

    // 尚未执行过查询，无条件可复用
    let err = operate.set("title", "无效").await.unwrap_err();
    assert!(matches!(err, DocDbError::QueryError { .. }));
    println!("✅ 未记录查询条件时更新操作被拒绝");
    Ok(())
}

#[tokio::test]
async fn test_set_and_unset_by_last_criteria() -> Result<(), Box<dyn std::error::Error>> {
    let db = Db::memory();
    let key = seed_article(&db).await?;

    let mut article = Entity::new(db.clone(), "it_articles");
    article.load(&key).await?;

    let operate = article.operate().ok_or("绑定实体应持有条件跟踪助手")?;
    assert_eq!(operate.set("status", "已发布").await?, 1);
    assert_eq!(operate.unset("title").await?, 1);

    let mut reloaded = Entity::new(db, "it_articles");
    reloaded.load(&key).await?;
    assert_eq!(
        reloaded.get("status"),
        Some(&DataValue::String("已发布".into()))
    );
    assert!(reloaded.get("title").is_none());
    println!("✅ 设置与移除作用于最近一次查询条件");
    Ok(())
}

#[tokio::test]
async fn test_increment_accumulates() -> Result<(), Box<dyn std::error::Error>> {
    let db = Db::memory();
    let key = seed_article(&db).await?;

    let mut article = Entity::new(db.clone(), "it_articles");
    article.load(&key).await?;

    let operate = article.operate().ok_or("绑定实体应持有条件跟踪助手")?;
    operate.inc("views", 5).await?;
    operate.inc("views", -3).await?;

    let mut reloaded = Entity::new(db, "it_articles");
    reloaded.load(&key).await?;
    assert_eq!(reloaded.get("views"), Some(&DataValue::Int(10)));
    println!("✅ 递增操作按量累积，支持负数");
    Ok(())
}

#[tokio::test]
async fn test_push_and_pull_array_elements() -> Result<(), Box<dyn std::error::Error>> {
    let db = Db::memory();
    let key = seed_article(&db).await?;

    let mut article = Entity::new(db.clone(), "it_articles");
    article.load(&key).await?;

    let operate = article.operate().ok_or("绑定实体应持有条件跟踪助手")?;
    operate.push("tags", "持久化").await?;
    operate.pull("tags", "文档").await?;

    let mut reloaded = Entity::new(db, "it_articles");
    reloaded.load(&key).await?;
    assert_eq!(
        reloaded.get("tags"),
        Some(&DataValue::Array(vec![
            "数据库".into(),
            "持久化".into()
        ]))
    );
    println!("✅ 数组追加与移除保持剩余元素顺序");
    Ok(())
}

#[tokio::test]
async fn test_operations_affect_all_matches() -> Result<(), Box<dyn std::error::Error>> {
    let db = Db::memory();
    let store = db.store().await?;
    for city in ["上海", "上海", "北京"] {
        let mut doc = Document::new();
        doc.insert(PRIMARY_KEY_FIELD.to_string(), ObjectId::new().into());
        doc.insert("city".to_string(), city.into());
        doc.insert("hits".to_string(), DataValue::Int(0));
        store.insert_one("it_visits", &doc).await?;
    }

    let mut visit = Entity::new(db.clone(), "it_visits");
    visit
        .load_by(Criteria::field_eq("city", "上海"))
        .await?;

    // 加载命中后条件归一为主键，更新只作用于该文档
    let operate = visit.operate().ok_or("绑定实体应持有条件跟踪助手")?;
    assert_eq!(operate.inc("hits", 1).await?, 1);

    let total: i64 = store
        .find("it_visits", &Criteria::All)
        .await?
        .iter()
        .filter_map(|doc| match doc.get("hits") {
            Some(DataValue::Int(n)) => Some(*n),
            _ => None,
        })
        .sum();
    assert_eq!(total, 1);
    println!("✅ 归一后的主键条件把更新限定在单个文档");
    Ok(())
}
