//! 引用关系与反向引用级联集成测试
//!
//! 学生与课程互为引用：课程持有一对多的学生列表，插入课程时向
//! 每个学生文档的反向引用数组追加课程主键，且至多追加一次。

use rat_docdb::*;

fn register_models() {
    register_schema(
        Schema::new("it_students", "it_students")
            .with_attribute("name", string_attr(None, None, None).required())
            .with_attribute("courses", references("it_courses")),
    );
    register_schema(
        Schema::new("it_courses", "it_courses")
            .with_attribute("title", string_attr(None, None, None).required())
            .with_attribute("students", has_many("it_students", "courses")),
    );
}

async fn create_student(db: &Db, name: &str) -> Result<ObjectId, Box<dyn std::error::Error>> {
    let mut attributes = Document::new();
    attributes.insert("name".to_string(), name.into());
    let student = Entity::create(db.clone(), "it_students", attributes).await?;
    Ok(student.key().ok_or("学生创建后应持有主键")?)
}

fn course_keys(student: &Entity) -> Vec<DataValue> {
    match student.get("courses") {
        Some(DataValue::Array(items)) => items.clone(),
        other => panic!("预期课程主键数组，实际: {other:?}"),
    }
}

#[tokio::test]
async fn test_insert_appends_reverse_reference() -> Result<(), Box<dyn std::error::Error>> {
    register_models();
    let db = Db::memory();
    let s1 = create_student(&db, "小华").await?;
    let s2 = create_student(&db, "小梅").await?;

    let mut course = Entity::for_model(db.clone(), "it_courses")?;
    course.set("title", "代数")?;
    course.set(
        "students",
        DataValue::Array(vec![s1.clone().into(), s2.clone().into()]),
    )?;
    course.save(false).await?;
    let course_key = course.key().ok_or("课程保存后应持有主键")?;

    for student_key in [s1, s2] {
        let mut student = Entity::for_model(db.clone(), "it_students")?;
        student.load(&student_key).await?;
        let backrefs = course_keys(&student);
        assert_eq!(backrefs, vec![DataValue::ObjectId(course_key.clone())]);
    }
    println!("✅ 插入课程后每个学生获得一条反向引用");
    Ok(())
}

#[tokio::test]
async fn test_reverse_reference_appended_at_most_once() -> Result<(), Box<dyn std::error::Error>> {
    register_models();
    let db = Db::memory();
    let s1 = create_student(&db, "小强").await?;

    // 引用列表中重复出现同一学生，级联仍只追加一次
    let mut course = Entity::for_model(db.clone(), "it_courses")?;
    course.set("title", "几何")?;
    course.set(
        "students",
        DataValue::Array(vec![s1.clone().into(), s1.clone().into()]),
    )?;
    course.save(false).await?;
    let course_key = course.key().ok_or("课程保存后应持有主键")?;

    let mut student = Entity::for_model(db.clone(), "it_students")?;
    student.load(&s1).await?;
    assert_eq!(
        course_keys(&student),
        vec![DataValue::ObjectId(course_key.clone())]
    );

    // 第二门课程共享该学生，反向引用数组按序累积
    let mut second = Entity::for_model(db.clone(), "it_courses")?;
    second.set("title", "物理")?;
    second.set("students", DataValue::Array(vec![s1.clone().into()]))?;
    second.save(false).await?;
    let second_key = second.key().ok_or("课程保存后应持有主键")?;

    student.load(&s1).await?;
    assert_eq!(
        course_keys(&student),
        vec![
            DataValue::ObjectId(course_key),
            DataValue::ObjectId(second_key)
        ]
    );
    println!("✅ 反向引用至多追加一次，跨课程按序累积");
    Ok(())
}

#[tokio::test]
async fn test_cascade_failure_surfaces_after_main_write() -> Result<(), Box<dyn std::error::Error>>
{
    register_models();
    let db = Db::memory();

    let mut course = Entity::for_model(db.clone(), "it_courses")?;
    course.set("title", "化学")?;
    course.set(
        "students",
        DataValue::Array(vec![ObjectId::new().into()]),
    )?;

    let err = course.save(false).await.unwrap_err();
    match err {
        DocDbError::CascadeError { collection, .. } => assert_eq!(collection, "it_students"),
        other => panic!("预期级联错误，实际: {other}"),
    }

    // 主写入已提交，实体仍然视为已存在
    assert!(course.exists());
    let store = db.store().await?;
    assert_eq!(store.count("it_courses", &Criteria::All).await?, 1);
    println!("✅ 级联失败通过错误通道上报，主写入不回滚");
    Ok(())
}

#[tokio::test]
async fn test_has_one_reference_validation() -> Result<(), Box<dyn std::error::Error>> {
    register_models();
    register_schema(
        Schema::new("it_posts", "it_posts")
            .with_attribute("title", string_attr(None, None, None))
            .with_attribute("author", has_one("it_students")),
    );
    let db = Db::memory();
    let author = create_student(&db, "小林").await?;

    let mut post = Entity::for_model(db.clone(), "it_posts")?;
    post.set("title", "第一篇")?;

    // 一对一引用默认必填
    let err = post.save(false).await.unwrap_err();
    match err {
        DocDbError::MissingAttribute { field, .. } => assert_eq!(field, "author"),
        other => panic!("预期缺失属性错误，实际: {other}"),
    }

    // 非主键形式的取值被拒绝
    let err = post.set("author", 5).unwrap_err();
    assert!(matches!(err, DocDbError::InvalidAttribute { .. }));

    // 十六进制字符串形式转换为主键类型
    post.set("author", author.to_string())?;
    assert_eq!(post.get("author"), Some(&DataValue::ObjectId(author)));
    post.save(false).await?;
    println!("✅ 一对一引用必填且只接受主键形式");
    Ok(())
}

#[tokio::test]
async fn test_reference_arrays_validate_elements() -> Result<(), Box<dyn std::error::Error>> {
    register_models();
    let db = Db::memory();

    // 引用数组字段默认预填充为空数组
    let student = Entity::for_model(db.clone(), "it_students")?;
    assert_eq!(student.get("courses"), Some(&DataValue::Array(Vec::new())));

    let mut course = Entity::for_model(db, "it_courses")?;
    assert_eq!(course.get("students"), Some(&DataValue::Array(Vec::new())));

    // 数组元素逐个校验，非主键形式整体拒绝
    let err = course
        .set("students", DataValue::Array(vec![DataValue::Int(1)]))
        .unwrap_err();
    assert!(matches!(err, DocDbError::InvalidAttribute { .. }));
    println!("✅ 引用数组默认为空并逐元素校验");
    Ok(())
}

#[tokio::test]
async fn test_unregistered_target_falls_back_to_key_form(
) -> Result<(), Box<dyn std::error::Error>> {
    register_schema(
        Schema::new("it_notes", "it_notes")
            .with_attribute("owner", has_one("it_unregistered_model")),
    );
    let db = Db::memory();

    let mut note = Entity::for_model(db, "it_notes")?;
    // 目标模型未注册时退回主键形式校验
    note.set("owner", ObjectId::new())?;
    let err = note.set("owner", "不是主键").unwrap_err();
    assert!(matches!(err, DocDbError::InvalidAttribute { .. }));
    println!("✅ 目标模型未注册时按主键形式校验");
    Ok(())
}
