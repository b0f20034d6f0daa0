//! rat_docdb 基本使用示例
//!
//! 本示例展示了如何使用 rat_docdb 进行基本的文档持久化操作,
//! 包括模型定义、实体的保存与加载、集合查询、二级索引
//! 以及一对多引用的反向引用级联。

use rat_docdb::*;
use rat_logger::handler::term::TermConfig;
use rat_logger::{LevelFilter, LoggerBuilder};

define_entity! {
    /// 学生模型
    struct Student {
        model = "demo_students",
        collection = "students",
        attributes = {
            name(set_name): string_attr(Some(32), Some(1), None).required(),
            age(set_age): integer_attr(Some(0), Some(150)),
            courses(set_courses): references("demo_courses"),
        }
    }
}

define_entity! {
    /// 课程模型
    struct Course {
        model = "demo_courses",
        collection = "courses",
        attributes = {
            title(set_title): string_attr(Some(64), Some(1), None).required(),
            students(set_students): has_many("demo_students", "courses"),
        }
    }
}

#[tokio::main]
async fn main() -> DocDbResult<()> {
    // 初始化日志系统
    let _ = LoggerBuilder::new()
        .with_level(LevelFilter::Debug)
        .add_terminal_with_config(TermConfig::default())
        .init();

    rat_docdb::init();
    println!("=== rat_docdb 基本使用示例 ===");
    println!("库版本: {}", rat_docdb::get_info());

    // 1. 创建数据库句柄
    // 示例使用内存存储；连接MongoDB时改用 Db::new(DbConfig::new(...))
    // 并启用 mongodb-support 特性
    println!("\n1. 创建数据库句柄...");
    let db = Db::memory();
    println!("✅ 句柄就绪: {:?}", db);

    // 2. 创建学生记录
    println!("\n2. 创建学生记录...");
    let mut student_keys = Vec::new();
    for (name, age) in [("张三", 20), ("李四", 22), ("王五", 20)] {
        let mut student = Student::new(db.clone());
        student.set_name(name)?;
        student.set_age(age)?;
        student.save(false).await?;
        let key = student.key().expect("保存后应分配主键");
        println!("✅ 学生已保存: {} -> {}", name, key);
        student_keys.push(key);
    }

    // 3. 校验先行：非法赋值在任何存储调用前被拒绝
    println!("\n3. 属性校验演示...");
    let mut invalid = Student::new(db.clone());
    match invalid.set_age(-1) {
        Err(e) => println!("✅ 非法年龄被拒绝: {}", e),
        Ok(_) => println!("❌ 非法年龄未被拒绝"),
    }

    // 4. 插入课程并触发反向引用级联
    println!("\n4. 插入课程，级联维护学生的反向引用...");
    let mut course = Course::new(db.clone());
    course.set_title("数据结构")?;
    course.set_students(DataValue::Array(
        student_keys.iter().cloned().map(Into::into).collect(),
    ))?;
    course.save(false).await?;
    let course_key = course.key().expect("保存后应分配主键");
    println!("✅ 课程已保存: {}", course_key);

    let mut first = Student::new(db.clone());
    first.load(&student_keys[0]).await?;
    println!("   学生 {:?} 的课程列表: {:?}", first.name(), first.courses());

    // 5. 集合查询与二级索引
    println!("\n5. 集合查询与二级索引...");
    let mut students = Student::find(db.clone(), Criteria::All).await?;
    println!("   学生总数: {}", students.len());

    let same_age = students.get_indexed_by("age", &DataValue::Int(20));
    println!("   20岁的学生有 {} 名", same_age.len());

    // 6. 条件加载与增量更新
    println!("\n6. 条件加载与增量更新...");
    let mut zhang = Student::new(db.clone());
    zhang.load_by(Criteria::field_eq("name", "张三")).await?;
    zhang.set_age(21)?;
    zhang.update().await?;
    println!("✅ 张三的年龄已更新为 {:?}", zhang.age());

    // 7. 条件跟踪助手：对最近一次查询条件直接下发更新操作
    println!("\n7. 更新操作演示...");
    if let Some(operate) = zhang.entity().operate() {
        let matched = operate.inc("age", 1).await?;
        println!("✅ 年龄递增命中 {} 条记录", matched);
    }
    let zhang_key = zhang.key().expect("应持有主键");
    zhang.load(&zhang_key).await?;
    println!("   重新加载后的年龄: {:?}", zhang.age());

    // 8. 删除记录
    println!("\n8. 删除记录...");
    let deleted = zhang.delete().await?;
    println!("✅ 删除结果: {}", deleted);
    let mut remaining = Student::find(db, Criteria::All).await?;
    println!("   剩余学生数量: {}", remaining.count(Criteria::All).await?);

    println!("\n=== 示例结束 ===");
    Ok(())
}
