//! 实体定义宏
//!
//! 提供声明式的模型定义：一次声明生成规格的自动注册、每个字段的
//! 读取器与经过校验的设置器，以及类级便捷操作。

/// 便捷宏：定义实体模型
///
/// 生成包装 [`Entity`](crate::entity::Entity) 的模型结构体。规格在首次
/// 使用时注册到进程级注册表；每个声明的字段生成一对访问器（读取器与
/// 经过规格校验的设置器）；另生成 `create` / `fast_update` / `find`
/// 类级便捷操作。
///
/// # 示例
///
/// ```ignore
/// define_entity! {
///     /// 用户模型
///     struct User {
///         model = "users",
///         collection = "users",
///         attributes = {
///             name(set_name): string_attr(None, None, None).required(),
///             age(set_age): integer_attr(Some(0), None),
///         }
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_entity {
    (
        $(#[$meta:meta])*
        struct $name:ident {
            model = $model:expr,
            collection = $collection:expr,
            $( deny_unknown = $deny:expr, )?
            attributes = {
                $(
                    $(#[$field_meta:meta])*
                    $field:ident ( $setter:ident ): $spec:expr,
                )*
            }
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            entity: $crate::entity::Entity,
        }

        impl $name {
            /// 模型名
            pub const MODEL: &'static str = $model;

            /// 模型规格，首次调用时自动注册
            pub fn schema() -> std::sync::Arc<$crate::schema::Schema> {
                static ONCE: std::sync::Once = std::sync::Once::new();
                ONCE.call_once(|| {
                    #[allow(unused_mut)]
                    let mut schema = $crate::schema::Schema::new($model, $collection);
                    $(
                        schema = schema.with_attribute(stringify!($field), $spec);
                    )*
                    $(
                        if $deny {
                            schema = schema.deny_unknown();
                        }
                    )?
                    $crate::schema::register_schema(schema);
                    $crate::debug_log!("✅ 模型规格自动注册成功: {}", $model);
                });
                $crate::schema::lookup_schema(Self::MODEL)
                    .expect("严重错误：模型规格注册后未在注册表中找到")
            }

            /// 创建绑定的空实例，默认值预填充
            pub fn new(db: $crate::db::Db) -> Self {
                Self {
                    entity: $crate::entity::Entity::with_schema(db, Self::schema()),
                }
            }

            /// 底层实体
            pub fn entity(&self) -> &$crate::entity::Entity {
                &self.entity
            }

            /// 可变的底层实体
            pub fn entity_mut(&mut self) -> &mut $crate::entity::Entity {
                &mut self.entity
            }

            /// 当前主键
            pub fn key(&self) -> Option<$crate::types::ObjectId> {
                self.entity.key()
            }

            /// 记录是否已存在于存储中
            pub fn exists(&self) -> bool {
                self.entity.exists()
            }

            /// 读取任意属性
            pub fn get(&self, field: &str) -> Option<&$crate::types::DataValue> {
                self.entity.get(field)
            }

            /// 设置任意属性，经过规格校验
            pub fn set(
                &mut self,
                field: &str,
                value: impl Into<$crate::types::DataValue>,
            ) -> $crate::error::DocDbResult<()> {
                self.entity.set(field, value)
            }

            /// 按主键加载
            pub async fn load(
                &mut self,
                key: &$crate::types::ObjectId,
            ) -> $crate::error::DocDbResult<()> {
                self.entity.load(key).await
            }

            /// 按条件加载
            pub async fn load_by(
                &mut self,
                criteria: impl Into<$crate::types::Criteria>,
            ) -> $crate::error::DocDbResult<()> {
                self.entity.load_by(criteria).await
            }

            /// 保存：不存在走插入，已存在走按主键的增量更新
            pub async fn save(&mut self, force_update: bool) -> $crate::error::DocDbResult<()> {
                self.entity.save(force_update).await
            }

            /// 增量更新
            pub async fn update(&mut self) -> $crate::error::DocDbResult<()> {
                self.entity.update().await
            }

            /// 删除自身记录
            pub async fn delete(&mut self) -> $crate::error::DocDbResult<bool> {
                self.entity.delete().await
            }

            /// 属性映射副本，主键渲染为字符串形式
            pub fn to_response_document(&self) -> $crate::types::Document {
                self.entity.to_response_document()
            }

            /// 构造并保存的类级便捷操作
            pub async fn create(
                db: $crate::db::Db,
                attributes: $crate::types::Document,
            ) -> $crate::error::DocDbResult<Self> {
                let entity =
                    $crate::entity::Entity::create(db, Self::MODEL, attributes).await?;
                Ok(Self { entity })
            }

            /// 按主键加载后批量更新的类级便捷操作
            ///
            /// 记录不存在时传播加载错误，不执行更新。
            pub async fn fast_update(
                db: $crate::db::Db,
                key: &$crate::types::ObjectId,
                attributes: $crate::types::Document,
            ) -> $crate::error::DocDbResult<Self> {
                let entity =
                    $crate::entity::Entity::fast_update(db, Self::MODEL, key, attributes).await?;
                Ok(Self { entity })
            }

            /// 构造并加载集合容器的类级便捷操作，物化的实体携带本模型规格
            pub async fn find(
                db: $crate::db::Db,
                criteria: impl Into<$crate::types::Criteria>,
            ) -> $crate::error::DocDbResult<$crate::collection::Collection> {
                let mut collection =
                    $crate::collection::Collection::with_schema(db, Self::schema());
                collection.load(criteria).await?;
                Ok(collection)
            }

            $(
                $(#[$field_meta])*
                pub fn $field(&self) -> Option<&$crate::types::DataValue> {
                    self.entity.get(stringify!($field))
                }

                /// 设置该字段，经过规格校验
                pub fn $setter(
                    &mut self,
                    value: impl Into<$crate::types::DataValue>,
                ) -> $crate::error::DocDbResult<()> {
                    self.entity.set(stringify!($field), value)
                }
            )*
        }

        /// 实体相等性：主键的字符串形式相等即相等
        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.entity == other.entity
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::attribute::{integer_attr, string_attr};
    use crate::db::Db;
    use crate::error::DocDbError;
    use crate::schema::has_schema;
    use crate::types::DataValue;

    crate::define_entity! {
        /// 宏测试用户模型
        struct MacroUser {
            model = "test_macro_users",
            collection = "macro_users",
            attributes = {
                /// 用户名
                name(set_name): string_attr(Some(20), Some(1), None).required(),
                age(set_age): integer_attr(Some(0), Some(150)),
            }
        }
    }

    crate::define_entity! {
        struct StrictDoc {
            model = "test_macro_strict",
            collection = "macro_strict",
            deny_unknown = true,
            attributes = {
                title(set_title): string_attr(None, None, None),
            }
        }
    }

    #[test]
    fn test_schema_registered_once() {
        let schema = MacroUser::schema();
        assert!(has_schema("test_macro_users"));
        assert_eq!(schema.collection, "macro_users");
        assert!(schema.has_attribute("name"));
        assert!(schema.has_attribute("age"));

        // 重复调用拿到同一份注册规格
        let again = MacroUser::schema();
        assert_eq!(schema.model, again.model);
    }

    #[test]
    fn test_generated_accessors_validate() {
        let mut user = MacroUser::new(Db::memory());
        user.set_name("张三").unwrap();
        assert_eq!(user.name(), Some(&DataValue::String("张三".into())));

        user.set_age(30).unwrap();
        assert_eq!(user.age(), Some(&DataValue::Int(30)));

        let err = user.set_age(-1).unwrap_err();
        assert!(matches!(err, DocDbError::InvalidAttribute { .. }));
        assert_eq!(user.age(), Some(&DataValue::Int(30)));
    }

    #[test]
    fn test_deny_unknown_flag() {
        let mut doc = StrictDoc::new(Db::memory());
        doc.set_title("标题").unwrap();
        let err = doc.set("extra", 1).unwrap_err();
        assert!(matches!(err, DocDbError::UnknownAttribute { .. }));
    }

    #[tokio::test]
    async fn test_create_load_roundtrip() {
        let db = Db::memory();
        let mut attributes = crate::types::Document::new();
        attributes.insert("name".to_string(), "李四".into());
        attributes.insert("age".to_string(), 25.into());

        let created = MacroUser::create(db.clone(), attributes).await.unwrap();
        assert!(created.exists());
        let key = created.key().unwrap();

        let mut loaded = MacroUser::new(db);
        loaded.load(&key).await.unwrap();
        assert_eq!(loaded.name(), Some(&DataValue::String("李四".into())));
        assert_eq!(loaded, created);
    }

    #[tokio::test]
    async fn test_fast_update_requires_existing() {
        let db = Db::memory();
        let missing = crate::types::ObjectId::new();
        let mut attributes = crate::types::Document::new();
        attributes.insert("age".to_string(), 40.into());

        let err = MacroUser::fast_update(db, &missing, attributes)
            .await
            .unwrap_err();
        assert!(matches!(err, DocDbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_find_materializes_model_entities() {
        let db = Db::memory();
        for (name, age) in [("甲", 20), ("乙", 30)] {
            let mut attributes = crate::types::Document::new();
            attributes.insert("name".to_string(), name.into());
            attributes.insert("age".to_string(), age.into());
            MacroUser::create(db.clone(), attributes).await.unwrap();
        }

        let collection = MacroUser::find(db, crate::types::Criteria::All)
            .await
            .unwrap();
        assert_eq!(collection.len(), 2);
        let entity = collection.entity_at(0).unwrap();
        assert!(entity.exists());
        assert!(entity.schema().is_some());
    }
}
