use crate::error::Error;
use chrono::Utc;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, Value,
};
use std::collections::HashMap;

/// Column every mutable table carries and that `update` stamps on each write.
const UPDATED_AT: &str = "updated_at";

/// Applies the columns present in `update_map` to `active_model` and saves it.
///
/// Columns missing from the map are left untouched. The `updated_at` column is
/// stamped with the current time unless the map already provides a value for it.
pub async fn update<A, C>(
    db: &impl ConnectionTrait,
    mut active_model: A,
    mut update_map: UpdateMap,
) -> Result<<A::Entity as EntityTrait>::Model, Error>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    C: ColumnTrait,
    A::Entity: EntityTrait<Column = C>,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    if update_map.get(UPDATED_AT).is_none() {
        update_map.insert(
            UPDATED_AT.to_string(),
            Some(Value::ChronoDateTimeWithTimeZone(Some(Box::new(
                Utc::now().fixed_offset(),
            )))),
        );
    }

    for column in C::iter() {
        if let Some(value) = update_map.get(&column.to_string()) {
            active_model.set(column, value.clone());
        }
    }
    Ok(active_model.update(db).await?)
}

/// Column names mapped to the values they should be updated to.
///
/// A key mapped to `None` is treated the same as a missing key. To write SQL
/// `NULL` into a nullable column insert a typed null such as
/// `Value::String(None)`.
#[derive(Debug, Default)]
pub struct UpdateMap {
    map: HashMap<String, Option<Value>>,
}

impl UpdateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key).and_then(|opt| opt.as_ref())
    }

    pub fn insert(&mut self, key: String, value: Option<Value>) {
        self.map.insert(key, value);
    }
}

/// Implemented by validated inputs that know which columns they change.
pub trait IntoUpdateMap {
    fn into_update_map(self) -> UpdateMap;
}
