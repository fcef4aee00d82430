use super::error::Error;
use chrono::Utc;
use entity::profiles::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ConnectionTrait, Set};

pub async fn create(db: &impl ConnectionTrait, profile_model: Model) -> Result<Model, Error> {
    debug!("New Profile to be inserted for user {}", profile_model.user_id);

    let now = Utc::now();
    let profile_active_model = ActiveModel {
        user_id: Set(profile_model.user_id),
        first_name: Set(profile_model.first_name),
        last_name: Set(profile_model.last_name),
        sex: Set(profile_model.sex),
        bio: Set(profile_model.bio),
        birthdate: Set(profile_model.birthdate),
        avatar: Set(profile_model.avatar),
        cover_image: Set(profile_model.cover_image),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(profile_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

pub async fn find_by_user_id(
    db: &impl ConnectionTrait,
    user_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::UserId.eq(user_id))
        .one(db)
        .await?)
}
