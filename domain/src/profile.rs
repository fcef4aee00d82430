use crate::error::Error;
use crate::form::{
    clean_choice, clean_date, clean_optional_text, clean_text, FieldErrors, Validate, Validated,
};
use crate::{profiles, sex::Sex, Id, IntoUpdateMap, UpdateMap};
use chrono::NaiveDate;
use entity_api::mutate;
use log::*;
use sea_orm::{DatabaseConnection, IntoActiveModel, Value};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_NAME_LENGTH: usize = 30;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_IMAGE_REF_LENGTH: usize = 2048;

pub async fn find_by_id(db: &DatabaseConnection, id: Id) -> Result<profiles::Model, Error> {
    Ok(entity_api::profile::find_by_id(db, id).await?)
}

/// Every user gets a profile when the account is created, so a missing one is
/// reported as not found.
pub async fn find_by_user_id(
    db: &DatabaseConnection,
    user_id: Id,
) -> Result<profiles::Model, Error> {
    entity_api::profile::find_by_user_id(db, user_id)
        .await?
        .ok_or_else(|| entity_api::error::Error::not_found().into())
}

/// Fields editable from the profile page.
#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct ProfileUpdateForm {
    pub first_name: String,
    pub last_name: String,
    pub sex: String,
    pub bio: String,
    pub birthdate: String,
    pub avatar: String,
    pub cover_image: String,
}

impl ProfileUpdateForm {
    /// Pre-fills the form with the stored values.
    pub fn from_model(profile: &profiles::Model) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            sex: profile.sex.to_string(),
            bio: profile.bio.clone(),
            birthdate: profile
                .birthdate
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            avatar: profile.avatar.clone().unwrap_or_default(),
            cover_image: profile.cover_image.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub bio: String,
    pub birthdate: Option<NaiveDate>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

impl Validate for ProfileUpdateForm {
    type Output = ProfileChanges;

    fn validate(&self) -> Validated<ProfileChanges> {
        let mut errors = FieldErrors::new();
        let first_name = clean_text(
            &mut errors,
            "first_name",
            &self.first_name,
            MAX_NAME_LENGTH,
            true,
        );
        let last_name = clean_text(
            &mut errors,
            "last_name",
            &self.last_name,
            MAX_NAME_LENGTH,
            true,
        );
        let sex = clean_choice::<Sex>(&mut errors, "sex", &self.sex);
        let bio = clean_text(&mut errors, "bio", &self.bio, MAX_BIO_LENGTH, false);
        let birthdate = clean_date(&mut errors, "birthdate", &self.birthdate, false);
        let avatar = clean_optional_text(&mut errors, "avatar", &self.avatar, MAX_IMAGE_REF_LENGTH);
        let cover_image = clean_optional_text(
            &mut errors,
            "cover_image",
            &self.cover_image,
            MAX_IMAGE_REF_LENGTH,
        );

        match (
            first_name,
            last_name,
            sex,
            bio,
            birthdate,
            avatar,
            cover_image,
        ) {
            (
                Some(first_name),
                Some(last_name),
                Some(sex),
                Some(bio),
                Some(birthdate),
                Some(avatar),
                Some(cover_image),
            ) => Ok(ProfileChanges {
                first_name,
                last_name,
                sex,
                bio,
                birthdate,
                avatar,
                cover_image,
            }),
            _ => Err(errors),
        }
    }
}

impl IntoUpdateMap for ProfileChanges {
    fn into_update_map(self) -> UpdateMap {
        let mut update_map = UpdateMap::new();
        update_map.insert(
            "first_name".to_string(),
            Some(Value::String(Some(Box::new(self.first_name)))),
        );
        update_map.insert(
            "last_name".to_string(),
            Some(Value::String(Some(Box::new(self.last_name)))),
        );
        update_map.insert(
            "sex".to_string(),
            Some(Value::String(Some(Box::new(self.sex.to_string())))),
        );
        update_map.insert(
            "bio".to_string(),
            Some(Value::String(Some(Box::new(self.bio)))),
        );
        // Cleared optional fields are written as typed NULLs.
        update_map.insert(
            "birthdate".to_string(),
            Some(Value::ChronoDate(self.birthdate.map(Box::new))),
        );
        update_map.insert(
            "avatar".to_string(),
            Some(Value::String(self.avatar.map(Box::new))),
        );
        update_map.insert(
            "cover_image".to_string(),
            Some(Value::String(self.cover_image.map(Box::new))),
        );
        update_map
    }
}

/// Applies `form` to the profile owned by `user_id`.
pub async fn update(
    db: &DatabaseConnection,
    user_id: Id,
    form: &ProfileUpdateForm,
) -> Result<Validated<profiles::Model>, Error> {
    let changes = match form.validate() {
        Ok(changes) => changes,
        Err(errors) => return Ok(Err(errors)),
    };

    let existing = find_by_user_id(db, user_id).await?;
    debug!("Updating profile {} for user {user_id}", existing.id);

    let updated = mutate::update::<profiles::ActiveModel, profiles::Column>(
        db,
        existing.into_active_model(),
        changes.into_update_map(),
    )
    .await?;

    Ok(Ok(updated))
}
