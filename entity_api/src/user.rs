use super::error::{EntityApiErrorKind, Error};
use crate::profile;
use async_trait::async_trait;
use axum_login::{AuthnBackend, UserId};
use chrono::Utc;

use entity::profiles;
use entity::users::{ActiveModel, Column, Entity, Model, UNUSABLE_PASSWORD_PREFIX};
use entity::Id;
use log::*;
use sea_orm::{
    entity::prelude::*, sea_query::OnConflict, ConnectionTrait, DatabaseConnection, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// Inserts a user, hashing the plain-text password carried in `user_model.password`.
pub async fn create(db: &impl ConnectionTrait, user_model: Model) -> Result<Model, Error> {
    debug!("New User to be inserted: {}", user_model.email);

    let now = Utc::now();
    let user_active_model: ActiveModel = ActiveModel {
        email: Set(user_model.email),
        password: Set(generate_hash(user_model.password)),
        is_staff: Set(user_model.is_staff),
        is_active: Set(user_model.is_active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(user_active_model.insert(db).await?)
}

/// Inserts a user and its profile as one transaction. The profile's `user_id`
/// is taken from the inserted user, so a failed user insert never leaves a profile behind.
pub async fn create_with_profile(
    db: &impl TransactionTrait,
    user_model: Model,
    profile_model: profiles::Model,
) -> Result<(Model, profiles::Model), Error> {
    let txn = db.begin().await?;

    let user = create(&txn, user_model).await?;
    let profile = profile::create(
        &txn,
        profiles::Model {
            user_id: user.id,
            ..profile_model
        },
    )
    .await?;

    txn.commit().await?;

    Ok((user, profile))
}

/// Looks up the user with `email`, inserting a federated-only account when none exists.
///
/// The insert uses `ON CONFLICT (email) DO NOTHING` so two concurrent first logins
/// resolve to the same row. The returned flag is true only when this call inserted
/// the user; the profile is created in that case only.
pub async fn get_or_create_with_profile(
    db: &impl TransactionTrait,
    email: &str,
    profile_model: profiles::Model,
) -> Result<(Model, bool), Error> {
    let txn = db.begin().await?;
    let now = Utc::now();

    let user_active_model = ActiveModel {
        email: Set(email.to_owned()),
        password: Set(make_unusable_password()),
        is_staff: Set(false),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    let rows_inserted = Entity::insert(user_active_model)
        .on_conflict(OnConflict::column(Column::Email).do_nothing().to_owned())
        .exec_without_returning(&txn)
        .await?;
    let created = rows_inserted == 1;

    let user = find_by_email(&txn, email)
        .await?
        .ok_or_else(Error::not_found)?;

    if created {
        debug!("Created federated-only user {}", user.id);
        profile::create(
            &txn,
            profiles::Model {
                user_id: user.id,
                ..profile_model
            },
        )
        .await?;
    }

    txn.commit().await?;

    Ok((user, created))
}

pub async fn find_by_email(db: &impl ConnectionTrait, email: &str) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Email.eq(email))
        .one(db)
        .await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(Error::not_found)
}

/// Replaces the stored hash with a hash of `new_password`.
pub async fn set_password(
    db: &impl ConnectionTrait,
    user: Model,
    new_password: String,
) -> Result<Model, Error> {
    let mut active_model: ActiveModel = user.into();
    active_model.password = Set(generate_hash(new_password));
    active_model.updated_at = Set(Utc::now().into());

    Ok(active_model.update(db).await?)
}

pub async fn verify_password(password_to_verify: &str, password_hash: &str) -> Result<(), Error> {
    match password_auth::verify_password(password_to_verify, password_hash) {
        Ok(_) => Ok(()),
        Err(_) => Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordUnauthenticated,
        }),
    }
}

pub fn generate_hash(password: String) -> String {
    password_auth::generate_hash(password)
}

fn make_unusable_password() -> String {
    format!("{UNUSABLE_PASSWORD_PREFIX}{}", Id::new_v4().simple())
}

#[derive(Debug, Clone)]
pub struct Backend {
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Clone, ToSchema, IntoParams, Deserialize)]
#[schema(as = domain::user::Credentials)] // OpenAPI schema
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

impl Backend {
    pub fn new(db: &Arc<DatabaseConnection>) -> Self {
        Self {
            // Arc is cloned, but the source DatabaseConnection refers to the same instance
            // as the one passed in to new() (see the Arc documentation for more info)
            db: Arc::clone(db),
        }
    }
}

#[async_trait]
impl AuthnBackend for Backend {
    type User = Model;
    type Credentials = Credentials;
    type Error = Error;

    // Unknown email, wrong password, inactive account and federated-only account
    // all yield Ok(None) so callers cannot tell them apart.
    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let user = match find_by_email(self.db.as_ref(), &creds.email).await? {
            Some(user) => user,
            None => {
                debug!("No user registered for {}", creds.email);
                return Ok(None);
            }
        };

        if !user.is_active || !user.has_usable_password() {
            debug!("User {} may not sign in with a password", user.id);
            return Ok(None);
        }

        match verify_password(&creds.password, &user.password).await {
            Ok(()) => Ok(Some(user)),
            Err(_) => Ok(None),
        }
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(Entity::find_by_id(*user_id).one(self.db.as_ref()).await?)
    }
}

pub type AuthSession = axum_login::AuthSession<Backend>;
