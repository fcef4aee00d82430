use crate::Id;
use axum_login::AuthUser;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored in place of a hash for accounts that may only sign in through a
/// federated provider. `password-auth` never verifies a value in this form.
pub const UNUSABLE_PASSWORD_PREFIX: char = '!';

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::users::Model)]
#[sea_orm(schema_name = "social_app", table_name = "users")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_staff: bool,
    pub is_active: bool,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// False for federated-only accounts, whose password login is permanently disabled.
    pub fn has_usable_password(&self) -> bool {
        !self.password.is_empty() && !self.password.starts_with(UNUSABLE_PASSWORD_PREFIX)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::profiles::Entity")]
    Profiles,
}

impl Related<super::profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl AuthUser for Model {
    type Id = Id;

    fn id(&self) -> Self::Id {
        self.id
    }

    // Sessions are invalidated whenever the stored hash changes, e.g. after a password reset.
    fn session_auth_hash(&self) -> &[u8] {
        self.password.as_bytes()
    }
}
