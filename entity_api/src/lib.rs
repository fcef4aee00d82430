use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;

pub use entity::{profiles, sex, users, Id};

pub mod error;
pub mod mutate;
pub mod profile;
pub mod user;

/// Seeds a staff account with a profile for local development.
pub async fn seed_database(db: &DatabaseConnection) -> Result<users::Model, error::Error> {
    let now = Utc::now();

    let admin = users::Model {
        id: Id::nil(),
        email: "admin@social.app".to_owned(),
        password: "dLxNxnjn&b!2sqkwFbb4s8jX".to_owned(),
        is_staff: true,
        is_active: true,
        created_at: now.into(),
        updated_at: now.into(),
    };

    let admin_profile = profiles::Model {
        id: Id::nil(),
        user_id: Id::nil(),
        first_name: "Admin".to_owned(),
        last_name: "User".to_owned(),
        sex: sex::Sex::Other,
        bio: "Site administrator".to_owned(),
        birthdate: NaiveDate::from_ymd_opt(1990, 1, 1),
        avatar: None,
        cover_image: None,
        created_at: now.into(),
        updated_at: now.into(),
    };

    let (admin, _profile) = user::create_with_profile(db, admin, admin_profile).await?;

    Ok(admin)
}
