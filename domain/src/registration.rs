//! Creating a local account together with its profile.

use crate::error::Error;
use crate::form::{
    clean_choice, clean_date, clean_email, clean_new_password, clean_text, validate_both,
    FieldErrors, Validate, Validated,
};
use crate::profile::MAX_NAME_LENGTH;
use crate::{profiles, sex::Sex, users, Id};
use chrono::{NaiveDate, Utc};
use log::*;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DUPLICATE_EMAIL: &str = "User with this Email already exists.";

/// Account half of the registration page.
#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct AccountForm {
    pub email: String,
    pub password1: String,
    pub password2: String,
}

/// Profile half of the registration page.
#[derive(Debug, Default, Clone, Deserialize, Serialize, ToSchema)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub sex: String,
    pub birthdate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    pub sex: Sex,
    pub birthdate: NaiveDate,
}

impl Validate for AccountForm {
    type Output = NewAccount;

    fn validate(&self) -> Validated<NewAccount> {
        let mut errors = FieldErrors::new();
        let email = clean_email(&mut errors, "email", &self.email);
        let password = clean_new_password(
            &mut errors,
            ("password1", &self.password1),
            ("password2", &self.password2),
            email.as_deref(),
        );

        match (email, password) {
            (Some(email), Some(password)) => Ok(NewAccount { email, password }),
            _ => Err(errors),
        }
    }
}

impl Validate for ProfileForm {
    type Output = NewProfile;

    fn validate(&self) -> Validated<NewProfile> {
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
        let birthdate = clean_date(&mut errors, "birthdate", &self.birthdate, true).flatten();

        match (first_name, last_name, sex, birthdate) {
            (Some(first_name), Some(last_name), Some(sex), Some(birthdate)) => Ok(NewProfile {
                first_name,
                last_name,
                sex,
                birthdate,
            }),
            _ => Err(errors),
        }
    }
}

/// Validates both forms and, when both are clean, inserts the user and its
/// profile in one transaction.
///
/// Invalid input and an already registered email are returned as
/// `Ok(Err(FieldErrors))` so the caller can re-render the page; only storage
/// failures surface as `Err`.
pub async fn register(
    db: &DatabaseConnection,
    account_form: &AccountForm,
    profile_form: &ProfileForm,
) -> Result<Validated<(users::Model, profiles::Model)>, Error> {
    let (account, profile) = match validate_both(account_form.validate(), profile_form.validate())
    {
        Ok(cleaned) => cleaned,
        Err(errors) => return Ok(Err(errors)),
    };

    if entity_api::user::find_by_email(db, &account.email)
        .await?
        .is_some()
    {
        debug!("Registration rejected, {} is already registered", account.email);
        return Ok(Err(FieldErrors::single("email", DUPLICATE_EMAIL)));
    }

    let now = Utc::now();
    let user_model = users::Model {
        id: Id::nil(),
        email: account.email,
        password: account.password,
        is_staff: false,
        is_active: true,
        created_at: now.into(),
        updated_at: now.into(),
    };
    let profile_model = profiles::Model {
        id: Id::nil(),
        user_id: Id::nil(),
        first_name: profile.first_name,
        last_name: profile.last_name,
        sex: profile.sex,
        bio: String::new(),
        birthdate: Some(profile.birthdate),
        avatar: None,
        cover_image: None,
        created_at: now.into(),
        updated_at: now.into(),
    };

    match entity_api::user::create_with_profile(db, user_model, profile_model).await {
        Ok((user, profile)) => {
            info!("Registered user {}", user.id);
            Ok(Ok((user, profile)))
        }
        Err(err) => duplicate_email_errors(Error::from(err)).map(Err),
    }
}

/// A concurrent registration for the same email won the race: the unique
/// index turns the insert into a conflict, reported like any taken email.
fn duplicate_email_errors(err: Error) -> Result<FieldErrors, Error> {
    if err.is_conflict() {
        warn!("Registration lost a race on a unique email: {err:?}");
        Ok(FieldErrors::single("email", DUPLICATE_EMAIL))
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{INVALID_DATE, PASSWORD_MISMATCH, REQUIRED};

    fn account_form() -> AccountForm {
        AccountForm {
            email: "ada@example.com".to_string(),
            password1: "Secret123!".to_string(),
            password2: "Secret123!".to_string(),
        }
    }

    fn profile_form() -> ProfileForm {
        ProfileForm {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            sex: "Female".to_string(),
            birthdate: "1815-12-10".to_string(),
        }
    }

    #[test]
    fn valid_forms_clean_into_new_account_and_profile() {
        let account = account_form().validate().unwrap();
        let profile = profile_form().validate().unwrap();

        assert_eq!(account.email, "ada@example.com");
        assert_eq!(profile.sex, Sex::Female);
        assert_eq!(profile.birthdate, NaiveDate::from_ymd_opt(1815, 12, 10).unwrap());
    }

    #[test]
    fn errors_from_both_forms_are_reported_together() {
        let account = AccountForm {
            password2: "Different1!".to_string(),
            ..account_form()
        };
        let profile = ProfileForm {
            first_name: String::new(),
            birthdate: "tomorrow".to_string(),
            ..profile_form()
        };

        let errors = validate_both(account.validate(), profile.validate()).unwrap_err();

        assert_eq!(errors.get("password2"), [PASSWORD_MISMATCH]);
        assert_eq!(errors.get("first_name"), [REQUIRED]);
        assert_eq!(errors.get("birthdate"), [INVALID_DATE]);
        assert!(!errors.contains("email"));
    }

    #[test]
    fn unique_violation_becomes_the_duplicate_email_error() {
        let err = Error::from(entity_api::error::Error {
            source: None,
            error_kind: entity_api::error::EntityApiErrorKind::UniqueViolation,
        });

        let errors = duplicate_email_errors(err).unwrap();

        assert_eq!(errors.get("email"), [DUPLICATE_EMAIL]);
    }

    #[test]
    fn other_storage_errors_are_not_field_errors() {
        let err = Error::from(entity_api::error::Error::not_found());

        assert!(duplicate_email_errors(err).unwrap_err().is_not_found());
    }

    #[cfg(feature = "mock")]
    mod mock {
        use super::*;
        use sea_orm::{DatabaseBackend, DbErr, MockDatabase, RuntimeErr};

        fn stored_user() -> users::Model {
            let now = Utc::now();
            users::Model {
                id: Id::new_v4(),
                email: "ada@example.com".to_string(),
                password: "$argon2id$stored".to_string(),
                is_staff: false,
                is_active: true,
                created_at: now.into(),
                updated_at: now.into(),
            }
        }

        fn stored_profile(user_id: Id) -> profiles::Model {
            let now = Utc::now();
            profiles::Model {
                id: Id::new_v4(),
                user_id,
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                sex: Sex::Female,
                bio: String::new(),
                birthdate: NaiveDate::from_ymd_opt(1815, 12, 10),
                avatar: None,
                cover_image: None,
                created_at: now.into(),
                updated_at: now.into(),
            }
        }

        #[tokio::test]
        async fn register_creates_user_and_profile() -> Result<(), Error> {
            let user = stored_user();
            let profile = stored_profile(user.id);
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<users::Model>::new()])
                .append_query_results([[user.clone()]])
                .append_query_results([[profile.clone()]])
                .into_connection();

            let (created_user, created_profile) =
                register(&db, &account_form(), &profile_form()).await?.unwrap();

            assert_eq!(created_user.id, user.id);
            assert_eq!(created_profile.user_id, user.id);
            Ok(())
        }

        #[tokio::test]
        async fn register_rejects_a_registered_email_without_inserting() -> Result<(), Error> {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored_user()]])
                .into_connection();

            let errors = register(&db, &account_form(), &profile_form())
                .await?
                .unwrap_err();

            assert_eq!(errors.get("email"), [DUPLICATE_EMAIL]);
            assert!(!format!("{:?}", db.into_transaction_log()).contains("INSERT"));
            Ok(())
        }

        #[tokio::test]
        async fn register_reports_storage_failures_as_errors() {
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<users::Model>::new()])
                .append_query_errors([DbErr::Conn(RuntimeErr::Internal(
                    "connection reset".to_string(),
                ))])
                .into_connection();

            let result = register(&db, &account_form(), &profile_form()).await;

            assert!(result.is_err());
        }

        #[tokio::test]
        async fn invalid_forms_never_touch_the_database() -> Result<(), Error> {
            let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

            let errors = register(&db, &AccountForm::default(), &profile_form())
                .await?
                .unwrap_err();

            assert!(errors.contains("email"));
            assert!(db.into_transaction_log().is_empty());
            Ok(())
        }
    }
}
