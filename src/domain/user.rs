use crate::domain::Principal;
use crate::domain::user::driving_ports::{AuthenticateError, RegisterUserError};
use crate::external_connections::ExternalConnectivity;
use anyhow::{Context, anyhow};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{error, info};

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to sign a new user up. The password is still in plain text here.
#[cfg_attr(test, derive(Clone, Debug))]
pub struct UserRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// A user as it gets written to storage, with the password already hashed
pub struct NewUserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// What's needed to check a login attempt for a user
pub struct UserCredentials {
    pub user_id: i32,
    pub password_hash: String,
}

pub mod driven_ports {
    use super::*;

    pub trait UserReader {
        async fn get_by_id(
            &self,
            id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<User>, anyhow::Error>;
        async fn credentials_by_email(
            &self,
            email: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<UserCredentials>, anyhow::Error>;
    }

    pub trait UserWriter {
        /// Stores a new user. Fails with [RegisterUserError::EmailTaken] if the email address
        /// was claimed in the meantime.
        async fn create_user(
            &self,
            user: &NewUserRecord,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<i32, RegisterUserError>;
    }

    pub trait DetectUser {
        async fn user_exists(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;

        async fn user_with_email_exists(
            &self,
            email: &str,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum RegisterUserError {
        #[error("A user with that email address already exists.")]
        EmailTaken,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[derive(Debug, Error)]
    pub enum AuthenticateError {
        #[error("The email address or password was incorrect.")]
        InvalidCredentials,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }


    pub trait UserPort {
        async fn get_user(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
        ) -> Result<Option<User>, anyhow::Error>;
        async fn register_user(
            &self,
            registration: &UserRegistration,
            ext_cxn: &mut impl ExternalConnectivity,
            u_writer: &impl driven_ports::UserWriter,
            u_detect: &impl driven_ports::DetectUser,
        ) -> Result<i32, RegisterUserError>;
        async fn authenticate(
            &self,
            email: &str,
            password: &str,
            ext_cxn: &mut impl ExternalConnectivity,
            u_reader: &impl driven_ports::UserReader,
        ) -> Result<Principal, AuthenticateError>;
    }
}

pub struct UserService {}

#[derive(Debug, Error)]
pub(super) enum UserExistsErr {
    #[error("user with ID {0} does not exist")]
    UserDoesNotExist(i32),

    #[error(transparent)]
    PortError(#[from] anyhow::Error),
}

pub(super) async fn verify_user_exists(
    id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    user_detect: &impl driven_ports::DetectUser,
) -> Result<(), UserExistsErr> {
    let does_user_exist = user_detect.user_exists(id, ext_cxn).await?;

    if does_user_exist {
        Ok(())
    } else {
        Err(UserExistsErr::UserDoesNotExist(id))
    }
}

/// Checked against when a login names an unknown email address, so the attempt costs as much as
/// one for a real user
static UNKNOWN_USER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password_now("no user has this password").ok());

/// Hashes a password into a PHC string with a fresh random salt
fn hash_password_now(password: &str) -> Result<String, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("hashing a password: {err}"))?;

    Ok(hash.to_string())
}

async fn hash_password(password: String) -> Result<String, anyhow::Error> {
    tokio::task::spawn_blocking(move || hash_password_now(&password))
        .await
        .context("waiting for a password to be hashed")?
}

/// Checks a password against the stored hash, or against a stand-in hash when there's no user.
/// Having no user never matches.
async fn password_matches(
    password: String,
    stored_hash: Option<String>,
) -> Result<bool, anyhow::Error> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(stored_hash) => password_matches_now(&password, &stored_hash),
        None => {
            if let Some(unknown_user_hash) = UNKNOWN_USER_HASH.as_deref() {
                password_matches_now(&password, unknown_user_hash);
            }
            false
        }
    })
    .await
    .context("waiting for a password to be checked")
}

fn password_matches_now(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(err) => {
            error!("A stored password hash could not be parsed: {err}");
            false
        }
    }
}

impl driving_ports::UserPort for UserService {
    async fn get_user(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
    ) -> Result<Option<User>, anyhow::Error> {
        u_reader
            .get_by_id(user_id, ext_cxn)
            .await
            .context("fetching a user by ID")
    }

    async fn register_user(
        &self,
        registration: &UserRegistration,
        ext_cxn: &mut impl ExternalConnectivity,
        u_writer: &impl driven_ports::UserWriter,
        u_detect: &impl driven_ports::DetectUser,
    ) -> Result<i32, RegisterUserError> {
        let email_taken = u_detect
            .user_with_email_exists(&registration.email, &mut *ext_cxn)
            .await
            .context("looking up an email address during registration")?;
        if email_taken {
            return Err(RegisterUserError::EmailTaken);
        }

        let record = NewUserRecord {
            name: registration.name.clone(),
            email: registration.email.clone(),
            password_hash: hash_password(registration.password.clone()).await?,
        };
        let new_user_id = u_writer
            .create_user(&record, &mut *ext_cxn)
            .await
            .map_err(|err| match err {
                RegisterUserError::EmailTaken => RegisterUserError::EmailTaken,
                RegisterUserError::PortError(port_err) => {
                    RegisterUserError::PortError(port_err.context("saving a newly registered user"))
                }
            })?;
        info!("Registered user {new_user_id}");

        Ok(new_user_id)
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        ext_cxn: &mut impl ExternalConnectivity,
        u_reader: &impl driven_ports::UserReader,
    ) -> Result<Principal, AuthenticateError> {
        let credentials = u_reader
            .credentials_by_email(email, ext_cxn)
            .await
            .context("fetching credentials for a login attempt")?;
        let stored_hash = credentials
            .as_ref()
            .map(|credentials| credentials.password_hash.clone());

        let matched = password_matches(password.to_owned(), stored_hash).await?;
        match credentials {
            Some(credentials) if matched => Ok(Principal {
                user_id: credentials.user_id,
            }),
            _ => Err(AuthenticateError::InvalidCredentials),
        }
    }
}
