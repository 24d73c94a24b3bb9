use super::NewId;
use crate::domain;
use crate::domain::user::driving_ports::RegisterUserError;
use crate::domain::user::{NewUserRecord, User, UserCredentials};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query_as, query_scalar};

pub struct DbDetectUser;

impl domain::user::driven_ports::DetectUser for DbDetectUser {
    async fn user_exists(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        let exists: bool = query_scalar("SELECT EXISTS(SELECT 1 FROM users u WHERE u.id = $1)")
            .bind(user_id)
            .fetch_one(connection.borrow_connection())
            .await
            .context("Detecting user with ID")?;

        Ok(exists)
    }

    async fn user_with_email_exists(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        let exists: bool =
            query_scalar("SELECT EXISTS(SELECT 1 FROM users u WHERE lower(u.email) = lower($1))")
                .bind(email)
                .fetch_one(connection.borrow_connection())
                .await
                .context("Detecting user via email")?;

        Ok(exists)
    }
}

pub struct DbReadUsers;

#[derive(FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(value: UserRow) -> Self {
        User {
            id: value.id,
            name: value.name,
            email: value.email,
            email_verified_at: value.email_verified_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    id: i32,
    password_hash: String,
}

impl domain::user::driven_ports::UserReader for DbReadUsers {
    async fn get_by_id(
        &self,
        id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<User>, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let user = query_as::<_, UserRow>(
            "SELECT u.id, u.name, u.email, u.email_verified_at, u.created_at, u.updated_at \
             FROM users u WHERE u.id = $1",
        )
        .bind(id)
        .fetch_optional(cxn_handle.borrow_connection())
        .await
        .context("Fetching a user by id")?;

        Ok(user.map(User::from))
    }

    async fn credentials_by_email(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<UserCredentials>, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let credentials = query_as::<_, CredentialsRow>(
            "SELECT u.id, u.password_hash FROM users u WHERE lower(u.email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(cxn_handle.borrow_connection())
        .await
        .context("Fetching user credentials by email")?;

        Ok(credentials.map(|row| UserCredentials {
            user_id: row.id,
            password_hash: row.password_hash,
        }))
    }
}

pub struct DbWriteUsers;

impl domain::user::driven_ports::UserWriter for DbWriteUsers {
    async fn create_user(
        &self,
        user: &NewUserRecord,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<i32, RegisterUserError> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let insert_result = query_as::<_, NewId>(
            "INSERT INTO users(name, email, password_hash) VALUES ($1, $2, $3) RETURNING users.id",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(cxn_handle.borrow_connection())
        .await;

        match insert_result {
            Ok(new_id) => Ok(new_id.id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RegisterUserError::EmailTaken)
            }
            Err(err) => Err(Error::from(err).context("Inserting new user").into()),
        }
    }
}
