use crate::domain;
use crate::domain::todo::driven_ports::{TodoReader, TodoWriter};
use crate::domain::todo::driving_ports::TodoError;
use crate::domain::user::driven_ports::DetectUser;
use crate::domain::{Patch, Principal};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Todo {
    pub id: i32,
    pub owner_user_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user-editable part of a todo
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TodoContent {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl Todo {
    pub fn content(&self) -> TodoContent {
        TodoContent {
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
        }
    }
}

#[cfg_attr(test, derive(Clone, Debug))]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
}

/// A partial update to a todo. Only fields which aren't [Patch::Unset] get changed.
#[derive(Default)]
#[cfg_attr(test, derive(Clone, Debug, PartialEq))]
pub struct UpdateTodo {
    pub title: Patch<String>,
    pub description: Patch<String>,
    pub completed: Patch<bool>,
}

impl UpdateTodo {
    /// Works out what the todo's content would be after this update
    pub fn apply_to(&self, todo: &Todo) -> TodoContent {
        TodoContent {
            title: self.title.clone().resolve_required(todo.title.clone()),
            description: self
                .description
                .clone()
                .resolve_nullable(todo.description.clone()),
            completed: self.completed.clone().resolve_required(todo.completed),
        }
    }
}

pub mod driven_ports {
    use super::*;

    pub trait TodoReader {
        /// Fetches every todo owned by a user, most recently created first
        async fn todos_for_user(
            &self,
            user_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<Todo>, anyhow::Error>;
        /// Fetches a todo no matter who owns it and locks it against concurrent changes until the
        /// surrounding transaction ends
        async fn lock_todo_by_id(
            &self,
            todo_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<Todo>, anyhow::Error>;
    }

    pub trait TodoWriter {
        async fn create_todo_for_user(
            &self,
            user_id: i32,
            new_todo: &NewTodo,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<i32, anyhow::Error>;

        /// Overwrites a todo's content and bumps its "updated at" timestamp
        async fn update_todo(
            &self,
            todo_id: i32,
            content: &TodoContent,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn delete_todo(
            &self,
            todo_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum TodoError {
        #[error("The specified user did not exist.")]
        UserDoesNotExist,
        #[error("The requested todo does not exist.")]
        NotFound,
        #[error("The todo belongs to another user.")]
        Forbidden,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    impl From<domain::user::UserExistsErr> for TodoError {
        fn from(value: domain::user::UserExistsErr) -> Self {
            match value {
                domain::user::UserExistsErr::UserDoesNotExist(user_id) => {
                    warn!("User {} didn't exist when working with todos.", user_id);
                    TodoError::UserDoesNotExist
                }
                domain::user::UserExistsErr::PortError(err) => {
                    TodoError::from(err.context("Verifying the todo owner exists"))
                }
            }
        }
    }


    pub trait TodoPort {
        async fn list_todos(
            &self,
            caller: Principal,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl DetectUser,
            todo_read: &impl driven_ports::TodoReader,
        ) -> Result<Vec<Todo>, TodoError>;
        async fn create_todo(
            &self,
            caller: Principal,
            new_todo: &NewTodo,
            ext_cxn: &mut impl ExternalConnectivity,
            u_detect: &impl DetectUser,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<i32, TodoError>;
        async fn update_todo(
            &self,
            caller: Principal,
            todo_id: i32,
            update: &UpdateTodo,
            ext_cxn: &mut impl ExternalConnectivity,
            todo_read: &impl driven_ports::TodoReader,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<(), TodoError>;
        async fn delete_todo(
            &self,
            caller: Principal,
            todo_id: i32,
            ext_cxn: &mut impl ExternalConnectivity,
            todo_read: &impl driven_ports::TodoReader,
            todo_write: &impl driven_ports::TodoWriter,
        ) -> Result<(), TodoError>;
    }
}

/// Loads a todo the caller is allowed to change. Existence is checked before ownership, so
/// a missing todo is reported as [TodoError::NotFound] even to a user who couldn't touch it.
async fn owned_todo(
    caller: Principal,
    todo_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_read: &impl TodoReader,
) -> Result<Todo, TodoError> {
    let todo = todo_read
        .lock_todo_by_id(todo_id, ext_cxn)
        .await
        .context("looking up a todo before changing it")?;
    let Some(todo) = todo else {
        return Err(TodoError::NotFound);
    };

    if todo.owner_user_id != caller.user_id {
        warn!(
            "User {} tried to change todo {} owned by user {}",
            caller.user_id, todo_id, todo.owner_user_id
        );
        return Err(TodoError::Forbidden);
    }

    Ok(todo)
}

pub struct TodoService {}

impl driving_ports::TodoPort for TodoService {
    async fn list_todos(
        &self,
        caller: Principal,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl DetectUser,
        todo_read: &impl TodoReader,
    ) -> Result<Vec<Todo>, TodoError> {
        domain::user::verify_user_exists(caller.user_id, &mut *ext_cxn, u_detect).await?;
        let todos = todo_read
            .todos_for_user(caller.user_id, &mut *ext_cxn)
            .await
            .context("listing a user's todos")?;

        Ok(todos)
    }

    async fn create_todo(
        &self,
        caller: Principal,
        new_todo: &NewTodo,
        ext_cxn: &mut impl ExternalConnectivity,
        u_detect: &impl DetectUser,
        todo_write: &impl TodoWriter,
    ) -> Result<i32, TodoError> {
        domain::user::verify_user_exists(caller.user_id, &mut *ext_cxn, u_detect).await?;
        let created_todo_id = todo_write
            .create_todo_for_user(caller.user_id, new_todo, &mut *ext_cxn)
            .await
            .context("creating a todo")?;

        Ok(created_todo_id)
    }

    async fn update_todo(
        &self,
        caller: Principal,
        todo_id: i32,
        update: &UpdateTodo,
        ext_cxn: &mut impl ExternalConnectivity,
        todo_read: &impl TodoReader,
        todo_write: &impl TodoWriter,
    ) -> Result<(), TodoError> {
        let existing = owned_todo(caller, todo_id, &mut *ext_cxn, todo_read).await?;

        let updated_content = update.apply_to(&existing);
        if updated_content == existing.content() {
            debug!("Update to todo {todo_id} changes nothing, skipping the write");
            return Ok(());
        }

        todo_write
            .update_todo(todo_id, &updated_content, &mut *ext_cxn)
            .await
            .context("updating a todo")?;

        Ok(())
    }

    async fn delete_todo(
        &self,
        caller: Principal,
        todo_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
        todo_read: &impl TodoReader,
        todo_write: &impl TodoWriter,
    ) -> Result<(), TodoError> {
        owned_todo(caller, todo_id, &mut *ext_cxn, todo_read).await?;

        todo_write
            .delete_todo(todo_id, &mut *ext_cxn)
            .await
            .context("deleting a todo")?;

        Ok(())
    }
}
