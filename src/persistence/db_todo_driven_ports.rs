use super::NewId;
use crate::domain;
use crate::domain::todo::{NewTodo, Todo, TodoContent};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query, query_as};

pub struct DbTodoReader;

#[derive(FromRow)]
struct TodoRow {
    id: i32,
    user_id: i32,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TodoRow> for Todo {
    fn from(value: TodoRow) -> Self {
        Todo {
            id: value.id,
            owner_user_id: value.user_id,
            title: value.title,
            description: value.description,
            completed: value.completed,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl domain::todo::driven_ports::TodoReader for DbTodoReader {
    async fn todos_for_user(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<Todo>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let todos: Vec<Todo> = query_as::<_, TodoRow>(
            "SELECT t.id, t.user_id, t.title, t.description, t.completed, t.created_at, t.updated_at \
             FROM todos t WHERE t.user_id = $1 ORDER BY t.created_at DESC, t.id DESC",
        )
        .bind(user_id)
        .fetch_all(cxn.borrow_connection())
        .await
        .context("trying to fetch todos for a user")?
        .into_iter()
        .map(Todo::from)
        .collect();

        Ok(todos)
    }

    async fn lock_todo_by_id(
        &self,
        todo_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<Todo>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let todo = query_as::<_, TodoRow>(
            "SELECT t.id, t.user_id, t.title, t.description, t.completed, t.created_at, t.updated_at \
             FROM todos t WHERE t.id = $1 FOR UPDATE",
        )
        .bind(todo_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("trying to lock a todo by ID")?
        .map(Todo::from);

        Ok(todo)
    }
}

pub struct DbTodoWriter;

impl domain::todo::driven_ports::TodoWriter for DbTodoWriter {
    async fn create_todo_for_user(
        &self,
        user_id: i32,
        new_todo: &NewTodo,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<i32, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let new_id = query_as::<_, NewId>(
            "INSERT INTO todos(user_id, title, description) VALUES ($1, $2, $3) RETURNING todos.id",
        )
        .bind(user_id)
        .bind(&new_todo.title)
        .bind(&new_todo.description)
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to insert a new todo into the database")?;

        Ok(new_id.id)
    }

    async fn update_todo(
        &self,
        todo_id: i32,
        content: &TodoContent,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query(
            "UPDATE todos SET title = $1, description = $2, completed = $3, updated_at = now() \
             WHERE id = $4",
        )
        .bind(&content.title)
        .bind(&content.description)
        .bind(content.completed)
        .bind(todo_id)
        .execute(cxn.borrow_connection())
        .await
        .context("trying to update a todo in the database")?;

        Ok(())
    }

    async fn delete_todo(
        &self,
        todo_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<(), Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        query("DELETE FROM todos WHERE id = $1")
            .bind(todo_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a todo from the database")?;

        Ok(())
    }
}
