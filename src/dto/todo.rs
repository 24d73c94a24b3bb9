use super::{UserView, not_cleared, optional_text, patch_text, trimmed_optional, trimmed_patch};
use super::validation_error;
use crate::domain;
use crate::domain::Patch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

const TITLE_MAX_LENGTH: usize = 255;

/// DTO for creating a new todo via the API
#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Debug))]
pub struct NewTodo {
    #[serde(default, deserialize_with = "trimmed_optional")]
    #[validate(required, length(min = 1, max = 255))]
    #[schema(example = "Buy milk", max_length = 255)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    #[schema(example = "Two litres, semi-skimmed")]
    pub description: Option<String>,
}

impl From<NewTodo> for domain::todo::NewTodo {
    fn from(value: NewTodo) -> Self {
        domain::todo::NewTodo {
            title: value.title.unwrap_or_default(),
            description: value.description,
        }
    }
}

/// DTO for changing some of a todo's fields. Absent fields are left alone, and `null` clears
/// the description.
#[derive(Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Debug))]
pub struct UpdateTodo {
    #[serde(default, deserialize_with = "trimmed_patch")]
    #[validate(custom = "valid_title_patch")]
    #[schema(value_type = Option<String>, example = "Buy oat milk", max_length = 255)]
    pub title: Patch<String>,
    #[serde(default, deserialize_with = "patch_text")]
    #[schema(value_type = Option<String>)]
    pub description: Patch<String>,
    #[serde(default)]
    #[validate(custom = "not_cleared")]
    #[schema(value_type = Option<bool>, example = true)]
    pub completed: Patch<bool>,
}

fn valid_title_patch(title: &Patch<String>) -> Result<(), ValidationError> {
    not_cleared(title)?;
    let Patch::Set(title) = title else {
        return Ok(());
    };

    if title.is_empty() {
        return Err(validation_error("length", "The title cannot be blank."));
    }
    if title.chars().count() > TITLE_MAX_LENGTH {
        let mut error = validation_error("length", "The title may not be longer than 255 characters.");
        error.add_param("max".into(), &TITLE_MAX_LENGTH);
        return Err(error);
    }

    Ok(())
}

impl From<UpdateTodo> for domain::todo::UpdateTodo {
    fn from(value: UpdateTodo) -> Self {
        domain::todo::UpdateTodo {
            title: value.title,
            description: value.description,
            completed: value.completed,
        }
    }
}

/// DTO for a todo returned from the API
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct TodoView {
    #[schema(example = 10)]
    pub id: i32,
    #[schema(example = "Buy milk")]
    pub title: String,
    #[schema(example = "Two litres, semi-skimmed")]
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Only present when requested with `?include=user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

/// The cheap projection, which never embeds the owner
impl From<domain::todo::Todo> for TodoView {
    fn from(value: domain::todo::Todo) -> Self {
        TodoView {
            id: value.id,
            title: value.title,
            description: value.description,
            completed: value.completed,
            created_at: value.created_at,
            updated_at: value.updated_at,
            user: None,
        }
    }
}

impl TodoView {
    /// Projects a todo along with an already-loaded view of its owner
    pub fn with_owner(todo: domain::todo::Todo, owner: UserView) -> TodoView {
        TodoView {
            user: Some(owner),
            ..TodoView::from(todo)
        }
    }
}

#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct TodoList {
    pub todos: Vec<TodoView>,
}

/// Response for a newly created todo
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct CreatedTodo {
    #[schema(example = 5)]
    pub id: i32,
    #[schema(example = "Todo created successfully.")]
    pub success: String,
}

/// Confirms that a change went through
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug, PartialEq, Eq))]
pub struct Acknowledgement {
    #[schema(example = "Todo updated successfully.")]
    pub success: String,
}

impl Acknowledgement {
    pub fn new(message: &str) -> Acknowledgement {
        Acknowledgement {
            success: message.to_owned(),
        }
    }
}

/// Which relations to embed when listing todos, parsed from a comma-separated `include`
/// query parameter such as `user,user.timestamps`
#[derive(Deserialize, Default)]
#[cfg_attr(test, derive(Debug))]
pub struct TodoListQuery {
    pub include: Option<String>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum OwnerEmbedding {
    None,
    User,
    UserWithTimestamps,
}

impl TodoListQuery {
    pub fn owner_embedding(&self) -> OwnerEmbedding {
        let Some(include) = self.include.as_deref() else {
            return OwnerEmbedding::None;
        };
        let relations: Vec<&str> = include.split(',').map(str::trim).collect();

        if relations.contains(&"user.timestamps") {
            OwnerEmbedding::UserWithTimestamps
        } else if relations.contains(&"user") {
            OwnerEmbedding::User
        } else {
            OwnerEmbedding::None
        }
    }
}
