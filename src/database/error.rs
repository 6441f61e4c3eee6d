use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use potion::{Error, HtmlError};
use serde::Serialize;
use sqlx::error::ErrorKind;

pub fn not_found(info: &str) -> Error {
    Error {
        code: 404,
        info: Some(info.to_owned()),
        redirect: None,
    }
}

pub fn forbidden(info: &str) -> Error {
    Error {
        code: 403,
        info: Some(info.to_owned()),
        redirect: None,
    }
}

pub fn unauthenticated(info: &str) -> Error {
    Error {
        code: 401,
        info: Some(info.to_owned()),
        redirect: None,
    }
}

pub fn internal(info: &str) -> Error {
    Error {
        code: 500,
        info: Some(info.to_owned()),
        redirect: None,
    }
}

/// Human readable explanation for a violated constraint of `migrations/0001_foodgram.sql`.
pub fn constraint_message(constraint: &str) -> Option<&'static str> {
    match constraint {
        "unique_favorites" => Some("Recipe is already in favorites"),
        "unique_shopping_cart" => Some("Recipe is already in the shopping cart"),
        "unique_relationships" => Some("You are already subscribed to this author"),
        "prevent_self_follow" => Some("You cannot subscribe to yourself"),
        "unique_ingredient_in_recipe" => Some("Ingredients of a recipe must be unique"),
        "unique_tag_in_recipe" => Some("Tags of a recipe must be unique"),
        "unique_ingredient_unit" => Some("Ingredient with this unit already exists"),
        "users_username_key" => Some("A user with that username already exists"),
        "users_email_key" | "users_email_lower" => {
            Some("A user with that email already exists")
        }
        "tags_name_key" => Some("Tag with this name already exists"),
        "tags_slug_key" => Some("Tag with this slug already exists"),
        "cooking_time_range" => Some("Cooking time must be between 1 and 180 minutes"),
        "amount_range" => Some("Amount must be between 1 and 1000"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// The request collided with a database constraint; the caller can fix it.
    Constraint,
    Internal,
}

#[derive(Debug)]
pub struct QueryError {
    kind: QueryErrorKind,
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            kind: QueryErrorKind::Internal,
            info,
        }
    }

    pub fn constraint(info: String) -> Self {
        Self {
            kind: QueryErrorKind::Constraint,
            info,
        }
    }

    pub fn kind(&self) -> QueryErrorKind {
        self.kind
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => match e.kind() {
                ErrorKind::UniqueViolation | ErrorKind::CheckViolation => {
                    let info = e
                        .constraint()
                        .and_then(constraint_message)
                        .map(str::to_owned)
                        .unwrap_or_else(|| format!("{e}"));
                    Self::constraint(info)
                }
                ErrorKind::ForeignKeyViolation => {
                    Self::constraint(String::from("Referenced object does not exist"))
                }
                _ => Self::new(format!("{e}")),
            },
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            e => Self::new(format!("{e}")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value.kind {
            QueryErrorKind::Constraint => HtmlError::InvalidRequest.new(&value.info),
            QueryErrorKind::Internal => {
                log::error!("Query failed: {}", value.info);
                internal(&value.info)
            }
        }
    }
}

#[derive(Debug)]
pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::error!("Cache failed: {}", value.info);
        internal(&value.info)
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

/// Field name to the list of problems found in it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationError {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.fields
            .entry(field.to_owned())
            .or_default()
            .push(message.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        write!(f, "{text}")
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        HtmlError::InvalidRequest.new(&value.to_string())
    }
}

#[derive(Debug)]
pub struct ConfigError {
    info: String,
}

impl ConfigError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid configuration: {}", self.info)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_constraints_have_messages() {
        assert_eq!(
            constraint_message("prevent_self_follow"),
            Some("You cannot subscribe to yourself")
        );
        assert_eq!(
            constraint_message("unique_favorites"),
            Some("Recipe is already in favorites")
        );
        assert_eq!(
            constraint_message("users_email_lower"),
            constraint_message("users_email_key")
        );
        assert_eq!(constraint_message("something_else"), None);
    }

    #[test]
    fn validation_error_collects_messages_per_field() {
        let mut error = ValidationError::new();
        assert!(error.clone().into_result().is_ok());

        error.add("cooking_time", "too long");
        error.add("cooking_time", "not a number");
        error.add("name", "required");

        assert!(error.has("cooking_time"));
        assert_eq!(error.fields()["cooking_time"].len(), 2);
        assert_eq!(
            error.to_string(),
            r#"{"cooking_time":["too long","not a number"],"name":["required"]}"#
        );
        assert!(error.into_result().is_err());
    }

    #[test]
    fn pool_errors_are_internal() {
        let error = QueryError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(error.kind(), QueryErrorKind::Internal);
    }
}
