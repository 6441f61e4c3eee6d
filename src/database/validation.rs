use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    constants::{
        AMOUNT_MAX, AMOUNT_MIN, COOKING_TIME_MAX, COOKING_TIME_MIN, EMAIL_MAX_LENGTH,
        INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH, PASSWORD_MIN_LENGTH,
        RECIPE_NAME_MAX_LENGTH, RECIPE_TEXT_MAX_LENGTH, TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH,
        USERNAME_MAX_LENGTH, USER_NAME_MAX_LENGTH,
    },
    error::ValidationError,
    schema::Uuid,
};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IngredientAmountInput {
    pub id: Uuid,
    pub amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipePayload {
    pub ingredients: Vec<IngredientAmountInput>,
    pub tags: Vec<Uuid>,
    pub image: String,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeUpdate {
    pub ingredients: Option<Vec<IngredientAmountInput>>,
    pub tags: Option<Vec<Uuid>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagPayload {
    pub name: String,
    pub color: Option<String>,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientPayload {
    pub name: String,
    pub measurement_unit: String,
}

fn check_text(errors: &mut ValidationError, field: &str, value: &str, max: usize) {
    let length = value.trim().chars().count();
    if length == 0 {
        errors.add(field, "This field may not be blank.");
    } else if length > max {
        errors.add(
            field,
            &format!("Ensure this field has no more than {max} characters."),
        );
    }
}

fn check_range(errors: &mut ValidationError, field: &str, value: i32, min: i32, max: i32) {
    if value < min || value > max {
        errors.add(
            field,
            &format!("Ensure this value is between {min} and {max}."),
        );
    }
}

fn check_ingredients(errors: &mut ValidationError, ingredients: &[IngredientAmountInput]) {
    if ingredients.is_empty() {
        errors.add("ingredients", "A recipe needs at least one ingredient.");
        return;
    }

    let mut seen = HashSet::new();
    for ingredient in ingredients {
        if !seen.insert(ingredient.id) {
            errors.add(
                "ingredients",
                &format!("Ingredient {} is listed more than once.", ingredient.id),
            );
        }
        if ingredient.amount < AMOUNT_MIN || ingredient.amount > AMOUNT_MAX {
            errors.add(
                "ingredients",
                &format!(
                    "Amount of ingredient {} must be between {AMOUNT_MIN} and {AMOUNT_MAX}.",
                    ingredient.id
                ),
            );
        }
    }
}

fn check_tags(errors: &mut ValidationError, tags: &[Uuid]) {
    if tags.is_empty() {
        errors.add("tags", "A recipe needs at least one tag.");
        return;
    }

    let mut seen = HashSet::new();
    for tag in tags {
        if !seen.insert(*tag) {
            errors.add("tags", &format!("Tag {tag} is listed more than once."));
        }
    }
}

pub fn validate_recipe(payload: &RecipePayload) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    check_text(&mut errors, "name", &payload.name, RECIPE_NAME_MAX_LENGTH);
    check_text(&mut errors, "text", &payload.text, RECIPE_TEXT_MAX_LENGTH);
    if payload.image.trim().is_empty() {
        errors.add("image", "This field may not be blank.");
    }
    check_range(
        &mut errors,
        "cooking_time",
        payload.cooking_time,
        COOKING_TIME_MIN,
        COOKING_TIME_MAX,
    );
    check_ingredients(&mut errors, &payload.ingredients);
    check_tags(&mut errors, &payload.tags);

    errors.into_result()
}

pub fn validate_recipe_update(update: &RecipeUpdate) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    if let Some(name) = &update.name {
        check_text(&mut errors, "name", name, RECIPE_NAME_MAX_LENGTH);
    }
    if let Some(text) = &update.text {
        check_text(&mut errors, "text", text, RECIPE_TEXT_MAX_LENGTH);
    }
    if let Some(image) = &update.image {
        if image.trim().is_empty() {
            errors.add("image", "This field may not be blank.");
        }
    }
    if let Some(cooking_time) = update.cooking_time {
        check_range(
            &mut errors,
            "cooking_time",
            cooking_time,
            COOKING_TIME_MIN,
            COOKING_TIME_MAX,
        );
    }
    if let Some(ingredients) = &update.ingredients {
        check_ingredients(&mut errors, ingredients);
    }
    if let Some(tags) = &update.tags {
        check_tags(&mut errors, tags);
    }

    errors.into_result()
}

pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
}

pub fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn check_password(errors: &mut ValidationError, field: &str, password: &str) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.add(
            field,
            &format!("Password must contain at least {PASSWORD_MIN_LENGTH} characters."),
        );
    }
}

pub fn validate_registration(payload: &RegisterPayload) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    check_text(&mut errors, "email", &payload.email, EMAIL_MAX_LENGTH);
    if !errors.has("email") && !is_valid_email(&payload.email) {
        errors.add("email", "Enter a valid email address.");
    }
    check_text(&mut errors, "username", &payload.username, USERNAME_MAX_LENGTH);
    if !errors.has("username") && !is_valid_username(&payload.username) {
        errors.add(
            "username",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        );
    }
    check_text(&mut errors, "first_name", &payload.first_name, USER_NAME_MAX_LENGTH);
    check_text(&mut errors, "last_name", &payload.last_name, USER_NAME_MAX_LENGTH);
    check_password(&mut errors, "password", &payload.password);

    errors.into_result()
}

pub fn validate_new_password(payload: &SetPasswordPayload) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    check_password(&mut errors, "new_password", &payload.new_password);
    errors.into_result()
}

/// `#RGB` or `#RRGGBB`.
pub fn is_hex_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(digits) => {
            (digits.len() == 3 || digits.len() == 6)
                && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

pub fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn validate_tag(payload: &TagPayload) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();

    check_text(&mut errors, "name", &payload.name, TAG_NAME_MAX_LENGTH);
    check_text(&mut errors, "slug", &payload.slug, TAG_SLUG_MAX_LENGTH);
    if !errors.has("slug") && !is_slug(&payload.slug) {
        errors.add(
            "slug",
            "Slug may contain only latin letters, digits, hyphens and underscores.",
        );
    }
    if let Some(color) = &payload.color {
        if !is_hex_color(color) {
            errors.add("color", "Enter a valid hex color, e.g. #49B64E.");
        }
    }

    errors.into_result()
}

pub fn validate_ingredient(payload: &IngredientPayload) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    check_text(&mut errors, "name", &payload.name, INGREDIENT_NAME_MAX_LENGTH);
    check_text(
        &mut errors,
        "measurement_unit",
        &payload.measurement_unit,
        MEASUREMENT_UNIT_MAX_LENGTH,
    );
    errors.into_result()
}
