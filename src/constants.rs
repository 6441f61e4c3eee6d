pub const PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const USERNAME_MAX_LENGTH: usize = 100;
pub const EMAIL_MAX_LENGTH: usize = 50;
pub const USER_NAME_MAX_LENGTH: usize = 50;
pub const PASSWORD_MIN_LENGTH: usize = 8;

pub const RECIPE_NAME_MAX_LENGTH: usize = 100;
pub const RECIPE_TEXT_MAX_LENGTH: usize = 500;
pub const COOKING_TIME_MIN: i32 = 1;
pub const COOKING_TIME_MAX: i32 = 180;

pub const AMOUNT_MIN: i32 = 1;
pub const AMOUNT_MAX: i32 = 1000;

pub const INGREDIENT_NAME_MAX_LENGTH: usize = 100;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 10;

pub const TAG_NAME_MAX_LENGTH: usize = 20;
pub const TAG_SLUG_MAX_LENGTH: usize = 20;
pub const TAG_DEFAULT_COLOR: &str = "#FF0000";

pub const SHOPPING_LIST_FOOTER: &str = "Generated by Foodgram";

// Recipe images travel inline in the JSON body
pub const MAX_BODY_SIZE: u64 = 1024 * 1024 * 10;

// Search results are cached per prefix, so entries must not outlive a day
pub const CACHE_TTL_SECONDS: u64 = 60 * 60 * 24;
