pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MAX_SMALL_INTEGER: i32 = 32767;
pub const MAX_RECIPE_NAME_LENGTH: usize = 256;
pub const MAX_USER_FIELD_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const SHORT_LINK_LENGTH: usize = 8;
pub const SHORT_LINK_ATTEMPTS: usize = 5;

pub const SESSION_COOKIE: &str = "session";
pub const BODY_SIZE_LIMIT: u64 = 1024 * 1024 * 16;

pub const RECIPE_IMAGE_DIR: &str = "recipes/images";
pub const AVATAR_DIR: &str = "users";

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_HEADERS: [&str; 3] = ["Name", "Amount", "Unit"];

pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];
