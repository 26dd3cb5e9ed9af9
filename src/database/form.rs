use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{
    constants::{
        MAX_EMAIL_LENGTH, MAX_RECIPE_NAME_LENGTH, MAX_SMALL_INTEGER, MAX_USER_FIELD_LENGTH,
        MIN_PASSWORD_LENGTH,
    },
    error::ValidationError,
    schema::Uuid,
};

pub type FormData = HashMap<String, Value>;

const REQUIRED: &str = "This field is required.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";
const NOT_A_LIST: &str = "Expected a list of items.";
const BLANK: &str = "This field may not be blank.";
const EMPTY_LIST: &str = "This list may not be empty.";

pub struct Form {
    inner: FormData,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self::from_data(map.into_iter().collect())),
            _ => Err(ValidationError::field(
                "non_field_errors",
                "Invalid data. Expected a dictionary.",
            )),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Result<String, ValidationError> {
        match self.inner.get(key) {
            Some(Value::String(v)) => Ok(v.to_owned()),
            Some(Value::Null) | None => Err(ValidationError::field(key, REQUIRED)),
            Some(_) => Err(ValidationError::field(key, NOT_A_STRING)),
        }
    }

    /// Non-blank string, trimmed.
    pub fn get_text(&self, key: &str) -> Result<String, ValidationError> {
        let value = self.get_str(key)?;
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::field(key, BLANK));
        }

        Ok(value.to_owned())
    }

    pub fn get_number(&self, key: &str) -> Result<i64, ValidationError> {
        match self.inner.get(key) {
            Some(Value::Null) | None => Err(ValidationError::field(key, REQUIRED)),
            Some(value) => parse_integer(value).ok_or_else(|| ValidationError::field(key, NOT_AN_INTEGER)),
        }
    }

    pub fn get_list(&self, key: &str) -> Result<&Vec<Value>, ValidationError> {
        match self.inner.get(key) {
            Some(Value::Array(list)) => Ok(list),
            Some(Value::Null) | None => Err(ValidationError::field(key, REQUIRED)),
            Some(_) => Err(ValidationError::field(key, NOT_A_LIST)),
        }
    }
}

fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn check_small_integer(key: &str, value: i64, errors: &mut ValidationError) -> i32 {
    if value < 1 {
        errors.add(key, "Ensure this value is greater than or equal to 1.");
    } else if value > MAX_SMALL_INTEGER as i64 {
        errors.add(
            key,
            &format!("Ensure this value is less than or equal to {MAX_SMALL_INTEGER}."),
        );
    }

    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Collects the value of a field or records its error, so every field of a
/// payload is reported in one response.
fn collect<T>(result: Result<T, ValidationError>, errors: &mut ValidationError) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            errors.merge(e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IngredientAmount {
    pub id: Uuid,
    pub amount: i32,
}

/// A validated recipe payload. Used for both create and update: every field
/// is required in both cases.
#[derive(Debug, Clone)]
pub struct RecipeForm {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: String,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmount>,
}

impl RecipeForm {
    fn parse_tags(form: &Form) -> Result<Vec<Uuid>, ValidationError> {
        let list = form.get_list("tags")?;
        if list.is_empty() {
            return Err(ValidationError::field("tags", EMPTY_LIST));
        }

        let mut tags = Vec::with_capacity(list.len());
        for value in list {
            match parse_integer(value) {
                Some(id) if id > 0 && id <= i32::MAX as i64 => tags.push(id as Uuid),
                _ => {
                    return Err(ValidationError::field(
                        "tags",
                        "Incorrect type. Expected pk value.",
                    ))
                }
            }
        }

        let unique: HashSet<&Uuid> = tags.iter().collect();
        if unique.len() != tags.len() {
            return Err(ValidationError::field("tags", "Tags must not repeat."));
        }

        Ok(tags)
    }

    fn parse_ingredients(form: &Form) -> Result<Vec<IngredientAmount>, ValidationError> {
        let list = form.get_list("ingredients")?;
        if list.is_empty() {
            return Err(ValidationError::field("ingredients", EMPTY_LIST));
        }

        let mut errors = ValidationError::new();
        let mut ingredients = Vec::with_capacity(list.len());
        for value in list {
            let object = match value.as_object() {
                Some(object) => object,
                None => {
                    errors.add("ingredients", "Each ingredient must be an object.");
                    continue;
                }
            };

            let id = object.get("id").and_then(parse_integer);
            let amount = object.get("amount").and_then(parse_integer);
            match (id, amount) {
                (Some(id), Some(amount)) if id > 0 && id <= i32::MAX as i64 => {
                    let amount = check_small_integer("ingredients", amount, &mut errors);
                    ingredients.push(IngredientAmount {
                        id: id as Uuid,
                        amount,
                    });
                }
                (None, _) | (Some(_), Some(_)) => {
                    errors.add("ingredients", "Each ingredient needs a valid id.")
                }
                (Some(_), None) => errors.add("ingredients", "Each ingredient needs an amount."),
            }
        }

        let unique: HashSet<Uuid> = ingredients.iter().map(|part| part.id).collect();
        if unique.len() != ingredients.len() {
            errors.add("ingredients", "Ingredients must not repeat.");
        }

        errors.into_result().map(|_| ingredients)
    }
}

impl TryFrom<Form> for RecipeForm {
    type Error = ValidationError;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::new();

        let name = collect(form.get_text("name"), &mut errors);
        if let Some(name) = &name {
            if name.chars().count() > MAX_RECIPE_NAME_LENGTH {
                errors.add(
                    "name",
                    &format!("Ensure this field has no more than {MAX_RECIPE_NAME_LENGTH} characters."),
                );
            }
        }
        let text = collect(form.get_text("text"), &mut errors);
        let cooking_time = collect(form.get_number("cooking_time"), &mut errors)
            .map(|value| check_small_integer("cooking_time", value, &mut errors));
        let image = collect(form.get_text("image"), &mut errors);
        let tags = collect(Self::parse_tags(&form), &mut errors);
        let ingredients = collect(Self::parse_ingredients(&form), &mut errors);

        match (name, text, cooking_time, image, tags, ingredients) {
            (Some(name), Some(text), Some(cooking_time), Some(image), Some(tags), Some(ingredients))
                if errors.is_empty() =>
            {
                Ok(Self {
                    name,
                    text,
                    cooking_time,
                    image,
                    tags,
                    ingredients,
                })
            }
            _ => Err(errors),
        }
    }
}

impl TryFrom<Value> for RecipeForm {
    type Error = ValidationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Form::from_value(value)?.try_into()
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

fn check_length(key: &str, value: &str, max: usize, errors: &mut ValidationError) {
    if value.chars().count() > max {
        errors.add(
            key,
            &format!("Ensure this field has no more than {max} characters."),
        );
    }
}

fn is_valid_email(email: &str) -> bool {
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

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

/// Password rules shared by registration and password change.
pub fn check_password(key: &str, password: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            key,
            &format!("This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(key, "This password is entirely numeric.");
    }

    errors.into_result()
}

impl TryFrom<Form> for RegistrationForm {
    type Error = ValidationError;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::new();

        let email = collect(form.get_text("email"), &mut errors).map(|email| email.to_lowercase());
        if let Some(email) = &email {
            check_length("email", email, MAX_EMAIL_LENGTH, &mut errors);
            if !is_valid_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }

        let username = collect(form.get_text("username"), &mut errors);
        if let Some(username) = &username {
            check_length("username", username, MAX_USER_FIELD_LENGTH, &mut errors);
            if !is_valid_username(username) {
                errors.add(
                    "username",
                    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
                );
            }
        }

        let first_name = collect(form.get_text("first_name"), &mut errors);
        if let Some(first_name) = &first_name {
            check_length("first_name", first_name, MAX_USER_FIELD_LENGTH, &mut errors);
        }
        let last_name = collect(form.get_text("last_name"), &mut errors);
        if let Some(last_name) = &last_name {
            check_length("last_name", last_name, MAX_USER_FIELD_LENGTH, &mut errors);
        }

        let password = collect(form.get_str("password"), &mut errors);
        if let Some(password) = &password {
            collect(check_password("password", password), &mut errors);
        }

        match (email, username, first_name, last_name, password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password))
                if errors.is_empty() =>
            {
                Ok(Self {
                    email,
                    username,
                    first_name,
                    last_name,
                    password,
                })
            }
            _ => Err(errors),
        }
    }
}
