//! Field checks applied before a write reaches SQLite.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{CatalogError, Result};
use crate::meta::{self, EntityMeta};
use crate::models::{NewAuthor, NewBook, NewCategory, NewInstance};

static SLUG_RE: OnceLock<Regex> = OnceLock::new();
static LANGUAGE_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"))
}

fn language_re() -> &'static Regex {
    LANGUAGE_RE.get_or_init(|| Regex::new(r"^[a-zA-Z]{2}$").expect("valid language regex"))
}

fn required(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::validation(field, "this field is required"));
    }
    Ok(())
}

fn max_length(entity: &EntityMeta, field: &'static str, value: &str) -> Result<()> {
    let limit = entity.max_length(field);
    let length = value.chars().count();
    if length > limit {
        return Err(CatalogError::validation(
            field,
            format!("at most {limit} characters (has {length})"),
        ));
    }
    Ok(())
}

pub fn author(input: &NewAuthor) -> Result<()> {
    required("fio", &input.fio)?;
    max_length(&meta::AUTHOR, "fio", &input.fio)
}

pub fn genre_name(name: &str) -> Result<()> {
    required("name", name)?;
    max_length(&meta::GENRE, "name", name)
}

pub fn slug(value: &str) -> Result<()> {
    required("url", value)?;
    max_length(&meta::CATEGORY, "url", value)?;
    if !slug_re().is_match(value) {
        return Err(CatalogError::validation(
            "url",
            "only letters, digits, underscores and hyphens",
        ));
    }
    Ok(())
}

pub fn category(input: &NewCategory) -> Result<()> {
    required("name", &input.name)?;
    max_length(&meta::CATEGORY, "name", &input.name)?;
    required("description", &input.description)?;
    slug(&input.url)
}

pub fn isbn(value: &str) -> Result<()> {
    let length = value.chars().count();
    if length != 13 {
        return Err(CatalogError::validation(
            "isbn",
            format!("must be exactly 13 characters (has {length})"),
        ));
    }
    Ok(())
}

pub fn book(input: &NewBook) -> Result<()> {
    required("title", &input.title)?;
    max_length(&meta::BOOK, "title", &input.title)?;
    required("summary", &input.summary)?;
    max_length(&meta::BOOK, "summary", &input.summary)?;
    isbn(&input.isbn)?;
    if !language_re().is_match(&input.language) {
        return Err(CatalogError::validation(
            "language",
            "two latin letters, e.g. ru, en, fr",
        ));
    }
    Ok(())
}

pub fn instance(input: &NewInstance) -> Result<()> {
    required("imprint", &input.imprint)?;
    max_length(&meta::BOOK_INSTANCE, "imprint", &input.imprint)
}

pub fn username(value: &str) -> Result<()> {
    required("username", value)?;
    max_length(&meta::USER, "username", value)
}
