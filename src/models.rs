use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CatalogError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub fio: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fio)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Slug, unique across categories.
    pub url: String,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub isbn: String,
    pub language: String,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Joins the names of the first three genres with ", ".
pub fn display_genre(genres: &[Genre]) -> String {
    genres
        .iter()
        .take(3)
        .map(|genre| genre.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A book together with its explicitly loaded relations.
#[derive(Debug, Serialize, Clone)]
pub struct BookDetail {
    pub book: Book,
    pub author: Option<Author>,
    pub category: Option<Category>,
    /// In stored retrieval order.
    pub genres: Vec<Genre>,
}

impl BookDetail {
    pub fn display_genre(&self) -> String {
        display_genre(&self.genres)
    }
}

impl fmt::Display for BookDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.book.fmt(f)
    }
}

/// What the owner intends to do with a copy. Any status may change to any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "d")]
    Storage,
    #[serde(rename = "o")]
    ToRead,
    #[serde(rename = "a")]
    GivenAway,
    #[serde(rename = "r")]
    Unknown,
}

impl Status {
    /// `(code, label)` pairs in declaration order.
    pub const CHOICES: [(&'static str, &'static str); 4] = [
        ("d", "Хранение"),
        ("o", "Прочитать"),
        ("a", "Отдана"),
        ("r", "Неизвестно"),
    ];

    pub const ALL: [Status; 4] = [
        Status::Storage,
        Status::ToRead,
        Status::GivenAway,
        Status::Unknown,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Status::Storage => "d",
            Status::ToRead => "o",
            Status::GivenAway => "a",
            Status::Unknown => "r",
        }
    }

    pub fn label(self) -> &'static str {
        let code = self.code();
        Self::CHOICES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
            .unwrap_or(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| CatalogError::InvalidStatus(s.to_string()))
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        raw.parse()
            .map_err(|err: CatalogError| FromSqlError::Other(Box::new(err)))
    }
}

/// A physical copy of a book, tracked by its own UUID.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BookInstance {
    pub id: Uuid,
    pub book_id: i64,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<i64>,
    pub status: Status,
}

impl BookInstance {
    /// True when a due date is set and lies strictly before today.
    pub fn is_overdue(&self) -> bool {
        self.is_overdue_on(today())
    }

    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        matches!(self.due_back, Some(due) if due < today)
    }
}

/// An instance joined with the book it copies.
#[derive(Debug, Serialize, Clone)]
pub struct InstanceDetail {
    pub instance: BookInstance,
    pub book: Book,
}

impl fmt::Display for InstanceDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.instance.id, self.book.title)
    }
}

/// Minimal borrower record; authentication lives outside this crate.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Input for creating or replacing an author.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewAuthor {
    pub fio: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_death: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NewBook {
    pub title: String,
    pub summary: String,
    pub isbn: String,
    pub language: String,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewInstance {
    pub book_id: i64,
    pub imprint: String,
    pub due_back: Option<NaiveDate>,
    pub borrower_id: Option<i64>,
    #[serde(default)]
    pub status: Status,
}

impl NewInstance {
    pub fn new(book_id: i64, imprint: impl Into<String>) -> Self {
        Self {
            book_id,
            imprint: imprint.into(),
            due_back: None,
            borrower_id: None,
            status: Status::default(),
        }
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genre(id: i64, name: &str) -> Genre {
        Genre {
            id,
            name: name.to_string(),
        }
    }

    fn instance(due_back: Option<NaiveDate>) -> BookInstance {
        BookInstance {
            id: Uuid::new_v4(),
            book_id: 1,
            imprint: "АСТ, 2019".to_string(),
            due_back,
            borrower_id: None,
            status: Status::Storage,
        }
    }

    #[test]
    fn author_displays_full_name() {
        let author = Author {
            id: 1,
            fio: "Фамилия Имя".to_string(),
            date_of_birth: None,
            date_of_death: None,
        };
        assert_eq!(author.to_string(), "Фамилия Имя");
    }

    #[test]
    fn category_displays_name() {
        let category = Category {
            id: 3,
            name: "Фантастика".to_string(),
            description: String::new(),
            url: "sci-fi".to_string(),
        };
        assert_eq!(category.to_string(), "Фантастика");
    }

    #[test]
    fn display_genre_takes_first_three() {
        let genres = vec![genre(1, "A"), genre(2, "B"), genre(3, "C"), genre(4, "D")];
        assert_eq!(display_genre(&genres), "A, B, C");
        assert_eq!(display_genre(&genres[..1]), "A");
        assert_eq!(display_genre(&[]), "");
    }

    #[test]
    fn overdue_only_strictly_before_today() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let yesterday = today.pred_opt().unwrap();
        let tomorrow = today.succ_opt().unwrap();

        assert!(instance(Some(yesterday)).is_overdue_on(today));
        assert!(!instance(Some(today)).is_overdue_on(today));
        assert!(!instance(Some(tomorrow)).is_overdue_on(today));
        assert!(!instance(None).is_overdue_on(today));
    }

    #[test]
    fn overdue_uses_current_date() {
        let long_ago = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        assert!(instance(Some(long_ago)).is_overdue());
        assert!(!instance(Some(today())).is_overdue());
    }

    #[test]
    fn status_codes_round_trip_and_default_to_storage() {
        assert_eq!(Status::default(), Status::Storage);
        for status in Status::ALL {
            assert_eq!(status.code().parse::<Status>().unwrap(), status);
        }
        assert_eq!(Status::GivenAway.label(), "Отдана");
        assert!(matches!(
            "x".parse::<Status>(),
            Err(CatalogError::InvalidStatus(code)) if code == "x"
        ));
    }

    #[test]
    fn status_serializes_as_code() {
        let json = serde_json::to_string(&Status::ToRead).unwrap();
        assert_eq!(json, "\"o\"");
    }

    #[test]
    fn instance_detail_shows_id_and_title() {
        let copy = instance(None);
        let id = copy.id;
        let detail = InstanceDetail {
            instance: copy,
            book: Book {
                id: 1,
                title: "Пикник на обочине".to_string(),
                summary: String::new(),
                isbn: "9785170906307".to_string(),
                language: "ru".to_string(),
                author_id: None,
                category_id: None,
            },
        };
        assert_eq!(detail.to_string(), format!("{id} (Пикник на обочине)"));
    }
}
