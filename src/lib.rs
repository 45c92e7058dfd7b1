//! Private library catalog.
//!
//! Authors, genres, categories, books and the individual copies the owner
//! keeps, lends or gives away. Records reference each other by id; the
//! [`Catalog`] performs the joins explicitly and SQLite enforces uniqueness
//! and delete policies.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod meta;
pub mod models;
pub mod urls;
pub mod validate;

pub use catalog::Catalog;
pub use config::{CatalogConfig, DatabaseLocation};
pub use error::{CatalogError, Result};
pub use models::{
    display_genre, Author, Book, BookDetail, BookInstance, Category, Genre, InstanceDetail,
    NewAuthor, NewBook, NewCategory, NewInstance, Status, User,
};
pub use urls::{AbsoluteUrl, Route};
