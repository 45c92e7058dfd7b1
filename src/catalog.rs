//! Storage-backed catalog: CRUD, explicit joins and delete policies.
//!
//! Relations are plain ids on the records. Anything that needs a related row
//! goes through an explicit query here (`book_detail`, `book_genres`,
//! `instance_detail`); nothing is loaded lazily. Integrity rules live in the
//! schema (see `migrations/`) and SQLite enforces them; this module only
//! translates constraint failures into [`CatalogError`] variants.

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::db;
use crate::error::{constraint_kind, map_write_error, CatalogError, Constraint, Result};
use crate::models::{
    self, Author, Book, BookDetail, BookInstance, Category, Genre, InstanceDetail, NewAuthor,
    NewBook, NewCategory, NewInstance, Status, User,
};
use crate::urls::AbsoluteUrl;
use crate::validate;

const AUTHOR_COLUMNS: &str = "id, fio, date_of_birth, date_of_death";
const CATEGORY_COLUMNS: &str = "id, name, description, url";
const BOOK_COLUMNS: &str =
    "b.id, b.title, b.summary, b.isbn, b.language, b.author_id, b.category_id";
const INSTANCE_COLUMNS: &str = "i.id, i.book_id, i.imprint, i.due_back, i.borrower_id, i.status";
const INSTANCE_ORDER: &str = "ORDER BY i.due_back IS NULL, i.due_back, i.id";

fn author_from_row(row: &Row) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(0)?,
        fio: row.get(1)?,
        date_of_birth: row.get(2)?,
        date_of_death: row.get(3)?,
    })
}

fn genre_from_row(row: &Row) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        url: row.get(3)?,
    })
}

fn book_from_row(row: &Row) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        isbn: row.get(3)?,
        language: row.get(4)?,
        author_id: row.get(5)?,
        category_id: row.get(6)?,
    })
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn instance_from_row(row: &Row) -> rusqlite::Result<BookInstance> {
    Ok(BookInstance {
        id: uuid_column(row, 0)?,
        book_id: row.get(1)?,
        imprint: row.get(2)?,
        due_back: row.get(3)?,
        borrower_id: row.get(4)?,
        status: row.get(5)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
    })
}

pub struct Catalog {
    conn: Connection,
    url_prefix: String,
}

impl Catalog {
    /// Validates the config, then opens and migrates the database.
    pub fn open(config: &CatalogConfig) -> Result<Self> {
        let config = config.clone().validated()?;
        let conn = db::open_db(&config.database)?;
        Ok(Self {
            conn,
            url_prefix: config.url_prefix.clone(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&CatalogConfig::in_memory())
    }

    /// Wraps an existing connection, migrating it first.
    pub fn from_connection(conn: Connection, url_prefix: impl Into<String>) -> Result<Self> {
        db::init_db(&conn)?;
        Ok(Self {
            conn,
            url_prefix: url_prefix.into(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Detail-page location of a record under the configured prefix.
    pub fn absolute_url<T: AbsoluteUrl>(&self, record: &T) -> String {
        record.get_absolute_url(&self.url_prefix)
    }

    fn exists(&self, table: &str, id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT id FROM {table} WHERE id = ?1"),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn require_reference(
        &self,
        table: &str,
        id: Option<i64>,
        entity: &'static str,
        field: &'static str,
    ) -> Result<()> {
        match id {
            Some(id) if !self.exists(table, id)? => {
                Err(CatalogError::MissingReference { entity, field })
            }
            _ => Ok(()),
        }
    }

    // Authors

    pub fn create_author(&self, input: &NewAuthor) -> Result<Author> {
        validate::author(input)?;
        self.conn.execute(
            "INSERT INTO authors (fio, date_of_birth, date_of_death) VALUES (?1, ?2, ?3)",
            params![input.fio, input.date_of_birth, input.date_of_death],
        )?;
        let id = self.conn.last_insert_rowid();
        log::info!("created author {}: {}", id, input.fio);
        Ok(Author {
            id,
            fio: input.fio.clone(),
            date_of_birth: input.date_of_birth,
            date_of_death: input.date_of_death,
        })
    }

    pub fn author(&self, id: i64) -> Result<Author> {
        self.conn
            .query_row(
                &format!("SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"),
                params![id],
                author_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("author", id))
    }

    pub fn update_author(&self, id: i64, input: &NewAuthor) -> Result<Author> {
        validate::author(input)?;
        let changed = self.conn.execute(
            "UPDATE authors SET fio = ?1, date_of_birth = ?2, date_of_death = ?3 WHERE id = ?4",
            params![input.fio, input.date_of_birth, input.date_of_death, id],
        )?;
        if changed == 0 {
            return Err(CatalogError::not_found("author", id));
        }
        self.author(id)
    }

    /// Books written by the author stay, with their author cleared.
    pub fn delete_author(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM authors WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CatalogError::not_found("author", id));
        }
        log::info!("deleted author {}", id);
        Ok(())
    }

    pub fn list_authors(&self) -> Result<Vec<Author>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY fio, id"
        ))?;
        let rows = stmt.query_map([], author_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Genres

    pub fn create_genre(&self, name: &str) -> Result<Genre> {
        validate::genre_name(name)?;
        self.conn
            .execute("INSERT INTO genres (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        log::info!("created genre {}: {}", id, name);
        Ok(Genre {
            id,
            name: name.to_string(),
        })
    }

    pub fn genre(&self, id: i64) -> Result<Genre> {
        self.conn
            .query_row(
                "SELECT id, name FROM genres WHERE id = ?1",
                params![id],
                genre_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("genre", id))
    }

    pub fn update_genre(&self, id: i64, name: &str) -> Result<Genre> {
        validate::genre_name(name)?;
        let changed = self.conn.execute(
            "UPDATE genres SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        if changed == 0 {
            return Err(CatalogError::not_found("genre", id));
        }
        Ok(Genre {
            id,
            name: name.to_string(),
        })
    }

    /// Removes the genre and its links to books; the books remain.
    pub fn delete_genre(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM genres WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CatalogError::not_found("genre", id));
        }
        log::info!("deleted genre {}", id);
        Ok(())
    }

    pub fn list_genres(&self) -> Result<Vec<Genre>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM genres ORDER BY id")?;
        let rows = stmt.query_map([], genre_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Categories

    pub fn create_category(&self, input: &NewCategory) -> Result<Category> {
        validate::category(input)?;
        self.conn
            .execute(
                "INSERT INTO categories (name, description, url) VALUES (?1, ?2, ?3)",
                params![input.name, input.description, input.url],
            )
            .map_err(|err| map_write_error(err, "category", "url", "url"))?;
        let id = self.conn.last_insert_rowid();
        log::info!("created category {}: {}", id, input.url);
        Ok(Category {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            url: input.url.clone(),
        })
    }

    pub fn category(&self, id: i64) -> Result<Category> {
        self.conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id],
                category_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("category", id))
    }

    pub fn category_by_slug(&self, slug: &str) -> Result<Category> {
        self.conn
            .query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE url = ?1"),
                params![slug],
                category_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("category", slug))
    }

    pub fn update_category(&self, id: i64, input: &NewCategory) -> Result<Category> {
        validate::category(input)?;
        let changed = self
            .conn
            .execute(
                "UPDATE categories SET name = ?1, description = ?2, url = ?3 WHERE id = ?4",
                params![input.name, input.description, input.url, id],
            )
            .map_err(|err| map_write_error(err, "category", "url", "url"))?;
        if changed == 0 {
            return Err(CatalogError::not_found("category", id));
        }
        self.category(id)
    }

    /// Books in the category stay, with their category cleared.
    pub fn delete_category(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CatalogError::not_found("category", id));
        }
        log::info!("deleted category {}", id);
        Ok(())
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id"
        ))?;
        let rows = stmt.query_map([], category_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Books

    fn check_book_references(&self, input: &NewBook) -> Result<()> {
        self.require_reference("authors", input.author_id, "book", "author")?;
        self.require_reference("categories", input.category_id, "book", "category")
    }

    fn write_genres(conn: &Connection, book_id: i64, genre_ids: &[i64]) -> Result<()> {
        conn.execute("DELETE FROM book_genres WHERE book_id = ?1", params![book_id])?;
        let mut stmt =
            conn.prepare("INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?1, ?2)")?;
        for genre_id in genre_ids {
            stmt.execute(params![book_id, genre_id])
                .map_err(|err| map_write_error(err, "book", "genre", "genre"))?;
        }
        Ok(())
    }

    pub fn create_book(&mut self, input: &NewBook) -> Result<Book> {
        validate::book(input)?;
        self.check_book_references(input)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO books (title, author_id, summary, isbn, language, category_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                input.title,
                input.author_id,
                input.summary,
                input.isbn,
                input.language,
                input.category_id
            ],
        )
        .map_err(|err| map_write_error(err, "book", "isbn", "author"))?;
        let id = tx.last_insert_rowid();
        Self::write_genres(&tx, id, &input.genre_ids)?;
        tx.commit()?;

        log::info!("created book {} ({}): {}", id, input.isbn, input.title);
        Ok(Book {
            id,
            title: input.title.clone(),
            summary: input.summary.clone(),
            isbn: input.isbn.clone(),
            language: input.language.clone(),
            author_id: input.author_id,
            category_id: input.category_id,
        })
    }

    pub fn book(&self, id: i64) -> Result<Book> {
        self.conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?1"),
                params![id],
                book_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("book", id))
    }

    pub fn book_by_isbn(&self, isbn: &str) -> Result<Book> {
        self.conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.isbn = ?1"),
                params![isbn],
                book_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("book", isbn))
    }

    /// Replaces every field, genres included.
    pub fn update_book(&mut self, id: i64, input: &NewBook) -> Result<Book> {
        validate::book(input)?;
        self.check_book_references(input)?;

        let tx = self.conn.transaction()?;
        let changed = tx
            .execute(
                "UPDATE books SET title = ?1, author_id = ?2, summary = ?3, isbn = ?4,
                     language = ?5, category_id = ?6
                 WHERE id = ?7",
                params![
                    input.title,
                    input.author_id,
                    input.summary,
                    input.isbn,
                    input.language,
                    input.category_id,
                    id
                ],
            )
            .map_err(|err| map_write_error(err, "book", "isbn", "author"))?;
        if changed == 0 {
            return Err(CatalogError::not_found("book", id));
        }
        Self::write_genres(&tx, id, &input.genre_ids)?;
        tx.commit()?;
        self.book(id)
    }

    /// Replaces the book's genres; the given order becomes the stored order.
    pub fn set_book_genres(&mut self, book_id: i64, genre_ids: &[i64]) -> Result<()> {
        if !self.exists("books", book_id)? {
            return Err(CatalogError::not_found("book", book_id));
        }
        let tx = self.conn.transaction()?;
        Self::write_genres(&tx, book_id, genre_ids)?;
        tx.commit()?;
        Ok(())
    }

    /// Fails with [`CatalogError::RestrictedDelete`] while copies of the book exist.
    pub fn delete_book(&self, id: i64) -> Result<()> {
        let changed = match self
            .conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
        {
            Ok(changed) => changed,
            Err(err) if constraint_kind(&err) == Some(Constraint::ForeignKey) => {
                let dependents: i64 = self.conn.query_row(
                    "SELECT COUNT(*) FROM book_instances WHERE book_id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                log::warn!(
                    "refused to delete book {}: {} instance(s) still reference it",
                    id,
                    dependents
                );
                return Err(CatalogError::RestrictedDelete {
                    entity: "book",
                    id: id.to_string(),
                    dependents,
                });
            }
            Err(err) => return Err(err.into()),
        };
        if changed == 0 {
            return Err(CatalogError::not_found("book", id));
        }
        log::info!("deleted book {}", id);
        Ok(())
    }

    fn query_books(&self, filter: &str, param: Option<i64>) -> Result<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books b
             LEFT JOIN authors a ON a.id = b.author_id
             {filter}
             ORDER BY b.title, a.fio, b.author_id, b.id"
        ))?;
        let rows = match param {
            Some(value) => stmt.query_map(params![value], book_from_row)?,
            None => stmt.query_map([], book_from_row)?,
        };
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All books, by title and then by author.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        self.query_books("", None)
    }

    pub fn books_by_author(&self, author_id: i64) -> Result<Vec<Book>> {
        self.query_books("WHERE b.author_id = ?1", Some(author_id))
    }

    pub fn books_in_category(&self, category_id: i64) -> Result<Vec<Book>> {
        self.query_books("WHERE b.category_id = ?1", Some(category_id))
    }

    /// Genres linked to the book, in the order they were stored.
    pub fn book_genres(&self, book_id: i64) -> Result<Vec<Genre>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.name FROM book_genres bg
             JOIN genres g ON g.id = bg.genre_id
             WHERE bg.book_id = ?1
             ORDER BY bg.rowid",
        )?;
        let rows = stmt.query_map(params![book_id], genre_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn book_detail(&self, id: i64) -> Result<BookDetail> {
        let book = self.book(id)?;
        let author = book.author_id.map(|id| self.author(id)).transpose()?;
        let category = book.category_id.map(|id| self.category(id)).transpose()?;
        let genres = self.book_genres(id)?;
        Ok(BookDetail {
            book,
            author,
            category,
            genres,
        })
    }

    pub fn display_genre(&self, book_id: i64) -> Result<String> {
        if !self.exists("books", book_id)? {
            return Err(CatalogError::not_found("book", book_id));
        }
        Ok(models::display_genre(&self.book_genres(book_id)?))
    }

    // Book instances

    pub fn create_instance(&self, input: &NewInstance) -> Result<BookInstance> {
        validate::instance(input)?;
        self.require_reference("users", input.borrower_id, "bookinstance", "borrower")?;
        let id = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO book_instances (id, book_id, imprint, due_back, borrower_id, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    input.book_id,
                    input.imprint,
                    input.due_back,
                    input.borrower_id,
                    input.status
                ],
            )
            .map_err(|err| map_write_error(err, "bookinstance", "id", "book"))?;
        log::info!("created instance {} of book {}", id, input.book_id);
        Ok(BookInstance {
            id,
            book_id: input.book_id,
            imprint: input.imprint.clone(),
            due_back: input.due_back,
            borrower_id: input.borrower_id,
            status: input.status,
        })
    }

    pub fn instance(&self, id: Uuid) -> Result<BookInstance> {
        self.conn
            .query_row(
                &format!("SELECT {INSTANCE_COLUMNS} FROM book_instances i WHERE i.id = ?1"),
                params![id.to_string()],
                instance_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("bookinstance", id))
    }

    fn update_instance_row(
        &self,
        id: Uuid,
        sql: &str,
        values: &[&dyn rusqlite::ToSql],
    ) -> Result<BookInstance> {
        let changed = self
            .conn
            .execute(sql, values)
            .map_err(|err| map_write_error(err, "bookinstance", "id", "book"))?;
        if changed == 0 {
            return Err(CatalogError::not_found("bookinstance", id));
        }
        self.instance(id)
    }

    pub fn update_instance(&self, id: Uuid, input: &NewInstance) -> Result<BookInstance> {
        validate::instance(input)?;
        self.require_reference("users", input.borrower_id, "bookinstance", "borrower")?;
        self.update_instance_row(
            id,
            "UPDATE book_instances SET book_id = ?1, imprint = ?2, due_back = ?3,
                 borrower_id = ?4, status = ?5
             WHERE id = ?6",
            params![
                input.book_id,
                input.imprint,
                input.due_back,
                input.borrower_id,
                input.status,
                id.to_string()
            ],
        )
    }

    /// Any status may replace any other.
    pub fn set_instance_status(&self, id: Uuid, status: Status) -> Result<BookInstance> {
        self.update_instance_row(
            id,
            "UPDATE book_instances SET status = ?1 WHERE id = ?2",
            params![status, id.to_string()],
        )
    }

    pub fn lend_instance(
        &self,
        id: Uuid,
        borrower_id: i64,
        due_back: NaiveDate,
    ) -> Result<BookInstance> {
        self.require_reference("users", Some(borrower_id), "bookinstance", "borrower")?;
        let instance = self.update_instance_row(
            id,
            "UPDATE book_instances SET borrower_id = ?1, due_back = ?2 WHERE id = ?3",
            params![borrower_id, due_back, id.to_string()],
        )?;
        log::info!("lent instance {} to user {} until {}", id, borrower_id, due_back);
        Ok(instance)
    }

    /// Clears borrower and due date.
    pub fn mark_returned(&self, id: Uuid) -> Result<BookInstance> {
        let instance = self.update_instance_row(
            id,
            "UPDATE book_instances SET borrower_id = NULL, due_back = NULL WHERE id = ?1",
            params![id.to_string()],
        )?;
        log::info!("instance {} returned", id);
        Ok(instance)
    }

    pub fn delete_instance(&self, id: Uuid) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM book_instances WHERE id = ?1",
            params![id.to_string()],
        )?;
        if changed == 0 {
            return Err(CatalogError::not_found("bookinstance", id));
        }
        log::info!("deleted instance {}", id);
        Ok(())
    }

    fn query_instances(
        &self,
        filter: &str,
        values: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<BookInstance>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM book_instances i {filter} {INSTANCE_ORDER}"
        ))?;
        let rows = stmt.query_map(values, instance_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All instances by due date; those without one come last.
    pub fn list_instances(&self) -> Result<Vec<BookInstance>> {
        self.query_instances("", params![])
    }

    pub fn instances_for_book(&self, book_id: i64) -> Result<Vec<BookInstance>> {
        self.query_instances("WHERE i.book_id = ?1", params![book_id])
    }

    pub fn instances_borrowed_by(&self, user_id: i64) -> Result<Vec<BookInstance>> {
        self.query_instances("WHERE i.borrower_id = ?1", params![user_id])
    }

    /// Instances whose due date lies strictly before `today`.
    pub fn overdue_instances(&self, today: NaiveDate) -> Result<Vec<BookInstance>> {
        self.query_instances(
            "WHERE i.due_back IS NOT NULL AND i.due_back < ?1",
            params![today],
        )
    }

    pub fn instance_detail(&self, id: Uuid) -> Result<InstanceDetail> {
        let instance = self.instance(id)?;
        let book = self.book(instance.book_id)?;
        Ok(InstanceDetail { instance, book })
    }

    /// `"{id} ({book title})"`.
    pub fn instance_label(&self, id: Uuid) -> Result<String> {
        Ok(self.instance_detail(id)?.to_string())
    }

    // Users

    pub fn create_user(&self, username: &str) -> Result<User> {
        validate::username(username)?;
        self.conn
            .execute("INSERT INTO users (username) VALUES (?1)", params![username])
            .map_err(|err| map_write_error(err, "user", "username", "username"))?;
        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
        })
    }

    pub fn user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, username FROM users WHERE id = ?1",
                params![id],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("user", id))
    }

    /// Instances the user had borrowed keep existing, unassigned.
    pub fn delete_user(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CatalogError::not_found("user", id));
        }
        log::info!("deleted user {}", id);
        Ok(())
    }
}
