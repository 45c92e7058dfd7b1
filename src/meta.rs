//! Per-entity registration data consumed by admin and form layers.
//!
//! Everything here is plain data: verbose names, field constraints, default
//! ordering and permissions. Nothing in this module is consulted at runtime
//! by the catalog itself except the max lengths used by [`crate::validate`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    AutoId,
    Uuid,
    Char,
    Text,
    Slug,
    Date,
    ForeignKey { to: &'static str, on_delete: OnDelete },
    ManyToMany { to: &'static str },
    Choice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OnDelete {
    SetNull,
    Restrict,
    Cascade,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldMeta {
    pub name: &'static str,
    /// `None` means the name with underscores replaced by spaces.
    verbose_name: Option<&'static str>,
    pub kind: FieldKind,
    pub max_length: Option<usize>,
    pub null: bool,
    pub blank: bool,
    pub unique: bool,
    pub help_text: &'static str,
}

impl FieldMeta {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            verbose_name: None,
            kind,
            max_length: None,
            null: false,
            blank: false,
            unique: false,
            help_text: "",
        }
    }

    const fn verbose(mut self, verbose_name: &'static str) -> Self {
        self.verbose_name = Some(verbose_name);
        self
    }

    const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    const fn optional(mut self) -> Self {
        self.null = true;
        self.blank = true;
        self
    }

    const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    const fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    const fn help(mut self, help_text: &'static str) -> Self {
        self.help_text = help_text;
        self
    }

    pub fn verbose_name(&self) -> String {
        match self.verbose_name {
            Some(name) => name.to_string(),
            None => self.name.replace('_', " "),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EntityMeta {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    /// Default ordering, field names in priority order.
    pub ordering: &'static [&'static str],
    pub fields: &'static [FieldMeta],
    /// `(codename, description)` pairs.
    pub permissions: &'static [(&'static str, &'static str)],
}

impl EntityMeta {
    pub fn get_field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub(crate) fn max_length(&self, name: &str) -> usize {
        self.get_field(name)
            .and_then(|field| field.max_length)
            .unwrap_or(usize::MAX)
    }
}

pub const AUTHOR: EntityMeta = EntityMeta {
    name: "author",
    verbose_name: "Автор",
    verbose_name_plural: "Авторы",
    ordering: &["fio"],
    fields: &[
        FieldMeta::new("id", FieldKind::AutoId),
        FieldMeta::new("fio", FieldKind::Char).max_length(200),
        FieldMeta::new("date_of_birth", FieldKind::Date).optional(),
        FieldMeta::new("date_of_death", FieldKind::Date)
            .verbose("died")
            .optional(),
    ],
    permissions: &[],
};

pub const GENRE: EntityMeta = EntityMeta {
    name: "genre",
    verbose_name: "Жанр",
    verbose_name_plural: "Жанры",
    ordering: &[],
    fields: &[
        FieldMeta::new("id", FieldKind::AutoId),
        FieldMeta::new("name", FieldKind::Char)
            .verbose("Жанр")
            .max_length(150),
    ],
    permissions: &[],
};

pub const CATEGORY: EntityMeta = EntityMeta {
    name: "category",
    verbose_name: "Категория",
    verbose_name_plural: "Категории",
    ordering: &[],
    fields: &[
        FieldMeta::new("id", FieldKind::AutoId),
        FieldMeta::new("name", FieldKind::Char)
            .verbose("Категория")
            .max_length(150),
        FieldMeta::new("description", FieldKind::Text).verbose("Описание"),
        FieldMeta::new("url", FieldKind::Slug).max_length(160).unique(),
    ],
    permissions: &[],
};

pub const BOOK: EntityMeta = EntityMeta {
    name: "book",
    verbose_name: "Книга осн",
    verbose_name_plural: "Книги осн",
    ordering: &["title", "author"],
    fields: &[
        FieldMeta::new("id", FieldKind::AutoId),
        FieldMeta::new("title", FieldKind::Char).max_length(200),
        FieldMeta::new(
            "author",
            FieldKind::ForeignKey {
                to: "author",
                on_delete: OnDelete::SetNull,
            },
        )
        .verbose("Автор")
        .nullable(),
        FieldMeta::new("summary", FieldKind::Text)
            .max_length(1000)
            .help("Общее описание книги"),
        FieldMeta::new("isbn", FieldKind::Char)
            .verbose("ISBN")
            .max_length(13)
            .unique()
            .help("13 символов ISBN номер"),
        FieldMeta::new("genre", FieldKind::ManyToMany { to: "genre" })
            .help("Выберите жанр книги"),
        FieldMeta::new("language", FieldKind::Text)
            .max_length(2)
            .help("Код языка в латинице, 2 знака, наприемр ru,en,fr"),
        FieldMeta::new(
            "category",
            FieldKind::ForeignKey {
                to: "category",
                on_delete: OnDelete::SetNull,
            },
        )
        .verbose("Категория")
        .nullable(),
    ],
    permissions: &[],
};

/// Column header for [`crate::models::BookDetail::display_genre`].
pub const DISPLAY_GENRE_SHORT_DESCRIPTION: &str = "Жанр";

pub const BOOK_INSTANCE: EntityMeta = EntityMeta {
    name: "bookinstance",
    verbose_name: "Книга личн",
    verbose_name_plural: "Книги личн",
    ordering: &["due_back"],
    fields: &[
        FieldMeta::new("id", FieldKind::Uuid)
            .help("Unique ID for this particular book across whole library"),
        FieldMeta::new(
            "book",
            FieldKind::ForeignKey {
                to: "book",
                on_delete: OnDelete::Restrict,
            },
        ),
        FieldMeta::new("imprint", FieldKind::Char).max_length(200),
        FieldMeta::new("due_back", FieldKind::Date).optional(),
        FieldMeta::new(
            "borrower",
            FieldKind::ForeignKey {
                to: "user",
                on_delete: OnDelete::SetNull,
            },
        )
        .optional(),
        FieldMeta::new("status", FieldKind::Choice)
            .max_length(1)
            .blank()
            .help("Цель книги"),
    ],
    permissions: &[("can_mark_returned", "Set book as returned")],
};

pub const USER: EntityMeta = EntityMeta {
    name: "user",
    verbose_name: "user",
    verbose_name_plural: "users",
    ordering: &["username"],
    fields: &[
        FieldMeta::new("id", FieldKind::AutoId),
        FieldMeta::new("username", FieldKind::Char)
            .max_length(150)
            .unique(),
    ],
    permissions: &[],
};

/// Every registered entity, in declaration order.
pub const ENTITIES: [&EntityMeta; 6] = [&AUTHOR, &GENRE, &CATEGORY, &BOOK, &BOOK_INSTANCE, &USER];

pub fn entity(name: &str) -> Option<&'static EntityMeta> {
    ENTITIES.into_iter().find(|meta| meta.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_field_labels() {
        assert_eq!(AUTHOR.get_field("fio").unwrap().verbose_name(), "fio");
        assert_eq!(
            AUTHOR.get_field("date_of_birth").unwrap().verbose_name(),
            "date of birth"
        );
        assert_eq!(
            AUTHOR.get_field("date_of_death").unwrap().verbose_name(),
            "died"
        );
        assert_eq!(AUTHOR.get_field("fio").unwrap().max_length, Some(200));
    }

    #[test]
    fn book_genre_column_labels() {
        assert_eq!(DISPLAY_GENRE_SHORT_DESCRIPTION, "Жанр");
        assert_eq!(GENRE.get_field("name").unwrap().verbose_name(), "Жанр");
        assert_eq!(
            BOOK.get_field("genre").unwrap().kind,
            FieldKind::ManyToMany { to: "genre" }
        );
    }

    #[test]
    fn unique_fields_are_isbn_and_slug() {
        assert!(BOOK.get_field("isbn").unwrap().unique);
        assert!(CATEGORY.get_field("url").unwrap().unique);
        assert!(!GENRE.get_field("name").unwrap().unique);
    }

    #[test]
    fn delete_policies() {
        let book_fk = BOOK_INSTANCE.get_field("book").unwrap();
        assert_eq!(
            book_fk.kind,
            FieldKind::ForeignKey {
                to: "book",
                on_delete: OnDelete::Restrict
            }
        );
        let author_fk = BOOK.get_field("author").unwrap();
        assert!(author_fk.null);
        assert!(matches!(
            author_fk.kind,
            FieldKind::ForeignKey {
                on_delete: OnDelete::SetNull,
                ..
            }
        ));
    }

    #[test]
    fn lookup_by_entity_name() {
        let meta = entity("bookinstance").unwrap();
        assert_eq!(meta.ordering, &["due_back"]);
        assert_eq!(meta.permissions[0].0, "can_mark_returned");
        assert!(entity("loan").is_none());
        assert!(AUTHOR.get_field("missing").is_none());
    }
}
