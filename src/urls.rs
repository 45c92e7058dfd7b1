//! Reverse routing for detail pages.
//!
//! The web layer mounts its routes under a prefix; these builders produce
//! the stable location of each record so templates and admin links never
//! hard-code paths.

use crate::models::{Author, Book, Category};

/// Named routes the web layer is expected to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AuthorDetail,
    BookDetail,
    CategoryDetail,
}

impl Route {
    pub fn name(self) -> &'static str {
        match self {
            Route::AuthorDetail => "author-detail",
            Route::BookDetail => "book-detail",
            Route::CategoryDetail => "category-detail",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Route::AuthorDetail, Route::BookDetail, Route::CategoryDetail]
            .into_iter()
            .find(|route| route.name() == name)
    }

    fn segment(self) -> &'static str {
        match self {
            Route::AuthorDetail => "author",
            Route::BookDetail => "book",
            Route::CategoryDetail => "category",
        }
    }
}

/// Builds `{prefix}/{segment}/{key}` for a named route.
pub fn reverse(prefix: &str, route: Route, key: &str) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), route.segment(), key)
}

/// Records that have a canonical detail page.
pub trait AbsoluteUrl {
    fn route(&self) -> Route;
    fn route_key(&self) -> String;

    fn get_absolute_url(&self, prefix: &str) -> String {
        reverse(prefix, self.route(), &self.route_key())
    }
}

impl AbsoluteUrl for Author {
    fn route(&self) -> Route {
        Route::AuthorDetail
    }

    fn route_key(&self) -> String {
        self.id.to_string()
    }
}

impl AbsoluteUrl for Book {
    fn route(&self) -> Route {
        Route::BookDetail
    }

    fn route_key(&self) -> String {
        self.id.to_string()
    }
}

/// Categories are keyed by their unique slug, not by the numeric id that
/// authors and books use.
impl AbsoluteUrl for Category {
    fn route(&self) -> Route {
        Route::CategoryDetail
    }

    fn route_key(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_url_uses_id() {
        let author = Author {
            id: 1,
            fio: "Фамилия Имя".to_string(),
            date_of_birth: None,
            date_of_death: None,
        };
        assert_eq!(author.get_absolute_url("/privlib"), "/privlib/author/1");
        assert_eq!(author.get_absolute_url("/privlib/"), "/privlib/author/1");
    }

    #[test]
    fn category_url_uses_slug() {
        let category = Category {
            id: 7,
            name: "Поэзия".to_string(),
            description: String::new(),
            url: "poetry".to_string(),
        };
        assert_eq!(category.get_absolute_url(""), "/category/poetry");
    }

    #[test]
    fn route_names() {
        assert_eq!(Route::from_name("book-detail"), Some(Route::BookDetail));
        assert_eq!(Route::from_name("genre-detail"), None);
        assert_eq!(reverse("/p", Route::BookDetail, "42"), "/p/book/42");
    }
}
