//! Defines the [`Templates`] store along with the [`Template`] and
//! [`Placeholder`] names used to render pages.
//!
//! Templates are plain HTML files containing literal placeholder tokens of the
//! form `{{{NAME}}}`. There is no templating language beyond substituting those
//! tokens; [`Templates::render`] takes the template to render and a list of
//! `(Placeholder, value)` pairs and returns the rendered text.

use regex::{Captures, Regex};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// The templates a site is built from. Each is loaded from
/// `{templates_directory}/{file_name}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Template {
    /// The navigation fragment. It is embedded into every other template
    /// wherever `{{{NAV}}}` appears.
    Nav,

    /// The page for a single article.
    Article,

    /// The site's home page.
    Index,

    /// The listing page for a single tag.
    List,

    /// One entry of a tag listing page.
    ListItem,
}

impl Template {
    /// Returns the template's file name relative to the templates directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Template::Nav => "nav.html",
            Template::Article => "article.html",
            Template::Index => "index.html",
            Template::List => "list.html",
            Template::ListItem => "list_item.html",
        }
    }
}

/// A substitution point in a template. The token written in template files is
/// the placeholder's [`Placeholder::name`] wrapped in triple braces, e.g.
/// `{{{ARTICLE_TITLE}}}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    Nav,
    ArticleContent,
    ArticleTitle,
    ArticleTags,
    ArticleTime,
    ArticleDate,
    ListTitle,
    ListContent,
    LiTarget,
    LiName,
    LiTags,
    LiDescription,
    LiTime,
}

impl Placeholder {
    pub fn name(self) -> &'static str {
        match self {
            Placeholder::Nav => "NAV",
            Placeholder::ArticleContent => "ARTICLE_CONTENT",
            Placeholder::ArticleTitle => "ARTICLE_TITLE",
            Placeholder::ArticleTags => "ARTICLE_TAGS",
            Placeholder::ArticleTime => "ARTICLE_TIME",
            Placeholder::ArticleDate => "ARTICLE_DATE",
            Placeholder::ListTitle => "LIST_TITLE",
            Placeholder::ListContent => "LIST_CONTENT",
            Placeholder::LiTarget => "LI_TARGET",
            Placeholder::LiName => "LI_NAME",
            Placeholder::LiTags => "LI_TAGS",
            Placeholder::LiDescription => "LI_DESCRIPTION",
            Placeholder::LiTime => "LI_TIME",
        }
    }
}

/// The loaded set of templates. Every template except [`Template::Nav`] has
/// already had the nav fragment embedded, so the text returned by
/// [`Templates::get`] is ready for page-level substitution.
pub struct Templates {
    nav: String,
    article: String,
    index: String,
    list: String,
    list_item: String,
    token: Regex,
}

impl Templates {
    /// Reads every [`Template`] from `directory`. A missing or unreadable
    /// template file is an error.
    pub fn load(directory: &Path) -> Result<Templates> {
        let read = |template: Template| -> Result<String> {
            let path = directory.join(template.file_name());
            std::fs::read_to_string(&path).map_err(|err| Error::Read { path, err })
        };

        Ok(Templates::new(
            read(Template::Nav)?,
            read(Template::Article)?,
            read(Template::Index)?,
            read(Template::List)?,
            read(Template::ListItem)?,
        ))
    }

    /// Builds the store from template sources and embeds `nav` into the
    /// others.
    pub fn new(
        nav: String,
        article: String,
        index: String,
        list: String,
        list_item: String,
    ) -> Templates {
        let token = Regex::new(r"\{\{\{([A-Z_]+)\}\}\}")
            .expect("placeholder pattern is a valid regex");
        let embed = |text: &str| substitute(&token, text, &[(Placeholder::Nav, &nav)]);

        Templates {
            article: embed(&article),
            index: embed(&index),
            list: embed(&list),
            list_item: embed(&list_item),
            nav,
            token,
        }
    }

    /// Returns a template's text.
    pub fn get(&self, template: Template) -> &str {
        match template {
            Template::Nav => &self.nav,
            Template::Article => &self.article,
            Template::Index => &self.index,
            Template::List => &self.list,
            Template::ListItem => &self.list_item,
        }
    }

    /// Renders `template`, replacing each placeholder token listed in
    /// `fields` with its value. Substitution happens in a single pass, so
    /// tokens inside a substituted value are never expanded. Tokens without a
    /// value in `fields` are left as they are.
    pub fn render(&self, template: Template, fields: &[(Placeholder, &str)]) -> String {
        substitute(&self.token, self.get(template), fields)
    }
}

fn substitute(token: &Regex, text: &str, fields: &[(Placeholder, &str)]) -> String {
    token
        .replace_all(text, |caps: &Captures| {
            match fields.iter().find(|(placeholder, _)| placeholder.name() == &caps[1]) {
                Some((_, value)) => (*value).to_owned(),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// The result of loading templates.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading templates.
#[derive(Debug)]
pub enum Error {
    /// Returned when a template file can't be read.
    Read { path: PathBuf, err: io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
        }
    }
}
