//! Defines the [`Article`] type and the logic for loading articles from the
//! file system into memory. See [`load_articles`] for the source layout.

use std::{
    collections::HashMap,
    ffi::OsStr,
    fmt,
    fs::read_dir,
    path::{Path, PathBuf},
};

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

const RECORD_EXTENSION: &str = "json";

/// The body extensions an article may use, in order of preference.
const BODY_EXTENSIONS: [&str; 2] = ["md", "html"];

/// The format of [`Article::human_time`].
pub const HUMAN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One blog post's metadata. The body lives in a separate file; see
/// [`LoadedArticle`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// Unique identifier. This is the file name stem of the rendered page.
    pub id: String,

    /// The display title.
    pub title: String,

    /// A free-form display date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Creation time in seconds since the Unix epoch. Articles are ordered by
    /// this field, newest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<f64>,

    /// The article's tags, trimmed and de-duplicated in source order.
    pub tags: Vec<String>,

    /// Hidden articles get a page but are left out of every tag listing.
    #[serde(default)]
    pub hidden: bool,

    /// `create_date` formatted as `YYYY-MM-DD HH:MM:SS` in UTC, or empty.
    #[serde(default, skip_deserializing)]
    pub human_time: String,

    /// The intro excerpt, filled in once the body has been rendered.
    #[serde(default, skip_deserializing)]
    pub desc: String,
}

/// An [`Article`] paired with the path of its body file.
pub type LoadedArticle = (Article, PathBuf);

/// Formats an epoch timestamp as [`HUMAN_TIME_FORMAT`] in UTC. Returns `None`
/// if the timestamp is not finite or out of range.
pub fn human_time(create_date: f64) -> Option<String> {
    if !create_date.is_finite() {
        return None;
    }
    let secs = create_date.floor();
    let nanos = ((create_date - secs) * 1e9) as u32;
    Utc.timestamp_opt(secs as i64, nanos)
        .single()
        .map(|time| time.format(HUMAN_TIME_FORMAT).to_string())
}

/// Loads every article record in `directory`. A record is a `*.json` file
/// holding at least `id`, `title` and `tags`:
///
/// ```json
/// {"id": "hello", "title": "Hello, world!", "create_date": 1618531200, "tags": ["greet"]}
/// ```
///
/// Each record's body is the file with the same stem and an `.md` extension,
/// or failing that an `.html` extension. Records are returned in file name
/// order. Any bad record fails the whole load, as does an `id` used by more
/// than one record.
pub fn load_articles(directory: &Path) -> Result<Vec<LoadedArticle>> {
    let mut record_paths = Vec::new();
    for result in read_dir(directory).map_err(|err| Error::ReadDirectory {
        path: directory.to_owned(),
        err,
    })? {
        let entry = result?;
        let path = entry.path();
        if entry.file_type()?.is_file()
            && path.extension() == Some(OsStr::new(RECORD_EXTENSION))
        {
            record_paths.push(path);
        }
    }
    record_paths.sort();

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    let mut articles = Vec::with_capacity(record_paths.len());
    for path in record_paths {
        let (article, body_path) = match load_article(&path) {
            Ok(loaded) => loaded,
            Err(e) => return Err(Error::Annotated(path, Box::new(e))),
        };
        if let Some(first) = seen.insert(article.id.clone(), path.clone()) {
            return Err(Error::DuplicateId {
                id: article.id,
                first,
                second: path,
            });
        }
        articles.push((article, body_path));
    }
    Ok(articles)
}

/// Parses a single record and resolves its body file.
fn load_article(path: &Path) -> Result<LoadedArticle> {
    let contents = std::fs::read_to_string(path)?;
    let mut article: Article = serde_json::from_str(&contents)?;

    validate_id(&article.id)?;
    article.tags = normalize_tags(&article.tags)?;
    if let Some(create_date) = article.create_date {
        article.human_time =
            human_time(create_date).ok_or(Error::InvalidCreateDate(create_date))?;
    }

    let body_path = BODY_EXTENSIONS
        .iter()
        .map(|extension| path.with_extension(extension))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::MissingBody(path.with_extension(BODY_EXTENSIONS[0])))?;

    Ok((article, body_path))
}

/// Checks that `id` can be used as a file name stem.
pub(crate) fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(is_separator) {
        return Err(Error::InvalidId(id.to_owned()));
    }
    Ok(())
}

/// Trims each tag, drops empty ones and repeats, and rejects tags that can't
/// be used as a file name stem. Case is preserved.
fn normalize_tags(tags: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || normalized.iter().any(|t| t == tag) {
            continue;
        }
        if tag == "." || tag == ".." || tag.contains(is_separator) {
            return Err(Error::InvalidTag(tag.to_owned()));
        }
        normalized.push(tag.to_owned());
    }
    Ok(normalized)
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Represents the result of an [`Article`]-load operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading [`Article`]s.
#[derive(Debug)]
pub enum Error {
    /// Returned when the articles directory can't be listed.
    ReadDirectory { path: PathBuf, err: std::io::Error },

    /// Returned when a record isn't valid JSON or lacks a required field.
    DeserializeJson(serde_json::Error),

    /// Returned when an `id` is empty or contains a path separator.
    InvalidId(String),

    /// Returned when a tag contains a path separator.
    InvalidTag(String),

    /// Returned when `create_date` can't be represented as a UTC time.
    InvalidCreateDate(f64),

    /// Returned when a record has no body file. Holds the preferred body
    /// path.
    MissingBody(PathBuf),

    /// Returned when two records share an `id`.
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// An error annotated with the record it came from.
    Annotated(PathBuf, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ReadDirectory { path, err } => {
                write!(f, "Reading articles directory '{}': {}", path.display(), err)
            }
            Error::DeserializeJson(err) => err.fmt(f),
            Error::InvalidId(id) => write!(f, "invalid article id: {:?}", id),
            Error::InvalidTag(tag) => write!(f, "invalid tag: {:?}", tag),
            Error::InvalidCreateDate(create_date) => {
                write!(f, "create_date out of range: {}", create_date)
            }
            Error::MissingBody(path) => {
                write!(f, "missing article body '{}' (or .html)", path.display())
            }
            Error::DuplicateId { id, first, second } => write!(
                f,
                "article id {:?} is used by both '{}' and '{}'",
                id,
                first.display(),
                second.display()
            ),
            Error::Io(err) => err.fmt(f),
            Error::Annotated(path, err) => {
                write!(f, "loading article '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ReadDirectory { path: _, err } => Some(err),
            Error::DeserializeJson(err) => Some(err),
            Error::InvalidId(_) => None,
            Error::InvalidTag(_) => None,
            Error::InvalidCreateDate(_) => None,
            Error::MissingBody(_) => None,
            Error::DuplicateId { .. } => None,
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_json`] deserialization functions.
    fn from(err: serde_json::Error) -> Error {
        Error::DeserializeJson(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}
