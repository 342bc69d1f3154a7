use crate::article::{Article, LoadedArticle};
use crate::render::{render_body, Converter, Error as RenderError, IntroExtractor};
use crate::tag::TagIndex;
use crate::template::{Placeholder, Template, Templates};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};
use url::Url;

/// The subdirectory of the output directory holding article pages.
pub const ARTICLES_DIRECTORY: &str = "articles";

/// The subdirectory of the output directory holding tag pages and data.
pub const LISTS_DIRECTORY: &str = "lists";

/// Characters escaped when an article id becomes a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Responsible for templating and writing the generated files to disk.
pub struct Writer<'a> {
    /// The loaded templates, with the nav fragment already embedded.
    pub templates: &'a Templates,

    /// Renders article bodies that aren't already HTML.
    pub converter: &'a dyn Converter,

    /// Pulls each article's `desc` out of its rendered body.
    pub intro: &'a IntroExtractor,

    /// The root of the output tree. `articles/` and `lists/` must already
    /// exist inside it.
    pub output_directory: &'a Path,

    /// The base URL for list entry links. Without one, entries link to
    /// `../articles/{id}.html`, relative to the list page.
    pub site_root: Option<&'a Url>,
}

/// The site's machine-readable manifest, written to `global.json`.
#[derive(Serialize)]
struct Snapshot<'a> {
    articles: &'a [LoadedArticle],
    tags: &'a TagIndex<'a>,
}

impl Writer<'_> {
    /// Renders each article's body, records its intro as `desc`, and writes
    /// `articles/{id}.html`.
    pub fn write_articles(&self, articles: &mut [LoadedArticle]) -> Result<()> {
        for (article, body_path) in articles.iter_mut() {
            let _span = info_span!("article", id = %article.id).entered();
            info!("Compiling {} {:?}", article.title, article.tags);

            let content = render_body(self.converter, body_path).map_err(|err| Error::Render {
                path: body_path.clone(),
                err,
            })?;
            article.desc = self.intro.extract(&content);

            let tags = article.tags.join(", ");
            let page = self.templates.render(
                Template::Article,
                &[
                    (Placeholder::ArticleContent, &content),
                    (Placeholder::ArticleTitle, &article.title),
                    (Placeholder::ArticleTags, &tags),
                    (Placeholder::ArticleTime, &article.human_time),
                    (Placeholder::ArticleDate, article.date.as_deref().unwrap_or("")),
                ],
            );
            self.write_file(&self.article_path(article), &page)?;
        }
        Ok(())
    }

    /// Writes `lists/{tag}.json` and `lists/{tag}.html` for every tag.
    pub fn write_tags(&self, index: &TagIndex) -> Result<()> {
        for (tag, articles) in index.iter() {
            info!("Writing tag {} ({} articles)", tag, articles.len());
            let lists = self.output_directory.join(LISTS_DIRECTORY);
            self.write_json(&lists.join(format!("{}.json", tag)), &articles)?;

            let mut content = String::new();
            for article in articles {
                content.push_str(&self.list_item(article)?);
            }
            let page = self.templates.render(
                Template::List,
                &[
                    (Placeholder::ListTitle, &capitalize(tag)),
                    (Placeholder::ListContent, &content),
                ],
            );
            self.write_file(&lists.join(format!("{}.html", tag)), &page)?;
        }
        Ok(())
    }

    /// Writes `global.json`: every article with its body path, plus the full
    /// tag index.
    pub fn write_global(&self, articles: &[LoadedArticle], index: &TagIndex) -> Result<()> {
        self.write_json(
            &self.output_directory.join("global.json"),
            &Snapshot {
                articles,
                tags: index,
            },
        )
    }

    /// Writes `index.html`. The index template gets no substitution beyond
    /// the nav fragment.
    pub fn write_index(&self) -> Result<()> {
        self.write_file(
            &self.output_directory.join("index.html"),
            self.templates.get(Template::Index),
        )
    }

    fn list_item(&self, article: &Article) -> Result<String> {
        let target = self.article_url(article)?;
        let tags = article.tags.join(", ");
        Ok(self.templates.render(
            Template::ListItem,
            &[
                (Placeholder::LiTarget, &target),
                (Placeholder::LiName, &article.title),
                (Placeholder::LiTags, &tags),
                (Placeholder::LiDescription, &article.desc),
                (Placeholder::LiTime, &article.human_time),
            ],
        ))
    }

    fn article_path(&self, article: &Article) -> PathBuf {
        self.output_directory
            .join(ARTICLES_DIRECTORY)
            .join(format!("{}.html", article.id))
    }

    fn article_url(&self, article: &Article) -> Result<String> {
        let relative = format!(
            "{}/{}.html",
            ARTICLES_DIRECTORY,
            utf8_percent_encode(&article.id, PATH_SEGMENT)
        );
        match self.site_root {
            Some(root) => Ok(root.join(&relative)?.to_string()),
            None => Ok(format!("../{}", relative)),
        }
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        debug!("Writing {}", path.display());
        std::fs::write(path, contents).map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        debug!("Writing {}", path.display());
        let io_error = |err| Error::Io {
            path: path.to_owned(),
            err,
        };
        let mut w = BufWriter::new(std::fs::File::create(path).map_err(io_error)?);
        serde_json::to_writer(&mut w, value).map_err(|err| Error::Json {
            path: path.to_owned(),
            err,
        })?;
        w.flush().map_err(io_error)
    }
}

/// Uppercases the first character and lowercases the rest, e.g. `rust-Lang`
/// becomes `Rust-lang`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    }
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error rendering an article body.
    Render { path: PathBuf, err: RenderError },

    /// An error serializing JSON output.
    Json { path: PathBuf, err: serde_json::Error },

    /// An error building an article URL.
    UrlParse(url::ParseError),

    /// An error writing an output file.
    Io { path: PathBuf, err: io::Error },
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. This allows us to use
    /// the `?` operator for URL joining.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Render { path, err } => {
                write!(f, "Rendering '{}': {}", path.display(), err)
            }
            Error::Json { path, err } => {
                write!(f, "Serializing '{}': {}", path.display(), err)
            }
            Error::UrlParse(err) => err.fmt(f),
            Error::Io { path, err } => write!(f, "Writing '{}': {}", path.display(), err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Render { path: _, err } => Some(err),
            Error::Json { path: _, err } => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}
