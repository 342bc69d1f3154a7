//! Turns article bodies into HTML and extracts their intro excerpts.
//!
//! Conversion goes through the [`Converter`] trait so the rest of the build
//! doesn't care whether bodies are rendered in-process ([`MarkdownConverter`])
//! or by an external program ([`CommandConverter`]). Bodies that are already
//! HTML bypass the converter entirely (see [`render_body`]).

use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::string::FromUtf8Error;
use tracing::warn;

/// A line consisting of exactly this opens or closes an intro region in
/// markdown handled by [`MarkdownConverter`].
pub const INTRO_FENCE: &str = "!!!!!";

/// Converts an article body file into HTML.
pub trait Converter {
    fn convert(&self, path: &Path) -> Result<String>;
}

/// Renders a body file. `.html` bodies are returned verbatim; everything else
/// is handed to `converter`.
pub fn render_body(converter: &dyn Converter, path: &Path) -> Result<String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => read(path),
        _ => converter.convert(path),
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|err| Error::Read {
        path: path.to_owned(),
        err,
    })
}

/// Converts markdown in-process with [`pulldown_cmark`]. Text between two
/// [`INTRO_FENCE`] lines is rendered as usual and wrapped in the intro tag, so
/// `!!!!!\nHello\n!!!!!` becomes `<intro><p>Hello</p>\n</intro>`. A fence
/// that is never closed runs to the end of the file.
pub struct MarkdownConverter {
    intro_tag: String,
}

impl MarkdownConverter {
    pub fn new(intro_tag: &str) -> MarkdownConverter {
        MarkdownConverter {
            intro_tag: intro_tag.to_owned(),
        }
    }

    /// Converts `markdown` to HTML, appending the result to `out`.
    pub fn to_html(&self, out: &mut String, markdown: &str) {
        let mut in_intro = false;
        let mut chunk = String::new();
        for line in markdown.split_inclusive('\n') {
            if line.trim_end() == INTRO_FENCE {
                self.flush(out, &chunk, in_intro);
                chunk.clear();
                in_intro = !in_intro;
            } else {
                chunk.push_str(line);
            }
        }
        self.flush(out, &chunk, in_intro);
    }

    fn flush(&self, out: &mut String, chunk: &str, in_intro: bool) {
        if in_intro {
            out.push_str(&format!("<{}>", self.intro_tag));
            push_markdown(out, chunk);
            out.push_str(&format!("</{}>\n", self.intro_tag));
        } else if !chunk.is_empty() {
            push_markdown(out, chunk);
        }
    }
}

fn push_markdown(out: &mut String, markdown: &str) {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    html::push_html(out, Parser::new_ext(markdown, options));
}

impl Converter for MarkdownConverter {
    fn convert(&self, path: &Path) -> Result<String> {
        let markdown = read(path)?;
        let mut out = String::new();
        self.to_html(&mut out, &markdown);
        Ok(out)
    }
}

/// Converts bodies by running an external program as
/// `{program} {args...} {path}` and capturing its standard output. The call
/// blocks until the program exits; there is no timeout.
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: &str, args: &[String]) -> CommandConverter {
        CommandConverter {
            program: program.to_owned(),
            args: args.to_vec(),
        }
    }
}

impl Converter for CommandConverter {
    fn convert(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|err| Error::Spawn {
                program: self.program.clone(),
                err,
            })?;
        if !output.status.success() {
            return Err(Error::Failed {
                program: self.program.clone(),
                path: path.to_owned(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|err| Error::Utf8 {
            program: self.program.clone(),
            err,
        })
    }
}

/// Finds the intro excerpt in rendered HTML: the text between the first
/// `<{tag}>` and the following `</{tag}>`, newlines included.
pub struct IntroExtractor {
    tag: String,
    pattern: Regex,
}

impl IntroExtractor {
    pub fn new(tag: &str) -> Result<IntroExtractor> {
        let pattern = Regex::new(&format!(r"(?s)<{0}>(.*?)</{0}>", regex::escape(tag)))?;
        Ok(IntroExtractor {
            tag: tag.to_owned(),
            pattern,
        })
    }

    /// Returns the excerpt, or an empty string (with a warning) if `html` has
    /// no intro marker.
    pub fn extract(&self, html: &str) -> String {
        match self.pattern.captures(html).and_then(|caps| caps.get(1)) {
            Some(intro) => intro.as_str().to_owned(),
            None => {
                warn!("no <{}> marker found; description left empty", self.tag);
                String::new()
            }
        }
    }
}

/// The result of a fallible rendering operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rendering an article body.
#[derive(Debug)]
pub enum Error {
    /// Returned when a body file can't be read.
    Read { path: PathBuf, err: io::Error },

    /// Returned when the conversion program can't be started.
    Spawn { program: String, err: io::Error },

    /// Returned when the conversion program exits unsuccessfully.
    Failed {
        program: String,
        path: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    /// Returned when the conversion program's output isn't UTF-8.
    Utf8 { program: String, err: FromUtf8Error },

    /// Returned when the intro pattern can't be compiled.
    Pattern(regex::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "Reading body '{}': {}", path.display(), err)
            }
            Error::Spawn { program, err } => write!(f, "Running `{}`: {}", program, err),
            Error::Failed {
                program,
                path,
                status,
                stderr,
            } => write!(
                f,
                "`{}` failed on '{}' ({}): {}",
                program,
                path.display(),
                status,
                stderr
            ),
            Error::Utf8 { program, err } => {
                write!(f, "Output of `{}` is not UTF-8: {}", program, err)
            }
            Error::Pattern(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
            Error::Spawn { program: _, err } => Some(err),
            Error::Failed { .. } => None,
            Error::Utf8 { program: _, err } => Some(err),
            Error::Pattern(err) => Some(err),
        }
    }
}

impl From<regex::Error> for Error {
    /// Converts a [`regex::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator when compiling patterns.
    fn from(err: regex::Error) -> Error {
        Error::Pattern(err)
    }
}
