//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading templates and articles,
//! cleaning the output directory, copying the static resources into it, and
//! writing article pages, tag pages, the global manifest and the index.

use crate::article::{load_articles, Error as LoadError};
use crate::config::Config;
use crate::render::{CommandConverter, Converter, Error as RenderError, IntroExtractor, MarkdownConverter};
use crate::tag::TagIndex;
use crate::template::{Error as TemplateError, Templates};
use crate::write::{Error as WriteError, Writer, ARTICLES_DIRECTORY, LISTS_DIRECTORY};
use std::fmt;
use std::path::{Path, PathBuf, StripPrefixError};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Builds the site from a [`Config`] object, converting markdown bodies with
/// the configured converter (see [`build_site_with`]).
pub fn build_site(config: &Config) -> Result<()> {
    let converter: Box<dyn Converter> = match &config.converter {
        Some(command) => Box::new(CommandConverter::new(&command.program, &command.args)),
        None => Box::new(MarkdownConverter::new(&config.intro_tag)),
    };
    build_site_with(config, converter.as_ref())
}

/// Builds the site using `converter` for bodies that aren't already HTML.
///
/// Everything that can fail on bad input (templates, article records) is
/// loaded before the output directory is touched, so a broken record leaves
/// the previous build in place. After that the steps run strictly in order
/// and the first failure aborts the build, possibly leaving a partial output
/// tree; the next build starts by deleting it anyway.
pub fn build_site_with(config: &Config, converter: &dyn Converter) -> Result<()> {
    info!("Blog compiler started");
    let templates = Templates::load(&config.templates_directory)?;
    let intro = IntroExtractor::new(&config.intro_tag)?;
    let mut articles = load_articles(&config.articles_directory)?;
    info!("Loaded {} articles", articles.len());

    check_output_directory(config)?;
    clean(&config.output_directory)?;
    scaffold(&config.resources_directory, &config.output_directory)?;

    let writer = Writer {
        templates: &templates,
        converter,
        intro: &intro,
        output_directory: &config.output_directory,
        site_root: config.site_root.as_ref(),
    };
    writer.write_articles(&mut articles)?;
    info!("Compiled all articles");

    let index = TagIndex::build(articles.iter().map(|(article, _)| article));
    if index.is_empty() {
        info!("No visible article has a tag; writing no tag pages");
    }
    writer.write_tags(&index)?;
    writer.write_global(&articles, &index)?;
    writer.write_index()?;

    info!(
        "Built {} articles and {} tags into {}",
        articles.len(),
        index.len(),
        config.output_directory.display()
    );
    Ok(())
}

/// Refuses an output directory that holds any of the project's source
/// directories, since CLEAN would delete them. Paths are compared after
/// canonicalization where they exist, so `.` and `../site` are caught too.
pub fn check_output_directory(config: &Config) -> Result<()> {
    let output = canonical(&config.output_directory);
    for source in &[
        &config.articles_directory,
        &config.templates_directory,
        &config.resources_directory,
    ] {
        if canonical(source).starts_with(&output) {
            return Err(Error::UnsafeOutput {
                output: config.output_directory.clone(),
                source: source.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_owned())
}

/// Removes `dir` and everything in it. A missing directory is not an error.
pub fn clean(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {
            info!("Removed existing {}", dir.display());
            Ok(())
        }
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// Creates `dst`, copies the contents of `resources` into it (if that
/// directory exists), and creates the `articles/` and `lists/` directories.
pub fn scaffold(resources: &Path, dst: &Path) -> Result<()> {
    create_dir_all(dst)?;
    if resources.is_dir() {
        copy_dir(resources, dst)?;
    } else {
        debug!("No resources directory at {}", resources.display());
    }
    create_dir_all(&dst.join(ARTICLES_DIRECTORY))?;
    create_dir_all(&dst.join(LISTS_DIRECTORY))
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src).min_depth(1).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = result?;
        let target = dst.join(entry.path().strip_prefix(src)?);
        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            debug!("Copying {}", entry.path().display());
            std::fs::copy(entry.path(), &target).map_err(|err| Error::Scaffold {
                path: target.clone(),
                err,
            })?;
        }
    }
    Ok(())
}

fn create_dir_all(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| Error::Scaffold {
        path: dir.to_owned(),
        err,
    })
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading,
/// rendering, writing, cleaning or scaffolding the output directory.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading templates.
    Template(TemplateError),

    /// Returned for errors loading articles.
    Load(LoadError),

    /// Returned when the intro pattern can't be built.
    Render(RenderError),

    /// Returned for errors writing output files.
    Write(WriteError),

    /// Returned when the output directory contains a source directory.
    UnsafeOutput { output: PathBuf, source: PathBuf },

    /// Returned for I/O problems while cleaning the output directory.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while scaffolding the output directory.
    Scaffold { path: PathBuf, err: std::io::Error },

    /// Returned for errors walking the resources directory.
    WalkDir(walkdir::Error),

    /// Returned when a walked path isn't inside the resources directory.
    StripPrefix(StripPrefixError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Load(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::UnsafeOutput { output, source } => write!(
                f,
                "Refusing to clean output directory '{}': it contains '{}'",
                output.display(),
                source.display()
            ),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::Scaffold { path, err } => {
                write!(f, "Scaffolding '{}': {}", path.display(), err)
            }
            Error::WalkDir(err) => err.fmt(f),
            Error::StripPrefix(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(err) => Some(err),
            Error::Load(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::UnsafeOutput { .. } => None,
            Error::Clean { path: _, err } => Some(err),
            Error::Scaffold { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::StripPrefix(err) => Some(err),
        }
    }
}

impl From<TemplateError> for Error {
    /// Converts [`TemplateError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: TemplateError) -> Error {
        Error::Template(err)
    }
}

impl From<LoadError> for Error {
    /// Converts [`LoadError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: LoadError) -> Error {
        Error::Load(err)
    }
}

impl From<RenderError> for Error {
    /// Converts [`RenderError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: RenderError) -> Error {
        Error::Render(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<StripPrefixError> for Error {
    fn from(err: StripPrefixError) -> Error {
        Error::StripPrefix(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render;
    use std::fs::{create_dir_all, read, read_to_string, write};

    /// Treats every body as already-rendered HTML.
    struct Passthrough;

    impl Converter for Passthrough {
        fn convert(&self, path: &Path) -> render::Result<String> {
            read_to_string(path).map_err(|err| render::Error::Read {
                path: path.to_owned(),
                err,
            })
        }
    }

    struct Project {
        dir: tempfile::TempDir,
    }

    impl Project {
        fn new() -> Project {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            for sub in &["articles", "templates", "resources/css"] {
                create_dir_all(root.join(sub)).unwrap();
            }
            let templates = [
                ("nav.html", "<nav/>"),
                ("article.html", "{{{NAV}}}<h1>{{{ARTICLE_TITLE}}}</h1>{{{ARTICLE_CONTENT}}}"),
                ("index.html", "{{{NAV}}}<p>home</p>"),
                ("list.html", "{{{NAV}}}<h1>{{{LIST_TITLE}}}</h1>{{{LIST_CONTENT}}}"),
                ("list_item.html", "<li>{{{LI_NAME}}}: {{{LI_DESCRIPTION}}}</li>"),
            ];
            for (name, contents) in &templates {
                write(root.join("templates").join(name), contents).unwrap();
            }
            write(root.join("resources/css/site.css"), "body {}").unwrap();
            Project { dir }
        }

        fn article(&self, stem: &str, record: &str, body: &str) {
            let articles = self.dir.path().join("articles");
            write(articles.join(format!("{}.json", stem)), record).unwrap();
            write(articles.join(format!("{}.md", stem)), body).unwrap();
        }

        fn config(&self) -> Config {
            Config::from_directory(self.dir.path(), None).unwrap()
        }

        fn out(&self, path: &str) -> PathBuf {
            self.dir.path().join("bin").join(path)
        }

        fn ids(&self, path: &str) -> Vec<String> {
            let json: serde_json::Value =
                serde_json::from_str(&read_to_string(self.out(path)).unwrap()).unwrap();
            json.as_array()
                .unwrap()
                .iter()
                .map(|a| a["id"].as_str().unwrap().to_owned())
                .collect()
        }
    }

    fn sample() -> Project {
        let project = Project::new();
        project.article(
            "a",
            r#"{"id": "a", "title": "A", "create_date": 100, "tags": ["go"]}"#,
            "<intro>Hello</intro>",
        );
        project.article(
            "b",
            r#"{"id": "b", "title": "B", "create_date": 200, "tags": ["go", "rust"]}"#,
            "no marker",
        );
        project.article(
            "c",
            r#"{"id": "c", "title": "C", "create_date": 300, "tags": ["go"], "hidden": true}"#,
            "secret",
        );
        project
    }

    #[test]
    fn test_build_site() -> Result<()> {
        let project = sample();
        build_site_with(&project.config(), &Passthrough)?;

        assert_eq!(vec!["b", "a"], project.ids("lists/go.json"));
        assert_eq!(vec!["b"], project.ids("lists/rust.json"));
        assert_eq!(
            "<nav/><h1>Go</h1><li>B: </li><li>A: Hello</li>",
            read_to_string(project.out("lists/go.html")).unwrap()
        );
        assert_eq!(
            "<nav/><h1>C</h1>secret",
            read_to_string(project.out("articles/c.html")).unwrap()
        );
        assert!(project.out("articles/a.html").is_file());
        assert!(project.out("articles/b.html").is_file());
        assert_eq!(
            "<nav/><p>home</p>",
            read_to_string(project.out("index.html")).unwrap()
        );
        assert_eq!(
            "body {}",
            read_to_string(project.out("css/site.css")).unwrap()
        );

        let global: serde_json::Value =
            serde_json::from_str(&read_to_string(project.out("global.json")).unwrap()).unwrap();
        assert_eq!(3, global["articles"].as_array().unwrap().len());
        assert_eq!("Hello", global["articles"][0][0]["desc"]);
        assert_eq!("", global["articles"][1][0]["desc"]);
        assert_eq!("b", global["tags"]["go"][0]["id"]);
        assert_eq!("b", global["tags"]["rust"][0]["id"]);
        assert!(global["tags"].get("c").is_none());
        Ok(())
    }

    #[test]
    fn test_build_is_idempotent() -> Result<()> {
        let project = sample();
        let files = ["global.json", "lists/go.json", "lists/go.html", "articles/a.html"];

        build_site_with(&project.config(), &Passthrough)?;
        let first: Vec<Vec<u8>> = files.iter().map(|f| read(project.out(f)).unwrap()).collect();
        build_site_with(&project.config(), &Passthrough)?;
        let second: Vec<Vec<u8>> = files.iter().map(|f| read(project.out(f)).unwrap()).collect();
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_rebuild_removes_stale_output() -> Result<()> {
        let project = sample();
        build_site_with(&project.config(), &Passthrough)?;
        std::fs::remove_file(project.dir.path().join("articles/b.json")).unwrap();
        build_site_with(&project.config(), &Passthrough)?;
        assert!(!project.out("articles/b.html").exists());
        assert!(!project.out("lists/rust.json").exists());
        Ok(())
    }

    #[test]
    fn test_missing_tags_aborts_before_output() {
        let project = sample();
        project.article("d", r#"{"id": "d", "title": "D"}"#, "");
        match build_site_with(&project.config(), &Passthrough) {
            Err(Error::Load(_)) => {}
            other => panic!("expected a load error, got {:?}", other),
        }
        assert!(!project.out("").exists());
    }

    #[test]
    fn test_missing_template_aborts() {
        let project = sample();
        std::fs::remove_file(project.dir.path().join("templates/list_item.html")).unwrap();
        match build_site_with(&project.config(), &Passthrough) {
            Err(Error::Template(_)) => {}
            other => panic!("expected a template error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_with_markdown_converter() -> Result<()> {
        let project = Project::new();
        project.article(
            "hello",
            r#"{"id": "hello", "title": "Hello", "tags": ["greet"]}"#,
            "!!!!!\nHi *there*\n!!!!!\n\nMore.\n",
        );
        build_site(&project.config())?;
        assert_eq!(
            "<nav/><h1>Hello</h1><intro><p>Hi <em>there</em></p>\n</intro>\n<p>More.</p>\n",
            read_to_string(project.out("articles/hello.html")).unwrap()
        );
        assert_eq!(
            "<nav/><h1>Greet</h1><li>Hello: <p>Hi <em>there</em></p>\n</li>",
            read_to_string(project.out("lists/greet.html")).unwrap()
        );
        Ok(())
    }

    #[test]
    fn test_output_directory_containing_sources_is_refused() {
        let project = sample();
        let root = project.dir.path();
        let nested = root.join("articles").join("..");
        for config in vec![
            Config::from_yaml(root, "output_directory: .", None).unwrap(),
            Config::from_directory(root, Some(&nested)).unwrap(),
            Config::from_directory(root, Some(root.parent().unwrap())).unwrap(),
        ] {
            match build_site_with(&config, &Passthrough) {
                Err(Error::UnsafeOutput { .. }) => {}
                other => panic!("expected an unsafe output error, got {:?}", other),
            }
        }
        assert!(root.join("articles/a.json").is_file());
        assert!(root.join("articles/a.md").is_file());
        assert!(root.join("templates/nav.html").is_file());
        assert!(root.join("resources/css/site.css").is_file());
    }

    #[test]
    fn test_output_directory_beside_sources_is_allowed() -> Result<()> {
        let project = sample();
        let out = project.dir.path().join("public");
        let config = Config::from_directory(project.dir.path(), Some(&out)).unwrap();
        check_output_directory(&config)?;
        build_site_with(&config, &Passthrough)?;
        assert!(out.join("index.html").is_file());
        Ok(())
    }

    #[test]
    fn test_clean_missing_directory() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        clean(&dir.path().join("never-created"))?;
        clean(&dir.path().join("never-created"))
    }

    #[test]
    fn test_scaffold_without_resources() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bin");
        scaffold(&dir.path().join("resources"), &out)?;
        assert!(out.join(ARTICLES_DIRECTORY).is_dir());
        assert!(out.join(LISTS_DIRECTORY).is_dir());
        Ok(())
    }
}
