use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// The optional project file, looked up in the project root.
pub const PROJECT_FILE: &str = "inkwell.yaml";

#[derive(Deserialize)]
struct OutputDirectory(PathBuf);
impl Default for OutputDirectory {
    fn default() -> Self {
        OutputDirectory(PathBuf::from("bin"))
    }
}

#[derive(Deserialize)]
struct IntroTag(String);
impl Default for IntroTag {
    fn default() -> Self {
        IntroTag(String::from("intro"))
    }
}

#[derive(Deserialize, Default)]
struct Project {
    #[serde(default)]
    pub output_directory: OutputDirectory,

    #[serde(default)]
    pub site_root: Option<Url>,

    #[serde(default)]
    pub converter: Option<Vec<String>>,

    #[serde(default)]
    pub intro_tag: IntroTag,
}

/// An external program used to convert markdown bodies, invoked as
/// `{program} {args...} {body_path}`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConverterCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug)]
pub struct Config {
    pub articles_directory: PathBuf,
    pub templates_directory: PathBuf,
    pub resources_directory: PathBuf,
    pub output_directory: PathBuf,

    /// When set, list entries link to absolute article URLs under this root.
    /// Always ends in a slash.
    pub site_root: Option<Url>,

    /// `None` means markdown is rendered in-process.
    pub converter: Option<ConverterCommand>,

    pub intro_tag: String,
}

impl Config {
    /// Loads the configuration for the project rooted at `root`. The project
    /// file is optional; without it every setting takes its default. An
    /// `output_directory` override is used as given, while the configured one
    /// is relative to `root`.
    pub fn from_directory(root: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let path = root.join(PROJECT_FILE);
        let project = if path.exists() {
            use crate::util::open;
            serde_yaml::from_reader(open(&path, "project")?)
                .map_err(|e| anyhow!("Loading configuration `{}`: {}", path.display(), e))?
        } else {
            Project::default()
        };
        Config::from_project(root, project, output_directory)
    }

    /// Parses a project file's contents. See [`Config::from_directory`].
    pub fn from_yaml(root: &Path, yaml: &str, output_directory: Option<&Path>) -> Result<Config> {
        Config::from_project(root, serde_yaml::from_str(yaml)?, output_directory)
    }

    fn from_project(
        root: &Path,
        project: Project,
        output_directory: Option<&Path>,
    ) -> Result<Config> {
        let intro_tag = project.intro_tag.0;
        if intro_tag.is_empty()
            || !intro_tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(anyhow!(
                "`intro_tag` must be a non-empty HTML tag name, got {:?}",
                intro_tag
            ));
        }

        let converter = match project.converter {
            None => None,
            Some(command) => match command.split_first() {
                None => return Err(anyhow!("`converter` must name a program")),
                Some((program, args)) => Some(ConverterCommand {
                    program: program.clone(),
                    args: args.to_vec(),
                }),
            },
        };

        Ok(Config {
            articles_directory: root.join("articles"),
            templates_directory: root.join("templates"),
            resources_directory: root.join("resources"),
            output_directory: match output_directory {
                Some(dir) => dir.to_owned(),
                None => root.join(project.output_directory.0),
            },
            // NOTE: without a trailing slash, [`Url::join`] treats the last
            // path segment as a file name and replaces it.
            site_root: project.site_root.map(|mut url| {
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                url
            }),
            converter,
            intro_tag,
        })
    }
}
