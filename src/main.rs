use anyhow::Result;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use inkwell::build::build_site;
use inkwell::config::Config;
use inkwell::prompt::{new_article, refresh_article};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let project_arg = Arg::with_name("project")
        .short("p")
        .long("project")
        .value_name("DIR")
        .default_value(".")
        .help("The project root containing articles/, templates/ and resources/");

    let matches = App::new("inkwell")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A minimal static blog compiler")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site into the output directory")
                .arg(project_arg.clone())
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .value_name("DIR")
                        .help("Overrides the configured output directory"),
                ),
        )
        .subcommand(
            SubCommand::with_name("new")
                .about("Creates a new article record and an empty body")
                .arg(project_arg.clone()),
        )
        .subcommand(
            SubCommand::with_name("refresh")
                .about("Sets an article's creation time to now")
                .arg(project_arg),
        )
        .get_matches();

    init_logging(matches.value_of("log-level").unwrap_or("info"));

    match matches.subcommand() {
        ("build", Some(matches)) => build(matches),
        ("new", Some(matches)) => {
            let stdin = std::io::stdin();
            new_article(
                &mut stdin.lock(),
                &mut std::io::stdout(),
                &articles_directory(matches)?,
                chrono::Utc::now(),
            )?;
            Ok(())
        }
        ("refresh", Some(matches)) => {
            let stdin = std::io::stdin();
            refresh_article(
                &mut stdin.lock(),
                &mut std::io::stdout(),
                &articles_directory(matches)?,
                chrono::Utc::now(),
            )?;
            Ok(())
        }
        _ => unreachable!("clap requires a subcommand"),
    }
}

fn build(matches: &ArgMatches) -> Result<()> {
    let config = Config::from_directory(
        Path::new(matches.value_of("project").unwrap_or(".")),
        matches.value_of("output").map(Path::new),
    )?;
    build_site(&config)?;
    Ok(())
}

fn articles_directory(matches: &ArgMatches) -> Result<PathBuf> {
    let config = Config::from_directory(Path::new(matches.value_of("project").unwrap_or(".")), None)?;
    Ok(config.articles_directory)
}

/// Logs go to stderr so they don't interleave with the interactive prompts.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
