//! The interactive `new` and `refresh` commands. Both read answers line by
//! line from `input` and write their prompts to `output`, which keeps them
//! testable without a terminal.

use crate::article::validate_id;
use crate::util::read_to_string;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Prompts for an id, title, date and tags (one per line, ended by a blank
/// line), then writes `{id}.json` and an empty `{id}.md` into
/// `articles_directory`. `create_date` is set to `now`. Returns the record
/// path. Existing files are never overwritten.
pub fn new_article<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    articles_directory: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let id = ask(input, output, "ID")?.ok_or_else(|| anyhow!("No ID given"))?;
    validate_id(&id)?;
    let title = ask(input, output, "Title")?.unwrap_or_default();
    let date = ask(input, output, "Date")?.unwrap_or_default();

    let mut tags = Vec::new();
    while let Some(tag) = ask(input, output, "Tag")? {
        if tag.is_empty() {
            break;
        }
        tags.push(tag);
    }

    let record = json!({
        "id": &id,
        "title": &title,
        "date": &date,
        "create_date": epoch_seconds(now),
        "tags": &tags,
    });

    let record_path = articles_directory.join(format!("{}.json", id));
    let body_path = articles_directory.join(format!("{}.md", id));
    if body_path.exists() {
        return Err(anyhow!("Article body `{}` already exists", body_path.display()));
    }
    serde_json::to_writer(create_new(&record_path)?, &record)?;
    create_new(&body_path)?;

    info!("Created {} {:?}", title, tags);
    Ok(record_path)
}

/// Prompts for an id and rewrites `{id}.json` in `articles_directory` with
/// `create_date` set to `now`. Every other field is kept as it is. Returns
/// the record path.
pub fn refresh_article<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    articles_directory: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let id = ask(input, output, "ID")?.ok_or_else(|| anyhow!("No ID given"))?;
    validate_id(&id)?;

    let record_path = articles_directory.join(format!("{}.json", id));
    let mut record: Value = serde_json::from_str(&read_to_string(&record_path, "article")?)
        .map_err(|e| anyhow!("Parsing `{}`: {}", record_path.display(), e))?;
    match record.as_object_mut() {
        Some(fields) => {
            fields.insert("create_date".to_owned(), json!(epoch_seconds(now)));
        }
        None => {
            return Err(anyhow!(
                "`{}` is not a JSON object",
                record_path.display()
            ))
        }
    }
    std::fs::write(&record_path, serde_json::to_string(&record)?)?;

    info!("Refreshed {}", id);
    Ok(record_path)
}

/// Seconds since the Unix epoch, with sub-second precision.
pub fn epoch_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9
}

/// Writes `{label}: ` and reads one line. Returns `None` at end of input,
/// otherwise the line with surrounding whitespace trimmed.
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<Option<String>> {
    write!(output, "{}: ", label)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}

fn create_new(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| anyhow!("Creating `{}`: {}", path.display(), e))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 500_000_000).unwrap()
    }

    fn read_record(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_new_article() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut input = Cursor::new("hello\nHello, world!\nApril 2021\nrust\n go \n\nignored\n");
        let mut output = Vec::new();
        let path = new_article(&mut input, &mut output, dir.path(), now())?;

        assert_eq!(dir.path().join("hello.json"), path);
        let record = read_record(&path);
        assert_eq!("hello", record["id"]);
        assert_eq!("Hello, world!", record["title"]);
        assert_eq!("April 2021", record["date"]);
        assert_eq!(1_600_000_000.5, record["create_date"].as_f64().unwrap());
        assert_eq!(json!(["rust", "go"]), record["tags"]);
        assert_eq!("", std::fs::read_to_string(dir.path().join("hello.md"))?);
        assert_eq!(
            "ID: Title: Date: Tag: Tag: Tag: ",
            String::from_utf8(output)?
        );
        Ok(())
    }

    #[test]
    fn test_new_article_refuses_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("hello.json"), "{}")?;
        let mut input = Cursor::new("hello\nT\nD\n\n");
        assert!(new_article(&mut input, &mut Vec::<u8>::new(), dir.path(), now()).is_err());
        assert_eq!("{}", std::fs::read_to_string(dir.path().join("hello.json"))?);
        Ok(())
    }

    #[test]
    fn test_new_article_invalid_id() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut input = Cursor::new("../hello\n");
        assert!(new_article(&mut input, &mut Vec::<u8>::new(), dir.path(), now()).is_err());
        let mut empty = Cursor::new("");
        assert!(new_article(&mut empty, &mut Vec::<u8>::new(), dir.path(), now()).is_err());
        Ok(())
    }

    #[test]
    fn test_refresh_article() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hello.json");
        std::fs::write(
            &path,
            r#"{"id": "hello", "title": "Hello", "create_date": 1, "tags": ["x"], "custom": true}"#,
        )?;
        let mut input = Cursor::new("hello\n");
        refresh_article(&mut input, &mut Vec::<u8>::new(), dir.path(), now())?;

        let record = read_record(&path);
        assert_eq!(1_600_000_000.5, record["create_date"].as_f64().unwrap());
        assert_eq!("Hello", record["title"]);
        assert_eq!(true, record["custom"]);
        assert!(record.get("human_time").is_none());
        Ok(())
    }

    #[test]
    fn test_refresh_missing_article() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut input = Cursor::new("nope\n");
        assert!(refresh_article(&mut input, &mut Vec::<u8>::new(), dir.path(), now()).is_err());
        Ok(())
    }
}
