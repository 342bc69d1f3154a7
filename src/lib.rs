//! The library code for the `inkwell` static blog compiler. A build is a
//! single linear pass:
//!
//! 1. Loading templates ([`crate::template`]) and article records
//!    ([`crate::article`])
//! 2. Cleaning the output directory and copying static resources into it
//!    ([`crate::build`])
//! 3. Rendering each article's body and writing its page ([`crate::render`],
//!    [`crate::write`])
//! 4. Grouping visible articles by tag and writing a listing page and a JSON
//!    dump per tag ([`crate::tag`], [`crate::write`])
//! 5. Writing the global JSON manifest and the index page
//!
//! Any error aborts the build. The third step is the only one that depends on
//! an outside collaborator: markdown bodies are converted either in-process or
//! by an external program, behind the [`render::Converter`] trait.
//!
//! The [`crate::prompt`] module holds the interactive `new` and `refresh`
//! commands that create and touch article records.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod article;
pub mod build;
pub mod config;
pub mod prompt;
pub mod render;
pub mod tag;
pub mod template;
pub mod write;

mod util;
