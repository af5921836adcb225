// ABOUTME: Error types for template parsing, rendering and loading
// ABOUTME: Separates load-time failures from per-run render failures

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template syntax error in '{name}': {message}")]
    SyntaxError { name: String, message: String },

    #[error("Template render error in '{name}': {source}")]
    RenderError {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },
}

#[derive(Error, Debug)]
pub enum TemplateLoadError {
    #[error("Template location '{path}' is not readable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template location '{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to walk template directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to read template file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse template file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
}

pub type Result<T> = std::result::Result<T, TemplateError>;
