// ABOUTME: Script template module for the provisioning step engine
// ABOUTME: Parsed handlebars script templates and the named template store

pub mod error;
pub mod helpers;
pub mod script;
pub mod store;

pub use error::{Result, TemplateError, TemplateLoadError};
pub use script::ScriptTemplate;
pub use store::TemplateStore;
