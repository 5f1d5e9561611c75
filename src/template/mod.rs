//! Message templating for routes.
//!
//! - `extractor`: resolves a route's variable mappings against message content
//! - `renderer`: substitutes the extracted variables into the route template

pub mod extractor;
pub mod renderer;

pub use extractor::{extract_path, extract_variables};
pub use renderer::{render_template, Template, TemplateError};
