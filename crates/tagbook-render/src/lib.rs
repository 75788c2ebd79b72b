mod error;
mod html;
mod image;
mod rules;
mod source;

pub use error::RenderError;
pub use html::{VERSION, render_document, write_document};
pub use image::{embed_image, probe_image};
pub use rules::load_rules;
pub use source::FsDocSource;
