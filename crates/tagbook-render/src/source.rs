use std::io;
use std::path::Path;

use tagbook_core::{DocSource, EmbeddedImage, ImageError};

use crate::image::probe_image;

/// The real filesystem behind the core's collaborator seam.
pub struct FsDocSource;

impl DocSource for FsDocSource {
    fn read_text(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn image(&self, path: &Path) -> Result<EmbeddedImage, ImageError> {
        probe_image(path)
    }
}
