//! Image probing for embedding: byte-format sniffing for the handful of
//! formats browsers render everywhere, dimension extraction, and `data:`
//! URI building.

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use tagbook_core::{EmbeddedImage, ImageError};

/// Anything larger than this in either dimension is refused; title images
/// and inline figures have no business being wallpaper.
const MAX_DIMENSION: u32 = 2048;

pub fn probe_image(path: &Path) -> Result<EmbeddedImage, ImageError> {
    let data = fs::read(path).map_err(|_| ImageError::Unreadable)?;
    embed_image(&data)
}

pub fn embed_image(data: &[u8]) -> Result<EmbeddedImage, ImageError> {
    let (mime, width, height) = sniff(data).ok_or(ImageError::Unsupported)?;
    if width < 1 || height < 1 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ImageError::Unsupported);
    }
    let src = format!("data:image/{mime};base64,{}", STANDARD.encode(data));
    Ok(EmbeddedImage {
        mime: mime.to_string(),
        width,
        height,
        src,
    })
}

fn sniff(buf: &[u8]) -> Option<(&'static str, u32, u32)> {
    if buf.len() > 9 && buf.starts_with(b"GIF") {
        let width = u32::from(buf[6]) | (u32::from(buf[7]) << 8);
        let height = u32::from(buf[8]) | (u32::from(buf[9]) << 8);
        return Some(("gif", width, height));
    }
    if buf.len() > 23 && buf.starts_with(b"\x89PNG") && &buf[12..16] == b"IHDR" {
        let width = (u32::from(buf[18]) << 8) | u32::from(buf[19]);
        let height = (u32::from(buf[22]) << 8) | u32::from(buf[23]);
        return Some(("png", width, height));
    }
    if buf.len() > 28
        && buf[0] == 0xff
        && buf[1] == 0xd8
        && buf[2] == 0xff
        && buf[3] == 0xe0
        && &buf[6..10] == b"JFIF"
    {
        // Walk the segment stream for the SOF0 marker.
        let mut i = 20;
        while i + 8 < buf.len() {
            if buf[i] == 0xff && buf[i + 1] == 0xc0 {
                let height = (u32::from(buf[i + 5]) << 8) | u32::from(buf[i + 6]);
                let width = (u32::from(buf[i + 7]) << 8) | u32::from(buf[i + 8]);
                return Some(("jpeg", width, height));
            }
            i += 1;
        }
        return Some(("jpeg", 0, 0));
    }
    let webp = if buf.len() > 20 && buf.starts_with(b"RIFF") && &buf[8..12] == b"WEBP" {
        Some(&buf[8..])
    } else if buf.len() > 12 && buf.starts_with(b"WEBP") {
        Some(buf)
    } else {
        None
    };
    if let Some(buf) = webp {
        if buf.len() > 8 && &buf[4..8] == b"VP8 " {
            let mut i = 8;
            while i + 8 < buf.len() {
                if buf[i] == 0x9d && buf[i + 1] == 0x01 && buf[i + 2] == 0x2a {
                    let width = ((u32::from(buf[i + 4]) << 8) | u32::from(buf[i + 3])) & 0x3fff;
                    let height = ((u32::from(buf[i + 6]) << 8) | u32::from(buf[i + 5])) & 0x3fff;
                    return Some(("webp", width, height));
                }
                i += 1;
            }
            return Some(("webp", 0, 0));
        }
        if buf.len() > 15 && &buf[4..8] == b"VP8L" && buf[12] == 0x2f {
            let width = ((u32::from(buf[14]) << 8) | u32::from(buf[13])) & 0x3fff;
            let height = ((u32::from(buf[15]) << 2) | (u32::from(buf[14]) >> 6)) & 0x3fff;
            return Some(("webp", width, height));
        }
        if buf.len() > 20 && &buf[4..8] == b"VP8X" {
            let width = ((u32::from(buf[17]) << 8) | u32::from(buf[16])) + 1;
            let height = ((u32::from(buf[20]) << 8) | u32::from(buf[19])) + 1;
            return Some(("webp", width, height));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::embed_image;
    use tagbook_core::ImageError;

    fn tiny_gif() -> Vec<u8> {
        // 2x3 logical screen, no frames needed for sniffing
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[2, 0, 3, 0, 0, 0, 0]);
        data
    }

    #[test]
    fn gif_dimensions_and_data_uri() {
        let image = embed_image(&tiny_gif()).expect("gif");
        assert_eq!(image.mime, "gif");
        assert_eq!((image.width, image.height), (2, 3));
        assert!(image.src.starts_with("data:image/gif;base64,"));
    }

    #[test]
    fn png_dimensions() {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(&[0, 0, 0, 13]);
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&[0, 0, 0, 16, 0, 0, 0, 9]);
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        let image = embed_image(&data).expect("png");
        assert_eq!(image.mime, "png");
        assert_eq!((image.width, image.height), (16, 9));
    }

    #[test]
    fn garbage_is_unsupported() {
        assert_eq!(embed_image(b"not an image"), Err(ImageError::Unsupported));
    }

    #[test]
    fn oversized_is_refused() {
        let mut data = b"GIF89a".to_vec();
        data.extend_from_slice(&[0xff, 0xff, 3, 0, 0, 0, 0]);
        assert_eq!(embed_image(&data), Err(ImageError::Unsupported));
    }
}
