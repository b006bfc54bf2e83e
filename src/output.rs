//! Writing finished images to disk.  The format follows the file
//! extension; every format is encoded by the `image` crate.

use image::bmp::BMPEncoder;
use image::png::PNGEncoder;
use image::pnm::{PNMEncoder, PNMSubtype, SampleEncoding};
use image::ColorType;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::buffer::ImageBuffer;
use crate::error::{MandelError, Result};

/// The file formats we know how to write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    /// 24-bit uncompressed bitmap: a 54 byte header, then the rows
    /// from the bottom up as blue-green-red triples, each row padded
    /// to a multiple of four bytes.
    Bitmap,
    /// Binary PPM.
    Pixmap,
    /// PNG.
    Png,
}

impl Format {
    /// Pick a format from a path's extension.  Paths with no extension
    /// are written as bitmaps.
    pub fn from_path(path: &Path) -> Result<Format> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_ref().map(|e| e.as_str()) {
            None | Some("bmp") => Ok(Format::Bitmap),
            Some("ppm") | Some("pnm") => Ok(Format::Pixmap),
            Some("png") => Ok(Format::Png),
            Some(other) => Err(MandelError::InvalidArgument(format!(
                "don't know how to write .{} files",
                other
            ))),
        }
    }
}

/// Write an image to `outfile` in the format its name asks for.
pub fn write_image(outfile: &Path, image: &ImageBuffer) -> Result<()> {
    let format = Format::from_path(outfile)?;
    let mut output = BufWriter::new(File::create(outfile)?);
    let (width, height) = (image.width() as u32, image.height() as u32);
    let pixels = image.to_rgb_bytes();
    match format {
        Format::Bitmap => {
            BMPEncoder::new(&mut output).encode(&pixels, width, height, ColorType::RGB(8))?
        }
        Format::Pixmap => {
            let mut encoder = PNMEncoder::new(&mut output)
                .with_subtype(PNMSubtype::Pixmap(SampleEncoding::Binary));
            encoder.encode(&pixels[..], width, height, ColorType::RGB(8))?
        }
        Format::Png => {
            PNGEncoder::new(&mut output).encode(&pixels, width, height, ColorType::RGB(8))?
        }
    }
    output.flush()?;
    info!("wrote {}x{} {:?} to {}", width, height, format, outfile.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Pixel;
    use std::fs;

    /// Size of a 24-bit bitmap: header plus rows padded to four bytes.
    fn bitmap_size(width: usize, height: usize) -> u64 {
        (54 + (width * 3 + (4 - (width * 3) % 4) % 4) * height) as u64
    }

    fn le32(bytes: &[u8], at: usize) -> u32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&bytes[at..at + 4]);
        u32::from_le_bytes(b)
    }

    fn bitmap_of(image: &ImageBuffer) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bmp");
        write_image(&path, image).unwrap();
        fs::read(&path).unwrap()
    }

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(Format::from_path(Path::new("a.bmp")).unwrap(), Format::Bitmap);
        assert_eq!(Format::from_path(Path::new("a.BMP")).unwrap(), Format::Bitmap);
        assert_eq!(Format::from_path(Path::new("temp")).unwrap(), Format::Bitmap);
        assert_eq!(Format::from_path(Path::new("a.ppm")).unwrap(), Format::Pixmap);
        assert_eq!(Format::from_path(Path::new("a.png")).unwrap(), Format::Png);
        assert!(Format::from_path(Path::new("a.gif")).is_err());
    }

    #[test]
    fn writes_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = ImageBuffer::new(3, 2).unwrap();
        image.set(1, 1, Pixel::new(200, 100, 50));

        let bmp = dir.path().join("out.bmp");
        write_image(&bmp, &image).unwrap();
        assert_eq!(fs::metadata(&bmp).unwrap().len(), bitmap_size(3, 2));

        let ppm = dir.path().join("out.ppm");
        write_image(&ppm, &image).unwrap();
        let bytes = fs::read(&ppm).unwrap();
        assert_eq!(&bytes[0..2], b"P6");
        assert!(bytes.ends_with(&[0, 0, 0, 200, 100, 50, 0, 0, 0]));

        let png = dir.path().join("out.png");
        write_image(&png, &image).unwrap();
        assert_eq!(&fs::read(&png).unwrap()[1..4], b"PNG");
    }

    #[test]
    fn bitmap_headers_describe_the_image() {
        for &(w, h) in &[(5, 3), (4, 4), (7, 2), (1, 1)] {
            let bytes = bitmap_of(&ImageBuffer::new(w, h).unwrap());
            assert_eq!(&bytes[0..2], b"BM");
            assert_eq!(bytes.len() as u64, bitmap_size(w, h));
            assert_eq!(le32(&bytes, 2) as usize, bytes.len());
            assert_eq!(le32(&bytes, 10), 54);
            assert_eq!(le32(&bytes, 14), 40);
            assert_eq!(le32(&bytes, 18) as usize, w);
            assert_eq!(le32(&bytes, 22) as usize, h);
            assert_eq!(&bytes[26..28], &[1, 0]);
            assert_eq!(&bytes[28..30], &[24, 0]);
        }
    }

    #[test]
    fn bitmap_rows_are_bottom_up_and_bgr() {
        let mut image = ImageBuffer::new(2, 2).unwrap();
        image.set(0, 0, Pixel::new(1, 2, 3));
        image.set(1, 1, Pixel::new(4, 5, 6));
        let bytes = bitmap_of(&image);
        let data = &bytes[54..];
        // stored rows are 6 bytes of pixels plus 2 of padding
        assert_eq!(data.len(), 16);
        // first stored row is the bottom row of the buffer
        assert_eq!(&data[0..8], &[0, 0, 0, 6, 5, 4, 0, 0]);
        assert_eq!(&data[8..16], &[3, 2, 1, 0, 0, 0, 0, 0]);
    }
}
