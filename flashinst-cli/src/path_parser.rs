//! `image:path` arguments
//!
//! Commands that look inside a flash image take the image and the path on
//! the volume as one argument:
//!
//! - `flash.bin:game.js` - file `game.js` on the volume in `flash.bin`
//! - `flash.bin` - the image itself (its root directory where one is needed)
//!
//! This is the `host:path` syntax used by tools like scp and rsync.

use std::path::{Path, PathBuf};

use anyhow::Result;

/// A parsed path specification: either a path inside an image or a plain
/// host path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSpec {
    /// Path within a flash image (e.g., "flash.bin:game.js")
    ImagePath { image: PathBuf, path: String },
    /// Path on the host filesystem (e.g., "./flash.bin")
    HostPath(PathBuf),
}

impl PathSpec {
    /// Parse a path specification string into a `PathSpec`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flashinst_cli::path_parser::PathSpec;
    ///
    /// let spec = PathSpec::parse("flash.bin:game.js").unwrap();
    /// assert_eq!(spec.inner_path(), Some("game.js"));
    ///
    /// let spec = PathSpec::parse("./flash.bin").unwrap();
    /// assert!(spec.is_host_path());
    /// ```
    pub fn parse(spec: &str) -> Result<Self> {
        let Some((img, path)) = spec.split_once(':') else {
            return Ok(PathSpec::HostPath(PathBuf::from(spec)));
        };

        // "C:\flash.bin" is a Windows drive, not image notation
        if cfg!(windows) && is_drive_letter(img) {
            return Ok(PathSpec::HostPath(PathBuf::from(spec)));
        }

        if img.is_empty() {
            anyhow::bail!("Missing image name in '{}'", spec);
        }

        Ok(PathSpec::ImagePath {
            image: PathBuf::from(img),
            path: path.to_string(),
        })
    }

    /// Parse `image[:path]`, using `default_path` when no path is given.
    ///
    /// ```
    /// use std::path::Path;
    /// use flashinst_cli::path_parser::PathSpec;
    ///
    /// let spec = PathSpec::parse_image("flash.bin", "/").unwrap();
    /// assert_eq!(spec.image_path(), Some(Path::new("flash.bin")));
    /// assert_eq!(spec.inner_path(), Some("/"));
    /// ```
    pub fn parse_image(spec: &str, default_path: &str) -> Result<Self> {
        match Self::parse(spec)? {
            PathSpec::HostPath(image) => Ok(PathSpec::ImagePath {
                image,
                path: default_path.to_string(),
            }),
            image_path => Ok(image_path),
        }
    }

    /// Get the image path if this is an `ImagePath`
    pub fn image_path(&self) -> Option<&Path> {
        match self {
            PathSpec::ImagePath { image, .. } => Some(image),
            PathSpec::HostPath(_) => None,
        }
    }

    /// Get the path within the image if this is an `ImagePath`
    pub fn inner_path(&self) -> Option<&str> {
        match self {
            PathSpec::ImagePath { path, .. } => Some(path),
            PathSpec::HostPath(_) => None,
        }
    }

    /// Splits an `ImagePath` into image and inner path, failing for host paths.
    pub fn into_image_path(self) -> Result<(PathBuf, String)> {
        match self {
            PathSpec::ImagePath { image, path } => Ok((image, path)),
            PathSpec::HostPath(p) => anyhow::bail!(
                "'{}' is not an image path. Use 'image.bin:path/in/volume' notation.",
                p.display()
            ),
        }
    }

    /// Whether the argument named a host file only.
    pub fn is_host_path(&self) -> bool {
        matches!(self, PathSpec::HostPath(_))
    }
}

fn is_drive_letter(s: &str) -> bool {
    let mut chars = s.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_notation() {
        let spec = PathSpec::parse("flash.bin:game.js").unwrap();
        match spec {
            PathSpec::ImagePath { image, path } => {
                assert_eq!(image, PathBuf::from("flash.bin"));
                assert_eq!(path, "game.js");
            }
            other => panic!("not an image path: {:?}", other),
        }
    }

    #[test]
    fn test_nested_volume_path() {
        let spec = PathSpec::parse("flash.bin:/www/js/game.js").unwrap();
        assert_eq!(spec.inner_path(), Some("/www/js/game.js"));
    }

    #[test]
    fn test_plain_host_path() {
        let spec = PathSpec::parse("./flash.bin").unwrap();
        assert!(spec.is_host_path());
        assert!(spec.into_image_path().is_err());
    }

    #[test]
    fn test_parse_missing_image() {
        assert!(PathSpec::parse(":game.js").is_err());
    }

    #[test]
    fn test_parse_image_default_path() {
        let (image, path) = PathSpec::parse_image("flash.bin", "/")
            .unwrap()
            .into_image_path()
            .unwrap();
        assert_eq!(image, PathBuf::from("flash.bin"));
        assert_eq!(path, "/");

        let (_, path) = PathSpec::parse_image("flash.bin:www", "/")
            .unwrap()
            .into_image_path()
            .unwrap();
        assert_eq!(path, "www");
    }

    #[test]
    fn test_drive_letter() {
        assert!(is_drive_letter("C"));
        assert!(!is_drive_letter("flash.bin"));
        assert!(!is_drive_letter(""));
    }
}
