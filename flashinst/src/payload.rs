//! The bytes installed at startup.

use std::borrow::Cow;

/// Where the arcade firmware expects its game script.
pub const DEFAULT_TARGET: &str = "/game.js";

/// Game script bundled at build time.
pub const GAME_JS: &[u8] = include_bytes!("../assets/game.js");

/// A file to install: target path plus opaque contents copied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload<'a> {
    path: Cow<'a, str>,
    contents: Cow<'a, [u8]>,
}

impl<'a> Payload<'a> {
    /// Creates a payload for `path` holding `contents`.
    pub fn new(path: impl Into<Cow<'a, str>>, contents: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Target path on the volume.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Bytes to write.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether the payload writes an empty file.
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

impl Payload<'static> {
    /// The bundled game script at [`DEFAULT_TARGET`].
    pub fn game_js() -> Self {
        Self::new(DEFAULT_TARGET, GAME_JS)
    }
}

impl Default for Payload<'static> {
    fn default() -> Self {
        Self::game_js()
    }
}
