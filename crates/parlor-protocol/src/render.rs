//! Fragment rendering.
//!
//! The server never builds markup itself: it names a fragment
//! (`"board"`, `"players"`, `"error"`, …), collects [`Data`], and asks a
//! [`Renderer`] for bytes. Templating engines plug in here.

use serde::Serialize;

use crate::{Codec, Data, JsonCodec, RenderError};

/// Turns a named fragment plus data into the bytes pushed to a client.
///
/// An empty result means "nothing to send to this participant" and is
/// not an error.
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, name: &str, data: &Data) -> Result<Vec<u8>, RenderError>;
}

/// Renders every fragment as `{"fragment": name, "data": {...}}`.
///
/// Useful for JSON-speaking clients and for tests, where asserting on
/// structured output beats matching markup.
#[derive(Debug, Clone, Default)]
pub struct JsonRenderer<C = JsonCodec> {
    codec: C,
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Codec> JsonRenderer<C> {
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }
}

#[derive(Serialize)]
struct Fragment<'a> {
    fragment: &'a str,
    data: &'a Data,
}

impl<C: Codec> Renderer for JsonRenderer<C> {
    fn render(&self, name: &str, data: &Data) -> Result<Vec<u8>, RenderError> {
        Ok(self.codec.encode(&Fragment { fragment: name, data })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_renderer_wraps_name_and_data() {
        let bytes = JsonRenderer::new()
            .render("info", &Data::new().with("info", "hello"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["fragment"], "info");
        assert_eq!(value["data"]["info"], "hello");
    }
}
