use crate::form::render::escape;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Flattens whatever shape a model returns into a list of image URLs.
///
/// Order matters: a bare string, then an array, then `{image}`, then `{images}`.
pub fn normalize_output(output: &Value) -> Vec<String> {
    match output {
        Value::String(url) => vec![url.clone()],
        Value::Array(items) => strings(items),
        Value::Object(map) => {
            if let Some(image) = map.get("image").filter(|v| !v.is_null()) {
                return match image {
                    Value::String(url) => vec![url.clone()],
                    other => normalize_output(other),
                };
            }
            match map.get("images") {
                Some(Value::Array(items)) => strings(items),
                Some(Value::String(url)) => vec![url.clone()],
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TileState {
    Pending,
    Loaded,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageTile {
    pub url: String,
    #[serde(flatten)]
    pub state: TileState,
}

/// The result area: one tile per URL, each failing on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Presentation {
    pub tiles: Vec<ImageTile>,
}

impl Presentation {
    pub fn from_output(output: Option<&Value>) -> Self {
        let urls = output.map(normalize_output).unwrap_or_default();
        Self {
            tiles: urls
                .into_iter()
                .map(|url| ImageTile {
                    url,
                    state: TileState::Pending,
                })
                .collect(),
        }
    }

    pub fn mark_loaded(&mut self, url: &str) {
        for tile in self.tiles.iter_mut().filter(|t| t.url == url) {
            tile.state = TileState::Loaded;
        }
    }

    pub fn mark_failed(&mut self, url: &str, reason: impl Into<String>) {
        let reason = reason.into();
        for tile in self.tiles.iter_mut().filter(|t| t.url == url) {
            tile.state = TileState::Failed {
                reason: reason.clone(),
            };
        }
    }

    /// Tiles that still show an image.
    pub fn rendered_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| !matches!(t.state, TileState::Failed { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered_count() == 0
    }

    /// Checks every URL independently; one dead link never hides the rest.
    pub async fn verify(&mut self, probe: &dyn ImageProbe) {
        for tile in &mut self.tiles {
            match probe.probe(&tile.url).await {
                Ok(()) => tile.state = TileState::Loaded,
                Err(reason) => {
                    warn!("Output image failed to load: {} ({})", tile.url, reason);
                    tile.state = TileState::Failed { reason };
                }
            }
        }
        debug!(
            "Verified {} output images, {} usable",
            self.tiles.len(),
            self.rendered_count()
        );
    }

    pub fn to_html(&self) -> String {
        if self.tiles.is_empty() {
            return "<div class=\"output-error\">No images found in output. Possible issues:<br>\
                    1. Content policy violation<br>\
                    2. Model-specific output format<br>\
                    3. Corrupted image generation</div>"
                .to_string();
        }

        let mut html = String::new();
        for tile in &self.tiles {
            let url = escape(&tile.url);
            match &tile.state {
                TileState::Failed { .. } => html.push_str(&format!(
                    "<div class=\"image-container\"><div class=\"image-error\">\
                     Failed to load image<br><a href=\"{url}\" target=\"_blank\">Direct link</a>\
                     </div></div>"
                )),
                _ => html.push_str(&format!(
                    "<div class=\"image-container\"><img class=\"output-image\" alt=\"Generated Image\" src=\"{url}\"></div>"
                )),
            }
        }
        html
    }
}

/// Decides whether an output URL is actually displayable.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> std::result::Result<(), String>;
}

pub struct HttpImageProbe {
    http: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpImageProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &str) -> std::result::Result<(), String> {
        if url.starts_with("data:image/") {
            return Ok(());
        }
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !content_type.is_empty() && !content_type.starts_with("image/") {
            return Err(format!("not an image ({})", content_type));
        }
        Ok(())
    }
}
