use serde::Deserialize;

/// A notification observed on the device, reduced to the fields the pipeline reads.
///
/// Any platform listener can produce this shape; the CLI reads it as one JSON
/// object per line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEvent {
    pub package_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub big_text: Option<String>,
}

impl NotificationEvent {
    pub fn new(package_name: &str, text: &str) -> Self {
        Self {
            package_name: package_name.to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Title, short text and expanded text joined with single spaces.
    ///
    /// Fields that are absent or blank are left out, so a ride amount may sit in
    /// any of them and still be found by the extractor.
    pub fn combined_text(&self) -> String {
        [&self.title, &self.text, &self.big_text]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
