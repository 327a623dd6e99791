use serde::{Deserialize, Serialize};

/// Store-front details for a product, as reported by the billing gateway.
///
/// Values are localised by the store; they are display strings, not data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub title: String,
    pub description: String,
    pub price: String,
}

impl ProductMetadata {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            price: price.into(),
        }
    }

    /// Three-line label shown next to the purchase buttons.
    pub fn detail_text(&self) -> String {
        format!("{}\n{}\n{}\n", self.title, self.description, self.price)
    }
}
