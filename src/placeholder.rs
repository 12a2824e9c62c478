//! Placeholder URLs for renditions of an unset source.

use crate::keys::SizeKey;

/// Produces a stand-in image URL for a target size.
pub trait PlaceholderService: Send + Sync {
    fn url(&self, size: SizeKey) -> String;
}

/// URL template with `{width}` and `{height}` markers,
/// e.g. `http://placehold.it/{width}x{height}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePlaceholder {
    template: String,
}

impl TemplatePlaceholder {
    pub const DEFAULT_TEMPLATE: &'static str = "http://placehold.it/{width}x{height}";

    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Default for TemplatePlaceholder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TEMPLATE)
    }
}

impl PlaceholderService for TemplatePlaceholder {
    fn url(&self, size: SizeKey) -> String {
        self.template
            .replace("{width}", &size.width.to_string())
            .replace("{height}", &size.height.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_template() {
        let size = SizeKey {
            width: 400,
            height: 300,
        };
        assert_eq!(
            TemplatePlaceholder::default().url(size),
            "http://placehold.it/400x300"
        );
        assert_eq!(
            TemplatePlaceholder::new("/static/ph-{width}-{height}.png?w={width}").url(size),
            "/static/ph-400-300.png?w=400"
        );
    }
}
