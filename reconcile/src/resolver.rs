//! User identifier resolution.
//!
//! The provider places the subject's id in different spots depending on the
//! event, so resolution is an ordered list of [`ExtractionRule`]s applied to a
//! [`FieldView`]. The first rule yielding a non-empty string wins. A value of
//! the wrong type counts as absent, never as an error.

use kyc_types::WebhookData;

/// Map-like read access with type-checked string lookup.
pub trait FieldView {
    /// String at `key` directly (`section = None`) or inside the nested
    /// object `section`. Non-strings and missing entries read as `None`.
    fn get_str(&self, section: Option<&str>, key: &str) -> Option<&str>;
}

impl FieldView for WebhookData {
    fn get_str(&self, section: Option<&str>, key: &str) -> Option<&str> {
        WebhookData::get_str(self, section, key)
    }
}

/// One candidate location for the user id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractionRule {
    pub section: Option<&'static str>,
    pub key: &'static str,
}

impl ExtractionRule {
    pub const fn direct(key: &'static str) -> Self {
        Self { section: None, key }
    }

    pub const fn nested(section: &'static str, key: &'static str) -> Self {
        Self {
            section: Some(section),
            key,
        }
    }

    pub fn apply<'a, V: FieldView + ?Sized>(&self, view: &'a V) -> Option<&'a str> {
        view.get_str(self.section, self.key)
            .filter(|value| !value.is_empty())
    }
}

/// Priority order for user id lookup.
pub const USER_ID_RULES: [ExtractionRule; 5] = [
    ExtractionRule::direct("user_id"),
    ExtractionRule::nested("metadata", "user_id"),
    ExtractionRule::nested("metadata", "internal_user_id"),
    ExtractionRule::nested("user_data", "user_id"),
    ExtractionRule::nested("user_data", "id"),
];

/// Resolve the subject user id, or `None` when no rule matches.
pub fn resolve_user_id<V: FieldView + ?Sized>(view: &V) -> Option<String> {
    USER_ID_RULES
        .iter()
        .find_map(|rule| rule.apply(view))
        .map(str::to_string)
}
