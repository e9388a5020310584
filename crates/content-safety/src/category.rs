use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A harm category the moderator grades.
///
/// The declaration order is the order reasons are reported in.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Category {
    /// Hateful or discriminatory content.
    Hate,
    /// Sexual content.
    Sexual,
    /// Content about hurting oneself.
    SelfHarm,
    /// Violent content.
    Violence,
}

impl Category {
    /// Every category, in reporting order.
    pub const ALL: [Category; 4] = [
        Category::Hate,
        Category::Sexual,
        Category::SelfHarm,
        Category::Violence,
    ];

    /// Returns the name used on the wire.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Category::Hate => "Hate",
            Category::Sexual => "Sexual",
            Category::SelfHarm => "SelfHarm",
            Category::Violence => "Violence",
        }
    }

    /// Parses a wire name.
    #[inline]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Returns the lower-cased name reported when this category blocks a
    /// message.
    #[inline]
    pub fn reason(self) -> &'static str {
        match self {
            Category::Hate => "hate",
            Category::Sexual => "sexual",
            Category::SelfHarm => "selfharm",
            Category::Violence => "violence",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordinal severity level. `0` means the category does not apply.
pub type Severity = u32;

/// Severity per category, as graded by the moderator.
pub type Severities = BTreeMap<Category, Severity>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        for category in Category::ALL {
            assert_eq!(Category::from_name(category.name()), Some(category));
            assert_eq!(category.reason(), category.name().to_lowercase());
        }
        assert_eq!(Category::from_name("selfharm"), None);
    }

    #[test]
    fn test_order() {
        let mut sorted = Category::ALL;
        sorted.sort();
        assert_eq!(sorted, Category::ALL);
    }
}
