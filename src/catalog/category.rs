use std::fmt;

use serde::{Deserialize, Serialize};

/// Asset category, selected by an optional `"CATEGORY: "` prefix on the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Small icons (gems, pickups).
    Gem,
    Item,
    /// Inventory slot icons.
    Slot,
    /// Environment textures.
    World,
    /// Map tiles.
    Map,
    Default,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Gem,
        Category::Item,
        Category::Slot,
        Category::World,
        Category::Map,
        Category::Default,
    ];

    /// The prefix that selects this category, in its canonical upper case.
    pub fn prefix(self) -> &'static str {
        match self {
            Category::Gem => "GEM",
            Category::Item => "ITEM",
            Category::Slot => "SLOT",
            Category::World => "WORLD",
            Category::Map => "MAP",
            Category::Default => "DEFAULT",
        }
    }

    /// Case-insensitive lookup of a prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.prefix().eq_ignore_ascii_case(prefix))
    }

    /// Square render size requested from the engine before any pacing clamp.
    pub fn native_resolution(self) -> u32 {
        match self {
            Category::Gem => 256,
            Category::Item => 512,
            Category::Slot => 512,
            Category::World => 768,
            Category::Map => 1024,
            Category::Default => 512,
        }
    }

    /// Internal grid size used by the post-processor. Smaller means chunkier pixels.
    pub fn internal_resolution(self) -> u32 {
        match self {
            Category::Gem => 32,
            Category::Item => 48,
            Category::Slot => 64,
            Category::World => 128,
            Category::Map => 160,
            Category::Default => 48,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Split a raw line into its category and the prompt sent to the engine.
///
/// Only the text before the first `": "` is considered. An unknown prefix is
/// not consumed: the whole line becomes the prompt under [`Category::Default`].
pub fn parse_line(raw: &str) -> (Category, &str) {
    if let Some((head, rest)) = raw.split_once(": ")
        && let Some(category) = Category::from_prefix(head)
    {
        return (category, rest);
    }
    (Category::Default, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_prefix() {
        assert_eq!(parse_line("WORLD: neon forest"), (Category::World, "neon forest"));
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        assert_eq!(parse_line("gem: red ruby jewel"), (Category::Gem, "red ruby jewel"));
        assert_eq!(parse_line("Map: harbor"), (Category::Map, "harbor"));
    }

    #[test]
    fn line_without_delimiter_is_default() {
        assert_eq!(parse_line("neon forest"), (Category::Default, "neon forest"));
    }

    #[test]
    fn colon_without_space_is_not_a_delimiter() {
        assert_eq!(parse_line("GEM:ruby"), (Category::Default, "GEM:ruby"));
    }

    #[test]
    fn unknown_prefix_is_kept_in_prompt() {
        assert_eq!(
            parse_line("SHIELD: oak buckler"),
            (Category::Default, "SHIELD: oak buckler")
        );
    }

    #[test]
    fn only_first_delimiter_splits() {
        assert_eq!(
            parse_line("ITEM: note: do not eat"),
            (Category::Item, "note: do not eat")
        );
    }

    #[test]
    fn prose_starting_with_category_word_is_greedy() {
        assert_eq!(parse_line("MAP: of the old kingdom"), (Category::Map, "of the old kingdom"));
    }

    #[test]
    fn size_tables() {
        assert_eq!(Category::Gem.native_resolution(), 256);
        assert_eq!(Category::World.native_resolution(), 768);
        assert_eq!(Category::Map.native_resolution(), 1024);
        assert_eq!(Category::Gem.internal_resolution(), 32);
        assert_eq!(Category::Map.internal_resolution(), 160);
    }
}
