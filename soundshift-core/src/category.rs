use std::fmt;

/// Conversion categories offered by the service.
///
/// `Unknown` is what a page without a recognized marker resolves to; it is
/// still submitted and the server decides whether to honor it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Phonk,
    Melody,
    Lofi,
    EightD,
    Unknown,
}

/// Categories a page can actually be themed as.
pub const CATEGORIES: &[Category] = &[
    Category::Phonk,
    Category::Melody,
    Category::Lofi,
    Category::EightD,
];

impl Category {
    /// Wire name used in the upload endpoint path.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Phonk => "phonk",
            Category::Melody => "melody",
            Category::Lofi => "lofi",
            Category::EightD => "8d",
            Category::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Option<Category> {
        CATEGORIES.iter().copied().find(|c| c.as_str() == name)
    }

    /// Resolve the category from the page body's class list.
    ///
    /// Each themed page carries exactly one marker class; anything else
    /// resolves to `Unknown`.
    pub fn from_marker_classes(classes: &str) -> Category {
        for class in classes.split_whitespace() {
            match class {
                "phonk-bg" => return Category::Phonk,
                "melody-bg" => return Category::Melody,
                "lofi-bg" => return Category::Lofi,
                "d8-bg" => return Category::EightD,
                _ => {}
            }
        }
        Category::Unknown
    }

    /// Human-facing name for headers and CLI output.
    pub fn title(self) -> &'static str {
        match self {
            Category::Phonk => "Phonk",
            Category::Melody => "Melody",
            Category::Lofi => "Lofi",
            Category::EightD => "8D",
            Category::Unknown => "Converter",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
