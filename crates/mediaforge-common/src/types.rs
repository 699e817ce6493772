//! Core enums for categorizing canonical items.
//!
//! Every upstream catalog maps its own entity kinds onto the fixed
//! [`ItemType`] enumeration. Item types are grouped into [`Category`]s, which
//! is the unit the provider registry resolves adapters by. All enums are
//! serialized in lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical media category served by one or more providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Recordings, releases, and artists.
    Music,
    /// Books, authors, and book series.
    Books,
    /// Movies, TV shows, and people.
    Films,
    /// Video games and their developers.
    Games,
}

impl Category {
    /// All categories in declaration order.
    pub const ALL: [Category; 4] = [Self::Music, Self::Books, Self::Films, Self::Games];

    /// Lowercase name used in config files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Music => "music",
            Self::Books => "books",
            Self::Films => "films",
            Self::Games => "games",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "music" => Ok(Self::Music),
            "books" => Ok(Self::Books),
            "films" | "movies" => Ok(Self::Films),
            "games" => Ok(Self::Games),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }
}

/// Kind of canonical item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// A single recording.
    Track,
    /// A release group (the album independent of its editions).
    Album,
    /// A musical artist or group.
    Artist,
    /// A book (work).
    Book,
    /// A book author.
    Author,
    /// A book series.
    Series,
    /// A feature film.
    Movie,
    /// A TV show.
    Show,
    /// A cast or crew member.
    Person,
    /// A video game.
    Game,
    /// A game developer studio.
    Developer,
}

impl ItemType {
    /// All item types in declaration order.
    pub const ALL: [ItemType; 11] = [
        Self::Track,
        Self::Album,
        Self::Artist,
        Self::Book,
        Self::Author,
        Self::Series,
        Self::Movie,
        Self::Show,
        Self::Person,
        Self::Game,
        Self::Developer,
    ];

    /// The category this item type belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::Track | Self::Album | Self::Artist => Category::Music,
            Self::Book | Self::Author | Self::Series => Category::Books,
            Self::Movie | Self::Show | Self::Person => Category::Films,
            Self::Game | Self::Developer => Category::Games,
        }
    }

    /// Whether this type names an artist/person-like entity rather than a work.
    pub fn is_person_like(&self) -> bool {
        matches!(
            self,
            Self::Artist | Self::Author | Self::Person | Self::Developer
        )
    }

    /// Lowercase name used in identifiers and serialized forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Book => "book",
            Self::Author => "author",
            Self::Series => "series",
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Person => "person",
            Self::Game => "game",
            Self::Developer => "developer",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Invalid item type: {}", s))
    }
}

/// Requested result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Upstream relevance ranking.
    #[default]
    Relevance,
    /// Title A to Z.
    TitleAsc,
    /// Title Z to A.
    TitleDesc,
    /// Oldest first.
    YearAsc,
    /// Newest first.
    YearDesc,
    /// Best rated first.
    RatingDesc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(Self::Relevance),
            "title_asc" => Ok(Self::TitleAsc),
            "title_desc" => Ok(Self::TitleDesc),
            "year_asc" => Ok(Self::YearAsc),
            "year_desc" => Ok(Self::YearDesc),
            "rating_desc" => Ok(Self::RatingDesc),
            _ => Err(format!("Invalid sort order: {}", s)),
        }
    }
}
