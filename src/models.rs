use chrono::{DateTime, Local};
use thiserror::Error;

/// Placeholder for card fields the page did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Bedroom filter understood by the search endpoint (`room=<code>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomType {
    OneBedroom,
    TwoBedroom,
    ThreeBedroom,
}

impl RoomType {
    /// Every room type, in the order a run visits them
    pub const ALL: [RoomType; 3] = [RoomType::OneBedroom, RoomType::TwoBedroom, RoomType::ThreeBedroom];

    pub fn code(self) -> u8 {
        match self {
            RoomType::OneBedroom => 1,
            RoomType::TwoBedroom => 2,
            RoomType::ThreeBedroom => 3,
        }
    }

    #[allow(dead_code)]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|room| room.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            RoomType::OneBedroom => "1-Bedroom",
            RoomType::TwoBedroom => "2-Bedroom",
            RoomType::ThreeBedroom => "3-Bedroom",
        }
    }

    /// Lowercase phrases that identify this room type in a card's "Type:" field.
    /// Studios are listed under the 1-bedroom filter.
    pub fn type_keywords(self) -> &'static [&'static str] {
        match self {
            RoomType::OneBedroom => &["1 bedroom", "studio"],
            RoomType::TwoBedroom => &["2 bedroom", "2 room"],
            RoomType::ThreeBedroom => &["3 bedroom", "3 room"],
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One search request: a room type against the configured target
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub room: RoomType,
    pub location: String,
    pub sort_field: String,
    pub sort_order: String,
    pub view: String,
}

impl Query {
    /// Appends the search parameters to `base_url`, keeping any query it already has
    pub fn search_url(&self, base_url: &str) -> anyhow::Result<reqwest::Url> {
        let room = self.room.code().to_string();
        let url = reqwest::Url::parse_with_params(
            base_url,
            &[
                ("sortfield", self.sort_field.as_str()),
                ("order", self.sort_order.as_str()),
                ("location", self.location.as_str()),
                ("room", room.as_str()),
                ("view", self.view.as_str()),
            ],
        )?;
        Ok(url)
    }
}

/// Result of fetching one search page
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(String),
    HttpError(u16),
    Blocked,
    TransportError(String),
}

/// Fields read from a single listing card. Missing fields hold [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedListing {
    pub title: String,
    pub unit_number: String,
    pub price_text: String,
    pub location_text: String,
    pub room_type_text: String,
}

impl ExtractedListing {
    pub fn format_line(&self) -> String {
        format!(
            "{} (Unit {}): {} AED/Year - {}",
            self.title, self.unit_number, self.price_text, self.location_text
        )
    }
}

/// Listings that survived filtering for one room type. An empty list is a
/// valid result: the page had cards, none of them matched.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredResult {
    pub room: RoomType,
    pub matches: Vec<ExtractedListing>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("blocked by anti-bot protection")]
    Blocked,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("listings container not found")]
    ContainerNotFound,
    #[error("no listings on the results page")]
    NoListings { explicit_marker: bool },
    #[error("listings container is present but empty")]
    EmptyContainer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutcome {
    Filtered(FilteredResult),
    Failed { room: RoomType, error: CheckError },
}

impl RoomOutcome {
    pub fn room(&self) -> RoomType {
        match self {
            RoomOutcome::Filtered(result) => result.room,
            RoomOutcome::Failed { room, .. } => *room,
        }
    }
}

/// Everything one run produced, in room-code order
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub location: String,
    pub outcomes: Vec<RoomOutcome>,
}

impl RunReport {
    pub fn total_matches(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                RoomOutcome::Filtered(result) => result.matches.len(),
                RoomOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Turn a location slug into the words used for matching ("muhaisnah-fourth" -> "muhaisnah fourth")
pub fn location_phrase(slug: &str) -> String {
    slug.replace('-', " ")
}

/// Title-cased location for display ("muhaisnah-fourth" -> "Muhaisnah Fourth")
pub fn display_location(slug: &str) -> String {
    location_phrase(slug)
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
