use crate::models::{location_phrase, ExtractedListing, FilteredResult, Query, RoomType, NOT_AVAILABLE};

/// Lenient location match: either text contains the other, ignoring case.
/// `target_slug` is the search slug ("muhaisnah-fourth"); hyphens become spaces.
pub fn location_matches(location_text: &str, target_slug: &str) -> bool {
    let card = location_text.trim().to_lowercase();
    if card.is_empty() || card == NOT_AVAILABLE.to_lowercase() {
        return false;
    }

    let target = location_phrase(target_slug).trim().to_lowercase();
    card.contains(&target) || target.contains(&card)
}

/// Whether the card's "Type:" text describes the requested room type
pub fn room_type_matches(room_type_text: &str, room: RoomType) -> bool {
    let text = room_type_text.to_lowercase();
    room.type_keywords().iter().any(|keyword| text.contains(keyword))
}

pub fn matches(listing: &ExtractedListing, query: &Query) -> bool {
    location_matches(&listing.location_text, &query.location)
        && room_type_matches(&listing.room_type_text, query.room)
}

/// Keeps the listings that match the query, in their original order
pub fn apply(listings: Vec<ExtractedListing>, query: &Query) -> FilteredResult {
    let total = listings.len();

    let kept: Vec<ExtractedListing> = listings
        .into_iter()
        .filter(|listing| {
            let keep = matches(listing, query);
            if !keep {
                tracing::debug!(
                    "Skipping '{}' - location '{}', type '{}'",
                    listing.title, listing.location_text, listing.room_type_text
                );
            }
            keep
        })
        .collect();

    tracing::info!("{}: kept {} of {} cards", query.room, kept.len(), total);

    FilteredResult { room: query.room, matches: kept }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;

    fn listing(title: &str, location: &str, room_type: &str) -> ExtractedListing {
        ExtractedListing {
            title: title.to_string(),
            unit_number: "1".to_string(),
            price_text: "50,000".to_string(),
            location_text: location.to_string(),
            room_type_text: room_type.to_string(),
        }
    }

    #[test]
    fn test_location_superset_matches() {
        assert!(location_matches("Muhaisnah Fourth, Dubai", "muhaisnah-fourth"));
    }

    #[test]
    fn test_location_subset_matches() {
        assert!(location_matches("Muhaisnah", "muhaisnah-fourth"));
    }

    #[test]
    fn test_location_other_area_fails() {
        assert!(!location_matches("Deira", "muhaisnah-fourth"));
    }

    #[test]
    fn test_location_missing_never_matches() {
        assert!(!location_matches(NOT_AVAILABLE, "muhaisnah-fourth"));
        assert!(!location_matches("   ", "muhaisnah-fourth"));
    }

    #[test]
    fn test_one_bedroom_accepts_studio() {
        assert!(room_type_matches("Studio", RoomType::OneBedroom));
        assert!(room_type_matches("1 Bedroom Apartment", RoomType::OneBedroom));
        assert!(!room_type_matches("2 Bedroom", RoomType::OneBedroom));
    }

    #[test]
    fn test_two_and_three_bedroom_accept_room_wording() {
        assert!(room_type_matches("2 Room Flat", RoomType::TwoBedroom));
        assert!(room_type_matches("2 BEDROOM", RoomType::TwoBedroom));
        assert!(!room_type_matches("Studio", RoomType::TwoBedroom));
        assert!(room_type_matches("3 Bedroom Villa", RoomType::ThreeBedroom));
        assert!(room_type_matches("3 rooms", RoomType::ThreeBedroom));
        assert!(!room_type_matches(NOT_AVAILABLE, RoomType::ThreeBedroom));
    }

    #[test]
    fn test_apply_preserves_order_and_drops_mismatches() {
        let query = TargetConfig::default().query(RoomType::OneBedroom);
        let result = apply(
            vec![
                listing("A", "Muhaisnah Fourth", "1 Bedroom"),
                listing("B", "Deira", "1 Bedroom"),
                listing("C", "Muhaisnah Fourth", "2 Bedroom"),
                listing("D", "Muhaisnah Fourth, Dubai", "Studio"),
            ],
            &query,
        );

        assert_eq!(result.room, RoomType::OneBedroom);
        let titles: Vec<&str> = result.matches.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "D"]);
    }

    #[test]
    fn test_apply_can_filter_to_empty() {
        let query = TargetConfig::default().query(RoomType::TwoBedroom);
        let result = apply(vec![listing("B", "Deira", "2 Bedroom")], &query);

        assert!(result.matches.is_empty());
    }
}
