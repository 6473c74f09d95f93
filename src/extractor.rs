use crate::config::{EmptyContainerPolicy, ExtractionConfig};
use crate::models::{CheckError, ExtractedListing, NOT_AVAILABLE};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};

/// One labelled line of a listing card, e.g. label "Price 50,000 /Year" with value "50,000 /Year"
#[derive(Debug, Clone, PartialEq)]
pub struct DetailField {
    /// Full text of the label element, nested value included
    pub label: String,
    /// Text of the first nested value element, if any
    pub value: Option<String>,
}

/// Decides which detail line of a card holds the free-text location
pub trait LocationRule: Send + Sync {
    fn name(&self) -> &str;

    fn locate(&self, details: &[DetailField]) -> Option<String>;
}

/// The location is the first detail line whose label carries none of the
/// known field labels. Cards without such a line get no location.
pub struct UnlabeledDetailRule {
    known_labels: Vec<String>,
}

impl UnlabeledDetailRule {
    pub fn new(known_labels: Vec<String>) -> Self {
        Self { known_labels }
    }
}

impl LocationRule for UnlabeledDetailRule {
    fn name(&self) -> &str {
        "unlabeled-detail"
    }

    fn locate(&self, details: &[DetailField]) -> Option<String> {
        details
            .iter()
            .find(|detail| {
                !detail.label.is_empty()
                    && !self.known_labels.iter().any(|known| detail.label.contains(known.as_str()))
            })
            .map(|detail| detail.label.clone())
    }
}

/// Reads listing cards out of a search results page
pub struct Extractor {
    container_selectors: Vec<(String, Selector)>,
    card: Selector,
    no_results: Selector,
    title: Selector,
    detail: Selector,
    label: Selector,
    value: Selector,
    price_keyword: String,
    unit_keyword: String,
    room_type_keyword: String,
    location_rule: Box<dyn LocationRule>,
    empty_container: EmptyContainerPolicy,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let container_selectors = config
            .container_selectors
            .iter()
            .map(|sel_str| Ok((sel_str.clone(), parse_selector(sel_str)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            container_selectors,
            card: parse_selector(&config.card_selector)?,
            no_results: parse_selector(&config.no_results_selector)?,
            title: parse_selector(&config.title_selector)?,
            detail: parse_selector(&config.detail_selector)?,
            label: parse_selector(&config.label_selector)?,
            value: parse_selector(&config.value_selector)?,
            price_keyword: config.price_keyword.clone(),
            unit_keyword: config.unit_keyword.clone(),
            room_type_keyword: config.room_type_keyword.clone(),
            location_rule: Box::new(UnlabeledDetailRule::new(config.known_labels.clone())),
            empty_container: config.empty_container,
        })
    }

    #[allow(dead_code)]
    pub fn with_location_rule(mut self, rule: Box<dyn LocationRule>) -> Self {
        tracing::debug!("Location rule '{}' replaced by '{}'", self.location_rule.name(), rule.name());
        self.location_rule = rule;
        self
    }

    /// Extracts every listing card of the page, in page order.
    ///
    /// Errors distinguish a missing container (page layout changed) from a
    /// container without cards.
    pub fn extract(&self, html: &str) -> Result<Vec<ExtractedListing>, CheckError> {
        let document = Html::parse_document(html);

        let container = self
            .container_selectors
            .iter()
            .find_map(|(sel_str, selector)| {
                let found = document.select(selector).next();
                match found {
                    Some(_) => tracing::debug!("Found listings container with selector: {}", sel_str),
                    None => tracing::trace!("Selector '{}' found 0 elements", sel_str),
                }
                found
            })
            .ok_or(CheckError::ContainerNotFound)?;

        if container.select(&self.no_results).next().is_some() {
            tracing::debug!("Page carries an explicit 'no results' marker");
            return Err(CheckError::NoListings { explicit_marker: true });
        }

        let listings: Vec<ExtractedListing> = container
            .select(&self.card)
            .enumerate()
            .map(|(index, card)| {
                let listing = self.extract_card(&card);
                tracing::trace!("Card #{}: {:?}", index + 1, listing);
                listing
            })
            .collect();

        if listings.is_empty() {
            return Err(match self.empty_container {
                EmptyContainerPolicy::NoListings => CheckError::NoListings { explicit_marker: false },
                EmptyContainerPolicy::StructureWarning => CheckError::EmptyContainer,
            });
        }

        tracing::debug!("Extracted {} cards", listings.len());
        Ok(listings)
    }

    fn extract_card(&self, card: &ElementRef) -> ExtractedListing {
        let title = card
            .select(&self.title)
            .next()
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty());

        let details = self.read_details(card);

        let price = labelled_value(&details, &self.price_keyword).map(|raw| normalize_price(&raw));
        let unit_number = labelled_value(&details, &self.unit_keyword);
        let room_type = labelled_value(&details, &self.room_type_keyword);
        let location = self.location_rule.locate(&details);

        ExtractedListing {
            title: or_not_available(title),
            unit_number: or_not_available(unit_number),
            price_text: or_not_available(price),
            location_text: or_not_available(location),
            room_type_text: or_not_available(room_type),
        }
    }

    fn read_details(&self, card: &ElementRef) -> Vec<DetailField> {
        card.select(&self.detail)
            .filter_map(|detail| detail.select(&self.label).next())
            .map(|label| DetailField {
                label: element_text(&label),
                value: label
                    .select(&self.value)
                    .next()
                    .map(|value| element_text(&value))
                    .filter(|text| !text.is_empty()),
            })
            .collect()
    }
}

fn labelled_value(details: &[DetailField], keyword: &str) -> Option<String> {
    details
        .iter()
        .find(|detail| detail.label.contains(keyword))
        .and_then(|detail| detail.value.clone())
}

fn or_not_available(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Strips newlines, slashes and the word "Year" from a price ("5,000\n/Year" -> "5,000")
pub fn normalize_price(raw: &str) -> String {
    raw.replace(['\n', '\r', '/'], "")
        .replace("Year", "")
        .trim()
        .to_string()
}

/// Trimmed text nodes of an element joined by single spaces
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|e| anyhow!("Invalid CSS selector '{}': {}", sel_str, e))
}
