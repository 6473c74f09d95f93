use crate::config::{DelayRange, TargetConfig};
use crate::extractor::Extractor;
use crate::fetcher::{self, PageSource};
use crate::filter;
use crate::models::{CheckError, FetchOutcome, Query, RoomOutcome, RoomType, RunReport};
use chrono::Local;

/// Runs fetch -> extract -> filter for every room type, one at a time
pub struct Checker {
    source: Box<dyn PageSource>,
    extractor: Extractor,
    target: TargetConfig,
    room_delay: Option<DelayRange>,
}

impl Checker {
    pub fn new(source: Box<dyn PageSource>, extractor: Extractor, target: TargetConfig) -> Self {
        Self {
            source,
            extractor,
            target,
            room_delay: None,
        }
    }

    /// Pause between consecutive room types
    pub fn with_room_delay(mut self, room_delay: Option<DelayRange>) -> Self {
        self.room_delay = room_delay;
        self
    }

    pub async fn run(&self) -> RunReport {
        let started_at = Local::now();
        let mut outcomes = Vec::with_capacity(RoomType::ALL.len());

        for (index, room) in RoomType::ALL.into_iter().enumerate() {
            if index > 0 {
                if let Some(delay) = self.room_delay {
                    fetcher::sleep_within(delay).await;
                }
            }

            outcomes.push(self.check_room(room).await);
        }

        RunReport {
            started_at,
            location: self.target.location.clone(),
            outcomes,
        }
    }

    /// Every fault ends up in the outcome so one room type never aborts the others
    pub async fn check_room(&self, room: RoomType) -> RoomOutcome {
        let query = self.target.query(room);
        tracing::info!("Checking {} listings in {} via {}", room, query.location, self.source.name());

        let error = match self.source.fetch(&query).await {
            FetchOutcome::Success(html) => return self.process_page(room, &query, &html),
            FetchOutcome::HttpError(status) => CheckError::Http(status),
            FetchOutcome::Blocked => CheckError::Blocked,
            FetchOutcome::TransportError(message) => CheckError::Transport(message),
        };

        tracing::warn!("{}: fetch failed: {}", room, error);
        RoomOutcome::Failed { room, error }
    }

    fn process_page(&self, room: RoomType, query: &Query, html: &str) -> RoomOutcome {
        match self.extractor.extract(html) {
            Ok(listings) => RoomOutcome::Filtered(filter::apply(listings, query)),
            Err(error) => {
                tracing::warn!("{}: {}", room, error);
                RoomOutcome::Failed { room, error }
            }
        }
    }
}
