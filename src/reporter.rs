use crate::models::{display_location, CheckError, RoomOutcome, RunReport};

const RULE_WIDTH: usize = 50;

/// Human-readable block for one room type: a header line, then either the
/// matching listings or a single line saying why there are none.
pub fn render_section(outcome: &RoomOutcome, location_slug: &str) -> String {
    let room = outcome.room();
    let location = display_location(location_slug);
    let mut section = format!("🏠 {} Listings in {}:\n", room, location);

    match outcome {
        RoomOutcome::Filtered(result) if !result.matches.is_empty() => {
            section.push_str(&format!("✅ {} listing(s) found!\n\n", result.matches.len()));
            for listing in &result.matches {
                section.push_str(&format!("• {}\n", listing.format_line()));
            }
        }
        RoomOutcome::Filtered(_) => {
            section.push_str(&format!("❌ No {} listings available in {}", room, location));
        }
        RoomOutcome::Failed { error, .. } => {
            let line = match error {
                CheckError::Http(status) => {
                    format!("❌ Failed to fetch listings for {} (Status: {})", room, status)
                }
                CheckError::Blocked => {
                    format!("🚫 Blocked by anti-bot protection while fetching {} listings", room)
                }
                CheckError::Transport(message) => {
                    format!("❌ Error checking {} listings: {}", room, message)
                }
                CheckError::ContainerNotFound => format!(
                    "⚠️ Could not find listings container for {}. The page structure may have changed.",
                    room
                ),
                CheckError::NoListings { .. } => {
                    format!("❌ No {} listings found in {}", room, location)
                }
                CheckError::EmptyContainer => format!(
                    "⚠️ Listings container for {} is empty. The page structure may have changed.",
                    room
                ),
            };
            section.push_str(&line);
        }
    }

    section.trim_end().to_string()
}

/// Console rendering: start line, then every section followed by a rule
pub fn render(report: &RunReport) -> String {
    let mut output = format!(
        "🔍 Checking apartment availability at {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );

    for outcome in &report.outcomes {
        output.push('\n');
        output.push_str(&render_section(outcome, &report.location));
        output.push('\n');
        output.push_str(&"-".repeat(RULE_WIDTH));
        output.push('\n');
    }

    output
}

pub fn email_subject(report: &RunReport) -> String {
    format!(
        "🏠 Apartment Availability - {} - {}",
        display_location(&report.location),
        report.started_at.format("%Y-%m-%d")
    )
}

pub fn email_body(report: &RunReport) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let sections: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| render_section(outcome, &report.location))
        .collect();

    format!(
        "Apartment Availability Check - {date}\n\n\
         Location: {location}\n\
         Check Time: {time}\n\n\
         {rule}\n\n\
         {sections}\n\n\
         {rule}\n\
         This is an automated check from aptwatch.\n",
        date = report.started_at.format("%Y-%m-%d"),
        location = display_location(&report.location),
        time = report.started_at.format("%Y-%m-%d %H:%M:%S"),
        rule = rule,
        sections = sections.join("\n\n"),
    )
}
