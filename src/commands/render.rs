//! Terminal rendering of turns, citations and usage badges

use crate::persistence::{Role, UsageRecord};
use crate::quota::QuotaPolicy;
use crate::sources::{Citation, CitationKind};
use crate::transcript::{Transcript, Turn};
use colored::Colorize;

/// First eight characters of an id, as shown in tables
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// One citation line
///
/// Video citations also show the primary thumbnail URL.
pub fn format_citation(index: usize, citation: &Citation) -> String {
    match (citation.kind, citation.video_ref()) {
        (CitationKind::Video, Some(video)) => format!(
            "  [{}] {} {}\n      {}\n      thumbnail: {}",
            index,
            "video".magenta(),
            citation.title.bold(),
            citation.url.underline(),
            video.thumbnails.primary
        ),
        _ => format!(
            "  [{}] {} {}\n      {}",
            index,
            "web".blue(),
            citation.title.bold(),
            citation.url.underline()
        ),
    }
}

/// Badge describing the remaining free-tier messages
pub fn usage_badge(record: &UsageRecord, policy: QuotaPolicy) -> String {
    if record.is_premium {
        return match record.premium_expires_at {
            Some(expires) => format!("Premium until {}", expires.format("%Y-%m-%d")),
            None => "Premium".to_string(),
        };
    }
    let remaining = (policy.limit - record.messages_used).max(0);
    if policy.enforce {
        format!("{} of {} free messages left", remaining, policy.limit)
    } else {
        format!("{} messages used", record.messages_used)
    }
}

/// Print one turn with its sources
pub fn print_turn(turn: &Turn) {
    if turn.is_pending() {
        println!("{}", turn.content().dimmed().italic());
        return;
    }

    let speaker = match turn.role() {
        Role::User => "You".green().bold(),
        Role::Assistant => "Genie".cyan().bold(),
    };
    println!("{}: {}", speaker, turn.content());

    let citations = turn.citations();
    if !citations.is_empty() {
        println!("{}", "Sources:".bold());
        for (i, citation) in citations.iter().enumerate() {
            println!("{}", format_citation(i + 1, citation));
        }
    }
    println!();
}

/// Print every turn of a transcript
pub fn print_transcript(transcript: &Transcript) {
    for turn in transcript.turns() {
        print_turn(turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(kind: CitationKind, url: &str) -> Citation {
        Citation {
            title: "T".to_string(),
            url: url.to_string(),
            description: String::new(),
            kind,
        }
    }

    #[test]
    fn test_short_id_handles_short_ids() {
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("0123456789"), "01234567");
    }

    #[test]
    fn test_video_citation_shows_thumbnail() {
        colored::control::set_override(false);
        let line = format_citation(
            1,
            &citation(CitationKind::Video, "https://youtu.be/dQw4w9WgXcQ"),
        );
        assert!(line.contains("video"));
        assert!(line.contains("https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"));
    }

    #[test]
    fn test_web_citation_has_no_thumbnail() {
        colored::control::set_override(false);
        let line = format_citation(2, &citation(CitationKind::Web, "https://example.com/a"));
        assert!(line.starts_with("  [2] web"));
        assert!(!line.contains("thumbnail"));
    }

    #[test]
    fn test_usage_badge() {
        let policy = QuotaPolicy {
            limit: 3,
            enforce: true,
        };
        let mut record = UsageRecord::fresh("u1");
        record.messages_used = 2;
        assert_eq!(usage_badge(&record, policy), "1 of 3 free messages left");

        record.messages_used = 5;
        assert_eq!(usage_badge(&record, policy), "0 of 3 free messages left");

        let counting = QuotaPolicy {
            limit: 3,
            enforce: false,
        };
        assert_eq!(usage_badge(&record, counting), "5 messages used");

        record.is_premium = true;
        assert_eq!(usage_badge(&record, policy), "Premium");
    }
}
