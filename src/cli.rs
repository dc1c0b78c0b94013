use chrono::Local;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::coordinator::DeskStatus;
use crate::error::Result;
use crate::feed::ParsedEvent;
use crate::ledger::{Ledger, ResetScope};
use crate::scheduler::Timetable;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser)]
#[command(name = "tableau")]
#[command(version)]
#[command(about = "Game feed prediction desk with an autonomous timetable", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read feed events from stdin and run the desk (default)
    Run,
    /// Show what the parser extracts from one event
    Parse {
        /// Raw event text
        text: String,
    },
    /// Generate and print a timetable without storing it
    Timetable {
        /// RNG seed for the launch leads
        #[arg(long)]
        seed: Option<u64>,
    },
}

/// One line typed on the console feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Event(String),
    Status,
    Reset(ResetScope),
    Blank,
}

impl ConsoleLine {
    /// `/status`, `/reset` and `/reset all` are operator commands; anything else is an event
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => ConsoleLine::Blank,
            "/status" => ConsoleLine::Status,
            "/reset" => ConsoleLine::Reset(ResetScope::KeepHistory),
            "/reset all" => ConsoleLine::Reset(ResetScope::Full),
            _ => ConsoleLine::Event(trimmed.to_string()),
        }
    }
}

/// Print the parser's view of an event
pub fn show_parse(text: &str) {
    let event = ParsedEvent::parse(text);

    println!("game:   {}", event.game.map_or("-".to_string(), |g| g.to_string()));
    if event.groups.is_empty() {
        println!("groups: none");
    }
    for (i, group) in event.groups.iter().enumerate() {
        let count = group.count();
        println!(
            "group {}: ({}) suits={} cards={} (decorated {}, plain {})",
            i + 1,
            group.raw,
            group.combination(),
            count.total(),
            count.decorated,
            count.plain
        );
    }
}

/// Print a freshly generated timetable
pub fn show_timetable(config: &AppConfig, seed: Option<u64>) -> Result<()> {
    let mut rng = match seed.or(config.scheduler.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let now = Local::now().naive_local();
    let timetable = Timetable::generate(&config.scheduler, now, &mut rng, &Ledger::new());

    println!("Timetable for {} ({} entries)", timetable.date(), timetable.len());
    println!("{:<7} {:>6} {:>6} {:>5}", "id", "launch", "pred", "lead");
    for entry in timetable.entries() {
        println!(
            "{:<7} {:>6} {:>6} {:>4}m",
            entry.id,
            entry.launch_time.format("%H:%M"),
            entry.prediction_time.format("%H:%M"),
            entry.launch_offset
        );
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&timetable.snapshot())?);
    Ok(())
}

/// Print a status snapshot
pub fn show_status(status: &DeskStatus) {
    let stats = &status.stats;
    println!(
        "📈 {}/{} ({:.1}%) | pending {}",
        stats.wins, stats.total, stats.win_rate, stats.pending
    );
    for p in &status.recent {
        println!(
            "  #{:<6} {:<9} {:<6} {}",
            p.target,
            p.origin.as_str(),
            p.suits.as_deref().unwrap_or("-"),
            p.status
        );
    }
    if let Some(schedule) = &status.schedule {
        let next = schedule
            .next_launch
            .as_ref()
            .map(|(id, at)| format!("{} at {}", id, at.format("%H:%M")))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "⏱ schedule {}: {} total, {} launched, {} verified, {} waiting, next {}, running={}",
            schedule.date,
            schedule.total,
            schedule.launched,
            schedule.verified,
            schedule.pending,
            next,
            schedule.is_running
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_line() {
        assert_eq!(ConsoleLine::parse("  "), ConsoleLine::Blank);
        assert_eq!(ConsoleLine::parse("/status"), ConsoleLine::Status);
        assert_eq!(
            ConsoleLine::parse("/reset"),
            ConsoleLine::Reset(ResetScope::KeepHistory)
        );
        assert_eq!(
            ConsoleLine::parse("/reset all\n"),
            ConsoleLine::Reset(ResetScope::Full)
        );
        assert_eq!(
            ConsoleLine::parse("#N1234. (♠♥)"),
            ConsoleLine::Event("#N1234. (♠♥)".to_string())
        );
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["tableau", "parse", "#N1. (♠)"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Parse { ref text }) if text == "#N1. (♠)"));

        let cli = Cli::try_parse_from(["tableau", "-c", "x.toml", "timetable", "--seed", "3"]).unwrap();
        assert_eq!(cli.config, "x.toml");
        assert!(matches!(cli.command, Some(Commands::Timetable { seed: Some(3) })));
    }
}
