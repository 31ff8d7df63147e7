//! Console rendering for progress and reports.

use colored::*;
use std::collections::HashMap;
use std::path::Path;

use unlockr::classifier::Classifier;
use unlockr::discovery::ClientLibrary;
use unlockr::domain::{AchievementOutcome, TitleId, TitleOutcome, WorkerState};
use unlockr::report::RunReport;
use unlockr::scan::ScanReport;
use unlockr::scheduler::ProgressSink;
use unlockr::session::{LibrarySnapshot, SnapshotGame};

/// Prints live progress lines to stdout.
pub struct ConsoleSink {
    names: HashMap<TitleId, String>,
    verbose: bool,
}

impl ConsoleSink {
    pub fn new(names: HashMap<TitleId, String>, verbose: bool) -> Self {
        Self { names, verbose }
    }

    fn label(&self, title: TitleId) -> String {
        match self.names.get(&title) {
            Some(name) => format!("{} ({})", name, title),
            None => title.to_string(),
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn achievement(&self, title: TitleId, achievement: &str, outcome: &AchievementOutcome) {
        let status = match outcome {
            AchievementOutcome::Unlocked => "unlocked".green(),
            AchievementOutcome::Skipped { .. } if !self.verbose => return,
            AchievementOutcome::Skipped { .. } => outcome.to_string().dimmed(),
            AchievementOutcome::Failed { .. } => outcome.to_string().red(),
        };
        println!("  {} {} {}", self.label(title).cyan(), achievement, status);
    }

    fn title_finished(&self, title: TitleId, outcome: TitleOutcome) {
        println!("{} {}", outcome_label(outcome), self.label(title));
    }

    fn state_changed(&self, title: TitleId, state: WorkerState) {
        if self.verbose && state.is_active() {
            println!("  {} {}", self.label(title).dimmed(), state.to_string().dimmed());
        }
    }
}

pub fn outcome_label(outcome: TitleOutcome) -> ColoredString {
    match outcome {
        TitleOutcome::Success => "[done]".green().bold(),
        TitleOutcome::PartialFailure => "[partial]".yellow().bold(),
        TitleOutcome::Failure => "[failed]".red().bold(),
        TitleOutcome::Cancelled => "[cancelled]".yellow(),
    }
}

pub fn print_library(library: &ClientLibrary) {
    println!("{} {}", "Install dir:".green(), library.install_dir.display());
    println!("{} {}", "Client library:".green(), library.client_library.display());
    if library.companions.is_empty() {
        println!("{}", "No companion libraries found".yellow());
    }
    for companion in &library.companions {
        println!("  {} {}", "companion".cyan(), companion.display());
    }
}

pub fn print_titles(snapshot: &LibrarySnapshot) {
    let candidates: Vec<&SnapshotGame> = snapshot.games.iter().filter(|g| g.locked_count() > 0).collect();
    if candidates.is_empty() {
        println!("{}", "No titles with locked achievements".yellow());
        return;
    }
    for game in &candidates {
        println!(
            "{:>10}  {:<40} {} locked, {} protected",
            game.appid.to_string().cyan(),
            game.name,
            game.locked_count().to_string().bold(),
            game.protected_count()
        );
    }
    println!("{} {}", "Titles:".green(), candidates.len());
}

pub fn print_preview(game: &SnapshotGame, classifier: &Classifier) {
    println!("{} {} ({})", "Preview:".green(), game.name, game.appid);
    let records = game.achievements.iter().map(|a| a.to_record()).collect();
    for (record, verdict) in classifier.classify_all(records) {
        let verdict_text = if verdict.is_eligible() {
            verdict.to_string().green()
        } else if verdict.is_protected() {
            verdict.to_string().yellow()
        } else {
            verdict.to_string().dimmed()
        };
        println!("  {:<40} {}", record.display_name(), verdict_text);
    }
}

pub fn print_summary(report: &RunReport) {
    println!();
    if report.cancelled {
        println!("{}", "Run cancelled".yellow().bold());
    } else {
        println!("{}", "Run complete".green().bold());
    }
    println!(
        "Titles: {} total, {} succeeded, {} partial, {} failed, {} cancelled",
        report.total_titles,
        report.titles_succeeded.to_string().green(),
        report.titles_partial.to_string().yellow(),
        report.titles_failed.to_string().red(),
        report.titles_cancelled
    );
    println!(
        "Achievements: {} unlocked, {} skipped ({} protected), {} failed",
        report.achievements_unlocked.to_string().green(),
        report.achievements_skipped,
        report.skipped_protected(),
        report.achievements_failed.to_string().red()
    );

    for result in report.problems() {
        let reason = result.reason().unwrap_or_default();
        println!("{} {}: {}", outcome_label(result.outcome), result.display_name(), reason);
        for attempt in result.attempts.iter().filter(|a| a.outcome.is_failed()) {
            println!("    {} {}", attempt.record.id, attempt.outcome.to_string().red());
        }
    }
}

pub fn print_scan_summary(report: &ScanReport, output: &Path) {
    println!();
    if report.cancelled {
        println!("{}", "Scan stopped early".yellow().bold());
    } else {
        println!("{}", "Scan complete".green().bold());
    }
    println!(
        "Games: {} owned, {} scanned, {} with locked achievements, {} fully unlocked, {} failed",
        report.owned_games,
        report.scanned,
        report.snapshot.games.len().to_string().green(),
        report.fully_unlocked,
        report.failures.len().to_string().red()
    );
    println!("Locked achievements: {}", report.locked_achievements());
    for failure in &report.failures {
        let name = if failure.name.is_empty() {
            failure.title.to_string()
        } else {
            format!("{} ({})", failure.name, failure.title)
        };
        println!("  {} {}: {}", "skipped".dimmed(), name, failure.reason);
    }
    println!("Snapshot written to {}", output.display());
}
