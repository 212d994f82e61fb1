use std::sync::mpsc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use fpl_terminal::fpl_api;
use fpl_terminal::provider;
use fpl_terminal::snapshot;
use fpl_terminal::state::Delta;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let force = std::env::args().skip(1).any(|arg| arg == "--force");

    if force {
        println!("Force flag detected; generating snapshot.");
    } else if !refresh_day()? {
        println!("Not a refresh day; skipping generation.");
        return Ok(());
    }

    generate()
}

/// The snapshot refreshes two days ahead of the next deadline, so the squad
/// settles before the last press conferences.
fn refresh_day() -> Result<bool> {
    let bootstrap = fpl_api::bootstrap_static()?;
    let Some((gameweek, deadline_raw)) = fpl_api::next_deadline(&bootstrap) else {
        println!("No upcoming gameweek found.");
        return Ok(false);
    };

    let deadline = DateTime::parse_from_rfc3339(&deadline_raw)
        .with_context(|| format!("unparseable deadline {deadline_raw}"))?
        .with_timezone(&Utc);
    let target = deadline - Duration::days(2);
    let now = Utc::now();

    println!("Next gameweek: {gameweek}");
    println!("Deadline: {deadline}");
    println!("Target refresh date: {}", target.date_naive());
    println!("Current date: {}", now.date_naive());

    Ok(now.date_naive() == target.date_naive())
}

fn generate() -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let dashboard = provider::compute_dashboard(&tx)?;
    drop(tx);
    for delta in rx.try_iter() {
        if let Delta::Log(msg) = delta {
            println!("{msg}");
        }
    }

    let dir = snapshot::data_dir();
    snapshot::save_dashboard(&dir, &dashboard).context("save dashboard snapshot")?;
    snapshot::save_history_snapshot(&dir, &dashboard).context("save history snapshot")?;

    println!(
        "Gameweek {} snapshot written to {}",
        dashboard.gameweek,
        dir.display()
    );
    println!(
        "Projected points: {:.1} | squad {} + bench {}",
        dashboard.total_projected_points,
        dashboard.squad.len(),
        dashboard.bench.len()
    );
    if let Some(optimized) = &dashboard.optimized_squad {
        println!(
            "Optimized squad: {} at {:.1}m",
            optimized.formation, optimized.total_cost
        );
    }
    Ok(())
}
