use std::sync::Arc;

use jot::config::{Settings, database_path, settings_path};
use jot::db::Store;
use jot::sync::github::GitHubClient;
use jot::worker::{JobKind, JobScheduler, WorkerContext};

#[tokio::main]
async fn main() {
    systemd_journal_logger::JournalLog::new()
        .unwrap()
        .with_syslog_identifier("jot-queue-check".to_string())
        .install()
        .unwrap();
    log::set_max_level(log::LevelFilter::Info);

    let settings = match Settings::load(&settings_path()) {
        Ok(settings) => settings,
        Err(e) => {
            println!("Failed to load settings: {}", e);
            return;
        }
    };

    let store = match Store::open(&database_path()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            println!("Failed to open queue database: {}", e);
            return;
        }
    };

    println!("=== Queue Status ===\n");

    match store.pending_notes() {
        Ok(notes) => {
            println!("Pending notes: {}", notes.len());
            for note in &notes {
                let preview: String = note.text.chars().take(50).collect();
                println!(
                    "  [{}] {} ({})",
                    note.status.as_str(),
                    preview,
                    note.filename
                );
            }
        }
        Err(e) => println!("Error reading pending notes: {}", e),
    }

    match store.pending_sync_entries() {
        Ok(entries) => {
            println!("\nBackup queue: {}", entries.len());
            for entry in &entries {
                println!(
                    "  [{}] {} ({} bytes)",
                    entry.status.as_str(),
                    entry.filename,
                    entry.content.len()
                );
            }
        }
        Err(e) => println!("Error reading backup queue: {}", e),
    }

    match store.recent_submissions() {
        Ok(submissions) => {
            println!("\nRecent submissions: {}", submissions.len());
            for submission in &submissions {
                println!(
                    "  {} {}",
                    if submission.success { "ok " } else { "err" },
                    submission.preview
                );
            }
        }
        Err(e) => println!("Error reading submissions: {}", e),
    }

    // Drain the queues when credentials are available. The token comes from
    // the environment if set, otherwise from the keyring.
    let token = match std::env::var("JOT_TOKEN") {
        Ok(token) if !token.is_empty() => Some(token),
        _ => match jot::auth::load_token().await {
            Ok(token) => token,
            Err(e) => {
                println!("\nKeyring unavailable: {}", e);
                None
            }
        },
    };

    let Some(token) = token else {
        println!("\nNo access token; queues left untouched.");
        return;
    };
    let Some((owner, repo)) = settings.repo() else {
        println!("\nNo repository configured; queues left untouched.");
        return;
    };

    println!("\n--- Draining queues against {}/{} ---", owner, repo);

    let scheduler = JobScheduler::new();
    scheduler.enqueue(JobKind::UploadRetry);
    scheduler.enqueue(JobKind::BackupSync);

    let ctx = WorkerContext {
        store: store.clone(),
        api: Arc::new(GitHubClient::new()),
        token: Some(token),
        owner: Some(owner.to_string()),
        repo: Some(repo.to_string()),
    };
    scheduler.run_pending(&ctx).await;

    let notes_left = store.pending_note_count().unwrap_or(-1);
    let syncs_left = store.pending_sync_count().unwrap_or(-1);
    println!(
        "Done. {} notes and {} backup entries still queued.",
        notes_left, syncs_left
    );
}
