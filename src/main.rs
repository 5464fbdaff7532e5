//! Headless CLI driver for the invox sync core.
//!
//! Stands in for the UI layer: each command enqueues intents through
//! `CoreHandle` and renders the emitted state stream to stdout.

use std::sync::Arc;
use std::time::Duration;

use invox::config;
use invox::events::{CoreState, Notification};
use invox::gateway::http::RetryPolicy;
use invox::types::Filters;
use invox::{
    spawn_core, CoreHandle, HttpInvoiceGateway, InvoiceStatus, SessionContext, UploadMetadata,
    UploadStage,
};

use tokio::sync::broadcast;

const USAGE: &str = "\
invox - invoice sync core driver

USAGE:
  invox list [page]
  invox detail <id>
  invox delete <id>...
  invox status <id> <unreimbursed|pending|reimbursed|voided>
  invox upload <file>...

Configuration is read from ~/.invox/config.json.
Set RUST_LOG=debug for core tracing.";

/// What a command is waiting for before it can exit.
enum WaitFor {
    /// A `Loaded` window (list).
    Window,
    /// A `DetailLoaded` record.
    Detail,
    /// A transient confirmation (delete / status update).
    Confirmation,
    /// The `UploadCompleted` aggregate.
    Uploads,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    match run(&args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

async fn run(args: &[String]) -> Result<i32, String> {
    let config = config::load_config()?;
    let base = url::Url::parse(&config.backend_url)
        .map_err(|e| format!("bad backendUrl {}: {e}", config.backend_url))?;
    let session = SessionContext::new(config.account_ref.clone());

    let gateway = HttpInvoiceGateway::new(
        base,
        config.api_token.clone(),
        session.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .map_err(|e| e.to_string())?
    .with_retry_policy(RetryPolicy {
        max_attempts: config.retry_max_attempts,
        ..RetryPolicy::default()
    });

    let handle = spawn_core(Arc::new(gateway), session, config.page_size);

    match args[0].as_str() {
        "list" => {
            let page: u32 = args
                .get(1)
                .map(|p| p.parse().map_err(|_| format!("bad page: {p}")))
                .transpose()?
                .unwrap_or(1);
            let states = handle.subscribe();
            let notes = handle.subscribe_notifications();
            handle
                .load_page(page, config.page_size, Filters::default(), None)
                .await
                .map_err(|e| e.to_string())?;
            render_until(states, notes, WaitFor::Window).await
        }
        "detail" => {
            let id = args.get(1).ok_or("detail needs an invoice id")?;
            let states = handle.subscribe();
            let notes = handle.subscribe_notifications();
            handle.get_detail(id.clone()).await.map_err(|e| e.to_string())?;
            render_until(states, notes, WaitFor::Detail).await
        }
        "delete" => {
            let ids: Vec<String> = args[1..].to_vec();
            if ids.is_empty() {
                return Err("delete needs at least one invoice id".into());
            }
            prime_window(&handle, &config).await?;
            let states = handle.subscribe();
            let notes = handle.subscribe_notifications();
            if ids.len() == 1 {
                handle.delete(ids[0].clone()).await.map_err(|e| e.to_string())?;
            } else {
                handle.delete_batch(ids).await.map_err(|e| e.to_string())?;
            }
            render_until(states, notes, WaitFor::Confirmation).await
        }
        "status" => {
            let id = args.get(1).ok_or("status needs an invoice id")?;
            let status = args
                .get(2)
                .and_then(|s| InvoiceStatus::parse(s))
                .ok_or("status needs one of: unreimbursed, pending, reimbursed, voided")?;
            prime_window(&handle, &config).await?;
            let states = handle.subscribe();
            let notes = handle.subscribe_notifications();
            handle
                .update_status(id.clone(), status)
                .await
                .map_err(|e| e.to_string())?;
            render_until(states, notes, WaitFor::Confirmation).await
        }
        "upload" => {
            let paths: Vec<String> = args[1..].to_vec();
            if paths.is_empty() {
                return Err("upload needs at least one file".into());
            }
            let states = handle.subscribe();
            let notes = handle.subscribe_notifications();
            handle
                .upload_batch(
                    paths,
                    UploadMetadata {
                        source: Some("cli".to_string()),
                        note: None,
                    },
                )
                .await
                .map_err(|e| e.to_string())?;
            render_until(states, notes, WaitFor::Uploads).await
        }
        other => Err(format!("unknown command: {other}\n\n{USAGE}")),
    }
}

/// Mutations need the target record in the window; load page 1 first.
async fn prime_window(handle: &CoreHandle, config: &config::Config) -> Result<(), String> {
    let mut states = handle.subscribe();
    handle
        .load_page(1, config.page_size, Filters::default(), None)
        .await
        .map_err(|e| e.to_string())?;
    loop {
        match states.recv().await {
            Ok(CoreState::Loaded { .. }) => return Ok(()),
            Ok(CoreState::Error { message, .. }) => return Err(message),
            Ok(_) => continue,
            Err(_) => return Err("state stream closed".into()),
        }
    }
}

/// Render the streams until the command's terminal condition is met.
async fn render_until(
    mut states: broadcast::Receiver<CoreState>,
    mut notes: broadcast::Receiver<Notification>,
    wait_for: WaitFor,
) -> Result<i32, String> {
    let mut last_stage: Option<(String, UploadStage)> = None;
    loop {
        tokio::select! {
            state = states.recv() => {
                let state = state.map_err(|_| "state stream closed".to_string())?;
                match state {
                    CoreState::Loaded { records, page, total, has_more, .. } => {
                        if matches!(wait_for, WaitFor::Window) {
                            println!("page {page}: {total} total, has_more={has_more}");
                            for r in &records {
                                println!(
                                    "  {:<14} {:<16} {:<12} {:>12}  {}",
                                    r.id,
                                    r.invoice_number,
                                    r.status.as_str(),
                                    r.total_amount,
                                    r.seller_name
                                );
                            }
                            return Ok(0);
                        }
                        // Optimistic or follow-up snapshot of another command.
                    }
                    CoreState::DetailLoaded { record } => {
                        if matches!(wait_for, WaitFor::Detail) {
                            let json = serde_json::to_string_pretty(&record)
                                .map_err(|e| e.to_string())?;
                            println!("{json}");
                            return Ok(0);
                        }
                    }
                    CoreState::Error { message, code } => {
                        eprintln!("[{code}] {message}");
                        return Ok(1);
                    }
                    CoreState::Uploading { progresses, completed, total } => {
                        for p in &progresses {
                            let key = (p.file_name.clone(), p.stage);
                            if last_stage.as_ref() != Some(&key) && !p.stage.is_terminal() {
                                println!(
                                    "[{completed}/{total}] {} {:?} ({:.0}%)",
                                    p.file_name,
                                    p.stage,
                                    p.progress * 100.0
                                );
                                last_stage = Some(key);
                            }
                        }
                    }
                    CoreState::UploadCompleted {
                        results,
                        success_count,
                        failure_count,
                        duplicate_count,
                    } => {
                        for r in &results {
                            if r.is_success {
                                let id = r.invoice.as_ref().map(|i| i.id.as_str()).unwrap_or("?");
                                println!("  ok        {} -> {id}", r.file_name);
                            } else if r.is_duplicate {
                                let hint = r
                                    .cross_user_duplicate_info
                                    .as_ref()
                                    .map(|c| {
                                        format!(" (cross-user, score {:.2})", c.similarity_score)
                                    })
                                    .unwrap_or_default();
                                println!("  duplicate {}{hint}", r.file_name);
                            } else {
                                let err = r.error.as_ref();
                                println!(
                                    "  failed    {} [{}] {}",
                                    r.file_name,
                                    err.map(|e| e.code.as_str()).unwrap_or("?"),
                                    err.map(|e| e.message.as_str()).unwrap_or("")
                                );
                            }
                        }
                        println!(
                            "{success_count} uploaded, {duplicate_count} duplicates, {failure_count} failed"
                        );
                        return Ok(if failure_count > 0 { 1 } else { 0 });
                    }
                    CoreState::Initial | CoreState::Loading | CoreState::DetailLoading => {}
                }
            }
            note = notes.recv() => {
                match note {
                    Ok(Notification::DeleteSucceeded { message }) => {
                        println!("{message}");
                        if matches!(wait_for, WaitFor::Confirmation) {
                            return Ok(0);
                        }
                    }
                    Ok(Notification::StatusUpdated { id, status }) => {
                        println!("{} -> {}", id, status.as_str());
                        if matches!(wait_for, WaitFor::Confirmation) {
                            return Ok(0);
                        }
                    }
                    Ok(Notification::UploadsCancelled) => println!("uploads cancelled"),
                    Err(_) => return Err("notification stream closed".to_string()),
                }
            }
        }
    }
}
