use tokio::sync::mpsc;

use tasklog_cli::output::{format_completion, format_log_line, format_status};
use tasklog_cli::{CliError, Result};
use tasklog_link::{TaskLinkError, TaskLogClient};

use super::fetch::handle_fetch;

enum TailEnd {
    Completed,
    Failed(String),
}

/// Follow a run live until it completes, the stream gives up, or Ctrl+C.
pub async fn handle_tail(
    client: &TaskLogClient,
    task_id: u64,
    work_id: u64,
    fallback: bool,
) -> Result<()> {
    let session = client.new_stream_session();
    let (end_tx, mut end_rx) = mpsc::unbounded_channel::<TailEnd>();

    session.on_log(|event| println!("{}", format_log_line(event)));
    session.on_status(|event| eprintln!("{}", format_status(event)));

    let tx = end_tx.clone();
    session.on_complete(move |event| {
        eprintln!("{}", format_completion(event));
        let _ = tx.send(TailEnd::Completed);
    });

    let tx = end_tx;
    session.on_error(move |err| {
        if err.recoverable {
            eprintln!("[stream] {} (reconnecting)", err.message);
        } else {
            let _ = tx.send(TailEnd::Failed(err.message.clone()));
        }
    });

    let url = client.stream_url(task_id, work_id)?;
    let options = client.stream_options().clone();

    match session.connect(url, options).await {
        Ok(()) => {},
        Err(TaskLinkError::ConnectError(message)) => {
            return fall_back(client, task_id, work_id, fallback, message).await;
        },
        Err(e) => return Err(e.into()),
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tokio::select! {
        _ = &mut ctrl_c => {
            session.disconnect();
            eprintln!("\nStopped following task {} work {}", task_id, work_id);
            Ok(())
        }
        end = end_rx.recv() => match end {
            Some(TailEnd::Completed) | None => Ok(()),
            Some(TailEnd::Failed(message)) => {
                fall_back(client, task_id, work_id, fallback, message).await
            },
        }
    }
}

async fn fall_back(
    client: &TaskLogClient,
    task_id: u64,
    work_id: u64,
    fallback: bool,
    message: String,
) -> Result<()> {
    if client.coordinator().episodes() > 0 {
        return Err(CliError::SessionExpired);
    }
    if !fallback {
        return Err(TaskLinkError::ConnectError(message).into());
    }
    eprintln!("Live stream unavailable ({}); fetching the log instead", message);
    handle_fetch(client, task_id, work_id, false, false).await
}
