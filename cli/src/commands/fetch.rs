use std::io::Write;

use tasklog_cli::output::render_snapshot;
use tasklog_cli::Result;
use tasklog_link::TaskLogClient;

pub async fn handle_fetch(
    client: &TaskLogClient,
    task_id: u64,
    work_id: u64,
    direct: bool,
    json: bool,
) -> Result<()> {
    let fetched = if direct {
        client.fetch_log_direct(task_id, work_id).await?
    } else {
        client.fetch_log(task_id, work_id).await?
    };

    log::info!(
        "Fetched {} bytes in {} attempt(s), {} ms",
        fetched.snapshot.content.len(),
        fetched.attempts,
        fetched.elapsed.as_millis()
    );

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(render_snapshot(&fetched, json)?.as_bytes())?;
    if json {
        writeln!(stdout)?;
    }
    stdout.flush()?;

    if !json && fetched.snapshot.completed {
        eprintln!("-- run finished --");
    }
    Ok(())
}
