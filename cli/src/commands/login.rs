use tasklog_cli::Result;
use tasklog_link::TaskLogClient;

pub fn handle_login(client: &TaskLogClient, token: &str) -> Result<()> {
    client.establish_session(token)?;
    println!("Token stored for {}", client.base_url());
    Ok(())
}

pub fn handle_logout(client: &TaskLogClient) -> Result<()> {
    client.logout()?;
    println!("Session cleared");
    Ok(())
}
