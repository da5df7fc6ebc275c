//! HTTP client commands talking to a running stand daemon.

use std::io::{BufRead, BufReader};

use serde_json::json;

use crate::error::{Result, StandError};
use crate::model::DaemonStatus;
use crate::runner::supervisor::LOG_STREAM_END;

pub struct DaemonClient {
    base_url: String,
}

impl DaemonClient {
    pub fn new(port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", port),
        }
    }

    fn request_error(err: ureq::Error) -> StandError {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                let message = serde_json::from_str::<serde_json::Value>(&body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                    .unwrap_or(body);
                StandError::process(format!("daemon returned {}: {}", code, message))
            }
            ureq::Error::Transport(t) => StandError::process(format!(
                "cannot reach daemon at this port ({}). Is `stand serve` running?",
                t
            )),
        }
    }

    pub fn status(&self) -> Result<DaemonStatus> {
        let response = ureq::get(&format!("{}/status", self.base_url))
            .call()
            .map_err(Self::request_error)?;
        response
            .into_json()
            .map_err(|e| StandError::process(format!("invalid status response: {}", e)))
    }

    pub fn create_workspaces(&self, names: &[String]) -> Result<Vec<String>> {
        let response = ureq::post(&format!("{}/workspaces", self.base_url))
            .send_json(json!({ "names": names }))
            .map_err(Self::request_error)?;
        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| StandError::process(format!("invalid response: {}", e)))?;
        Ok(body["created"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn delete_workspace(&self, name: &str) -> Result<()> {
        ureq::delete(&format!("{}/workspaces/{}", self.base_url, name))
            .call()
            .map_err(Self::request_error)?;
        Ok(())
    }

    pub fn switch_preview(&self, workspace: &str, rebuild: bool) -> Result<()> {
        ureq::post(&format!("{}/preview", self.base_url))
            .send_json(json!({ "workspace": workspace, "rebuild": rebuild }))
            .map_err(Self::request_error)?;
        Ok(())
    }

    pub fn sync(
        &self,
        workspace: Option<&str>,
        all: bool,
        rebuild_preview: bool,
    ) -> Result<Vec<String>> {
        let response = ureq::post(&format!("{}/sync", self.base_url))
            .send_json(json!({
                "workspace": workspace,
                "all": all,
                "rebuild_preview": rebuild_preview,
            }))
            .map_err(Self::request_error)?;
        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| StandError::process(format!("invalid response: {}", e)))?;
        Ok(body["synced"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn sync_rules(&self, workspace: &str) -> Result<Vec<String>> {
        let response = ureq::post(&format!("{}/sync/rules", self.base_url))
            .send_json(json!({ "workspace": workspace }))
            .map_err(Self::request_error)?;
        let body: serde_json::Value = response
            .into_json()
            .map_err(|e| StandError::process(format!("invalid response: {}", e)))?;
        Ok(body["updated"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Stream log lines to stdout until the end marker arrives (a new
    /// preview switch preempts this stream) or the daemon closes it.
    pub fn stream_logs(&self) -> Result<()> {
        let response = ureq::get(&format!("{}/preview/logs", self.base_url))
            .call()
            .map_err(Self::request_error)?;

        let reader = BufReader::new(response.into_reader());
        for line in reader.lines() {
            let line = line?;
            if line == LOG_STREAM_END {
                println!("(log stream ended)");
                return Ok(());
            }
            println!("{}", line);
        }
        Ok(())
    }
}

fn exit_with(err: StandError) -> ! {
    eprintln!("stand: {}", err);
    std::process::exit(1);
}

pub fn execute_create(port: u16, names: &[String]) {
    let client = DaemonClient::new(port);
    match client.create_workspaces(names) {
        Ok(created) if created.is_empty() => println!("Nothing to do (already registered)"),
        Ok(created) => println!("Created: {}", created.join(", ")),
        Err(e) => exit_with(e),
    }
}

pub fn execute_delete(port: u16, name: &str) {
    let client = DaemonClient::new(port);
    match client.delete_workspace(name) {
        Ok(()) => println!("Deleted workspace '{}'", name),
        Err(e) => exit_with(e),
    }
}

pub fn execute_preview(port: u16, workspace: &str, rebuild: bool) {
    let client = DaemonClient::new(port);
    match client.switch_preview(workspace, rebuild) {
        Ok(()) => println!("Previewing workspace '{}'", workspace),
        Err(e) => exit_with(e),
    }
}

pub fn execute_sync(port: u16, workspace: Option<&str>, all: bool, rebuild: bool) {
    let client = DaemonClient::new(port);
    match client.sync(workspace, all, rebuild) {
        Ok(synced) => println!("Synced: {}", synced.join(", ")),
        Err(e) => exit_with(e),
    }
}

pub fn execute_syncrule(port: u16, workspace: &str) {
    let client = DaemonClient::new(port);
    match client.sync_rules(workspace) {
        Ok(updated) if updated.is_empty() => {
            println!("Rules published from '{}'; no other workspace updated", workspace)
        }
        Ok(updated) => println!("Rules updated in: {}", updated.join(", ")),
        Err(e) => exit_with(e),
    }
}

pub fn execute_status(port: u16) {
    let client = DaemonClient::new(port);
    match client.status() {
        Ok(status) => print_status(&status),
        Err(e) => exit_with(e),
    }
}

pub fn execute_logs(port: u16) {
    let client = DaemonClient::new(port);
    if let Err(e) = client.stream_logs() {
        exit_with(e);
    }
}

fn print_status(status: &DaemonStatus) {
    match &status.active_preview {
        Some(name) => println!("Active preview: {}", name),
        None => println!("Active preview: (none)"),
    }
    if status.is_syncing {
        println!("Sync in progress");
    }
    println!("Workspaces:");
    if status.workspaces.is_empty() {
        println!("  (none)");
    }
    for ws in &status.workspaces {
        let marker = if ws.is_active { "*" } else { " " };
        println!(
            " {} {} [{}] {}",
            marker,
            ws.name,
            ws.branch,
            ws.path.display()
        );
    }
}
