mod api;
mod cli;
mod config;
mod error;
mod git;
mod manager;
mod model;
mod runner;
mod sync;
mod watcher;

use clap::Parser;

use cli::{client, Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            if let Err(e) = cli::init::execute() {
                eprintln!("stand: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Serve { port } => block_on_command(cli::serve::execute(port)),
        Commands::Run { workspace } => block_on_command(cli::run::execute(&workspace)),
        Commands::Create { names, port } => client::execute_create(port, &names),
        Commands::Delete { name, port } => client::execute_delete(port, &name),
        Commands::Preview {
            workspace,
            rebuild,
            port,
        } => client::execute_preview(port, &workspace, rebuild),
        Commands::Sync {
            workspace,
            all,
            no_rebuild,
            port,
        } => client::execute_sync(port, workspace.as_deref(), all, !no_rebuild),
        Commands::Syncrule { workspace, port } => client::execute_syncrule(port, &workspace),
        Commands::Status { port } => client::execute_status(port),
        Commands::Logs { port } => client::execute_logs(port),
    }
}

/// 异步子命令统一在此处进入 tokio runtime。
fn block_on_command(fut: impl std::future::Future<Output = error::Result<()>>) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("stand: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(fut) {
        eprintln!("stand: {}", e);
        std::process::exit(1);
    }
}
