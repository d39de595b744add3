use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chemviz_lib::{
    client::{
        display::{render_distribution, render_history, render_summary, CHART_WIDTH},
        ApiClient, ClientConfig,
    },
    report::REPORT_FILE_NAME,
};

#[derive(Debug, Parser)]
#[command(name = "chemviz-client", version, about = "Upload equipment CSVs and browse results")]
struct Cli {
    /// Base URL of the chemviz server
    #[arg(long, env = "API_URL", default_value = "http://127.0.0.1:8000")]
    url: String,

    #[arg(long, env = "API_USERNAME")]
    username: String,

    #[arg(long, env = "API_PASSWORD", hide_env_values = true)]
    password: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a CSV and show its analysis
    Upload { file: PathBuf },
    /// Show the most recent uploads
    History,
    /// Download the PDF report for the latest upload
    ExportPdf {
        #[arg(long, short, default_value = REPORT_FILE_NAME)]
        output: PathBuf,
    },
    /// Poll history and redraw it when it changes
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let client = ApiClient::new(&ClientConfig {
        base_url: cli.url,
        username: cli.username,
        password: cli.password,
        timeout: Duration::from_secs(cli.timeout),
    });

    match cli.command {
        Command::Upload { file } => {
            let summary = client.upload_file(&file)?;
            println!("{}", render_summary(&summary));
            println!("{}", render_distribution(&summary.distribution, CHART_WIDTH));
            print!("{}", render_history(&client.history()?));
        }
        Command::History => print!("{}", render_history(&client.history()?)),
        Command::ExportPdf { output } => {
            let bytes = client.export_pdf()?;
            fs::write(&output, &bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved report to {} ({} bytes)", output.display(), bytes.len());
        }
        Command::Watch { interval } => {
            client.watch_history(Duration::from_secs(interval.max(1)), None, |entries| {
                println!("{}", render_history(entries));
            });
        }
    }

    Ok(())
}
