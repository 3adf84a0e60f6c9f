mod cache;
mod error;
mod fetcher;
mod output;
mod parser;
mod settings;

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::Context as _;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use cache::HttpCache;
use fetcher::Fetcher;
use output::OutputFormat;
use parser::extract::{self, Context, Mode};
use settings::Settings;

const LOG_FILE: &str = "parser.log";

#[derive(Parser, Debug)]
#[command(name = "pydocs_scraper", about = "Python documentation parser")]
struct Cli {
    /// Parser mode
    #[arg(value_enum)]
    mode: Mode,
    /// Clear the HTTP cache before running
    #[arg(short, long)]
    clear_cache: bool,
    /// Extra output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,
}

fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let logs_dir = settings.logs_dir();
    std::fs::create_dir_all(&logs_dir)
        .with_context(|| format!("Failed to create {}", logs_dir.display()))?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(LOG_FILE))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings)?;

    let t0 = Instant::now();
    info!("Parser started");
    let cli = Cli::parse();
    info!(?cli, "Command line arguments");

    let cache = HttpCache::open(&settings.cache_path(), settings.cache_expire_secs)?;
    if cli.clear_cache {
        let removed = cache.clear()?;
        info!(removed, "HTTP cache cleared");
    }

    let ctx = Context {
        fetcher: Fetcher::new(&settings.user_agent, settings.timeout(), Some(cache))?,
        docs_url: Url::parse(&settings.docs_url).context("Invalid docs_url")?,
        pep_url: Url::parse(&settings.pep_url).context("Invalid pep_url")?,
        downloads_dir: settings.downloads_dir(),
    };

    let results = match extract::run(cli.mode, &ctx).await {
        Ok(results) => results,
        Err(e) => {
            error!(mode = cli.mode.name(), error = %e, "Parser failed");
            return Err(e.into());
        }
    };

    if let Some(results) = results {
        output::control_output(&results, cli.mode, cli.output, &settings.results_dir())?;
    }

    info!(elapsed = %format_duration(t0.elapsed()), "Parser finished");
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_mode_and_flags() {
        let cli = Cli::try_parse_from(["pydocs_scraper", "pep", "-c", "--output", "pretty"]).unwrap();
        assert_eq!(cli.mode, Mode::Pep);
        assert!(cli.clear_cache);
        assert_eq!(cli.output, Some(OutputFormat::Pretty));

        let cli = Cli::try_parse_from(["pydocs_scraper", "whats-new"]).unwrap();
        assert_eq!(cli.mode, Mode::WhatsNew);
        assert_eq!(cli.output, None);
    }

    #[test]
    fn cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["pydocs_scraper", "changelog"]).is_err());
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(std::time::Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }
}
