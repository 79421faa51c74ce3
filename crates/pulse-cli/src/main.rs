use analysis_orchestrator::MarketDataService;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_core::{AiProvider, AnalysisKind, ChartTimeframe, EngineConfig, EnvConfig};
use serde::Serialize;
use serde_json::json;

mod app;

use app::App;

#[derive(Parser)]
#[command(name = "pulse", author, version, about = "Market data and analysis from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Latest quote for a ticker
    Quote { ticker: String },

    /// Daily bars for a ticker
    History {
        ticker: String,

        /// Calendar days back from today
        #[arg(long, default_value_t = 30, conflicts_with = "timeframe")]
        days: i64,

        /// Chart timeframe (1D, 5D, 1M, 3M, 6M, YTD, 1Y, ALL)
        #[arg(long)]
        timeframe: Option<ChartTimeframe>,
    },

    /// Search tickers and company names
    Search {
        #[arg(required_unless_present = "clear_recent")]
        query: Option<String>,

        /// Remember this ticker from the results in the recent-search list
        #[arg(long)]
        pick: Option<String>,

        /// Forget the recent-search list
        #[arg(long, conflicts_with_all = ["query", "pick"])]
        clear_recent: bool,
    },

    /// Saved tickers
    Watchlist {
        #[command(subcommand)]
        action: Option<WatchlistAction>,
    },

    /// AI analysis for a ticker
    Analyze {
        ticker: String,

        /// general, month or week
        #[arg(long, default_value = "general")]
        kind: AnalysisKind,

        /// on-device, cloud or mock; chosen automatically when omitted
        #[arg(long)]
        provider: Option<AiProvider>,
    },

    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum WatchlistAction {
    /// Quotes for the watchlist and market indices
    Show,
    Add { ticker: String },
    Remove { ticker: String },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete expired quotes and price histories
    Sweep,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so stdout stays valid JSON.
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let source = EnvConfig::load_dotenv();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    let cli = Cli::parse();
    let config = EngineConfig::load(&source).context("invalid configuration")?;
    let app = App::build(&config).await.context("failed to start engine")?;

    match cli.command {
        Command::Quote { ticker } => print_json(&app.market.quote(&ticker).await?)?,

        Command::History { ticker, days, timeframe } => {
            let bars = match timeframe {
                Some(timeframe) => {
                    let full = app.market.full_history(&ticker).await?;
                    MarketDataService::for_timeframe(&full, timeframe, app.market.today())
                }
                None => app.market.recent_history(&ticker, days).await?,
            };
            print_json(&bars)?
        }

        Command::Search { clear_recent: true, .. } => {
            app.market.clear_recent_searches().await?;
            print_json(&app.market.recent_searches().await)?
        }

        Command::Search { query, pick, .. } => {
            let results = app.market.search(query.as_deref().unwrap_or_default()).await?;
            match pick {
                Some(pick) => {
                    let chosen = results
                        .iter()
                        .find(|r| r.ticker.eq_ignore_ascii_case(pick.trim()))
                        .cloned()
                        .with_context(|| format!("{} is not among the results", pick))?;
                    let recent = app.market.remember_search(chosen).await;
                    print_json(&json!({ "results": results, "recent": recent }))?
                }
                None => print_json(&results)?,
            }
        }

        Command::Watchlist { action } => match action.unwrap_or(WatchlistAction::Show) {
            WatchlistAction::Show => print_json(&app.fanout.load_watchlist().await?)?,
            WatchlistAction::Add { ticker } => {
                let company = match app.market.quote(&ticker).await {
                    Ok(quote) => Some(quote.company_name),
                    Err(e) => {
                        tracing::warn!("Adding {} without a quote: {}", ticker, e);
                        None
                    }
                };
                let added = app.watchlist.add(&ticker, company).await?;
                print_json(&json!({ "added": added, "tickers": app.watchlist.tickers().await? }))?
            }
            WatchlistAction::Remove { ticker } => {
                let removed = app.watchlist.remove(&ticker).await?;
                print_json(&json!({ "removed": removed, "tickers": app.watchlist.tickers().await? }))?
            }
        },

        Command::Analyze { ticker, kind, provider } => {
            print_json(&app.ai.analyze_ticker(&ticker, kind, provider).await?)?
        }

        Command::Cache { action: CacheAction::Sweep } => {
            let removed = app.market.clear_expired().await;
            print_json(&json!({ "removed": removed }))?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_analyze_flags() {
        let cli = Cli::try_parse_from(["pulse", "analyze", "aapl", "--kind", "week", "--provider", "gemini"]).unwrap();
        match cli.command {
            Command::Analyze { ticker, kind, provider } => {
                assert_eq!(ticker, "aapl");
                assert_eq!(kind, AnalysisKind::Week);
                assert_eq!(provider, Some(AiProvider::Cloud));
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_search_needs_query_unless_clearing() {
        assert!(Cli::try_parse_from(["pulse", "search"]).is_err());
        assert!(Cli::try_parse_from(["pulse", "search", "app", "--clear-recent"]).is_err());
        let cli = Cli::try_parse_from(["pulse", "search", "--clear-recent"]).unwrap();
        assert!(matches!(cli.command, Command::Search { query: None, clear_recent: true, .. }));
    }

    #[test]
    fn test_history_days_and_timeframe_conflict() {
        assert!(Cli::try_parse_from(["pulse", "history", "AAPL", "--days", "5", "--timeframe", "1M"]).is_err());
        let cli = Cli::try_parse_from(["pulse", "history", "AAPL", "--timeframe", "ytd"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::History { timeframe: Some(ChartTimeframe::YearToDate), .. }
        ));
    }
}
