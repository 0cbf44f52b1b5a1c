use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use acera_core::analysis::aggregator::Aggregator;
use acera_core::domain::news::SentimentBreakdown;
use acera_core::report::{ReportBuilder, ReportFormat};

#[derive(Debug, Parser)]
#[command(name = "acera", about = "Stock quotes, news and multi-analyst consensus from the terminal")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Latest quote (synthetic when the market data provider is unavailable).
    Quote { symbol: String },

    /// Recent news with sentiment and relevance scores.
    News {
        symbol: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Run every analyst persona and print the consensus.
    Analyze { symbol: String },

    /// Generate a research report.
    Report {
        symbol: String,
        /// json, csv (alias excel) or markdown (alias pdf).
        #[arg(long, default_value = "markdown")]
        format: String,
        /// Write the rendered report here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = acera_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(args.command, &settings).await;
    if let Err(e) = &result {
        sentry_anyhow::capture_anyhow(e);
        tracing::error!(error = %e, "command failed");
    }
    result
}

async fn run(command: Command, settings: &acera_core::config::Settings) -> anyhow::Result<()> {
    let aggregator = Aggregator::from_settings(settings)?;

    match command {
        Command::Quote { symbol } => {
            let quote = aggregator.market().get_quote(&symbol).await;
            print_json(&quote)
        }
        Command::News { symbol, limit } => {
            anyhow::ensure!((1..=50).contains(&limit), "--limit must be between 1 and 50");
            let news = aggregator.news().get_stock_news(&symbol, limit).await;
            let sentiment = SentimentBreakdown::from_items(&news);
            tracing::info!(
                %symbol,
                items = news.len(),
                scored = sentiment.total(),
                overall = ?sentiment.overall(),
                "news fetched"
            );
            print_json(&serde_json::json!({
                "symbol": symbol.trim().to_uppercase(),
                "sentiment": sentiment,
                "news": news,
            }))
        }
        Command::Analyze { symbol } => {
            let consensus = aggregator.aggregate(&symbol).await;
            tracing::info!(
                symbol = %consensus.symbol,
                rating = %consensus.consensus_rating,
                agreement = consensus.agreement_level,
                data_quality = ?consensus.data_quality,
                "consensus ready"
            );
            print_json(&consensus)
        }
        Command::Report { symbol, format, out } => {
            let format: ReportFormat = format.parse()?;
            let builder = ReportBuilder::from_settings(aggregator, settings);
            let rendered = builder.generate(&symbol, format).await?;

            match out {
                Some(path) => {
                    std::fs::write(&path, &rendered.body)
                        .with_context(|| format!("failed to write report to {}", path.display()))?;
                    tracing::info!(
                        report_id = %rendered.report.report_id,
                        path = %path.display(),
                        "report written"
                    );
                }
                None => println!("{}", rendered.body),
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn init_sentry(settings: &acera_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: settings.environment.clone().map(Into::into),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_subcommand_parses_format_and_output() {
        let args = Args::try_parse_from(["acera", "report", "aapl", "--format", "excel", "--out", "r.csv"]).unwrap();
        match args.command {
            Command::Report { symbol, format, out } => {
                assert_eq!(symbol, "aapl");
                assert_eq!(format.parse::<ReportFormat>().unwrap(), ReportFormat::Csv);
                assert_eq!(out, Some(PathBuf::from("r.csv")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn news_limit_defaults_to_ten() {
        let args = Args::try_parse_from(["acera", "news", "NVDA"]).unwrap();
        assert!(matches!(args.command, Command::News { limit: 10, .. }));
    }

    #[test]
    fn symbol_is_required() {
        assert!(Args::try_parse_from(["acera", "quote"]).is_err());
    }
}
