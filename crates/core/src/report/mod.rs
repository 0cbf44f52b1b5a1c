pub mod render;

use crate::analysis::aggregator::Aggregator;
use crate::analysis::valuation::{DcfModel, PriceMetrics, VolatilityMetrics};
use crate::analysis::MarketSnapshot;
use crate::config::Settings;
use crate::domain::analysis::{ConsensusReport, DataQuality};
use crate::domain::market::{CompanyProfile, Quote};
use crate::domain::normalize_symbol;
use crate::llm::openai::ChatCompletionsClient;
use crate::llm::{ChatPrompt, LlmClient};
use anyhow::{ensure, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

const HISTORY_DAYS: usize = 252;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a senior equity research analyst writing the executive summary of a research report.
Write one paragraph of four to six sentences in plain prose. No headings, no bullet points.
Use only the figures provided. Do not invent numbers.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Csv,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported report type: {0:?} (expected json, csv, excel, markdown or pdf)")]
pub struct UnknownReportFormat(pub String);

impl FromStr for ReportFormat {
    type Err = UnknownReportFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" | "excel" | "xlsx" => Ok(Self::Csv),
            "markdown" | "md" | "pdf" => Ok(Self::Markdown),
            _ => Err(UnknownReportFormat(s.to_string())),
        }
    }
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Markdown => "md",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Llm,
    Template,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub report_id: String,
    pub symbol: String,
    pub format: ReportFormat,
    pub generated_at: DateTime<Utc>,
    pub quote: Quote,
    pub profile: CompanyProfile,
    pub consensus: ConsensusReport,
    pub valuation: DcfModel,
    pub price_metrics: Option<PriceMetrics>,
    pub volatility: Option<VolatilityMetrics>,
    pub executive_summary: String,
    pub summary_source: SummarySource,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedReport {
    #[serde(flatten)]
    pub report: ResearchReport,
    pub content_type: &'static str,
    pub file_name: String,
    pub body: String,
}

pub fn report_id(symbol: &str, at: DateTime<Utc>) -> String {
    format!("report_{}_{}", symbol, at.format("%Y%m%d_%H%M%S"))
}

/// Assembles consensus, valuation and risk metrics into a rendered document.
#[derive(Clone)]
pub struct ReportBuilder {
    aggregator: Aggregator,
    llm: Option<Arc<dyn LlmClient>>,
}

impl ReportBuilder {
    pub fn new(aggregator: Aggregator, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { aggregator, llm }
    }

    pub fn from_settings(aggregator: Aggregator, settings: &Settings) -> Self {
        let llm = match ChatCompletionsClient::openai_from_settings(settings) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn LlmClient>),
            Err(err) => {
                tracing::warn!(error = %err, "executive summaries will use the template");
                None
            }
        };
        Self::new(aggregator, llm)
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub async fn generate(&self, symbol: &str, format: ReportFormat) -> anyhow::Result<RenderedReport> {
        let symbol = normalize_symbol(symbol);
        ensure!(!symbol.is_empty(), "symbol is required");

        let (snapshot, history) = tokio::join!(
            self.aggregator.fetch_snapshot(&symbol),
            self.aggregator.market().get_daily_history(&symbol, HISTORY_DAYS),
        );
        let consensus = self.aggregator.aggregate_snapshot(&snapshot).await;

        let valuation = DcfModel::for_profile(&snapshot.profile, snapshot.quote.price)
            .with_context(|| format!("failed to build DCF model for {symbol}"))?;
        let price_metrics = PriceMetrics::from_history(&history, snapshot.quote.price);
        let volatility = VolatilityMetrics::from_history(&history);

        let (executive_summary, summary_source) =
            self.executive_summary(&snapshot, &consensus, &valuation).await;

        let generated_at = Utc::now();
        let report = ResearchReport {
            report_id: report_id(&symbol, generated_at),
            data_quality: snapshot.data_quality(),
            symbol,
            format,
            generated_at,
            quote: snapshot.quote,
            profile: snapshot.profile,
            consensus,
            valuation,
            price_metrics,
            volatility,
            executive_summary,
            summary_source,
        };

        let body = render::render(&report)
            .with_context(|| format!("failed to render {} report", format.as_str()))?;
        tracing::info!(
            report_id = %report.report_id,
            format = format.as_str(),
            summary_source = ?report.summary_source,
            data_quality = ?report.data_quality,
            "report generated"
        );

        Ok(RenderedReport {
            file_name: format!("{}.{}", report.report_id, format.extension()),
            content_type: format.content_type(),
            report,
            body,
        })
    }

    async fn executive_summary(
        &self,
        snapshot: &MarketSnapshot,
        consensus: &ConsensusReport,
        valuation: &DcfModel,
    ) -> (String, SummarySource) {
        let template = template_summary(snapshot, consensus, valuation);
        let Some(llm) = &self.llm else {
            return (template, SummarySource::Template);
        };

        let prompt = ChatPrompt::new(SUMMARY_SYSTEM_PROMPT, summary_facts(snapshot, consensus, valuation))
            .with_temperature(0.3)
            .with_max_tokens(500);

        match llm.complete(prompt).await {
            Ok(text) if !text.trim().is_empty() => (text.trim().to_string(), SummarySource::Llm),
            Ok(_) => {
                tracing::warn!(symbol = %snapshot.symbol, "empty executive summary; using template");
                (template, SummarySource::Template)
            }
            Err(err) => {
                tracing::warn!(symbol = %snapshot.symbol, error = %err, "executive summary failed; using template");
                (template, SummarySource::Template)
            }
        }
    }
}

fn display_name(snapshot: &MarketSnapshot) -> String {
    if snapshot.profile.name.trim().is_empty() {
        snapshot.symbol.clone()
    } else {
        format!("{} ({})", snapshot.profile.name, snapshot.symbol)
    }
}

fn summary_facts(snapshot: &MarketSnapshot, consensus: &ConsensusReport, valuation: &DcfModel) -> String {
    let mut facts = vec![
        format!("Company: {}", display_name(snapshot)),
        format!(
            "Price: ${:.2} ({:+.2}% on the day)",
            snapshot.quote.price, snapshot.quote.change_percent
        ),
        format!(
            "Analyst panel: {} analysts, consensus {}, {:.1}% agreement, {:.1}% average confidence",
            consensus.opinions.len(),
            consensus.consensus_rating,
            consensus.agreement_level,
            consensus.average_confidence
        ),
        format!("DCF fair value: ${:.2} per share", valuation.price_per_share),
    ];
    if let Some(sector) = &snapshot.profile.sector {
        facts.push(format!("Sector: {sector}"));
    }
    if let Some(target) = consensus.average_price_target {
        facts.push(format!("Average analyst price target: ${target:.2}"));
    }
    if let Some(upside) = valuation.upside_pct {
        facts.push(format!("DCF upside versus current price: {upside:+.1}%"));
    }
    for opinion in consensus.opinions.iter().filter(|o| !o.fallback) {
        if let Some(point) = opinion.key_points.first() {
            facts.push(format!("{} ({}): {}", opinion.analyst_name, opinion.specialization, point));
        }
    }
    format!(
        "Write the executive summary for {}.\n\n{}",
        snapshot.symbol,
        facts.join("\n")
    )
}

pub fn template_summary(
    snapshot: &MarketSnapshot,
    consensus: &ConsensusReport,
    valuation: &DcfModel,
) -> String {
    let mut sentences = vec![format!(
        "{} last traded at ${:.2} ({:+.2}%).",
        display_name(snapshot),
        snapshot.quote.price,
        snapshot.quote.change_percent
    )];
    sentences.push(format!(
        "Our {}-analyst panel rates the stock {} with {:.0}% agreement and an average confidence of {:.1}%.",
        consensus.opinions.len(),
        consensus.consensus_rating,
        consensus.agreement_level,
        consensus.average_confidence
    ));
    if let Some(target) = consensus.average_price_target {
        sentences.push(format!("The average twelve-month price target is ${target:.2}."));
    }
    sentences.push(match valuation.upside_pct {
        Some(upside) => format!(
            "The five-year DCF implies a fair value of ${:.2} per share, {:+.1}% versus the current price.",
            valuation.price_per_share, upside
        ),
        None => format!(
            "The five-year DCF implies a fair value of ${:.2} per share.",
            valuation.price_per_share
        ),
    });
    if snapshot.data_quality() != DataQuality::Live {
        sentences.push(
            "Some inputs were unavailable and have been replaced with placeholder data.".to_string(),
        );
    }
    sentences.join(" ")
}
