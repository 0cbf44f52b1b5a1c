use crate::report::{ReportFormat, ResearchReport};
use anyhow::Context;
use std::fmt::Write;

pub fn render(report: &ResearchReport) -> anyhow::Result<String> {
    match report.format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(report).context("failed to serialize report as json")
        }
        ReportFormat::Csv => render_csv(report),
        ReportFormat::Markdown => render_markdown(report),
    }
}

fn money(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Spreadsheet export: a summary block, the DCF projection table and the
/// analyst opinion table, each introduced by a one-cell section row.
pub fn render_csv(report: &ResearchReport) -> anyhow::Result<String> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let consensus = &report.consensus;
    let dcf = &report.valuation;

    wtr.write_record(["Summary"])?;
    let summary_rows = [
        ("Symbol", report.symbol.clone()),
        ("Company", report.profile.name.clone()),
        ("Report ID", report.report_id.clone()),
        ("Generated At", report.generated_at.to_rfc3339()),
        ("Current Price", format!("{:.2}", report.quote.price)),
        ("Consensus Rating", consensus.consensus_rating.to_string()),
        ("Agreement Level (%)", format!("{:.1}", consensus.agreement_level)),
        ("Average Confidence (%)", format!("{:.1}", consensus.average_confidence)),
        ("Average Price Target", money(consensus.average_price_target)),
        ("DCF Fair Value", format!("{:.2}", dcf.price_per_share)),
        ("DCF Upside (%)", dcf.upside_pct.map(|u| format!("{u:.1}")).unwrap_or_default()),
        ("Data Quality", format!("{:?}", report.data_quality).to_lowercase()),
    ];
    for (label, value) in &summary_rows {
        wtr.write_record([*label, value.as_str()])?;
    }

    wtr.write_record(["DCF Model"])?;
    wtr.write_record([
        "Year",
        "Revenue",
        "EBITDA",
        "EBIT",
        "NOPAT",
        "Free Cash Flow",
        "Discount Factor",
        "PV of FCF",
    ])?;
    for p in &dcf.projections {
        wtr.write_record([
            p.year.to_string(),
            format!("{:.0}", p.revenue),
            format!("{:.0}", p.ebitda),
            format!("{:.0}", p.ebit),
            format!("{:.0}", p.nopat),
            format!("{:.0}", p.fcf),
            format!("{:.4}", p.discount_factor),
            format!("{:.0}", p.pv_fcf),
        ])?;
    }
    wtr.write_record(["Terminal Value", format!("{:.0}", dcf.terminal_value).as_str()])?;
    wtr.write_record(["PV of Terminal Value", format!("{:.0}", dcf.pv_terminal_value).as_str()])?;
    wtr.write_record(["Enterprise Value", format!("{:.0}", dcf.enterprise_value).as_str()])?;
    wtr.write_record(["Shares Outstanding", format!("{:.0}", dcf.shares_outstanding).as_str()])?;

    wtr.write_record(["Analyst Opinions"])?;
    wtr.write_record([
        "Analyst",
        "Specialization",
        "Rating",
        "Confidence",
        "Price Target",
        "Timeframe",
        "Placeholder",
    ])?;
    for o in &consensus.opinions {
        wtr.write_record([
            o.analyst_name.clone(),
            o.specialization.clone(),
            o.rating.to_string(),
            format!("{:.1}", o.confidence),
            money(o.price_target),
            o.timeframe.clone(),
            o.fallback.to_string(),
        ])?;
    }

    wtr.flush().context("failed to flush csv writer")?;
    let bytes = wtr
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to finish csv export: {}", err.error()))?;
    String::from_utf8(bytes).context("csv export is not valid utf-8")
}

pub fn render_markdown(report: &ResearchReport) -> anyhow::Result<String> {
    let mut out = String::new();
    write_markdown(&mut out, report).context("failed to render markdown report")?;
    Ok(out)
}

fn write_markdown(out: &mut impl Write, report: &ResearchReport) -> std::fmt::Result {
    let consensus = &report.consensus;
    let dcf = &report.valuation;

    writeln!(out, "# Equity Research Report: {}", report.symbol)?;
    writeln!(out)?;
    if !report.profile.name.is_empty() {
        writeln!(out, "**{}**", report.profile.name)?;
    }
    writeln!(
        out,
        "Report `{}` generated {} (data quality: {:?})",
        report.report_id,
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.data_quality
    )?;
    writeln!(out)?;

    writeln!(out, "## Executive Summary")?;
    writeln!(out)?;
    writeln!(out, "{}", report.executive_summary)?;
    writeln!(out)?;

    writeln!(out, "## Consensus")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|---|---|")?;
    writeln!(out, "| Rating | {} |", consensus.consensus_rating)?;
    writeln!(out, "| Agreement | {:.1}% |", consensus.agreement_level)?;
    writeln!(out, "| Average confidence | {:.1}% |", consensus.average_confidence)?;
    if let Some(target) = consensus.average_price_target {
        writeln!(out, "| Average price target | ${target:.2} |")?;
    }
    writeln!(out, "| Current price | ${:.2} |", report.quote.price)?;
    writeln!(out)?;

    writeln!(out, "## Analyst Opinions")?;
    writeln!(out)?;
    for o in &consensus.opinions {
        let target = o
            .price_target
            .map(|t| format!(", target ${t:.2}"))
            .unwrap_or_default();
        writeln!(
            out,
            "### {} ({})\n\n{} at {:.1}% confidence{}, {} horizon.\n",
            o.analyst_name, o.specialization, o.rating, o.confidence, target, o.timeframe
        )?;
        for point in &o.key_points {
            writeln!(out, "- {point}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## DCF Valuation")?;
    writeln!(out)?;
    writeln!(out, "| Year | Revenue | FCF | PV of FCF |")?;
    writeln!(out, "|---|---|---|---|")?;
    for p in &dcf.projections {
        writeln!(
            out,
            "| {} | {:.1}M | {:.1}M | {:.1}M |",
            p.year,
            p.revenue / 1e6,
            p.fcf / 1e6,
            p.pv_fcf / 1e6
        )?;
    }
    writeln!(out)?;
    writeln!(out, "- Enterprise value: {:.1}M", dcf.enterprise_value / 1e6)?;
    writeln!(out, "- Fair value per share: ${:.2}", dcf.price_per_share)?;
    if let Some(upside) = dcf.upside_pct {
        writeln!(out, "- Upside versus current price: {upside:+.1}%")?;
    }
    writeln!(out)?;

    if report.price_metrics.is_some() || report.volatility.is_some() {
        writeln!(out, "## Price & Risk")?;
        writeln!(out)?;
        if let Some(pm) = &report.price_metrics {
            writeln!(out, "- 52-week range: ${:.2} to ${:.2}", pm.low_52w, pm.high_52w)?;
            writeln!(out, "- Average daily volume: {:.0}", pm.avg_daily_volume)?;
        }
        if let Some(v) = &report.volatility {
            writeln!(out, "- Annualised volatility: {:.1}%", v.annual_volatility * 100.0)?;
            writeln!(out, "- Sharpe ratio: {:.2}", v.sharpe_ratio)?;
        }
    }

    Ok(())
}
