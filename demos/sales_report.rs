use anyhow::Context;
use chrono::Local;
use pos_sales_analytics::export::{
    client_summary_table, duplicate_groups_table, growth_table, metrics_table, write_bundle,
};
use pos_sales_analytics::{
    Alert, DatePreset, FilterSet, ForecastOutcome, PipelineConfig, SalesPipeline,
};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new("app").join("data").join("Orders_pos.xlsx"));
    let use_receivables = args.any(|a| a == "--receivables");

    println!("📊 POS Sales Report");
    println!("═══════════════════════════════════════════════════════════════\n");

    let config = if use_receivables {
        PipelineConfig::receivables_total()
    } else {
        PipelineConfig::default()
    };
    let pipeline = SalesPipeline::new(config).context("invalid pipeline configuration")?;

    let dataset = pipeline.load_path_or_empty(&input);
    if let Some(error) = &dataset.report.error {
        println!("⚠️  No data loaded from {:?}: {}", input, error);
        return Ok(());
    }

    let report = &dataset.report;
    println!("📥 Loaded {} order lines from {:?}", dataset.len(), input);
    println!("   Rows read:          {}", report.rows_read);
    println!("   Invalid dates:      {}", report.invalid_dates);
    println!("   Duplicate rows:     {}", report.duplicate_rows_removed);
    if !report.missing_columns.is_empty() {
        println!("   Defaulted columns:  {}", report.missing_columns.join(", "));
    }
    println!();

    let options = dataset.filter_options();
    let mut filters = FilterSet::new();
    if let Some((start, end)) = options.date_range(DatePreset::LastMonth) {
        println!("🗓️  Analyzing {} to {}\n", start, end);
        filters = filters.with_date_range(start, end);
    }

    let analysis = pipeline.analyze(&dataset, &filters);
    let labels = &pipeline.config().labels;
    let metrics = &analysis.metrics;

    println!("💰 {}: ₡{:.2}", labels.total_sales, metrics.total_sales);
    println!("🧾 {}: {}", labels.orders, metrics.orders);
    println!("📈 {}: ₡{:.2}", labels.average_order_value, metrics.average_order_value);
    println!("👥 {}: {}", labels.unique_clients, metrics.unique_clients);
    println!(
        "🏆 {}: {}",
        labels.most_sold,
        metrics.most_sold.as_deref().unwrap_or(&labels.not_available)
    );
    println!();

    match &analysis.forecast {
        ForecastOutcome::Forecast(forecast) => {
            println!("🔮 7-day forecast (slope {:.2}/day)", forecast.slope);
            for point in &forecast.points {
                println!(
                    "   {}  {:>12.2}  [{:.2} – {:.2}]",
                    point.date, point.predicted, point.lower, point.upper
                );
            }
        }
        ForecastOutcome::InsufficientData => println!("🔮 Not enough days for a forecast"),
    }
    println!();

    if let Some(alert) = Alert::duplicates(&analysis.duplicates) {
        println!("🚨 {}\n{}\n", alert.subject, alert.body);
    }
    if let Some(alert) = Alert::unusual_clients(&analysis.clients) {
        println!("🚨 {}\n{}\n", alert.subject, alert.body);
    }

    let out_dir = Path::new("app").join("reports");
    let now = Local::now().naive_local();
    let top_n = pipeline.config().forecast.growth_top_n;
    let tables = [
        ("ventas_por_cliente", client_summary_table(&analysis.clients, labels)),
        ("almuerzos_duplicados", duplicate_groups_table(&analysis.duplicates, labels)),
        ("crecimiento_productos", growth_table(&analysis.growth, top_n, labels)),
        ("resumen_ventas", metrics_table(metrics, labels)),
    ];
    for (stem, table) in &tables {
        let written = write_bundle(&out_dir, stem, table, now)?;
        for path in written {
            println!("✅ Wrote {}", path.display());
        }
    }

    Ok(())
}
