use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use slog::{debug, info, Logger};
use stateset_forecast::{
    config::ForecastConfig,
    logging::{setup_logger, LoggerConfig},
    ml::{
        forecasting::ForecastMethod,
        restock::RestockPlan,
        trends::{InventorySummary, TrendReport},
    },
    services::{
        catalog::InMemoryCatalog,
        forecasting::{ForecastingService, ProductForecast},
    },
};

#[derive(Parser)]
#[command(
    name = "stateset-forecast",
    version,
    about = "Demand forecasts, restock advice and sales trends for a product file"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, action = ArgAction::SetTrue, help = "Log debug detail to stderr")]
    verbose: bool,
    #[arg(long, short = 'p', global = true, default_value = "products.json", help = "JSON array of products")]
    products: PathBuf,
    #[arg(long, global = true, help = "Seed for forecast noise, for reproducible output")]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast daily demand for one product
    Forecast(ForecastArgs),
    /// Recommend how many units to reorder
    Restock(RestockArgs),
    /// Sales trends across all products
    Trends,
    /// Stock-health summary across all products
    Summary,
}

#[derive(Args)]
struct ForecastArgs {
    product_id: String,
    #[arg(long, short = 'd')]
    days: Option<i64>,
    #[arg(long, short = 'm', default_value = "seasonal")]
    method: String,
}

#[derive(Args)]
struct RestockArgs {
    product_id: String,
    #[arg(long, action = ArgAction::SetTrue)]
    trending: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logger = setup_logger(LoggerConfig::default().verbose(cli.verbose));

    let catalog = InMemoryCatalog::load_from_file(&cli.products)
        .with_context(|| format!("failed to load products from {}", cli.products.display()))?;
    info!(logger, "catalog loaded"; "products" => catalog.len(), "path" => %cli.products.display());

    let config = ForecastConfig {
        noise_seed: cli.seed,
        ..ForecastConfig::default()
    };
    let service = ForecastingService::from_config(Arc::new(catalog), &config);

    match cli.command {
        Commands::Forecast(args) => handle_forecast(&service, &logger, args, cli.json).await?,
        Commands::Restock(args) => handle_restock(&service, &logger, args, cli.json).await?,
        Commands::Trends => handle_trends(&service, cli.json).await?,
        Commands::Summary => handle_summary(&service, cli.json).await?,
    }

    Ok(())
}

async fn handle_forecast(
    service: &ForecastingService,
    logger: &Logger,
    args: ForecastArgs,
    json: bool,
) -> Result<()> {
    let method = ForecastMethod::parse_lenient(&args.method);
    let forecast = service
        .forecast(&args.product_id, args.days, Some(method))
        .await
        .context("failed to forecast demand")?;
    debug!(logger, "forecast computed";
        "requested" => %forecast.requested_method,
        "used" => %forecast.method_used);

    if json {
        return print_json(&forecast);
    }
    render_forecast(&forecast);
    Ok(())
}

async fn handle_restock(
    service: &ForecastingService,
    logger: &Logger,
    args: RestockArgs,
    json: bool,
) -> Result<()> {
    let plan = service
        .restock(&args.product_id, args.trending)
        .await
        .context("failed to compute restock recommendation")?;
    debug!(logger, "restock computed"; "tier" => %plan.forecast_tier);

    if json {
        return print_json(&plan);
    }
    render_restock(&plan);
    Ok(())
}

async fn handle_trends(service: &ForecastingService, json: bool) -> Result<()> {
    let report = service.trends().await.context("failed to aggregate trends")?;
    if json {
        return print_json(&report);
    }
    render_trends(&report);
    Ok(())
}

async fn handle_summary(service: &ForecastingService, json: bool) -> Result<()> {
    let summary = service
        .inventory_summary()
        .await
        .context("failed to summarize inventory")?;
    if json {
        return print_json(&summary);
    }
    render_summary(&summary);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_forecast(forecast: &ProductForecast) {
    println!(
        "Forecast for {} • {} days • method {} • total {:.0} • avg {:.2}/day",
        forecast.product_id,
        forecast.days,
        forecast.method_used,
        forecast.total_demand,
        forecast.avg_daily_demand
    );
    for (day, value) in forecast.forecast.iter().enumerate() {
        println!("  day {:>3}: {:.0}", day + 1, value);
    }
}

fn render_restock(plan: &RestockPlan) {
    println!(
        "Restock {} • order {} units{}",
        plan.product_id,
        plan.recommended_quantity,
        if plan.is_trending { " (trending)" } else { "" }
    );
    println!(
        "  avg demand {:.2}/day • safety stock {:.1} • reorder point {:.1} • on hand {}",
        plan.avg_daily_demand, plan.safety_stock, plan.reorder_point, plan.current_stock
    );
}

fn render_trends(report: &TrendReport) {
    println!("Top selling products:");
    for record in &report.top_selling_products {
        println!(
            "- {} ({}) • {:.2}/day • growth {:+.2}% • stock {} [{}]",
            record.name,
            record.category,
            record.avg_daily_sales,
            record.growth_rate,
            record.current_stock,
            record.stock_status
        );
    }
    println!("Categories:");
    for category in &report.category_trends {
        println!(
            "- {} • total {} • avg growth {:+.2}% over {} products",
            category.name, category.total_sales, category.avg_growth, category.product_count
        );
    }
    println!("Days with sales: {}", report.sales_trend.len());
}

fn render_summary(summary: &InventorySummary) {
    println!(
        "{} products • {} low stock • {} out of stock",
        summary.total_products, summary.low_stock_count, summary.out_of_stock_count
    );
    for (category, count) in &summary.categories {
        println!("- {}: {} products", category, count);
    }
    if !summary.low_stock_items.is_empty() {
        println!("Low stock:");
        for item in &summary.low_stock_items {
            println!(
                "- {} {} • {} on hand, reorder at {}",
                item.id, item.name, item.current_stock, item.reorder_level
            );
        }
    }
    if !summary.trending_products.is_empty() {
        println!("Best sellers:");
        for product in &summary.trending_products {
            println!("- {} {} • {} sold", product.id, product.name, product.total_sales);
        }
    }
}
