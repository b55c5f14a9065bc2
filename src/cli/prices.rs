use super::ui;
use crate::core::asset::{Asset, AssetCategory, Provenance};
use crate::core::feed::{FeedView, MarketData};
use anyhow::Result;
use comfy_table::Cell;

/// Headline assets shown above the table.
const TOP_ASSETS: &[&str] = &["usd", "gold_18k", "btc"];

const FALLBACK_NOTICE: &str =
    "Live market data is unavailable, some prices are derived or placeholders.";

/// Loads the feed and prints it. `force` bypasses the cache; if that fetch
/// fails while live data is displayed, the error is reported and the
/// previous view is printed instead.
pub async fn run(market: &MarketData, force: bool, category: Option<AssetCategory>) -> Result<()> {
    let spinner = ui::new_spinner("Fetching prices...");
    let view = if force {
        match market.refresh().await {
            Ok(view) => view,
            Err(e) => {
                spinner.finish_and_clear();
                eprintln!("{}", ui::style_text(&format!("{e}"), ui::StyleType::Error));
                println!("{}", render(&market.view().await, category));
                return Ok(());
            }
        }
    } else {
        market.load().await
    };
    spinner.finish_and_clear();

    println!("{}", render(&view, category));
    Ok(())
}

/// The full dashboard: headline, optional fallback banner, price table.
pub fn render(view: &FeedView, category: Option<AssetCategory>) -> String {
    let mut out = String::new();

    if view.fallback_mode {
        out.push_str(&ui::style_text(FALLBACK_NOTICE, ui::StyleType::Warning));
        out.push_str("\n\n");
    }

    let headline = top_assets_line(&view.assets);
    if !headline.is_empty() {
        out.push_str(&headline);
        out.push_str("\n\n");
    }

    let assets: Vec<&Asset> = view
        .assets
        .iter()
        .filter(|a| category.is_none_or(|c| a.category() == c))
        .collect();

    if assets.is_empty() {
        out.push_str("No prices to display.");
    } else {
        out.push_str(&price_table(&assets));
    }

    if let Some(captured_at) = view.captured_at {
        out.push('\n');
        out.push_str(&ui::style_text(
            &format!("Updated {}", captured_at.format("%Y-%m-%d %H:%M:%S UTC")),
            ui::StyleType::Subtle,
        ));
    }
    out
}

fn top_assets_line(assets: &[Asset]) -> String {
    TOP_ASSETS
        .iter()
        .filter_map(|id| assets.iter().find(|a| a.id == *id))
        .map(|a| {
            format!(
                "{} {} ({})",
                ui::style_text(&a.symbol, ui::StyleType::Label),
                ui::style_text(&ui::format_toman(a.price.major()), ui::StyleType::Value),
                ui::format_percent(a.change_24h())
            )
        })
        .collect::<Vec<_>>()
        .join("   ")
}

pub fn price_table(assets: &[&Asset]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Asset"),
        ui::header_cell("Symbol"),
        ui::header_cell("Category"),
        ui::header_cell("Price (Toman)"),
        ui::header_cell("Price (Rial)"),
        ui::header_cell("24h"),
        ui::header_cell("Source"),
    ]);

    for asset in assets {
        let name = if asset.name_local.is_empty() {
            asset.name_global.clone()
        } else {
            format!("{} / {}", asset.name_local, asset.name_global)
        };
        let source = match asset.provenance() {
            Provenance::Demo => Cell::new("demo").fg(comfy_table::Color::Yellow),
            other => Cell::new(other.to_string()),
        };

        table.add_row(vec![
            Cell::new(name),
            Cell::new(&asset.symbol),
            Cell::new(asset.category().to_string()),
            ui::price_cell(asset.price.major()),
            ui::price_cell(asset.price.minor()),
            ui::change_cell(asset.change_24h()),
            source,
        ]);
    }
    table.to_string()
}
