use super::{prices, ui};
use crate::core::feed::MarketData;
use crate::widget::WidgetConfig;
use anyhow::Result;

/// Prints the embed snippet for `config` and a preview of what it shows.
pub async fn run(market: &MarketData, config: &WidgetConfig, origin: &str) -> Result<()> {
    let url = config.widget_url(origin)?;

    println!("{}", ui::style_text("Embed code", ui::StyleType::Title));
    println!("\n{}\n", config.embed_snippet(origin));
    println!(
        "{} {}",
        ui::style_text("Widget page:", ui::StyleType::Label),
        url
    );

    let view = market.load().await;
    let selected = config.select(&view.assets);

    ui::print_separator();
    println!(
        "{} ({}, {})",
        ui::style_text("Preview", ui::StyleType::Title),
        config.display_mode,
        config.theme
    );
    if selected.is_empty() {
        println!("None of the selected assets are in the current feed.");
    } else {
        println!("{}", prices::price_table(&selected));
    }
    Ok(())
}
