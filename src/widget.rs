//! Embeddable widget configuration: the query parameters a widget page reads
//! and the HTML snippet site owners paste.

use crate::core::asset::Asset;
use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use std::fmt::Display;
use std::str::FromStr;

pub const DEFAULT_ASSETS: &[&str] = &["usd", "eur", "gold_18k", "btc"];

/// Assets shown when a widget lists none.
const FALLBACK_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Grid,
    Ticker,
    Table,
}

impl Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DisplayMode::Grid => "grid",
                DisplayMode::Ticker => "ticker",
                DisplayMode::Table => "table",
            }
        )
    }
}

impl FromStr for DisplayMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(DisplayMode::Grid),
            "ticker" => Ok(DisplayMode::Ticker),
            "table" => Ok(DisplayMode::Table),
            _ => Err(anyhow!("Invalid widget type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Theme::Light => "light",
                Theme::Dark => "dark",
            }
        )
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow!("Invalid widget theme: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub display_mode: DisplayMode,
    asset_ids: Vec<String>,
    pub theme: Theme,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self::new(DisplayMode::default(), DEFAULT_ASSETS.iter().copied(), Theme::default())
    }
}

impl WidgetConfig {
    /// Ids are lowercased; blanks and repeats are dropped, first occurrence
    /// keeps its position.
    pub fn new<I, S>(display_mode: DisplayMode, asset_ids: I, theme: Theme) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids: Vec<String> = Vec::new();
        for id in asset_ids {
            let id = id.as_ref().trim().to_lowercase();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        Self {
            display_mode,
            asset_ids: ids,
            theme,
        }
    }

    pub fn asset_ids(&self) -> &[String] {
        &self.asset_ids
    }

    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.display_mode.to_string()),
            ("assets", self.asset_ids.join(",")),
            ("theme", self.theme.to_string()),
        ]
    }

    /// Reads `type`, `assets` and `theme` from a URL. Unknown values fall
    /// back to grid and light; a missing asset list means none selected.
    pub fn from_url(url: &Url) -> Self {
        let mut display_mode = DisplayMode::default();
        let mut theme = Theme::default();
        let mut assets = String::new();

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "type" => display_mode = value.parse().unwrap_or_default(),
                "theme" => theme = value.parse().unwrap_or_default(),
                "assets" => assets = value.into_owned(),
                _ => {}
            }
        }

        Self::new(display_mode, assets.split(','), theme)
    }

    /// Same as [`WidgetConfig::from_url`] for a bare query string, with or
    /// without the leading `?`.
    pub fn from_query(query: &str) -> Result<Self> {
        let mut url = Url::parse("http://localhost/widget").context("Invalid base URL")?;
        url.set_query(Some(query.trim_start_matches('?')));
        Ok(Self::from_url(&url))
    }

    /// The widget page URL under `origin`.
    pub fn widget_url(&self, origin: &str) -> Result<Url> {
        let base = format!("{}/widget", origin.trim_end_matches('/'));
        Url::parse_with_params(&base, self.to_query())
            .with_context(|| format!("Invalid widget origin: {origin}"))
    }

    pub fn embed_snippet(&self, origin: &str) -> String {
        let script_url = format!("{}/widget-loader.js", origin.trim_end_matches('/'));
        format!(
            "<div\n  class=\"nerkh-widget\"\n  data-type=\"{}\"\n  data-assets=\"{}\"\n  data-theme=\"{}\"\n></div>\n<script src=\"{}\" async></script>",
            self.display_mode,
            escape_attr(&self.asset_ids.join(",")),
            self.theme,
            escape_attr(&script_url)
        )
    }

    /// The listed assets present in `assets`, in listing order. With no ids
    /// listed, the first few assets of the snapshot.
    pub fn select<'a>(&self, assets: &'a [Asset]) -> Vec<&'a Asset> {
        if self.asset_ids.is_empty() {
            return assets.iter().take(FALLBACK_COUNT).collect();
        }
        self.asset_ids
            .iter()
            .filter_map(|id| assets.iter().find(|a| &a.id == id))
            .collect()
    }
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::demo::demo_snapshot;
    use chrono::Utc;

    #[test]
    fn test_default_selection() {
        let config = WidgetConfig::default();
        assert_eq!(config.display_mode, DisplayMode::Grid);
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.asset_ids(), &["usd", "eur", "gold_18k", "btc"]);
    }

    #[test]
    fn test_ids_are_normalized() {
        let config = WidgetConfig::new(
            DisplayMode::Ticker,
            ["BTC", "usd", "", " btc ", "Eth"],
            Theme::Dark,
        );
        assert_eq!(config.asset_ids(), &["btc", "usd", "eth"]);
    }

    #[test]
    fn test_query_parsing() {
        let config = WidgetConfig::from_query("?type=ticker&assets=usd,btc&theme=dark").unwrap();
        assert_eq!(config.display_mode, DisplayMode::Ticker);
        assert_eq!(config.asset_ids(), &["usd", "btc"]);
        assert_eq!(config.theme, Theme::Dark);

        let config = WidgetConfig::from_query("type=carousel&theme=neon").unwrap();
        assert_eq!(config.display_mode, DisplayMode::Grid);
        assert_eq!(config.theme, Theme::Light);
        assert!(config.asset_ids().is_empty());
    }

    #[test]
    fn test_widget_url_carries_config() {
        let config = WidgetConfig::new(DisplayMode::Table, ["usd", "gold_18k"], Theme::Light);
        let url = config.widget_url("https://nerkh.example/").unwrap();

        assert_eq!(url.path(), "/widget");
        assert_eq!(WidgetConfig::from_url(&url), config);
    }

    #[test]
    fn test_embed_snippet() {
        let snippet = WidgetConfig::default().embed_snippet("https://nerkh.example");
        assert!(snippet.contains(r#"class="nerkh-widget""#));
        assert!(snippet.contains(r#"data-type="grid""#));
        assert!(snippet.contains(r#"data-assets="usd,eur,gold_18k,btc""#));
        assert!(snippet.contains(r#"data-theme="light""#));
        assert!(snippet.ends_with(
            r#"<script src="https://nerkh.example/widget-loader.js" async></script>"#
        ));
    }

    #[test]
    fn test_snippet_escapes_attributes() {
        let config = WidgetConfig::new(DisplayMode::Grid, [r#"a"><script>"#], Theme::Light);
        let snippet = config.embed_snippet("https://nerkh.example");
        assert!(!snippet.contains("<script>\""));
        assert!(snippet.contains("a&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn test_select() {
        let snapshot = demo_snapshot(Utc::now());

        let config = WidgetConfig::new(DisplayMode::Grid, ["btc", "missing", "usd"], Theme::Light);
        let ids: Vec<&str> = config
            .select(&snapshot.assets)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["btc", "usd"]);

        let empty = WidgetConfig::new(DisplayMode::Grid, Vec::<String>::new(), Theme::Light);
        let selected = empty.select(&snapshot.assets);
        assert_eq!(selected.len(), 4);
        assert_eq!(selected[0].id, snapshot.assets[0].id);
    }
}
