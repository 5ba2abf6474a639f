// ============================================================================
// Dashboard - Rendu de l'écran d'accueil
// ============================================================================
// Dessine l'interface TUI en utilisant les widgets de ratatui
//
//   ┌──────────────────── header ────────────────────┐
//   │ overview (coin par défaut) │                    │
//   ├────────────────────────────┤    live panel      │
//   │ trending / recherche       │ (session SyncCore) │
//   └──────────────────── footer ────────────────────┘
//
// CONCEPTS RATATUI :
// 1. Layout : découpage en zones (vertical puis horizontal)
// 2. Widgets : Block, Paragraph, List, Table
// 3. Style : vert / rouge selon la variation
// ============================================================================

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table},
    Frame,
};
use tokio::time::Instant;

use crate::app::{App, Listing, Screen};
use crate::models::{Candle, PriceSnapshot, Trade, TradeKind};
use crate::sync::{Feed, FeedPhase};

/// Dessine l'interface complète
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Contenu
            Constraint::Length(4), // Footer
        ])
        .split(frame.size());

    render_header(frame, app, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(columns[0]);

    render_overview(frame, app, left[0]);
    render_listing(frame, app, left[1]);
    render_live(frame, app, columns[1]);

    match app.current_screen {
        Screen::Home => render_footer(frame, app, chunks[2]),
        Screen::InputMode => render_input_footer(frame, app, chunks[2]),
    }
}

// ============================================================================
// Helpers de formatage
// ============================================================================

/// Prix en USD, plus de décimales pour les petits montants
pub fn format_usd(value: f64) -> String {
    if value.abs() >= 1.0 {
        format!("${:.2}", value)
    } else {
        format!("${:.6}", value)
    }
}

/// Grand montant abrégé : 1.23B, 45.6M, 7.8K
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}

fn change_style(change: f64) -> Style {
    if change >= 0.0 {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    }
}

fn change_span(change: f64) -> Span<'static> {
    let arrow = if change >= 0.0 { "▲" } else { "▼" };
    Span::styled(format!("{} {:+.2}%", arrow, change), change_style(change))
}

/// Heure locale HH:MM:SS d'un timestamp en millisecondes
fn format_time(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .filter(|_| timestamp_ms > 0)
        .map(|dt| dt.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

fn label_style() -> Style {
    Style::default().fg(Color::Gray)
}

fn ohlc_line(candle: &Candle) -> Line<'static> {
    let style = if candle.is_bullish() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };
    Line::from(vec![
        Span::styled("O ", label_style()),
        Span::raw(format_usd(candle.open)),
        Span::styled("  H ", label_style()),
        Span::raw(format_usd(candle.high)),
        Span::styled("  L ", label_style()),
        Span::raw(format_usd(candle.low)),
        Span::styled("  C ", label_style()),
        Span::styled(format_usd(candle.close), style),
    ])
}

// ============================================================================
// Header
// ============================================================================

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" CoinPulse ")
        .title_alignment(Alignment::Center);

    let text = match (&app.loading_message, app.is_loading) {
        (Some(message), true) => Line::from(Span::styled(
            format!("⏳ {}", message),
            Style::default().fg(Color::Yellow),
        )),
        _ => Line::from(Span::styled(
            "Crypto market pulse",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
    };

    let paragraph = Paragraph::new(text).block(block).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

// ============================================================================
// Overview : coin par défaut
// ============================================================================

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Overview ");

    let Some(details) = &app.overview else {
        let paragraph = Paragraph::new(Line::from(Span::styled("Loading...", label_style())))
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                details.name.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", details.symbol), label_style()),
        ]),
        Line::from(Span::styled(
            details
                .current_price
                .map(format_usd)
                .unwrap_or_else(|| "N/A".to_string()),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    ];

    if let Some(range) = &app.today_range {
        lines.push(Line::from(vec![
            Span::styled("Today ", label_style()),
            change_span(range.change_percent()),
        ]));
        lines.push(ohlc_line(range));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// ============================================================================
// Liste : tendances ou résultats de recherche
// ============================================================================

fn render_listing(frame: &mut Frame, app: &App, area: Rect) {
    let title = match &app.listing {
        Listing::Trending => " 🔥 Trending ".to_string(),
        Listing::Search { query } => format!(" 🔍 \"{}\" ", query),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let rows = app.rows();
    if rows.is_empty() {
        let message = match app.listing {
            Listing::Trending => "No trending coins",
            Listing::Search { .. } => "No results",
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(message, label_style())))
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let watched = app.watching().map(|t| t.coin_id.as_str());
    let items: Vec<ListItem> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let marker = if Some(row.id()) == watched { "●" } else { " " };
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::raw(format!(" {:<8} {:<20} ", row.symbol(), row.name())),
                change_span(row.change_24h()),
            ]);

            let mut item = ListItem::new(line);
            if index == app.selected_index {
                item = item.style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
            }
            item
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

// ============================================================================
// Live : état de la session de synchronisation
// ============================================================================

fn render_live(frame: &mut Frame, app: &App, area: Rect) {
    let live = &app.live;
    let title = match (&app.pending_watch, &live.target) {
        (Some(coin), _) => format!(" Live: {} (resolving pool...) ", coin),
        (None, Some(target)) => format!(" Live: {} ", target.coin_id),
        (None, None) => " Live ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    if live.target.is_none() {
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("Select a coin and press [Enter]", label_style())),
        ])
        .block(block)
        .alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
        return;
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(inner);

    let mut lines = vec![connection_line(live.is_connected, live.feeds.any_rate_limited())];
    lines.push(match &live.price {
        Some(price) => price_line(price),
        None => Line::from(Span::styled("Waiting for price...", label_style())),
    });
    if let Some(price) = &live.price {
        lines.push(Line::from(vec![
            Span::styled("MCap ", label_style()),
            Span::raw(price.market_cap.map(format_compact).unwrap_or_else(|| "-".into())),
            Span::styled("  Vol 24h ", label_style()),
            Span::raw(price.volume_24h.map(format_compact).unwrap_or_else(|| "-".into())),
        ]));
    }
    if let Some(candle) = &live.ohlcv {
        let opened = candle
            .datetime()
            .map(|dt| dt.with_timezone(&Local).format("%H:%M").to_string())
            .unwrap_or_default();
        let mut line = ohlc_line(candle);
        line.spans.push(Span::styled(format!("  {}", opened), label_style()));
        lines.push(line);
    }
    lines.push(feeds_line(app));

    frame.render_widget(Paragraph::new(lines), parts[0]);
    render_trades(frame, &live.trades, parts[1]);
}

fn connection_line(connected: bool, throttled: bool) -> Line<'static> {
    let mut spans = vec![if connected {
        Span::styled(
            "● CONNECTED",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("○ CONNECTING", Style::default().fg(Color::Yellow))
    }];
    if throttled {
        spans.push(Span::styled("  ⚠ rate limited", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

fn price_line(price: &PriceSnapshot) -> Line<'static> {
    let mut spans = vec![Span::styled(
        format_usd(price.price),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )];
    if price.change_24h.is_some() {
        let color = if price.is_positive() { Color::Green } else { Color::Red };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(price.change_label(), Style::default().fg(color)));
    }
    spans.push(Span::styled(format!("  {}", format_time(price.timestamp)), label_style()));
    Line::from(spans)
}

/// Phase de chaque flux, avec le cooldown restant
fn feeds_line(app: &App) -> Line<'static> {
    let now = Instant::now();
    let mut spans = Vec::new();

    for feed in Feed::ALL {
        let phase = app.live.feeds.get(feed);
        let (text, color) = match phase {
            FeedPhase::Idle => (phase.label().to_string(), Color::DarkGray),
            FeedPhase::Polling => (phase.label().to_string(), Color::Green),
            FeedPhase::RateLimited { .. } => {
                let secs = phase.cooldown_remaining(now).map(|d| d.as_secs()).unwrap_or(0);
                (format!("{} {}s", phase.label(), secs), Color::Red)
            }
        };
        spans.push(Span::styled(format!("{}: ", feed.label()), label_style()));
        spans.push(Span::styled(format!("{}  ", text), Style::default().fg(color)));
    }

    Line::from(spans)
}

fn render_trades(frame: &mut Frame, trades: &[Trade], area: Rect) {
    let header = Row::new(vec!["Time", "Side", "Price", "Amount", "Value"])
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = trades
        .iter()
        .map(|trade| {
            let color = match trade.kind {
                TradeKind::Buy => Color::Green,
                TradeKind::Sell => Color::Red,
            };
            Row::new(vec![
                Cell::from(format_time(trade.timestamp)),
                Cell::from(trade.kind.label()).style(Style::default().fg(color)),
                Cell::from(format_usd(trade.price)),
                Cell::from(format_compact(trade.amount)),
                Cell::from(format_usd(trade.value)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(9),
        Constraint::Length(5),
        Constraint::Length(14),
        Constraint::Length(10),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::TOP).title(" Trades "));
    frame.render_widget(table, area);
}

// ============================================================================
// Footer
// ============================================================================

fn key_span(key: &'static str, color: Color) -> Span<'static> {
    Span::styled(key, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let shortcuts = if app.is_awaiting_quit_confirmation() {
        Line::from(vec![
            Span::styled(
                "⚠  Appuyez sur ",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "[q]",
                Style::default()
                    .fg(Color::Red)
                    .add_modifier(Modifier::BOLD | Modifier::SLOW_BLINK),
            ),
            Span::styled(
                " à nouveau pour quitter, ou n'importe quelle autre touche pour annuler ⚠",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ])
    } else {
        Line::from(vec![
            key_span("[q]", Color::Yellow),
            Span::raw(" Quit  "),
            key_span("[↑↓ / j k]", Color::Yellow),
            Span::raw(" Navigate  "),
            key_span("[Enter]", Color::Green),
            Span::raw(" Watch  "),
            key_span("[/]", Color::Green),
            Span::raw(" Search  "),
            key_span("[t]", Color::Yellow),
            Span::raw(" Trending"),
        ])
    };

    let status = match &app.status_message {
        Some(message) => Line::from(Span::styled(message.clone(), Style::default().fg(Color::Red))),
        None => Line::from(""),
    };

    let paragraph = Paragraph::new(vec![shortcuts, status])
        .block(block)
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}

/// Footer en mode input : prompt + buffer + curseur
fn render_input_footer(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let input_line = Line::from(vec![
        Span::styled(
            app.input_prompt.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.input_buffer.clone(), Style::default().fg(Color::White)),
        Span::styled("█", Style::default().fg(Color::White).add_modifier(Modifier::SLOW_BLINK)),
    ]);

    let help_line = Line::from(vec![
        key_span("[Enter]", Color::Green),
        Span::raw(" Search  "),
        key_span("[ESC]", Color::Red),
        Span::raw(" Cancel"),
    ]);

    let paragraph = Paragraph::new(vec![input_line, help_line])
        .block(block)
        .alignment(Alignment::Left);
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(65000.0), "$65000.00");
        assert_eq!(format_usd(0.00001234), "$0.000012");
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(1_250_000_000.0), "1.25B");
        assert_eq!(format_compact(45_600_000.0), "45.60M");
        assert_eq!(format_compact(999.0), "999.00");
    }

    #[test]
    fn test_format_time_placeholder() {
        assert_eq!(format_time(0), "--:--:--");
    }
}
