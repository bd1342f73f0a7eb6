//! `mymind therapists`: the booking page's therapist list, in a table.

use anyhow::Result;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use mymind_types::participant::UserProfile;

use crate::state::AppState;

pub async fn list_therapists(state: &AppState, json: bool) -> Result<()> {
    let therapists = state.ledger.available_therapists(chrono::Utc::now()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&therapists)?);
        return Ok(());
    }

    if therapists.is_empty() {
        println!();
        println!("  {}", style("No therapists are free right now.").dim());
        println!();
        return Ok(());
    }

    println!();
    println!("{}", render_table(&therapists));
    println!();
    Ok(())
}

fn render_table(therapists: &[UserProfile]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Experience").fg(Color::White),
        Cell::new("Price").fg(Color::White),
        Cell::new("Sessions").fg(Color::White),
        Cell::new("Id").fg(Color::White),
    ]);

    for therapist in therapists {
        let experience = therapist
            .years_experience
            .map(|y| format!("{y} yrs"))
            .unwrap_or_else(|| "-".to_string());
        let price = therapist
            .session_cost_cents
            .map(|c| format!("${}.{:02}", c / 100, c % 100))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(therapist.full_name()).fg(Color::Cyan),
            Cell::new(experience),
            Cell::new(price).fg(Color::Green),
            Cell::new(therapist.num_sessions),
            Cell::new(therapist.id).fg(Color::DarkGrey),
        ]);
    }

    table
}
