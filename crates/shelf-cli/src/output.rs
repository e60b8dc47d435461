//! Terminal rendering

use colored::*;
use shelf_core::{Item, LowStock, Snapshot, Transaction, TxKind};
use shelf_sync::{PushState, SyncOutcome, SyncStats, SyncStatus};

pub fn print_items(snapshot: &Snapshot) {
    if snapshot.items.is_empty() {
        println!("{}", "(no items)".dimmed());
        return;
    }

    println!(
        "{}",
        format!(
            "{:<16} {:<24} {:<10} {:>8} {:>10} {:>10}  {}",
            "SKU", "NAME", "POSITION", "STOCK", "COST", "PRICE", "BARCODE"
        )
        .bold()
    );
    let mut items: Vec<&Item> = snapshot.items.iter().collect();
    items.sort_by(|a, b| a.sku.cmp(&b.sku));
    for item in items {
        let stock = snapshot.stock_of(&item.sku);
        let stock_text = format!("{:>8}", number(stock));
        let stock_text = if stock <= shelf_core::LOW_STOCK_THRESHOLD {
            stock_text.red().to_string()
        } else {
            stock_text
        };
        println!(
            "{:<16} {:<24} {:<10} {} {:>10.2} {:>10.2}  {}",
            item.sku,
            item.name,
            item.position,
            stock_text,
            item.cost_price,
            item.sell_price,
            item.barcode().unwrap_or("-")
        );
    }
}

pub fn print_item(item: &Item) {
    println!(
        "{} {} {}",
        "+OK".green(),
        item.sku.bold(),
        format!("({})", item.name).dimmed()
    );
}

pub fn print_transactions(transactions: &[Transaction], pending_only: bool) {
    let rows: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| !pending_only || !tx.confirmed)
        .collect();
    if rows.is_empty() {
        println!("{}", "(no transactions)".dimmed());
        return;
    }

    println!(
        "{}",
        format!(
            "{:<38} {:>14} {:<16} {:<9} {:>8} {:>10}  {}",
            "ID", "TS", "SKU", "TYPE", "QTY", "PRICE", "STATE"
        )
        .bold()
    );
    for tx in rows {
        let state = if tx.confirmed {
            "confirmed".green()
        } else {
            "pending".yellow()
        };
        println!(
            "{:<38} {:>14} {:<16} {:<9} {:>8} {:>10.2}  {}",
            tx.id,
            tx.ts,
            tx.sku,
            kind_label(tx.kind),
            number(tx.qty),
            tx.price,
            state
        );
    }
}

pub fn print_transaction(tx: &Transaction) {
    let state = if tx.confirmed { "" } else { " (pending)" };
    println!(
        "{} {} {} {} x{}{}",
        "+OK".green(),
        tx.id.bold(),
        kind_label(tx.kind),
        tx.sku,
        number(tx.qty),
        state.yellow()
    );
}

pub fn print_low_stock(rows: &[LowStock], threshold: f64) {
    if rows.is_empty() {
        println!(
            "{}",
            format!("No items at or below {}", number(threshold)).green()
        );
        return;
    }
    for row in rows {
        println!(
            "{:<16} {:<24} {}",
            row.sku,
            row.name,
            number(row.stock).red()
        );
    }
}

pub fn print_outcome(label: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed { version } => {
            println!("{} {} (version {})", "+OK".green(), label, version)
        }
        SyncOutcome::Skipped => println!(
            "{} {} skipped: another sync is in flight",
            "-SKIP".yellow(),
            label
        ),
        SyncOutcome::Failed(failure) => println!("{} {}", "-ERR".red(), failure),
    }
}

pub fn print_status(snapshot: &Snapshot, status: &SyncStatus, stats: &SyncStats, online: bool) {
    let (logo, company) = snapshot.branding();
    println!("{}", "Replica".cyan().bold());
    println!("  version:      {}", snapshot.version);
    println!("  last write:   {}", snapshot.last_write_ts);
    println!("  items:        {}", snapshot.items.len());
    println!(
        "  transactions: {} ({} pending)",
        snapshot.transactions.len(),
        snapshot.transactions.iter().filter(|t| !t.confirmed).count()
    );
    println!(
        "  company:      {}",
        if company.is_empty() { "-" } else { company }
    );
    println!(
        "  logo:         {}",
        if logo.is_empty() {
            "-".to_string()
        } else {
            format!("{} bytes", logo.len())
        }
    );

    println!("{}", "Sync".cyan().bold());
    println!(
        "  remote:       {}",
        if online {
            "configured".green()
        } else {
            "offline".yellow()
        }
    );
    print_status_line(status);
    println!(
        "  counters:     {} pushes ({} failed), {} pulls ({} failed), {} retries",
        stats.pushes, stats.push_failures, stats.pulls, stats.pull_failures, stats.retries
    );
}

pub fn print_status_line(status: &SyncStatus) {
    println!(
        "  push:         {}{}",
        push_label(status.push),
        if status.syncing { " (syncing)" } else { "" }
    );
    println!("  last push:    {}", optional(status.last_push));
    println!("  last pull:    {}", optional(status.last_pull));
    if let Some(failure) = &status.last_error {
        println!("  last error:   {}", failure.to_string().red());
    }
}

fn push_label(state: PushState) -> ColoredString {
    match state {
        PushState::Idle => "idle".normal(),
        PushState::Debouncing => "debouncing".yellow(),
        PushState::Pushing => "pushing".blue(),
    }
}

fn kind_label(kind: TxKind) -> ColoredString {
    match kind {
        TxKind::In => "IN".green(),
        TxKind::Out => "OUT".blue(),
        TxKind::Breakage => "BREAKAGE".red(),
    }
}

fn optional(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

/// Quantities are usually whole; print them without a trailing `.0`
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
