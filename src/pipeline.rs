//! Export pipeline: the full, update, contacts, and stats commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::assemble::assemble;
use crate::identity::mappings::MappingStore;
use crate::identity::oracle::{ContactDirectory, enrich_unresolved};
use crate::identity::resolver;
use crate::merge::merge;
use crate::model::Dataset;
use crate::snapshot::{load_dataset, save_dataset};
use crate::source::ChatDb;
use crate::stats::parse_local_timestamp;

pub const DATASET_FILE: &str = "imessage_data.json";
pub const MAPPINGS_FILE: &str = "contact_mappings.json";

/// Everything one run needs, resolved from config and CLI flags.
pub struct RunContext {
    /// Message store location; `None` when it could not be determined
    /// (only the extraction commands need it).
    pub database: Option<PathBuf>,
    pub dataset_path: PathBuf,
    pub mappings_path: PathBuf,
    pub message_limit: u64,
    pub update_limit: u64,
    pub oracle_limit: usize,
    pub directory: Box<dyn ContactDirectory>,
}

impl RunContext {
    fn open_store(&self) -> Result<ChatDb> {
        let path = self.database.as_ref().context(
            "message store not found; pass --database or set database_path in the config",
        )?;
        Ok(ChatDb::open(path)?)
    }
}

/// Full export: harvest groups, extract every message, resolve names,
/// and write a fresh snapshot.
pub fn full_export(ctx: &RunContext) -> Result<()> {
    let mut store = MappingStore::load(&ctx.mappings_path);
    let db = ctx.open_store()?;

    let groups = db
        .query_group_participants()
        .context("harvest group participants")?;
    tracing::info!(groups = groups.len(), "found group threads");
    store.replace_groups(groups);
    resolver::refresh_group_display_names(&mut store);
    store.save(&ctx.mappings_path).context("save mappings")?;

    let rows = db
        .query_messages(ctx.message_limit, None)
        .context("extract messages")?;
    let mut dataset = assemble(rows, &store);

    let learned = learn_contact_names(&dataset, &mut store);
    let resolved = enrich_unresolved(
        &mut dataset,
        &mut store,
        ctx.directory.as_ref(),
        ctx.oracle_limit,
    );
    if learned + resolved > 0 {
        tracing::info!(learned, resolved, "updated contact mappings");
        store.save(&ctx.mappings_path).context("save mappings")?;
    }

    // The attachment pipeline owns `images`; carry the prior snapshot's
    // entries through so a re-export does not wipe them.
    if let Some(prior) = load_dataset(&ctx.dataset_path) {
        if !prior.images.is_empty() {
            dataset.images = prior.images;
            dataset.finalize();
        }
    }

    save_dataset(&ctx.dataset_path, &dataset).context("save snapshot")?;
    log_summary(&dataset);
    Ok(())
}

/// Incremental run: extract messages newer than the snapshot's latest and
/// merge them in. Degrades to a full export when no usable snapshot
/// exists.
pub fn update(ctx: &RunContext) -> Result<()> {
    let Some(prior) = load_dataset(&ctx.dataset_path) else {
        tracing::warn!("no usable snapshot, running a full export instead");
        return full_export(ctx);
    };

    let since = prior.latest_message_date().and_then(parse_local_timestamp);
    if let Some(since) = since {
        tracing::info!(%since, "extracting messages after snapshot");
    }

    let mut store = MappingStore::load(&ctx.mappings_path);
    let db = ctx.open_store()?;
    let rows = db
        .query_messages(ctx.update_limit, since)
        .context("extract new messages")?;
    let fresh = assemble(rows, &store);
    if fresh.messages.is_empty() {
        tracing::info!("no new messages");
        return Ok(());
    }

    let mut merged = merge(prior, fresh);
    let resolved = enrich_unresolved(
        &mut merged,
        &mut store,
        ctx.directory.as_ref(),
        ctx.oracle_limit,
    );
    if resolved > 0 {
        store.save(&ctx.mappings_path).context("save mappings")?;
    }

    save_dataset(&ctx.dataset_path, &merged).context("save snapshot")?;
    log_summary(&merged);
    Ok(())
}

/// Repair pass: resolve contacts that still display as raw identifiers.
pub fn resolve_contacts(ctx: &RunContext) -> Result<()> {
    let Some(mut dataset) = load_dataset(&ctx.dataset_path) else {
        bail!(
            "no snapshot at {}; run a full export first",
            ctx.dataset_path.display()
        );
    };

    let mut store = MappingStore::load(&ctx.mappings_path);
    let resolved = enrich_unresolved(
        &mut dataset,
        &mut store,
        ctx.directory.as_ref(),
        ctx.oracle_limit,
    );
    if resolved == 0 {
        tracing::info!("all contacts already resolved");
        return Ok(());
    }

    store.save(&ctx.mappings_path).context("save mappings")?;
    save_dataset(&ctx.dataset_path, &dataset).context("save snapshot")?;
    tracing::info!(resolved, "resolved contact names");
    Ok(())
}

/// Print the persisted snapshot's statistics.
pub fn show_stats(ctx: &RunContext) -> Result<()> {
    let Some(dataset) = load_dataset(&ctx.dataset_path) else {
        bail!(
            "no snapshot at {}; run a full export first",
            ctx.dataset_path.display()
        );
    };

    let stats = &dataset.statistics;
    println!("Messages:     {}", stats.total_messages);
    println!(
        "              {} sent / {} received",
        stats.messages_sent, stats.messages_received
    );
    println!("Contacts:     {}", stats.unique_contacts);
    if let Some(images) = stats.total_images {
        println!("Images:       {images}");
    }
    if !stats.date_range.start.is_empty() {
        println!(
            "Date range:   {} to {}",
            stats.date_range.start, stats.date_range.end
        );
    }
    println!("Avg length:   {:.1} chars", stats.avg_message_length);

    if !dataset.contacts.is_empty() {
        println!();
        println!("Top contacts:");
        for contact in dataset.contacts.iter().take(5) {
            println!(
                "  {:>6}  {}",
                contact.message_count, contact.display_name
            );
        }
    }
    Ok(())
}

/// Record freshly resolved display names back into the store so future
/// runs skip the work: real names only, and never overriding an existing
/// mapping.
fn learn_contact_names(dataset: &Dataset, store: &mut MappingStore) -> usize {
    let mut learned = 0;
    for contact in &dataset.contacts {
        if contact.is_group
            || resolver::is_unresolved_name(&contact.display_name)
            || contact.display_name == contact.canonical_key
        {
            continue;
        }
        if store.name_for(&contact.canonical_key).is_none() {
            store.learn_name(&contact.canonical_key, &contact.display_name);
            learned += 1;
        }
    }
    learned
}

fn log_summary(dataset: &Dataset) {
    let stats = &dataset.statistics;
    tracing::info!(
        messages = stats.total_messages,
        contacts = stats.unique_contacts,
        sent = stats.messages_sent,
        received = stats.messages_received,
        "snapshot written"
    );
}
