use crate::error::CliError;
use engine_runtime::{RunSummary, UndoOutcome};
use model::{
    core::attribute::Item,
    job::MigrationJob,
    transform::mapping::{ColumnMappings, MappingSpec},
};
use std::collections::BTreeMap;

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn print_jobs(jobs: &[MigrationJob], as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(jobs);
    }
    if jobs.is_empty() {
        println!("No migration jobs.");
        return Ok(());
    }

    println!(
        "{:<32} {:<12} {:>10}  {}",
        "ID", "STATUS", "PROCESSED", "SOURCE -> TARGET"
    );
    for job in jobs {
        println!(
            "{:<32} {:<12} {:>10}  {} -> {}",
            job.id, job.status, job.processed_count, job.source_table, job.target_table
        );
    }
    Ok(())
}

pub fn print_job(job: &MigrationJob, as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(job);
    }

    println!("{:<16} {}", "ID", job.id);
    println!("{:<16} {}", "Status", job.status);
    println!("{:<16} {}", "Source", job.source_table);
    println!("{:<16} {}", "Target", job.target_table);
    println!("{:<16} {}", "Processed", job.processed_count);
    let key_schema = job
        .key_schema
        .as_ref()
        .map(|schema| schema.attributes().collect::<Vec<_>>().join(", "))
        .unwrap_or_else(|| "unresolved".to_string());
    println!("{:<16} {}", "Key schema", key_schema);
    let cursor = job
        .cursor
        .as_ref()
        .map(|c| serde_json::to_string(c.key()).unwrap_or_default())
        .unwrap_or_else(|| "none".to_string());
    println!("{:<16} {}", "Cursor", cursor);
    println!("{:<16} {}", "Created", job.created_at.to_rfc3339());
    println!("{:<16} {}", "Updated", job.updated_at.to_rfc3339());
    println!("Mappings:");
    print_mappings(&job.column_mappings);
    Ok(())
}

fn print_mappings(mappings: &ColumnMappings) {
    if let Some(exclude) = mappings.passthrough_exclude() {
        if exclude.is_empty() {
            println!("  * (all attributes)");
        } else {
            let excluded: Vec<&str> = exclude.iter().map(String::as_str).collect();
            println!("  * (all attributes except {})", excluded.join(", "));
        }
        return;
    }

    for (target, spec) in mappings.iter() {
        match spec {
            MappingSpec::Template { text } => println!("  {target} = {text}"),
            MappingSpec::Literal { value } => println!("  {target} := {value}"),
            MappingSpec::Passthrough { .. } => {}
        }
    }
}

/// Printed before a run so the operator can confirm it.
pub fn print_run_plan(job: &MigrationJob) {
    let mode = if job.cursor.is_some() {
        "resume from checkpoint"
    } else {
        "start from the beginning"
    };
    println!("Job:       {} ({})", job.id, job.status);
    println!("Copy:      {} -> {}", job.source_table, job.target_table);
    println!("Progress:  {} records written, {mode}", job.processed_count);
    println!("Mappings:");
    print_mappings(&job.column_mappings);
}

pub fn print_summary(summary: &RunSummary) {
    let outcome = if summary.cancelled {
        "stopped (resumable)"
    } else {
        summary.status.as_str()
    };
    println!("Migration {}: {outcome}", summary.job_id);
    println!(
        "  written {} this run ({} total), scanned {}, {} pages, {} batches",
        summary.records_written,
        summary.processed_count,
        summary.records_scanned,
        summary.pages,
        summary.batches
    );
    if summary.retries > 0 || summary.warnings > 0 {
        println!(
            "  {} batch retries, {} transformation warnings",
            summary.retries, summary.warnings
        );
    }
    println!("  took {:.2}s", summary.duration.as_secs_f64());
}

pub fn print_undo(outcome: &UndoOutcome) {
    match outcome {
        UndoOutcome::Undone {
            job_id,
            deleted,
            status,
        } => println!("Undid {job_id}: deleted {deleted} items, job is now {status}"),
        UndoOutcome::NothingToUndo { job_id: Some(id) } => println!("Nothing to undo for {id}"),
        UndoOutcome::NothingToUndo { job_id: None } => println!("Nothing to undo"),
    }
}

pub fn print_ledger(entries: &BTreeMap<String, Vec<Item>>, as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(entries);
    }
    if entries.is_empty() {
        println!("Undo ledger is empty.");
        return Ok(());
    }

    for (job_id, keys) in entries {
        println!("{job_id}: {} keys", keys.len());
        for key in keys.iter().take(10) {
            println!("  {}", serde_json::to_string(key)?);
        }
        if keys.len() > 10 {
            println!("  ... {} more", keys.len() - 10);
        }
    }
    Ok(())
}
