use std::io::{self, Write};

use serde_json::Value;

use crate::models::{CLIConfig, HistoryEntry, LastOutputs, Notification, TaskSnapshot};

pub fn banner(cfg: &CLIConfig) {
    println!("Theater Core Debug CLI");
    println!("API: {}", cfg.base_url);
    println!("Module: {}  Units: {}", cfg.module, cfg.units);
    println!("Type /help for commands. Any other line starts a task.");
}

pub fn prompt(cfg: &CLIConfig) {
    print!("{}> ", cfg.module);
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                  Show commands");
    println!("  /exit | /quit          Exit");
    println!("  /module <name>         Switch module (theater, diary, companion)");
    println!("  /units <1-4>           Units per task");
    println!("  /content <kind>        Theater content (script, character, scene, music)");
    println!("  /status [id]           Show task status");
    println!("  /wait [id]             Poll until the task finishes");
    println!("  /close [id]            Tell the core the panel was closed");
    println!("  /cancel [id]           Cancel the task");
    println!("  /history [limit]       Show module history");
    println!("  /outputs               Show last saved outputs");
    println!("  /notes                 Drain pending notifications");
    println!("  /config                Show provider config");
    println!("  /base <url>            Update base URL");
}

pub fn task(snap: &TaskSnapshot) {
    let mut line = format!(
        "[{}] {} {}/{}",
        snap.status, snap.id, snap.progress.completed_units, snap.progress.total_units
    );
    if snap.progress.current_unit > 0 {
        line.push_str(&format!(" (working on {})", snap.progress.current_unit));
    }
    if snap.backgrounded {
        line.push_str(" background");
    }
    if let Some(err) = &snap.error {
        line.push_str(&format!(" error={}", err));
    }
    if let Some(saved) = snap.saved {
        line.push_str(&format!(" saved={}", saved));
    }
    println!("{}", line);
}

pub fn outputs(items: &[String]) {
    for (idx, item) in items.iter().enumerate() {
        println!("--- unit {} ---", idx + 1);
        println!("{}", item);
    }
}

pub fn last_outputs(last: Option<&LastOutputs>) {
    match last {
        Some(last) => {
            println!("task {} (complete: {})", last.task_id, last.complete);
            outputs(&last.outputs);
        }
        None => println!("no saved outputs"),
    }
}

pub fn history(items: &[HistoryEntry]) {
    if items.is_empty() {
        println!("no history");
        return;
    }
    for entry in items {
        let marker = if entry.compressed { " (compressed)" } else { "" };
        println!("{} {}{}> {}", entry.timestamp, entry.role, marker, entry.content);
    }
}

pub fn notifications(items: &[Notification]) {
    if items.is_empty() {
        println!("no notifications");
        return;
    }
    for note in items {
        println!("[{}] {} ({}): {}", note.kind, note.title, note.task_id, note.body);
    }
}

pub fn json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
