//! Best-effort name lookup against the OS contact directory.
//!
//! The directory is outside this system's control, so it is modeled as an
//! injected capability with a per-call timeout. Every failure mode
//! (timeout, no match, transport error) collapses to "still unresolved";
//! nothing here is ever fatal. Successful lookups are written back into
//! the mapping store so the directory is never consulted twice for the
//! same identifier.

use std::collections::HashMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::identity::mappings::MappingStore;
use crate::identity::phone::normalize_digits;
use crate::identity::resolver::is_unresolved_name;
use crate::model::Dataset;

/// Abstract contact-directory lookup. Implementations must be cheap to
/// share across the bounded parallel lookup phase.
pub trait ContactDirectory: Sync {
    fn lookup(&self, identifier: &str) -> Option<String>;
}

/// Directory that never resolves anything. Used in tests and when the
/// oracle is disabled.
pub struct NoopDirectory;

impl ContactDirectory for NoopDirectory {
    fn lookup(&self, _identifier: &str) -> Option<String> {
        None
    }
}

/// The macOS Contacts application, queried through `osascript` with a
/// short per-call timeout.
pub struct MacContactsDirectory {
    timeout: Duration,
}

impl MacContactsDirectory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn script_for(identifier: &str) -> String {
        let escaped = identifier.replace('\\', "\\\\").replace('"', "\\\"");
        format!(
            r#"on run
    tell application "Contacts"
        set foundPeople to {{}}
        try
            set foundPeople to foundPeople & (every person whose value of every phone contains "{escaped}")
        end try
        try
            set foundPeople to foundPeople & (every person whose value of every email contains "{escaped}")
        end try
        if (count of foundPeople) > 0 then
            set thePerson to item 1 of foundPeople
            set firstName to first name of thePerson
            set lastName to last name of thePerson
            if firstName is missing value then set firstName to ""
            if lastName is missing value then set lastName to ""
            if firstName is not "" and lastName is not "" then
                return firstName & " " & lastName
            else
                return firstName & lastName
            end if
        else
            return ""
        end if
    end tell
end run"#
        )
    }

    fn run_with_timeout(&self, script: &str) -> Option<String> {
        let mut child = Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        return None;
                    }
                    let mut output = String::new();
                    child.stdout.take()?.read_to_string(&mut output).ok()?;
                    return Some(output);
                }
                Ok(None) => {
                    if started.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(_) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
            }
        }
    }
}

impl ContactDirectory for MacContactsDirectory {
    fn lookup(&self, identifier: &str) -> Option<String> {
        let output = self.run_with_timeout(&Self::script_for(identifier))?;
        let name = output.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }
}

/// Find contacts whose display name still looks like a raw identifier,
/// consult the directory for up to `limit` of them in parallel, then
/// serially write the hits back into the mapping store and patch the
/// dataset in place. Returns the number of identifiers resolved.
pub fn enrich_unresolved(
    dataset: &mut Dataset,
    store: &mut MappingStore,
    directory: &dyn ContactDirectory,
    limit: usize,
) -> usize {
    let mut candidates: Vec<String> = Vec::new();
    for contact in &dataset.contacts {
        if contact.is_group || !is_unresolved_name(&contact.display_name) {
            continue;
        }
        if !candidates.contains(&contact.canonical_key) {
            candidates.push(contact.canonical_key.clone());
        }
    }
    candidates.truncate(limit);

    if candidates.is_empty() {
        return 0;
    }
    tracing::info!(count = candidates.len(), "consulting contact directory");

    let results: Vec<(String, Option<String>)> = candidates
        .par_iter()
        .map(|identifier| (identifier.clone(), directory.lookup(identifier)))
        .collect();

    let mut hits: HashMap<String, String> = HashMap::new();
    let mut by_digits: HashMap<String, String> = HashMap::new();
    for (identifier, name) in results {
        if let Some(name) = name {
            store.learn_name(&identifier, &name);
            let digits = normalize_digits(&identifier);
            if !digits.is_empty() {
                by_digits.insert(digits, name.clone());
            }
            hits.insert(identifier, name);
        }
    }

    if hits.is_empty() {
        return 0;
    }

    for contact in &mut dataset.contacts {
        if contact.is_group {
            continue;
        }
        let resolved = hits.get(&contact.canonical_key).or_else(|| {
            let digits = normalize_digits(&contact.canonical_key);
            if digits.is_empty() {
                None
            } else {
                by_digits.get(&digits)
            }
        });
        if let Some(name) = resolved {
            contact.display_name = name.clone();
        }
    }

    hits.len()
}
