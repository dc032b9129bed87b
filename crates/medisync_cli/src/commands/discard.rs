//! Discard command implementation.

use super::Target;
use medisync_model::EntityKind;

/// Runs the discard command.
pub fn run(
    target: &Target,
    entity: Option<&str>,
    all: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = target.open_coordinator()?;
    let removed = match (entity, all) {
        (Some(_), true) => return Err("use either --entity or --all, not both".into()),
        (None, false) => return Err("specify --entity <name> or --all".into()),
        (None, true) => coordinator.delete_unsynchronized()?,
        (Some(name), false) => {
            let kind: EntityKind = name.parse()?;
            coordinator
                .delete_unsynchronized_for(kind)?
                .ok_or_else(|| format!("no store for {kind}"))?
        }
    };
    println!("Discarded {removed} unsynchronized record(s)");
    Ok(())
}
