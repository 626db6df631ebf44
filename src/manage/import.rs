use crate::types::Host;
use tracing::debug;

/// What an import did, alias by alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}

/// Copy hosts from another source into the manual list.
///
/// Incoming hosts become manual records. An alias that already exists
/// (case-insensitively) is replaced when `overwrite` is set and skipped
/// otherwise.
pub fn import_hosts(existing: &mut Vec<Host>, incoming: &[Host], overwrite: bool) -> ImportReport {
    let mut report = ImportReport::default();

    for host in incoming {
        let record = host.to_manual_record();
        match existing.iter_mut().find(|h| h.matches_alias(&record.alias)) {
            Some(current) if overwrite => {
                debug!("Import replaces '{}'", record.alias);
                report.updated.push(record.alias.clone());
                *current = record;
            }
            Some(_) => {
                report.skipped.push(record.alias.clone());
            }
            None => {
                report.imported.push(record.alias.clone());
                existing.push(record);
            }
        }
    }

    report
}
