//! Legacy long-poll probe codec
//!
//! The `Listening-Configs` probe payload packs the configs a client watches
//! into one string: fields joined by `WORD_SEPARATOR` (`\u{2}`), tuples
//! terminated by `LINE_SEPARATOR` (`\u{1}`). A tuple is either
//! `dataId^2group^2md5` for the default namespace or
//! `dataId^2group^2md5^2tenant`. The probe format predates tags and does
//! not carry them.

use tracing::debug;

use crate::model::{ConfigListenContext, LINE_SEPARATOR, WORD_SEPARATOR};

/// Parse a probe payload into listen contexts
///
/// Malformed tuples (fewer than three fields) are skipped, matching the
/// lenient behavior clients rely on.
pub fn parse_probe_string(probe: &str) -> Vec<ConfigListenContext> {
    let mut contexts = Vec::new();

    for line in probe.split(LINE_SEPARATOR) {
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(WORD_SEPARATOR).collect();
        match fields.len() {
            3 => contexts.push(ConfigListenContext::new(fields[0], fields[1], "", fields[2])),
            4 => contexts.push(ConfigListenContext::new(
                fields[0], fields[1], fields[3], fields[2],
            )),
            n => {
                debug!(line = line, fields = n, "skipping malformed probe tuple");
            }
        }
    }

    contexts
}

/// Serialize listen contexts back into a probe payload
///
/// Tuples with an empty tenant use the three-field form; the `tag` field is
/// not representable in this format and is dropped.
pub fn serialize_probe_string(contexts: &[ConfigListenContext]) -> String {
    let mut probe = String::new();

    for ctx in contexts {
        probe.push_str(&ctx.data_id);
        probe.push_str(WORD_SEPARATOR);
        probe.push_str(&ctx.group);
        probe.push_str(WORD_SEPARATOR);
        probe.push_str(&ctx.md5);
        if !ctx.tenant.is_empty() {
            probe.push_str(WORD_SEPARATOR);
            probe.push_str(&ctx.tenant);
        }
        probe.push_str(LINE_SEPARATOR);
    }

    probe
}
