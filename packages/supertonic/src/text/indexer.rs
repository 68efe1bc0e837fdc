//! Codepoint → token id lookup backed by the `unicode_indexer.json` asset.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use supertonic_domain::VoiceError;

/// Id substituted for codepoints the table does not cover.
pub const SENTINEL_ID: i64 = 0;

/// A dense table indexed by Unicode scalar value.
///
/// Negative entries and codepoints past the end of the table resolve to
/// [`SENTINEL_ID`].
#[derive(Debug, Clone, PartialEq)]
pub struct CodepointIndexer {
    table: Vec<i64>,
}

impl CodepointIndexer {
    pub fn from_table(table: Vec<i64>) -> Self {
        Self { table }
    }

    /// Load the table from a JSON integer array.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, VoiceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            VoiceError::Initialization(format!("cannot open {}: {e}", path.display()))
        })?;
        let table: Vec<i64> = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            VoiceError::Initialization(format!("invalid codepoint table {}: {e}", path.display()))
        })?;
        tracing::debug!(entries = table.len(), "codepoint table loaded");
        Ok(Self { table })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn id(&self, ch: char) -> i64 {
        match self.table.get(ch as usize) {
            Some(&id) if id >= 0 => id,
            _ => SENTINEL_ID,
        }
    }

    pub fn encode(&self, text: &str) -> Vec<i64> {
        text.chars().map(|c| self.id(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codepoints_degrade_to_sentinel() {
        let mut table = vec![-1; 128];
        table['a' as usize] = 7;
        table['b' as usize] = 8;
        let indexer = CodepointIndexer::from_table(table);

        assert_eq!(indexer.encode("ab"), vec![7, 8]);
        // unmapped, then out of range
        assert_eq!(indexer.encode("c한"), vec![SENTINEL_ID, SENTINEL_ID]);
    }

    #[test]
    fn malformed_table_is_an_initialization_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("unicode_indexer.json");
        std::fs::write(&path, b"{\"not\": \"an array\"}")?;
        assert!(matches!(
            CodepointIndexer::from_json_file(&path),
            Err(VoiceError::Initialization(_))
        ));

        std::fs::write(&path, b"[-1, 3, 4]")?;
        let indexer = CodepointIndexer::from_json_file(&path)?;
        assert_eq!(indexer.id('\u{1}'), 3);
        Ok(())
    }
}
