//! Patch tables loaded from TOML files
//!
//! Lets a user swap in their own edits without rebuilding. Byte strings are
//! hex encoded; integers may use TOML's `0x` notation.
//!
//! ```toml
//! [[patch]]
//! address = 0x05E221
//! expected = "64"
//! replacement = "00"
//! label = "Disengage countdown"
//!
//! # Wildcard: write without checking the current contents
//! [[patch]]
//! address = 0x05E222
//! skip = 1
//! replacement = "00"
//!
//! [[region]]
//! checksum = 0x05EFFC
//! start = 0x05E000
//! end = 0x05EFFC
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{PatchError, PatchResult};
use crate::patch::{ChecksumRegion, ExpectedValue, PatchOp, PatchTable};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableFile {
    #[serde(default, rename = "patch")]
    patches: Vec<PatchEntry>,
    #[serde(default, rename = "region")]
    regions: Vec<RegionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatchEntry {
    address: usize,
    expected: Option<String>,
    skip: Option<usize>,
    replacement: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionEntry {
    checksum: usize,
    start: usize,
    end: usize,
}

/// Load a patch table from a TOML file
pub fn load(path: &Path) -> PatchResult<PatchTable> {
    let content = std::fs::read_to_string(path).map_err(|source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content)
        .map_err(|e| PatchError::Config(format!("{}: {}", path.display(), e)))
}

/// Parse a patch table from TOML text
pub fn parse(content: &str) -> PatchResult<PatchTable> {
    let file: TableFile =
        toml::from_str(content).map_err(|e| PatchError::Config(e.to_string()))?;

    let ops = file
        .patches
        .into_iter()
        .map(PatchEntry::into_op)
        .collect::<PatchResult<Vec<_>>>()?;

    let regions = file
        .regions
        .into_iter()
        .map(|r| ChecksumRegion::new(r.checksum, r.start, r.end))
        .collect();

    Ok(PatchTable::new(ops, regions))
}

impl PatchEntry {
    fn into_op(self) -> PatchResult<PatchOp> {
        let expected = match (self.expected, self.skip) {
            (Some(hex), None) => ExpectedValue::Exact(decode_hex(self.address, "expected", &hex)?),
            (None, Some(len)) => ExpectedValue::SkipVerification { len },
            (Some(_), Some(_)) => {
                return Err(PatchError::Config(format!(
                    "Patch at 0x{:06X} sets both 'expected' and 'skip'",
                    self.address
                )))
            }
            (None, None) => {
                return Err(PatchError::Config(format!(
                    "Patch at 0x{:06X} needs 'expected' or 'skip'",
                    self.address
                )))
            }
        };

        let replacement = self
            .replacement
            .map(|hex| decode_hex(self.address, "replacement", &hex))
            .transpose()?;

        if replacement.is_none() && matches!(expected, ExpectedValue::SkipVerification { .. }) {
            return Err(PatchError::Config(format!(
                "Patch at 0x{:06X} neither checks nor writes anything",
                self.address
            )));
        }

        Ok(PatchOp {
            address: self.address,
            expected,
            replacement,
            label: self.label,
        })
    }
}

fn decode_hex(address: usize, field: &str, value: &str) -> PatchResult<Vec<u8>> {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned).map_err(|e| {
        PatchError::Config(format!(
            "Patch at 0x{:06X}: invalid hex in '{}': {}",
            address, field, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_ops_and_regions() {
        let table = parse(
            r#"
            [[patch]]
            address = 0x10
            expected = "AB CD EF"
            replacement = "000000"
            label = "test"

            [[patch]]
            address = 0x11
            skip = 1
            replacement = "55"

            [[patch]]
            address = 0x40
            expected = "ff"

            [[region]]
            checksum = 0x100
            start = 0
            end = 0x100
            "#,
        )
        .unwrap();

        assert_eq!(
            table.ops,
            vec![
                PatchOp::replace(0x10, &[0xAB, 0xCD, 0xEF], &[0, 0, 0]).with_label("test"),
                PatchOp::overwrite(0x11, &[0x55]),
                PatchOp::verify_only(0x40, &[0xFF]),
            ]
        );
        assert_eq!(table.regions, vec![ChecksumRegion::new(0x100, 0, 0x100)]);
    }

    #[test]
    fn rejects_bad_hex() {
        let err = parse("[[patch]]\naddress = 1\nexpected = \"zz\"\n").unwrap_err();
        assert!(matches!(err, PatchError::Config(msg) if msg.contains("expected")));
    }

    #[test]
    fn rejects_ambiguous_expectation() {
        let both = "[[patch]]\naddress = 1\nexpected = \"00\"\nskip = 1\nreplacement = \"01\"\n";
        let neither = "[[patch]]\naddress = 1\nreplacement = \"01\"\n";
        assert!(parse(both).is_err());
        assert!(parse(neither).is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(parse("[[patch]]\naddress = 1\nexpected = \"00\"\ncolour = 3\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.toml");
        std::fs::write(&path, "[[region]]\nchecksum = 2\nstart = 4\nend = 8\n").unwrap();

        let table = load(&path).unwrap();
        assert!(table.ops.is_empty());
        assert_eq!(table.regions.len(), 1);
    }
}
