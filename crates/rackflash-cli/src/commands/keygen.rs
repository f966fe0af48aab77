//! Keygen command - compute the security access key for a seed

use anyhow::{bail, Context, Result};
use rackflash_core::compute_key;

use crate::output::OutputContext;

/// Print the key answering `seed` (hex, optional `0x` prefix)
pub fn keygen(seed: &str, ctx: &OutputContext) -> Result<()> {
    let seed = parse_seed(seed)?;
    let key = compute_key(seed);

    ctx.print_kv(&[
        ("Seed", format!("{:08X}", seed)),
        ("Key", format!("{:08X}", key)),
    ]);
    Ok(())
}

fn parse_seed(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .replace(' ', "");

    let bytes = hex::decode(&digits).with_context(|| format!("Invalid seed '{}'", input))?;
    let Ok(bytes) = <[u8; 4]>::try_from(bytes.as_slice()) else {
        bail!("Seed must be 4 bytes, got {}", bytes.len());
    };
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seed_forms() {
        assert_eq!(parse_seed("12345678").unwrap(), 0x1234_5678);
        assert_eq!(parse_seed("0xDEADBEEF").unwrap(), 0xDEAD_BEEF);
        assert_eq!(parse_seed("5C 00 00 00").unwrap(), 0x5C00_0000);
    }

    #[test]
    fn rejects_bad_seeds() {
        assert!(parse_seed("123456").is_err());
        assert!(parse_seed("zz345678").is_err());
        assert!(parse_seed("1234567890").is_err());
    }
}
