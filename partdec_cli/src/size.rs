//! Parses human-readable byte sizes for `--part-size`, accepting both SI
//! (kB, MB, GB — powers of 1000) and IEC (KiB, MiB, GiB — powers of 1024)
//! suffixes.

use partdec_core::PartdecError;

pub fn parse_size(input: &str) -> Result<i64, PartdecError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(PartdecError::Args("empty size value".to_string()));
    }

    let split_at = s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len());
    let (num_part, unit_part) = s.split_at(split_at);

    let num: f64 = num_part
        .parse()
        .map_err(|_| PartdecError::Args(format!("invalid size {input:?}")))?;

    let multiplier = match unit_part.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "k" | "kb" => 1_000.0,
        "ki" | "kib" => 1024.0,
        "m" | "mb" => 1_000_000.0,
        "mi" | "mib" => 1024.0 * 1024.0,
        "g" | "gb" => 1_000_000_000.0,
        "gi" | "gib" => 1024.0 * 1024.0 * 1024.0,
        "t" | "tb" => 1_000_000_000_000.0,
        "ti" | "tib" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        other => return Err(PartdecError::Args(format!("unknown size unit {other:?}"))),
    };

    let bytes = num * multiplier;
    if bytes < 0.0 || !bytes.is_finite() {
        return Err(PartdecError::Args(format!("invalid size {input:?}")));
    }

    Ok(bytes.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_bytes() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1024b").unwrap(), 1024);
    }

    #[test]
    fn parses_si_units() {
        assert_eq!(parse_size("1kb").unwrap(), 1_000);
        assert_eq!(parse_size("1MB").unwrap(), 1_000_000);
        assert_eq!(parse_size("2.5gb").unwrap(), 2_500_000_000);
    }

    #[test]
    fn parses_iec_units() {
        assert_eq!(parse_size("1KiB").unwrap(), 1024);
        assert_eq!(parse_size("1MiB").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1GiB").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_size("5xb").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(parse_size("").is_err());
        assert!(parse_size("   ").is_err());
    }
}
