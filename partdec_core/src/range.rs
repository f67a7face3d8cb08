//! Byte-range planner: derives N contiguous, disjoint `[start, end]`
//! ranges for a known or unknown data size, splitting either by a fixed
//! part count or a fixed part size.

use crate::error::PartdecError;

/// Sentinel for "length not known".
pub const UNKNOWN_SIZE: i64 = -1;

/// Soft ceiling on part count unless the caller passes `--force`.
pub const PART_LIMIT: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: i64,
    pub end: i64,
    pub offset: i64,
    pub is_full_range: bool,
}

impl ByteRange {
    /// `end - start + 1`, or `UNKNOWN_SIZE` when either bound is unknown.
    pub fn len(&self) -> i64 {
        if self.start == UNKNOWN_SIZE || self.end == UNKNOWN_SIZE {
            UNKNOWN_SIZE
        } else {
            self.end - self.start + 1
        }
    }

    /// The absolute byte position a fetch should resume from. For a
    /// full-range part `start` is a planning-time sentinel (`1` when the
    /// size was unknown at plan time) rather than a literal byte offset, so
    /// resuming is purely `offset` bytes into the resource; for a bounded
    /// multi-part range it's `start + offset` as usual.
    pub fn effective_start(&self) -> i64 {
        if self.is_full_range {
            self.offset
        } else {
            self.start + self.offset
        }
    }
}

/// Validates `part_count`/`part_size` against `data_size` before planning
/// commits. `force` disables the soft `PartLimit` ceiling. A `data_size`
/// of zero is treated like an unknown size: it always coerces to a single
/// part, so no partitioning request against it can fail validation.
pub fn validate(
    data_size: i64,
    part_count: usize,
    part_size: Option<i64>,
    force: bool,
) -> Result<(), PartdecError> {
    if data_size == UNKNOWN_SIZE || data_size == 0 {
        return Ok(());
    }

    if let Some(ps) = part_size.filter(|&p| p > 0) {
        if ps > data_size {
            return Err(PartdecError::PartExceed { part_count: ps, data_size });
        }
    } else if part_count as i64 > data_size {
        return Err(PartdecError::PartExceed {
            part_count: part_count as i64,
            data_size,
        });
    }

    let derived_count = part_size
        .filter(|&p| p > 0)
        .map(|ps| ceil_div(data_size, ps) as usize)
        .unwrap_or(part_count);

    if derived_count > PART_LIMIT && !force {
        return Err(PartdecError::PartLimit(derived_count, PART_LIMIT));
    }

    Ok(())
}

/// Derives N contiguous `[start, end]` ranges for a known or unknown data
/// size. `part_size`, when set and positive, takes priority over
/// `requested_part_count`. A `data_size` of zero is planned the same way
/// as an unknown size: a single full-range part, no Range header, body
/// written verbatim until EOF.
pub fn plan_ranges(data_size: i64, requested_part_count: usize, part_size: Option<i64>) -> Vec<ByteRange> {
    if data_size == UNKNOWN_SIZE || data_size == 0 {
        return vec![ByteRange {
            start: 1,
            end: UNKNOWN_SIZE,
            offset: 0,
            is_full_range: true,
        }];
    }

    let mut ranges = match part_size.filter(|&p| p > 0) {
        Some(ps) => plan_by_size(data_size, ps),
        None => plan_by_count(data_size, requested_part_count.max(1)),
    };

    if ranges.len() == 1 {
        ranges[0].is_full_range = true;
    }

    ranges
}

fn plan_by_size(data_size: i64, part_size: i64) -> Vec<ByteRange> {
    let part_count = ceil_div(data_size, part_size);
    let mut ranges = Vec::with_capacity(part_count as usize);

    for i in 0..part_count {
        let start = i * part_size;
        let end = if i + 1 == part_count {
            data_size - 1
        } else {
            start + part_size - 1
        };
        ranges.push(ByteRange { start, end, offset: 0, is_full_range: false });
    }

    ranges
}

fn plan_by_count(data_size: i64, part_count: usize) -> Vec<ByteRange> {
    let part_count = part_count as i64;
    let base_part_size = data_size / part_count;
    let mut remainder = data_size % part_count;

    let mut ranges = Vec::with_capacity(part_count as usize);
    let mut cursor = 0i64;

    for _ in 0..part_count {
        let mut this_size = base_part_size;
        if remainder > 0 {
            this_size += 1;
            remainder -= 1;
        }
        let start = cursor;
        let end = start + this_size - 1;
        ranges.push(ByteRange { start, end, offset: 0, is_full_range: false });
        cursor = end + 1;
    }

    ranges
}

fn ceil_div(a: i64, b: i64) -> i64 {
    if a == 0 {
        1
    } else {
        (a + b - 1) / b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_is_full_range() {
        let ranges = plan_ranges(1000, 1, None);
        assert_eq!(ranges.len(), 1);
        assert!(ranges[0].is_full_range);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[0].end, 999);
    }

    #[test]
    fn unknown_size_coerces_to_one_part() {
        let ranges = plan_ranges(UNKNOWN_SIZE, 8, None);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, 1);
        assert_eq!(ranges[0].end, UNKNOWN_SIZE);
        assert_eq!(ranges[0].len(), UNKNOWN_SIZE);
        assert!(ranges[0].is_full_range);
    }

    #[test]
    fn by_count_even_split() {
        let ranges = plan_ranges(1000, 4, None);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[0].end, 249);
        assert_eq!(ranges[1].start, 250);
        assert_eq!(ranges[1].end, 499);
        assert_eq!(ranges[3].end, 999);

        // union covers [0, dataSize-1], disjoint & contiguous
        for w in ranges.windows(2) {
            assert_eq!(w[1].start, w[0].end + 1);
        }
    }

    #[test]
    fn by_count_remainder_distributed_to_first_parts() {
        let ranges = plan_ranges(10, 3, None);
        let sizes: Vec<i64> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn by_size_last_part_extends_to_data_end() {
        let ranges = plan_ranges(1000, 1, Some(300));
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].len(), 300);
        assert_eq!(ranges[3].start, 900);
        assert_eq!(ranges[3].end, 999);
    }

    #[test]
    fn part_count_equals_data_size_each_part_one_byte() {
        let ranges = plan_ranges(8, 8, None);
        assert_eq!(ranges.len(), 8);
        assert!(ranges.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn validate_rejects_part_count_over_data_size() {
        let err = validate(10, 11, None, false).unwrap_err();
        assert!(matches!(err, PartdecError::PartExceed { .. }));
    }

    #[test]
    fn validate_rejects_part_size_over_data_size() {
        let err = validate(10, 1, Some(20), false).unwrap_err();
        assert!(matches!(err, PartdecError::PartExceed { .. }));
    }

    #[test]
    fn validate_rejects_over_soft_limit_without_force() {
        let err = validate(10_000, 200, None, false).unwrap_err();
        assert!(matches!(err, PartdecError::PartLimit(200, PART_LIMIT)));
    }

    #[test]
    fn validate_allows_over_soft_limit_with_force() {
        validate(10_000, 200, None, true).unwrap();
    }

    #[test]
    fn validate_allows_zero_data_size_regardless_of_requested_partitioning() {
        validate(0, 1, None, false).unwrap();
        validate(0, 200, None, false).unwrap();
        validate(0, 1, Some(10), false).unwrap();
    }

    #[test]
    fn zero_data_size_plans_as_single_unknown_size_part() {
        let ranges = plan_ranges(0, 1, None);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, 1);
        assert_eq!(ranges[0].end, UNKNOWN_SIZE);
        assert!(ranges[0].is_full_range);
    }
}
