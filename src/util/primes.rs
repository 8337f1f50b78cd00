//! Prime table sizing for open-hash tables.

/// Precomputed primes, each roughly 1.2x the previous one.
const PRIMES: [u32; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

/// Target fill ratio of a disk hash table.
pub const LOAD_FACTOR: f64 = 0.72;

/// Smallest prime from the table that is `>= min`, or the next prime found by
/// trial division when `min` exceeds the table.
pub fn next_prime(min: u32) -> u32 {
    if let Some(&prime) = PRIMES.iter().find(|&&p| p >= min) {
        return prime;
    }

    let mut candidate = min | 1;
    while !is_prime(candidate) {
        candidate += 2;
    }
    candidate
}

/// Table size giving at most [`LOAD_FACTOR`] occupancy for `key_count` keys.
pub fn table_size_for(key_count: usize) -> u32 {
    let wanted = (key_count as f64 / LOAD_FACTOR).ceil() as u32;
    next_prime(wanted.max(key_count as u32 + 1))
}

fn is_prime(candidate: u32) -> bool {
    if candidate < 2 {
        return false;
    }
    if candidate % 2 == 0 {
        return candidate == 2;
    }
    let mut divisor = 3u32;
    while (divisor as u64) * (divisor as u64) <= candidate as u64 {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}
