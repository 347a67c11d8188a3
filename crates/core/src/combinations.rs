//! Index subsets for optional-provision plans
//!
//! The buildpack plan protocol has no notion of an optional provide, so every
//! subset of "could provide" features has to be spelled out as its own
//! alternative plan. These helpers enumerate those subsets as index lists.

/// All `k`-element combinations of `0..n` in lexicographic order
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }

    let mut result = Vec::new();
    let mut current: Vec<usize> = (0..k).collect();
    loop {
        result.push(current.clone());

        // Rightmost position that can still move forward
        let Some(i) = (0..k).rev().find(|&i| current[i] < n - k + i) else {
            break;
        };
        current[i] += 1;
        for j in i + 1..k {
            current[j] = current[j - 1] + 1;
        }
    }
    result
}

/// Every non-empty subset of `0..n`, by size and then lexicographically.
///
/// Yields `2^n - 1` subsets. `n` is the number of optionally provided
/// features, which is expected to stay in single digits.
pub fn non_empty_subsets(n: usize) -> Vec<Vec<usize>> {
    (1..=n).flat_map(|k| combinations(n, k)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_combinations_order() {
        assert_eq!(
            combinations(4, 2),
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3]
            ]
        );
        assert_eq!(combinations(3, 3), vec![vec![0, 1, 2]]);
        assert!(combinations(2, 3).is_empty());
        assert!(combinations(3, 0).is_empty());
    }

    #[test]
    fn test_non_empty_subsets_three() {
        assert_eq!(
            non_empty_subsets(3),
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![0, 1],
                vec![0, 2],
                vec![1, 2],
                vec![0, 1, 2]
            ]
        );
    }

    #[test]
    fn test_non_empty_subsets_count_and_uniqueness() {
        assert!(non_empty_subsets(0).is_empty());
        for n in 1..=8 {
            let subsets = non_empty_subsets(n);
            assert_eq!(subsets.len(), (1 << n) - 1, "n = {}", n);
            let distinct: HashSet<Vec<usize>> = subsets.iter().cloned().collect();
            assert_eq!(distinct.len(), subsets.len());
            assert!(subsets
                .iter()
                .all(|s| !s.is_empty() && s.windows(2).all(|w| w[0] < w[1])));
        }
    }
}
