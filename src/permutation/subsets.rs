//! Size-bounded subset generation.
//!
//! Subsets of `0..len` are produced by size ascending, then
//! lexicographically. Each recursion level owns its prefix.

use std::ops::{ControlFlow, RangeInclusive};

/// Visit every subset of `0..len` whose size is in `sizes`.
///
/// Sizes of zero or above `len` are skipped. Stops as soon as `visit`
/// breaks and returns that break.
pub(crate) fn for_each_subset<F>(len: usize, sizes: RangeInclusive<usize>, mut visit: F) -> ControlFlow<()>
where
    F: FnMut(&[usize]) -> ControlFlow<()>,
{
    let members: Vec<usize> = (0..len).collect();

    for size in sizes {
        if size == 0 || size > len {
            continue;
        }
        extend(Vec::with_capacity(size), &members, size, &mut visit)?;
    }

    ControlFlow::Continue(())
}

fn extend<F>(prefix: Vec<usize>, suffix: &[usize], size: usize, visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(&[usize]) -> ControlFlow<()>,
{
    if prefix.len() == size {
        return visit(&prefix);
    }

    let needed = size - prefix.len();
    for (offset, &next) in suffix.iter().enumerate() {
        if suffix.len() - offset < needed {
            break;
        }
        let mut grown = prefix.clone();
        grown.push(next);
        extend(grown, &suffix[offset + 1..], size, visit)?;
    }

    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(len: usize, sizes: RangeInclusive<usize>) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let _ = for_each_subset(len, sizes, |subset| {
            out.push(subset.to_vec());
            ControlFlow::Continue(())
        });
        out
    }

    #[test]
    fn test_canonical_order() {
        assert_eq!(
            collect(3, 1..=3),
            vec![
                vec![0],
                vec![1],
                vec![2],
                vec![0, 1],
                vec![0, 2],
                vec![1, 2],
                vec![0, 1, 2],
            ]
        );
    }

    #[test]
    fn test_size_window() {
        assert_eq!(collect(4, 2..=2).len(), 6);
        assert_eq!(collect(4, 0..=0), Vec::<Vec<usize>>::new());
        assert_eq!(collect(2, 3..=5), Vec::<Vec<usize>>::new());
        assert_eq!(collect(0, 0..=3), Vec::<Vec<usize>>::new());
    }

    #[test]
    fn test_full_powerset_size() {
        // Every non-empty subset of 10 elements.
        assert_eq!(collect(10, 1..=10).len(), (1 << 10) - 1);
    }

    #[test]
    fn test_break_stops_generation() {
        let mut seen = 0;
        let flow = for_each_subset(5, 1..=5, |_| {
            seen += 1;
            if seen == 4 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(seen, 4);
    }
}
