//! In-place 3-way quicksort.
//!
//! Median-of-three pivot, Dijkstra partition into `< pivot`, `== pivot`,
//! `> pivot`. The smaller outer partition is sorted recursively and the
//! larger one by looping, so stack depth stays logarithmic. Short slices
//! fall back to insertion sort.

use core::cmp::Ordering;

/// Slices at most this long are insertion sorted.
pub const INSERTION_SORT_LIMIT: usize = 12;

pub fn quicksort<T, F>(v: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut v = v;
    loop {
        let len = v.len();
        if len <= INSERTION_SORT_LIMIT {
            insertion_sort(v, cmp);
            return;
        }

        // Median of three lands in the middle, then moves to the front.
        let (mid, last) = (len / 2, len - 1);
        if cmp(&v[mid], &v[0]) == Ordering::Less {
            v.swap(mid, 0);
        }
        if cmp(&v[last], &v[0]) == Ordering::Less {
            v.swap(last, 0);
        }
        if cmp(&v[last], &v[mid]) == Ordering::Less {
            v.swap(last, mid);
        }
        v.swap(0, mid);

        // v[..lt] < p, v[lt..i] == p, v[gt..] > p; v[lt] is always a pivot copy.
        let (mut lt, mut i, mut gt) = (0, 1, len);
        while i < gt {
            match cmp(&v[i], &v[lt]) {
                Ordering::Less => {
                    v.swap(lt, i);
                    lt += 1;
                    i += 1;
                }
                Ordering::Greater => {
                    gt -= 1;
                    v.swap(i, gt);
                }
                Ordering::Equal => i += 1,
            }
        }

        let (left, rest) = core::mem::take(&mut v).split_at_mut(lt);
        let right = &mut rest[gt - lt..];
        if left.len() < right.len() {
            quicksort(left, cmp);
            v = right;
        } else {
            quicksort(right, cmp);
            v = left;
        }
    }
}

fn insertion_sort<T, F>(v: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..v.len() {
        let mut j = i;
        while j > 0 && cmp(&v[j], &v[j - 1]) == Ordering::Less {
            v.swap(j, j - 1);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg(seed: &mut u64) -> u64 {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        *seed >> 33
    }

    fn check(mut v: Vec<i64>) {
        let mut expected = v.clone();
        expected.sort();
        quicksort(&mut v, &mut |a: &i64, b: &i64| a.cmp(b));
        assert_eq!(v, expected);
    }

    #[test]
    fn sorts_shapes() {
        check(vec![]);
        check(vec![1]);
        check((0..100).collect());
        check((0..100).rev().collect());
        check(vec![5; 64]);
        let mut seed = 7;
        check((0..1000).map(|_| (lcg(&mut seed) % 50) as i64).collect());
        check((0..1000).map(|_| lcg(&mut seed) as i64 - (1 << 30)).collect());
    }

    #[test]
    fn honours_custom_order() {
        let mut v: Vec<i32> = (0..40).collect();
        quicksort(&mut v, &mut |a: &i32, b: &i32| b.cmp(a));
        assert_eq!(v, (0..40).rev().collect::<Vec<_>>());
    }
}
