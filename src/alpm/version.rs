//! pacman version ordering (`[epoch:]version[-release]`).

use std::cmp::Ordering;

/// Compare two full package versions the way `vercmp(8)` does.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    let epoch = rpmvercmp(epoch_a, epoch_b);
    if epoch != Ordering::Equal {
        return epoch;
    }
    let version = rpmvercmp(ver_a, ver_b);
    if version != Ordering::Equal {
        return version;
    }
    match (rel_a, rel_b) {
        (Some(ra), Some(rb)) => rpmvercmp(ra, rb),
        _ => Ordering::Equal,
    }
}

fn split_evr(full: &str) -> (&str, &str, Option<&str>) {
    let (epoch, rest) = match full.split_once(':') {
        Some((e, rest)) if !e.is_empty() && e.bytes().all(|b| b.is_ascii_digit()) => (e, rest),
        _ => ("0", full),
    };
    match rest.rsplit_once('-') {
        Some((version, release)) => (epoch, version, Some(release)),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison: runs of digits compare numerically, runs of
/// letters lexically, a numeric segment beats an alphabetic one.
fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        let sep_start_a = i;
        let sep_start_b = j;
        while i < a.len() && !a[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < b.len() && !b[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= a.len() || j >= b.len() {
            break;
        }
        // Differing separator lengths: the longer separator is newer.
        let sep_a = i - sep_start_a;
        let sep_b = j - sep_start_b;
        if sep_a != sep_b {
            return if sep_a < sep_b {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }

        let numeric = a[i].is_ascii_digit();
        let take = |s: &[u8], mut k: usize| {
            let start = k;
            while k < s.len()
                && (if numeric {
                    s[k].is_ascii_digit()
                } else {
                    s[k].is_ascii_alphabetic()
                })
            {
                k += 1;
            }
            (start, k)
        };
        let (sa, ea) = take(a, i);
        let (sb, eb) = take(b, j);

        if sb == eb {
            // Segment types differ: numeric wins.
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let seg_a = &a[sa..ea];
        let seg_b = &b[sb..eb];
        let ord = if numeric {
            let trim = |s: &[u8]| {
                let first = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
                s[first..].to_vec()
            };
            let (na, nb) = (trim(seg_a), trim(seg_b));
            na.len().cmp(&nb.len()).then_with(|| na.cmp(&nb))
        } else {
            seg_a.cmp(seg_b)
        };
        if ord != Ordering::Equal {
            return ord;
        }
        i = ea;
        j = eb;
    }

    let rest_a = i < a.len();
    let rest_b = j < b.len();
    match (rest_a, rest_b) {
        (false, false) => Ordering::Equal,
        // "1.0" < "1.0.1" but "1.0alpha" < "1.0"
        (true, false) => {
            if a[i].is_ascii_alphabetic() {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, true) => {
            if b[j].is_ascii_alphabetic() {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (true, true) => Ordering::Equal,
    }
}
