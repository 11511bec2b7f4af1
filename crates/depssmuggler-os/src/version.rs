//! Version comparators for the three OS-package formats. RPM and dpkg
//! both split a version string into alternating numeric/alphabetic
//! segments and compare segment-by-segment; they differ in how they treat
//! the `epoch:` prefix, `~` pre-release marker (dpkg only), and release
//! suffix.

use std::cmp::Ordering;

/// Splits `[epoch:]version[-release]` into its three parts. A missing
/// epoch defaults to `0`, matching RPM's own comparison rule.
pub fn split_evr(raw: &str) -> (u64, String, String) {
    let (epoch, rest) = match raw.split_once(':') {
        Some((e, rest)) => (e.parse().unwrap_or(0), rest),
        None => (0, raw),
    };
    match rest.rsplit_once('-') {
        Some((version, release)) => (epoch, version.to_string(), release.to_string()),
        None => (epoch, rest.to_string(), String::new()),
    }
}

/// `rpmvercmp`: alternating runs of digits and non-digits are compared
/// segment by segment — numeric runs numerically (leading zeros
/// stripped), alphabetic runs lexically (byte order); a version with
/// fewer segments than the other but otherwise equal is considered
/// older. A segment that is purely non-alphanumeric separator is skipped.
pub fn compare_rpm_versions(a: &str, b: &str) -> Ordering {
    let (ea, va, ra) = split_evr(a);
    let (eb, vb, rb) = split_evr(b);
    ea.cmp(&eb)
        .then_with(|| compare_segments(&va, &vb))
        .then_with(|| compare_segments(&ra, &rb))
}

fn segments(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;
    for ch in s.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            current_is_digit = None;
            continue;
        }
        let is_digit = ch.is_ascii_digit();
        if current_is_digit.is_some() && current_is_digit != Some(is_digit) {
            out.push(std::mem::take(&mut current));
        }
        current.push(ch);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    let sa = segments(a);
    let sb = segments(b);
    for pair in sa.iter().zip(sb.iter()) {
        let (x, y) = pair;
        let ordering = if x.chars().next().is_some_and(|c| c.is_ascii_digit()) && y.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let xn = x.trim_start_matches('0');
            let yn = y.trim_start_matches('0');
            xn.len().cmp(&yn.len()).then_with(|| xn.cmp(yn))
        } else {
            x.cmp(y)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    sa.len().cmp(&sb.len())
}

/// dpkg version compare: like RPM's but `~` sorts before the empty
/// string, so `1.0~rc1 < 1.0`.
pub fn compare_dpkg_versions(a: &str, b: &str) -> Ordering {
    let (ea, va, ra) = split_evr(a);
    let (eb, vb, rb) = split_evr(b);
    ea.cmp(&eb)
        .then_with(|| compare_dpkg_segment(&va, &vb))
        .then_with(|| compare_dpkg_segment(&ra, &rb))
}

fn compare_dpkg_segment(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek(), bi.peek()) {
            (None, None) => return Ordering::Equal,
            (Some('~'), other) => {
                if other == Some(&'~') {
                    ai.next();
                    bi.next();
                    continue;
                }
                return Ordering::Less;
            }
            (_, Some('~')) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let mut xn = String::new();
                while let Some(c) = ai.peek().filter(|c| c.is_ascii_digit()) {
                    xn.push(*c);
                    ai.next();
                }
                let mut yn = String::new();
                while let Some(c) = bi.peek().filter(|c| c.is_ascii_digit()) {
                    yn.push(*c);
                    bi.next();
                }
                let xn_trimmed = xn.trim_start_matches('0');
                let yn_trimmed = yn.trim_start_matches('0');
                let ordering = xn_trimmed.len().cmp(&yn_trimmed.len()).then_with(|| xn_trimmed.cmp(yn_trimmed));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.cmp(y);
                ai.next();
                bi.next();
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}
