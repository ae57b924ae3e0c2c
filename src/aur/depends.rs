//! Dependency strings as the index and the databases write them.

/// Strip version decoration: `foo>=1.2` → `foo`, `libfoo.so=3-64` →
/// `libfoo.so`. Constraints are discarded; resolution always takes whatever
/// version the authorities currently offer.
pub fn strip_version(dep: &str) -> &str {
    let dep = dep.trim();
    match dep.find(['<', '>', '=']) {
        Some(idx) => dep[..idx].trim_end(),
        None => dep,
    }
}

/// Runtime and build-time dependency names of one index entry. Check-time
/// dependencies are folded into the build-time list.
pub fn split_dependencies(
    depends: &[String],
    make_depends: &[String],
    check_depends: &[String],
) -> (Vec<String>, Vec<String>) {
    let runtime = unique(depends.iter().map(|d| strip_version(d)));
    let build = unique(
        make_depends
            .iter()
            .chain(check_depends)
            .map(|d| strip_version(d))
            .filter(|name| !runtime.iter().any(|r| r == name)),
    );
    (runtime, build)
}

fn unique<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("foo>=1.2"), "foo");
        assert_eq!(strip_version("foo=1"), "foo");
        assert_eq!(strip_version("foo<2.0"), "foo");
        assert_eq!(strip_version("foo>1"), "foo");
        assert_eq!(strip_version("foo<=3"), "foo");
        assert_eq!(strip_version("  bar  "), "bar");
        assert_eq!(strip_version("libssl.so=3-64"), "libssl.so");
    }

    #[test]
    fn test_split_folds_check_into_build() {
        let (runtime, build) = split_dependencies(
            &strings(&["glibc", "zlib>=1.3"]),
            &strings(&["cmake", "zlib"]),
            &strings(&["python-pytest", "cmake>=3"]),
        );
        assert_eq!(runtime, vec!["glibc", "zlib"]);
        assert_eq!(build, vec!["cmake", "python-pytest"]);
    }
}
