//! Ordered, deduplicated search directory lists, and `$ORIGIN`/`$LIB`/`$PLATFORM`
//! token interpolation against a given object's own directory.

/// An insertion-ordered set of search directories: pushing a directory
/// already present is a no-op, so earlier (higher-priority) entries keep
/// their position.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<String>,
}

impl SearchPath {
    /// Empty search path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `dir` if it isn't already present.
    pub fn push(&mut self, dir: impl Into<String>) {
        let dir = dir.into();
        if !self.dirs.iter().any(|d| d == &dir) {
            self.dirs.push(dir);
        }
    }

    /// Append every directory in `iter`, in order, deduplicating against
    /// what's already present.
    pub fn extend(&mut self, iter: impl IntoIterator<Item = String>) {
        for dir in iter {
            self.push(dir);
        }
    }

    /// Current directories, in search order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(|s| s.as_str())
    }
}

/// Machine name substituted for `$PLATFORM`/`${PLATFORM}`. Fixed at
/// `x86_64` regardless of the host running the generator, since the
/// generated archive's target platform is a property of the recipe, not
/// of the machine producing it.
fn platform() -> &'static str {
    "x86_64"
}

/// Library directory name substituted for `$LIB`/`${LIB}`. Fixed at
/// `lib64`, matching glibc's multiarch convention for the 64-bit targets
/// this generator is built around.
fn lib_dir_name() -> &'static str {
    "lib64"
}

/// Expand `$ORIGIN`/`${ORIGIN}`, `$LIB`/`${LIB}`, and `$PLATFORM`/`${PLATFORM}`
/// tokens in a `RPATH`/`RUNPATH` entry. `origin_dir` is the directory
/// containing the object the dynamic table entry came from.
pub fn interpolate(entry: &str, origin_dir: &str) -> String {
    let mut out = entry.to_string();
    for (token, value) in [
        ("${ORIGIN}", origin_dir),
        ("$ORIGIN", origin_dir),
        ("${LIB}", lib_dir_name()),
        ("$LIB", lib_dir_name()),
        ("${PLATFORM}", platform()),
        ("$PLATFORM", platform()),
    ] {
        out = out.replace(token, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_path_deduplicates_preserving_first_position() {
        let mut sp = SearchPath::new();
        sp.push("/lib");
        sp.push("/usr/lib");
        sp.push("/lib");
        assert_eq!(sp.iter().collect::<Vec<_>>(), vec!["/lib", "/usr/lib"]);
    }

    #[test]
    fn interpolate_expands_origin_and_lib() {
        assert_eq!(interpolate("$ORIGIN/../lib", "/opt/app/bin"), "/opt/app/bin/../lib");
        assert_eq!(interpolate("${LIB}", "/x"), lib_dir_name());
    }
}
