//! `$name` variable substitution for recipe fields.

use std::collections::BTreeMap;

struct Variable {
    value: String,
    pinned: bool,
}

/// Replaceable `$name` substitution, with command-line-pinned variables that
/// recipe `$` directives cannot overwrite.
#[derive(Default)]
pub struct VariableMap {
    vars: BTreeMap<String, Variable>,
}

impl VariableMap {
    /// Create an empty variable map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the map with `-X k=v` command-line assignments. These are
    /// pinned: a later recipe `$` directive for the same name is a silent
    /// no-op.
    pub fn with_pinned(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.vars.insert(name, Variable { value, pinned: true });
        }
        map
    }

    /// Recipe `$ name value` directive. Returns `true` if the variable was
    /// inserted or overwritten, `false` if it was a no-op against a pinned
    /// variable.
    pub fn define(&mut self, name: &str, value: Option<&str>) -> bool {
        if let Some(existing) = self.vars.get(name) {
            if existing.pinned {
                return false;
            }
        }
        self.vars.insert(
            name.to_string(),
            Variable {
                value: value.unwrap_or_default().to_string(),
                pinned: false,
            },
        );
        true
    }

    /// Replace every `$name` occurrence in `field` with its bound value.
    /// Unbound `$name` tokens are left untouched.
    pub fn replace(&self, field: &str) -> String {
        if !field.contains('$') || self.vars.is_empty() {
            return field.to_string();
        }
        // Longest name first, so `$foobar` doesn't get clobbered by a `$foo` binding.
        let mut names: Vec<&str> = self.vars.keys().map(|s| s.as_str()).collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));

        let mut out = String::with_capacity(field.len());
        let mut rest = field;
        'outer: while let Some(dollar) = rest.find('$') {
            out.push_str(&rest[..dollar]);
            let after = &rest[dollar + 1..];
            for name in &names {
                if after.starts_with(name) {
                    out.push_str(&self.vars[*name].value);
                    rest = &after[name.len()..];
                    continue 'outer;
                }
            }
            out.push('$');
            rest = after;
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_is_idempotent_and_substitutes() {
        let mut vars = VariableMap::new();
        assert!(vars.define("x", Some("y")));
        assert_eq!(vars.replace("$x"), "y");
        assert_eq!(vars.replace("$x/a"), "y/a");
        assert_eq!(vars.replace(vars.replace("$x").as_str()), "y");
    }

    #[test]
    fn pinned_variables_reject_redefinition() {
        let mut vars = VariableMap::with_pinned([("x".to_string(), "pinned".to_string())]);
        assert!(!vars.define("x", Some("new")));
        assert_eq!(vars.replace("$x"), "pinned");
    }

    #[test]
    fn unbound_variables_pass_through() {
        let vars = VariableMap::new();
        assert_eq!(vars.replace("$unbound"), "$unbound");
    }

    #[test]
    fn longest_match_wins() {
        let mut vars = VariableMap::new();
        vars.define("a", Some("short"));
        vars.define("abc", Some("long"));
        assert_eq!(vars.replace("$abc"), "long");
    }
}
