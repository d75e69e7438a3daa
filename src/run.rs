mod cli;

pub(crate) use cli::as_cli;

pub(crate) fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        format!("{home}/{rest}")
    } else {
        path.to_string()
    }
}

/// Value following `flag`, e.g. `--company Acme`.
pub(crate) fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Arguments that are neither `--flag`s nor the value following one.
pub(crate) fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with("--") {
            iter.next();
        } else {
            out.push(arg.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flag_value() {
        let a = args(&["alice", "--company", "Acme", "--status", "active"]);
        assert_eq!(flag_value(&a, "--company"), Some("Acme"));
        assert_eq!(flag_value(&a, "--status"), Some("active"));
        assert_eq!(flag_value(&a, "--user"), None);
    }

    #[test]
    fn test_flag_without_value() {
        let a = args(&["alice", "--company"]);
        assert_eq!(flag_value(&a, "--company"), None);
    }

    #[test]
    fn test_positionals_skip_flags_and_values() {
        let a = args(&["Acme", "--reason", "new vendor", "2000", "--as", "md", "10000"]);
        assert_eq!(positionals(&a), vec!["Acme", "2000", "10000"]);
    }

    #[test]
    fn test_negative_amount_is_positional() {
        let a = args(&["alice", "Acme", "-5"]);
        assert_eq!(positionals(&a), vec!["alice", "Acme", "-5"]);
    }

    #[test]
    fn test_expand_home_passthrough() {
        assert_eq!(expand_home("/tmp/x.db"), "/tmp/x.db");
        assert!(!expand_home("~/x.db").starts_with('~'));
    }
}
