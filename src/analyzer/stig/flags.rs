//! Command line option extraction.
//!
//! Used to inspect container commands (`--request-timeout=60s`) and kubelet
//! command lines, and to pick apart comma separated inner values such as
//! `--feature-gates=Foo=true,Bar=false`.

/// Find every value given to `flag` in a sequence of command tokens.
///
/// A token matches when, after stripping one or two leading dashes, it is
/// exactly `flag` or `flag` followed by `=` or a space. The value is the rest of
/// the token after that separator, trimmed. A bare flag yields an empty string.
///
/// The remainder is returned verbatim: `"--a=x --b=y"` yields `"x --b=y"` for
/// `a`, because tokens are never re-split.
pub fn find_flag_value_raw<S: AsRef<str>>(tokens: &[S], flag: &str) -> Vec<String> {
    tokens
        .iter()
        .filter_map(|token| flag_value(token.as_ref(), flag))
        .collect()
}

fn flag_value(token: &str, flag: &str) -> Option<String> {
    let name = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    let rest = name.strip_prefix(flag)?;

    let mut chars = rest.chars();
    match chars.next() {
        None => Some(String::new()),
        Some('=') | Some(' ') => Some(chars.as_str().trim().to_string()),
        _ => None,
    }
}

/// Collect the values of `key` from comma separated `key=value` lists.
///
/// Each input string is split on `,` and each element on its first `=`. Keys
/// are compared exactly.
pub fn find_inner_value<S: AsRef<str>>(values: &[S], key: &str) -> Vec<String> {
    let mut found = Vec::new();
    for value in values {
        for pair in value.as_ref().split(',') {
            if let Some((k, v)) = pair.split_once('=') {
                if k == key {
                    found.push(v.to_string());
                }
            }
        }
    }
    found
}

/// Split a raw command line (as read from a process table) into tokens.
pub fn command_tokens(raw_command: &str) -> Vec<&str> {
    raw_command.split_whitespace().collect()
}

/// Find the values of `flag` in a raw, unsplit command line.
pub fn find_flag_values_in_command(raw_command: &str, flag: &str) -> Vec<String> {
    find_flag_value_raw(&command_tokens(raw_command), flag)
}

/// Whether `flag` is present at least once in a raw command line.
pub fn is_flag_set(raw_command: &str, flag: &str) -> bool {
    !find_flag_values_in_command(raw_command, flag).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_find_single_value() {
        let command = [
            "--flag1=value1",
            "--flag2=value2",
            "--flag3 value3",
            "--flag4=value4",
            "--flag5=value5",
        ];
        assert_eq!(find_flag_value_raw(&command, "flag1"), vec!["value1"]);
    }

    #[test]
    fn test_find_values_double_dash() {
        let command = [
            "--flag1=value1",
            "--flag2=value2",
            "--flag1 value3",
            "--flag1foo=value4",
            "--flag1",
            "--barflag1=value6",
        ];
        assert_eq!(
            find_flag_value_raw(&command, "flag1"),
            vec!["value1", "value3", ""]
        );
    }

    #[test]
    fn test_find_values_single_dash() {
        let command = [
            "-flag1=value1",
            "-flag2=value2",
            "-flag1 value3",
            "-flag1foo=value4",
            "-flag1",
            "-barflag1=value6",
        ];
        assert_eq!(
            find_flag_value_raw(&command, "flag1"),
            vec!["value1", "value3", ""]
        );
    }

    #[test]
    fn test_prefixed_flag_never_matches() {
        let command = ["--flag1=value1", "--flag1foo=value4"];
        assert_eq!(find_flag_value_raw(&command, "flag1"), vec!["value1"]);
    }

    #[test]
    fn test_remainder_is_not_resplit() {
        let command = [
            "--flag1=value1 --flag2=value2",
            "-flag1=     value3",
            "--flag1=\"value4\"",
            "-flag1      ",
        ];
        assert_eq!(
            find_flag_value_raw(&command, "flag1"),
            vec!["value1 --flag2=value2", "value3", "\"value4\"", ""]
        );
    }

    #[test]
    fn test_values_with_inner_flags() {
        let command = [
            "--flag1=value1=value1.1,value2=value2.1",
            "--flag2=value2",
            "--flag3=value3=value3.1",
            "--flag1=value5=value5.1",
        ];
        assert_eq!(
            find_flag_value_raw(&command, "flag1"),
            vec!["value1=value1.1,value2=value2.1", "value5=value5.1"]
        );
    }

    #[test]
    fn test_values_are_trimmed() {
        let command = [
            "--flag1  value1 ",
            "--flag2=value2",
            "--flag1 value3",
            "--flag1=value5 ",
        ];
        assert_eq!(
            find_flag_value_raw(&command, "flag1"),
            vec!["value1", "value3", "value5"]
        );
    }

    #[test]
    fn test_no_match_is_empty() {
        let command: [&str; 2] = ["--foo=bar", "positional"];
        assert!(find_flag_value_raw(&command, "flag1").is_empty());
        assert!(find_flag_value_raw::<&str>(&[], "flag1").is_empty());
    }

    #[test]
    fn test_three_dashes_do_not_match() {
        assert!(find_flag_value_raw(&["---flag1=x"], "flag1").is_empty());
    }

    #[test]
    fn test_find_inner_value() {
        let values = [
            "flag1=value1,flag2=value2,flag3=value3",
            "flag4=value2",
            "flag4=value4,flag1=value5",
        ];
        assert_eq!(find_inner_value(&values, "flag1"), vec!["value1", "value5"]);
    }

    #[test]
    fn test_find_inner_value_multiple_in_one_string() {
        let values = ["flag1=value1,flag2=value2,flag1=value3", "flag4=value2"];
        assert_eq!(find_inner_value(&values, "flag1"), vec!["value1", "value3"]);
    }

    #[test]
    fn test_find_inner_value_missing() {
        let values = ["flag1=value1,flag2=value2", "flag4=value4,flag1=value5"];
        assert!(find_inner_value(&values, "flag6").is_empty());
    }

    #[test]
    fn test_is_flag_set() {
        assert!(!is_flag_set("--foo=bar --not-set-flag=true", "set-flag"));
        assert!(is_flag_set("--foo=bar --set-flag=true", "set-flag"));
        assert!(is_flag_set(
            "--foo=bar --set-flag=true --set-flag=false",
            "set-flag"
        ));
    }

    #[test]
    fn test_find_flag_values_in_command() {
        assert_eq!(
            find_flag_values_in_command("/usr/bin/kubelet --config=./config --v=2", "config"),
            vec!["./config"]
        );
    }

    proptest! {
        #[test]
        fn prop_assigned_value_is_found(flag in "[a-z][a-z-]{0,15}", value in "[A-Za-z0-9./:]{0,20}") {
            let token = format!("--{}={}", flag, value);
            prop_assert_eq!(find_flag_value_raw(&[token], &flag), vec![value]);
        }

        #[test]
        fn prop_longer_name_never_matches(flag in "[a-z]{1,10}", suffix in "[a-z0-9]{1,5}", value in "[a-z0-9]{0,8}") {
            let token = format!("--{}{}={}", flag, suffix, value);
            prop_assert!(find_flag_value_raw(&[token], &flag).is_empty());
        }

        #[test]
        fn prop_one_result_per_occurrence(flag in "[a-z]{1,10}", count in 0usize..6) {
            let tokens: Vec<String> = (0..count).map(|i| format!("-{}={}", flag, i)).collect();
            prop_assert_eq!(find_flag_value_raw(&tokens, &flag).len(), count);
        }
    }
}
