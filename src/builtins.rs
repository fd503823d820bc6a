//! Procedures available through [`crate::Procedures::standard`].

use crate::error::ProcedureError;
use crate::procedure::{Procedure, ProcedureResult};

/// `$call upper $x`: the single argument upper-cased, `""` for any other arity.
pub(crate) fn upper(args: &[String]) -> String {
    match args {
        [only] => only.to_uppercase(),
        _ => String::new(),
    }
}

/// `$call format $"pattern" args...`.
///
/// With no arguments it renders `""`; a lone pattern is returned untouched.
/// Otherwise the pattern understands `%s` (next argument), `%S` (next argument
/// upper-cased), `%<n>$s` (the n-th argument), `%%` and `%n`.
pub(crate) struct Format;

impl Procedure for Format {
    fn call(&self, args: &[String]) -> ProcedureResult {
        match args {
            [] => Ok(String::new()),
            [pattern] => Ok(pattern.clone()),
            [pattern, rest @ ..] => format_pattern(pattern, rest),
        }
    }
}

fn format_pattern(pattern: &str, args: &[String]) -> ProcedureResult {
    let mut output = String::with_capacity(pattern.len());
    let mut next_arg = 0_usize;
    let mut chars = pattern.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }

        // Optional explicit index: digits followed by '$'.
        let mut index = None;
        let mut digits = String::new();
        while let Some(&(_, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            digits.push(d);
            chars.next();
        }
        if !digits.is_empty() {
            if chars.next_if(|&(_, d)| d == '$').is_none() {
                return Err(unknown_conversion(pattern, start));
            }
            index = digits.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            if index.is_none() {
                return Err(unknown_conversion(pattern, start));
            }
        }

        let Some((_, conversion)) = chars.next() else {
            return Err(unknown_conversion(pattern, start));
        };

        match conversion {
            '%' if index.is_none() => output.push('%'),
            'n' if index.is_none() => output.push('\n'),
            's' | 'S' => {
                let position = match index {
                    Some(position) => position,
                    None => {
                        let position = next_arg;
                        next_arg = next_arg.saturating_add(1);
                        position
                    }
                };
                let Some(arg) = args.get(position) else {
                    return Err(ProcedureError::new(format!(
                        "missing argument {} for format '{}'",
                        position.saturating_add(1),
                        pattern
                    )));
                };
                if conversion == 'S' {
                    output.push_str(&arg.to_uppercase());
                } else {
                    output.push_str(arg);
                }
            }
            _ => return Err(unknown_conversion(pattern, start)),
        }
    }

    Ok(output)
}

fn unknown_conversion(pattern: &str, at: usize) -> ProcedureError {
    let spec: String = pattern.get(at..).unwrap_or_default().chars().take(4).collect();
    ProcedureError::new(format!(
        "unknown format conversion '{}' in '{}'",
        spec, pattern
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_upper() {
        assert_eq!(upper(&args(&["abc"])), "ABC");
        assert_eq!(upper(&args(&[])), "");
        assert_eq!(upper(&args(&["a", "b"])), "");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_format_arity() {
        assert_eq!(Format.call(&args(&[])), Ok(String::new()));
        // A lone pattern is not interpreted.
        assert_eq!(Format.call(&args(&["100%"])), Ok("100%".to_string()));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_format_sequential() {
        assert_eq!(
            Format.call(&args(&["%s of %s", "3", "5"])),
            Ok("3 of 5".to_string())
        );
        assert_eq!(
            Format.call(&args(&["%S!", "loud"])),
            Ok("LOUD!".to_string())
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_format_positional_and_escapes() {
        assert_eq!(
            Format.call(&args(&["%2$s/%1$s 100%%%n", "a", "b"])),
            Ok("b/a 100%\n".to_string())
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_format_extra_arguments_are_ignored() {
        assert_eq!(
            Format.call(&args(&["only %s", "one", "two"])),
            Ok("only one".to_string())
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_format_missing_argument() {
        let err = Format.call(&args(&["%s and %s", "one"])).unwrap_err();
        assert!(err.message().contains("missing argument 2"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_format_unknown_conversion() {
        let err = Format.call(&args(&["%d", "1"])).unwrap_err();
        assert!(err.message().contains("unknown format conversion '%d'"));

        let err = Format.call(&args(&["50%", "1"])).unwrap_err();
        assert!(err.message().contains("unknown format conversion"));

        let err = Format.call(&args(&["%0$s", "1"])).unwrap_err();
        assert!(err.message().contains("unknown format conversion"));
    }
}
