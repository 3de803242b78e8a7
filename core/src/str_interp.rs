use std::{borrow::Borrow, collections::HashMap, ffi::OsStr, hash::Hash};

pub type Result = std::result::Result<String, InterpError>;

/// Positions are 1-based character columns of the `#` that opened the placeholder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("Unknown placeholder '#{{{0}}}' at column {1}")]
    UndefinedVar(String, usize),

    #[error("Unclosed placeholder (found '#{{' at column {0})")]
    UnclosedBrace(usize),
}

/// Expands every `#{name}` in `fmt` with the value of `name`.
/// `##` stands for a literal `#`; a `#` followed by anything else is kept as is.
pub fn interp<K, V>(fmt: &str, variables: &HashMap<K, V>) -> Result
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<OsStr>,
{
    let mut res = String::with_capacity(fmt.len() * 2);
    let mut chars = fmt.chars().enumerate().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '#' {
            res.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '#')) => {
                chars.next();
                res.push('#');
            }
            Some((_, '{')) => {
                chars.next();
                let mut name = String::with_capacity(16);
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => name.push(c),
                        None => return Err(InterpError::UnclosedBrace(i + 1)),
                    }
                }
                let Some(value) = variables.get(name.as_str()) else {
                    return Err(InterpError::UndefinedVar(name, i + 1))
                };
                res += value.as_ref().to_string_lossy().as_ref();
            }
            _ => res.push('#'),
        }
    }

    res.shrink_to_fit();
    Ok(res)
}
