/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use thiserror::Error;

use crate::inode::InodeKind;
use crate::path::PathName;

/// One parsed request, borrowed from the packet that carried it. The
/// original server tokenizes each datagram destructively with `sscanf` and
/// `strtok_r` in place; this walks the line once into borrowed slices and
/// only allocates when it has to own a `PathName`.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Create { path: PathName, kind: InodeKind },
    Delete { path: PathName },
    Lookup { path: PathName },
    Move { from: PathName, to: PathName },
    Print { output_file: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown verb '{0}'")]
    UnknownVerb(char),
    #[error("wrong number of arguments for '{0}'")]
    WrongArgCount(char),
    #[error("invalid node type '{0}', expected 'f' or 'd'")]
    InvalidNodeType(String),
}

/// Parses one ASCII command line per spec.md §6's grammar:
/// `c <path> <f|d>`, `d <path>`, `l <path>`, `m <src> <dst>`,
/// `p <output-file>`.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().ok_or(ParseError::Empty)?;
    let mut verb_chars = verb.chars();
    let verb_char = verb_chars.next().ok_or(ParseError::Empty)?;
    if verb_chars.next().is_some() {
        return Err(ParseError::UnknownVerb(verb_char));
    }

    let args: Vec<&str> = tokens.collect();
    match verb_char {
        'c' => {
            let [path, kind] = take_args(&args).ok_or(ParseError::WrongArgCount('c'))?;
            let kind = match kind {
                "f" => InodeKind::File,
                "d" => InodeKind::Directory,
                other => return Err(ParseError::InvalidNodeType(other.to_owned())),
            };
            Ok(Command::Create {
                path: path.into(),
                kind,
            })
        }
        'd' => {
            let [path] = take_args(&args).ok_or(ParseError::WrongArgCount('d'))?;
            Ok(Command::Delete { path: path.into() })
        }
        'l' => {
            let [path] = take_args(&args).ok_or(ParseError::WrongArgCount('l'))?;
            Ok(Command::Lookup { path: path.into() })
        }
        'm' => {
            let [from, to] = take_args(&args).ok_or(ParseError::WrongArgCount('m'))?;
            Ok(Command::Move {
                from: from.into(),
                to: to.into(),
            })
        }
        'p' => {
            let [output_file] = take_args(&args).ok_or(ParseError::WrongArgCount('p'))?;
            Ok(Command::Print {
                output_file: output_file.to_owned(),
            })
        }
        other => Err(ParseError::UnknownVerb(other)),
    }
}

fn take_args<const N: usize>(args: &[&str]) -> Option<[&str; N]> {
    args.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_file() {
        assert_eq!(
            parse("c /a f").unwrap(),
            Command::Create {
                path: "/a".into(),
                kind: InodeKind::File
            }
        );
    }

    #[test]
    fn parses_create_directory() {
        assert_eq!(
            parse("c /a d").unwrap(),
            Command::Create {
                path: "/a".into(),
                kind: InodeKind::Directory
            }
        );
    }

    #[test]
    fn parses_delete() {
        assert_eq!(
            parse("d /a").unwrap(),
            Command::Delete { path: "/a".into() }
        );
    }

    #[test]
    fn parses_lookup() {
        assert_eq!(
            parse("l /a/b").unwrap(),
            Command::Lookup {
                path: "/a/b".into()
            }
        );
    }

    #[test]
    fn parses_move() {
        assert_eq!(
            parse("m /a /b").unwrap(),
            Command::Move {
                from: "/a".into(),
                to: "/b".into()
            }
        );
    }

    #[test]
    fn parses_print() {
        assert_eq!(
            parse("p /tmp/out.txt").unwrap(),
            Command::Print {
                output_file: "/tmp/out.txt".to_owned()
            }
        );
    }

    #[test]
    fn rejects_unknown_verb() {
        assert_eq!(parse("x /a").unwrap_err(), ParseError::UnknownVerb('x'));
    }

    #[test]
    fn rejects_bad_node_type() {
        assert_eq!(
            parse("c /a z").unwrap_err(),
            ParseError::InvalidNodeType("z".to_owned())
        );
    }

    #[test]
    fn rejects_wrong_arg_count() {
        assert_eq!(parse("c /a").unwrap_err(), ParseError::WrongArgCount('c'));
        assert_eq!(parse("l /a /b").unwrap_err(), ParseError::WrongArgCount('l'));
    }

    #[test]
    fn rejects_empty_line() {
        assert_eq!(parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse("   ").unwrap_err(), ParseError::Empty);
    }
}
