//! Host list files.
//!
//! A host list names the addresses synthetic flows run between, one IPv4
//! address per line. Blank lines, surrounding spaces and tabs and anything
//! from `#` to the end of the line are ignored. Both LF and CRLF line endings
//! are accepted. A line that does not hold a valid address is logged and
//! skipped rather than failing the whole file.

use std::{
    fs, io,
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use tracing::warn;

/// Errors produced by [`load`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The host list could not be read
    #[error("Failed to read host list {path:?}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The host list holds no usable address
    #[error("Host list {0:?} contains no valid address")]
    Empty(PathBuf),
}

/// Read the host list at `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Empty`] if
/// it yields no address.
pub fn load(path: &Path) -> Result<Vec<Ipv4Addr>, Error> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;
    let addresses = parse_address_list(&contents);
    if addresses.is_empty() {
        return Err(Error::Empty(path.to_path_buf()));
    }
    Ok(addresses)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between tokens
    Whitespace,
    /// Inside an address token
    Address,
    /// After `#`, until the line ends
    Comment,
    /// After `\r`, expecting `\n`
    CarriageReturn,
}

/// Scan `text` for addresses, in order of appearance. Duplicates are kept;
/// they weight the draw toward the repeated host.
#[must_use]
pub fn parse_address_list(text: &str) -> Vec<Ipv4Addr> {
    let mut addresses = Vec::new();
    let mut state = State::Whitespace;
    let mut token_start = 0;
    let mut line = 1_usize;

    for (idx, ch) in text.char_indices() {
        state = match (state, ch) {
            (State::Address, ' ' | '\t' | '#' | '\r' | '\n') => {
                push_address(&mut addresses, &text[token_start..idx], line);
                match ch {
                    '#' => State::Comment,
                    '\r' => State::CarriageReturn,
                    '\n' => {
                        line += 1;
                        State::Whitespace
                    }
                    _ => State::Whitespace,
                }
            }
            (State::Address, _) => State::Address,
            (_, '\n') => {
                line += 1;
                State::Whitespace
            }
            (_, '\r') => State::CarriageReturn,
            (State::Comment, _) | (_, '#') => State::Comment,
            (_, ' ' | '\t') => State::Whitespace,
            (_, _) => {
                token_start = idx;
                State::Address
            }
        };
    }

    if state == State::Address {
        push_address(&mut addresses, &text[token_start..], line);
    }
    addresses
}

fn push_address(addresses: &mut Vec<Ipv4Addr>, token: &str, line: usize) {
    match token.parse::<Ipv4Addr>() {
        Ok(addr) => addresses.push(addr),
        Err(err) => warn!("Skipping malformed host {token:?} on line {line}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn comments_and_blank_lines_ignored() {
        let text = "# collectors under test\n\n10.0.0.1\n  10.0.0.2  # edge\n\t\n#10.0.0.3\n";
        assert_eq!(
            parse_address_list(text),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn crlf_line_endings() {
        let text = "10.0.0.1\r\n10.0.0.2\r\n# done\r\n";
        assert_eq!(
            parse_address_list(text),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn last_line_without_newline() {
        assert_eq!(
            parse_address_list("10.0.0.1\n192.168.7.7"),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(192, 168, 7, 7)]
        );
    }

    #[test]
    fn malformed_lines_skipped() {
        let text = "10.0.0.1\nnot-a-host\n300.1.1.1\n10.0.0.2#trailing\n";
        assert_eq!(
            parse_address_list(text),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
    }

    #[test]
    fn empty_input() {
        assert!(parse_address_list("").is_empty());
        assert!(parse_address_list("\n\r\n# nothing\n").is_empty());
    }

    #[test]
    fn load_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "127.0.0.1\n10.1.2.3\n").expect("write hosts");
        let hosts = load(file.path()).expect("hosts load");
        assert_eq!(
            hosts,
            vec![Ipv4Addr::LOCALHOST, Ipv4Addr::new(10, 1, 2, 3)]
        );
    }

    #[test]
    fn load_rejects_file_without_hosts() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "# nothing here").expect("write hosts");
        assert!(matches!(load(file.path()), Err(Error::Empty(_))));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            load(&dir.path().join("hosts")),
            Err(Error::Io { .. })
        ));
    }

    proptest! {
        #[test]
        fn formatted_list_parses_back(
            hosts in proptest::collection::vec(any::<u32>().prop_map(Ipv4Addr::from), 0..32),
            crlf: bool
        ) {
            let eol = if crlf { "\r\n" } else { "\n" };
            let text: String = hosts
                .iter()
                .map(|h| format!("  {h}\t# host{eol}{eol}"))
                .collect();
            prop_assert_eq!(parse_address_list(&text), hosts);
        }
    }
}
