//! Parses one received command line into a [`Command`] or a [`CommandError`].
//!
//! The parser is pure: it never touches the transport or the storage
//! adapter, and the same input byte slice always produces the same output.

use bytes::Bytes;

const MAX_KEY_LEN: usize = 250;

/// A request parsed out of one command line.
#[derive(Debug, Clone)]
pub enum Command {
    Get {
        keys: Vec<Bytes>,
    },
    Set {
        key: Bytes,
        flags: u16,
        exptime: u64,
        bytes: usize,
        noreply: bool,
    },
    Delete {
        key: Bytes,
        noreply: bool,
    },
    Quit,
}

/// The complete client-error taxonomy the parser may emit, plus the
/// catch-all unknown-command case. Each variant carries its own fixed wire
/// text; nothing here depends on the input beyond whether it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    SetArity,
    SetNoreplyTrailer,
    SetKeyTooLong,
    SetNonDigitParams,
    SetFlagsOutOfRange,
    GetArity,
    DeleteArity,
    DeleteNoreplyTrailer,
    Unknown,
}

impl CommandError {
    /// The exact `\r\n`-terminated line written back to the client.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            CommandError::SetArity => {
                "CLIENT_ERROR incorrect # of arguments for set command\r\n"
            }
            CommandError::SetNoreplyTrailer => {
                "CLIENT_ERROR incorrect 6th argument to set command. Expected 'noreply'\r\n"
            }
            CommandError::SetKeyTooLong => {
                "CLIENT_ERROR key length of set command exceeds 250 characters\r\n"
            }
            CommandError::SetNonDigitParams => {
                "CLIENT_ERROR at least one of the <flags> <exptime> <bytes> parameters contained one or more non-digit character\r\n"
            }
            CommandError::SetFlagsOutOfRange => {
                "CLIENT_ERROR the <flags> parameter is greater than the 16 bit unsigned maximum of 65535\r\n"
            }
            CommandError::GetArity => {
                "CLIENT_ERROR incorrect # of arguments for get command\r\n"
            }
            CommandError::DeleteArity => {
                "CLIENT_ERROR incorrect # of arguments for delete command\r\n"
            }
            // Reused verbatim from the source: the delete path reports a bad
            // trailer as a "set command" error, a known quirk this spec
            // preserves rather than silently fixing.
            CommandError::DeleteNoreplyTrailer => {
                "CLIENT_ERROR incorrect 3rd argument to set command. Expected 'noreply'\r\n"
            }
            CommandError::Unknown => "ERROR\r\n",
        }
    }
}

/// Splits `line` (already stripped of its trailing `\r\n`) into whitespace
/// separated tokens, then dispatches on the first token.
pub fn parse(line: &[u8]) -> Result<Command, CommandError> {
    let tokens: Vec<&[u8]> = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let Some(&name) = tokens.first() else {
        return Err(CommandError::Unknown);
    };

    match name {
        b"quit" if tokens.len() == 1 => Ok(Command::Quit),
        b"set" => parse_set(&tokens),
        b"get" => parse_get(&tokens),
        b"delete" => parse_delete(&tokens),
        _ => Err(CommandError::Unknown),
    }
}

fn parse_set(tokens: &[&[u8]]) -> Result<Command, CommandError> {
    if tokens.len() != 5 && tokens.len() != 6 {
        return Err(CommandError::SetArity);
    }

    if tokens.len() == 6 && tokens[5] != b"noreply" {
        return Err(CommandError::SetNoreplyTrailer);
    }
    let noreply = tokens.len() == 6;

    let key = tokens[1];
    if key.len() > MAX_KEY_LEN {
        return Err(CommandError::SetKeyTooLong);
    }

    let flags_raw = tokens[2];
    let exptime_raw = tokens[3];
    let bytes_raw = tokens[4];
    if !is_unsigned_decimal(flags_raw) || !is_unsigned_decimal(exptime_raw) || !is_unsigned_decimal(bytes_raw) {
        return Err(CommandError::SetNonDigitParams);
    }

    // Digits-only tokens of unbounded length parse into u64 just fine; an
    // absurdly long digit run would overflow, which atoi reports as an
    // error indistinguishable from non-digit input at this layer.
    let flags: u64 = atoi::atoi(flags_raw).ok_or(CommandError::SetNonDigitParams)?;
    let exptime: u64 = atoi::atoi(exptime_raw).ok_or(CommandError::SetNonDigitParams)?;
    let bytes: u64 = atoi::atoi(bytes_raw).ok_or(CommandError::SetNonDigitParams)?;

    if flags > u16::MAX as u64 {
        return Err(CommandError::SetFlagsOutOfRange);
    }

    Ok(Command::Set {
        key: Bytes::copy_from_slice(key),
        flags: flags as u16,
        exptime,
        bytes: bytes as usize,
        noreply,
    })
}

fn parse_get(tokens: &[&[u8]]) -> Result<Command, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::GetArity);
    }
    Ok(Command::Get {
        keys: tokens[1..].iter().map(|k| Bytes::copy_from_slice(k)).collect(),
    })
}

fn parse_delete(tokens: &[&[u8]]) -> Result<Command, CommandError> {
    if tokens.len() != 2 && tokens.len() != 3 {
        return Err(CommandError::DeleteArity);
    }
    if tokens.len() == 3 && tokens[2] != b"noreply" {
        return Err(CommandError::DeleteNoreplyTrailer);
    }
    Ok(Command::Delete {
        key: Bytes::copy_from_slice(tokens[1]),
        noreply: tokens.len() == 3,
    })
}

fn is_unsigned_decimal(token: &[u8]) -> bool {
    !token.is_empty() && token.iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_error() {
        assert_eq!(parse(b""), Err(CommandError::Unknown));
    }

    #[test]
    fn unknown_command_is_error() {
        assert_eq!(parse(b"bogus foo"), Err(CommandError::Unknown));
    }

    #[test]
    fn quit_needs_no_arguments() {
        assert!(matches!(parse(b"quit"), Ok(Command::Quit)));
        assert_eq!(parse(b"quit now"), Err(CommandError::Unknown));
    }

    #[test]
    fn set_happy_path() {
        let cmd = parse(b"set capitalOfChina 14 2400 7").unwrap();
        match cmd {
            Command::Set { key, flags, exptime, bytes, noreply } => {
                assert_eq!(&key[..], b"capitalOfChina");
                assert_eq!(flags, 14);
                assert_eq!(exptime, 2400);
                assert_eq!(bytes, 7);
                assert!(!noreply);
            }
            _ => panic!("expected Set"),
        }
    }

    #[test]
    fn set_noreply_trailer() {
        let cmd = parse(b"set k 0 0 3 noreply").unwrap();
        assert!(matches!(cmd, Command::Set { noreply: true, .. }));
    }

    #[test]
    fn set_wrong_arity() {
        assert_eq!(parse(b"set keyValue 2400 16"), Err(CommandError::SetArity));
    }

    #[test]
    fn set_bad_noreply_trailer() {
        assert_eq!(
            parse(b"set capitalOfChina 14 2400 16 norely"),
            Err(CommandError::SetNoreplyTrailer)
        );
    }

    #[test]
    fn set_key_too_long() {
        let long_key = vec![b'a'; 251];
        let line = [b"set ".as_slice(), &long_key, b" 0 0 1"].concat();
        assert_eq!(parse(&line), Err(CommandError::SetKeyTooLong));
    }

    #[test]
    fn set_non_digit_params() {
        for line in [
            "set capitalOfChina 14.0 2400 16",
            "set capitalOfChina 14 2400.0 16",
            "set capitalOfChina 14 2400 16.0",
            "set capitalOfChina -14 2400 16",
            "set capitalOfChina 14 -2400 16",
            "set capitalOfChina 14 2400 -16",
        ] {
            assert_eq!(parse(line.as_bytes()), Err(CommandError::SetNonDigitParams));
        }
    }

    #[test]
    fn set_flags_out_of_range() {
        assert_eq!(
            parse(b"set capitalOfChina 67777 2400 16"),
            Err(CommandError::SetFlagsOutOfRange)
        );
    }

    #[test]
    fn set_validation_order_is_arity_then_noreply_then_key_then_digits_then_range() {
        // arity wins even though the trailer is also wrong
        assert_eq!(parse(b"set k 1 2"), Err(CommandError::SetArity));
    }

    #[test]
    fn get_happy_path() {
        let cmd = parse(b"get capitalOfChina continentOfLatvia hemisphereOfBrasil").unwrap();
        match cmd {
            Command::Get { keys } => assert_eq!(keys.len(), 3),
            _ => panic!("expected Get"),
        }
    }

    #[test]
    fn get_wrong_arity() {
        assert_eq!(parse(b"get"), Err(CommandError::GetArity));
    }

    #[test]
    fn delete_happy_path() {
        assert!(matches!(
            parse(b"delete capitalOfChina"),
            Ok(Command::Delete { noreply: false, .. })
        ));
        assert!(matches!(
            parse(b"delete capitalOfChina noreply"),
            Ok(Command::Delete { noreply: true, .. })
        ));
    }

    #[test]
    fn delete_wrong_arity() {
        assert_eq!(parse(b"delete"), Err(CommandError::DeleteArity));
    }

    #[test]
    fn delete_bad_noreply_trailer() {
        assert_eq!(
            parse(b"delete continentOfLatvia norel"),
            Err(CommandError::DeleteNoreplyTrailer)
        );
    }
}
