use std::{convert::From, fmt};

/// Simple custom Error for the SIC/XE assembler
#[derive(Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    /// listing line number of the offending statement (if any)
    pub line: Option<usize>,
    /// literal text of the offending statement (if any)
    pub text: Option<String>,
    pub msg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// label defined more than once
    DuplicateSymbol,
    /// operand refers to a label that was never defined
    UndefinedSymbol,
    /// malformed BYTE/WORD/RESB/RESW constant or operand
    InvalidOperandSyntax,
    /// START appeared somewhere other than the first statement
    MisplacedStart,
    /// source ended without an END statement
    MissingEnd,
    /// statement found after END
    TrailingAfterEnd,
    /// no known instruction or directive on the line
    UnknownMnemonic,
    /// target can't be reached with pc- or base-relative addressing
    DisplacementOutOfRange,
    /// format 2 operand names an unknown register
    InvalidRegisterName,
    /// START/BASE operand isn't a valid address
    InvalidAddressValue,
    /// label doesn't start with a letter or is too long
    InvalidLabel,
    /// a required file couldn't be opened or created
    FileOpenFailure,
    /// underlying io error
    IO,
    /// catch-all for other errors
    General,
}

impl Error {
    pub fn new(kind: ErrorKind, line: Option<usize>, message: &str) -> Error {
        Error {
            kind,
            line,
            text: None,
            msg: String::from(message),
        }
    }
    pub fn with_text(mut self, text: &str) -> Error {
        self.text = Some(text.to_string());
        self
    }
    /// true for errors that abort the whole run rather than a single statement
    pub fn is_fatal(&self) -> bool { matches!(self.kind, ErrorKind::FileOpenFailure | ErrorKind::IO) }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self { Error::new(ErrorKind::IO, None, e.to_string().as_str()) }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{:?}: {}", self.kind, self) }
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.line, self.text.as_ref()) {
            (Some(line), Some(text)) => write!(f, "line {} \"{}\": {}", line, text, self.msg),
            (Some(line), None) => write!(f, "line {}: {}", line, self.msg),
            (None, Some(text)) => write!(f, "\"{}\": {}", text, self.msg),
            (None, None) => write!(f, "{}", self.msg),
        }
    }
}
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn display_includes_line_and_text() {
        let e = Error::new(ErrorKind::UndefinedSymbol, Some(15), "undefined symbol \"BETA\"").with_text("LDA BETA");
        assert_eq!(e.to_string(), "line 15 \"LDA BETA\": undefined symbol \"BETA\"");
        assert!(!e.is_fatal());
        let e = Error::new(ErrorKind::MissingEnd, None, "no END statement found");
        assert_eq!(e.to_string(), "no END statement found");
    }
    #[test]
    fn io_errors_are_fatal() {
        let e: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into();
        assert_eq!(e.kind, ErrorKind::IO);
        assert!(e.is_fatal());
    }
}
