macro_rules! verbose_println {
    ($($p:expr),+) => {
        if (config::ARGS.verbose) {
            println!($($p),+);
        }
    }
}
macro_rules! info {
    ($($p:expr),+) => {
        println!(concat!(blue!("INFO"),": {}"),format_args!($($p),+))
    }
}
macro_rules! warn {
    ($($p:expr),+) => {
        println!(concat!(yellow!("WARNING"),": {}"),format_args!($($p),+))
    }
}
macro_rules! error {
    ($($p:expr),+) => {
        println!(concat!(red!("ERROR"),": {}"),format_args!($($p),+))
    }
}
macro_rules! general_err {
    ($msg:expr) => {
        Error::new(crate::ErrorKind::General, None, format!("{}", $msg).as_str())
    };
}
macro_rules! file_err {
    ($path:expr, $e:expr) => {
        Error::new(
            crate::ErrorKind::FileOpenFailure,
            None,
            format!("unable to open \"{}\": {}", $path.display(), $e).as_str(),
        )
    };
}
// builds a statement-local error that carries the statement's line number and text
macro_rules! stmt_err {
    ($stmt:expr, $kind:expr, $($msg:expr),+) => {
        Error::new($kind, Some($stmt.line_number), format!($($msg),+).as_str()).with_text(&$stmt.text())
    };
}
macro_rules! color {
    ($color: literal, $msg: expr) => {
        concat!("\x1b[", $color, "m", $msg, "\x1b[0m")
    };
}
macro_rules! red {
    ($msg:expr) => {
        color!(91, $msg)
    };
}
macro_rules! green {
    ($msg:expr) => {
        color!(92, $msg)
    };
}
macro_rules! yellow {
    ($msg:expr) => {
        color!(93, $msg)
    };
}
macro_rules! blue {
    ($msg:expr) => {
        color!(94, $msg)
    };
}
