use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("InternalError: {message}, {location}"))]
    Internal {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("IoError: {message}, {location}"))]
    Io {
        message: String,
        location: snafu::Location,
    },
    #[snafu(display("AddrParseError: {message}, {location}"))]
    AddrParse {
        message: String,
        location: snafu::Location,
    },
    /// A host record or datagram failed its length or format checks.
    #[snafu(display("MalformedRecord: {message}, {location}"))]
    MalformedRecord {
        message: String,
        location: snafu::Location,
    },
    /// The membership snapshot could not be fetched from the contact node.
    #[snafu(display("JoinFailed: {message}, {location}"))]
    JoinFailed {
        message: String,
        location: snafu::Location,
    },
}

impl Error {
    #[track_caller]
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            message: message.into(),
            location: std::panic::Location::caller().to_snafu_location(),
        }
    }

    #[track_caller]
    pub(crate) fn join_failed(message: impl Into<String>) -> Self {
        Self::JoinFailed {
            message: message.into(),
            location: std::panic::Location::caller().to_snafu_location(),
        }
    }
}

trait SnafuLocationExt {
    fn to_snafu_location(&'static self) -> snafu::Location;
}

impl SnafuLocationExt for std::panic::Location<'static> {
    fn to_snafu_location(&'static self) -> snafu::Location {
        snafu::Location::new(self.file(), self.line(), self.column())
    }
}

macro_rules! make_error_from {
    ($from: ty, $to: ident) => {
        impl From<$from> for Error {
            #[track_caller]
            fn from(value: $from) -> Self {
                Self::$to {
                    message: value.to_string(),
                    location: std::panic::Location::caller().to_snafu_location(),
                }
            }
        }
    };
}

make_error_from!(std::io::Error, Io);
make_error_from!(std::net::AddrParseError, AddrParse);
make_error_from!(std::num::ParseIntError, AddrParse);
