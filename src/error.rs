use failure_derive::Fail;

/// Errors produced by the JTAG and SWD engines.
///
/// `D` is the pin driver's own error type, kept generic so this crate
/// never needs to know how a particular driver's I/O can fail.
#[derive(Fail, Debug)]
pub enum Error<D: std::fmt::Debug + std::fmt::Display> {
    #[fail(display = "pin driver error: {}", _0)]
    Driver(D),

    #[fail(display = "JTAG scan buffer check failed")]
    QueueCheckFailed,

    #[fail(display = "SWD target returned WAIT")]
    AckWait,

    #[fail(display = "SWD target returned FAULT")]
    AckFault,

    #[fail(display = "SWD target returned a protocol error")]
    AckProtocol,

    #[fail(display = "SWD target returned unknown ACK {:#05b}", _0)]
    AckUnknown(u8),

    #[fail(display = "SWD parity check failed")]
    BadParity,

    #[fail(display = "SWD WAIT retry exceeded the {} ms deadline", _0)]
    WaitTimeout(u64),
}

pub type Result<T, D> = std::result::Result<T, Error<D>>;

/// A protocol-violation bug: a command sequence that cannot occur if the
/// upper layer is behaving correctly (an unknown command tag, or an
/// illegal step in a requested `path_move`).
///
/// This is deliberately not part of [`Error`]: upstream treats these as
/// unrecoverable and terminates the process. Here they panic with a
/// descriptive message instead, so an embedding application can still
/// catch them at a boundary with `std::panic::catch_unwind` if it must
/// not go down with the engine.
#[derive(Debug)]
pub struct EngineBug(pub String);

impl std::fmt::Display for EngineBug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "engine bug: {}", self.0)
    }
}

pub fn bug(msg: impl Into<String>) -> ! {
    panic!("{}", EngineBug(msg.into()))
}
