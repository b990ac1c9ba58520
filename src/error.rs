use quick_error::quick_error;

quick_error! {
    /// Every fatal condition in the core maps onto one of these. There are no
    /// retries anywhere: a fatal error means either the ROM or the emulator
    /// is buggy, and the run loop surfaces it as a non-zero exit.
    /// `ExitRequested` is the single non-fatal variant; the run loop unwinds
    /// cleanly when it sees it.
    #[derive(Debug)]
    pub enum EmuError {
        Decode(msg: String) {
            display("decode error: {}", msg)
        }
        Unimplemented(kind: String, pc: u32) {
            display("not implemented: {} at {:06x}", kind, pc)
        }
        Exec(msg: String) {
            display("execution error: {}", msg)
        }
        Bus(msg: String) {
            display("bus violation: {}", msg)
        }
        Vdp(msg: String) {
            display("vdp protocol violation: {}", msg)
        }
        Tmss(value: u32) {
            display("wrong value for copy protection: {:08x}", value)
        }
        Table(msg: String) {
            display("instruction table error: {}", msg)
        }
        Io(err: std::io::Error) {
            from()
            display("i/o error: {}", err)
            cause(err)
        }
        ExitRequested(reason: &'static str) {
            display("exit requested: {}", reason)
        }
    }
}

pub type EmuResult<T> = Result<T, EmuError>;

impl EmuError {
    pub fn is_exit_request(&self) -> bool {
        match self {
            EmuError::ExitRequested(_) => true,
            _ => false,
        }
    }
}
