//! Operator console: line input, formatted output and hex dumps.

use core::fmt::{self, Write};

use heapless::String;

use crate::config::CONSOLE_LINE_SIZE;
use crate::session::PufFlags;

pub type Line = String<CONSOLE_LINE_SIZE>;

/// Text console the menu runs on, typically a UART.
pub trait Console: Write {
    /// Next input line without its line ending; `None` once input is closed.
    fn read_line(&mut self) -> Option<Line>;
}

/// What a prompt got back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Input<T> {
    Value(T),
    /// Something that does not parse as a number.
    Bad,
    /// End of input.
    Closed,
}

/// Read one decimal number from a line.
pub fn read_number<C: Console + ?Sized>(console: &mut C) -> Input<u32> {
    match console.read_line() {
        None => Input::Closed,
        Some(line) => match line.trim().parse::<u32>() {
            Ok(value) => Input::Value(value),
            Err(_) => Input::Bad,
        },
    }
}

/// Read the first whitespace delimited word of a line.
pub fn read_word<C: Console + ?Sized>(console: &mut C) -> Option<Line> {
    let line = console.read_line()?;
    let mut word = Line::new();
    word.push_str(line.split_whitespace().next().unwrap_or("")).ok()?;
    Some(word)
}

/// Hex dump, `row` bytes per line, each line prefixed with its offset.
pub fn print_mem<W: Write + ?Sized>(out: &mut W, bytes: &[u8], row: usize) -> fmt::Result {
    for (i, byte) in bytes.iter().enumerate() {
        if i % row == 0 {
            write!(out, "\r\n{:4}: ", i)?;
        }
        write!(out, "{:02x} ", byte)?;
    }
    out.write_str("\r\n")
}

pub fn print_key_code<W: Write + ?Sized>(out: &mut W, key_code: &[u8], row: usize) -> fmt::Result {
    out.write_str("Key code:\r\n")?;
    out.write_str("        ---------- key type\r\n")?;
    out.write_str("       |   --------- key index\r\n")?;
    out.write_str("       |  |      -------- key size\r\n")?;
    out.write_str("       |  |     |\r\n")?;
    print_mem(out, key_code, row)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "  yes  " } else { "  no   " }
}

pub fn print_flags<W: Write + ?Sized>(out: &mut W, flags: &PufFlags) -> fmt::Result {
    out.write_str("Allowed operations: Enroll  Start   SetKey  GetKey ")?;
    write!(
        out,
        "\r\n                    {} {} {} {} ",
        yes_no(flags.allow.enroll),
        yes_no(flags.allow.start),
        yes_no(flags.allow.set_key),
        yes_no(flags.allow.get_key),
    )?;
    out.write_str("\r\n\r\nPUF Status:         Busy   Success  Error ")?;
    write!(
        out,
        "\r\n                    {} {} {}",
        yes_no(flags.status.busy),
        yes_no(flags.status.success),
        yes_no(flags.status.error),
    )
}
