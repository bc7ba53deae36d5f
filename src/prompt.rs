//! Interactive confirmation and line input

use std::io::{self, BufRead, Write};

/// Ask a yes/no question. Only `y` or `yes` (any case) agree; end of input
/// declines.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    let answer = ask(input, output, question)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Print `question` and read one trimmed line of reply.
pub fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<String> {
    write!(output, "{}", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// `confirm` on the terminal.
pub fn confirm_stdin(question: &str) -> io::Result<bool> {
    confirm(&mut io::stdin().lock(), &mut io::stdout(), question)
}

/// `ask` on the terminal, falling back to `default` for an empty reply.
pub fn ask_stdin(question: &str, default: &str) -> io::Result<String> {
    let answer = ask(&mut io::stdin().lock(), &mut io::stdout(), question)?;
    Ok(if answer.is_empty() { default.to_string() } else { answer })
}
