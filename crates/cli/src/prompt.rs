use engine_runtime::Confirm;
use std::io::{self, BufRead, Write};

/// Asks on stderr and reads the answer from stdin. Anything but `y`/`yes`
/// is a no, including a closed stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        ask(prompt)
    }
}

pub fn ask(prompt: &str) -> bool {
    let mut stderr = io::stderr();
    if write!(stderr, "{prompt} [y/N] ").and_then(|_| stderr.flush()).is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
