// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal ANSI color helpers, disabled by `SWARM_NO_COLOR` or non-tty.

use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paint {
    On,
    Off,
}

impl Paint {
    pub fn detect(no_color: bool) -> Self {
        if no_color || !std::io::stdout().is_terminal() {
            Paint::Off
        } else {
            Paint::On
        }
    }

    fn wrap(&self, code: &str, text: &str) -> String {
        match self {
            Paint::On => format!("\x1b[{code}m{text}\x1b[0m"),
            Paint::Off => text.to_string(),
        }
    }

    pub fn green(&self, text: &str) -> String {
        self.wrap("32", text)
    }

    pub fn red(&self, text: &str) -> String {
        self.wrap("31", text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.wrap("33", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.wrap("2", text)
    }

    pub fn bold(&self, text: &str) -> String {
        self.wrap("1", text)
    }

    pub fn status(&self, status: &str) -> String {
        match status {
            "complete" | "running" | "ready" => self.green(status),
            "failed" | "error" => self.red(status),
            "cancelled" | "blocked" | "synthesizing" => self.yellow(status),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_paint_passes_text_through() {
        let paint = Paint::Off;
        assert_eq!(paint.green("ok"), "ok");
        assert_eq!(paint.status("failed"), "failed");
    }

    #[test]
    fn on_paint_wraps_with_reset() {
        let paint = Paint::On;
        assert_eq!(paint.red("x"), "\x1b[31mx\x1b[0m");
    }
}
