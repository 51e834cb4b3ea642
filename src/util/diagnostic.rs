//! Build problems as shown to the user.
//!
//! Every reported failure (manifest, toolchain or task) becomes a
//! `Diagnostic` before it reaches the terminal or the JSON event stream: a
//! headline, the file it concerns, notes from whatever reported it and hints
//! for fixing it.

use std::fmt;
use std::path::{Path, PathBuf};

/// Fixes shared by several kinds of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// More detail is in the debug log.
    Verbose,
    InstallTypeCompiler,
    InstallBundler,
    /// See which tools were found.
    Detect,
}

impl Hint {
    pub fn text(self) -> &'static str {
        match self {
            Hint::Verbose => "Run `twinpack build --verbose` for more details",
            Hint::InstallTypeCompiler => "Install it with `npm install --save-dev typescript`",
            Hint::InstallBundler => {
                "Install it with `npm install --save-dev esbuild` or set `[tools] esbuild` in .twinpack/config.toml"
            }
            Hint::Detect => "Run `twinpack detect` to see which tools were found",
        }
    }
}

impl From<Hint> for String {
    fn from(hint: Hint) -> Self {
        hint.text().to_string()
    }
}

/// One reported build problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// The manifest, config or source file the problem is in.
    pub location: Option<PathBuf>,
    /// Detail lines, such as the bundler's own error messages.
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            location: None,
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn at(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Render for the terminal. Locations under `base` are shown relative
    /// to it.
    ///
    /// ```text
    /// error: bundler failed
    ///   --> src/index.ts
    ///    | Could not resolve "./missing"
    ///   help: Run `twinpack build --verbose` for more details
    /// ```
    pub fn render(&self, color: bool, base: Option<&Path>) -> String {
        let mut out = format!("{}: {}\n", paint(color, RED, "error"), self.message);

        if let Some(path) = &self.location {
            let shown = base
                .and_then(|base| pathdiff::diff_paths(path, base))
                .filter(|rel| !rel.starts_with(".."))
                .unwrap_or_else(|| path.clone());
            out.push_str(&format!("  {} {}\n", paint(color, BLUE, "-->"), shown.display()));
        }
        for note in &self.notes {
            for line in note.lines() {
                out.push_str(&format!("   {} {}\n", paint(color, BLUE, "|"), line));
            }
        }
        for hint in &self.hints {
            out.push_str(&format!("  {}: {}\n", paint(color, GREEN, "help"), hint));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false, None))
    }
}

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const BLUE: &str = "\x1b[1;34m";

fn paint(color: bool, code: &str, text: &str) -> String {
    if color {
        format!("{code}{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_layout() {
        let diag = Diagnostic::error("bundler failed")
            .at("/work/ui/src/index.ts")
            .note("Could not resolve \"./missing\"\nsrc/index.ts:1:14:")
            .hint(Hint::InstallTypeCompiler)
            .hint(Hint::Detect);

        assert_eq!(
            diag.render(false, Some(Path::new("/work/ui"))),
            "error: bundler failed\n\
             \x20 --> src/index.ts\n\
             \x20  | Could not resolve \"./missing\"\n\
             \x20  | src/index.ts:1:14:\n\
             \x20 help: Install it with `npm install --save-dev typescript`\n\
             \x20 help: Run `twinpack detect` to see which tools were found\n"
        );
    }

    #[test]
    fn test_location_outside_base_stays_absolute() {
        let diag = Diagnostic::error("failed to parse tsconfig.json").at("/shared/tsconfig.json");
        let output = diag.render(false, Some(Path::new("/work/ui")));
        assert!(output.contains("--> /shared/tsconfig.json"));
    }

    #[test]
    fn test_display_is_uncolored() {
        let output = Diagnostic::error("no bundled ES module was produced").to_string();
        assert_eq!(output, "error: no bundled ES module was produced\n");

        let colored = Diagnostic::error("x").hint(Hint::Verbose).render(true, None);
        assert!(colored.starts_with("\x1b[1;31merror\x1b[0m: x"));
        assert!(colored.contains("\x1b[1;32mhelp\x1b[0m: Run `twinpack build --verbose`"));
    }
}
