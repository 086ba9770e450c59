//! Stack frame extraction from rendered backtraces.
//!
//! Input is the text form of a captured `std::backtrace::Backtrace`:
//!
//! ```text
//!    0: std::panicking::begin_panic_handler
//!              at /rustc/abc/library/std/src/panicking.rs:665:5
//!    1: core::panicking::panic_fmt
//!    2: demo::handler::{{closure}}
//!              at ./src/main.rs:14:9
//!       demo::helper
//!              at ./src/main.rs:30:5
//! ```
//!
//! Numbered lines start a frame, un-numbered symbol lines are inlined
//! frames, and `at` lines attach a location to the preceding symbol.

use crate::record::StackFrame;

/// Upper bound on reported frames; deep recursion must not produce unbounded payloads.
pub const MAX_STACK_FRAMES: usize = 32;

const RUNTIME_PREFIXES: &[&str] = &[
    "std::",
    "core::",
    "alloc::",
    "rust_begin_unwind",
    "__rust",
    "<std::",
    "<core::",
    "<alloc::",
];

/// Frames where unwinding starts.
const PANIC_ENTRY_PREFIXES: &[&str] = &[
    "std::panicking::",
    "core::panicking::",
    "rust_begin_unwind",
    "__rustc::rust_begin_unwind",
];

/// Source locations inside the standard library.
const RUNTIME_PATH_MARKERS: &[&str] = &[
    "/rustc/",
    "/library/std/",
    "/library/core/",
    "/library/alloc/",
];

/// Label used for a frame synthesized from the panic location alone.
pub const LOCATION_LABEL: &str = "<panic>";

#[derive(Debug)]
struct RawFrame {
    symbol: String,
    file: Option<String>,
    line: u32,
}

impl RawFrame {
    fn is_runtime_internal(&self) -> bool {
        RUNTIME_PREFIXES.iter().any(|p| self.symbol.starts_with(p))
            || self
                .file
                .as_deref()
                .is_some_and(|f| RUNTIME_PATH_MARKERS.iter().any(|m| f.contains(m)))
    }

    fn is_panic_entry(&self) -> bool {
        PANIC_ENTRY_PREFIXES
            .iter()
            .any(|p| self.symbol.starts_with(p))
    }

    /// Harness symbols, including `<T as harness::Trait>::method` impls.
    fn is_boundary(&self, boundaries: &[&str]) -> bool {
        let bare = self.symbol.trim_start_matches('<');
        let as_trait = if self.symbol.starts_with('<') {
            bare.split_once(" as ").map(|(_, tr)| tr.trim_start_matches('<'))
        } else {
            None
        };
        boundaries
            .iter()
            .any(|b| bare.starts_with(b) || as_trait.is_some_and(|tr| tr.starts_with(b)))
    }
}

fn parse_location(loc: &str) -> (String, u32) {
    let mut parts = loc.rsplitn(3, ':');
    let last = parts.next().unwrap_or_default();
    let middle = parts.next();
    let rest = parts.next();
    match (middle, rest) {
        // path:line:col
        (Some(line), Some(path)) if line.parse::<u32>().is_ok() => {
            (path.to_string(), line.parse().unwrap_or(0))
        }
        // path:line
        (Some(path), _) if last.parse::<u32>().is_ok() => {
            let path = match rest {
                Some(r) => format!("{r}:{path}"),
                None => path.to_string(),
            };
            (path, last.parse().unwrap_or(0))
        }
        _ => (loc.to_string(), 0),
    }
}

fn parse_frames(rendered: &str) -> Vec<RawFrame> {
    let mut frames: Vec<RawFrame> = Vec::new();

    for line in rendered.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("note:") {
            continue;
        }

        if let Some(loc) = trimmed.strip_prefix("at ") {
            if let Some(last) = frames.last_mut()
                && last.file.is_none()
            {
                let (file, line) = parse_location(loc);
                last.file = Some(file);
                last.line = line;
            }
            continue;
        }

        let numbered = trimmed
            .split_once(": ")
            .filter(|(idx, _)| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()));
        match numbered {
            Some((_, symbol)) => frames.push(RawFrame {
                symbol: symbol.trim().to_string(),
                file: None,
                line: 0,
            }),
            // Inlined symbol; only meaningful once a numbered frame exists.
            None if !frames.is_empty() => frames.push(RawFrame {
                symbol: trimmed.to_string(),
                file: None,
                line: 0,
            }),
            None => {}
        }
    }

    frames
}

/// Extract user-facing frames from a rendered backtrace, deepest first.
///
/// Everything up to the first panic entry frame (`std::panicking`,
/// `core::panicking`, ...) is the capturing hook and is dropped, along with
/// the runtime frames that follow it. The remaining list is cut at the first
/// frame whose symbol, or trait in a `<T as Trait>` symbol, starts with one
/// of `boundaries` (the harness that contained the panic). Trailing runtime
/// frames are trimmed, and at most
/// [`MAX_STACK_FRAMES`] are returned.
#[must_use]
pub fn frames_from_backtrace(rendered: &str, boundaries: &[&str]) -> Vec<StackFrame> {
    let raw = parse_frames(rendered);

    let entry = raw.iter().position(RawFrame::is_panic_entry).unwrap_or(0);
    let Some(start) = raw[entry..]
        .iter()
        .position(|f| !f.is_runtime_internal())
        .map(|offset| entry + offset)
    else {
        return Vec::new();
    };

    let end = raw[start..]
        .iter()
        .position(|f| f.is_boundary(boundaries))
        .map_or(raw.len(), |offset| start + offset);

    let mut user = &raw[start..end];
    while let Some((last, rest)) = user.split_last() {
        if !last.is_runtime_internal() {
            break;
        }
        user = rest;
    }

    user.iter()
        .take(MAX_STACK_FRAMES)
        .map(|f| StackFrame {
            path: f.file.as_deref().map(minimal_path).unwrap_or_default(),
            line: f.line,
            label: short_label(&f.symbol),
        })
        .collect()
}

/// Frame built from a panic location when no symbolized frame survives.
#[must_use]
pub fn location_frame(file: &str, line: u32) -> StackFrame {
    StackFrame {
        path: minimal_path(file),
        line,
        label: LOCATION_LABEL.to_string(),
    }
}

/// Strip the symbol hash and the leading crate qualifier.
///
/// `demo::svc::Handler::call::h0123456789abcdef` becomes `svc::Handler::call`.
/// Qualified-path symbols (`<T as Trait>::method`) keep their form.
#[must_use]
pub fn short_label(symbol: &str) -> String {
    let symbol = match symbol.rsplit_once("::h") {
        Some((head, hash)) if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) => {
            head
        }
        _ => symbol,
    };

    if symbol.starts_with('<') {
        return symbol.to_string();
    }

    match symbol.split_once("::") {
        Some((_, rest)) if !rest.is_empty() => rest.to_string(),
        _ => symbol.to_string(),
    }
}

/// Shorten a source path to the crate directory and below.
///
/// `/home/u/proj/src/handlers/mod.rs` becomes `proj/src/handlers/mod.rs`;
/// a path without a `src` component keeps only its file name.
#[must_use]
pub fn minimal_path(file: &str) -> String {
    let components: Vec<&str> = file
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();

    match components.iter().rposition(|c| *c == "src") {
        Some(idx) => components[idx.saturating_sub(1)..].join("/"),
        None => components.last().map(|c| (*c).to_string()).unwrap_or_default(),
    }
}
