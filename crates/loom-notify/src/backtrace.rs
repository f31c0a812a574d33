// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture and parsing into stack frames.

use rustc_demangle::demangle;
use std::backtrace::Backtrace;

use crate::event::StackFrame;

/// Maximum number of frames kept for a generated backtrace.
pub const MAX_STACK_SIZE: usize = 20;

const UNKNOWN_FILE: &str = "(unknown file)";

/// Capture a backtrace at the call site, without the frames of the capture
/// machinery and of this crate.
pub fn capture_stacktrace() -> Vec<StackFrame> {
	let backtrace = Backtrace::force_capture();
	let frames = parse_backtrace(&backtrace.to_string());
	trim_own_frames(frames)
		.into_iter()
		.take(MAX_STACK_SIZE)
		.collect()
}

/// Parse the textual form of a backtrace.
///
/// Symbol lines look like `   3: my_app::main`; an optional following
/// `at path/to/file.rs:12:5` line carries the location.
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
	let mut frames: Vec<StackFrame> = Vec::new();

	for line in text.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				apply_location(frame, location);
			}
			continue;
		}

		if let Some(frame) = parse_symbol_line(line) {
			frames.push(frame);
		}
	}

	frames
}

fn parse_symbol_line(line: &str) -> Option<StackFrame> {
	// Only `N: symbol` lines; anything else is not backtrace text.
	let (index, symbol) = line.split_once(':')?;
	index.trim().parse::<u32>().ok()?;
	let symbol = symbol.trim();
	if symbol.is_empty() {
		return None;
	}

	let method = format!("{:#}", demangle(symbol));
	let in_project = is_in_project_frame(&method);

	Some(StackFrame {
		file: UNKNOWN_FILE.to_string(),
		line_number: None,
		column_number: None,
		method: Some(method),
		in_project: Some(in_project),
	})
}

/// `path:line:col`, where the path itself may contain colons.
fn apply_location(frame: &mut StackFrame, location: &str) {
	let mut parts = location.rsplitn(3, ':');
	let column = parts.next();
	let line = parts.next();
	let file = parts.next();

	match (file, line.and_then(|l| l.parse().ok()), column.and_then(|c| c.parse().ok())) {
		(Some(file), Some(line), Some(column)) => {
			frame.file = file.to_string();
			frame.line_number = Some(line);
			frame.column_number = Some(column);
		}
		_ => frame.file = location.to_string(),
	}
}

/// Determine if a frame is from application code vs the standard library or
/// runtime crates.
fn is_in_project_frame(method: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"async_trait::",
		"tracing::",
		"<tracing::",
		"panic_unwind::",
		"rust_begin_unwind",
		"__rust_",
		"_rust_",
		"loom_notify::",
		"<loom_notify::",
		"loom_notify_core::",
		"<loom_notify_core::",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panicking::",
		"::rt::",
		"::runtime::",
		"::sys_common::",
	];

	!SYSTEM_PREFIXES.iter().any(|p| method.starts_with(p))
		&& !SYSTEM_CONTAINS.iter().any(|c| method.contains(c))
}

fn is_capture_frame(frame: &StackFrame) -> bool {
	frame.method.as_deref().is_some_and(|m| {
		m.starts_with("std::backtrace")
			|| m.starts_with("<std::backtrace")
			|| m.starts_with("loom_notify::")
			|| m.starts_with("<loom_notify::")
	})
}

fn trim_own_frames(frames: Vec<StackFrame>) -> Vec<StackFrame> {
	frames.into_iter().skip_while(is_capture_frame).collect()
}
