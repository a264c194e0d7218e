// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority of the render thread when NOTESCHED_THREAD_PRIORITY is unset.
const DEFAULT_RENDER_THREAD_PRIORITY: u8 = 70;

/// Reads NOTESCHED_THREAD_PRIORITY (0-99). Invalid values fall back to the
/// default.
pub fn render_thread_priority() -> u8 {
    parse_priority(std::env::var("NOTESCHED_THREAD_PRIORITY").ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_RENDER_THREAD_PRIORITY)
}

/// Raises the priority of the calling thread. Failures are logged; the
/// render loop runs either way.
pub fn configure_render_thread_priority(priority: u8) {
    let value = match ThreadPriorityValue::try_from(priority) {
        Ok(value) => value,
        Err(e) => {
            warn!(priority, error = ?e, "Invalid render thread priority");
            return;
        }
    };
    match set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
        Ok(()) => info!(priority, "Render thread priority set"),
        Err(e) => warn!(priority, error = ?e, "Failed to set render thread priority"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(Some("42")), 42);
        assert_eq!(parse_priority(Some("100")), 70);
        assert_eq!(parse_priority(Some("loud")), 70);
        assert_eq!(parse_priority(None), 70);
    }
}
