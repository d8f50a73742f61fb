//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Canned command replies
//!
//! Inbound lines are normalized (trimmed, lowercased) and matched against two
//! ordered tiers of rules. The substring tier is consulted first and the
//! first matching rule wins; the exact tier is consulted only when no
//! substring rule matched. Anything else is echoed back unmodified.
//!
//! ```
//! use parley_service::interpret;
//!
//! assert_eq!(interpret("HI "), "Hello!");
//! assert_eq!(interpret("please get data now"), "Data retrieval successful.");
//! assert_eq!(interpret("xyz123"), "[Server Echo]: xyz123");
//! ```

/// Prefix of the fallback echo reply
pub const ECHO_PREFIX: &str = "[Server Echo]: ";

/// How a rule decides whether it applies to a normalized line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The line contains the pattern anywhere
    Contains(&'static str),
    /// The line equals the pattern
    Exact(&'static str),
}

impl Trigger {
    /// Test a normalized line
    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            Trigger::Contains(pattern) => normalized.contains(pattern),
            Trigger::Exact(pattern) => normalized == *pattern,
        }
    }
}

/// A single `(trigger, reply)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResponse {
    /// When the rule applies
    pub trigger: Trigger,
    /// What the server answers
    pub reply: &'static str,
}

/// Substring rules, highest priority first
pub const SUBSTRING_RULES: &[CommandResponse] = &[
    CommandResponse {
        trigger: Trigger::Contains("get file"),
        reply: "File service not yet implemented.",
    },
    CommandResponse {
        trigger: Trigger::Contains("get data"),
        reply: "Data retrieval successful.",
    },
    CommandResponse {
        trigger: Trigger::Contains("run command"),
        reply: "Command executed.",
    },
];

/// Exact-match rules, consulted after every substring rule missed
pub const EXACT_RULES: &[CommandResponse] = &[
    CommandResponse {
        trigger: Trigger::Exact("hi"),
        reply: "Hello!",
    },
    CommandResponse {
        trigger: Trigger::Exact("hello"),
        reply: "Hi!",
    },
    CommandResponse {
        trigger: Trigger::Exact("how are you"),
        reply: "I am fine, and you?",
    },
    CommandResponse {
        trigger: Trigger::Exact("bye"),
        reply: "Goodbye!",
    },
];

/// Trim surrounding whitespace and lowercase
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Find the canned reply for a line, if any rule matches
pub fn canned_reply(raw: &str) -> Option<&'static str> {
    let normalized = normalize(raw);
    SUBSTRING_RULES
        .iter()
        .chain(EXACT_RULES)
        .find(|rule| rule.trigger.matches(&normalized))
        .map(|rule| rule.reply)
}

/// Map an inbound line to the server's reply
///
/// Falls back to [`ECHO_PREFIX`] followed by `raw` exactly as received.
pub fn interpret(raw: &str) -> String {
    match canned_reply(raw) {
        Some(reply) => reply.to_string(),
        None => format!("{ECHO_PREFIX}{raw}"),
    }
}

/// Whether `line` is the disconnect sentinel
///
/// The comparison is case-insensitive and otherwise exact; surrounding
/// whitespace makes the line an ordinary message.
pub fn is_disconnect_request(line: &str, token: &str) -> bool {
    line.eq_ignore_ascii_case(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_rules_ignore_case_and_whitespace() {
        assert_eq!(interpret("Hi"), "Hello!");
        assert_eq!(interpret("HI "), "Hello!");
        assert_eq!(interpret("hi"), "Hello!");
        assert_eq!(interpret("  Hello\t"), "Hi!");
        assert_eq!(interpret("How Are You"), "I am fine, and you?");
        assert_eq!(interpret("BYE"), "Goodbye!");
    }

    #[test]
    fn test_substring_rules() {
        assert_eq!(interpret("please get data now"), "Data retrieval successful.");
        assert_eq!(interpret("GET FILE report.txt"), "File service not yet implemented.");
        assert_eq!(interpret("run command ls"), "Command executed.");
    }

    #[test]
    fn test_substring_priority_first_match_wins() {
        assert_eq!(interpret("get data and run command"), "Data retrieval successful.");
        assert_eq!(interpret("run command then get data"), "Data retrieval successful.");
        assert_eq!(
            interpret("get data, get file"),
            "File service not yet implemented."
        );
    }

    #[test]
    fn test_substring_beats_exact() {
        assert_eq!(interpret("hi get data"), "Data retrieval successful.");
    }

    #[test]
    fn test_exact_rules_do_not_match_substrings() {
        assert_eq!(interpret("hi there"), "[Server Echo]: hi there");
        assert_eq!(interpret("goodbye"), "[Server Echo]: goodbye");
    }

    #[test]
    fn test_echo_uses_original_text() {
        assert_eq!(interpret("xyz123"), "[Server Echo]: xyz123");
        assert_eq!(interpret("  MiXeD Case "), "[Server Echo]:   MiXeD Case ");
        assert_eq!(interpret(""), "[Server Echo]: ");
    }

    #[test]
    fn test_disconnect_request() {
        assert!(is_disconnect_request("SHUTDOWN", "SHUTDOWN"));
        assert!(is_disconnect_request("shutdown", "SHUTDOWN"));
        assert!(is_disconnect_request("ShutDown", "SHUTDOWN"));
        assert!(!is_disconnect_request(" shutdown", "SHUTDOWN"));
        assert!(!is_disconnect_request("shutdown now", "SHUTDOWN"));
    }
}
